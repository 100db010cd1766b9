use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use products_hr::{Directory, NewEmployee};
use tracing::info;

fn demo(
    full_name: &str,
    department: &str,
    birth_date: (i32, u32, u32),
    salary: f64,
) -> Result<NewEmployee> {
    let (year, month, day) = birth_date;
    let birth_date = NaiveDate::from_ymd_opt(year, month, day)
        .with_context(|| format!("invalid demo birth date for {full_name}"))?;
    Ok(NewEmployee {
        id: None,
        full_name: full_name.to_string(),
        avatar: None,
        department: department.to_string(),
        birth_date,
        salary,
    })
}

fn demo_employees() -> Result<Vec<NewEmployee>> {
    [
        ("Ada Mensah", "Engineering", (1989, 3, 14), 7200.0),
        ("Bruno Alves", "Engineering", (1994, 11, 2), 6100.0),
        ("Chidi Obi", "Sales", (1991, 6, 23), 4800.0),
        ("Dana Kowalski", "Sales", (1986, 1, 9), 5300.0),
        ("Eun-ji Park", "People", (1993, 8, 30), 4500.0),
    ]
    .into_iter()
    .map(|(name, department, born, salary)| demo(name, department, born, salary))
    .collect()
}

/// Populate the directory with demo employees and flush it.
///
/// Refuses to touch a non-empty directory unless `force` is set, in which
/// case existing records are removed first.
pub fn run(directory: &Directory, force: bool) -> Result<usize> {
    if !directory.is_empty() {
        if !force {
            bail!(
                "directory already holds {} employees; pass --force to replace them",
                directory.len()
            );
        }
        for existing in directory.snapshot() {
            directory.delete(&existing.id)?;
        }
    }

    let employees = demo_employees()?;
    let count = employees.len();
    for employee in employees {
        directory.add(employee)?;
    }
    directory.flush()?;
    info!(count, "demo employees seeded");
    Ok(count)
}
