mod config;
mod flusher;
mod http;
mod seed;

use std::{collections::BTreeMap, path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use platform_obs::{ObsConfig, init_tracing, shutdown_tracing};
use products_hr::{Directory, EmployeeStore};

use crate::{
    config::AppConfig,
    http::{AppState, ServeConfig},
};

#[derive(Parser, Debug)]
#[command(name = "hr-server", version, about = "FossRust HR employee directory")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP server.
    Serve(ServeCommand),
    /// Load the data file and report what it holds.
    Check(DataFileArgs),
    /// Write demo employees to the data file.
    Seed {
        #[command(flatten)]
        data: DataFileArgs,
        #[arg(long, help = "Replace existing employees")]
        force: bool,
    },
}

#[derive(Args, Debug)]
struct DataFileArgs {
    #[arg(long, value_name = "FILE", help = "Data file (overrides DATA_FILE)")]
    data_file: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct ServeCommand {
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    host: std::net::IpAddr,
    #[arg(long, env = "PORT", default_value_t = 8080)]
    port: u16,
    #[command(flatten)]
    data: DataFileArgs,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing(ObsConfig::default())?;
    let cli = Cli::parse();
    let config = AppConfig::load()?;
    let outcome = match cli.command {
        Command::Serve(cmd) => run_server(cmd, config).await,
        Command::Check(data) => check(config.with_data_file(data.data_file)),
        Command::Seed { data, force } => {
            let directory = open_directory(&config.with_data_file(data.data_file))?;
            seed::run(&directory, force).map(|_| ())
        }
    };
    shutdown_tracing();
    outcome
}

fn open_directory(config: &AppConfig) -> Result<Directory> {
    let store: EmployeeStore = Arc::new(config.store_settings().open_json());
    Directory::open(store)
        .with_context(|| format!("failed to load {}", config.data_file.display()))
}

async fn run_server(cmd: ServeCommand, config: AppConfig) -> Result<()> {
    let config = config.with_data_file(cmd.data.data_file);
    let directory = Arc::new(open_directory(&config)?);
    let state = AppState {
        directory,
        config: Arc::new(config),
    };
    http::serve(ServeConfig::new(cmd.host, cmd.port), state).await
}

fn check(config: AppConfig) -> Result<()> {
    let directory = open_directory(&config)?;
    let mut departments: BTreeMap<String, usize> = BTreeMap::new();
    for employee in directory.get_all(None) {
        *departments.entry(employee.department).or_default() += 1;
    }
    println!(
        "{}: {} employees",
        config.data_file.display(),
        directory.len()
    );
    for (department, count) in departments {
        println!("  {department}: {count}");
    }
    if directory.has_unsaved_changes() {
        println!("  (data file does not exist yet)");
    }
    Ok(())
}
