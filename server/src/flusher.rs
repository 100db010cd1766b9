use std::{sync::Arc, time::Duration};

use anyhow::Context;
use products_hr::Directory;
use tokio::{
    sync::watch,
    task::JoinHandle,
    time::{self, MissedTickBehavior},
};
use tracing::{error, info};

/// Run [`Directory::flush`] on the blocking pool.
pub async fn flush(directory: &Arc<Directory>) -> anyhow::Result<bool> {
    let directory = Arc::clone(directory);
    let flushed = tokio::task::spawn_blocking(move || directory.flush())
        .await
        .context("flush task failed")??;
    Ok(flushed)
}

/// Flush on a fixed period while changes are pending. Errors are logged and
/// retried on the next tick. The task stops when `shutdown` flips or its
/// sender goes away.
pub fn spawn(
    directory: Arc<Directory>,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> Option<JoinHandle<()>> {
    if period.is_zero() {
        info!("periodic flush disabled");
        return None;
    }

    Some(tokio::spawn(async move {
        let mut ticker = time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // the first tick completes immediately
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if !directory.has_unsaved_changes() {
                        continue;
                    }
                    if let Err(err) = flush(&directory).await {
                        error!(error = ?err, "periodic flush failed");
                    }
                }
                _ = shutdown.changed() => break,
            }
        }
    }))
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use platform_db::MemoryStore;
    use products_hr::{Employee, NewEmployee};

    use super::*;

    fn directory(store: &Arc<MemoryStore<Employee>>) -> Arc<Directory> {
        Arc::new(Directory::open(store.clone()).unwrap())
    }

    fn joe() -> NewEmployee {
        NewEmployee {
            id: None,
            full_name: "Joe".into(),
            avatar: None,
            department: "Sales".into(),
            birth_date: NaiveDate::from_ymd_opt(1991, 5, 20).unwrap(),
            salary: 1000.0,
        }
    }

    #[tokio::test]
    async fn zero_period_disables_the_task() {
        let store = Arc::new(MemoryStore::with_records(Vec::new()));
        let (_tx, rx) = watch::channel(false);
        assert!(spawn(directory(&store), Duration::ZERO, rx).is_none());
    }

    #[tokio::test]
    async fn pending_changes_get_flushed() {
        let store = Arc::new(MemoryStore::with_records(Vec::new()));
        let directory = directory(&store);
        let (tx, rx) = watch::channel(false);
        let handle = spawn(directory.clone(), Duration::from_millis(10), rx).unwrap();

        directory.add(joe()).unwrap();
        for _ in 0..200 {
            if !directory.has_unsaved_changes() {
                break;
            }
            time::sleep(Duration::from_millis(10)).await;
        }

        assert!(!directory.has_unsaved_changes());
        assert_eq!(store.persisted().map(|saved| saved.len()), Some(1));

        tx.send(true).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn dropped_sender_stops_the_task() {
        let store = Arc::new(MemoryStore::with_records(Vec::new()));
        let (tx, rx) = watch::channel(false);
        let handle = spawn(directory(&store), Duration::from_secs(3600), rx).unwrap();
        drop(tx);
        time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("flusher should stop")
            .unwrap();
    }

    #[tokio::test]
    async fn failed_flush_is_reported_and_retryable() {
        let store = Arc::new(MemoryStore::with_records(Vec::new()));
        let directory = directory(&store);
        directory.add(joe()).unwrap();

        store.fail_saves(true);
        assert!(flush(&directory).await.is_err());
        assert!(directory.has_unsaved_changes());

        store.fail_saves(false);
        assert!(flush(&directory).await.unwrap());
    }
}
