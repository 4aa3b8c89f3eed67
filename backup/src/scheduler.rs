//! The backup scheduler (§4.9): a cooperatively scheduled ticker that
//! invokes `CreateBackup(nil)` at a configured interval. The cron-like
//! schedule string the source parses is treated as opaque here; callers
//! resolve it to a `Duration` themselves (§9 open question: "the cron-like
//! scheduler parser is stubbed").
use std::time::Duration;

use fleetwright_types::Event;
use tokio_util::sync::CancellationToken;

use crate::manager::BackupManager;

pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

/// Runs until `cancel` fires, invoking a full backup of every component on
/// each tick. Failures are logged, never propagated, so one bad tick never
/// stops the schedule.
pub async fn run_scheduler(manager: &BackupManager, interval: Duration, cancel: CancellationToken) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = ticker.tick() => {
                if let Err(e) = manager.create_backup(None).await {
                    tracing::warn!(error = %e, "scheduled backup failed");
                    if let Some(events) = manager.events() {
                        events.emit(Event::new("scheduled_backup_failed", "backup").with("error", e.to_string()));
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::BackupComponent;
    use crate::fake::{FakeComponent, FakeStorage};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn scheduler_runs_a_backup_on_every_tick_until_cancelled() {
        let storage = Arc::new(FakeStorage::new());
        let components: Vec<Arc<dyn BackupComponent>> = vec![Arc::new(FakeComponent::new("etcd", b"x".to_vec()))];
        let manager = BackupManager::new(components, storage, None, None);
        let cancel = CancellationToken::new();

        let canceller = async {
            tokio::time::sleep(Duration::from_millis(35)).await;
            cancel.cancel();
        };
        tokio::join!(run_scheduler(&manager, Duration::from_millis(10), cancel.clone()), canceller);

        let count = manager.backups().await.len();
        assert!((1..=4).contains(&count), "expected a few ticks to have fired, got {count}");
    }
}
