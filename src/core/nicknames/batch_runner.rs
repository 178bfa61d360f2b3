// Applies planned nickname changes a few at a time.
//
// Between batches the runner sleeps, honours cancellation, and every few
// batches re-checks that the bot can still manage nicknames. A batch where
// most edits fail stops the run instead of hammering the API.

use super::nickname_models::{
    BatchConfig, BatchProgress, FailedChange, NicknameChange, ReplacementOutcome,
    ReplacementReport,
};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};

/// Port for the platform that actually renames members.
#[async_trait]
pub trait NicknameEditor: Send + Sync {
    /// `None` clears the nickname. The error is a human-readable reason.
    async fn set_nickname(&self, user_id: u64, nickname: Option<&str>) -> Result<(), String>;

    async fn can_manage_nicknames(&self) -> bool;
}

/// Receives progress after each batch.
#[async_trait]
pub trait ProgressReporter: Send + Sync {
    async fn report(&self, progress: &BatchProgress);
}

pub async fn run_batches<E, P>(
    changes: &[NicknameChange],
    editor: &E,
    progress: &P,
    config: &BatchConfig,
    cancel: &AtomicBool,
) -> ReplacementReport
where
    E: NicknameEditor + ?Sized,
    P: ProgressReporter + ?Sized,
{
    let batch_size = config.batch_size.max(1);
    let check_every = config.permission_check_every.max(1);
    let batch_count = changes.len().div_ceil(batch_size);

    let mut outcome = ReplacementOutcome::Completed;
    let mut processed = 0;
    let mut updated = 0;
    let mut failed: Vec<FailedChange> = Vec::new();

    for (index, batch) in changes.chunks(batch_size).enumerate() {
        if index > 0 && !config.batch_delay.is_zero() {
            tokio::time::sleep(config.batch_delay).await;
        }

        if cancel.load(Ordering::SeqCst) {
            outcome = ReplacementOutcome::Cancelled;
            break;
        }

        if index % check_every == 0 && !editor.can_manage_nicknames().await {
            outcome = ReplacementOutcome::PermissionLost;
            break;
        }

        let mut failed_here = 0usize;
        for change in batch {
            match editor.set_nickname(change.user_id, change.after.as_deref()).await {
                Ok(()) => updated += 1,
                Err(reason) => {
                    tracing::debug!(user_id = change.user_id, %reason, "Nickname update failed");
                    failed_here += 1;
                    failed.push(FailedChange {
                        user_id: change.user_id,
                        reason,
                    });
                }
            }
        }
        processed += batch.len();

        progress
            .report(&BatchProgress {
                batch: index + 1,
                batch_count,
                processed,
                total: changes.len(),
                updated,
                failed: failed.len(),
            })
            .await;

        if failed_here as f64 / batch.len() as f64 > config.failure_threshold {
            outcome = ReplacementOutcome::FailureThreshold;
            break;
        }
    }

    ReplacementReport {
        outcome,
        total: changes.len(),
        updated,
        failed,
        skipped: changes.len() - processed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct FakeEditor {
        applied: Mutex<Vec<(u64, Option<String>)>>,
        failing: HashSet<u64>,
        /// Permission checks that succeed before the bot "loses" the role.
        allowed_checks: Option<usize>,
        checks: AtomicUsize,
    }

    #[async_trait]
    impl NicknameEditor for FakeEditor {
        async fn set_nickname(&self, user_id: u64, nickname: Option<&str>) -> Result<(), String> {
            if self.failing.contains(&user_id) {
                return Err("Missing Permissions".to_string());
            }
            self.applied
                .lock()
                .unwrap()
                .push((user_id, nickname.map(str::to_string)));
            Ok(())
        }

        async fn can_manage_nicknames(&self) -> bool {
            let n = self.checks.fetch_add(1, Ordering::SeqCst);
            self.allowed_checks.map_or(true, |allowed| n < allowed)
        }
    }

    /// Records progress and optionally raises the cancel flag after a batch.
    struct Recorder<'a> {
        seen: Mutex<Vec<BatchProgress>>,
        cancel_after: Option<(usize, &'a AtomicBool)>,
    }

    #[async_trait]
    impl ProgressReporter for Recorder<'_> {
        async fn report(&self, progress: &BatchProgress) {
            self.seen.lock().unwrap().push(progress.clone());
            if let Some((batch, flag)) = self.cancel_after {
                if progress.batch == batch {
                    flag.store(true, Ordering::SeqCst);
                }
            }
        }
    }

    fn recorder() -> Recorder<'static> {
        Recorder {
            seen: Mutex::new(Vec::new()),
            cancel_after: None,
        }
    }

    fn changes(n: u64) -> Vec<NicknameChange> {
        (1..=n)
            .map(|id| NicknameChange {
                user_id: id,
                before: format!("[PD] {}", id),
                after: Some(format!("[SO] {}", id)),
            })
            .collect()
    }

    fn config(batch_size: usize) -> BatchConfig {
        BatchConfig {
            batch_size,
            batch_delay: Duration::ZERO,
            permission_check_every: 2,
            failure_threshold: 0.5,
        }
    }

    #[tokio::test]
    async fn test_runs_all_batches() {
        let editor = FakeEditor::default();
        let progress = recorder();
        let cancel = AtomicBool::new(false);

        let report = run_batches(&changes(7), &editor, &progress, &config(3), &cancel).await;

        assert_eq!(report.outcome, ReplacementOutcome::Completed);
        assert_eq!(report.updated, 7);
        assert_eq!(report.skipped, 0);
        assert_eq!(editor.applied.lock().unwrap().len(), 7);

        let seen = progress.seen.lock().unwrap();
        assert_eq!(seen.len(), 3);
        assert_eq!(seen[2].processed, 7);
        assert_eq!(seen[2].batch_count, 3);
        // Checked before batch 1 and batch 3
        assert_eq!(editor.checks.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_cancel_stops_before_next_batch() {
        let editor = FakeEditor::default();
        let cancel = AtomicBool::new(false);
        let progress = Recorder {
            seen: Mutex::new(Vec::new()),
            cancel_after: Some((1, &cancel)),
        };

        let report = run_batches(&changes(6), &editor, &progress, &config(2), &cancel).await;

        assert_eq!(report.outcome, ReplacementOutcome::Cancelled);
        assert_eq!(report.updated, 2);
        assert_eq!(report.skipped, 4);
    }

    #[tokio::test]
    async fn test_permission_loss_stops_run() {
        let editor = FakeEditor {
            allowed_checks: Some(1),
            ..FakeEditor::default()
        };
        let cancel = AtomicBool::new(false);

        let report = run_batches(&changes(10), &editor, &recorder(), &config(2), &cancel).await;

        // Batches 1 and 2 run, the check before batch 3 fails
        assert_eq!(report.outcome, ReplacementOutcome::PermissionLost);
        assert_eq!(report.updated, 4);
        assert_eq!(report.skipped, 6);
    }

    #[tokio::test]
    async fn test_failure_threshold() {
        let editor = FakeEditor {
            failing: [3, 4].into_iter().collect(),
            ..FakeEditor::default()
        };
        let cancel = AtomicBool::new(false);

        let report = run_batches(&changes(8), &editor, &recorder(), &config(2), &cancel).await;

        assert_eq!(report.outcome, ReplacementOutcome::FailureThreshold);
        assert_eq!(report.updated, 2);
        assert_eq!(report.failed.len(), 2);
        assert_eq!(report.failed[0].reason, "Missing Permissions");
        assert_eq!(report.skipped, 4);
    }

    #[tokio::test]
    async fn test_half_failures_is_not_over_threshold() {
        let editor = FakeEditor {
            failing: [1].into_iter().collect(),
            ..FakeEditor::default()
        };
        let cancel = AtomicBool::new(false);

        let report = run_batches(&changes(4), &editor, &recorder(), &config(2), &cancel).await;

        assert_eq!(report.outcome, ReplacementOutcome::Completed);
        assert_eq!(report.updated, 3);
        assert_eq!(report.failed.len(), 1);
    }

    #[tokio::test]
    async fn test_reset_passes_none() {
        let editor = FakeEditor::default();
        let cancel = AtomicBool::new(false);
        let reset = vec![NicknameChange {
            user_id: 9,
            before: "[PD]".to_string(),
            after: None,
        }];

        run_batches(&reset, &editor, &recorder(), &config(5), &cancel).await;

        assert_eq!(editor.applied.lock().unwrap()[0], (9, None));
    }
}
