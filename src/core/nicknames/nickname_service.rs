use super::batch_runner::{run_batches, NicknameEditor, ProgressReporter};
use super::nickname_models::{
    BatchConfig, MemberNickname, NicknameError, ReplacementMode, ReplacementPlan,
    ReplacementReport,
};
use super::nickname_planner::plan_replacement;
use super::operation_guard::{OperationGuard, OperationTicket};
use std::time::Duration;

/// How long a run may hold a guild before another run can take over.
pub const OPERATION_TTL: Duration = Duration::from_secs(30 * 60);

pub struct NicknameService {
    guard: OperationGuard,
    config: BatchConfig,
}

impl NicknameService {
    pub fn new(config: BatchConfig) -> Self {
        Self {
            guard: OperationGuard::new(OPERATION_TTL),
            config,
        }
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    pub fn plan(
        &self,
        members: &[MemberNickname],
        pattern: &str,
        replacement: &str,
        mode: ReplacementMode,
    ) -> Result<ReplacementPlan, NicknameError> {
        plan_replacement(members, pattern, replacement, mode)
    }

    /// Claim the guild before fetching members so two runs can't overlap.
    pub fn begin(&self, guild_id: u64) -> Result<OperationTicket, NicknameError> {
        self.guard.try_begin(guild_id)
    }

    pub fn cancel(&self, guild_id: u64) -> bool {
        self.guard.cancel(guild_id)
    }

    /// Apply `plan`. The ticket is consumed so the slot frees when the run ends.
    pub async fn apply<E, P>(
        &self,
        ticket: OperationTicket,
        plan: &ReplacementPlan,
        editor: &E,
        progress: &P,
    ) -> ReplacementReport
    where
        E: NicknameEditor + ?Sized,
        P: ProgressReporter + ?Sized,
    {
        let guild_id = ticket.guild_id();
        tracing::info!(guild_id, changes = plan.changes.len(), "Nickname replacement started");

        let report = run_batches(
            &plan.changes,
            editor,
            progress,
            &self.config,
            ticket.cancel_flag(),
        )
        .await;

        tracing::info!(
            guild_id,
            outcome = %report.outcome,
            updated = report.updated,
            failed = report.failed.len(),
            skipped = report.skipped,
            "Nickname replacement finished"
        );
        report
    }
}
