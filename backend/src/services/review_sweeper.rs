//! Review-window sweeper.
//!
//! Closes community review for every artifact whose deadline has passed and
//! moves it to EXPERT_REVIEW or REJECTED based on the vote tally. Each
//! artifact is evaluated in its own transaction; a failure on one is logged
//! and counted without stopping the rest of the sweep.

use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

use crate::clock::Clock;
use crate::config::ReviewPolicy;
use crate::error::Result;
use crate::models::artifact::{ArtifactStatus, CommunityVerdict, LifecycleTrigger};
use crate::models::user::SystemPrincipal;
use crate::models::vote::VoteTally;
use crate::services::lifecycle_service;
use crate::services::vote_service::round_ratio;
use crate::store::ReviewStore;

/// The community's verdict plus a human-readable reason.
#[derive(Debug, Clone, PartialEq)]
pub struct SweepDecision {
    pub verdict: CommunityVerdict,
    pub reason: String,
}

fn percent(ratio: f64) -> i64 {
    (ratio * 100.0).round() as i64
}

/// Decide the outcome of a closed review window.
///
/// Too few votes or a tie rejects. Otherwise the artifact advances when the
/// approval ratio meets the policy threshold.
pub fn decide(tally: VoteTally, policy: &ReviewPolicy) -> SweepDecision {
    let total = tally.total();
    if total < policy.min_votes {
        return SweepDecision {
            verdict: CommunityVerdict::Reject,
            reason: format!("Insufficient votes: {}/{} minimum", total, policy.min_votes),
        };
    }

    let ratio = tally.ratio();
    if tally.approve > tally.reject && ratio >= policy.approve_ratio {
        SweepDecision {
            verdict: CommunityVerdict::Advance,
            reason: format!(
                "Approved by community: {}/{} ({}%) meets {}% threshold",
                tally.approve,
                total,
                percent(ratio),
                percent(policy.approve_ratio)
            ),
        }
    } else {
        SweepDecision {
            verdict: CommunityVerdict::Reject,
            reason: format!(
                "Rejected by community: {}/{} ({}%) below {}% threshold",
                tally.approve,
                total,
                percent(ratio),
                percent(policy.approve_ratio)
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepOutcome {
    Advanced,
    Rejected,
    /// No longer applicable when re-checked under lock
    Skipped,
}

/// Counters for one sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub evaluated: usize,
    pub advanced: usize,
    pub rejected: usize,
    pub skipped: usize,
    pub failed: usize,
}

pub struct ReviewSweeper {
    store: Arc<dyn ReviewStore>,
    clock: Arc<dyn Clock>,
    policy: ReviewPolicy,
    system: SystemPrincipal,
}

impl ReviewSweeper {
    pub fn new(
        store: Arc<dyn ReviewStore>,
        clock: Arc<dyn Clock>,
        policy: ReviewPolicy,
        system: SystemPrincipal,
    ) -> Self {
        Self {
            store,
            clock,
            policy,
            system,
        }
    }

    /// Evaluate every artifact whose review window has closed.
    pub async fn sweep(&self) -> Result<SweepReport> {
        let now = self.clock.now();
        let due = self.store.expired_reviews(now).await?;
        let mut report = SweepReport::default();

        for artifact_id in due {
            report.evaluated += 1;
            match self.evaluate(artifact_id).await {
                Ok(SweepOutcome::Advanced) => report.advanced += 1,
                Ok(SweepOutcome::Rejected) => report.rejected += 1,
                Ok(SweepOutcome::Skipped) => report.skipped += 1,
                Err(e) => {
                    report.failed += 1;
                    tracing::error!(
                        artifact_id = %artifact_id,
                        error = %e,
                        "Failed to close review window"
                    );
                }
            }
        }

        if report.evaluated > 0 {
            tracing::info!(
                evaluated = report.evaluated,
                advanced = report.advanced,
                rejected = report.rejected,
                skipped = report.skipped,
                failed = report.failed,
                "Review sweep complete"
            );
        }
        Ok(report)
    }

    /// Close the review window of one artifact if it is still due.
    pub async fn evaluate(&self, artifact_id: Uuid) -> Result<SweepOutcome> {
        let now = self.clock.now();
        let mut tx = self.store.begin().await?;
        let mut artifact = match tx.lock_artifact(artifact_id).await? {
            Some(a) => a,
            None => return Ok(SweepOutcome::Skipped),
        };

        let due = artifact.status == ArtifactStatus::CommunityReview
            && artifact.review_ends_at.map(|ends| ends <= now).unwrap_or(false);
        if !due {
            return Ok(SweepOutcome::Skipped);
        }

        let tally = tx.vote_tally(artifact_id).await?;
        let decision = decide(tally, &self.policy);
        let details = json!({
            "reason": decision.reason,
            "votes": {
                "approve": tally.approve,
                "reject": tally.reject,
                "total": tally.total(),
            },
            "ratio": round_ratio(tally.ratio()),
            "minVotes": self.policy.min_votes,
            "approveRatio": self.policy.approve_ratio,
        });

        lifecycle_service::apply(
            tx.as_mut(),
            &mut artifact,
            LifecycleTrigger::ReviewWindowClosed(decision.verdict),
            self.system.user_id(),
            details,
            now,
        )
        .await?;
        tx.commit().await?;

        Ok(match decision.verdict {
            CommunityVerdict::Advance => SweepOutcome::Advanced,
            CommunityVerdict::Reject => SweepOutcome::Rejected,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tally(approve: i64, reject: i64) -> VoteTally {
        VoteTally { approve, reject }
    }

    #[test]
    fn test_unanimous_quorum_advances() {
        let d = decide(tally(3, 0), &ReviewPolicy::default());
        assert_eq!(d.verdict, CommunityVerdict::Advance);
        assert_eq!(d.reason, "Approved by community: 3/3 (100%) meets 60% threshold");
    }

    #[test]
    fn test_minority_approval_rejects() {
        let d = decide(tally(1, 2), &ReviewPolicy::default());
        assert_eq!(d.verdict, CommunityVerdict::Reject);
        assert!(d.reason.starts_with("Rejected by community: 1/3"));
    }

    #[test]
    fn test_below_quorum_rejects() {
        let d = decide(tally(2, 0), &ReviewPolicy::default());
        assert_eq!(d.verdict, CommunityVerdict::Reject);
        assert_eq!(d.reason, "Insufficient votes: 2/3 minimum");
    }

    #[test]
    fn test_exact_threshold_advances() {
        let d = decide(tally(3, 2), &ReviewPolicy::default());
        assert_eq!(d.verdict, CommunityVerdict::Advance);
    }

    #[test]
    fn test_tie_rejects_even_with_low_threshold() {
        let policy = ReviewPolicy {
            approve_ratio: 0.5,
            ..ReviewPolicy::default()
        };
        assert_eq!(decide(tally(2, 2), &policy).verdict, CommunityVerdict::Reject);
    }
}
