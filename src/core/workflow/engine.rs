use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use super::status::{BriefStatus, can_transition};
use crate::core::cache::{CacheGateway, keys};
use crate::core::errors::CoreError;
use crate::core::store::{BriefStatusUpdate, BriefStore, ContentRecord, ContentReviewUpdate};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewAction {
    Approve,
    Revision,
}

impl ReviewAction {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "approve" => Some(ReviewAction::Approve),
            "revision" => Some(ReviewAction::Revision),
            _ => None,
        }
    }

    fn resulting_status(self) -> BriefStatus {
        match self {
            ReviewAction::Approve => BriefStatus::Published,
            ReviewAction::Revision => BriefStatus::RevisionRequested,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ReviewSubmission {
    pub content_id: String,
    pub action: ReviewAction,
    #[serde(default)]
    pub reviewer_notes: Option<String>,
    #[serde(default)]
    pub revision_requests: Option<Vec<String>>,
    #[serde(default)]
    pub review_time_minutes: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BriefTransition {
    pub brief_id: String,
    pub from: String,
    pub to: String,
    pub approved_at: Option<DateTime<Utc>>,
    pub approved_by: Option<String>,
}

/// Applies brief status changes and review outcomes, and keeps the cached
/// workflow listings from going stale.
#[derive(Clone)]
pub struct WorkflowEngine {
    briefs: Arc<dyn BriefStore>,
    cache: CacheGateway,
}

impl WorkflowEngine {
    pub fn new(briefs: Arc<dyn BriefStore>, cache: CacheGateway) -> Self {
        Self { briefs, cache }
    }

    /// Moves a brief to `new_status`. `known_current` skips the read when the
    /// caller already holds the brief. Entering `approved` with an actor
    /// stamps `approved_at` and `approved_by`.
    pub async fn transition_brief_status(
        &self,
        brief_id: &str,
        new_status: &str,
        actor_id: Option<&str>,
        known_current: Option<&str>,
    ) -> Result<BriefTransition, CoreError> {
        let current = match known_current {
            Some(status) => status.to_string(),
            None => {
                self.briefs
                    .get_brief(brief_id)
                    .await?
                    .ok_or_else(|| CoreError::not_found("brief", brief_id))?
                    .status
            }
        };

        if !can_transition(&current, new_status) {
            return Err(CoreError::InvalidTransition {
                from: current,
                to: new_status.to_string(),
            });
        }

        let mut update = BriefStatusUpdate {
            status: new_status.to_string(),
            approved_at: None,
            approved_by: None,
        };
        if new_status == BriefStatus::Approved.as_str()
            && let Some(actor) = actor_id
        {
            update.approved_at = Some(Utc::now());
            update.approved_by = Some(actor.to_string());
        }

        self.briefs.update_brief_status(brief_id, &update).await?;
        self.cache.invalidate(keys::WORKFLOW_INVALIDATION).await;
        info!("Brief {} moved {} -> {}", brief_id, current, new_status);

        Ok(BriefTransition {
            brief_id: brief_id.to_string(),
            from: current,
            to: update.status,
            approved_at: update.approved_at,
            approved_by: update.approved_by,
        })
    }

    /// Records a review on a content row and mirrors the resulting status
    /// onto the parent brief in a single store transaction.
    pub async fn submit_review(
        &self,
        submission: ReviewSubmission,
    ) -> Result<ContentRecord, CoreError> {
        let content = self
            .briefs
            .get_content(&submission.content_id)
            .await?
            .ok_or_else(|| CoreError::not_found("content", submission.content_id.as_str()))?;

        let now = Utc::now();
        let status = submission.action.resulting_status();
        let update = ContentReviewUpdate {
            status: status.as_str().to_string(),
            reviewer_notes: submission.reviewer_notes,
            revision_requests: match submission.action {
                ReviewAction::Revision => Some(submission.revision_requests.unwrap_or_default()),
                ReviewAction::Approve => None,
            },
            human_review_time_minutes: submission.review_time_minutes,
            reviewed_at: now,
            approved_at: match submission.action {
                ReviewAction::Approve => Some(now),
                ReviewAction::Revision => None,
            },
        };

        let updated = self
            .briefs
            .apply_review(&content.id, &content.brief_id, &update)
            .await?;
        self.cache.invalidate(keys::WORKFLOW_INVALIDATION).await;
        info!(
            "Content {} reviewed ({}), brief {} now {}",
            content.id,
            match submission.action {
                ReviewAction::Approve => "approve",
                ReviewAction::Revision => "revision",
            },
            content.brief_id,
            status
        );
        Ok(updated)
    }
}
