use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BriefRequirements {
    #[serde(default)]
    pub word_count: Option<u32>,
    #[serde(default)]
    pub required_sections: Vec<String>,
    #[serde(default)]
    pub semantic_keywords: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BriefRecord {
    pub id: String,
    pub client_id: String,
    pub title: String,
    pub target_keyword: String,
    pub status: String,
    pub priority: String,
    pub requirements: BriefRequirements,
    pub approved_at: Option<DateTime<Utc>>,
    pub approved_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewBrief {
    pub client_id: String,
    pub title: String,
    pub target_keyword: String,
    pub priority: String,
    pub requirements: BriefRequirements,
}

/// Fields written on a brief status change. Approval stamps are only
/// present when the brief moves into `approved`.
#[derive(Debug, Clone, PartialEq)]
pub struct BriefStatusUpdate {
    pub status: String,
    pub approved_at: Option<DateTime<Utc>>,
    pub approved_by: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentRecord {
    pub id: String,
    pub brief_id: String,
    pub client_id: String,
    pub body: String,
    pub word_count: u32,
    pub quality_score: Option<f64>,
    pub authority_score: Option<f64>,
    pub readability_score: Option<f64>,
    pub ai_model: Option<String>,
    pub status: String,
    pub reviewer_notes: Option<String>,
    pub revision_requests: Option<Vec<String>>,
    pub human_review_time_minutes: Option<u32>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub approved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct NewContent {
    pub brief_id: String,
    pub client_id: String,
    pub body: String,
    pub quality_score: Option<f64>,
    pub authority_score: Option<f64>,
    pub readability_score: Option<f64>,
    pub ai_model: Option<String>,
    pub status: String,
}

/// Review outcome applied to a content row and mirrored onto its brief.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentReviewUpdate {
    pub status: String,
    pub reviewer_notes: Option<String>,
    /// `None` leaves the stored list untouched.
    pub revision_requests: Option<Vec<String>>,
    pub human_review_time_minutes: Option<u32>,
    pub reviewed_at: DateTime<Utc>,
    pub approved_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientRecord {
    pub id: String,
    pub name: String,
    pub domain: String,
    #[serde(default)]
    pub target_keywords: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompetitorRecord {
    pub id: String,
    pub client_id: String,
    pub name: String,
    pub domain: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Down,
    Unknown,
}

impl HealthStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            HealthStatus::Healthy => "healthy",
            HealthStatus::Degraded => "degraded",
            HealthStatus::Down => "down",
            HealthStatus::Unknown => "unknown",
        }
    }

    pub fn from_status(value: &str) -> Self {
        match value {
            "healthy" => HealthStatus::Healthy,
            "degraded" => HealthStatus::Degraded,
            "down" => HealthStatus::Down,
            _ => HealthStatus::Unknown,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthRecord {
    pub provider: String,
    pub status: HealthStatus,
    pub last_success_at: Option<DateTime<Utc>>,
    pub last_failure_at: Option<DateTime<Utc>>,
    pub error_count: u32,
    pub avg_response_time_ms: Option<f64>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallOutcome {
    Success,
    Failure,
}

/// One provider call attempt, as seen by the health tracker.
#[derive(Debug, Clone, PartialEq)]
pub struct HealthObservation {
    pub provider: String,
    pub outcome: CallOutcome,
    pub response_time_ms: u64,
    pub observed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RequestLogEntry {
    pub client_id: Option<String>,
    pub provider: String,
    pub endpoint: String,
    pub status_code: Option<u32>,
    pub response_time_ms: u64,
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RequestLogRecord {
    pub id: i64,
    pub client_id: Option<String>,
    pub provider: String,
    pub endpoint: String,
    pub status_code: Option<u32>,
    pub response_time_ms: u64,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// OAuth token pair as persisted; both tokens are ciphertext.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredOAuthToken {
    pub provider: String,
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ApiTokenRecord {
    pub id: String,
    pub name: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
}
