use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BriefStatus {
    Draft,
    Approved,
    Generating,
    Generated,
    Reviewing,
    RevisionRequested,
    Published,
}

impl BriefStatus {
    pub const ALL: [BriefStatus; 7] = [
        BriefStatus::Draft,
        BriefStatus::Approved,
        BriefStatus::Generating,
        BriefStatus::Generated,
        BriefStatus::Reviewing,
        BriefStatus::RevisionRequested,
        BriefStatus::Published,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            BriefStatus::Draft => "draft",
            BriefStatus::Approved => "approved",
            BriefStatus::Generating => "generating",
            BriefStatus::Generated => "generated",
            BriefStatus::Reviewing => "reviewing",
            BriefStatus::RevisionRequested => "revision_requested",
            BriefStatus::Published => "published",
        }
    }

    /// Exact, case-sensitive match on the stored spelling.
    pub fn from_status(value: &str) -> Option<Self> {
        match value {
            "draft" => Some(BriefStatus::Draft),
            "approved" => Some(BriefStatus::Approved),
            "generating" => Some(BriefStatus::Generating),
            "generated" => Some(BriefStatus::Generated),
            "reviewing" => Some(BriefStatus::Reviewing),
            "revision_requested" => Some(BriefStatus::RevisionRequested),
            "published" => Some(BriefStatus::Published),
            _ => None,
        }
    }

    pub fn allowed_next(self) -> &'static [BriefStatus] {
        match self {
            BriefStatus::Draft => &[BriefStatus::Approved],
            BriefStatus::Approved => &[BriefStatus::Generating],
            BriefStatus::Generating => &[BriefStatus::Generated],
            BriefStatus::Generated => &[BriefStatus::Reviewing],
            BriefStatus::Reviewing => &[BriefStatus::Published, BriefStatus::RevisionRequested],
            BriefStatus::RevisionRequested => &[BriefStatus::Draft, BriefStatus::Approved],
            BriefStatus::Published => &[],
        }
    }
}

impl std::fmt::Display for BriefStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a brief may move from `from` to `to`. Anything that is not an
/// exact status spelling is rejected.
pub fn can_transition(from: &str, to: &str) -> bool {
    match (BriefStatus::from_status(from), BriefStatus::from_status(to)) {
        (Some(from), Some(to)) => from.allowed_next().contains(&to),
        _ => false,
    }
}
