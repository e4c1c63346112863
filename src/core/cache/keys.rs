//! Cache key catalogue for the workflow read models.

use std::time::Duration;

pub const PIPELINE_STATS: &str = "pipeline:stats";
pub const ALL_BRIEFS: &str = "briefs:all";
pub const CONTENT_QUEUE: &str = "content:queue";

pub const CLIENT_BRIEFS_TTL: Duration = Duration::from_secs(5 * 60);

/// Every key a brief or content status change makes stale.
pub const WORKFLOW_INVALIDATION: &[&str] = &[
    PIPELINE_STATS,
    "pipeline:stats:*",
    ALL_BRIEFS,
    "briefs:all:*",
    CONTENT_QUEUE,
    "content:queue:*",
];

pub fn client_briefs(client_id: &str) -> String {
    format!("{}:{}", ALL_BRIEFS, client_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_scoped_keys_fall_under_the_invalidation_patterns() {
        let key = client_briefs("acme");
        assert_eq!(key, "briefs:all:acme");
        assert!(WORKFLOW_INVALIDATION.contains(&"briefs:all:*"));
    }
}
