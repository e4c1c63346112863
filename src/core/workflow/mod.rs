//! Brief and content workflow.

mod engine;
mod status;

pub use engine::{BriefTransition, ReviewAction, ReviewSubmission, WorkflowEngine};
pub use status::{BriefStatus, can_transition};
