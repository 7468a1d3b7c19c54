//! Generic approval workflow engine.
//!
//! Document-agnostic: requests reference documents through `DocumentRef`
//! and never inspect document-specific fields.
//!
//! # Modules
//!
//! - `types` - Workflows, steps, requests and history
//! - `error` - Approval error types
//! - `resolver` - Pluggable approver resolution
//! - `engine` - Request creation, decisions, recall and escalation

pub mod engine;
pub mod error;
pub mod resolver;
pub mod types;

#[cfg(test)]
mod engine_props;

pub use engine::{
    ActOutcome, ApprovalEngine, Approvers, Escalation, EscalationKind, NewRequest, Transition,
};
pub use error::ApprovalError;
pub use resolver::{
    ApproverResolver, DirectoryResolver, IdentitySnapshot, Member, ResolutionContext,
};
pub use types::{
    ApprovalAction, ApprovalHistoryEntry, ApprovalRequest, ApprovalSnapshot, ApprovalStatus,
    ApprovalStep, ApprovalWorkflow, ApproverSpec, Delegation, DocumentRef, EscalationAction,
    HistoryAction, RuleType, StepProgress,
};
