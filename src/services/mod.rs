//! Service layer for report discovery.
//!
//! This module contains domain logic separated from UI concerns.
//! Services can be used by the CLI or embedded by other callers.

pub mod escalation;
pub mod pipeline;

pub use escalation::{EscalationError, EscalationResult, EscalationSource, FallbackEscalator};
pub use pipeline::{Pipeline, PipelineError, PipelineOutcome, RunOptions, Verdict};
