//! Data models for ReportScout.

mod candidate;
mod pdf_candidate;

pub use candidate::{Candidate, DiscoveryMethod};
pub(crate) use pdf_candidate::sort_ranked;
pub use pdf_candidate::{DocType, PdfCandidate, ScoreBreakdown};
