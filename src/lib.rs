//! ReportScout - financial report discovery.
//!
//! Locates publicly filed annual, quarterly and interim report PDFs for a
//! company using nothing but its name. Discovery escalates through search,
//! homepage scanning, conventional path probing and sitemap crawling, scores
//! every PDF link it finds, and falls back to a real browser session when no
//! statically discovered document is good enough.

pub mod cache;
pub mod cli;
pub mod config;
pub mod discovery;
pub mod models;
pub mod scrapers;
pub mod services;
pub mod storage;
pub mod utils;

pub use cache::{CandidateCache, JsonFileCache, MemoryCache};
pub use discovery::{DiscoveryConfig, DiscoveryError};
pub use models::{Candidate, DiscoveryMethod, DocType, PdfCandidate};
pub use services::pipeline::{Pipeline, PipelineError, PipelineOutcome};
