//! Configuration types for the discovery system.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Every tunable of the discovery and escalation pipeline.
///
/// Built once (defaults overlaid by the config file) and passed by value to
/// the components that need it; nothing reads global state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Terms that mark investor-relations content in URLs and link text.
    pub ir_keywords: Vec<String>,

    /// Conventional investor-relations sub-paths probed under the domain root.
    pub probe_paths: Vec<String>,

    /// Sitemap locations tried after any `robots.txt` directives.
    pub sitemap_paths: Vec<String>,

    /// Case-insensitive pattern recognizing report names in anchors and filenames.
    pub report_keywords: String,

    /// Visible text of consent-dialog controls.
    pub consent_keywords: Vec<String>,

    /// Case-insensitive pattern recognizing download controls worth clicking.
    pub button_keywords: String,

    /// Minimum PDF score for the static result to be accepted.
    pub pdf_score_threshold: f64,

    /// Minimum advertised size for an unconfirmed PDF to count as valid.
    pub min_pdf_bytes: u64,

    /// Cache freshness window.
    pub ttl_days: i64,

    /// Number of top candidates handed to the browser fallback.
    pub escalation_candidates: usize,

    /// Minimum delay between two requests to the same host.
    pub request_delay_ms: u64,

    /// Maximum search results considered.
    pub max_search_results: usize,

    /// User agent sent on every static request.
    pub user_agent: String,

    pub timeouts: TimeoutConfig,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            ir_keywords: default_ir_keywords(),
            probe_paths: default_probe_paths(),
            sitemap_paths: vec!["/sitemap.xml".into(), "/sitemap_index.xml".into()],
            report_keywords: default_report_keywords(),
            consent_keywords: ["accept", "agree", "allow", "consent", "ok"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            button_keywords: default_button_keywords(),
            pdf_score_threshold: 0.60,
            min_pdf_bytes: 2048,
            ttl_days: 7,
            escalation_candidates: 2,
            request_delay_ms: 500,
            max_search_results: 6,
            user_agent: default_user_agent(),
            timeouts: TimeoutConfig::default(),
        }
    }
}

impl DiscoveryConfig {
    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }

    /// Freshness window as a chrono duration, `None` when `ttl_days` is out of range.
    pub fn ttl(&self) -> Option<chrono::Duration> {
        chrono::Duration::try_days(self.ttl_days)
    }
}

/// Per-call-class network timeouts, in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    pub search_secs: u64,
    pub page_secs: u64,
    pub head_secs: u64,
    pub probe_head_secs: u64,
    pub probe_get_secs: u64,
    pub sitemap_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            search_secs: 12,
            page_secs: 12,
            head_secs: 10,
            probe_head_secs: 8,
            probe_get_secs: 10,
            sitemap_secs: 8,
        }
    }
}

impl TimeoutConfig {
    pub fn search(&self) -> Duration {
        Duration::from_secs(self.search_secs)
    }

    pub fn page(&self) -> Duration {
        Duration::from_secs(self.page_secs)
    }

    pub fn head(&self) -> Duration {
        Duration::from_secs(self.head_secs)
    }

    pub fn probe_head(&self) -> Duration {
        Duration::from_secs(self.probe_head_secs)
    }

    pub fn probe_get(&self) -> Duration {
        Duration::from_secs(self.probe_get_secs)
    }

    pub fn sitemap(&self) -> Duration {
        Duration::from_secs(self.sitemap_secs)
    }
}

fn default_ir_keywords() -> Vec<String> {
    [
        "investor",
        "investors",
        "investor-relations",
        "investor_relations",
        "investorrelations",
        "financials",
        "reports",
        "annual",
        "ir",
        "sec",
        "edgar",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_probe_paths() -> Vec<String> {
    [
        "/investors",
        "/investor",
        "/investor-relations",
        "/investor-relations/financials",
        "/investors/reports",
        "/investors/financials",
        "/reports",
        "/financials",
        "/ir",
        "/about/investors",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_report_keywords() -> String {
    r"(10[- ]?k|10[- ]?q|annual|quarter|q[1-4]|fy|half|interim|report)".to_string()
}

fn default_button_keywords() -> String {
    r"(10[- ]?k|10[- ]?q|annual|quarter|q[1-4]|fy|report|download)".to_string()
}

pub fn default_user_agent() -> String {
    format!("ReportScout/{}", env!("CARGO_PKG_VERSION"))
}
