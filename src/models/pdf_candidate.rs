//! Scored PDF document links.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Per-signal score contributions, keyed by signal name.
pub type ScoreBreakdown = BTreeMap<String, f64>;

/// Inferred kind of financial report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocType {
    Annual,
    Quarterly,
    Half,
    Interim,
    #[default]
    Unknown,
}

impl DocType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Annual => "annual",
            Self::Quarterly => "quarterly",
            Self::Half => "half",
            Self::Interim => "interim",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for DocType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A PDF link found on a candidate page, with its heuristic score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PdfCandidate {
    /// Sum of signal contributions, capped at 1.0.
    pub score: f64,
    pub score_breakdown: ScoreBreakdown,
    pub doc_type: DocType,
    pub fiscal_year: Option<i32>,
    pub anchor_text: String,
    pub pdf_url: String,
    /// URL after following redirects on the existence check.
    pub resolved_url: String,
    pub content_length: Option<u64>,
    /// Whether the existence check confirmed a PDF response.
    pub head_confirmed_pdf: bool,
}

impl PdfCandidate {
    /// Whether this document clears the static acceptance bar.
    ///
    /// A document is accepted when its score reaches `threshold` and either
    /// the existence check confirmed a PDF or the advertised size is at
    /// least `min_bytes`.
    pub fn is_acceptable(&self, threshold: f64, min_bytes: u64) -> bool {
        self.score >= threshold
            && (self.head_confirmed_pdf || self.content_length.is_some_and(|len| len >= min_bytes))
    }

    /// Ranking order: score descending, then fiscal year descending.
    pub fn rank_cmp(&self, other: &Self) -> Ordering {
        other
            .score
            .total_cmp(&self.score)
            .then_with(|| other.fiscal_year.unwrap_or(0).cmp(&self.fiscal_year.unwrap_or(0)))
    }
}

/// Sort PDFs best first.
pub(crate) fn sort_ranked(pdfs: &mut [PdfCandidate]) {
    pdfs.sort_by(PdfCandidate::rank_cmp);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pdf(score: f64, year: Option<i32>) -> PdfCandidate {
        PdfCandidate {
            score,
            score_breakdown: ScoreBreakdown::new(),
            doc_type: DocType::Unknown,
            fiscal_year: year,
            anchor_text: String::new(),
            pdf_url: format!("https://a.example/{score}-{year:?}.pdf"),
            resolved_url: String::new(),
            content_length: None,
            head_confirmed_pdf: false,
        }
    }

    #[test]
    fn test_rank_by_score_then_year() {
        let mut pdfs = vec![pdf(0.5, Some(2021)), pdf(0.9, None), pdf(0.5, Some(2023))];
        sort_ranked(&mut pdfs);
        assert_eq!(pdfs[0].score, 0.9);
        assert_eq!(pdfs[1].fiscal_year, Some(2023));
        assert_eq!(pdfs[2].fiscal_year, Some(2021));
    }

    #[test]
    fn test_acceptance_requires_score_and_validity() {
        let mut p = pdf(0.7, None);
        assert!(!p.is_acceptable(0.6, 2048));

        p.content_length = Some(1000);
        assert!(!p.is_acceptable(0.6, 2048));

        p.content_length = Some(4096);
        assert!(p.is_acceptable(0.6, 2048));

        p.content_length = None;
        p.head_confirmed_pdf = true;
        assert!(p.is_acceptable(0.6, 2048));

        p.score = 0.59;
        assert!(!p.is_acceptable(0.6, 2048));
    }

    #[test]
    fn test_doc_type_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&DocType::Half).unwrap(), "\"half\"");
        assert_eq!(DocType::default(), DocType::Unknown);
    }
}
