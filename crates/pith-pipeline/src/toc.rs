//! Table-of-contents detection.
//!
//! One extraction-tier structured call over the first pages of the book.
//! A detection failure is never fatal: the chapter extractor falls back to
//! regex headings and then artificial segmentation.

use serde::Deserialize;
use tracing::{debug, warn};

use pith_core::defaults::{TOC_MIN_INPUT_CHARS, TOC_SCAN_PAGES};
use pith_core::Result;
use pith_inference::{ModelTier, StructuredClient};

use crate::prompts;

/// Detector confidence in its own reading of the front matter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TocConfidence {
    High,
    Medium,
    Low,
}

/// One table-of-contents entry.
#[derive(Debug, Clone, Deserialize)]
pub struct TocEntry {
    pub title: String,
    pub normalized_title: String,
    #[serde(default)]
    pub page_number: Option<i64>,
    pub level: i64,
}

impl TocEntry {
    /// The title used for matching back into body text.
    pub fn match_title(&self) -> &str {
        if self.normalized_title.trim().is_empty() {
            &self.title
        } else {
            &self.normalized_title
        }
    }
}

/// Result of TOC detection.
#[derive(Debug, Clone, Deserialize)]
pub struct TocOutcome {
    pub has_toc: bool,
    #[serde(default)]
    pub entries: Vec<TocEntry>,
    #[serde(default)]
    pub toc_start_page: Option<i64>,
    #[serde(default)]
    pub toc_end_page: Option<i64>,
    pub confidence: TocConfidence,
}

impl TocOutcome {
    /// The not-detected outcome used for short inputs and failed calls.
    pub fn absent() -> Self {
        Self {
            has_toc: false,
            entries: Vec::new(),
            toc_start_page: None,
            toc_end_page: None,
            confidence: TocConfidence::Low,
        }
    }

    /// Strong reliability signal: a real table with chapter-level structure.
    pub fn is_reliable(&self) -> bool {
        self.has_toc
            && self.entries.len() >= 3
            && self.confidence != TocConfidence::Low
            && self.entries.iter().filter(|e| e.level == 2).count() >= 2
    }

    /// Weaker bar for attempting TOC-guided extraction at all; the match
    /// rate check afterwards decides whether to keep the result.
    pub fn is_usable(&self) -> bool {
        self.has_toc && !self.entries.is_empty() && self.confidence != TocConfidence::Low
    }
}

/// Detect a table of contents over the first `TOC_SCAN_PAGES` pages.
pub async fn detect_toc(llm: &StructuredClient, pages: &[String]) -> Result<TocOutcome> {
    let front: Vec<&str> = pages
        .iter()
        .take(TOC_SCAN_PAGES)
        .map(|p| p.as_str())
        .collect();
    let text = front.join("\n\n[PAGE BREAK]\n\n");

    if text.len() < TOC_MIN_INPUT_CHARS {
        debug!(len = text.len(), "Front matter too short, skipping TOC call");
        return Ok(TocOutcome::absent());
    }

    match llm
        .invoke::<TocOutcome>(
            &prompts::toc_schema(),
            &prompts::toc_prompt(&text),
            ModelTier::Extraction,
            None,
        )
        .await
    {
        Ok(outcome) => {
            debug!(
                has_toc = outcome.has_toc,
                entries = outcome.entries.len(),
                "TOC detection complete"
            );
            Ok(outcome)
        }
        Err(e) => {
            warn!(error = %e, "TOC detection failed, treating as absent");
            Ok(TocOutcome::absent())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pith_inference::{MockChatBackend, TierConfig};
    use std::sync::Arc;

    fn client(backend: MockChatBackend) -> StructuredClient {
        StructuredClient::new(Arc::new(backend), TierConfig::default())
    }

    fn entry(title: &str, level: i64) -> TocEntry {
        TocEntry {
            title: title.to_string(),
            normalized_title: title.to_lowercase(),
            page_number: None,
            level,
        }
    }

    #[test]
    fn reliability_requires_three_entries_and_two_chapters() {
        let mut outcome = TocOutcome {
            has_toc: true,
            entries: vec![entry("Part One", 1), entry("Alpha", 2), entry("Beta", 2)],
            toc_start_page: Some(1),
            toc_end_page: Some(2),
            confidence: TocConfidence::High,
        };
        assert!(outcome.is_reliable());

        outcome.entries.pop();
        assert!(!outcome.is_reliable());
        assert!(outcome.is_usable());

        outcome.confidence = TocConfidence::Low;
        assert!(!outcome.is_usable());
    }

    #[tokio::test]
    async fn short_input_skips_the_call() {
        let backend = MockChatBackend::new();
        let llm = client(backend.clone());
        let outcome = detect_toc(&llm, &["tiny".to_string()]).await.unwrap();
        assert!(!outcome.has_toc);
        assert_eq!(outcome.confidence, TocConfidence::Low);
        assert_eq!(backend.call_count(), 0);
    }

    #[tokio::test]
    async fn parses_detector_reply() {
        let reply = r#"{
            "has_toc": true,
            "entries": [
                {"title": "Chapter 1: Alpha", "normalized_title": "Alpha", "page_number": "5", "level": 2},
                {"title": "Chapter 2: Beta", "normalized_title": "Beta", "level": 2}
            ],
            "toc_start_page": 1,
            "confidence": "High"
        }"#;
        let backend = MockChatBackend::new().with_default_response(reply);
        let llm = client(backend);

        let pages = vec!["x".repeat(300)];
        let outcome = detect_toc(&llm, &pages).await.unwrap();
        assert!(outcome.has_toc);
        assert_eq!(outcome.entries.len(), 2);
        // "5" was coerced to an integer, "High" to the lowercase enum.
        assert_eq!(outcome.entries[0].page_number, Some(5));
        assert_eq!(outcome.confidence, TocConfidence::High);
        assert!(outcome.is_usable());
    }

    #[tokio::test]
    async fn call_failure_degrades_to_absent() {
        let backend = MockChatBackend::new().with_default_failures(1);
        let llm = client(backend);
        let pages = vec!["x".repeat(300)];
        let outcome = detect_toc(&llm, &pages).await.unwrap();
        assert!(!outcome.has_toc);
    }
}
