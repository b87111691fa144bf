//! Content density analysis.
//!
//! Scores how much signal the book carries per unit length and recommends a
//! compression ratio for the chapters pipeline. The sample is drawn from the
//! opening chapter, the middle, and the three-quarter point so the score is
//! not skewed by a strong opening. Failures degrade to fixed defaults.

use serde::Deserialize;
use tracing::{debug, warn};

use pith_core::defaults::{
    DENSITY_DEFAULT_COMPRESSION, DENSITY_DEFAULT_CONTEXT, DENSITY_DEFAULT_SCORE,
    DENSITY_MIN_SAMPLE_CHARS, DENSITY_SAMPLE_TARGET_CHARS,
};
use pith_core::Result;
use pith_inference::{ModelTier, StructuredClient};

use crate::prompts;

/// Analyzer output, after clamping.
#[derive(Debug, Clone)]
pub struct DensityProfile {
    /// 1-10 signal-per-length estimate.
    pub density_score: f32,
    pub characteristics: Vec<String>,
    /// Recommended output/input word ratio in [0.15, 0.60].
    pub recommended_compression: f32,
    /// Recommended context window in words, [100, 350].
    pub recommended_context_size: i32,
    pub analysis_notes: Option<String>,
}

impl DensityProfile {
    fn fallback(reason: &str) -> Self {
        Self {
            density_score: DENSITY_DEFAULT_SCORE,
            characteristics: vec![reason.to_string()],
            recommended_compression: DENSITY_DEFAULT_COMPRESSION,
            recommended_context_size: DENSITY_DEFAULT_CONTEXT,
            analysis_notes: None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct DensityReply {
    density_score: f64,
    #[serde(default)]
    characteristics: Vec<String>,
    recommended_compression: f64,
    recommended_context_size: f64,
    #[serde(default)]
    analysis_notes: Option<String>,
}

/// Build the representative sample: up to 40% of the target from the first
/// chapter, up to 30% from the middle one, the remainder from the chapter at
/// the 75% position.
pub fn build_sample(chapter_texts: &[String]) -> String {
    if chapter_texts.is_empty() {
        return String::new();
    }

    let target = DENSITY_SAMPLE_TARGET_CHARS;
    let mid = chapter_texts.len() / 2;
    let late = (chapter_texts.len() * 3) / 4;

    let mut parts: Vec<&str> = Vec::new();
    let mut used = 0usize;
    for (index, budget) in [
        (0, target * 40 / 100),
        (mid, target * 30 / 100),
        (late, target.saturating_sub(used)),
    ] {
        let budget = budget.min(target - used.min(target));
        if budget == 0 {
            continue;
        }
        let text = chapter_texts[index].as_str();
        let slice = truncate_at_char_boundary(text, budget);
        if !slice.trim().is_empty() {
            used += slice.len();
            parts.push(slice);
        }
    }

    parts.join("\n\n---\n\n")
}

fn truncate_at_char_boundary(text: &str, max_len: usize) -> &str {
    if text.len() <= max_len {
        return text;
    }
    let mut cut = max_len;
    while cut > 0 && !text.is_char_boundary(cut) {
        cut -= 1;
    }
    &text[..cut]
}

/// Clamp the model's recommended ratio into the band its own score implies:
/// 1-3 ⇒ 0.20-0.30, 4-6 ⇒ 0.30-0.40, 7-10 ⇒ 0.40-0.55.
fn clamp_compression(score: f32, recommended: f32) -> f32 {
    let (lo, hi) = if score <= 3.0 {
        (0.20, 0.30)
    } else if score <= 6.0 {
        (0.30, 0.40)
    } else {
        (0.40, 0.55)
    };
    recommended.clamp(lo, hi)
}

/// Analyze density over the given chapter texts.
pub async fn analyze_density(
    llm: &StructuredClient,
    chapter_texts: &[String],
) -> Result<DensityProfile> {
    let sample = build_sample(chapter_texts);
    if sample.len() < DENSITY_MIN_SAMPLE_CHARS {
        debug!(len = sample.len(), "Density sample too small, using defaults");
        return Ok(DensityProfile::fallback("insufficient_sample"));
    }

    let reply = match llm
        .invoke::<DensityReply>(
            &prompts::density_schema(),
            &prompts::density_prompt(&sample),
            ModelTier::Extraction,
            None,
        )
        .await
    {
        Ok(reply) => reply,
        Err(e) => {
            warn!(error = %e, "Density analysis failed, using defaults");
            return Ok(DensityProfile::fallback("analysis_failed"));
        }
    };

    let score = (reply.density_score as f32).clamp(1.0, 10.0);
    Ok(DensityProfile {
        density_score: score,
        characteristics: reply.characteristics,
        recommended_compression: clamp_compression(score, reply.recommended_compression as f32),
        recommended_context_size: (reply.recommended_context_size as i32).clamp(100, 350),
        analysis_notes: reply.analysis_notes,
    })
}
