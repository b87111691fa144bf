//! Structured-call client.
//!
//! Wraps a `ChatBackend` with the contract every pipeline stage relies on:
//! append a deterministic shape hint, call the tier's model, pull the first
//! JSON value out of the reply, coerce, validate, and retry coercion once in
//! enum-fuzzy mode before giving up with the raw reply attached.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use tracing::{debug, trace};

use pith_core::defaults::SIGNAL_EXTRACTION_SYSTEM;
use pith_core::{ChatBackend, Error, Result};

use crate::coerce::{coerce, validate, CoercionMode};
use crate::schema::Schema;
use crate::tiers::{ModelTier, TierConfig};

/// Client for structured and text LLM calls.
#[derive(Clone)]
pub struct StructuredClient {
    backend: Arc<dyn ChatBackend>,
    tiers: TierConfig,
}

impl StructuredClient {
    pub fn new(backend: Arc<dyn ChatBackend>, tiers: TierConfig) -> Self {
        Self { backend, tiers }
    }

    /// The backend, for health probes.
    pub fn backend(&self) -> &Arc<dyn ChatBackend> {
        &self.backend
    }

    /// Invoke a structured call and deserialize the validated value.
    pub async fn invoke<T: DeserializeOwned>(
        &self,
        schema: &Schema,
        prompt: &str,
        tier: ModelTier,
        system: Option<&str>,
    ) -> Result<T> {
        let value = self.invoke_value(schema, prompt, tier, system).await?;
        serde_json::from_value(value.clone()).map_err(|e| Error::SchemaValidation {
            reason: e.to_string(),
            raw: value.to_string(),
        })
    }

    /// Invoke a structured call, returning the validated JSON value.
    pub async fn invoke_value(
        &self,
        schema: &Schema,
        prompt: &str,
        tier: ModelTier,
        system: Option<&str>,
    ) -> Result<JsonValue> {
        let model = self.tiers.model_for(tier);
        let system = system.unwrap_or(SIGNAL_EXTRACTION_SYSTEM);
        let full_prompt = format!("{}\n\n{}", prompt, schema.render_directive());

        debug!(model, tier = %tier, prompt_len = full_prompt.len(), "Structured call");
        let reply = self.backend.chat(model, system, &full_prompt).await?;
        trace!(response_len = reply.len(), "Structured reply");

        let json_text = extract_json(&reply).ok_or_else(|| Error::SchemaValidation {
            reason: "no JSON value found in reply".to_string(),
            raw: reply.clone(),
        })?;

        let parsed: JsonValue =
            serde_json::from_str(json_text).map_err(|e| Error::SchemaValidation {
                reason: format!("invalid JSON: {}", e),
                raw: reply.clone(),
            })?;

        let coerced = coerce(&parsed, &schema.root, CoercionMode::Strict);
        match validate(&coerced, &schema.root) {
            Ok(()) => Ok(coerced),
            Err(first_reason) => {
                debug!(reason = %first_reason, "Validation failed, retrying with fuzzy enums");
                let retried = coerce(&parsed, &schema.root, CoercionMode::FuzzyEnums);
                validate(&retried, &schema.root).map_err(|reason| Error::SchemaValidation {
                    reason,
                    raw: reply.clone(),
                })?;
                Ok(retried)
            }
        }
    }

    /// Text-only variant: returns the model reply verbatim.
    pub async fn invoke_text(
        &self,
        prompt: &str,
        tier: ModelTier,
        system: Option<&str>,
    ) -> Result<String> {
        let model = self.tiers.model_for(tier);
        let system = system.unwrap_or(SIGNAL_EXTRACTION_SYSTEM);
        debug!(model, tier = %tier, prompt_len = prompt.len(), "Text call");
        self.backend.chat(model, system, prompt).await
    }
}

/// Extract the first JSON object or array from a reply, stripping
/// triple-backtick fences if present.
pub fn extract_json(reply: &str) -> Option<&str> {
    let body = strip_fences(reply);

    let start = body.find(['{', '['])?;
    let bytes = body.as_bytes();
    let open = bytes[start];
    let close = if open == b'{' { b'}' } else { b']' };

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, &b) in bytes.iter().enumerate().skip(start) {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            _ if b == open => depth += 1,
            _ if b == close => {
                depth -= 1;
                if depth == 0 {
                    return Some(&body[start..=i]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Strip a ```...``` fence, tolerating a language tag after the opening
/// backticks.
fn strip_fences(reply: &str) -> &str {
    let trimmed = reply.trim();
    let Some(fence_start) = trimmed.find("```") else {
        return trimmed;
    };
    let after_fence = &trimmed[fence_start + 3..];
    // Skip the rest of the fence line (e.g. "json").
    let content_start = after_fence.find('\n').map(|i| i + 1).unwrap_or(0);
    let content = &after_fence[content_start..];
    match content.find("```") {
        Some(end) => &content[..end],
        None => content,
    }
}
