//! Upload-side progress events.
//!
//! The upload endpoint streams these as SSE while preprocessing runs
//! (parse → structure detection → density analysis → record creation).
//! Wire form is `{"type": "progress" | "result" | "error", ...}`.

use serde::Serialize;
use serde_json::Value as JsonValue;

/// A named step of upload preprocessing with its nominal progress value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadStage {
    Parsing,
    DetectingStructure,
    AnalyzingDensity,
    Saving,
}

impl UploadStage {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Parsing => "Parsing PDF",
            Self::DetectingStructure => "Detecting structure",
            Self::AnalyzingDensity => "Analyzing density",
            Self::Saving => "Saving book",
        }
    }

    pub fn progress(&self) -> i32 {
        match self {
            Self::Parsing => 10,
            Self::DetectingStructure => 35,
            Self::AnalyzingDensity => 60,
            Self::Saving => 85,
        }
    }
}

/// An event on the upload progress stream.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum UploadEvent {
    Progress {
        step: String,
        progress: i32,
        message: String,
    },
    Result {
        success: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        data: Option<JsonValue>,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    Error {
        error: String,
    },
}

impl UploadEvent {
    /// Progress event for a named stage.
    pub fn progress(stage: UploadStage, message: impl Into<String>) -> Self {
        Self::Progress {
            step: stage.label().to_string(),
            progress: stage.progress(),
            message: message.into(),
        }
    }

    /// Terminal success event carrying the created record.
    pub fn success(data: JsonValue) -> Self {
        Self::Result {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    /// Terminal failure event.
    pub fn failure(error: impl Into<String>) -> Self {
        Self::Result {
            success: false,
            data: None,
            error: Some(error.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_wire_form() {
        let event = UploadEvent::progress(UploadStage::Parsing, "reading pages");
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "progress");
        assert_eq!(json["step"], "Parsing PDF");
        assert_eq!(json["progress"], 10);
        assert_eq!(json["message"], "reading pages");
    }

    #[test]
    fn result_wire_form_omits_absent_fields() {
        let event = UploadEvent::success(serde_json::json!({"id": "x"}));
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "result");
        assert_eq!(json["success"], true);
        assert!(json.get("error").is_none());

        let event = UploadEvent::failure("parse failed");
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "parse failed");
        assert!(json.get("data").is_none());
    }

    #[test]
    fn stage_progress_is_increasing() {
        let stages = [
            UploadStage::Parsing,
            UploadStage::DetectingStructure,
            UploadStage::AnalyzingDensity,
            UploadStage::Saving,
        ];
        for w in stages.windows(2) {
            assert!(w[0].progress() < w[1].progress());
        }
    }
}
