//! Core data models for the pith service.
//!
//! These types are shared across all pith crates and represent the domain
//! entities: users, books, and the per-pipeline artifacts (chunks, chapters,
//! claims, ideas, final outputs).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// =============================================================================
// ENUMS
// =============================================================================

/// Which distillation pipeline a book runs through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineVariant {
    /// Text → chunks → claims → ideas → reconstructed markdown.
    Claims,
    /// Text → chapters → per-chapter compression → assembled markdown.
    Chapters,
}

impl PipelineVariant {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Claims => "claims",
            Self::Chapters => "chapters",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "claims" => Some(Self::Claims),
            "chapters" => Some(Self::Chapters),
            _ => None,
        }
    }
}

impl std::fmt::Display for PipelineVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Processing status of a book.
///
/// `rank()` gives a stable ordering used to assert that a poller only ever
/// observes forward transitions during a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookStatus {
    Uploaded,
    /// Upload-side preprocessing: PDF text extraction.
    Extracting,
    /// Upload-side preprocessing: chapter/structure detection.
    DetectingChapters,
    ExtractingClaims,
    FilteringClaims,
    ClusteringIdeas,
    Reconstructing,
    CompressingChapters,
    Assembling,
    Completed,
    Failed,
}

impl BookStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Uploaded => "uploaded",
            Self::Extracting => "extracting",
            Self::DetectingChapters => "detecting_chapters",
            Self::ExtractingClaims => "extracting_claims",
            Self::FilteringClaims => "filtering_claims",
            Self::ClusteringIdeas => "clustering_ideas",
            Self::Reconstructing => "reconstructing",
            Self::CompressingChapters => "compressing_chapters",
            Self::Assembling => "assembling",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "uploaded" => Some(Self::Uploaded),
            "extracting" => Some(Self::Extracting),
            "detecting_chapters" => Some(Self::DetectingChapters),
            "extracting_claims" => Some(Self::ExtractingClaims),
            "filtering_claims" => Some(Self::FilteringClaims),
            "clustering_ideas" => Some(Self::ClusteringIdeas),
            "reconstructing" => Some(Self::Reconstructing),
            "compressing_chapters" => Some(Self::CompressingChapters),
            "assembling" => Some(Self::Assembling),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    /// Terminal states never transition again within a run.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// A book may only be (re-)triggered from these states.
    pub fn is_triggerable(&self) -> bool {
        matches!(self, Self::Uploaded | Self::Failed)
    }

    /// Position in the forward ordering of a run. `Failed` shares the
    /// terminal rank so a failure from any stage is still "forward".
    pub fn rank(&self) -> u8 {
        match self {
            Self::Uploaded => 0,
            Self::Extracting => 1,
            Self::DetectingChapters => 2,
            Self::ExtractingClaims => 3,
            Self::FilteringClaims => 4,
            Self::ClusteringIdeas => 5,
            Self::Reconstructing => 6,
            Self::CompressingChapters => 3,
            Self::Assembling => 4,
            Self::Completed => 10,
            Self::Failed => 10,
        }
    }

    /// Human phrase for `current_step`: underscores become spaces.
    pub fn human_step(&self) -> String {
        self.as_str().replace('_', " ")
    }
}

impl std::fmt::Display for BookStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Type of an extracted claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimType {
    Principle,
    Rule,
    Recommendation,
    Constraint,
    Causal,
}

impl ClaimType {
    pub const VALUES: &'static [&'static str] =
        &["principle", "rule", "recommendation", "constraint", "causal"];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Principle => "principle",
            Self::Rule => "rule",
            Self::Recommendation => "recommendation",
            Self::Constraint => "constraint",
            Self::Causal => "causal",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "principle" => Some(Self::Principle),
            "rule" => Some(Self::Rule),
            "recommendation" => Some(Self::Recommendation),
            "constraint" => Some(Self::Constraint),
            "causal" => Some(Self::Causal),
            _ => None,
        }
    }
}

/// Filter verdict on a claim. A claim is *filtered* iff it has a label;
/// it is *kept* iff the label is core or supporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimLabel {
    CoreInsight,
    SupportingInsight,
    Redundant,
    Filler,
}

impl ClaimLabel {
    pub const VALUES: &'static [&'static str] =
        &["core_insight", "supporting_insight", "redundant", "filler"];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CoreInsight => "core_insight",
            Self::SupportingInsight => "supporting_insight",
            Self::Redundant => "redundant",
            Self::Filler => "filler",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "core_insight" => Some(Self::CoreInsight),
            "supporting_insight" => Some(Self::SupportingInsight),
            "redundant" => Some(Self::Redundant),
            "filler" => Some(Self::Filler),
            _ => None,
        }
    }

    /// Kept claims survive into idea clustering.
    pub fn is_kept(&self) -> bool {
        matches!(self, Self::CoreInsight | Self::SupportingInsight)
    }
}

/// Why an example earned its place in an idea.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExampleReason {
    ClarifiesApplication,
    RemovesAmbiguity,
}

/// How chapter boundaries were found during upload preprocessing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionMethod {
    Toc,
    Regex,
    Artificial,
}

impl ExtractionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Toc => "toc",
            Self::Regex => "regex",
            Self::Artificial => "artificial",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "toc" => Some(Self::Toc),
            "regex" => Some(Self::Regex),
            "artificial" => Some(Self::Artificial),
            _ => None,
        }
    }
}

// =============================================================================
// ENTITIES
// =============================================================================

/// A registered user. Credential handling lives in the external auth service;
/// only the identity surface is stored here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub display_name: String,
    #[serde(skip_serializing)]
    pub credential_hash: Option<String>,
    pub external_id: Option<String>,
    pub avatar_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A distillation job record. Mutated only by the orchestrator once
/// processing starts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Book {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub author: Option<String>,
    pub original_filename: String,
    pub page_count: Option<i32>,
    pub original_word_count: Option<i32>,
    pub status: BookStatus,
    pub pipeline: PipelineVariant,
    pub current_step: Option<String>,
    /// Processing progress in [0, 100]; monotone within a run.
    pub progress: i32,
    pub error: Option<String>,
    pub processing_started_at: Option<DateTime<Utc>>,
    pub processing_completed_at: Option<DateTime<Utc>>,
    pub total_chunks: Option<i32>,
    pub total_chapters: Option<i32>,
    pub density_score: Option<f32>,
    pub recommended_compression: Option<f32>,
    pub extraction_method: Option<ExtractionMethod>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A contiguous text segment of a book (claims pipeline).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub id: Uuid,
    pub book_id: Uuid,
    pub order_index: i32,
    pub text: String,
    pub token_count: i32,
    pub created_at: DateTime<Utc>,
}

/// A detected structural unit of a book (chapters pipeline).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chapter {
    pub id: Uuid,
    pub book_id: Uuid,
    pub order_index: i32,
    pub title: String,
    /// Heading level, 1–3.
    pub level: i16,
    pub original_content: String,
    pub original_token_count: i32,
    pub compressed_content: Option<String>,
    pub key_insights: Option<Vec<String>>,
    pub compressed_token_count: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An atomic assertion extracted from a chunk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claim {
    pub id: Uuid,
    pub book_id: Uuid,
    pub chunk_id: Uuid,
    pub text: String,
    pub claim_type: ClaimType,
    pub label: Option<ClaimLabel>,
    pub score: Option<f32>,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Claim {
    /// A claim is filtered once the filter stage has labeled it.
    pub fn is_filtered(&self) -> bool {
        self.label.is_some()
    }

    /// Kept claims carry a core or supporting label.
    pub fn is_kept(&self) -> bool {
        self.label.map(|l| l.is_kept()).unwrap_or(false)
    }
}

/// An illustrative example attached to an idea.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdeaExample {
    pub text: String,
    pub reason: ExampleReason,
}

/// A cluster of claims representing one decision-changing insight.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Idea {
    pub id: Uuid,
    pub book_id: Uuid,
    pub order_index: i32,
    pub title: String,
    pub merged_claims: Vec<String>,
    pub principle: Option<String>,
    pub behavior_delta: Option<String>,
    pub examples: Option<Vec<IdeaExample>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The reconstructed markdown document, one per book.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinalOutput {
    pub id: Uuid,
    pub book_id: Uuid,
    pub markdown: String,
    pub word_count: i32,
    /// Idea count (claims pipeline) or chapter count (chapters pipeline).
    pub idea_count: i32,
    /// output_words / original_words, when the original count is known.
    pub compression_ratio: Option<f32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
