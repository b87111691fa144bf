//! # pith-pipeline
//!
//! The book-distillation pipelines and their orchestration.
//!
//! Two pipelines coexist: the **claims** pipeline (chunks → claims →
//! filtered claims → idea clusters → reconstructed markdown) and the
//! **chapters** pipeline (chapter segmentation → per-chapter compression →
//! assembled markdown). The orchestrator drives whichever variant is stored
//! on the book, checkpointing status and progress after every stage so an
//! external UI can poll monotonically-increasing state.

pub mod chapters;
pub mod chapters_extract;
pub mod claims;
pub mod density;
pub mod intake;
pub mod orchestrator;
pub mod prompts;
pub mod segment;
pub mod toc;

pub use chapters_extract::{extract_chapters, ChapterExtraction};
pub use density::{analyze_density, DensityProfile};
pub use intake::{ingest_document, IngestRequest, ParsedDocument};
pub use orchestrator::Processor;
pub use segment::{chunk_text, ChunkerConfig, TextChunk};
pub use toc::{detect_toc, TocEntry, TocOutcome};
