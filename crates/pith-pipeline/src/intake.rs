//! Upload-side preprocessing.
//!
//! Turns a parsed document into a Book record with its children already
//! populated (chunks for the claims pipeline, chapters plus density
//! metadata for the chapters pipeline), emitting progress events for the
//! upload SSE stream along the way. The receiver may disconnect at any
//! point; intake keeps going and the record lands either way.

use tokio::sync::mpsc;
use tracing::{debug, info};

use pith_core::{
    count_words, Book, CreateBookRequest, Error, NewChapter, NewChunk, PipelineVariant, Result,
    Store, UploadEvent, UploadStage,
};
use pith_inference::StructuredClient;

use crate::chapters_extract::extract_chapters;
use crate::density::analyze_density;
use crate::segment::{chunk_text, ChunkerConfig};
use crate::toc::detect_toc;

/// A parsed document handed over by the PDF collaborator: cleaned full text
/// plus per-page text.
#[derive(Debug, Clone)]
pub struct ParsedDocument {
    pub cleaned_text: String,
    pub pages: Vec<String>,
    pub page_count: Option<i32>,
}

/// Book metadata captured at upload time.
#[derive(Debug, Clone)]
pub struct IngestRequest {
    pub user_id: uuid::Uuid,
    pub title: String,
    pub author: Option<String>,
    pub original_filename: String,
    pub pipeline: PipelineVariant,
}

/// Preprocess a parsed document and create the Book with its children in
/// status `uploaded`. Returns the created record.
pub async fn ingest_document(
    store: &dyn Store,
    llm: &StructuredClient,
    doc: ParsedDocument,
    req: IngestRequest,
    events: mpsc::Sender<UploadEvent>,
) -> Result<Book> {
    if doc.cleaned_text.trim().is_empty() {
        return Err(Error::Empty(
            "No text could be extracted from this document".to_string(),
        ));
    }
    let original_word_count = count_words(&doc.cleaned_text) as i32;

    let book_id = match req.pipeline {
        PipelineVariant::Claims => {
            let _ = events
                .send(UploadEvent::progress(
                    UploadStage::DetectingStructure,
                    "Segmenting text into chunks",
                ))
                .await;

            let chunks = chunk_text(&doc.cleaned_text, &ChunkerConfig::default());
            if chunks.is_empty() {
                return Err(Error::Empty(
                    "No text could be extracted from this document".to_string(),
                ));
            }
            debug!(chunk_count = chunks.len(), "Text segmented");

            let _ = events
                .send(UploadEvent::progress(
                    UploadStage::Saving,
                    format!("Saving {} chunks", chunks.len()),
                ))
                .await;

            let book_id = store
                .books()
                .insert(CreateBookRequest {
                    user_id: req.user_id,
                    title: req.title.clone(),
                    author: req.author.clone(),
                    original_filename: req.original_filename.clone(),
                    page_count: doc.page_count,
                    original_word_count: Some(original_word_count),
                    pipeline: PipelineVariant::Claims,
                    total_chunks: Some(chunks.len() as i32),
                    total_chapters: None,
                    density_score: None,
                    recommended_compression: None,
                    extraction_method: None,
                })
                .await?;

            let new_chunks: Vec<NewChunk> = chunks
                .into_iter()
                .enumerate()
                .map(|(i, c)| NewChunk {
                    order_index: i as i32,
                    text: c.text,
                    token_count: c.token_count as i32,
                })
                .collect();
            store.chunks().insert_many(book_id, new_chunks).await?;
            book_id
        }

        PipelineVariant::Chapters => {
            let _ = events
                .send(UploadEvent::progress(
                    UploadStage::DetectingStructure,
                    "Detecting chapter structure",
                ))
                .await;

            let toc = detect_toc(llm, &doc.pages).await?;
            let extraction = extract_chapters(&doc.cleaned_text, &toc);
            if extraction.chapters.is_empty() {
                return Err(Error::Empty(
                    "No text could be extracted from this document".to_string(),
                ));
            }
            debug!(
                chapter_count = extraction.chapters.len(),
                method = extraction.method.as_str(),
                "Chapters extracted"
            );

            let _ = events
                .send(UploadEvent::progress(
                    UploadStage::AnalyzingDensity,
                    "Analyzing content density",
                ))
                .await;

            let chapter_texts: Vec<String> = extraction
                .chapters
                .iter()
                .map(|c| c.content.clone())
                .collect();
            let density = analyze_density(llm, &chapter_texts).await?;

            let _ = events
                .send(UploadEvent::progress(
                    UploadStage::Saving,
                    format!("Saving {} chapters", extraction.chapters.len()),
                ))
                .await;

            let book_id = store
                .books()
                .insert(CreateBookRequest {
                    user_id: req.user_id,
                    title: req.title.clone(),
                    author: req.author.clone(),
                    original_filename: req.original_filename.clone(),
                    page_count: doc.page_count,
                    original_word_count: Some(original_word_count),
                    pipeline: PipelineVariant::Chapters,
                    total_chunks: None,
                    total_chapters: Some(extraction.chapters.len() as i32),
                    density_score: Some(density.density_score),
                    recommended_compression: Some(density.recommended_compression),
                    extraction_method: Some(extraction.method),
                })
                .await?;

            let new_chapters: Vec<NewChapter> = extraction
                .chapters
                .into_iter()
                .enumerate()
                .map(|(i, c)| NewChapter {
                    order_index: i as i32,
                    title: c.title,
                    level: c.level,
                    original_token_count: pith_core::estimate_tokens(&c.content) as i32,
                    original_content: c.content,
                })
                .collect();
            store.chapters().insert_many(book_id, new_chapters).await?;
            book_id
        }
    };

    let book = store.books().fetch(book_id).await?;
    info!(
        book_id = %book.id,
        pipeline = %book.pipeline,
        words = original_word_count,
        "Book ingested"
    );
    Ok(book)
}
