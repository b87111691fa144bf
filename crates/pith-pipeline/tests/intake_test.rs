//! Tests for upload-side preprocessing.

mod support;

use std::sync::Arc;

use tokio::sync::mpsc;

use pith_core::{
    ChapterRepository, ChunkRepository, Error, ExtractionMethod, PipelineVariant, Store,
    UploadEvent,
};
use pith_inference::{MockChatBackend, StructuredClient, TierConfig};
use pith_pipeline::{ingest_document, IngestRequest, ParsedDocument};

use support::{seed_user, MemStore};

fn client(backend: &MockChatBackend) -> StructuredClient {
    StructuredClient::new(Arc::new(backend.clone()), TierConfig::default())
}

fn request(user_id: uuid::Uuid, pipeline: PipelineVariant) -> IngestRequest {
    IngestRequest {
        user_id,
        title: "Deep Focus".to_string(),
        author: Some("A. Writer".to_string()),
        original_filename: "deep-focus.pdf".to_string(),
        pipeline,
    }
}

#[tokio::test]
async fn claims_intake_creates_book_with_chunks() {
    let store = MemStore::new();
    let user_id = seed_user(&store).await;
    let backend = MockChatBackend::new();
    let llm = client(&backend);

    let text = (0..20)
        .map(|i| format!("Paragraph {} with a reasonable amount of words in it. ", i).repeat(20))
        .collect::<Vec<_>>()
        .join("\n\n");
    let doc = ParsedDocument {
        cleaned_text: text.clone(),
        pages: vec![text],
        page_count: Some(12),
    };

    let (tx, mut rx) = mpsc::channel(32);
    let book = ingest_document(
        store.as_ref(),
        &llm,
        doc,
        request(user_id, PipelineVariant::Claims),
        tx,
    )
    .await
    .unwrap();

    assert_eq!(book.pipeline, PipelineVariant::Claims);
    assert_eq!(book.status, pith_core::BookStatus::Uploaded);
    assert_eq!(book.page_count, Some(12));
    assert!(book.original_word_count.unwrap() > 1000);

    let chunks = store.chunks().list_for_book(book.id).await.unwrap();
    assert!(!chunks.is_empty());
    assert_eq!(book.total_chunks, Some(chunks.len() as i32));
    // Dense order indices.
    for (i, chunk) in chunks.iter().enumerate() {
        assert_eq!(chunk.order_index, i as i32);
    }
    // No LLM calls on the claims path.
    assert_eq!(backend.call_count(), 0);

    // Progress events arrived in stage order.
    let mut steps = Vec::new();
    while let Ok(event) = rx.try_recv() {
        if let UploadEvent::Progress { step, .. } = event {
            steps.push(step);
        }
    }
    assert_eq!(steps, vec!["Detecting structure", "Saving book"]);
}

#[tokio::test]
async fn chapters_intake_records_density_and_method() {
    let store = MemStore::new();
    let user_id = seed_user(&store).await;

    let toc_reply = r#"{
        "has_toc": true,
        "entries": [
            {"title": "Chapter 1: Alpha", "normalized_title": "Alpha", "level": 2},
            {"title": "Chapter 2: Beta", "normalized_title": "Beta", "level": 2}
        ],
        "confidence": "high"
    }"#;
    let density_reply = r#"{
        "density_score": 7,
        "characteristics": ["rule-heavy"],
        "recommended_compression": 0.45,
        "recommended_context_size": 200
    }"#;
    let backend = MockChatBackend::new()
        .with_rule("table of contents", toc_reply)
        .with_rule("information density", density_reply);
    let llm = client(&backend);

    let body = |seed: &str| format!("{} ", seed).repeat(120);
    let text = format!(
        "Chapter 1 Alpha\n{}\nChapter 2 Beta\n{}",
        body("alpha body"),
        body("beta body")
    );
    let doc = ParsedDocument {
        cleaned_text: text.clone(),
        pages: vec![text],
        page_count: Some(90),
    };

    let (tx, mut rx) = mpsc::channel(32);
    let book = ingest_document(
        store.as_ref(),
        &llm,
        doc,
        request(user_id, PipelineVariant::Chapters),
        tx,
    )
    .await
    .unwrap();

    assert_eq!(book.pipeline, PipelineVariant::Chapters);
    assert_eq!(book.extraction_method, Some(ExtractionMethod::Toc));
    assert_eq!(book.total_chapters, Some(2));
    assert_eq!(book.density_score, Some(7.0));
    assert_eq!(book.recommended_compression, Some(0.45));

    let chapters = store.chapters().list_for_book(book.id).await.unwrap();
    assert_eq!(chapters.len(), 2);
    assert!(chapters[0].original_content.contains("alpha body"));

    let mut steps = Vec::new();
    while let Ok(event) = rx.try_recv() {
        if let UploadEvent::Progress { step, .. } = event {
            steps.push(step);
        }
    }
    assert_eq!(
        steps,
        vec!["Detecting structure", "Analyzing density", "Saving book"]
    );
}

#[tokio::test]
async fn empty_document_is_rejected() {
    let store = MemStore::new();
    let user_id = seed_user(&store).await;
    let backend = MockChatBackend::new();
    let llm = client(&backend);

    let doc = ParsedDocument {
        cleaned_text: "   \n\n  ".to_string(),
        pages: Vec::new(),
        page_count: None,
    };
    let (tx, _rx) = mpsc::channel(8);
    let err = ingest_document(
        store.as_ref(),
        &llm,
        doc,
        request(user_id, PipelineVariant::Claims),
        tx,
    )
    .await
    .unwrap_err();

    assert!(matches!(err, Error::Empty(_)));
}
