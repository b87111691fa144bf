//! End-to-end tests for the chapters pipeline.

mod support;

use std::sync::Arc;

use pith_core::{BookStatus, ChapterRepository, NewChapter, OutputRepository, Store};
use pith_inference::{MockChatBackend, StructuredClient, TierConfig};
use pith_pipeline::Processor;

use support::{seed_book, wait_terminal, MemStore};

const COMPRESS_REPLY: &str = r#"{
    "compressed_content": "Tight chapter prose.",
    "key_insights": ["Focus wins", "Batch the shallow work"]
}"#;
const ASSEMBLE_REPLY: &str =
    "# Deep Focus\n\nOverview here.\n\n## One\n\nTight chapter prose.\n\n## Key Takeaways\n\n- Focus wins";

fn client(backend: &MockChatBackend) -> StructuredClient {
    StructuredClient::new(Arc::new(backend.clone()), TierConfig::default())
}

async fn seed_chapters(store: &MemStore, book_id: uuid::Uuid, count: usize) {
    let chapters: Vec<NewChapter> = (0..count)
        .map(|i| NewChapter {
            order_index: i as i32,
            title: format!("Chapter {}", i + 1),
            level: 2,
            original_content: format!("Original content of chapter {}.", i + 1),
            original_token_count: 10,
        })
        .collect();
    store.chapters().insert_many(book_id, chapters).await.unwrap();
}

#[tokio::test]
async fn chapters_run_compresses_then_assembles() {
    let store = MemStore::new();
    let book_id = seed_book(&store, pith_core::PipelineVariant::Chapters).await;
    seed_chapters(&store, book_id, 2).await;

    let backend = MockChatBackend::new()
        .with_rule("Compress the chapter", COMPRESS_REPLY)
        .with_rule("Assemble the compressed chapters", ASSEMBLE_REPLY);
    let processor = Processor::new(store.clone(), client(&backend));
    processor.trigger(book_id).await.unwrap();

    let book = wait_terminal(&store, book_id).await;
    assert_eq!(book.status, BookStatus::Completed);
    assert_eq!(book.progress, 100);

    let chapters = store.chapters().list_for_book(book_id).await.unwrap();
    assert_eq!(chapters.len(), 2);
    for chapter in &chapters {
        assert_eq!(
            chapter.compressed_content.as_deref(),
            Some("Tight chapter prose.")
        );
        assert_eq!(
            chapter.key_insights.as_deref(),
            Some(["Focus wins".to_string(), "Batch the shallow work".to_string()].as_slice())
        );
        assert!(chapter.compressed_token_count.is_some());
    }

    let output = store.outputs().fetch_for_book(book_id).await.unwrap().unwrap();
    assert_eq!(output.idea_count, 2);
    assert!(output.markdown.contains("Key Takeaways"));

    assert_eq!(
        store.observed_statuses(),
        vec![
            BookStatus::Uploaded,
            BookStatus::CompressingChapters,
            BookStatus::Assembling,
            BookStatus::Completed,
        ]
    );
}

#[tokio::test]
async fn one_failing_chapter_still_assembles() {
    let store = MemStore::new();
    let book_id = seed_book(&store, pith_core::PipelineVariant::Chapters).await;

    store
        .chapters()
        .insert_many(
            book_id,
            vec![
                NewChapter {
                    order_index: 0,
                    title: "Good".to_string(),
                    level: 2,
                    original_content: "Fine content.".to_string(),
                    original_token_count: 4,
                },
                NewChapter {
                    order_index: 1,
                    title: "Cursed".to_string(),
                    level: 2,
                    original_content: "POISON content.".to_string(),
                    original_token_count: 4,
                },
            ],
        )
        .await
        .unwrap();

    let backend = MockChatBackend::new()
        .with_failing_rule("POISON", 2, COMPRESS_REPLY)
        .with_rule("Compress the chapter", COMPRESS_REPLY)
        .with_rule("Assemble the compressed chapters", ASSEMBLE_REPLY);
    let processor = Processor::new(store.clone(), client(&backend));
    processor.trigger(book_id).await.unwrap();

    let book = wait_terminal(&store, book_id).await;
    assert_eq!(book.status, BookStatus::Completed);

    let chapters = store.chapters().list_for_book(book_id).await.unwrap();
    assert!(chapters[0].compressed_content.is_some());
    assert!(chapters[1].compressed_content.is_none());

    // Assembly only covers the chapter that compressed.
    let output = store.outputs().fetch_for_book(book_id).await.unwrap().unwrap();
    assert_eq!(output.idea_count, 1);
}

#[tokio::test]
async fn all_chapters_failing_marks_book_failed() {
    let store = MemStore::new();
    let book_id = seed_book(&store, pith_core::PipelineVariant::Chapters).await;
    seed_chapters(&store, book_id, 2).await;

    let backend = MockChatBackend::new().with_failing_rule("Compress the chapter", 4, COMPRESS_REPLY);
    let processor = Processor::new(store.clone(), client(&backend));
    processor.trigger(book_id).await.unwrap();

    let book = wait_terminal(&store, book_id).await;
    assert_eq!(book.status, BookStatus::Failed);
    assert!(book
        .error
        .as_deref()
        .unwrap()
        .contains("No chapters could be compressed"));
}
