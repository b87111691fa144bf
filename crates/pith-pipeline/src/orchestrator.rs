//! Job orchestration and the book status state machine.
//!
//! The processor drives one pipeline run to completion in a detached task:
//! it validates the trigger, checkpoints status and progress after every
//! stage, maps per-stage completion callbacks into pre-assigned progress
//! bands, captures any stage error as a `failed` record, and exits silently
//! when the book was deleted mid-run (the only cancellation signal).

use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info, warn};
use uuid::Uuid;

use pith_core::defaults::{
    BAND_ASSEMBLE, BAND_CLUSTER_IDEAS, BAND_COMPRESS_CHAPTERS, BAND_EXTRACT_CLAIMS,
    BAND_FILTER_CLAIMS, BAND_RECONSTRUCT,
};
use pith_core::{Book, BookStatus, Error, PipelineVariant, Result, Store};
use pith_inference::StructuredClient;

use crate::chapters;
use crate::claims::{self, ProgressSink};

/// Map `(done, total)` into a `[lo, hi]` progress band.
fn band_value(band: (i32, i32), done: usize, total: usize) -> i32 {
    let (lo, hi) = band;
    if total == 0 {
        return lo;
    }
    let done = done.min(total);
    lo + (((hi - lo) as usize * done) / total) as i32
}

/// Drives pipelines to completion for one deployment.
pub struct Processor {
    store: Arc<dyn Store>,
    llm: StructuredClient,
}

impl Processor {
    pub fn new(store: Arc<dyn Store>, llm: StructuredClient) -> Arc<Self> {
        Arc::new(Self { store, llm })
    }

    /// Validate and accept a processing trigger, then run detached.
    ///
    /// Accepted only from `uploaded` or `failed`; the caller returns
    /// immediately while the pipeline runs in the background.
    pub async fn trigger(self: &Arc<Self>, book_id: Uuid) -> Result<()> {
        let book = self.store.books().fetch(book_id).await?;
        if !book.status.is_triggerable() {
            return Err(Error::Precondition(format!(
                "Book is already being processed (status: {})",
                book.status
            )));
        }

        self.store
            .books()
            .mark_processing_started(book_id, Utc::now())
            .await?;

        let this = self.clone();
        tokio::spawn(async move {
            this.run(book_id).await;
        });
        Ok(())
    }

    /// Run one pipeline to a terminal state. Never propagates errors: a
    /// stage failure marks the book `failed`, and a vanished book exits
    /// without touching the store.
    pub async fn run(&self, book_id: Uuid) {
        match self.run_pipeline(book_id).await {
            Ok(()) => {}
            Err(Error::BookNotFound(_)) | Err(Error::NotFound(_)) => {
                warn!(book_id = %book_id, "Book vanished mid-processing, exiting quietly");
            }
            Err(e) => {
                error!(book_id = %book_id, error = %e, "Pipeline failed");
                let _ = self
                    .store
                    .books()
                    .mark_failed(book_id, &e.to_string(), Utc::now())
                    .await;
            }
        }
    }

    async fn run_pipeline(&self, book_id: Uuid) -> Result<()> {
        let book = self.store.books().fetch(book_id).await?;
        info!(book_id = %book_id, pipeline = %book.pipeline, title = %book.title, "Pipeline started");

        match book.pipeline {
            PipelineVariant::Claims => self.run_claims(&book).await?,
            PipelineVariant::Chapters => self.run_chapters(&book).await?,
        }

        if !self
            .store
            .books()
            .mark_completed(book_id, Utc::now())
            .await?
        {
            return Err(Error::BookNotFound(book_id));
        }
        info!(book_id = %book_id, "Pipeline completed");
        Ok(())
    }

    async fn run_claims(&self, book: &Book) -> Result<()> {
        let id = book.id;
        let store = self.store.as_ref();

        self.checkpoint(id, BookStatus::ExtractingClaims, BAND_EXTRACT_CLAIMS.0)
            .await?;
        claims::extract_claims(store, &self.llm, id, self.sink(id, BAND_EXTRACT_CLAIMS)).await?;
        self.step(id, BAND_EXTRACT_CLAIMS.1, "Claims extracted").await?;

        self.checkpoint(id, BookStatus::FilteringClaims, BAND_FILTER_CLAIMS.0)
            .await?;
        claims::filter_claims(store, &self.llm, id, self.sink(id, BAND_FILTER_CLAIMS)).await?;

        self.checkpoint(id, BookStatus::ClusteringIdeas, BAND_CLUSTER_IDEAS.0)
            .await?;
        let clusters = claims::cluster_ideas(store, &self.llm, id).await?;
        // Expansion shares the clustering status; its callbacks fill the
        // upper half of the band.
        let mid = (BAND_CLUSTER_IDEAS.0 + BAND_CLUSTER_IDEAS.1) / 2;
        self.step(id, mid, "Ideas clustered").await?;
        claims::expand_ideas(
            store,
            &self.llm,
            id,
            clusters,
            self.sink(id, (mid, BAND_CLUSTER_IDEAS.1)),
        )
        .await?;

        self.checkpoint(id, BookStatus::Reconstructing, BAND_RECONSTRUCT.0)
            .await?;
        claims::reconstruct(store, &self.llm, book).await?;
        Ok(())
    }

    async fn run_chapters(&self, book: &Book) -> Result<()> {
        let id = book.id;
        let store = self.store.as_ref();

        self.checkpoint(id, BookStatus::CompressingChapters, BAND_COMPRESS_CHAPTERS.0)
            .await?;
        chapters::compress_chapters(
            store,
            &self.llm,
            book,
            self.sink(id, BAND_COMPRESS_CHAPTERS),
        )
        .await?;

        self.checkpoint(id, BookStatus::Assembling, BAND_ASSEMBLE.0)
            .await?;
        chapters::assemble_book(store, &self.llm, book).await?;
        self.step(id, BAND_ASSEMBLE.1, "Book assembled").await?;
        Ok(())
    }

    /// Write a stage-start checkpoint; a missing record means the book was
    /// deleted and the run must stop quietly.
    async fn checkpoint(&self, book_id: Uuid, status: BookStatus, progress: i32) -> Result<()> {
        let live = self
            .store
            .books()
            .update_status(book_id, status, Some(&status.human_step()), progress)
            .await?;
        if !live {
            return Err(Error::BookNotFound(book_id));
        }
        Ok(())
    }

    /// Write a finer-grained progress step within the current status.
    async fn step(&self, book_id: Uuid, progress: i32, step: &str) -> Result<()> {
        let live = self
            .store
            .books()
            .update_progress(book_id, progress, Some(step))
            .await?;
        if !live {
            return Err(Error::BookNotFound(book_id));
        }
        Ok(())
    }

    /// Completion-order progress sink mapping `(done, total)` into `band`.
    /// Writes are fire-and-forget; the store clamps progress monotonically.
    fn sink(&self, book_id: Uuid, band: (i32, i32)) -> ProgressSink {
        let store = self.store.clone();
        Arc::new(move |done, total| {
            let progress = band_value(band, done, total);
            let store = store.clone();
            tokio::spawn(async move {
                let _ = store.books().update_progress(book_id, progress, None).await;
            });
        })
    }
}
