//! Book endpoints: upload stream, pipeline trigger, polling, output fetch,
//! delete, and listing. All book access is scoped to the authenticated
//! user; another user's book answers 404.

use std::convert::Infallible;

use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::Json;
use futures::Stream;
use serde_json::json;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;
use tracing::{error, info};
use uuid::Uuid;

use pith_core::{
    Book, BookRepository, FinalOutput, OutputRepository, PipelineVariant, UploadEvent, UploadStage,
};
use pith_pipeline::{ingest_document, IngestRequest};

use crate::auth::AuthUser;
use crate::handlers::ApiError;
use crate::pdf;
use crate::state::AppState;

/// Fetch a book and enforce ownership (missing and foreign books are both 404).
async fn owned_book(state: &AppState, user_id: Uuid, book_id: Uuid) -> Result<Book, ApiError> {
    let book = state
        .db
        .books
        .try_fetch(book_id)
        .await?
        .filter(|b| b.user_id == user_id)
        .ok_or_else(|| ApiError::not_found(format!("Book {} not found", book_id)))?;
    Ok(book)
}

// =============================================================================
// POST /api/books/upload-stream
// =============================================================================

/// Multipart upload: `file` (PDF), `title`, optional `author`, optional
/// `pipeline` (`claims` | `chapters`). Streams SSE progress events and ends
/// with a `result` (or `error`) event.
pub async fn upload_stream(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    mut multipart: Multipart,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let mut file: Option<(String, Vec<u8>)> = None;
    let mut title: Option<String> = None;
    let mut author: Option<String> = None;
    let mut pipeline = PipelineVariant::Claims;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Invalid multipart body: {}", e)))?
    {
        match field.name().unwrap_or_default() {
            "file" => {
                let filename = field.file_name().unwrap_or("upload.pdf").to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::bad_request(format!("Failed to read file: {}", e)))?;
                file = Some((filename, data.to_vec()));
            }
            "title" => title = field.text().await.ok(),
            "author" => {
                author = field.text().await.ok().filter(|a| !a.trim().is_empty());
            }
            "pipeline" => {
                if let Ok(value) = field.text().await {
                    pipeline = PipelineVariant::parse(value.trim())
                        .ok_or_else(|| ApiError::bad_request("Unknown pipeline variant"))?;
                }
            }
            _ => {}
        }
    }

    let (filename, data) =
        file.ok_or_else(|| ApiError::bad_request("Missing `file` field"))?;
    let title = title
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request("Missing `title` field"))?;

    let (tx, rx) = mpsc::channel::<UploadEvent>(32);
    let state_bg = state.clone();
    tokio::spawn(async move {
        let _ = tx
            .send(UploadEvent::progress(
                UploadStage::Parsing,
                format!("Parsing {}", filename),
            ))
            .await;

        let document = match pdf::extract_pdf(&data, &filename).await {
            Ok(document) => document,
            Err(e) => {
                error!(error = %e, filename, "PDF extraction failed");
                let _ = tx.send(UploadEvent::failure(e.to_string())).await;
                return;
            }
        };

        let request = IngestRequest {
            user_id,
            title,
            author,
            original_filename: filename,
            pipeline,
        };
        match ingest_document(
            state_bg.db.as_ref(),
            &state_bg.llm,
            document,
            request,
            tx.clone(),
        )
        .await
        {
            Ok(book) => {
                info!(book_id = %book.id, "Upload ingested");
                let _ = tx
                    .send(UploadEvent::success(json!({
                        "id": book.id,
                        "title": book.title,
                        "status": book.status,
                        "pipeline": book.pipeline,
                    })))
                    .await;
            }
            Err(e) => {
                error!(error = %e, "Ingest failed");
                let _ = tx.send(UploadEvent::failure(e.to_string())).await;
            }
        }
    });

    let stream = ReceiverStream::new(rx).map(|event| {
        Ok(Event::default()
            .json_data(&event)
            .unwrap_or_else(|_| Event::default().data("{}")))
    });
    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

// =============================================================================
// POST /api/books/{id}/process
// =============================================================================

/// Trigger the distillation pipeline. Returns immediately; accepted only
/// from `uploaded` or `failed`.
pub async fn process_book(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(book_id): Path<Uuid>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    let book = owned_book(&state, user_id, book_id).await?;
    state.processor.trigger(book.id).await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(json!({ "id": book.id, "status": "processing" })),
    ))
}

// =============================================================================
// GET /api/books/{id}
// =============================================================================

/// Fetch one book record (the polling endpoint).
pub async fn get_book(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(book_id): Path<Uuid>,
) -> Result<Json<Book>, ApiError> {
    Ok(Json(owned_book(&state, user_id, book_id).await?))
}

// =============================================================================
// GET /api/books/{id}/output
// =============================================================================

/// Fetch the final output; 404 until reconstruction has completed.
pub async fn get_output(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(book_id): Path<Uuid>,
) -> Result<Json<FinalOutput>, ApiError> {
    let book = owned_book(&state, user_id, book_id).await?;
    let output = state
        .db
        .outputs
        .fetch_for_book(book.id)
        .await?
        .ok_or_else(|| ApiError::not_found("Output not ready"))?;
    Ok(Json(output))
}

// =============================================================================
// DELETE /api/books/{id}
// =============================================================================

/// Delete a book; children cascade. Deleting is also the only way to cancel
/// an in-flight run: the orchestrator notices the record is gone and stops.
pub async fn delete_book(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(book_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let book = owned_book(&state, user_id, book_id).await?;
    state.db.books.delete(book.id).await?;
    info!(book_id = %book.id, "Book deleted");
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// GET /api/books
// =============================================================================

/// List the caller's books, newest first.
pub async fn list_books(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Vec<Book>>, ApiError> {
    Ok(Json(state.db.books.list_for_user(user_id).await?))
}
