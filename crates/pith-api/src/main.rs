//! pith-api - HTTP API server for the pith book-distillation service.

use std::net::SocketAddr;
use std::num::NonZeroU32;
use std::sync::Arc;

use axum::extract::{DefaultBodyLimit, Request, State};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use governor::{Quota, RateLimiter};
use serde_json::json;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::request_id::{MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;
use uuid::Uuid;

use pith_api::handlers::books;
use pith_api::{ApiConfig, AppState};
use pith_core::defaults::MAX_UPLOAD_SIZE_BYTES;
use pith_core::ChatBackend;
use pith_db::Database;
use pith_inference::{OpenAIBackend, StructuredClient, TierConfig};
use pith_pipeline::Processor;

/// Generates time-ordered UUIDv7 request correlation IDs.
///
/// UUIDv7 embeds a Unix timestamp, so IDs sort chronologically — useful for
/// log correlation when tracing a request into its background pipeline run.
#[derive(Clone, Default)]
struct MakeRequestUuidV7;

impl MakeRequestId for MakeRequestUuidV7 {
    fn make_request_id<B>(&mut self, _request: &axum::http::Request<B>) -> Option<RequestId> {
        let id = Uuid::now_v7().to_string().parse().ok()?;
        Some(RequestId::new(id))
    }
}

/// OpenAPI metadata served through Swagger UI at `/docs`.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Pith API",
        version = "2026.1.0",
        description = "Book distillation: upload a PDF, run a claims or chapters pipeline, poll for the condensed result"
    ),
    tags(
        (name = "Books", description = "Upload, processing, polling, and output"),
        (name = "System", description = "Health checks")
    )
)]
struct ApiDoc;

async fn rate_limit_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    if let Some(limiter) = &state.rate_limiter {
        if limiter.check().is_err() {
            return (
                StatusCode::TOO_MANY_REQUESTS,
                Json(json!({ "error": "Rate limit exceeded" })),
            )
                .into_response();
        }
    }
    next.run(request).await
}

/// Health endpoint: database ping plus LLM endpoint reachability. A down
/// LLM degrades the report without failing the check.
async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let db_ok = sqlx::query("SELECT 1")
        .execute(state.db.pool())
        .await
        .is_ok();
    let llm_ok = state
        .llm
        .backend()
        .health_check()
        .await
        .unwrap_or(false);

    let status = if db_ok { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (
        status,
        Json(json!({
            "status": if db_ok { "ok" } else { "degraded" },
            "database": db_ok,
            "llm": llm_ok,
        })),
    )
}

fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/books/upload-stream", post(books::upload_stream))
        .route("/books", get(books::list_books))
        .route("/books/:id", get(books::get_book))
        .route("/books/:id", delete(books::delete_book))
        .route("/books/:id/process", post(books::process_book))
        .route("/books/:id/output", get(books::get_output));

    Router::new()
        .nest("/api", api)
        .route("/health", get(health))
        .merge(SwaggerUi::new("/docs").url("/openapi.json", ApiDoc::openapi()))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuidV7))
        .layer(
            CorsLayer::new()
                .allow_origin(AllowOrigin::any())
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any),
        )
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(MAX_UPLOAD_SIZE_BYTES))
        .with_state(state)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            "pith_api=info,pith_pipeline=info,pith_db=info,pith_inference=info,tower_http=warn"
                .into()
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ApiConfig::from_env()?;

    let db = Arc::new(Database::connect(&config.database_url).await?);
    db.migrate().await?;
    info!("Database connected and migrated");

    let backend = OpenAIBackend::from_env()?;
    let llm = StructuredClient::new(Arc::new(backend), TierConfig::from_env());
    let processor = Processor::new(db.clone(), llm.clone());

    let rate_limiter = config.rate_limit.map(|(requests, period_secs)| {
        let per_second = (requests / period_secs).max(1) as u32;
        let quota = Quota::per_second(NonZeroU32::new(per_second).expect("nonzero"))
            .allow_burst(NonZeroU32::new(requests.max(1) as u32).expect("nonzero"));
        Arc::new(RateLimiter::direct(quota))
    });

    let state = AppState {
        db: db.clone(),
        processor,
        llm,
        session_signing_key: config.session_signing_key.clone().into(),
        rate_limiter,
    };

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!(%addr, "pith-api listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router(state)).await?;
    Ok(())
}
