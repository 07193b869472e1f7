use std::net::SocketAddr;

use axum::extract::rejection::JsonRejection;
use axum::extract::{DefaultBodyLimit, Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::controllers::paste::PasteService;
use crate::error::PasteError;
use crate::reaper::spawn_reaper;
use crate::types::api::{CreatePaste, Health, PasteBody};
use crate::App;

pub async fn run(app: App) -> anyhow::Result<()> {
    let addr = SocketAddr::new(app.config.bind, app.config.port);

    let reaper = spawn_reaper(
        app.service.store().clone(),
        app.config.limits.reap_interval(),
    );

    info!("listening on {addr}");
    let result = axum::Server::bind(&addr)
        .serve(router(app).into_make_service())
        .await;

    reaper.abort();
    Ok(result?)
}

pub fn router(app: App) -> Router {
    let max_upload_size = app.config.limits.max_upload_size;

    Router::new()
        .route("/health", get(health))
        .route("/api/paste", post(create_paste))
        .route("/api/paste/:code", get(get_paste))
        .route("/:code", get(get_paste_raw))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(max_upload_size))
        .layer(TraceLayer::new_for_http())
        .with_state(app)
}

async fn health() -> Json<Health> {
    Json(Health {
        status: "ok".into(),
        timestamp: Utc::now(),
    })
}

async fn create_paste(
    State(service): State<PasteService>,
    request: Result<Json<CreatePaste>, JsonRejection>,
) -> crate::PasteResult<impl IntoResponse> {
    let Json(request) =
        request.map_err(|rejection| PasteError::InvalidInput(rejection.body_text()))?;
    let content = request.content.unwrap_or_default();
    let created = service
        .create(&content, request.custom_code.as_deref())
        .await?;

    let path = format!("/{}", created.code);
    Ok((StatusCode::CREATED, [(header::LOCATION, path)], Json(created)))
}

async fn get_paste(
    State(service): State<PasteService>,
    Path(code): Path<String>,
) -> crate::PasteResult<Json<PasteBody>> {
    let snapshot = service.retrieve(&code).await?;
    Ok(Json(PasteBody {
        content: snapshot.content,
        created_at: snapshot.created_at,
    }))
}

/// Content verbatim as plain text, errors too.
async fn get_paste_raw(
    State(service): State<PasteService>,
    Path(code): Path<String>,
) -> Response {
    match service.retrieve_raw(&code).await {
        Ok(content) => (
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            content,
        )
            .into_response(),
        Err(PasteError::NotFound) => (StatusCode::NOT_FOUND, "Paste not found").into_response(),
        Err(err) => (err.status_code(), err.to_string()).into_response(),
    }
}
