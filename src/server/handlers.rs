// HTTP handlers for the tools endpoints

use axum::body::Body;
use axum::extract::{Path, RawQuery, State};
use axum::http::{header, HeaderMap, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use super::AppState;
use crate::error::ToolsError;
use crate::ingest::{UploadDescriptor, UploadRequest};
use crate::transfer;

#[derive(Serialize)]
pub(super) struct ToolsList {
    #[serde(rename = "tools-list")]
    tools_list: Vec<UploadDescriptor>,
}

pub(super) async fn download_tools(
    State(state): State<AppState>,
    Path(version): Path<String>,
) -> Result<Response, ToolsError> {
    serve_tools(&state, &version).await
}

pub(super) async fn download_scoped_tools(
    State(state): State<AppState>,
    Path((_scope, version)): Path<(String, String)>,
) -> Result<Response, ToolsError> {
    serve_tools(&state, &version).await
}

async fn serve_tools(state: &AppState, version: &str) -> Result<Response, ToolsError> {
    let (metadata, handles) = state.downloader.get_tools(version).await?;
    Ok(transfer::into_response(
        &metadata,
        handles,
        state.metrics.clone(),
    ))
}

pub(super) async fn upload_tools(
    State(state): State<AppState>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
    body: Body,
) -> Result<Json<ToolsList>, ToolsError> {
    let scope = state.scope.clone();
    store_upload(&state, &scope, query, &headers, body).await
}

pub(super) async fn upload_scoped_tools(
    State(state): State<AppState>,
    Path(scope): Path<String>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
    body: Body,
) -> Result<Json<ToolsList>, ToolsError> {
    store_upload(&state, &scope, query, &headers, body).await
}

async fn store_upload(
    state: &AppState,
    scope: &str,
    query: Option<String>,
    headers: &HeaderMap,
    body: Body,
) -> Result<Json<ToolsList>, ToolsError> {
    let host = state.url_host(header_str(headers, header::HOST));
    let request = UploadRequest {
        query: query.as_deref(),
        content_type: header_str(headers, header::CONTENT_TYPE),
        host: &host,
        scope,
    };
    let descriptor = state.ingester.ingest(request, body).await?;
    Ok(Json(ToolsList {
        tools_list: vec![descriptor],
    }))
}

fn header_str(headers: &HeaderMap, name: header::HeaderName) -> Option<&str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

pub(super) async fn method_not_allowed(method: Method) -> ToolsError {
    ToolsError::MethodNotAllowed(format!("unsupported method: {:?}", method.as_str()))
}

pub(super) async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "entries": state.store.entry_count(),
        "open_handles": state.store.open_handles(),
    }))
}

pub(super) async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/plain; version=0.0.4"),
        )],
        state.metrics.export_prometheus(),
    )
}
