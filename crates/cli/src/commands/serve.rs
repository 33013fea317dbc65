use anyhow::{Context, Result};
use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, Path, Query, State, multipart::MultipartError},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::{Value, json};
use site_builder_core::catalog::ComponentCategory;
use site_builder_core::{
    Error, ErrorKind, FieldData, PageDocument, PageSummary, SiteConfig,
};
use site_builder_generator::{
    NewPage, PageUpdate, PublishReport, PublishedArtifact, SettingsOutcome, SettingsUpdate,
    SiteInit,
};
use site_builder_store::{AssetInfo, AssetUploader, UploadedAsset};
use site_builder_validator::ValidationReport;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::context::AppContext;

/// Multipart framing allowance on top of the largest accepted upload
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Run the JSON editing API
pub async fn run(ctx: AppContext, host: &str, port: u16) -> Result<()> {
    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    println!("🚀 API listening on http://{}", addr);
    println!("   Press Ctrl+C to stop\n");
    info!(%addr, "api server started");

    axum::serve(listener, router(ctx))
        .await
        .context("Server error")?;
    Ok(())
}

fn router(ctx: AppContext) -> Router {
    let body_limit = ctx.assets.settings().max_bytes as usize + MULTIPART_OVERHEAD;

    Router::new()
        .route("/api/catalog", get(catalog))
        .route("/api/sites/{site}", get(get_site).post(init_site))
        .route("/api/sites/{site}/settings", post(update_settings))
        .route("/api/sites/{site}/pages", get(list_pages).post(add_page))
        .route(
            "/api/sites/{site}/pages/{page}",
            get(get_page).put(save_page).delete(delete_page),
        )
        .route("/api/sites/{site}/pages/{page}/copy", post(copy_page))
        .route("/api/sites/{site}/pages/{page}/issues", get(page_issues))
        .route("/api/sites/{site}/pages/{page}/publish", post(publish_page))
        .route("/api/sites/{site}/publish", post(publish_all))
        .route("/api/sites/{site}/preview", post(preview_page))
        .route("/api/sites/{site}/preview/component", post(preview_component))
        .route(
            "/api/sites/{site}/assets",
            get(list_assets).post(upload_asset),
        )
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(ctx)
}

/// Error body: `{"error": "..."}`
#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Validation => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::Render | ErrorKind::Storage | ErrorKind::Config => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self {
            status: status_for(err.kind()),
            message: err.to_string(),
        }
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        Self {
            status: err.status(),
            message: err.body_text(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(status = %self.status, error = %self.message, "request failed");
        }
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

type ApiResult<T> = std::result::Result<T, ApiError>;

#[derive(Debug, Deserialize)]
struct ComponentPreview {
    component_type: String,
    #[serde(default)]
    data: FieldData,
}

#[derive(Debug, Deserialize)]
struct CatalogQuery {
    /// Only list components of this category
    category: Option<String>,
}

async fn catalog(
    State(ctx): State<AppContext>,
    Query(query): Query<CatalogQuery>,
) -> ApiResult<Json<Value>> {
    let catalog = ctx.catalog();
    let components = match query.category.as_deref() {
        None => catalog.components.list().iter().collect::<Vec<_>>(),
        Some(name) => {
            let category = ComponentCategory::parse(name).ok_or_else(|| {
                ApiError::bad_request(format!("Unknown component category '{}'", name))
            })?;
            catalog.components.by_category(category)
        }
    };
    Ok(Json(json!({
        "components": components,
        "templates": catalog.templates.list(),
        "color_schemes": catalog.color_schemes.list(),
    })))
}

async fn get_site(
    State(ctx): State<AppContext>,
    Path(site): Path<String>,
) -> ApiResult<Json<SiteConfig>> {
    Ok(Json(ctx.generator.store().get_site_config(&site).await?))
}

async fn init_site(
    State(ctx): State<AppContext>,
    Path(site): Path<String>,
    Json(init): Json<SiteInit>,
) -> ApiResult<(StatusCode, Json<SiteConfig>)> {
    let config = ctx.generator.init_site(&site, init).await?;
    Ok((StatusCode::CREATED, Json(config)))
}

async fn update_settings(
    State(ctx): State<AppContext>,
    Path(site): Path<String>,
    Json(update): Json<SettingsUpdate>,
) -> ApiResult<Json<SettingsOutcome>> {
    Ok(Json(ctx.generator.update_settings(&site, update).await?))
}

async fn list_pages(
    State(ctx): State<AppContext>,
    Path(site): Path<String>,
) -> ApiResult<Json<Vec<PageSummary>>> {
    Ok(Json(ctx.generator.store().list_pages(&site).await?))
}

async fn add_page(
    State(ctx): State<AppContext>,
    Path(site): Path<String>,
    Json(new_page): Json<NewPage>,
) -> ApiResult<(StatusCode, Json<PageDocument>)> {
    let page = ctx.generator.add_page(&site, new_page).await?;
    Ok((StatusCode::CREATED, Json(page)))
}

async fn get_page(
    State(ctx): State<AppContext>,
    Path((site, page)): Path<(String, String)>,
) -> ApiResult<Json<PageDocument>> {
    Ok(Json(ctx.generator.store().get_page(&site, &page).await?))
}

async fn save_page(
    State(ctx): State<AppContext>,
    Path((site, page)): Path<(String, String)>,
    Json(update): Json<PageUpdate>,
) -> ApiResult<Json<PageDocument>> {
    Ok(Json(ctx.generator.save_page(&site, &page, update).await?))
}

async fn delete_page(
    State(ctx): State<AppContext>,
    Path((site, page)): Path<(String, String)>,
) -> ApiResult<StatusCode> {
    ctx.generator.delete_page(&site, &page).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn copy_page(
    State(ctx): State<AppContext>,
    Path((site, page)): Path<(String, String)>,
    Json(new_page): Json<NewPage>,
) -> ApiResult<(StatusCode, Json<PageDocument>)> {
    let copy = ctx.generator.copy_page(&site, &page, new_page).await?;
    Ok((StatusCode::CREATED, Json(copy)))
}

async fn page_issues(
    State(ctx): State<AppContext>,
    Path((site, page)): Path<(String, String)>,
) -> ApiResult<Json<ValidationReport>> {
    Ok(Json(ctx.generator.page_issues(&site, &page).await?))
}

async fn publish_page(
    State(ctx): State<AppContext>,
    Path((site, page)): Path<(String, String)>,
) -> ApiResult<Json<PublishedArtifact>> {
    Ok(Json(ctx.generator.publish_page(&site, &page).await?))
}

async fn publish_all(
    State(ctx): State<AppContext>,
    Path(site): Path<String>,
) -> ApiResult<Json<PublishReport>> {
    Ok(Json(ctx.generator.publish_all(&site).await?))
}

/// Render an unsaved document; nothing is stored
async fn preview_page(
    State(ctx): State<AppContext>,
    Path(site): Path<String>,
    Json(page): Json<PageDocument>,
) -> ApiResult<Html<String>> {
    Ok(Html(ctx.generator.render_preview(&site, &page).await?))
}

async fn preview_component(
    State(ctx): State<AppContext>,
    Path(site): Path<String>,
    Json(preview): Json<ComponentPreview>,
) -> ApiResult<Html<String>> {
    let html = ctx
        .generator
        .render_component_preview(&site, &preview.component_type, preview.data)
        .await?;
    Ok(Html(html))
}

async fn list_assets(
    State(ctx): State<AppContext>,
    Path(site): Path<String>,
) -> ApiResult<Json<Vec<AssetInfo>>> {
    Ok(Json(ctx.assets.list_assets(&site).await?))
}

/// Multipart upload; the image is the part named `file`
async fn upload_asset(
    State(ctx): State<AppContext>,
    Path(site): Path<String>,
    mut multipart: Multipart,
) -> ApiResult<(StatusCode, Json<UploadedAsset>)> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field.file_name().unwrap_or("upload").to_string();
        let media_type = match field.content_type() {
            Some(media_type) => media_type.to_string(),
            None => mime_guess::from_path(&filename)
                .first_or_octet_stream()
                .to_string(),
        };
        let bytes = field.bytes().await?;
        let asset = ctx
            .assets
            .upload(&site, &filename, &media_type, bytes.to_vec())
            .await?;
        return Ok((StatusCode::CREATED, Json(asset)));
    }
    Err(ApiError::bad_request("Multipart body has no 'file' part"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use axum::http::{Method, Request, header};
    use site_builder_core::{AppConfig, Catalog};
    use site_builder_store::{MemoryStorage, NoopInvalidator};
    use std::sync::Arc;
    use tower::ServiceExt;

    fn app() -> Router {
        router(AppContext::new(
            Arc::new(MemoryStorage::new()),
            Catalog::builtin().unwrap(),
            &AppConfig::default(),
            Arc::new(NoopInvalidator),
        ))
    }

    async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, String) {
        let request = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => request
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => request.body(Body::empty()),
        }
        .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    async fn init(app: &Router) {
        let (status, _) = send(
            app,
            Method::POST,
            "/api/sites/example.com",
            Some(json!({ "template_id": "default", "site_name": "Example" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    fn multipart_body(boundary: &str, media_type: &str, bytes: &[u8]) -> Vec<u8> {
        let mut body = format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"doc.pdf\"\r\nContent-Type: {media_type}\r\n\r\n"
        )
        .into_bytes();
        body.extend_from_slice(bytes);
        body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
        body
    }

    #[test]
    fn test_status_for_error_kinds() {
        assert_eq!(status_for(ErrorKind::NotFound), StatusCode::NOT_FOUND);
        assert_eq!(
            status_for(ErrorKind::Validation),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(status_for(ErrorKind::Conflict), StatusCode::CONFLICT);
        assert_eq!(
            status_for(ErrorKind::Storage),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status_for(ErrorKind::Render),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn test_catalog_filters_components_by_category() {
        let app = app();
        let (status, body) = send(&app, Method::GET, "/api/catalog", None).await;
        assert_eq!(status, StatusCode::OK);
        let all: Value = serde_json::from_str(&body).unwrap();
        let total = all["components"].as_array().unwrap().len();

        let (status, body) = send(&app, Method::GET, "/api/catalog?category=footer", None).await;
        assert_eq!(status, StatusCode::OK);
        let filtered: Value = serde_json::from_str(&body).unwrap();
        let footers = filtered["components"].as_array().unwrap();
        assert!(!footers.is_empty());
        assert!(footers.len() < total);
        assert!(footers.iter().all(|c| c["category"] == "footer"));
        assert!(!filtered["templates"].as_array().unwrap().is_empty());

        let (status, body) = send(&app, Method::GET, "/api/catalog?category=carousel", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.contains("carousel"));
    }

    #[tokio::test]
    async fn test_init_twice_conflicts() {
        let app = app();
        init(&app).await;

        let (status, body) = send(
            &app,
            Method::POST,
            "/api/sites/example.com",
            Some(json!({ "template_id": "default", "site_name": "Again" })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert!(body.contains("already initialized"));
    }

    #[tokio::test]
    async fn test_missing_site_and_page_are_not_found() {
        let app = app();
        let (status, _) = send(&app, Method::GET, "/api/sites/example.com", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        init(&app).await;
        let (status, body) = send(&app, Method::GET, "/api/sites/example.com/pages/nope", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body.contains("nope"));
    }

    #[tokio::test]
    async fn test_page_lifecycle() {
        let app = app();
        init(&app).await;

        let (status, body) = send(
            &app,
            Method::POST,
            "/api/sites/example.com/pages",
            Some(json!({ "title": "About" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let page: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(page["id"], "about");

        let (status, body) = send(&app, Method::GET, "/api/sites/example.com/pages", None).await;
        assert_eq!(status, StatusCode::OK);
        let pages: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(pages.as_array().unwrap().len(), 2);

        let (status, body) = send(
            &app,
            Method::PUT,
            "/api/sites/example.com/pages/about",
            Some(json!({ "title": "About Us" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("About Us"));

        let (status, _) = send(&app, Method::DELETE, "/api/sites/example.com/pages/about", None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = send(&app, Method::GET, "/api/sites/example.com/pages/about", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_saving_undeclared_slot_is_unprocessable() {
        let app = app();
        init(&app).await;

        let (status, body) = send(
            &app,
            Method::PUT,
            "/api/sites/example.com/pages/index",
            Some(json!({ "slots": { "nowhere": [] } })),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body.contains("nowhere"));
    }

    #[tokio::test]
    async fn test_component_preview() {
        let app = app();
        let (status, body) = send(
            &app,
            Method::POST,
            "/api/sites/example.com/preview/component",
            Some(json!({ "component_type": "text-heading", "data": { "heading": "Hello there" } })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("Hello there"));

        let (status, _) = send(
            &app,
            Method::POST,
            "/api/sites/example.com/preview/component",
            Some(json!({ "component_type": "carousel" })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_publish_all_reports_pages() {
        let app = app();
        init(&app).await;

        let (status, body) = send(&app, Method::POST, "/api/sites/example.com/publish", None).await;
        assert_eq!(status, StatusCode::OK);
        let report: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(report["published"][0]["path"], "index.html");
        assert!(report["failed"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_upload_rejects_pdf() {
        let app = app();
        let boundary = "X-BOUNDARY";
        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/sites/example.com/assets")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", boundary),
            )
            .body(Body::from(multipart_body(
                boundary,
                "application/pdf",
                b"%PDF-1.7",
            )))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_upload_without_file_part() {
        let app = app();
        let boundary = "X-BOUNDARY";
        let body = format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"note\"\r\n\r\nhello\r\n--{boundary}--\r\n"
        );
        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/sites/example.com/assets")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", boundary),
            )
            .body(Body::from(body))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
