use anyhow::{Context, Result};
use axum::{
    Router,
    extract::{Path, State},
    http::{StatusCode, header},
    response::{
        Html, IntoResponse, Response,
        sse::{Event, KeepAlive, Sse},
    },
    routing::get,
};
use notify::{Event as NotifyEvent, EventKind, RecursiveMode, Watcher};
use site_builder_core::PageDocument;
use site_builder_generator::html::html_escape;
use site_builder_store::layout::{ASSETS_DIR, BUILDER_DIR};
use std::{net::SocketAddr, path::PathBuf};
use tokio::sync::broadcast;

use crate::context::AppContext;

/// Appended to every previewed page; published pages never carry it
const RELOAD_SCRIPT: &str = r#"<script>
    // Live reload via Server-Sent Events
    const eventSource = new EventSource('/_reload');
    eventSource.onmessage = () => {
        console.log('Reloading...');
        location.reload();
    };
    eventSource.onerror = () => {
        console.log('Preview server disconnected');
        eventSource.close();
    };
</script>
"#;

#[derive(Clone)]
struct AppState {
    ctx: AppContext,
    site: String,
    reload_tx: broadcast::Sender<()>,
}

/// Serve a site's stored pages, rendered on every request, and reload the
/// browser when documents change.
///
/// Pages are rendered exactly as they would be published; only the reload
/// script is added. Live reload watches the document directory, so it needs
/// the filesystem backend.
pub async fn run(ctx: AppContext, site: String, port: u16) -> Result<()> {
    println!("🔎 Starting preview server...");
    println!("   Site: {}", site);

    let config = ctx
        .generator
        .store()
        .get_site_config(&site)
        .await
        .with_context(|| format!("Run 'sitebuilder init {}' first", site))?;

    println!("   ✓ Name: {}", config.site_name);
    println!("   ✓ Template: {}", config.template_id);
    println!("   ✓ Pages: {}", config.pages.len());

    let (reload_tx, _) = broadcast::channel::<()>(100);

    match &ctx.fs_root {
        Some(root) => {
            let watcher_path = root.join(&site).join(BUILDER_DIR);
            let watcher_tx = reload_tx.clone();
            tokio::spawn(async move {
                if let Err(e) = watch_files(watcher_path, watcher_tx).await {
                    eprintln!("File watcher error: {}", e);
                }
            });
        }
        None => println!("   ℹ Live reload is only available with filesystem storage"),
    }

    let app = router(AppState {
        ctx,
        site,
        reload_tx,
    });

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    println!("\n🚀 Preview ready at: http://localhost:{}", port);
    println!("   Press Ctrl+C to stop\n");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to port")?;

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/_reload", get(sse_handler))
        .route("/assets/images/{file}", get(asset_handler))
        .route("/{file}", get(page_handler))
        .with_state(state)
}

/// Watch the document directory and trigger reload on changes
async fn watch_files(path: PathBuf, reload_tx: broadcast::Sender<()>) -> Result<()> {
    let (tx, mut rx) = tokio::sync::mpsc::channel(100);

    let mut watcher =
        notify::recommended_watcher(move |res: Result<NotifyEvent, notify::Error>| {
            if let Ok(event) = res {
                let _ = tx.blocking_send(event);
            }
        })?;

    watcher.watch(&path, RecursiveMode::Recursive)?;

    while let Some(event) = rx.recv().await {
        match event.kind {
            EventKind::Modify(_) | EventKind::Create(_) | EventKind::Remove(_) => {
                // Storage writes go through a temp file; only the JSON matters
                if event
                    .paths
                    .iter()
                    .any(|p| p.extension().is_some_and(|ext| ext == "json"))
                {
                    println!("   📝 Document changed, reloading...");
                    let _ = reload_tx.send(());
                }
            }
            _ => {}
        }
    }

    Ok(())
}

/// SSE endpoint for live reload
async fn sse_handler(
    State(state): State<AppState>,
) -> Sse<impl futures::Stream<Item = Result<Event, std::convert::Infallible>>> {
    let mut rx = state.reload_tx.subscribe();

    let stream = async_stream::stream! {
        loop {
            if rx.recv().await.is_ok() {
                yield Ok(Event::default().data("reload"));
            }
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::default())
}

async fn index_handler(State(state): State<AppState>) -> Response {
    render_artifact(&state, "index.html").await
}

async fn page_handler(State(state): State<AppState>, Path(file): Path<String>) -> Response {
    render_artifact(&state, &artifact_for_request(&file)).await
}

/// Uploaded images, served from storage with a guessed content type
async fn asset_handler(State(state): State<AppState>, Path(file): Path<String>) -> Response {
    let key = format!("{}/{}/{}", state.site, ASSETS_DIR, file);
    match state.ctx.storage.read(&key).await {
        Ok(bytes) => {
            let media_type = mime_guess::from_path(&file).first_or_octet_stream();
            ([(header::CONTENT_TYPE, media_type.to_string())], bytes).into_response()
        }
        Err(_) => StatusCode::NOT_FOUND.into_response(),
    }
}

/// `about`, `about.html` and `/about.html` all name `about.html`
fn artifact_for_request(file: &str) -> String {
    let file = file.trim_start_matches('/');
    if file.is_empty() {
        return "index.html".to_string();
    }
    match file.strip_suffix(".html") {
        Some(_) => file.to_string(),
        None => format!("{}.html", file),
    }
}

async fn render_artifact(state: &AppState, artifact: &str) -> Response {
    let store = state.ctx.generator.store();
    let config = match store.get_site_config(&state.site).await {
        Ok(config) => config,
        Err(e) => return error_page(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()),
    };
    let pages: Vec<PageDocument> = match store.load_pages(&state.site).await {
        Ok(pages) => pages,
        Err(e) => return error_page(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()),
    };

    let Some(page) = pages.iter().find(|p| p.artifact_path() == artifact) else {
        return error_page(
            StatusCode::NOT_FOUND,
            &format!("No page of {} is published as {}", state.site, artifact),
        );
    };

    match state.ctx.generator.render_page(page, &config) {
        Ok(html) => Html(inject_reload_script(&html)).into_response(),
        Err(e) => error_page(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()),
    }
}

fn inject_reload_script(html: &str) -> String {
    match html.rfind("</body>") {
        Some(pos) => format!("{}{}{}", &html[..pos], RELOAD_SCRIPT, &html[pos..]),
        None => format!("{}{}", html, RELOAD_SCRIPT),
    }
}

fn error_page(status: StatusCode, message: &str) -> Response {
    let body = format!(
        r#"<!DOCTYPE html>
<html><head><title>Preview error</title></head><body>
<h1>Preview error</h1>
<pre>{}</pre>
{}</body></html>"#,
        html_escape(message),
        RELOAD_SCRIPT
    );
    (status, Html(body)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use site_builder_core::{AppConfig, Catalog};
    use site_builder_generator::{NewPage, SiteInit};
    use site_builder_store::{MemoryStorage, NoopInvalidator};
    use std::sync::Arc;
    use tower::ServiceExt;

    async fn preview_state() -> AppState {
        let ctx = AppContext::new(
            Arc::new(MemoryStorage::new()),
            Catalog::builtin().unwrap(),
            &AppConfig::default(),
            Arc::new(NoopInvalidator),
        );
        ctx.generator
            .init_site(
                "example.com",
                SiteInit {
                    template_id: "default".to_string(),
                    color_scheme_id: None,
                    site_name: "Example".to_string(),
                },
            )
            .await
            .unwrap();
        let (reload_tx, _) = broadcast::channel(4);
        AppState {
            ctx,
            site: "example.com".to_string(),
            reload_tx,
        }
    }

    async fn get(app: Router, uri: &str) -> (StatusCode, String) {
        let response = app
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    #[test]
    fn test_inject_reload_script_before_body_end() {
        let html = "<html><body><p>hi</p></body></html>";
        let injected = inject_reload_script(html);
        assert!(injected.starts_with("<html><body><p>hi</p><script>"));
        assert!(injected.ends_with("</script>\n</body></html>"));
    }

    #[test]
    fn test_inject_reload_script_without_body() {
        let injected = inject_reload_script("<p>fragment</p>");
        assert!(injected.starts_with("<p>fragment</p><script>"));
    }

    #[test]
    fn test_artifact_for_request() {
        assert_eq!(artifact_for_request(""), "index.html");
        assert_eq!(artifact_for_request("about"), "about.html");
        assert_eq!(artifact_for_request("about.html"), "about.html");
        assert_eq!(artifact_for_request("/index.html"), "index.html");
    }

    #[tokio::test]
    async fn test_serves_published_html_plus_reload_script() {
        let state = preview_state().await;
        let store = state.ctx.generator.store();
        let config = store.get_site_config("example.com").await.unwrap();
        let root = store.get_page("example.com", "index").await.unwrap();
        let published = state.ctx.generator.render_page(&root, &config).unwrap();

        let (status, body) = get(router(state), "/").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, inject_reload_script(&published));
    }

    #[tokio::test]
    async fn test_serves_pages_by_artifact_name() {
        let state = preview_state().await;
        state
            .ctx
            .generator
            .add_page("example.com", NewPage::new("About Us"))
            .await
            .unwrap();

        let (status, body) = get(router(state.clone()), "/about-us.html").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("About Us"));

        let (status, body) = get(router(state), "/missing.html").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body.contains("missing.html"));
    }

    #[tokio::test]
    async fn test_missing_asset_is_not_found() {
        let state = preview_state().await;
        let (status, _) = get(router(state), "/assets/images/nope.png").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
