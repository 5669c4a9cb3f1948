//! Reload script injection middleware.
//!
//! HTML responses are buffered in full, the reconnect script is inserted
//! right after the first `<head>`, and `content-length` is recomputed from the
//! new byte length. Buffering defeats streaming for HTML bodies, which is
//! acceptable for a development server. Everything else is forwarded
//! untouched, body and headers alike.

use axum::body::{Body, to_bytes};
use axum::extract::{Request, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use super::LiveReload;

/// Marker the script is inserted after.
const HEAD_MARKER: &[u8] = b"<head>";

/// Middleware entry point, used with `axum::middleware::from_fn_with_state`.
pub(crate) async fn inject_reload_script(
    State(live_reload): State<LiveReload>,
    request: Request,
    next: Next,
) -> Response {
    let response = next.run(request).await;

    if !is_html(response.headers()) {
        return response;
    }

    let (mut parts, body) = response.into_parts();
    let buffered = match to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::error!(error = %e, "Failed to buffer HTML response for live reload");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let Some(injected) = inject_script(&buffered, live_reload.script().as_bytes()) else {
        tracing::debug!("HTML response without <head>, live reload script not injected");
        return Response::from_parts(parts, Body::from(buffered));
    };

    parts
        .headers
        .insert(header::CONTENT_LENGTH, HeaderValue::from(injected.len()));
    Response::from_parts(parts, Body::from(injected))
}

/// Whether the response declares an HTML content type.
fn is_html(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.get(.."text/html".len()))
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("text/html"))
}

/// Insert `script` after the first `<head>` in `body`.
///
/// Returns `None` when the marker is absent.
fn inject_script(body: &[u8], script: &[u8]) -> Option<Vec<u8>> {
    let at = body
        .windows(HEAD_MARKER.len())
        .position(|window| window == HEAD_MARKER)?
        + HEAD_MARKER.len();

    let mut injected = Vec::with_capacity(body.len() + script.len());
    injected.extend_from_slice(&body[..at]);
    injected.extend_from_slice(script);
    injected.extend_from_slice(&body[at..]);
    Some(injected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Router;
    use axum::routing::get;
    use pretty_assertions::assert_eq;
    use tower::ServiceExt;

    const PAGE: &str = "<html><head></head><body>hi</body></html>";

    /// Router with one route answering `body` with `content_type`.
    fn app(live_reload: &LiveReload, content_type: &'static str, body: &'static str) -> Router {
        let router = Router::new().route(
            "/page",
            get(move || async move { ([(header::CONTENT_TYPE, content_type)], body) }),
        );
        live_reload.attach(router)
    }

    async fn fetch(router: Router) -> (HeaderMap, Vec<u8>) {
        let request = Request::builder().uri("/page").body(Body::empty()).unwrap();
        let response = router.oneshot(request).await.unwrap();
        let headers = response.headers().clone();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (headers, body.to_vec())
    }

    fn content_length(headers: &HeaderMap) -> Option<usize> {
        headers
            .get(header::CONTENT_LENGTH)
            .map(|value| value.to_str().unwrap().parse().unwrap())
    }

    #[tokio::test]
    async fn test_html_gets_script_after_head() {
        let live_reload = LiveReload::default();
        let (headers, body) = fetch(app(&live_reload, "text/html; charset=utf-8", PAGE)).await;

        let expected = format!(
            "<html><head>{}</head><body>hi</body></html>",
            live_reload.script()
        );
        assert_eq!(String::from_utf8(body.clone()).unwrap(), expected);
        assert_eq!(content_length(&headers), Some(body.len()));
    }

    #[tokio::test]
    async fn test_content_length_counts_bytes() {
        let live_reload = LiveReload::default();
        let page = "<html><head><title>Грузовик 🚚</title></head><body>ü</body></html>";
        let (headers, body) = fetch(app(&live_reload, "text/html", page)).await;

        assert_eq!(body.len(), page.len() + live_reload.script().len());
        assert_eq!(content_length(&headers), Some(body.len()));
    }

    #[tokio::test]
    async fn test_json_passes_through_unchanged() {
        let live_reload = LiveReload::default();
        let (headers, body) = fetch(app(&live_reload, "application/json", r#"{"a":1}"#)).await;

        assert_eq!(body, br#"{"a":1}"#);
        assert_eq!(content_length(&headers), Some(7));
    }

    #[tokio::test]
    async fn test_html_without_head_is_unchanged() {
        let live_reload = LiveReload::default();
        let page = "<html><body>no head here</body></html>";
        let (headers, body) = fetch(app(&live_reload, "text/html", page)).await;

        assert_eq!(body, page.as_bytes());
        assert_eq!(content_length(&headers), Some(page.len()));
    }

    #[tokio::test]
    async fn test_only_first_head_is_used() {
        let live_reload = LiveReload::default();
        let page = "<head></head><pre>&lt;head&gt; or <head></pre>";
        let (_, body) = fetch(app(&live_reload, "text/html", page)).await;

        let body = String::from_utf8(body).unwrap();
        assert_eq!(body.matches(live_reload.script()).count(), 1);
        assert!(body.starts_with(&format!("<head>{}</head>", live_reload.script())));
    }

    #[tokio::test]
    async fn test_heartbeat_route_is_not_buffered() {
        let live_reload = LiveReload::default();
        live_reload.shutdown().fire();
        let router = live_reload.attach(Router::new());

        let request = Request::builder()
            .uri("/simplereload")
            .body(Body::empty())
            .unwrap();
        let response = router.oneshot(request).await.unwrap();
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/event-stream");
        assert!(response.headers().get(header::CONTENT_LENGTH).is_none());
    }

    #[test]
    fn test_inject_script_positions() {
        assert_eq!(
            inject_script(b"<head>rest", b"S").as_deref(),
            Some(&b"<head>Srest"[..])
        );
        assert_eq!(
            inject_script(b"x<head>", b"S").as_deref(),
            Some(&b"x<head>S"[..])
        );
        assert_eq!(inject_script(b"<HEAD>", b"S"), None);
        assert_eq!(inject_script(b"<hea", b"S"), None);
        assert_eq!(inject_script(b"", b"S"), None);
    }

    #[test]
    fn test_is_html() {
        let mut headers = HeaderMap::new();
        assert!(!is_html(&headers));

        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/html"));
        assert!(is_html(&headers));

        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("Text/HTML; charset=utf-8"),
        );
        assert!(is_html(&headers));

        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/plain"));
        assert!(!is_html(&headers));

        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text"));
        assert!(!is_html(&headers));
    }
}
