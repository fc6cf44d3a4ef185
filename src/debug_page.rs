//! Development error pages.
//!
//! Renders a plain 500 HTML page for an [`ExceptionRecord`] and attaches the
//! record to the response extensions, where the error renderer picks it up.
//! [`render_panic`] does the same for panics caught by
//! `tower_http::catch_panic::CatchPanicLayer`.

use axum::body::Body;
use axum::response::{IntoResponse, Response};
use http::{header, HeaderValue, StatusCode};
use std::any::Any;

use crate::context::ExceptionRecord;
use crate::render::escape_html;

/// Render the debug page HTML for a record
pub fn render_html(record: &ExceptionRecord) -> String {
    let title = record.kind.as_deref().unwrap_or("Internal Server Error");
    let frames: String = record
        .backtrace
        .iter()
        .map(|frame| format!("{}\n", escape_html(frame)))
        .collect();

    format!(
        "<!DOCTYPE html>\n<html>\n<head><title>{title}</title></head>\n<body><h1>{title}</h1>\n<pre class=\"message\">{message}</pre>\n<pre class=\"backtrace\">{frames}</pre>\n</body>\n</html>\n",
        title = escape_html(title),
        message = escape_html(&record.message),
        frames = frames,
    )
}

impl IntoResponse for ExceptionRecord {
    fn into_response(self) -> Response {
        let html = render_html(&self);
        let mut response = Response::new(Body::from(html));
        *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
        response.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/html; charset=utf-8"),
        );
        response.extensions_mut().insert(self);
        response
    }
}

/// Panic handler for `CatchPanicLayer::custom`
pub fn render_panic(payload: Box<dyn Any + Send + 'static>) -> Response<Body> {
    let message = if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "panic with a non-string payload".to_string()
    };

    tracing::error!("handler panicked: {}", message);
    ExceptionRecord::new(message).with_kind("panic").into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    #[test]
    fn test_render_html_escapes() {
        let record = ExceptionRecord::new("expected <User>")
            .with_kind("TypeError")
            .with_frame("src/users.rs:12:5");
        let html = render_html(&record);

        assert!(html.contains("<body><h1>TypeError</h1>"));
        assert!(html.contains("expected &lt;User&gt;"));
        assert!(html.contains("src/users.rs:12:5"));
    }

    #[tokio::test]
    async fn test_into_response_carries_record() {
        let record = ExceptionRecord::new("boom").with_frame("src/lib.rs:1");
        let response = record.clone().into_response();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "text/html; charset=utf-8"
        );
        assert_eq!(response.extensions().get::<ExceptionRecord>(), Some(&record));

        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert!(String::from_utf8_lossy(&body).contains("<body>"));
    }

    #[test]
    fn test_render_panic_payloads() {
        let response = render_panic(Box::new("static str"));
        let record = response.extensions().get::<ExceptionRecord>().unwrap();
        assert_eq!(record.message, "static str");
        assert_eq!(record.kind.as_deref(), Some("panic"));

        let response = render_panic(Box::new(String::from("owned")));
        assert_eq!(
            response.extensions().get::<ExceptionRecord>().unwrap().message,
            "owned"
        );

        let response = render_panic(Box::new(42_u32));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
