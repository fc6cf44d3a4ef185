//! Tower middleware that explains 500 pages inline.
//!
//! [`ErrorRendererLayer`] wraps an HTTP service. When the application is in
//! development mode and the inner service answers with a `500` HTML page,
//! the layer looks up the [`ExceptionRecord`] attached to the response (or
//! the request), asks the [`Assistant`] for an explanation, renders the AI
//! help fragment and splices it in right after `<body>`. Every other response
//! passes through untouched.

use anyhow::Result;
use axum::body::Body;
use bytes::Bytes;
use http::{header, HeaderMap, HeaderValue, Request, Response, StatusCode};
use http_body_util::BodyExt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::{BoxError, Layer, Service};

use crate::config::Config;
use crate::context::ExceptionRecord;
use crate::providers::Assistant;
use crate::render::{inject_fragment, AiHelpTemplate, RenderError, NO_EXCEPTION_INFO};
use crate::stack_trace::{extract_frame_context, SourceContextConfig, SOURCE_UNAVAILABLE};

type DevPredicate = Arc<dyn Fn() -> bool + Send + Sync>;

/// Failures inside the renderer itself
#[derive(Debug, thiserror::Error)]
pub enum InterceptError {
    #[error("Failed to read response body: {0}")]
    Body(#[source] BoxError),

    #[error(transparent)]
    Render(#[from] RenderError),
}

/// Whether a response should receive the AI help fragment.
///
/// Only 500 responses in development mode whose content type is HTML
/// qualify. A missing `Content-Type` counts as HTML.
pub fn should_intercept(is_development: bool, status: StatusCode, headers: &HeaderMap) -> bool {
    if !is_development || status != StatusCode::INTERNAL_SERVER_ERROR {
        return false;
    }

    match headers.get(header::CONTENT_TYPE) {
        None => true,
        Some(value) => value
            .to_str()
            .map(|v| v.contains("text/html"))
            .unwrap_or(false),
    }
}

/// Tower layer that injects AI help into development error pages
#[derive(Clone)]
pub struct ErrorRendererLayer {
    assistant: Assistant,
    template: AiHelpTemplate,
    source: SourceContextConfig,
    is_development: DevPredicate,
}

impl ErrorRendererLayer {
    /// Create a layer that is always active, with default template and
    /// source window settings
    pub fn new(assistant: Assistant) -> Self {
        Self {
            assistant,
            template: AiHelpTemplate::embedded(),
            source: SourceContextConfig::default(),
            is_development: Arc::new(|| true),
        }
    }

    /// Build the layer described by `config`
    pub fn from_config(config: &Config) -> Result<Self> {
        let assistant = Assistant::from_config(&config.assist)?;
        let template = match &config.template_path {
            Some(path) => AiHelpTemplate::load(path)?,
            None => AiHelpTemplate::embedded(),
        };
        let is_development = config.is_development();

        Ok(Self::new(assistant)
            .with_template(template)
            .with_source_config((&config.source).into())
            .with_development(move || is_development))
    }

    /// Decide per request whether the application runs in development mode
    pub fn with_development<F>(mut self, is_development: F) -> Self
    where
        F: Fn() -> bool + Send + Sync + 'static,
    {
        self.is_development = Arc::new(is_development);
        self
    }

    /// Override the source window settings
    pub fn with_source_config(mut self, source: SourceContextConfig) -> Self {
        self.source = source;
        self
    }

    /// Override the fragment template
    pub fn with_template(mut self, template: AiHelpTemplate) -> Self {
        self.template = template;
        self
    }
}

impl<S> Layer<S> for ErrorRendererLayer {
    type Service = ErrorRendererService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        ErrorRendererService {
            inner,
            renderer: Arc::new(Renderer {
                assistant: self.assistant.clone(),
                template: self.template.clone(),
                source: self.source.clone(),
                is_development: self.is_development.clone(),
            }),
        }
    }
}

/// Service produced by [`ErrorRendererLayer`]
#[derive(Clone)]
pub struct ErrorRendererService<S> {
    inner: S,
    renderer: Arc<Renderer>,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for ErrorRendererService<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Error: Into<BoxError>,
    ReqBody: Send + 'static,
    ResBody: http_body::Body<Data = Bytes> + Send + 'static,
    ResBody::Error: Into<BoxError>,
{
    type Response = Response<Body>;
    type Error = BoxError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx).map_err(Into::into)
    }

    fn call(&mut self, req: Request<ReqBody>) -> Self::Future {
        // The clone is not guaranteed to be ready; keep the one that was polled
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let renderer = self.renderer.clone();
        let request_record = req.extensions().get::<ExceptionRecord>().cloned();

        Box::pin(async move {
            let response = inner.call(req).await.map_err(Into::into)?;

            renderer
                .process(response, request_record)
                .await
                .map_err(|err| {
                    tracing::error!("Error in error renderer middleware: {}", err);
                    BoxError::from(err)
                })
        })
    }
}

struct Renderer {
    assistant: Assistant,
    template: AiHelpTemplate,
    source: SourceContextConfig,
    is_development: DevPredicate,
}

impl Renderer {
    async fn process<B>(
        &self,
        response: Response<B>,
        request_record: Option<ExceptionRecord>,
    ) -> Result<Response<Body>, InterceptError>
    where
        B: http_body::Body<Data = Bytes> + Send + 'static,
        B::Error: Into<BoxError>,
    {
        let (mut parts, body) = response.into_parts();
        tracing::debug!(
            status = %parts.status,
            content_type = ?parts.headers.get(header::CONTENT_TYPE),
            "error renderer called"
        );

        if !should_intercept((self.is_development)(), parts.status, &parts.headers) {
            tracing::debug!("passing through unmodified response");
            return Ok(Response::from_parts(parts, Body::new(body)));
        }

        tracing::info!("capturing and modifying error response");

        let original = body
            .collect()
            .await
            .map_err(|err| InterceptError::Body(err.into()))?
            .to_bytes();

        let record = parts
            .extensions
            .get::<ExceptionRecord>()
            .cloned()
            .or(request_record);
        let fragment = self.fragment_for(record.as_ref()).await?;

        let new_body = match inject_fragment(&original, &fragment) {
            Some(modified) => {
                tracing::info!("injected AI help into the error page");
                Bytes::from(modified)
            }
            None => {
                tracing::debug!("no <body> tag in error page, leaving body unchanged");
                original
            }
        };

        parts
            .headers
            .insert(header::CONTENT_LENGTH, HeaderValue::from(new_body.len()));

        Ok(Response::from_parts(parts, Body::from(new_body)))
    }

    async fn fragment_for(&self, record: Option<&ExceptionRecord>) -> Result<String, RenderError> {
        let Some(record) = record else {
            return self.template.render(NO_EXCEPTION_INFO);
        };

        tracing::info!("explaining: {}", record.summary());

        let (file, source) = match record.first_frame() {
            Some(frame) => {
                let window = extract_frame_context(frame, &self.source);
                if !window.location.is_known() {
                    tracing::debug!(frame, "could not locate source for frame");
                }
                (window.location.file, window.source)
            }
            None => (None, SOURCE_UNAVAILABLE.to_string()),
        };

        let text = self
            .assistant
            .explain(
                record.kind.as_deref(),
                &record.message,
                file.as_deref(),
                &source,
            )
            .await;

        self.template.render(&text)
    }
}
