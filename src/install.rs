//! Mounting the error renderer on an axum router.
//!
//! The renderer sits directly outside the panic-catching debug page layer so
//! it sees the rendered 500 page. Outside development mode the router is
//! returned unchanged.

use anyhow::Result;
use axum::error_handling::HandleErrorLayer;
use axum::response::{IntoResponse, Response};
use axum::Router;
use http::StatusCode;
use tower::{BoxError, ServiceBuilder};
use tower_http::catch_panic::CatchPanicLayer;

use crate::config::Config;
use crate::debug_page::render_panic;
use crate::middleware::ErrorRendererLayer;

/// Install the debug page and error renderer when `config` is in development mode
pub fn install(router: Router, config: &Config) -> Result<Router> {
    if !config.is_development() {
        tracing::debug!(environment = %config.environment, "error renderer not installed");
        return Ok(router);
    }

    let layer = ErrorRendererLayer::from_config(config)?;
    Ok(install_with(router, layer))
}

/// Install a preconfigured renderer layer
pub fn install_with(router: Router, layer: ErrorRendererLayer) -> Router {
    tracing::info!("installing error renderer middleware");

    router.layer(CatchPanicLayer::custom(render_panic)).layer(
        ServiceBuilder::new()
            .layer(HandleErrorLayer::new(handle_renderer_error))
            .layer(layer),
    )
}

async fn handle_renderer_error(err: BoxError) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        format!("Error renderer failed: {}", err),
    )
        .into_response()
}
