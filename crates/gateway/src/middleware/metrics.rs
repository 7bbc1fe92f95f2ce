//! Request metrics middleware

use abcledger_common::metrics::RequestMetrics;
use axum::{
    extract::{MatchedPath, Request},
    middleware::Next,
    response::Response,
};

/// Record count and latency per method and matched route
pub async fn track_metrics(request: Request, next: Next) -> Response {
    // Route templates keep label cardinality bounded
    let endpoint = request
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_owned())
        .unwrap_or_else(|| "unmatched".to_string());

    let metrics = RequestMetrics::start(request.method().as_str(), &endpoint);
    let response = next.run(request).await;
    metrics.finish(response.status().as_u16());

    response
}
