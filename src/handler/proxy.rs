use super::errors::ProxyError;
use super::headers;
use super::state::ProxyState;
use crate::metrics::consts as crate_metrics;

use anyhow::Context;
use axum::{
    body::{Body, HttpBody},
    extract::{ConnectInfo, Request, State},
    http,
    response::IntoResponse,
};
use reqwest::Url;
use std::net::SocketAddr;
use std::time::Instant;
use tracing::instrument;

fn uuid() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[instrument(skip_all, err, level = tracing::Level::DEBUG, fields(request_id=uuid()))]
pub(crate) async fn proxy(
    State(state): State<ProxyState>,
    client_request: Request<Body>,
) -> Result<impl IntoResponse, ProxyError> {
    tracing::debug!(?client_request);

    let proxy_request_method = client_request.method().clone();
    let proxy_request_path_and_query = client_request
        .uri()
        .path_and_query()
        .map(|pq| pq.to_string())
        .unwrap_or_default();
    let proxy_request_url = upstream_url(&state.upstream, &proxy_request_path_and_query)
        .map_err(ProxyError::BadRequest)?;

    let client_ip = client_request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip());
    let (client_request_parts, client_request_body) = client_request.into_parts();
    let client_host = client_request_parts.headers.get(http::header::HOST).cloned();

    let mut proxy_request_headers = headers::without_hop_by_hop(&client_request_parts.headers);
    if state.config.change_origin {
        // reqwest derives Host from the upstream URL when none is given.
        proxy_request_headers.remove(http::header::HOST);
    }
    if state.config.x_forwarded {
        if let Some(client_ip) = client_ip {
            headers::append_forwarded(&mut proxy_request_headers, client_ip, client_host.as_ref())?;
        }
    }

    tracing::debug!(?proxy_request_headers, %proxy_request_url);

    let mut proxy_request = state
        .http_client
        .request(proxy_request_method.clone(), proxy_request_url)
        .headers(proxy_request_headers);
    if client_request_body.size_hint().exact() != Some(0) {
        proxy_request = proxy_request.body(reqwest::Body::wrap_stream(
            client_request_body.into_data_stream(),
        ));
    }

    let response_timeout = state.config.response_timeout();
    let connect_timeout = state.config.connect_timeout();
    let reqwest_start = Instant::now();
    let server_response = tokio::time::timeout(response_timeout, proxy_request.send())
        .await
        .map_err(|_| ProxyError::UpstreamTimeout(response_timeout))
        .and_then(|sent| sent.map_err(|error| ProxyError::from_upstream(error, connect_timeout)))
        .inspect_err(record_upstream_failure)?;

    metrics::histogram!(crate_metrics::UPSTREAM_REQUEST_DURATION_SECS)
        .record(reqwest_start.elapsed().as_secs_f64());

    let server_response_status = server_response.status();
    let mut proxy_response_headers = headers::without_hop_by_hop(server_response.headers());
    headers::apply_cors(&mut proxy_response_headers);

    tracing::info!(
        %server_response_status,
        %proxy_request_method,
        proxy_request_path_and_query,
    );

    let server_response_body_stream = server_response.bytes_stream();
    let proxy_response_body_stream = Body::from_stream(server_response_body_stream);

    Ok((
        server_response_status,
        proxy_response_headers,
        proxy_response_body_stream,
    ))
}

/// Appends an origin-form request target to the upstream origin, keeping any
/// base path the upstream was configured with.
fn upstream_url(upstream: &Url, path_and_query: &str) -> anyhow::Result<Url> {
    anyhow::ensure!(
        path_and_query.starts_with('/'),
        "Request target \"{path_and_query}\" is not an origin-form path"
    );
    let base = upstream.as_str().trim_end_matches('/');
    Url::parse(&format!("{base}{path_and_query}"))
        .with_context(|| format!("Couldn't build upstream URL for \"{path_and_query}\""))
}

fn record_upstream_failure(error: &ProxyError) {
    match error {
        ProxyError::UpstreamTimeout(_) => {
            metrics::counter!(crate_metrics::UPSTREAM_TIMEOUT).increment(1)
        }
        ProxyError::UpstreamUnreachable(_) => {
            metrics::counter!(crate_metrics::UPSTREAM_UNREACHABLE).increment(1)
        }
        _ => {}
    }
}
