use crate::metrics::consts::*;
use std::time::Instant;

use axum::{
    extract::Request,
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use metrics::{counter, histogram};

pub(crate) async fn metrics(request: Request, next: Next) -> Response {
    let start = Instant::now();

    // Bodies are streamed through, so sizes come from the declared lengths.
    if let Some(request_size) = content_length(request.headers()) {
        histogram!(HTTP_REQUEST_SIZE_BYTES).record(request_size);
    }

    let response = next.run(request).await;

    if let Some(response_size) = content_length(response.headers()) {
        histogram!(HTTP_RESPONSE_SIZE_BYTES).record(response_size);
    }

    // This could be the upstream or the proxy itself.
    if response.status().is_server_error() {
        counter!(PROXY_HTTP_SERVER_ERROR).increment(1)
    }

    if response.status().is_success() {
        counter!(HTTP_RESPONSE_SUCCESS).increment(1)
    } else {
        counter!(HTTP_RESPONSE_FAILURE).increment(1)
    }

    histogram!(HTTP_REQUEST_DURATION_SECS).record(start.elapsed().as_secs_f64());

    response
}

fn content_length(headers: &HeaderMap) -> Option<f64> {
    headers
        .get(header::CONTENT_LENGTH)?
        .to_str()
        .ok()?
        .parse::<u64>()
        .ok()
        .map(|length| length as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn content_length_from_header() {
        let mut headers = HeaderMap::new();
        assert_eq!(content_length(&headers), None);

        headers.insert(header::CONTENT_LENGTH, HeaderValue::from_static("1024"));
        assert_eq!(content_length(&headers), Some(1024.0));

        headers.insert(header::CONTENT_LENGTH, HeaderValue::from_static("lots"));
        assert_eq!(content_length(&headers), None);
    }
}
