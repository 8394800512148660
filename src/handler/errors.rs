use std::time::Duration;

use axum::{
    http::{self, HeaderMap},
    response::{IntoResponse, Response},
};

use super::headers;

pub(crate) enum ProxyError {
    BadRequest(anyhow::Error),
    UpstreamUnreachable(anyhow::Error),
    UpstreamTimeout(Duration),
    Internal(anyhow::Error),
}

impl ProxyError {
    /// Sorts a failed upstream call into unreachable or timed out.
    pub(crate) fn from_upstream(error: reqwest::Error, timeout: Duration) -> Self {
        if error.is_timeout() {
            Self::UpstreamTimeout(timeout)
        } else {
            Self::UpstreamUnreachable(error.into())
        }
    }

    pub(crate) fn status(&self) -> http::StatusCode {
        match self {
            ProxyError::BadRequest(_) => http::StatusCode::BAD_REQUEST,
            ProxyError::UpstreamUnreachable(_) => http::StatusCode::BAD_GATEWAY,
            ProxyError::UpstreamTimeout(_) => http::StatusCode::GATEWAY_TIMEOUT,
            ProxyError::Internal(_) => http::StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl std::fmt::Display for ProxyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProxyError::BadRequest(error) => write!(f, "Bad request: {:#}", error),
            ProxyError::UpstreamUnreachable(error) => {
                write!(f, "Upstream unreachable: {:#}", error)
            }
            ProxyError::UpstreamTimeout(timeout) => {
                write!(f, "Upstream did not respond within {}ms", timeout.as_millis())
            }
            ProxyError::Internal(error) => write!(f, "{:#}", error),
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let mut response_headers = HeaderMap::new();
        headers::apply_cors(&mut response_headers);
        (
            self.status(),
            response_headers,
            format!("ERROR: {}", self),
        )
            .into_response()
    }
}

impl<E> From<E> for ProxyError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self::Internal(err.into())
    }
}
