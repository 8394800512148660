use std::net::IpAddr;

use axum::http::{header, HeaderMap, HeaderName, HeaderValue};

pub(crate) const ALLOW_ORIGIN: &str = "*";
pub(crate) const ALLOW_METHODS: &str = "GET, POST, PUT, DELETE, OPTIONS";
pub(crate) const ALLOW_HEADERS: &str = "Content-Type, Authorization";

pub(crate) const X_FORWARDED_FOR_HEADER_KEY: HeaderName =
    HeaderName::from_static("x-forwarded-for");
pub(crate) const X_FORWARDED_PROTO_HEADER_KEY: HeaderName =
    HeaderName::from_static("x-forwarded-proto");
pub(crate) const X_FORWARDED_HOST_HEADER_KEY: HeaderName =
    HeaderName::from_static("x-forwarded-host");

// Only plain HTTP is accepted on the listener.
const FORWARDED_PROTO: &str = "http";

const HOP_BY_HOP_HEADER_KEYS: [&str; 7] = [
    "connection",
    "keep-alive",
    "proxy-connection",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Overwrites the CORS headers so that any origin may read the response.
pub(crate) fn apply_cors(headers: &mut HeaderMap) {
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static(ALLOW_ORIGIN),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static(ALLOW_METHODS),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static(ALLOW_HEADERS),
    );
}

/// Copies `headers`, leaving out the hop-by-hop ones: the fixed set plus
/// whatever the `Connection` header names.
pub(crate) fn without_hop_by_hop(headers: &HeaderMap) -> HeaderMap {
    let connection_options = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .map(|option| option.trim().to_ascii_lowercase())
        .filter(|option| !option.is_empty())
        .collect::<Vec<_>>();

    headers
        .iter()
        .filter(|(key, _)| {
            let key = key.as_str();
            !HOP_BY_HOP_HEADER_KEYS.contains(&key)
                && !connection_options.iter().any(|option| option == key)
        })
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect::<HeaderMap>()
}

pub(crate) fn append_forwarded(
    headers: &mut HeaderMap,
    client_ip: IpAddr,
    original_host: Option<&HeaderValue>,
) -> anyhow::Result<()> {
    let forwarded_for = match headers
        .get(&X_FORWARDED_FOR_HEADER_KEY)
        .and_then(|value| value.to_str().ok())
    {
        Some(existing) if !existing.trim().is_empty() => format!("{existing}, {client_ip}"),
        _ => client_ip.to_string(),
    };
    headers.insert(X_FORWARDED_FOR_HEADER_KEY, HeaderValue::from_str(&forwarded_for)?);
    headers.insert(
        X_FORWARDED_PROTO_HEADER_KEY,
        HeaderValue::from_static(FORWARDED_PROTO),
    );
    if let Some(host) = original_host {
        headers.insert(X_FORWARDED_HOST_HEADER_KEY, host.clone());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use std::net::Ipv4Addr;

    #[test]
    fn cors_overwrites_existing_values() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_ORIGIN,
            HeaderValue::from_static("http://evil.example"),
        );
        headers.append(
            header::ACCESS_CONTROL_ALLOW_ORIGIN,
            HeaderValue::from_static("http://other.example"),
        );
        headers.insert(header::ACCESS_CONTROL_ALLOW_METHODS, HeaderValue::from_static("GET"));
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));

        apply_cors(&mut headers);

        let origins = headers
            .get_all(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .iter()
            .collect::<Vec<_>>();
        assert_eq!(origins, vec!["*"]);
        assert_eq!(
            headers[header::ACCESS_CONTROL_ALLOW_METHODS],
            "GET, POST, PUT, DELETE, OPTIONS"
        );
        assert_eq!(
            headers[header::ACCESS_CONTROL_ALLOW_HEADERS],
            "Content-Type, Authorization"
        );
        assert_eq!(headers[header::CONTENT_TYPE], "application/json");
    }

    #[test]
    fn strips_fixed_and_connection_listed_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive, X-Session-Hint"));
        headers.insert("keep-alive", HeaderValue::from_static("timeout=5"));
        headers.insert(header::TRANSFER_ENCODING, HeaderValue::from_static("chunked"));
        headers.insert(header::UPGRADE, HeaderValue::from_static("websocket"));
        headers.insert("x-session-hint", HeaderValue::from_static("abc"));
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from_static("2"));
        headers.append(header::SET_COOKIE, HeaderValue::from_static("a=1"));
        headers.append(header::SET_COOKIE, HeaderValue::from_static("b=2"));

        let filtered = without_hop_by_hop(&headers);

        assert_eq!(filtered.len(), 3);
        assert_eq!(filtered[header::CONTENT_LENGTH], "2");
        assert_eq!(filtered.get_all(header::SET_COOKIE).iter().count(), 2);
        assert!(!filtered.contains_key("x-session-hint"));
    }

    #[test]
    fn forwarded_for_appends_to_existing_chain() -> Result<()> {
        let mut headers = HeaderMap::new();
        headers.insert(X_FORWARDED_FOR_HEADER_KEY, HeaderValue::from_static("203.0.113.7"));
        let host = HeaderValue::from_static("app.example:3001");

        append_forwarded(&mut headers, IpAddr::V4(Ipv4Addr::LOCALHOST), Some(&host))?;

        assert_eq!(headers[X_FORWARDED_FOR_HEADER_KEY], "203.0.113.7, 127.0.0.1");
        assert_eq!(headers[X_FORWARDED_PROTO_HEADER_KEY], "http");
        assert_eq!(headers[X_FORWARDED_HOST_HEADER_KEY], "app.example:3001");
        Ok(())
    }

    #[test]
    fn forwarded_for_starts_new_chain() -> Result<()> {
        let mut headers = HeaderMap::new();

        append_forwarded(&mut headers, IpAddr::V4(Ipv4Addr::new(10, 0, 0, 4)), None)?;

        assert_eq!(headers[X_FORWARDED_FOR_HEADER_KEY], "10.0.0.4");
        assert!(!headers.contains_key(X_FORWARDED_HOST_HEADER_KEY));
        Ok(())
    }
}
