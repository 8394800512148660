use std::time::Duration;

use anyhow::Result;
use reqwest::Url;

use crate::config::ProxyConfig;

#[derive(Clone)]
pub(crate) struct ProxyState {
    pub(crate) config: ProxyConfig,
    pub(crate) upstream: Url,
    pub(crate) http_client: reqwest::Client,
}

impl ProxyState {
    pub(crate) fn new(config: ProxyConfig) -> Result<Self> {
        config.validate()?;
        let upstream = config.upstream_url()?;
        let http_client = http_client(config.connect_timeout())?;
        Ok(Self {
            config,
            upstream,
            http_client,
        })
    }
}

fn http_client(connect_timeout: Duration) -> Result<reqwest::Client> {
    // Redirects belong to the caller, and system proxy settings must not
    // reroute the upstream.
    let http_client = reqwest::Client::builder()
        .connect_timeout(connect_timeout)
        .redirect(reqwest::redirect::Policy::none())
        .no_proxy()
        .build()?;
    Ok(http_client)
}
