use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Url;
use serde::Deserialize;

fn _default_upstream() -> String { "http://localhost:3000".to_string() }
const fn _default_listen_address() -> IpAddr { IpAddr::V4(Ipv4Addr::LOCALHOST) }
const fn _default_proxy_port() -> u16 { 3001 }
const fn _default_change_origin() -> bool { true }
const fn _default_connect_timeout_ms() -> u64 { 5_000 }
const fn _default_response_timeout_ms() -> u64 { 30_000 }

#[derive(Deserialize, Clone, Debug)]
#[serde(deny_unknown_fields)]
pub(crate) struct ProxyConfig {
    #[serde(default = "_default_upstream")]
    pub(crate) upstream: String,
    #[serde(default = "_default_listen_address")]
    pub(crate) listen_address: IpAddr,
    #[serde(default = "_default_proxy_port")]
    pub(crate) proxy_port: u16,
    #[serde(default = "_default_change_origin")]
    pub(crate) change_origin: bool,
    #[serde(default)]
    pub(crate) x_forwarded: bool,
    #[serde(default = "_default_connect_timeout_ms")]
    pub(crate) connect_timeout_ms: u64,
    #[serde(default = "_default_response_timeout_ms")]
    pub(crate) response_timeout_ms: u64,
    pub(crate) metrics_port: Option<u16>,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            upstream: _default_upstream(),
            listen_address: _default_listen_address(),
            proxy_port: _default_proxy_port(),
            change_origin: _default_change_origin(),
            x_forwarded: false,
            connect_timeout_ms: _default_connect_timeout_ms(),
            response_timeout_ms: _default_response_timeout_ms(),
            metrics_port: None,
        }
    }
}

impl ProxyConfig {
    /// Reads the TOML file at `path`, or falls back to the defaults when no
    /// file was given.
    pub(crate) fn load(path: Option<&str>) -> Result<Self> {
        match path {
            Some(path) => {
                let contents = std::fs::read_to_string(path)
                    .with_context(|| format!("Couldn't read config file \"{path}\""))?;
                toml::from_str(&contents)
                    .with_context(|| format!("Couldn't parse config file \"{path}\""))
            }
            None => Ok(Self::default()),
        }
    }

    pub(crate) fn validate(&self) -> Result<()> {
        self.upstream_url()?;
        anyhow::ensure!(
            self.connect_timeout_ms > 0,
            "connect_timeout_ms must be greater than zero"
        );
        anyhow::ensure!(
            self.response_timeout_ms > 0,
            "response_timeout_ms must be greater than zero"
        );
        if let Some(metrics_port) = self.metrics_port {
            anyhow::ensure!(
                metrics_port != self.proxy_port,
                "metrics_port and proxy_port must differ (both are {metrics_port})"
            );
        }
        Ok(())
    }

    pub(crate) fn upstream_url(&self) -> Result<Url> {
        let url = Url::parse(&self.upstream)
            .with_context(|| format!("Upstream \"{}\" is not a valid URL", self.upstream))?;
        anyhow::ensure!(
            matches!(url.scheme(), "http" | "https"),
            "Upstream scheme must be http or https, got \"{}\"",
            url.scheme()
        );
        anyhow::ensure!(url.host_str().is_some(), "Upstream \"{}\" has no host", self.upstream);
        anyhow::ensure!(
            url.query().is_none() && url.fragment().is_none(),
            "Upstream \"{}\" must not carry a query or fragment",
            self.upstream
        );
        Ok(url)
    }

    pub(crate) fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub(crate) fn response_timeout(&self) -> Duration {
        Duration::from_millis(self.response_timeout_ms)
    }
}
