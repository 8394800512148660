mod config;

pub(crate) use config::ProxyConfig;
