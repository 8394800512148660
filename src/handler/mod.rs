pub(crate) mod errors;
pub(crate) mod headers;
pub(crate) mod middleware;
pub(crate) mod proxy;
pub(crate) mod state;
