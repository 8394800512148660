use std::future::Future;
use std::net::SocketAddr;

use anyhow::Result;
use axum::handler::Handler;
use axum::middleware;
use tokio::net::TcpListener;

use crate::handler::middleware as handler_middleware;
use crate::handler::proxy::proxy;
use crate::handler::state::ProxyState;

/// Serves the proxy on `listener` until `shutdown` resolves, then drains
/// in-flight requests.
pub(crate) async fn serve<F>(listener: TcpListener, state: ProxyState, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let make_service = proxy
        .layer(middleware::from_fn(handler_middleware::metrics))
        .with_state(state)
        .into_make_service_with_connect_info::<SocketAddr>();
    axum::serve(listener, make_service)
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}
