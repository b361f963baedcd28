use std::net::SocketAddr;

use actix_web::{App, HttpServer, dev::ServerHandle, web};
use metrics_exporter_prometheus::PrometheusHandle;
use tracing::{error, info};

use crate::{error::AppError, routes};

/// Bind the metrics endpoint and serve it in the background.
///
/// Signal handling is left to the daemon's lifecycle, which stops the server
/// through the returned handle.
pub fn start_metrics_server(
    addr: SocketAddr,
    handle: PrometheusHandle,
) -> Result<ServerHandle, AppError> {
    let server = HttpServer::new(move || {
        App::new().app_data(web::Data::new(handle.clone())).configure(routes::routes)
    })
    .workers(1)
    .disable_signals()
    .bind(addr)?
    .run();

    let server_handle = server.handle();
    tokio::spawn(async move {
        if let Err(err) = server.await {
            error!(error = %err, "metrics server stopped");
        }
    });

    info!(%addr, "serving metrics");
    Ok(server_handle)
}
