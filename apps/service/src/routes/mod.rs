use actix_web::web;

pub mod health;
pub mod metrics;

/// Register every route served next to the daemon
pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.service(health::health_route).service(metrics::metrics_route);
}
