use std::net::{IpAddr, Ipv6Addr, SocketAddr};

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Installs the global metrics recorder and serves it on `[::]:<port>/metrics`.
///
/// Meant for long-running processes such as scheduled syncs, so Prometheus can scrape them
/// directly. Every metric carries `app_name` as an `app` label.
///
/// Must be called from within a tokio runtime, which runs the HTTP listener.
pub fn init_metrics(port: u16, app_name: &str) -> Result<(), BuildError> {
    PrometheusBuilder::new()
        .with_http_listener(SocketAddr::new(IpAddr::V6(Ipv6Addr::UNSPECIFIED), port))
        .add_global_label("app", app_name)
        .install()?;

    Ok(())
}
