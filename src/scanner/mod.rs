use log::{debug, info};
use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::brute::Protocol;
use crate::config::Config;
use crate::engine::CancelFlag;

/// Probe the configured well-known ports on `host` and report which
/// protocols look reachable.
///
/// One bounded TCP connect per port, sequential, with a fixed pause between
/// probes so detection itself does not hammer the target. A timeout or any
/// I/O error counts as "absent" for this run; there are no retries. An open
/// port only means the service answers, not that any credentials will work.
/// An empty result is "nothing to do", not an error.
pub async fn detect_services(host: &str, config: &Config, cancel: &CancelFlag) -> Vec<Protocol> {
    let mut found = Vec::new();

    for (i, (port, protocol)) in config.ports_to_scan.iter().enumerate() {
        if cancel.is_cancelled() {
            break;
        }
        if i > 0 && cancel.sleep(config.probe_delay).await {
            break;
        }

        let addr = format!("{}:{}", host, port);
        match timeout(config.probe_timeout, TcpStream::connect(&addr)).await {
            Ok(Ok(_)) => {
                debug!("port {} open, {} candidate", port, protocol);
                found.push(*protocol);
            }
            _ => {
                debug!("port {} unreachable, skipping {}", port, protocol);
            }
        }
    }

    info!(
        "detection finished: {} candidate service(s) on {}",
        found.len(),
        host
    );
    found
}
