//! ---
//! lk_section: "03-networking-transfer"
//! lk_subsection: "module"
//! lk_type: "source"
//! lk_scope: "code"
//! lk_description: "Lightweight server reachability probe."
//! lk_version: "v0.1.0-alpha"
//! lk_owner: "tbd"
//! ---
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use tracing::debug;
use url::Url;

const DEFAULT_PROBE_PORT: u16 = 80;

/// Probe whether the host behind `url` accepts connections.
///
/// Opens one short-lived TCP connection to the URL's host, on its explicit
/// port when present and port 80 otherwise. Any successful connect counts as
/// reachable. A malformed or host-less URL is unreachable, never an error:
/// this probe is a proxy for "can we fetch", and actual fetch failures
/// downstream are handled independently.
#[must_use]
pub fn server_reachable(url: &Url, timeout: Duration) -> bool {
    // `file://` feeds have a host-less or local target and need no network.
    if url.scheme() == "file" {
        return true;
    }
    let Some(host) = url.host_str() else {
        debug!(url = %url, "probe skipped: url has no host");
        return false;
    };
    let port = url.port().unwrap_or(DEFAULT_PROBE_PORT);
    let addrs = match (host, port).to_socket_addrs() {
        Ok(addrs) => addrs,
        Err(err) => {
            debug!(host, port, error = %err, "probe resolution failed");
            return false;
        }
    };
    for addr in addrs {
        if TcpStream::connect_timeout(&addr, timeout).is_ok() {
            debug!(host, port, %addr, "server reachable");
            return true;
        }
    }
    debug!(host, port, "server unreachable");
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;

    #[test]
    fn local_listener_is_reachable() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let url = Url::parse(&format!("http://127.0.0.1:{port}/descriptor.json")).unwrap();
        assert!(server_reachable(&url, Duration::from_secs(1)));
    }

    #[test]
    fn closed_port_is_unreachable() {
        // Bind then drop to find a port that is very likely closed.
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let url = Url::parse(&format!("http://127.0.0.1:{port}/")).unwrap();
        assert!(!server_reachable(&url, Duration::from_millis(200)));
    }

    #[test]
    fn hostless_url_is_unreachable_not_a_crash() {
        let url = Url::parse("unix:/run/launchkit.sock").unwrap();
        assert!(!server_reachable(&url, Duration::from_millis(100)));
    }

    #[test]
    fn file_urls_need_no_network() {
        let url = Url::parse("file:///var/feeds/descriptor.json").unwrap();
        assert!(server_reachable(&url, Duration::from_millis(100)));
    }

    #[test]
    fn unresolvable_host_is_unreachable() {
        let url = Url::parse("http://no-such-host.invalid/").unwrap();
        assert!(!server_reachable(&url, Duration::from_millis(200)));
    }
}
