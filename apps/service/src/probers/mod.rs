//! Concrete presence probes
//!
//! Every probe enforces its own timeout so a single unreachable target can
//! never stall a tick:
//! - `ping`: ICMP echo through the system ping binary
//! - `tcp`: TCP handshake against `host:port`
//! - `http`: GET against an http(s) URL
pub mod http;
pub mod ping;
pub mod tcp;

pub use http::HttpProber;
pub use ping::PingProber;
pub use tcp::TcpProber;
