//! HTTP forwarding proxy that prints a transcript of every round trip.

pub mod capture;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod transport;

pub use config::schema::ProxyConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use transport::{ObservingLayer, ObservingTransport, Transcript};
