//! Prometheus exporter for Modbus TCP devices.
//!
//! The exporter polls a configured device/slave/register tree on a fixed
//! interval, decodes register payloads under the configured byte-order
//! convention, and caches the latest value per register. A separate HTTP
//! task renders the cache for Prometheus on each scrape.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌─────────────────┐     ┌─────────────────┐
//! │     Poller      │────>│  Sample Store   │────>│   HTTP Server   │
//! │ (Modbus TCP)    │     │ (latest values) │     │   (/metrics)    │
//! └─────────────────┘     └─────────────────┘     └─────────────────┘
//! ```
//!
//! # Usage
//!
//! Run the exporter binary with a configuration file:
//!
//! ```bash
//! modbus-exporter --config modbus.json5
//! ```
//!
//! # Configuration
//!
//! See [`config::ExporterConfig`] for configuration options.

pub mod codec;
pub mod config;
pub mod exposition;
pub mod http;
pub mod poller;
pub mod store;
pub mod transport;

pub use config::ExporterConfig;
pub use http::HttpServer;
pub use poller::Poller;
pub use store::{Sample, SampleStore, SharedStore};
pub use transport::{TcpTransport, Transport};
