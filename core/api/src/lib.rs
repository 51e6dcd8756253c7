//! HTTP access to the PassVault service.
//!
//! Everything that touches the network goes through [`ApiGateway`], which
//! attaches the session's bearer token, maps HTTP failures onto the common
//! error type and tears the session down when the server answers 401.
//! The wire itself sits behind the [`Transport`] trait so tests can replace
//! it with a [`MockTransport`].

pub mod config;
pub mod envelope;
pub mod gateway;
pub mod http;
pub mod mock;
pub mod transport;

pub use config::ClientConfig;
pub use envelope::Envelope;
pub use gateway::{item_path, ApiGateway};
pub use http::HttpTransport;
pub use mock::MockTransport;
pub use transport::{ApiRequest, RawResponse, Transport, TransportError};

pub use reqwest::Method;
