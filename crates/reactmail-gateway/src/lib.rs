//! reactmail-gateway: HTTP front door for workspace webhooks
//!
//! Exposes the configured webhook path (POST) and a small status endpoint,
//! handing every webhook body to the core event pipeline.

pub mod server;

pub use server::{GatewayServer, GatewayState};
