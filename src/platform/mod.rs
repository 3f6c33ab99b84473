// src/platform/mod.rs - Transport abstraction

use std::sync::Arc;

use crate::config::ApiConfig;
use crate::error::Result;

#[cfg(any(test, feature = "test-util"))]
pub mod mock;
pub mod native;
pub mod network;

pub use native::NativeNetwork;
pub use network::{
    FormPart, HttpMethod, MultipartForm, NetworkArc, NetworkProvider, NetworkRequest,
    NetworkResponse, PartValue,
};

/// Creates the default network provider for this platform
pub fn create_network(config: &ApiConfig) -> Result<NetworkArc> {
    Ok(Arc::new(NativeNetwork::new(config.request_timeout())?))
}
