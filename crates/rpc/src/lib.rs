//! HTTP surface over [`council_engine::ConsensusApi`].
//!
//! The engine owns every decision; this crate only parses paths,
//! serializes responses and maps [`ApiError`] kinds onto status
//! codes.
//!
//! [`ApiError`]: council_engine::ApiError

mod handlers;
mod routes;
mod server;
mod types;

pub use routes::router;
pub use server::serve;
pub use types::{ErrorResponse, ProposeRequest, RpcError};

use council_engine::ConsensusApi;
use std::sync::Arc;

/// Shared state for RPC handlers.
#[derive(Clone)]
pub struct RpcState {
    pub api: Arc<ConsensusApi>,
}
