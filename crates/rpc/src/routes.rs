//! Route table for the consensus RPC API.

use crate::handlers;
use crate::RpcState;
use axum::routing::{delete, get};
use axum::Router;

/// Build the router for the consensus namespace.
pub fn router(state: RpcState) -> Router {
    Router::new()
        .route("/api/v1/consensus/timeout", get(handlers::get_timeout))
        .route(
            "/api/v1/consensus/snapshot/{number}",
            get(handlers::get_snapshot),
        )
        .route(
            "/api/v1/consensus/snapshot/hash/{hash}",
            get(handlers::get_snapshot_at_hash),
        )
        .route(
            "/api/v1/consensus/validators/{number}",
            get(handlers::get_validators),
        )
        .route(
            "/api/v1/consensus/validators/hash/{hash}",
            get(handlers::get_validators_at_hash),
        )
        .route(
            "/api/v1/consensus/candidates",
            get(handlers::candidates).post(handlers::propose),
        )
        .route(
            "/api/v1/consensus/candidates/{address}",
            delete(handlers::discard),
        )
        .route(
            "/api/v1/consensus/council/{number}",
            get(handlers::get_council),
        )
        .route(
            "/api/v1/consensus/council/{number}/size",
            get(handlers::get_council_size),
        )
        .route(
            "/api/v1/consensus/committee/{number}",
            get(handlers::get_committee),
        )
        .route(
            "/api/v1/consensus/committee/{number}/size",
            get(handlers::get_committee_size),
        )
        .route(
            "/api/v1/consensus/blocks/{number}/validate",
            get(handlers::validate_block),
        )
        .route(
            "/api/v1/consensus/blocks/{number}",
            get(handlers::block_with_consensus_info),
        )
        .route(
            "/api/v1/consensus/blocks/hash/{hash}",
            get(handlers::block_with_consensus_info_by_hash),
        )
        .route(
            "/api/v1/consensus/blocks/range/{start}/{end}",
            get(handlers::block_range_with_consensus_info),
        )
        .with_state(state)
}
