//! HTTP request handlers for the consensus RPC API.

use crate::types::{ProposeRequest, RpcError};
use crate::RpcState;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use council_engine::{BlockId, BlockWithConsensusInfo, SnapshotBlob, ValidationResult};
use council_types::{Address, Hash};
use std::collections::{BTreeMap, HashMap};

fn parse_block_id(raw: &str) -> Result<BlockId, RpcError> {
    raw.parse().map_err(RpcError::BadRequest)
}

fn parse_hash(raw: &str) -> Result<Hash, RpcError> {
    Hash::from_hex(raw).map_err(|e| RpcError::BadRequest(e.to_string()))
}

fn parse_address(raw: &str) -> Result<Address, RpcError> {
    Address::from_hex(raw).map_err(|e| RpcError::BadRequest(e.to_string()))
}

pub async fn get_timeout(State(state): State<RpcState>) -> Json<u64> {
    Json(state.api.get_timeout())
}

pub async fn get_snapshot(
    State(state): State<RpcState>,
    Path(number): Path<String>,
) -> Result<Json<SnapshotBlob>, RpcError> {
    let id = parse_block_id(&number)?;
    Ok(Json(state.api.get_snapshot(Some(id))?))
}

pub async fn get_snapshot_at_hash(
    State(state): State<RpcState>,
    Path(hash): Path<String>,
) -> Result<Json<SnapshotBlob>, RpcError> {
    Ok(Json(state.api.get_snapshot_at_hash(parse_hash(&hash)?)?))
}

pub async fn get_validators(
    State(state): State<RpcState>,
    Path(number): Path<String>,
) -> Result<Json<Vec<Address>>, RpcError> {
    let id = parse_block_id(&number)?;
    Ok(Json(state.api.get_validators(Some(id))?))
}

pub async fn get_validators_at_hash(
    State(state): State<RpcState>,
    Path(hash): Path<String>,
) -> Result<Json<Vec<Address>>, RpcError> {
    Ok(Json(state.api.get_validators_at_hash(parse_hash(&hash)?)?))
}

pub async fn candidates(State(state): State<RpcState>) -> Json<HashMap<Address, bool>> {
    Json(state.api.candidates())
}

pub async fn propose(
    State(state): State<RpcState>,
    Json(req): Json<ProposeRequest>,
) -> StatusCode {
    state.api.propose(req.address, req.auth);
    StatusCode::NO_CONTENT
}

pub async fn discard(
    State(state): State<RpcState>,
    Path(address): Path<String>,
) -> Result<StatusCode, RpcError> {
    state.api.discard(parse_address(&address)?);
    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_council(
    State(state): State<RpcState>,
    Path(number): Path<String>,
) -> Result<Json<Vec<Address>>, RpcError> {
    let id = parse_block_id(&number)?;
    Ok(Json(state.api.get_council(Some(id))?))
}

pub async fn get_council_size(
    State(state): State<RpcState>,
    Path(number): Path<String>,
) -> Result<Json<usize>, RpcError> {
    let id = parse_block_id(&number)?;
    Ok(Json(state.api.get_council_size(Some(id))?))
}

pub async fn get_committee(
    State(state): State<RpcState>,
    Path(number): Path<String>,
) -> Result<Json<Vec<Address>>, RpcError> {
    let id = parse_block_id(&number)?;
    Ok(Json(state.api.get_committee(Some(id))?))
}

pub async fn get_committee_size(
    State(state): State<RpcState>,
    Path(number): Path<String>,
) -> Result<Json<usize>, RpcError> {
    let id = parse_block_id(&number)?;
    Ok(Json(state.api.get_committee_size(Some(id))?))
}

pub async fn validate_block(
    State(state): State<RpcState>,
    Path(number): Path<String>,
) -> Result<Json<ValidationResult>, RpcError> {
    let id = parse_block_id(&number)?;
    Ok(Json(state.api.validate_block(Some(id))?))
}

pub async fn block_with_consensus_info(
    State(state): State<RpcState>,
    Path(number): Path<String>,
) -> Result<Json<BlockWithConsensusInfo>, RpcError> {
    let id = parse_block_id(&number)?;
    Ok(Json(
        state.api.get_block_with_consensus_info_by_number(Some(id))?,
    ))
}

pub async fn block_with_consensus_info_by_hash(
    State(state): State<RpcState>,
    Path(hash): Path<String>,
) -> Result<Json<BlockWithConsensusInfo>, RpcError> {
    Ok(Json(
        state
            .api
            .get_block_with_consensus_info_by_hash(parse_hash(&hash)?)?,
    ))
}

pub async fn block_range_with_consensus_info(
    State(state): State<RpcState>,
    Path((start, end)): Path<(i64, i64)>,
) -> Result<Json<BTreeMap<String, Option<BlockWithConsensusInfo>>>, RpcError> {
    Ok(Json(state.api.get_block_with_consensus_info_by_number_range(
        Some(start),
        Some(end),
    )?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_id_and_hash_parsing() {
        assert!(parse_block_id("latest").is_ok());
        assert!(parse_block_id("0x10").is_ok());
        assert!(matches!(
            parse_block_id("soon"),
            Err(RpcError::BadRequest(_))
        ));
        assert!(parse_hash(&format!("0x{}", "11".repeat(32))).is_ok());
        assert!(matches!(parse_hash("0x1234"), Err(RpcError::BadRequest(_))));
    }
}
