//! Request handlers.

use axum::extract::{Path, Query, State};
use axum::http::header;
use axum::response::IntoResponse;
use axum::Json;
use bap_store::{AttestationStore, IdentityStore, ProfileStore};
use bap_types::{Attestation, BitcoinAddress, BlockHeight, ClaimHash, IdKey, Identity, Profile};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::pagination::{PaginationMeta, PaginationParams};
use crate::{IndexerStatus, RpcError, RpcState};

/// Response envelope shared by every JSON endpoint.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    /// "OK" or "ERROR".
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn ok(result: T) -> Self {
        Self {
            status: "OK",
            message: None,
            result: Some(result),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: "ERROR",
            message: Some(message.into()),
            result: None,
        }
    }
}

impl ApiResponse<()> {
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            status: "OK",
            message: Some(message.into()),
            result: None,
        }
    }
}

type ApiResult<T> = Result<Json<ApiResponse<T>>, RpcError>;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    pub indexer: IndexerStatus,
    pub identities: u64,
    pub attestations: u64,
    pub profiles: u64,
}

pub async fn status(State(state): State<RpcState>) -> ApiResult<StatusReport> {
    Ok(Json(ApiResponse::ok(StatusReport {
        indexer: state.control.status(),
        identities: state.store.identity_count()?,
        attestations: state.store.attestation_count()?,
        profiles: state.store.profile_count()?,
    })))
}

pub async fn metrics(State(state): State<RpcState>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.control.metrics_text(),
    )
}

#[derive(Debug, Deserialize)]
pub struct ResyncRequest {
    pub height: BlockHeight,
}

pub async fn resync(
    State(state): State<RpcState>,
    Json(request): Json<ResyncRequest>,
) -> ApiResult<()> {
    state
        .control
        .request_resync(request.height)
        .map_err(RpcError::Rejected)?;
    info!(height = request.height, "resync requested over RPC");
    Ok(Json(ApiResponse::message(format!(
        "resync from block {} requested",
        request.height
    ))))
}

fn parse_id_key(raw: &str) -> Result<IdKey, RpcError> {
    IdKey::parse(raw).map_err(|e| RpcError::InvalidRequest(e.to_string()))
}

pub async fn get_identity(
    State(state): State<RpcState>,
    Path(id_key): Path<String>,
) -> ApiResult<Identity> {
    let key = parse_id_key(&id_key)?;
    let identity = state
        .store
        .find_identity(&key)?
        .ok_or_else(|| RpcError::NotFound(format!("identity {id_key}")))?;
    Ok(Json(ApiResponse::ok(identity)))
}

/// Every identity that has ever signed with `address`.
pub async fn identities_by_address(
    State(state): State<RpcState>,
    Path(address): Path<String>,
) -> ApiResult<Vec<Identity>> {
    let address =
        BitcoinAddress::parse(&address).map_err(|e| RpcError::InvalidRequest(e.to_string()))?;
    let identities = state.store.find_by_address(&address)?;
    if identities.is_empty() {
        return Err(RpcError::NotFound(format!("identity for address {address}")));
    }
    Ok(Json(ApiResponse::ok(identities)))
}

#[derive(Debug, Serialize)]
pub struct IdentityList {
    pub identities: Vec<Identity>,
    pub pagination: PaginationMeta,
}

pub async fn list_identities(
    State(state): State<RpcState>,
    Query(params): Query<PaginationParams>,
) -> ApiResult<IdentityList> {
    let page = state.store.list_identities(&params.request())?;
    let pagination = PaginationMeta::for_page(&page, params.effective_limit());
    Ok(Json(ApiResponse::ok(IdentityList {
        identities: page.items,
        pagination,
    })))
}

pub async fn get_attestation(
    State(state): State<RpcState>,
    Path(hash): Path<String>,
) -> ApiResult<Attestation> {
    let claim =
        ClaimHash::from_hex(&hash).map_err(|e| RpcError::InvalidRequest(e.to_string()))?;
    let attestation = state
        .store
        .find_attestation(&claim)?
        .ok_or_else(|| RpcError::NotFound(format!("attestation {hash}")))?;
    Ok(Json(ApiResponse::ok(attestation)))
}

pub async fn get_profile(
    State(state): State<RpcState>,
    Path(id_key): Path<String>,
) -> ApiResult<Profile> {
    let key = parse_id_key(&id_key)?;
    let profile = state
        .store
        .find_profile(&key)?
        .ok_or_else(|| RpcError::NotFound(format!("profile {id_key}")))?;
    Ok(Json(ApiResponse::ok(profile)))
}
