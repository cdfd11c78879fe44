//! Request handlers for the gateway API.

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::fabric::types::{
    Block, ChaincodeInfo, ChannelInfo, GatewayError, GatewayResult, InvokeRequest, InvokeResult,
    LedgerInfo, Organization, PeerRef, ProcessedTransaction, TransactionId,
};
use crate::http::server::AppState;

#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub version: &'static str,
    pub org: String,
    pub identity: Option<String>,
    pub relayed_channels: usize,
}

pub async fn health(State(ctx): State<AppState>) -> Json<HealthStatus> {
    Json(HealthStatus {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        org: ctx.session.organization().to_string(),
        identity: ctx.session.identity().map(|i| i.enrollment_id),
        relayed_channels: ctx.relay.relaying_count(),
    })
}

#[derive(Debug, Deserialize)]
pub struct RegisterUser {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub affiliation: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RegisteredUser {
    pub username: String,
}

pub async fn register_user(
    State(ctx): State<AppState>,
    Json(body): Json<RegisterUser>,
) -> GatewayResult<Json<RegisteredUser>> {
    if body.username.is_empty() || body.password.is_empty() {
        return Err(GatewayError::InvalidRequest(
            "username and password are required".to_string(),
        ));
    }
    ctx.session
        .register(&body.username, &body.password, body.affiliation.as_deref())
        .await?;
    Ok(Json(RegisteredUser {
        username: body.username,
    }))
}

pub async fn list_channels(State(ctx): State<AppState>) -> GatewayResult<Json<Vec<ChannelInfo>>> {
    Ok(Json(ctx.admin.query_channels().await?))
}

#[derive(Debug, Serialize)]
pub struct ChannelCreated {
    pub txid: TransactionId,
}

/// Create a channel from the request body, then start relaying it.
pub async fn create_channel(
    State(ctx): State<AppState>,
    Path(channel): Path<String>,
    body: Bytes,
) -> GatewayResult<Json<ChannelCreated>> {
    let txid = ctx.admin.create_channel(&channel, body.to_vec()).await?;
    if ctx.config.relay.enabled {
        if let Err(e) = ctx.relay.relay_channel(&channel).await {
            tracing::error!(channel = %channel, error = %e, "Block relay subscription failed");
        }
    }
    Ok(Json(ChannelCreated { txid }))
}

pub async fn channel_info(
    State(ctx): State<AppState>,
    Path(channel): Path<String>,
) -> GatewayResult<Json<LedgerInfo>> {
    Ok(Json(ctx.admin.query_info(&channel).await?))
}

pub async fn channel_orgs(
    State(ctx): State<AppState>,
    Path(channel): Path<String>,
) -> GatewayResult<Json<Vec<Organization>>> {
    Ok(Json(ctx.admin.get_organizations(&channel).await?))
}

/// Peers of the gateway's own organization on a channel.
pub async fn channel_peers(
    State(ctx): State<AppState>,
    Path(channel): Path<String>,
) -> GatewayResult<Json<Vec<PeerRef>>> {
    Ok(Json(ctx.admin.peers_for_org_on_channel(&channel).await?))
}

pub async fn instantiated_chaincodes(
    State(ctx): State<AppState>,
    Path(channel): Path<String>,
) -> GatewayResult<Json<Vec<ChaincodeInfo>>> {
    Ok(Json(ctx.admin.query_instantiated_chaincodes(&channel).await?))
}

pub async fn installed_chaincodes(
    State(ctx): State<AppState>,
) -> GatewayResult<Json<Vec<ChaincodeInfo>>> {
    Ok(Json(ctx.admin.query_installed_chaincodes().await?))
}

pub async fn block_by_number(
    State(ctx): State<AppState>,
    Path((channel, number)): Path<(String, u64)>,
) -> GatewayResult<Json<Block>> {
    Ok(Json(ctx.admin.query_block(&channel, number).await?))
}

pub async fn transaction_by_id(
    State(ctx): State<AppState>,
    Path((channel, txid)): Path<(String, String)>,
) -> GatewayResult<Json<ProcessedTransaction>> {
    let tx_id = TransactionId::from(txid);
    Ok(Json(ctx.admin.query_transaction(&channel, &tx_id).await?))
}

pub async fn invoke(
    State(ctx): State<AppState>,
    Path((channel, chaincode)): Path<(String, String)>,
    Json(mut request): Json<InvokeRequest>,
) -> GatewayResult<Json<InvokeResult>> {
    request.channel_id = channel;
    request.chaincode_id = chaincode;
    Ok(Json(ctx.pipeline.invoke(&request).await?))
}

/// Query string of a chaincode query; `args` and `targets` are JSON arrays.
#[derive(Debug, Deserialize)]
pub struct QueryParams {
    pub fcn: String,
    #[serde(default)]
    pub args: Option<String>,
    #[serde(default)]
    pub targets: Option<String>,
}

pub async fn query(
    State(ctx): State<AppState>,
    Path((channel, chaincode)): Path<(String, String)>,
    Query(params): Query<QueryParams>,
) -> GatewayResult<Json<Vec<String>>> {
    let args = parse_list("args", params.args.as_deref())?.unwrap_or_default();
    let targets = parse_list("targets", params.targets.as_deref())?;
    let responses = ctx
        .pipeline
        .query(&channel, &chaincode, &params.fcn, &args, targets.as_deref())
        .await?;
    Ok(Json(responses))
}

fn parse_list(name: &str, raw: Option<&str>) -> GatewayResult<Option<Vec<String>>> {
    match raw {
        None | Some("") => Ok(None),
        Some(raw) => serde_json::from_str(raw).map(Some).map_err(|e| {
            GatewayError::InvalidRequest(format!("{} must be a JSON array of strings: {}", name, e))
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_list() {
        assert_eq!(parse_list("args", None).unwrap(), None);
        assert_eq!(parse_list("args", Some("")).unwrap(), None);
        assert_eq!(
            parse_list("args", Some(r#"["a","b"]"#)).unwrap(),
            Some(vec!["a".to_string(), "b".to_string()])
        );
        assert!(matches!(
            parse_list("args", Some("a,b")),
            Err(GatewayError::InvalidRequest(_))
        ));
    }
}
