use crate::node::{AttestationSubmission, FeedbackSubmission, NodeError, TallyNode};
use anyhow::Context;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tally_chain::ChainError;
use tally_directory::{AgentRegistration, DirectoryError};
use tally_dispute::DisputeError;
use tally_settlement::SettlementError;
use tally_types::{Address, AgentId, DisputeId, TaskId, TokenAmount, TxHash};
use tracing::info;

#[derive(Serialize, Deserialize)]
struct ErrorResponse {
    error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);
type ApiResult<T> = std::result::Result<Json<T>, ApiError>;

/// Map core errors onto HTTP statuses. Bodies carry the plain-language
/// message only; nothing internal beyond what the caller supplied leaks.
fn into_api_error(err: NodeError) -> ApiError {
    let status = match &err {
        NodeError::Settlement(SettlementError::Chain(ChainError::Unavailable(_))) => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        NodeError::Settlement(SettlementError::Chain(_)) => StatusCode::BAD_GATEWAY,
        NodeError::Settlement(SettlementError::Store(_)) | NodeError::Store(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
        NodeError::Directory(e) => match e {
            DirectoryError::MissingIdentifier => StatusCode::BAD_REQUEST,
            DirectoryError::NotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::CONFLICT,
        },
        NodeError::Dispute(e) => match e {
            DisputeError::NotFound(_) => StatusCode::NOT_FOUND,
            DisputeError::InvalidConfiguration(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::CONFLICT,
        },
        NodeError::Reputation(_) => StatusCode::BAD_REQUEST,
        NodeError::Task(e) => match e {
            crate::tasks::TaskError::NotFound(_) => StatusCode::NOT_FOUND,
            crate::tasks::TaskError::AlreadyDisputed(_) => StatusCode::CONFLICT,
        },
        NodeError::UnknownPayment(_) => StatusCode::BAD_REQUEST,
    };

    (
        status,
        Json(ErrorResponse {
            error: err.to_string(),
        }),
    )
}

fn bad_request(message: impl Into<String>) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

fn parse_agent_id(raw: &str) -> std::result::Result<AgentId, ApiError> {
    AgentId::new(raw).map_err(|e| bad_request(e.to_string()))
}

pub fn router(node: Arc<TallyNode>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/status", get(get_status))
        .route("/metrics", get(get_metrics))
        .route("/v1/payments/verify", post(verify_payment))
        .route("/v1/agents", post(register_agent))
        .route("/v1/agents/:id", get(get_agent))
        .route("/v1/agents/:id/wallet", get(get_agent_wallet))
        .route("/v1/agents/:id/price", get(get_agent_price))
        .route("/v1/agents/:id/reputation", get(get_agent_reputation))
        .route("/v1/price", get(get_default_price))
        .route("/v1/feedback", post(submit_feedback))
        .route("/v1/attestations", post(submit_attestation))
        .route("/v1/tasks", post(create_task))
        .route("/v1/tasks/:id", get(get_task))
        .route("/v1/tasks/:id/complete", post(complete_task))
        .route("/v1/disputes", post(raise_dispute))
        .route("/v1/disputes/:id", get(get_dispute))
        .route("/v1/disputes/:id/votes", post(vote_on_dispute))
        .with_state(node)
}

/// Bind and serve the HTTP API until shutdown.
pub async fn serve(node: Arc<TallyNode>, host: &str, port: u16) -> anyhow::Result<()> {
    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding API server to {addr}"))?;

    info!("API server listening on {addr}");

    axum::serve(listener, router(node))
        .await
        .context("API server failed")?;
    Ok(())
}

async fn health() -> &'static str {
    "OK"
}

async fn get_status(State(node): State<Arc<TallyNode>>) -> ApiResult<crate::node::NodeStats> {
    node.stats().await.map(Json).map_err(into_api_error)
}

async fn get_metrics(State(node): State<Arc<TallyNode>>) -> String {
    node.metrics.gather()
}

#[derive(Deserialize)]
struct VerifyPaymentRequest {
    tx_hash: TxHash,
    payer: Address,
    amount: TokenAmount,
    #[serde(default)]
    agent_id: Option<String>,
}

async fn verify_payment(
    State(node): State<Arc<TallyNode>>,
    Json(req): Json<VerifyPaymentRequest>,
) -> ApiResult<tally_settlement::Verdict> {
    let agent_id = match req.agent_id.as_deref() {
        Some(raw) => Some(parse_agent_id(raw)?),
        None => None,
    };

    node.verify_payment(req.tx_hash, req.payer, req.amount, agent_id.as_ref())
        .await
        .map(Json)
        .map_err(into_api_error)
}

async fn register_agent(
    State(node): State<Arc<TallyNode>>,
    Json(registration): Json<AgentRegistration>,
) -> ApiResult<tally_directory::AgentRecord> {
    node.register_agent(registration)
        .await
        .map(Json)
        .map_err(into_api_error)
}

async fn get_agent(
    State(node): State<Arc<TallyNode>>,
    Path(id): Path<String>,
) -> ApiResult<tally_directory::AgentRecord> {
    let id = parse_agent_id(&id)?;
    match node.get_agent(&id).await {
        Some(record) => Ok(Json(record)),
        None => Err(into_api_error(
            DirectoryError::NotFound(id.to_string()).into(),
        )),
    }
}

#[derive(Serialize)]
struct WalletResponse {
    wallet: Address,
}

async fn get_agent_wallet(
    State(node): State<Arc<TallyNode>>,
    Path(id): Path<String>,
) -> ApiResult<WalletResponse> {
    let id = parse_agent_id(&id)?;
    node.resolve_wallet(Some(&id))
        .await
        .map(|wallet| Json(WalletResponse { wallet }))
        .map_err(into_api_error)
}

#[derive(Serialize)]
struct PriceResponse {
    price: TokenAmount,
}

async fn get_agent_price(
    State(node): State<Arc<TallyNode>>,
    Path(id): Path<String>,
) -> ApiResult<PriceResponse> {
    let id = parse_agent_id(&id)?;
    node.resolve_price(Some(&id))
        .await
        .map(|price| Json(PriceResponse { price }))
        .map_err(into_api_error)
}

async fn get_default_price(State(node): State<Arc<TallyNode>>) -> ApiResult<PriceResponse> {
    node.resolve_price(None)
        .await
        .map(|price| Json(PriceResponse { price }))
        .map_err(into_api_error)
}

#[derive(Serialize)]
struct ReputationResponse {
    score: f64,
}

async fn get_agent_reputation(
    State(node): State<Arc<TallyNode>>,
    Path(id): Path<String>,
) -> ApiResult<ReputationResponse> {
    let id = parse_agent_id(&id)?;
    let score = node.reputation_score(&id).await;
    Ok(Json(ReputationResponse { score }))
}

async fn submit_feedback(
    State(node): State<Arc<TallyNode>>,
    Json(submission): Json<FeedbackSubmission>,
) -> ApiResult<crate::node::IngestReceipt> {
    node.submit_feedback(submission)
        .await
        .map(Json)
        .map_err(into_api_error)
}

async fn submit_attestation(
    State(node): State<Arc<TallyNode>>,
    Json(submission): Json<AttestationSubmission>,
) -> ApiResult<crate::node::IngestReceipt> {
    node.submit_attestation(submission)
        .await
        .map(Json)
        .map_err(into_api_error)
}

#[derive(Deserialize)]
struct CreateTaskRequest {
    #[serde(default)]
    id: Option<String>,
    description: String,
    agent_id: String,
}

async fn create_task(
    State(node): State<Arc<TallyNode>>,
    Json(req): Json<CreateTaskRequest>,
) -> ApiResult<crate::tasks::Task> {
    let agent_id = parse_agent_id(&req.agent_id)?;
    let id = match req.id.as_deref() {
        Some(raw) => Some(TaskId::new(raw).map_err(|e| bad_request(e.to_string()))?),
        None => None,
    };

    node.create_task(id, req.description, agent_id)
        .await
        .map(Json)
        .map_err(into_api_error)
}

async fn get_task(
    State(node): State<Arc<TallyNode>>,
    Path(id): Path<String>,
) -> ApiResult<crate::tasks::Task> {
    let id = TaskId::new(id).map_err(|e| bad_request(e.to_string()))?;
    match node.get_task(&id).await {
        Some(task) => Ok(Json(task)),
        None => Err(into_api_error(
            crate::tasks::TaskError::NotFound(id.to_string()).into(),
        )),
    }
}

#[derive(Deserialize)]
struct CompleteTaskRequest {
    #[serde(default)]
    payment_tx: Option<TxHash>,
}

async fn complete_task(
    State(node): State<Arc<TallyNode>>,
    Path(id): Path<String>,
    Json(req): Json<CompleteTaskRequest>,
) -> ApiResult<crate::tasks::Task> {
    let id = TaskId::new(id).map_err(|e| bad_request(e.to_string()))?;
    node.complete_task(&id, req.payment_tx)
        .await
        .map(Json)
        .map_err(into_api_error)
}

#[derive(Deserialize)]
struct RaiseDisputeRequest {
    task_id: String,
    reason: String,
    raised_by: Address,
}

async fn raise_dispute(
    State(node): State<Arc<TallyNode>>,
    Json(req): Json<RaiseDisputeRequest>,
) -> ApiResult<tally_dispute::Dispute> {
    let task_id = TaskId::new(req.task_id).map_err(|e| bad_request(e.to_string()))?;
    node.raise_dispute(task_id, req.reason, req.raised_by)
        .await
        .map(Json)
        .map_err(into_api_error)
}

async fn get_dispute(
    State(node): State<Arc<TallyNode>>,
    Path(id): Path<String>,
) -> ApiResult<tally_dispute::Dispute> {
    let id = DisputeId::new(id).map_err(|e| bad_request(e.to_string()))?;
    match node.get_dispute(&id).await {
        Some(dispute) => Ok(Json(dispute)),
        None => Err(into_api_error(
            DisputeError::NotFound(id.to_string()).into(),
        )),
    }
}

#[derive(Deserialize)]
struct VoteRequest {
    validator: Address,
    approve_refund: bool,
    #[serde(default)]
    comment: Option<String>,
}

async fn vote_on_dispute(
    State(node): State<Arc<TallyNode>>,
    Path(id): Path<String>,
    Json(req): Json<VoteRequest>,
) -> ApiResult<tally_dispute::VoteOutcome> {
    let id = DisputeId::new(id).map_err(|e| bad_request(e.to_string()))?;
    node.vote_on_dispute(&id, req.validator, req.approve_refund, req.comment)
        .await
        .map(Json)
        .map_err(into_api_error)
}
