//! Node Status Surface
//!
//! Per-node operational HTTP endpoints, served next to the datagram port:
//! the installed view, per-member liveness, a health probe, and a graceful
//! leave trigger. Read-only apart from `/leave`; cluster state itself only
//! ever changes through the membership protocol.

use std::sync::Arc;

use axum::http::StatusCode;
use axum::{
    extract::Extension,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;

use crate::detector::PeerStatus;
use crate::membership::types::MemberIdentity;
use crate::service::MembershipService;

#[derive(Debug, Serialize)]
pub struct ViewResponse {
    pub id: u64,
    pub coordinator: String,
    pub members: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct MemberSummary {
    pub address: String,
    pub incarnation: u64,
    pub role: String,
    pub weight: u32,
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct MembersResponse {
    pub members: Vec<MemberSummary>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub lifecycle: String,
    pub view_id: u64,
    pub cluster_size: usize,
}

#[derive(Debug, Serialize)]
pub struct LeaveResponse {
    pub success: bool,
}

pub fn router(service: Arc<MembershipService>) -> Router {
    Router::new()
        .route("/view", get(handle_view))
        .route("/members", get(handle_members))
        .route("/health", get(handle_health))
        .route("/leave", post(handle_leave))
        .layer(Extension(service))
}

async fn handle_view(
    Extension(service): Extension<Arc<MembershipService>>,
) -> (StatusCode, Json<ViewResponse>) {
    let view = service.current_view();
    (
        StatusCode::OK,
        Json(ViewResponse {
            id: view.id().value(),
            coordinator: view.coordinator().to_string(),
            members: view.members().iter().map(|m| m.to_string()).collect(),
        }),
    )
}

async fn handle_members(
    Extension(service): Extension<Arc<MembershipService>>,
) -> (StatusCode, Json<MembersResponse>) {
    let view = service.current_view();
    let members = view
        .members()
        .iter()
        .map(|member| summarize(&service, member))
        .collect();
    (StatusCode::OK, Json(MembersResponse { members }))
}

async fn handle_health(
    Extension(service): Extension<Arc<MembershipService>>,
) -> (StatusCode, Json<HealthResponse>) {
    let snapshot = service.snapshot();
    (
        StatusCode::OK,
        Json(HealthResponse {
            lifecycle: snapshot.lifecycle.to_string(),
            view_id: snapshot.view.id().value(),
            cluster_size: snapshot.view.len(),
        }),
    )
}

async fn handle_leave(
    Extension(service): Extension<Arc<MembershipService>>,
) -> (StatusCode, Json<LeaveResponse>) {
    // Detached so the response makes it out before participation stops.
    tokio::spawn(async move {
        service.leave().await;
    });
    (StatusCode::OK, Json(LeaveResponse { success: true }))
}

fn summarize(service: &MembershipService, member: &MemberIdentity) -> MemberSummary {
    let status = if member == service.local() {
        "self".to_string()
    } else {
        match service.peer_status(member) {
            Some(PeerStatus::Alive) => "alive",
            Some(PeerStatus::Suspect) => "suspect",
            Some(PeerStatus::Failed) => "failed",
            None => "unknown",
        }
        .to_string()
    };
    MemberSummary {
        address: member.address.to_string(),
        incarnation: member.incarnation,
        role: member.role.to_string(),
        weight: member.weight,
        status,
    }
}
