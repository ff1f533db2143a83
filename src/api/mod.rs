//! Thin HTTP binding. Every handler calls the same operations, with the same
//! argument contracts and error taxonomy, as any other transport adapter;
//! nothing here owns domain logic.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{delete, get, post},
};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;

mod error;

pub use error::{ApiError, ApiResult};

use crate::db::AuditEntry;
use crate::error::Error;
use crate::services::{BuildOutcome, CleanReport, NameMatch, VmListing, VmRef};
use crate::state::SharedState;

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub const fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

fn ok<T>(data: T) -> ApiResult<T> {
    Ok(Json(ApiResponse::success(data)))
}

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/users", post(register_user).get(list_users))
        .route("/users/find", get(find_users))
        .route("/users/{id}/is-admin", get(is_admin))
        .route("/users/{id}/grant-admin", post(grant_admin))
        .route("/users/{id}/deactivate", post(deactivate_user))
        .route("/users/{id}/reactivate", post(reactivate_user))
        .route("/users/{id}/owns/{target}", get(owns_vm))
        .route("/identity/resolve", get(resolve_identity))
        .route("/identity/links", post(link_account))
        .route("/vms", post(build_vm).get(list_vms))
        .route("/vms/clean", post(clean_vms))
        .route("/vms/{target}", delete(delete_vm))
        .route("/vms/{target}/destroy", post(destroy_vm))
        .route("/vms/{target}/rebuild", post(rebuild_vm))
        .route("/vms/{target}/provision", post(provision_vm))
        .route("/vms/{target}/claim", post(claim_vm))
        .route("/blocklist", post(add_blocked_command))
        .route("/logs", get(logs_since))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health(State(state): State<SharedState>) -> ApiResult<&'static str> {
    state.store.ping().await?;
    ok("ok")
}

// --- users & identity ---

#[derive(Debug, Deserialize)]
struct RegisterUser {
    name: String,
}

async fn register_user(
    State(state): State<SharedState>,
    Json(body): Json<RegisterUser>,
) -> ApiResult<i64> {
    let id = state.identity.register_user(&body.name).await?;
    ok(id)
}

async fn list_users(State(state): State<SharedState>) -> ApiResult<Vec<NameMatch>> {
    let users = state.identity.list_users().await?;
    ok(users)
}

#[derive(Debug, Deserialize)]
struct FindUsers {
    name: Option<String>,
    fragment: Option<String>,
}

async fn find_users(
    State(state): State<SharedState>,
    Query(query): Query<FindUsers>,
) -> ApiResult<Vec<NameMatch>> {
    let matches = if let Some(name) = query.name {
        state.identity.find_by_name(&name).await?
    } else if let Some(fragment) = query.fragment {
        state.identity.fuzzy_find_by_name(&fragment).await?
    } else {
        return Err(ApiError(Error::ParseFailure(
            "query: expected `name` or `fragment`".to_string(),
        )));
    };
    ok(matches)
}

async fn is_admin(State(state): State<SharedState>, Path(id): Path<i64>) -> ApiResult<bool> {
    let admin = state.identity.is_admin(id).await?;
    ok(admin)
}

/// Acting user for admin-gated operations.
#[derive(Debug, Deserialize)]
struct ActingUser {
    acting_user: i64,
}

async fn grant_admin(
    State(state): State<SharedState>,
    Path(id): Path<i64>,
    Json(body): Json<ActingUser>,
) -> ApiResult<bool> {
    let granted = state.identity.grant_admin(body.acting_user, id).await?;
    if granted {
        ok(true)
    } else {
        Err(ApiError(Error::Unauthorized(
            "only admins can grant admin".to_string(),
        )))
    }
}

async fn deactivate_user(
    State(state): State<SharedState>,
    Path(id): Path<i64>,
    Json(body): Json<ActingUser>,
) -> ApiResult<bool> {
    let done = state.identity.deactivate_user(body.acting_user, id).await?;
    if done {
        ok(true)
    } else {
        Err(ApiError(Error::Unauthorized(
            "only admins can deactivate users".to_string(),
        )))
    }
}

async fn reactivate_user(
    State(state): State<SharedState>,
    Path(id): Path<i64>,
    Json(body): Json<ActingUser>,
) -> ApiResult<bool> {
    let done = state.identity.reactivate_user(body.acting_user, id).await?;
    if done {
        ok(true)
    } else {
        Err(ApiError(Error::Unauthorized(
            "only admins can reactivate users".to_string(),
        )))
    }
}

async fn owns_vm(
    State(state): State<SharedState>,
    Path((id, target)): Path<(i64, String)>,
) -> ApiResult<bool> {
    let vm_ref = VmRef::parse(&target);
    // Nonexistent VMs are simply not owned; only ambiguity is an error.
    let vm_id = match state.vms.resolve(&vm_ref).await {
        Ok(vm_id) => vm_id,
        Err(Error::NotFound(_)) => return ok(false),
        Err(err) => return Err(ApiError(err)),
    };
    let owns = state.identity.owns_vm(id, vm_id).await?;
    ok(owns)
}

#[derive(Debug, Deserialize)]
struct ResolveIdentity {
    service_id: String,
}

async fn resolve_identity(
    State(state): State<SharedState>,
    Query(query): Query<ResolveIdentity>,
) -> ApiResult<i64> {
    let id = state.identity.resolve_user(&query.service_id).await?;
    ok(id)
}

#[derive(Debug, Deserialize)]
struct LinkAccount {
    username: String,
    service_id: String,
    user_id: Option<i64>,
    /// Alternative to `user_id`: link to whoever owns this VM.
    vm: Option<String>,
}

async fn link_account(
    State(state): State<SharedState>,
    Json(body): Json<LinkAccount>,
) -> ApiResult<()> {
    match (body.user_id, body.vm) {
        (Some(user_id), None) => {
            state
                .identity
                .link_service_account(user_id, &body.username, &body.service_id)
                .await?;
        }
        (None, Some(vm)) => {
            let vm_id = state.vms.resolve(&VmRef::parse(&vm)).await?;
            state
                .identity
                .link_account_by_vm(vm_id, &body.username, &body.service_id)
                .await?;
        }
        _ => {
            return Err(ApiError(Error::ParseFailure(
                "body: expected exactly one of `user_id` or `vm`".to_string(),
            )));
        }
    }
    ok(())
}

// --- vms ---

#[derive(Debug, Deserialize)]
struct BuildVm {
    owner: i64,
    #[serde(rename = "box")]
    box_name: Option<String>,
}

async fn build_vm(
    State(state): State<SharedState>,
    Json(body): Json<BuildVm>,
) -> ApiResult<BuildOutcome> {
    let outcome = state
        .vms
        .build(body.owner, body.box_name.as_deref())
        .await?;
    ok(outcome)
}

#[derive(Debug, Deserialize)]
struct ListVms {
    #[serde(default)]
    all: bool,
}

async fn list_vms(
    State(state): State<SharedState>,
    Query(query): Query<ListVms>,
) -> ApiResult<Vec<VmListing>> {
    let vms = if query.all {
        state.vms.list_all_vms().await?
    } else {
        state.vms.list_vms().await?
    };
    ok(vms)
}

async fn destroy_vm(
    State(state): State<SharedState>,
    Path(target): Path<String>,
) -> ApiResult<String> {
    let output = state.vms.destroy(&VmRef::parse(&target)).await?;
    ok(output)
}

async fn rebuild_vm(
    State(state): State<SharedState>,
    Path(target): Path<String>,
) -> ApiResult<String> {
    let output = state.vms.rebuild(&VmRef::parse(&target)).await?;
    ok(output)
}

async fn provision_vm(
    State(state): State<SharedState>,
    Path(target): Path<String>,
) -> ApiResult<String> {
    let output = state.vms.provision(&VmRef::parse(&target)).await?;
    ok(output)
}

async fn delete_vm(
    State(state): State<SharedState>,
    Path(target): Path<String>,
) -> ApiResult<String> {
    let output = state.vms.delete(&VmRef::parse(&target)).await?;
    ok(output)
}

#[derive(Debug, Deserialize)]
struct ClaimVm {
    owner: i64,
}

async fn claim_vm(
    State(state): State<SharedState>,
    Path(target): Path<String>,
    Json(body): Json<ClaimVm>,
) -> ApiResult<()> {
    state.vms.claim(&VmRef::parse(&target), body.owner).await?;
    ok(())
}

async fn clean_vms(State(state): State<SharedState>) -> ApiResult<CleanReport> {
    let report = state.vms.clean().await?;
    ok(report)
}

// --- blocklist & logs ---

#[derive(Debug, Deserialize)]
struct BlockCommand {
    command: String,
    acting_user: i64,
}

async fn add_blocked_command(
    State(state): State<SharedState>,
    Json(body): Json<BlockCommand>,
) -> ApiResult<()> {
    if !state.identity.is_admin(body.acting_user).await? {
        return Err(ApiError(Error::Unauthorized(
            "only admins can block commands".to_string(),
        )));
    }

    state.add_blocked_command(&body.command).await?;
    ok(())
}

#[derive(Debug, Deserialize)]
struct LogsSince {
    since: String,
}

async fn logs_since(
    State(state): State<SharedState>,
    Query(query): Query<LogsSince>,
) -> ApiResult<Vec<AuditEntry>> {
    let entries = state.audit.logs_since(&query.since).await?;
    ok(entries)
}
