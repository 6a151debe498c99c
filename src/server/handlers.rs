//! REST handlers for producers, environments, files and the change stream.
//!
//! Handlers are thin: parse the request, run the repository engine on the
//! blocking pool, map the result. Environments are branches named
//! `env/<envId>`; commit hashes travel as ETags.

use std::collections::BTreeMap;

use axum::body::{Body, Bytes};
use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::Response;
use axum::Json;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_stream::wrappers::UnboundedReceiverStream;

use crate::server::error::{ApiError, ApiResult};
use crate::server::state::AppState;
use crate::storage::{BranchName, ProducerName, RepoManager, StorageError};

/// producer summary: id plus environment heads
#[derive(Debug, Serialize)]
pub struct ProducerInfo {
    pub id: String,
    pub envs: BTreeMap<String, String>,
}

#[derive(Debug, Serialize)]
pub struct EnvInfo {
    pub id: String,
    pub revision: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateProducerRequest {
    pub id: String,
}

#[derive(Debug, Deserialize)]
pub struct PutEnvRequest {
    pub revision: String,
}

#[derive(Debug, Serialize)]
pub struct AccessKeyResponse {
    #[serde(rename = "accessKey")]
    pub access_key: String,
}

#[derive(Debug, Serialize)]
pub struct CountResponse {
    pub count: u32,
}

#[derive(Debug, Serialize)]
pub struct ExistsResponse {
    pub exists: bool,
}

fn parse_producer(id: &str) -> ApiResult<ProducerName> {
    ProducerName::new(id).map_err(|e| ApiError::BadRequest(format!("invalid producer id: {e}")))
}

fn env_branch(env_id: &str) -> ApiResult<BranchName> {
    BranchName::for_env(env_id)
        .map_err(|e| ApiError::BadRequest(format!("invalid environment id: {e}")))
}

/// Run repository work on the blocking pool; git2 and the file lock are
/// synchronous.
async fn blocking<T, F>(f: F) -> ApiResult<T>
where
    F: FnOnce() -> ApiResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await?
}

/// Branch heads shaped for the REST surface: `env/<x>` becomes `envs.<x>`;
/// a bare `master` branch doubles as `envs.dev` while nothing has claimed
/// that name (migration shim for repos predating env branches).
fn producer_info(repos: &RepoManager, producer: &ProducerName) -> ApiResult<ProducerInfo> {
    let repo = repos.get(producer)?;

    let mut envs = BTreeMap::new();
    let mut master = None;
    for (branch, commit) in repo.branch_heads()? {
        if let Some(env) = branch.env_id() {
            envs.insert(env.to_string(), commit.to_hex());
        } else if branch.as_str() == "master" {
            master = Some(commit.to_hex());
        }
    }
    if let Some(revision) = master {
        envs.entry("dev".to_string()).or_insert(revision);
    }

    Ok(ProducerInfo {
        id: producer.as_str().to_string(),
        envs,
    })
}

// ==================== Producers ====================

pub async fn create_producer(
    State(state): State<AppState>,
    Json(request): Json<CreateProducerRequest>,
) -> ApiResult<(StatusCode, Json<ProducerInfo>)> {
    let producer = parse_producer(&request.id)?;
    let info = blocking(move || {
        state.repos.create(&producer)?;
        producer_info(&state.repos, &producer)
    })
    .await?;
    Ok((StatusCode::CREATED, Json(info)))
}

pub async fn list_producers(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<ProducerInfo>>> {
    let infos = blocking(move || {
        let mut infos = Vec::new();
        for producer in state.repos.list()? {
            infos.push(producer_info(&state.repos, &producer)?);
        }
        Ok(infos)
    })
    .await?;
    Ok(Json(infos))
}

pub async fn get_producer(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<ProducerInfo>> {
    let producer = parse_producer(&id)?;
    let info = blocking(move || producer_info(&state.repos, &producer)).await?;
    Ok(Json(info))
}

pub async fn producer_exists(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<ExistsResponse>> {
    let producer = parse_producer(&id)?;
    Ok(Json(ExistsResponse {
        exists: state.repos.exists(&producer),
    }))
}

pub async fn delete_producer(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<CountResponse>> {
    let producer = parse_producer(&id)?;
    let removed = blocking(move || Ok(state.repos.remove(&producer)?)).await?;
    if !removed {
        return Err(StorageError::RepoDoesNotExist(id).into());
    }
    Ok(Json(CountResponse { count: 1 }))
}

// ==================== Access key ====================

pub async fn get_access_key(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<AccessKeyResponse>> {
    let producer = parse_producer(&id)?;
    let access_key = blocking(move || Ok(state.repos.get(&producer)?.access_key()?)).await?;
    Ok(Json(AccessKeyResponse { access_key }))
}

pub async fn regenerate_access_key(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<AccessKeyResponse>> {
    let producer = parse_producer(&id)?;
    let access_key =
        blocking(move || Ok(state.repos.get(&producer)?.regenerate_access_key()?)).await?;
    Ok(Json(AccessKeyResponse { access_key }))
}

// ==================== Environments ====================

pub async fn get_env(
    State(state): State<AppState>,
    Path((id, env)): Path<(String, String)>,
) -> ApiResult<Json<EnvInfo>> {
    let producer = parse_producer(&id)?;
    let branch = env_branch(&env)?;
    let revision = blocking(move || {
        let repo = state.repos.get(&producer)?;
        Ok(repo.branch_revision(&branch)?)
    })
    .await?;
    Ok(Json(EnvInfo {
        id: env,
        revision: revision.to_hex(),
    }))
}

pub async fn put_env(
    State(state): State<AppState>,
    Path((id, env)): Path<(String, String)>,
    Json(request): Json<PutEnvRequest>,
) -> ApiResult<Json<EnvInfo>> {
    let producer = parse_producer(&id)?;
    let branch = env_branch(&env)?;
    let revision = blocking(move || {
        let repo = state.repos.get(&producer)?;
        Ok(repo.upsert_branch(&branch, &request.revision)?)
    })
    .await?;
    Ok(Json(EnvInfo {
        id: env,
        revision: revision.to_hex(),
    }))
}

pub async fn delete_env(
    State(state): State<AppState>,
    Path((id, env)): Path<(String, String)>,
) -> ApiResult<Json<CountResponse>> {
    let producer = parse_producer(&id)?;
    let branch = env_branch(&env)?;
    blocking(move || {
        let repo = state.repos.get(&producer)?;
        Ok(repo.delete_branch(&branch)?)
    })
    .await?;
    Ok(Json(CountResponse { count: 1 }))
}

// ==================== Files ====================

pub async fn patch_files(
    State(state): State<AppState>,
    Path((id, env)): Path<(String, String)>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Response> {
    let producer = parse_producer(&id)?;
    let branch = env_branch(&env)?;

    if body.is_empty() {
        return Err(ApiError::MissingBody);
    }
    let value: Value = serde_json::from_slice(&body).map_err(|_| ApiError::MissingBody)?;
    let Value::Object(map) = value else {
        return Err(ApiError::MissingBody);
    };

    let mut files = Vec::with_capacity(map.len());
    for (path, content) in map {
        let bytes = match content {
            Value::String(text) => text.into_bytes(),
            other => serde_json::to_vec(&other)
                .map_err(|e| ApiError::Internal(format!("cannot serialize content: {e}")))?,
        };
        state.validator.validate(&path, &bytes)?;
        files.push((path, bytes));
    }

    let parent_revision = if_match(&headers);
    let revision = blocking(move || {
        let repo = state.repos.get(&producer)?;
        Ok(repo.update_branch_files(&branch, parent_revision.as_deref(), &files)?)
    })
    .await?;

    Ok(Response::builder()
        .status(StatusCode::NO_CONTENT)
        .header(header::ETAG, revision.to_hex())
        .body(Body::empty())
        .expect("patch response"))
}

pub async fn get_file(
    State(state): State<AppState>,
    Path((id, env, path)): Path<(String, String, String)>,
) -> ApiResult<Response> {
    let producer = parse_producer(&id)?;
    let branch = env_branch(&env)?;

    let (content, revision) = blocking(move || {
        let repo = state.repos.get(&producer)?;
        Ok(repo.get_file(&branch, &path)?)
    })
    .await?;

    Ok(Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/octet-stream")
        .header(header::ETAG, revision.to_hex())
        .body(Body::from(content))
        .expect("file response"))
}

// ==================== Change stream ====================

pub async fn change_stream(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Response> {
    let producer = parse_producer(&id)?;

    let snapshot_state = state.clone();
    let snapshot_producer = producer.clone();
    let branches = blocking(move || {
        let repo = snapshot_state.repos.get(&snapshot_producer)?;
        let mut branches = BTreeMap::new();
        for (branch, commit) in repo.branch_heads()? {
            branches.insert(branch.as_str().to_string(), commit.to_hex());
        }
        Ok(branches)
    })
    .await?;

    let rx = state.bus.subscribe(&producer, branches);
    let stream = UnboundedReceiverStream::new(rx).map(|event| {
        serde_json::to_vec(&event)
            .map(|mut line| {
                line.push(b'\n');
                Bytes::from(line)
            })
            .map_err(std::io::Error::other)
    });

    Ok(Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/x-ndjson")
        .header(header::CACHE_CONTROL, "no-cache")
        .body(Body::from_stream(stream))
        .expect("change stream response"))
}

/// `If-Match` carries the parent revision; surrounding quotes are shed so
/// both quoted and bare ETags interoperate.
fn if_match(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::IF_MATCH)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.trim().trim_matches('"').to_string())
        .filter(|s| !s.is_empty())
}
