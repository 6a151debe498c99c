//! Smart-HTTP endpoints.
//!
//! `GET /{repo}/info/refs?service=…` advertises refs; `POST /{repo}/{svc}`
//! runs the stateless RPC round. Both authenticate against the target
//! repository, spawn the matching Git helper and stream bytes between the
//! client and the child process without buffering whole payloads. The
//! receive-pack stdout additionally runs through a pkt-line tee that turns
//! the post-receive report into push events.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::Stdio;

use axum::body::Body;
use axum::extract::{ConnectInfo, Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use bytes::Bytes;
use futures::StreamExt;
use serde::Deserialize;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{info, warn};

use crate::events::PushEvent;
use crate::githttp::auth::{authenticate, AuthOutcome};
use crate::githttp::pktline::{pkt_line, FLUSH_PKT};
use crate::githttp::report::ReceiveReport;
use crate::server::AppState;
use crate::storage::ProducerName;

/// the two Smart-HTTP services; everything else is rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GitService {
    UploadPack,
    ReceivePack,
}

impl GitService {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "git-upload-pack" => Some(Self::UploadPack),
            "git-receive-pack" => Some(Self::ReceivePack),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::UploadPack => "git-upload-pack",
            Self::ReceivePack => "git-receive-pack",
        }
    }

    /// subcommand form; the dashed helper binaries live outside PATH
    fn subcommand(&self) -> &'static str {
        match self {
            Self::UploadPack => "upload-pack",
            Self::ReceivePack => "receive-pack",
        }
    }

    fn is_receive_pack(&self) -> bool {
        matches!(self, Self::ReceivePack)
    }

    fn advertisement_type(&self) -> String {
        format!("application/x-{}-advertisement", self.name())
    }

    fn request_type(&self) -> String {
        format!("application/x-{}-request", self.name())
    }

    fn result_type(&self) -> String {
        format!("application/x-{}-result", self.name())
    }
}

/// Routes for one repository mount; nest under a host-chosen prefix.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{repo}/info/refs", get(info_refs))
        .route("/{repo}/{service}", post(service_rpc))
}

#[derive(Debug, Deserialize)]
struct InfoRefsQuery {
    service: Option<String>,
}

async fn info_refs(
    State(state): State<AppState>,
    Path(repo): Path<String>,
    Query(query): Query<InfoRefsQuery>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> Response {
    let Some(service) = query.service else {
        return plain(StatusCode::BAD_REQUEST, "dumb protocol not supported");
    };
    let Some(service) = GitService::from_name(&service) else {
        return plain(StatusCode::BAD_REQUEST, "unknown service");
    };

    let (_, repo_path) = match authorize(&state, &repo, addr, &headers).await {
        Ok(granted) => granted,
        Err(response) => return response,
    };

    let mut child = match Command::new("git")
        .arg(service.subcommand())
        .arg("--stateless-rpc")
        .arg("--advertise-refs")
        .arg(&repo_path)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
    {
        Ok(child) => child,
        Err(e) => {
            warn!(service = service.name(), error = %e, "failed to spawn git helper");
            return plain(StatusCode::INTERNAL_SERVER_ERROR, "failed to spawn git");
        }
    };

    let mut stdout = child.stdout.take().expect("stdout piped");
    let (tx, rx) = mpsc::channel::<Result<Bytes, std::io::Error>>(16);

    let mut lead_in = pkt_line(format!("# service={}\n", service.name()).as_bytes());
    lead_in.extend_from_slice(FLUSH_PKT);

    tokio::spawn(async move {
        if tx.send(Ok(Bytes::from(lead_in))).await.is_err() {
            return;
        }
        let mut buf = [0u8; 8192];
        loop {
            match stdout.read(&mut buf).await {
                Ok(0) => break,
                Ok(n) => {
                    if tx.send(Ok(Bytes::copy_from_slice(&buf[..n]))).await.is_err() {
                        break;
                    }
                }
                Err(e) => {
                    let _ = tx.send(Err(e)).await;
                    break;
                }
            }
        }
        drop(stdout);
        let _ = child.wait().await;
    });

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, service.advertisement_type())
        .header(header::EXPIRES, "Fri, 01 Jan 1980 00:00:00 GMT")
        .header(header::PRAGMA, "no-cache")
        .header(header::CACHE_CONTROL, "no-cache, max-age=0, must-revalidate")
        .body(Body::from_stream(ReceiverStream::new(rx)))
        .expect("advertisement response")
}

async fn service_rpc(
    State(state): State<AppState>,
    Path((repo, service)): Path<(String, String)>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    body: Body,
) -> Response {
    let Some(service) = GitService::from_name(&service) else {
        return plain(StatusCode::BAD_REQUEST, "unknown service");
    };

    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok());
    if content_type != Some(service.request_type().as_str()) {
        return plain(StatusCode::UNSUPPORTED_MEDIA_TYPE, "unsupported media type");
    }

    let (producer, repo_path) = match authorize(&state, &repo, addr, &headers).await {
        Ok(granted) => granted,
        Err(response) => return response,
    };

    let mut child = match Command::new("git")
        .arg(service.subcommand())
        .arg("--stateless-rpc")
        .arg(&repo_path)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
    {
        Ok(child) => child,
        Err(e) => {
            warn!(service = service.name(), error = %e, "failed to spawn git helper");
            return plain(StatusCode::INTERNAL_SERVER_ERROR, "failed to spawn git");
        }
    };

    let mut stdin = child.stdin.take().expect("stdin piped");
    let mut stdout = child.stdout.take().expect("stdout piped");

    // request body -> child stdin, closed at EOF so the helper finishes
    tokio::spawn(async move {
        let mut stream = body.into_data_stream();
        while let Some(chunk) = stream.next().await {
            match chunk {
                Ok(bytes) => {
                    if stdin.write_all(&bytes).await.is_err() {
                        break;
                    }
                }
                Err(_) => break,
            }
        }
        drop(stdin);
    });

    let (tx, rx) = mpsc::channel::<Result<Bytes, std::io::Error>>(16);
    let bus = state.bus.clone();

    // child stdout -> response body, teed into the report parser for pushes
    tokio::spawn(async move {
        let mut report = service.is_receive_pack().then(ReceiveReport::new);
        let mut client = Some(tx);
        let mut buf = [0u8; 8192];

        loop {
            match stdout.read(&mut buf).await {
                Ok(0) => break,
                Ok(n) => {
                    if let Some(report) = report.as_mut() {
                        report.feed(&buf[..n]);
                    }
                    if let Some(tx) = client.as_ref() {
                        if tx.send(Ok(Bytes::copy_from_slice(&buf[..n]))).await.is_err() {
                            // client went away; keep draining so the push
                            // report stays observable
                            client = None;
                        }
                    }
                }
                Err(e) => {
                    if let Some(tx) = client.take() {
                        let _ = tx.send(Err(e)).await;
                    }
                    break;
                }
            }
        }
        drop(stdout);

        match child.wait().await {
            Ok(status) if status.success() => {
                if let Some(report) = report.take() {
                    let changes = report.into_changes();
                    if !changes.is_empty() {
                        info!(producer = %producer, changes = changes.len(), "push received");
                        bus.publish(PushEvent::new(producer.as_str(), changes));
                    }
                }
            }
            Ok(status) => {
                warn!(service = service.name(), %status, "git helper exited non-zero");
            }
            Err(e) => {
                warn!(service = service.name(), error = %e, "failed to reap git helper");
            }
        }
    });

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, service.result_type())
        .body(Body::from_stream(ReceiverStream::new(rx)))
        .expect("rpc response")
}

/// Resolve the repository and enforce authentication.
///
/// The `{repo}` path segment is accepted with or without the `.git`
/// suffix; both address the same repository directory.
async fn authorize(
    state: &AppState,
    repo: &str,
    addr: SocketAddr,
    headers: &HeaderMap,
) -> Result<(ProducerName, PathBuf), Response> {
    let name = repo.strip_suffix(".git").unwrap_or(repo);
    let Ok(producer) = ProducerName::new(name) else {
        return Err(plain(StatusCode::NOT_FOUND, "no such repository"));
    };

    let state_for_key = state.clone();
    let producer_for_key = producer.clone();
    let access_key = tokio::task::spawn_blocking(move || {
        state_for_key
            .repos
            .get(&producer_for_key)
            .and_then(|repo| repo.access_key())
    })
    .await
    .map_err(|_| plain(StatusCode::INTERNAL_SERVER_ERROR, "internal error"))?;

    let access_key = match access_key {
        Ok(key) => key,
        Err(crate::storage::StorageError::RepoDoesNotExist(_)) => {
            return Err(plain(StatusCode::NOT_FOUND, "no such repository"));
        }
        // a repo without a key still admits private-network callers
        Err(crate::storage::StorageError::ConfigMissing(_)) => String::new(),
        Err(e) => {
            warn!(error = %e, "failed to read access key");
            return Err(plain(StatusCode::INTERNAL_SERVER_ERROR, "internal error"));
        }
    };

    let authorization = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    match authenticate(
        addr.ip(),
        authorization,
        &access_key,
        state.settings.git_auth_on_private_networks,
    ) {
        AuthOutcome::Granted { .. } => Ok((producer.clone(), state.repos.path(&producer))),
        AuthOutcome::Denied => Err(Response::builder()
            .status(StatusCode::UNAUTHORIZED)
            .header(header::WWW_AUTHENTICATE, "Basic realm=\"gitconf\"")
            .body(Body::from("authentication required"))
            .expect("401 response")),
    }
}

fn plain(status: StatusCode, message: &'static str) -> Response {
    (status, message).into_response()
}
