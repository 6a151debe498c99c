//! HTTP surface: REST routes plus the Smart-HTTP Git mount.
//!
//! ```text
//! /
//! ├── /producers/*   - configuration store REST API
//! └── /git/*         - Smart-HTTP Git endpoints per repository
//! ```

use axum::routing::{get, patch, post};
use axum::Router;

use crate::githttp;

mod error;
mod handlers;
mod state;

pub use error::{ApiError, ApiResult};
pub use state::AppState;

/// Build the complete router with all routes.
pub fn router(state: AppState) -> Router {
    Router::new()
        .nest("/producers", producers_router())
        .nest("/git", githttp::router())
        .with_state(state)
}

/// Producer and environment routes.
///
/// Routes:
/// - `POST   /producers` - create an empty repository
/// - `GET    /producers` - list producers with their environments
/// - `GET    /producers/{id}` - one producer's environments
/// - `DELETE /producers/{id}` - remove the repository
/// - `GET    /producers/{id}/exists` - directory presence check
/// - `GET    /producers/{id}/accesskey` - read the Smart-HTTP secret
/// - `POST   /producers/{id}/accesskey` - regenerate the secret
/// - `GET    /producers/{id}/change-stream` - streaming push events
/// - `PUT    /producers/{id}/envs/{env}` - point an environment at a revision
/// - `GET    /producers/{id}/envs/{env}` - environment head revision
/// - `DELETE /producers/{id}/envs/{env}` - delete the environment branch
/// - `PATCH  /producers/{id}/envs/{env}/files` - transactional multi-file write
/// - `GET    /producers/{id}/envs/{env}/files/{*path}` - read one file
fn producers_router() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            post(handlers::create_producer).get(handlers::list_producers),
        )
        .route(
            "/{id}",
            get(handlers::get_producer).delete(handlers::delete_producer),
        )
        .route("/{id}/exists", get(handlers::producer_exists))
        .route(
            "/{id}/accesskey",
            get(handlers::get_access_key).post(handlers::regenerate_access_key),
        )
        .route("/{id}/change-stream", get(handlers::change_stream))
        .route(
            "/{id}/envs/{env}",
            get(handlers::get_env)
                .put(handlers::put_env)
                .delete(handlers::delete_env),
        )
        .route("/{id}/envs/{env}/files", patch(handlers::patch_files))
        .route("/{id}/envs/{env}/files/{*path}", get(handlers::get_file))
}
