//! Smart-HTTP Git front-end.
//!
//! Exposes `/info/refs` and the stateless RPC endpoint per repository,
//! authenticates callers against the repository's access key, pipes bytes
//! between the HTTP transport and the spawned Git helpers, and extracts
//! push events from the receive-pack report stream.
//!
//! The dumb protocol is not served.

pub mod auth;
pub mod pktline;
pub mod report;
pub mod service;

pub use service::{router, GitService};
