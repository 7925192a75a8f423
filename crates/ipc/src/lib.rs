//! IPC protocol and client for taskdeck daemon communication
//!
//! The daemon listens on a Unix socket and speaks newline-delimited JSON:
//! one request per line in, one response per line out. Requests are tagged
//! with a `type` field (`"tasks:move"`, `"boards:list"`, ...) and responses
//! carry an `{ok, data}` / `{ok, error}` envelope.
//!
//! The [`Client`] opens a fresh connection per request, which keeps the
//! daemon side stateless and lets several CLI invocations share one daemon
//! without coordination.

mod client;
mod protocol;

pub use client::Client;
pub use protocol::{Request, RequestOp, Response};
