//! Client Module Index
//!
//! The browser-side half of the portal expressed as plain async Rust: an explicit
//! `AuthContext` replaces global auth state and is passed to the guard, the
//! navigator and the page operations. All traffic goes through `ApiClient`, which
//! keeps the session cookie between calls.

/// HTTP access to the `/api` endpoints and the client error type.
pub mod api;

/// Session state as seen by the client: load, login, logout.
pub mod context;

/// The route table and each role's dashboard.
pub mod routes;

/// Access decisions and navigation.
pub mod guard;

/// One operation per page: guard, then fetch and render, or validate, submit and redirect.
pub mod pages;

pub use api::{ApiClient, AuthApi, ClientError};
pub use context::AuthContext;
pub use guard::{Access, Navigator, guard};
pub use routes::Route;
