//! Router Module Index
//!
//! Routes are split by who may reach them. The auth layer is applied once, in
//! `create_router`, to everything outside `public`.

/// Routes reachable without a session: liveness, login and session status.
pub mod public;

/// Routes for any logged-in role. Each handler checks the role it serves.
pub mod authenticated;

/// Routes restricted to the Admin role.
pub mod admin;
