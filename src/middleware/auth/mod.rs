//! Authentication and authorization layers.
//!
//! - `bearer`: access-token verification, attaches the caller's identity
//! - `rbac`: role/permission checks on gateway-provided identity headers

pub mod bearer;
pub mod rbac;

pub use rbac::AccessRule;
