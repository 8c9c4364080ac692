//! Shared building blocks for axum HTTP services: error taxonomy, response
//! envelope, structured logging, validation and sanitization, bearer/RBAC
//! authentication, a PostgreSQL connector and HTTP plumbing middleware.

pub mod api;
pub mod app;
pub mod config;
pub mod database;
pub mod error;
pub mod extractors;
pub mod logger;
pub mod middleware;
pub mod request_context;
pub mod response;
pub mod services;
pub mod state;
pub mod validation;

#[cfg(test)]
mod testing;
