//! # Infrastructure Layer
//!
//! This crate implements the infrastructure layer for the AccountGuard
//! application. It provides the concrete implementations of the core
//! crate's persistence and delivery boundaries:
//!
//! - **Database**: MySQL implementation of `AccountRepository` using SQLx
//! - **Email**: SMTP delivery of security tokens using lettre
//!
//! Infrastructure failures surface as [`InfrastructureError`] during
//! construction and configuration; once wired behind the core traits they
//! are reported through the trait's own error channel.

pub mod config;
pub mod database;
pub mod email;

use thiserror::Error;

/// Infrastructure-level failures
#[derive(Error, Debug)]
pub enum InfrastructureError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Email transport error: {0}")]
    Email(String),
}
