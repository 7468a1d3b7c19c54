//! Shared types, errors, and configuration for Ledgerline.
//!
//! This crate provides common types used across all other crates:
//! - Typed IDs for tenants, users, journal entries, approval requests, ...
//! - ISO currency codes and decimal money
//! - Actors (users or the system) recorded on every mutation
//! - Pagination types for list endpoints
//! - Application-wide error types
//! - Configuration management, JWT handling and tracing setup

pub mod auth;
pub mod config;
pub mod error;
pub mod jwt;
pub mod telemetry;
pub mod types;

pub use config::AppConfig;
pub use error::{AppError, AppResult};
