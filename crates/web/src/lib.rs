//! Roster web application library.
//!
//! The binary in `main.rs` is a thin wrapper around [`prepare`] and
//! [`create_app`]; everything is exposed here so the integration tests can
//! assemble the same application.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod app;
pub mod bootstrap;
pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
pub mod telemetry;
pub mod urls;

pub use app::{create_app, prepare};
