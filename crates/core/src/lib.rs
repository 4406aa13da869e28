//! Roster Core - Shared domain types.
//!
//! This crate provides the types shared by every Roster component:
//! - `web` - The HTTP application (routes, persistence, bootstrap)
//! - `cli` - Command-line tools for database bootstrap and migrations
//!
//! # Architecture
//!
//! The core crate contains only types and parsing rules - no I/O, no database
//! access, no HTTP. Validation that must happen before anything reaches
//! storage (for example, rejecting blank user names) lives here.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, validated names and emails, deployment settings

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
