//! Core types for Roster.
//!
//! This module provides type-safe wrappers for the few domain concepts the
//! application has.

pub mod email;
pub mod environment;
pub mod id;
pub mod name;

pub use email::{Email, EmailError};
pub use environment::{DatabaseBackend, DeploymentMode, UnknownSetting};
pub use id::*;
pub use name::{UserName, UserNameError};
