//! Domain models for the web application.
//!
//! These are the validated shapes handlers and templates work with; database
//! row types stay private to [`crate::db`].

pub mod session;
pub mod user;

pub use session::{Flash, FlashLevel};
pub use user::User;
