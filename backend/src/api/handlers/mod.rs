//! HTTP request handlers.

pub mod admin;
pub mod artifacts;
pub mod comments;
pub mod expert;
pub mod flags;
pub mod health;
pub mod publication;
pub mod votes;
