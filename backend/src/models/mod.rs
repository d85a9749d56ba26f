//! Database models (SQLx).

pub mod artifact;
pub mod audit_log;
pub mod comment;
pub mod expert_review;
pub mod flag;
pub mod user;
pub mod vote;
