//! Wire types for the Handout Vault API and its identity provider
//!
//! - `common`: entities returned by the API (subjects, handouts, versions, users)
//! - `api`: request and response bodies for individual endpoints

pub mod api;
pub mod common;
