//! API DTOs module
//!
//! This module contains all API data transfer objects organized by domain:
//! - `auth`: session lookup and the identity provider
//! - `handout`: subjects, handouts, versions and uploads

pub mod auth;
pub mod handout;

pub use auth::*;
pub use handout::*;
