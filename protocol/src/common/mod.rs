pub mod auth;
pub mod handout;

pub use auth::*;
pub use handout::*;
