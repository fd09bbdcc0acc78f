//! CLI commands module.

mod admin;
mod auth;
mod enroll;
mod util;

pub use admin::{drop_collection, init, status};
pub use auth::AuthArgs;
pub use enroll::EnrollArgs;

pub(crate) use util::*;
