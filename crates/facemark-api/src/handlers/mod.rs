//! Request handlers.

pub mod detect;
pub mod health;

pub use detect::{not_found, submit, upload, DetectResponse, SubmitForm};
pub use health::{health, ready};
