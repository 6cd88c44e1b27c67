//! Shared error kinds, response envelope, and id/timestamp helpers used
//! across every ObjectOS kernel crate.

pub mod error;
pub mod ids;

pub use error::{Envelope, Error, Result};
