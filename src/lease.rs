//! Lease records, lifecycle helpers, and the redacting token wrapper.

pub mod record;
pub mod secret;

pub use record::*;
pub use secret::*;
