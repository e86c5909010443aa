//! API route modules.

pub mod meet;
pub mod recordings;
