// Utility modules for the redirect core

pub mod hmac;
pub mod service_error;

pub use hmac::{sign as hmac_sign, verify as hmac_verify};
pub use service_error::ResolveError;
