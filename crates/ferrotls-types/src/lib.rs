#![forbid(unsafe_code)]
#![doc = "Common error types and status codes for the ferrotls handshake engine."]

pub mod error;

pub use error::*;
