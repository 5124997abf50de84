//! Content digests as used for blob and manifest addressing.
//!
//! The registry stores and serves content exclusively under `sha256:<hex>`
//! digests; parsing rejects every other algorithm up front.
mod parse;
mod verify;

pub use parse::*;
pub use verify::*;
