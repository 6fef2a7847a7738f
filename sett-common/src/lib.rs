// sett-common - Shared types and physical layouts for Sett
//
// This crate defines the error taxonomy, the key codec, and the value envelope
// shared by the engine and its front ends.

pub mod codec;
pub mod entry;
pub mod error;

// Re-export for convenience
pub use codec::*;
pub use entry::*;
pub use error::*;
