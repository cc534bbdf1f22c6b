//! Core value types of the session-token service.
//!
//! Nothing here performs I/O: identities, permissions, claim sets and key
//! material are validated on construction and immutable afterwards.

pub mod claims;
pub mod error;
pub mod identity;
pub mod key;
pub mod permission;
pub mod token;
