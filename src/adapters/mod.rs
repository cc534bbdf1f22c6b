//! Implementations of the application ports.

pub mod outbound;
