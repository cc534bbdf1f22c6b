//! These traits define what the application can do.

pub mod issue;
pub mod refresh;

pub use issue::*;
pub use refresh::*;
