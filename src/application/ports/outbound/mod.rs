//! These traits define what the application needs from the outside world.

pub mod clock;
pub mod identity;
pub mod permission;
pub mod random;
pub mod token;

pub use clock::*;
pub use identity::*;
pub use permission::*;
pub use random::*;
pub use token::*;
