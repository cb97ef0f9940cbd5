//! Testing Utilities Module
//!
//! An in-memory network for scenario tests of the token lifecycle.
//!
//! ## Submodules
//!
//! - `simulated` - Base chain, L2 operator and faucet in one shared world
//! - `assertions` - Balance assertions

pub mod assertions;
pub mod simulated;

pub use assertions::*;
pub use simulated::*;
