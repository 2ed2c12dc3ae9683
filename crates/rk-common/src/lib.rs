//! RosterKit Common
//!
//! Infrastructure shared by the RosterKit crates and binaries.

pub mod logging;

pub use logging::{init_logging, LogFormat};
