//! Shared utilities for the karst memory modeling toolkit.
mod errors;
mod id;
mod math;

pub use errors::{Error, ErrorKind, KarstResult};
pub use id::{GSym, GetName, Id};
pub use math::{bits_needed_for, gcd, is_power_of_two};
