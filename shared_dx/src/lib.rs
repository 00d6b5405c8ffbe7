#[macro_use]
extern crate lazy_static;

pub mod defs;
pub mod error;
pub mod format;
pub mod types;
pub mod util;

#[cfg(any(test, feature = "fake"))]
pub mod fake;
