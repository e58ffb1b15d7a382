#![warn(clippy::all)]
#![allow(clippy::new_without_default)]

pub mod design;
pub mod encoding;
pub mod error;
pub mod sql;

pub use encoding::Encoding;
pub use error::{Error, Result};
