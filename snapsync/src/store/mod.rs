mod base;
mod body;
pub mod file;
pub mod memory;

pub use base::*;
