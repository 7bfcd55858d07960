mod raw;
mod record;
mod snapshot;

pub use raw::*;
pub use record::*;
pub use snapshot::*;
