mod base;
mod delete;
mod schema;
mod snapsync;
mod source;
mod store;
mod sync;
mod telemetry;

pub use base::*;
pub use delete::*;
pub use schema::*;
pub use snapsync::*;
pub use source::*;
pub use store::*;
pub use sync::*;
pub use telemetry::*;
