pub mod descriptor;
pub mod hints;

pub use descriptor::{describe, format_amount, SchemaDescriptor};
