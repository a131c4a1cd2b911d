pub mod clean;
pub mod dataset;
pub mod ingest;

pub use clean::CLEAN_NAME_COLUMN;
pub use dataset::{Cell, Column, ColumnType, Dataset};
pub use ingest::load_dataset;
