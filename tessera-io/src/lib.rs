//! Columnar file access for Tessera.
//!
//! Partitioning strategies only ever talk to Parquet through this crate: [`DataReader`] streams
//! record batches and answers metadata questions (row counts, column statistics), while
//! [`DataWriter`] produces partition files, always through a temporary sibling path that is
//! renamed into place once the file is complete.

pub use convert::*;
pub use reader::*;
pub use settings::*;
pub use writer::*;

mod convert;
pub mod fixtures;
mod reader;
mod settings;
mod writer;

/// Name of the column that carries the partition id of each row in written partitions.
pub const PARTITION_ID_COLUMN: &str = "partition_id";
