use parquet::basic::Compression;
use parquet::file::properties::{WriterProperties, WriterVersion};

/// Rows per Parquet row group in written files.
pub const DEFAULT_ROW_GROUP_SIZE: usize = 131_072;
/// Rows per record batch when streaming input files.
pub const DEFAULT_BATCH_SIZE: usize = DEFAULT_ROW_GROUP_SIZE * 7;
/// Extension of every file written by Tessera.
pub const DEFAULT_FILE_EXTENSION: &str = "parquet";
/// Depth at which grid-file splitting stops and turns the branch into a leaf.
pub const DEFAULT_MAX_SPLIT_DEPTH: usize = 32;
/// Value of the `created_by` field in Parquet footers.
pub const CREATED_BY: &str = "tessera partitioner";

/// Process-wide knobs shared by readers, writers and partitioning strategies.
#[derive(Debug, Clone)]
pub struct Settings {
    batch_size: usize,
    row_group_size: usize,
    compression: Compression,
    file_extension: String,
    add_partition_id: bool,
    order_by_skewness: bool,
    max_split_depth: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            row_group_size: DEFAULT_ROW_GROUP_SIZE,
            compression: Compression::SNAPPY,
            file_extension: DEFAULT_FILE_EXTENSION.to_string(),
            add_partition_id: true,
            order_by_skewness: false,
            max_split_depth: DEFAULT_MAX_SPLIT_DEPTH,
        }
    }
}

impl Settings {
    /// Rows per batch when streaming. Values below 1 are raised to 1.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_row_group_size(mut self, row_group_size: usize) -> Self {
        self.row_group_size = row_group_size.max(1);
        self
    }

    pub fn with_compression(mut self, compression: Compression) -> Self {
        self.compression = compression;
        self
    }

    pub fn with_file_extension(mut self, extension: impl Into<String>) -> Self {
        self.file_extension = extension.into();
        self
    }

    /// Whether id-based strategies append a `partition_id` column to written partitions.
    pub fn with_partition_id(mut self, add_partition_id: bool) -> Self {
        self.add_partition_id = add_partition_id;
        self
    }

    /// Whether out-of-core strategies visit dimensions in order of decreasing skewness instead
    /// of the declared column order.
    pub fn with_skewness_ordering(mut self, order_by_skewness: bool) -> Self {
        self.order_by_skewness = order_by_skewness;
        self
    }

    pub fn with_max_split_depth(mut self, max_split_depth: usize) -> Self {
        self.max_split_depth = max_split_depth;
        self
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn row_group_size(&self) -> usize {
        self.row_group_size
    }

    pub fn compression(&self) -> Compression {
        self.compression
    }

    pub fn file_extension(&self) -> &str {
        &self.file_extension
    }

    pub fn add_partition_id(&self) -> bool {
        self.add_partition_id
    }

    pub fn order_by_skewness(&self) -> bool {
        self.order_by_skewness
    }

    pub fn max_split_depth(&self) -> usize {
        self.max_split_depth
    }

    /// File name for a numbered file, e.g. `3.parquet` or `b3.parquet` with a prefix.
    pub fn file_name(&self, prefix: &str, id: impl std::fmt::Display) -> String {
        format!("{prefix}{id}.{}", self.file_extension)
    }

    /// File name of the final partition with the given id.
    pub fn partition_file_name(&self, id: impl std::fmt::Display) -> String {
        self.file_name("", id)
    }

    pub fn writer_properties(&self) -> WriterProperties {
        WriterProperties::builder()
            .set_writer_version(WriterVersion::PARQUET_2_0)
            .set_compression(self.compression)
            .set_max_row_group_size(self.row_group_size)
            .set_created_by(CREATED_BY.to_string())
            .build()
    }
}
