pub mod config;
pub mod summary;
pub mod vecmath;

// Re-export key types for easier use by dependent crates
pub use config::{ReaderConfig, LoadConfig, OutputConfig, OUTPUT_FORMATS};
pub use summary::{SnapshotSummary, TimeSeriesRecord};
pub use vecmath::Vec3;
