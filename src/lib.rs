//! Reader for PhysiCell MultiCellDS (MCDS) output snapshots.
//!
//! A snapshot is an XML manifest plus the binary and text payloads it names.
//! [`Snapshot::load`] reads all of them into memory and answers spatial
//! queries over the mesh, the substrate fields and the cell table.

pub mod cells;
pub mod error;
pub mod export;
pub mod field;
pub mod graph;
pub mod grid;
pub mod manifest;
pub mod matfile;
pub mod mesh;
pub mod series;
pub mod snapshot;
pub mod table;

pub use cells::CellTable;
pub use error::{ErrorKind, McdsError, Result};
pub use field::{Field, SubstrateParameters};
pub use graph::{CellGraph, Graphs};
pub use grid::Grid3;
pub use manifest::Manifest;
pub use mesh::Mesh;
pub use snapshot::{IdReport, LoadOptions, Snapshot};
pub use table::{Column, Table};

pub use mcds_common::Vec3;
