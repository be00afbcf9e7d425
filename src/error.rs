//! Error types for snapshot loading and querying.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::matfile::MatError;

/// Coarse error classes callers can branch on without matching every variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A manifest or a payload file it references does not exist or cannot be opened.
    FileNotFound,
    /// Malformed XML, or a text line that does not tokenize.
    Parse,
    /// The files parse but violate a structural assumption.
    InvalidData,
    /// A derived query was asked something it cannot answer.
    Query,
}

/// Errors raised while loading or querying an MCDS snapshot.
#[derive(Debug, Error)]
pub enum McdsError {
    /// The manifest itself could not be opened.
    #[error("no such file or directory: {}", path.display())]
    ManifestNotFound {
        /// Resolved manifest path.
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A payload file named by the manifest could not be opened.
    #[error("no such file or directory: {}\nreferenced in: {}", path.display(), manifest.display())]
    PayloadNotFound {
        /// Resolved payload path.
        path: PathBuf,
        /// Manifest that referenced the payload.
        manifest: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Any other I/O failure while reading a file.
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The manifest is not well-formed MCDS XML.
    #[error("malformed manifest {}: {source}", path.display())]
    Xml {
        path: PathBuf,
        #[source]
        source: quick_xml::DeError,
    },

    /// A required manifest element is absent.
    #[error("manifest {} has no {element} element", path.display())]
    MissingElement {
        path: PathBuf,
        element: &'static str,
    },

    /// A line or field of a text payload failed to tokenize.
    #[error("{}:{line}: {message}", path.display())]
    Parse {
        path: PathBuf,
        /// 1-based line number; 0 for text taken from a manifest element.
        line: usize,
        message: String,
    },

    /// A binary payload is not a readable MATLAB level-4 file.
    #[error("bad matrix file {}: {source}", path.display())]
    Mat {
        path: PathBuf,
        #[source]
        source: MatError,
    },

    /// A binary payload lacks its well-known matrix.
    #[error("matrix '{key}' not found in {}", path.display())]
    MissingMatrix { path: PathBuf, key: &'static str },

    /// The voxel payload mixes several voxel volumes.
    #[error("mesh is not built out of a unique voxel volume: {volumes:?}")]
    NonUniformVoxels { volumes: Vec<f64> },

    /// Array sizes disagree between the manifest and a payload.
    #[error("{what}: expected {expected}, found {found}")]
    ShapeMismatch {
        what: &'static str,
        expected: usize,
        found: usize,
    },

    /// A payload voxel centre is not a node of the manifest mesh.
    #[error("voxel {voxel} centre ({x}, {y}, {z}) does not lie on the mesh")]
    VoxelOffMesh { voxel: usize, x: f64, y: f64, z: f64 },

    /// A halted bounds check.
    #[error("{axis} = {value} out of bounds: {axis}-range is ({}, {})", range.0, range.1)]
    OutOfMesh {
        axis: char,
        value: f64,
        range: (f64, f64),
    },

    /// A z slice that is not a mesh centre, with halting requested.
    #[error("z_slice {z} is not an element of the z-axis mesh centers {axis:?}")]
    NotAMeshCenter { z: f64, axis: Vec<f64> },

    #[error("unknown substrate '{0}'")]
    UnknownSubstrate(String),

    #[error("cell table has no '{0}' column")]
    MissingColumn(String),
}

impl McdsError {
    /// The error class of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            McdsError::ManifestNotFound { .. }
            | McdsError::PayloadNotFound { .. }
            | McdsError::Io { .. } => ErrorKind::FileNotFound,
            McdsError::Xml { .. }
            | McdsError::MissingElement { .. }
            | McdsError::Parse { .. } => ErrorKind::Parse,
            McdsError::Mat { .. }
            | McdsError::MissingMatrix { .. }
            | McdsError::NonUniformVoxels { .. }
            | McdsError::ShapeMismatch { .. }
            | McdsError::VoxelOffMesh { .. } => ErrorKind::InvalidData,
            McdsError::OutOfMesh { .. }
            | McdsError::NotAMeshCenter { .. }
            | McdsError::UnknownSubstrate(_)
            | McdsError::MissingColumn(_) => ErrorKind::Query,
        }
    }
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, McdsError>;

/// Reads a payload file referenced by `manifest`, mapping a missing file to
/// [`McdsError::PayloadNotFound`].
pub(crate) fn read_payload(path: &std::path::Path, manifest: &std::path::Path) -> Result<Vec<u8>> {
    std::fs::read(path).map_err(|source| {
        if source.kind() == io::ErrorKind::NotFound {
            McdsError::PayloadNotFound {
                path: path.to_path_buf(),
                manifest: manifest.to_path_buf(),
                source,
            }
        } else {
            McdsError::Io { path: path.to_path_buf(), source }
        }
    })
}
