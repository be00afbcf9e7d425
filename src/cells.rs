//! Discrete cell (agent) data.

use log::{log, Level};

use crate::error::{McdsError, Result};
use crate::manifest::{LabelSpec, Manifest};
use crate::matfile::Matrix;
use crate::mesh::load_matrix;
use crate::table::Table;

/// Per-agent values, one column per expanded label.
pub type CellTable = Table;

/// Three-component labels that expand to `_x`, `_y`, `_z` columns. Every
/// other multi-component label gets numeric suffixes.
pub const SPATIAL_LABELS: [&str; 5] = [
    "position",
    "orientation",
    "velocity",
    "migration_bias_direction",
    "motility_vector",
];

/// Column names produced by one label.
pub fn expand_label(name: &str, size: usize) -> Vec<String> {
    match size {
        1 => vec![name.to_string()],
        3 if SPATIAL_LABELS.contains(&name) => {
            ["x", "y", "z"].iter().map(|axis| format!("{}_{}", name, axis)).collect()
        }
        _ => (0..size).map(|i| format!("{}_{}", name, i)).collect(),
    }
}

/// `(column, unit)` pairs for all labels, in payload row order.
pub fn expand_labels(labels: &[LabelSpec]) -> Vec<(String, String)> {
    labels
        .iter()
        .flat_map(|label| {
            expand_label(&label.name, label.size)
                .into_iter()
                .map(move |column| (column, label.units.clone()))
        })
        .collect()
}

/// Builds the cell table from the `cells` matrix; `None` means the payload
/// held no matrix at all.
pub fn from_matrix(labels: &[LabelSpec], matrix: Option<&Matrix>) -> Result<CellTable> {
    let columns = expand_labels(labels);
    let agents = match matrix {
        Some(m) if m.cols() > 0 => {
            if m.rows() != columns.len() {
                return Err(McdsError::ShapeMismatch {
                    what: "cell matrix rows",
                    expected: columns.len(),
                    found: m.rows(),
                });
            }
            m.cols()
        }
        _ => 0,
    };

    let mut table = CellTable::with_rows(agents);
    for (row, (name, unit)) in columns.into_iter().enumerate() {
        let values = match matrix {
            Some(m) if agents > 0 => m.row(row).unwrap_or_default(),
            _ => Vec::new(),
        };
        table.push_column(name, unit, values)?;
    }
    Ok(table)
}

/// Reads the cell payload of `manifest`.
pub fn load(manifest: &Manifest, verbose: bool) -> Result<CellTable> {
    let level = if verbose { Level::Info } else { Level::Debug };
    log!(level, "working on discrete cell data ...");

    let path = &manifest.payloads.cells;
    let matrix = load_matrix(path, manifest, "cells")?;
    log!(level, "reading: {}", path.display());

    let table = from_matrix(&manifest.labels, matrix.as_ref())?;
    log!(level, "{} agents with {} variables", table.len(), table.columns().len());
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn label(name: &str, size: usize, units: &str) -> LabelSpec {
        LabelSpec { name: name.into(), size, units: units.into() }
    }

    #[test]
    fn position_expands_to_xyz_with_shared_unit() {
        let labels = [label("position", 3, "microns")];
        let table = from_matrix(&labels, None).unwrap();
        assert_eq!(
            table.column_names().collect::<Vec<_>>(),
            vec!["position_x", "position_y", "position_z"]
        );
        for name in ["position_x", "position_y", "position_z"] {
            assert_eq!(table.unit(name), Some("microns"));
        }
    }

    #[test]
    fn other_vectors_get_numeric_suffixes() {
        assert_eq!(expand_label("custom_vector", 3), vec!["custom_vector_0", "custom_vector_1", "custom_vector_2"]);
        assert_eq!(expand_label("velocity", 3), vec!["velocity_x", "velocity_y", "velocity_z"]);
        // a spatial name with an unusual size is not spatial
        assert_eq!(expand_label("velocity", 2), vec!["velocity_0", "velocity_1"]);
        assert_eq!(expand_label("substrates", 150).len(), 150);
        assert_eq!(expand_label("substrates", 150)[149], "substrates_149");
    }

    #[test]
    fn rows_become_columns_in_label_order() {
        let labels = [label("ID", 1, "none"), label("position", 3, "microns"), label("cell_type", 1, "none")];
        // two agents, five rows each
        let matrix = Matrix::from_column_major(
            "cells",
            5,
            2,
            vec![7.0, 1.0, 2.0, 0.0, 0.0, 8.0, -1.0, -2.0, 0.0, 1.0],
        );
        let table = from_matrix(&labels, Some(&matrix)).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.column("ID"), Some(&[7.0, 8.0][..]));
        assert_eq!(table.column("position_y"), Some(&[2.0, -2.0][..]));
        assert_eq!(table.column("cell_type"), Some(&[0.0, 1.0][..]));
        for column in table.columns() {
            assert_eq!(column.values.len(), table.len());
        }
    }

    #[test]
    fn no_agents_keeps_declared_columns() {
        let labels = [label("ID", 1, "none"), label("position", 3, "microns")];
        let empty = Matrix::from_column_major("cells", 4, 0, Vec::new());
        for matrix in [None, Some(&empty)] {
            let table = from_matrix(&labels, matrix).unwrap();
            assert!(table.is_empty());
            assert_eq!(table.columns().len(), 4);
        }
    }

    #[test]
    fn row_count_must_match_labels() {
        let labels = [label("ID", 1, "none"), label("position", 3, "microns")];
        let matrix = Matrix::from_column_major("cells", 3, 1, vec![0.0, 1.0, 2.0]);
        let err = from_matrix(&labels, Some(&matrix)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidData);
    }
}
