//! Substrate concentration fields of the microenvironment.

use std::collections::BTreeMap;

use log::{debug, log, Level};
use mcds_common::Vec3;
use serde::{Deserialize, Serialize};

use crate::error::{McdsError, Result};
use crate::grid::Grid3;
use crate::manifest::{Manifest, Quantity};
use crate::matfile::Matrix;
use crate::mesh::{load_matrix, Mesh};

/// Rows of the microenvironment matrix before the first substrate row:
/// voxel centre x, y, z and voxel volume.
const HEADER_ROWS: usize = 4;

/// One substrate's concentration field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub units: String,
    /// Concentrations shaped like the mesh grid, indexed `[j, i, k]`.
    pub data: Grid3,
    pub diffusion_coefficient: Quantity,
    pub decay_rate: Quantity,
}

/// Transport parameters of one substrate, as listed by
/// [`Snapshot::substrate_parameters`](crate::Snapshot::substrate_parameters).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubstrateParameters {
    pub substrate: String,
    pub decay_rate: f64,
    pub diffusion_coefficient: f64,
}

/// Spreads the microenvironment matrix onto the mesh grid, one field per
/// declared variable.
///
/// Each payload column is placed by its own voxel centre rather than by
/// column order, since the payload does not promise a reshape-compatible
/// voxel order.
pub fn from_matrix(manifest: &Manifest, mesh: &Mesh, matrix: &Matrix) -> Result<BTreeMap<String, Field>> {
    let substrates = manifest.variables.len();
    if matrix.rows() < HEADER_ROWS + substrates {
        return Err(McdsError::ShapeMismatch {
            what: "microenvironment matrix rows",
            expected: HEADER_ROWS + substrates,
            found: matrix.rows(),
        });
    }
    if matrix.cols() != mesh.voxel_count() {
        return Err(McdsError::ShapeMismatch {
            what: "microenvironment voxel columns",
            expected: mesh.voxel_count(),
            found: matrix.cols(),
        });
    }

    let shape = mesh.grid_shape();
    let mut grids: Vec<Grid3> = (0..substrates).map(|_| Grid3::filled(shape, 0.0)).collect();

    for voxel in 0..matrix.cols() {
        let column = matrix.column(voxel).unwrap_or_default();
        let center = Vec3::new(column[0], column[1], column[2]);
        let [i, j, k] = mesh.index_of_center(center).ok_or_else(|| McdsError::VoxelOffMesh {
            voxel,
            x: center.x,
            y: center.y,
            z: center.z,
        })?;
        for (s, grid) in grids.iter_mut().enumerate() {
            grid.set(j, i, k, column[HEADER_ROWS + s]);
        }
    }

    Ok(manifest
        .variables
        .iter()
        .zip(grids)
        .map(|(var, data)| {
            debug!("parsing: {} data", var.name);
            let field = Field {
                name: var.name.clone(),
                units: var.units.clone(),
                data,
                diffusion_coefficient: var.diffusion_coefficient.clone(),
                decay_rate: var.decay_rate.clone(),
            };
            (var.name.clone(), field)
        })
        .collect())
}

/// Reads the microenvironment payload of `manifest` onto `mesh`.
pub fn load(manifest: &Manifest, mesh: &Mesh, verbose: bool) -> Result<BTreeMap<String, Field>> {
    let level = if verbose { Level::Info } else { Level::Debug };
    log!(level, "working on microenvironment data ...");

    let path = &manifest.payloads.microenvironment;
    let matrix = load_matrix(path, manifest, "multiscale_microenvironment")?.ok_or_else(|| {
        McdsError::MissingMatrix { path: path.clone(), key: "multiscale_microenvironment" }
    })?;
    log!(level, "reading: {}", path.display());

    from_matrix(manifest, mesh, &matrix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::manifest::{DelimitedText, MeshSpec, Metadata, PayloadPaths, VariableSpec};
    use crate::mesh::tests::planar_mesh;
    use std::path::PathBuf;

    fn manifest_with(variables: &[&str]) -> Manifest {
        let text = |t: &str| DelimitedText { text: t.to_string(), delimiter: None };
        Manifest {
            path: PathBuf::from("output00000000.xml"),
            output_dir: PathBuf::from("."),
            metadata: Metadata {
                multicellds_version: "MultiCellDS_2".into(),
                physicell_version: "PhysiCell_1.10.4".into(),
                created: String::new(),
                current_time: 0.0,
                time_units: "min".into(),
                current_runtime: 0.0,
                runtime_units: "sec".into(),
                spatial_units: "micron".into(),
            },
            mesh: MeshSpec {
                x_coordinates: text("-20 0 20"),
                y_coordinates: text("-10 10"),
                z_coordinates: text("0"),
                bounding_box: text("-30 -20 -10 30 20 10"),
            },
            variables: variables
                .iter()
                .map(|name| VariableSpec {
                    name: name.to_string(),
                    units: "mmHg".into(),
                    diffusion_coefficient: Quantity { value: 1000.0, units: "micron^2/min".into() },
                    decay_rate: Quantity { value: 0.1, units: "1/min".into() },
                })
                .collect(),
            labels: Vec::new(),
            payloads: PayloadPaths {
                voxels: PathBuf::from("initial_mesh0.mat"),
                microenvironment: PathBuf::from("output00000000_microenvironment0.mat"),
                cells: PathBuf::from("output00000000_cells.mat"),
                neighbor_graph: None,
                attached_graph: None,
            },
        }
    }

    /// Columns in reverse voxel order so a plain reshape would misplace them.
    fn reversed_payload(mesh: &Mesh, substrates: usize, value: impl Fn(usize, f64, f64) -> f64) -> Matrix {
        let rows = HEADER_ROWS + substrates;
        let [xs, ys, _] = mesh.voxel_coordinates();
        let mut data = Vec::new();
        for v in (0..xs.len()).rev() {
            data.extend_from_slice(&[xs[v], ys[v], 0.0, 8000.0]);
            for s in 0..substrates {
                data.push(value(s, xs[v], ys[v]));
            }
        }
        Matrix::from_column_major("multiscale_microenvironment", rows, xs.len(), data)
    }

    #[test]
    fn values_land_on_their_voxel_regardless_of_column_order() {
        let mesh = planar_mesh();
        let manifest = manifest_with(&["oxygen", "glucose"]);
        let payload = reversed_payload(&mesh, 2, |s, x, y| (s as f64) * 1000.0 + x * 10.0 + y);
        let fields = from_matrix(&manifest, &mesh, &payload).unwrap();

        let oxygen = &fields["oxygen"];
        assert_eq!(oxygen.data.shape(), mesh.grid_shape());
        // [j, i, k]: j = 1 is y = 10, i = 0 is x = -20
        assert_eq!(oxygen.data.get(1, 0, 0), Some(-200.0 + 10.0));
        assert_eq!(fields["glucose"].data.get(0, 2, 0), Some(1000.0 + 200.0 - 10.0));
        assert_eq!(oxygen.units, "mmHg");
        assert_eq!(oxygen.decay_rate.value, 0.1);
    }

    #[test]
    fn every_field_matches_the_mesh_shape() {
        let mesh = planar_mesh();
        let manifest = manifest_with(&["a", "b", "c"]);
        let fields = from_matrix(&manifest, &mesh, &reversed_payload(&mesh, 3, |_, _, _| 1.0)).unwrap();
        assert_eq!(fields.len(), 3);
        for field in fields.values() {
            assert_eq!(field.data.shape(), mesh.grid_shape());
        }
    }

    #[test]
    fn too_few_substrate_rows_is_invalid() {
        let mesh = planar_mesh();
        let manifest = manifest_with(&["oxygen", "glucose"]);
        let err = from_matrix(&manifest, &mesh, &reversed_payload(&mesh, 1, |_, _, _| 0.0)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidData);
    }

    #[test]
    fn voxel_off_the_mesh_is_invalid() {
        let mesh = planar_mesh();
        let manifest = manifest_with(&["oxygen"]);
        let mut data = Vec::new();
        for v in 0..mesh.voxel_count() {
            let x = if v == 4 { 7.0 } else { mesh.voxel_coordinates()[0][v] };
            data.extend_from_slice(&[x, mesh.voxel_coordinates()[1][v], 0.0, 8000.0, 1.0]);
        }
        let payload = Matrix::from_column_major("multiscale_microenvironment", 5, mesh.voxel_count(), data);
        let err = from_matrix(&manifest, &mesh, &payload).unwrap_err();
        assert!(matches!(err, McdsError::VoxelOffMesh { voxel: 4, .. }), "got {:?}", err);
    }
}
