//! Computational mesh of a snapshot: axes, meshgrid, bounding box and voxels.

use log::warn;
use mcds_common::Vec3;
use serde::{Deserialize, Serialize};

use crate::error::{McdsError, Result};
use crate::grid::Grid3;
use crate::manifest::{DelimitedText, Manifest};
use crate::matfile::{MatFile, Matrix};

const AXIS_NAMES: [char; 3] = ['x', 'y', 'z'];

/// The uniform Cartesian voxel mesh of one snapshot.
///
/// Axis order is m (x), n (y), p (z). Grid-shaped data uses the `xy`
/// meshgrid convention: shape `(len n, len m, len p)`, indexed `[j, i, k]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mesh {
    units: String,
    mnp_axis: [Vec<f64>; 3],
    mnp_grid: [Grid3; 3],
    xyz_range: [(f64, f64); 3],
    voxel_coordinates: [Vec<f64>; 3],
    volumes: Vec<f64>,
    voxel_volume: f64,
}

/// Sorted, de-duplicated copy of an axis.
fn unique_sorted(values: &[f64]) -> Vec<f64> {
    let mut axis = values.to_vec();
    axis.sort_by(|a, b| a.total_cmp(b));
    axis.dedup();
    axis
}

impl Mesh {
    /// Builds the mesh from parsed axis values, the bounding box
    /// `(xmin, ymin, zmin, xmax, ymax, zmax)` and the voxel matrix
    /// (rows 0..3 voxel centres, row 3 voxel volumes).
    pub fn from_parts(
        units: &str,
        axes: [&[f64]; 3],
        bounding_box: [f64; 6],
        voxels: &Matrix,
    ) -> Result<Self> {
        if voxels.rows() < 4 {
            return Err(McdsError::ShapeMismatch {
                what: "voxel matrix rows",
                expected: 4,
                found: voxels.rows(),
            });
        }

        let mnp_axis = axes.map(unique_sorted);
        if let Some(axis) = mnp_axis.iter().position(Vec::is_empty) {
            return Err(McdsError::ShapeMismatch {
                what: ["m axis length", "n axis length", "p axis length"][axis],
                expected: 1,
                found: 0,
            });
        }

        let shape = [mnp_axis[1].len(), mnp_axis[0].len(), mnp_axis[2].len()];
        let mnp_grid = [
            Grid3::from_fn(shape, |_, i, _| mnp_axis[0][i]),
            Grid3::from_fn(shape, |j, _, _| mnp_axis[1][j]),
            Grid3::from_fn(shape, |_, _, k| mnp_axis[2][k]),
        ];

        let xyz_range = [
            (bounding_box[0], bounding_box[3]),
            (bounding_box[1], bounding_box[4]),
            (bounding_box[2], bounding_box[5]),
        ];

        let row = |r: usize| voxels.row(r).unwrap_or_default();
        let voxel_coordinates = [row(0), row(1), row(2)];
        let volumes = row(3);

        let distinct = unique_sorted(&volumes);
        if distinct.len() != 1 {
            return Err(McdsError::NonUniformVoxels { volumes: distinct });
        }
        let voxel_volume = distinct[0];

        Ok(Mesh {
            units: units.to_string(),
            mnp_axis,
            mnp_grid,
            xyz_range,
            voxel_coordinates,
            volumes,
            voxel_volume,
        })
    }

    /// Spatial unit of all coordinates.
    pub fn units(&self) -> &str {
        &self.units
    }

    /// Unique ascending mesh-centre coordinates per axis.
    pub fn mnp_axis(&self) -> &[Vec<f64>; 3] {
        &self.mnp_axis
    }

    /// `(min, max)` mesh-centre coordinate per axis.
    pub fn mnp_range(&self) -> [(f64, f64); 3] {
        self.mnp_axis.each_ref().map(|a| (a[0], a[a.len() - 1]))
    }

    /// Inclusive voxel index range per axis.
    pub fn ijk_range(&self) -> [(usize, usize); 3] {
        self.mnp_axis.each_ref().map(|a| (0, a.len() - 1))
    }

    /// Voxel indices per axis.
    pub fn ijk_axis(&self) -> [Vec<usize>; 3] {
        self.mnp_axis.each_ref().map(|a| (0..a.len()).collect())
    }

    /// Bounding box as `(min, max)` per axis.
    pub fn xyz_range(&self) -> [(f64, f64); 3] {
        self.xyz_range
    }

    /// `(len n, len m, len p)`; every field grid has this shape.
    pub fn grid_shape(&self) -> [usize; 3] {
        self.mnp_grid[0].shape()
    }

    pub fn voxel_count(&self) -> usize {
        self.mnp_grid[0].len()
    }

    /// The m, n and p meshgrids of voxel-centre coordinates.
    pub fn meshgrid(&self) -> &[Grid3; 3] {
        &self.mnp_grid
    }

    /// The m and n meshgrids of the first p layer.
    pub fn meshgrid_2d(&self) -> [Grid3; 2] {
        // every axis has at least one centre, so layer 0 exists
        let plane = |g: &Grid3| g.layer(0).unwrap_or_else(|| Grid3::filled([0, 0, 1], 0.0));
        [plane(&self.mnp_grid[0]), plane(&self.mnp_grid[1])]
    }

    /// Per-voxel centre coordinates from the voxel payload, x, y, z rows.
    pub fn voxel_coordinates(&self) -> &[Vec<f64>; 3] {
        &self.voxel_coordinates
    }

    /// Per-voxel volumes from the voxel payload.
    pub fn volumes(&self) -> &[f64] {
        &self.volumes
    }

    /// The single volume shared by all voxels.
    pub fn voxel_volume(&self) -> f64 {
        self.voxel_volume
    }

    /// Distance between neighbouring mesh centres per axis. An axis with a
    /// single centre (the p axis of a 2D run) has spacing 1.
    pub fn mesh_spacing(&self) -> [f64; 3] {
        self.mnp_axis.each_ref().map(|a| {
            if a.len() > 1 {
                (a[a.len() - 1] - a[0]) / (a.len() - 1) as f64
            } else {
                1.0
            }
        })
    }

    /// Voxel width, height and depth. Depth is back-solved from the voxel
    /// volume, so 2D meshes report their nominal slab thickness.
    pub fn voxel_spacing(&self) -> [f64; 3] {
        let [dm, dn, _] = self.mesh_spacing();
        [dm, dn, self.voxel_volume / (dm * dn)]
    }

    /// Inclusive bounding-box test. Out-of-mesh points log a warning; with
    /// `halt` they are an error instead of `Ok(false)`.
    pub fn is_in_mesh(&self, point: Vec3, halt: bool) -> Result<bool> {
        for (axis, value) in point.to_array().into_iter().enumerate() {
            let (lo, hi) = self.xyz_range[axis];
            if value < lo || value > hi || value.is_nan() {
                warn!(
                    "{} = {} out of bounds: {}-range is ({}, {}).",
                    AXIS_NAMES[axis], value, AXIS_NAMES[axis], lo, hi
                );
                if halt {
                    return Err(McdsError::OutOfMesh {
                        axis: AXIS_NAMES[axis],
                        value,
                        range: (lo, hi),
                    });
                }
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Voxel `[i, j, k]` containing `point`, rounded to the nearest centre
    /// and clamped into the index range. With `check_in_mesh`, points outside
    /// the bounding box give `None`.
    pub fn voxel_ijk(&self, point: Vec3, check_in_mesh: bool) -> Option<[usize; 3]> {
        if check_in_mesh && !self.is_in_mesh(point, false).unwrap_or(false) {
            return None;
        }
        let spacing = self.voxel_spacing();
        Some(self.round_to_index(point, spacing))
    }

    /// The meshgrid centre of voxel `[i, j, k]`.
    pub fn voxel_center(&self, ijk: [usize; 3]) -> Option<Vec3> {
        let [i, j, k] = ijk;
        Some(Vec3::new(
            *self.mnp_axis[0].get(i)?,
            *self.mnp_axis[1].get(j)?,
            *self.mnp_axis[2].get(k)?,
        ))
    }

    /// Grid index of a voxel centre taken from a payload, or `None` when the
    /// centre is not within a quarter spacing of a mesh node.
    pub(crate) fn index_of_center(&self, center: Vec3) -> Option<[usize; 3]> {
        let spacing = self.mesh_spacing();
        let ijk = self.round_to_index(center, spacing);
        let coords = center.to_array();
        for axis in 0..3 {
            let node = self.mnp_axis[axis][ijk[axis]];
            if (node - coords[axis]).abs() > 0.25 * spacing[axis].abs() {
                return None;
            }
        }
        Some(ijk)
    }

    fn round_to_index(&self, point: Vec3, spacing: [f64; 3]) -> [usize; 3] {
        let coords = point.to_array();
        let mut ijk = [0usize; 3];
        for axis in 0..3 {
            let axis_values = &self.mnp_axis[axis];
            let steps = ((coords[axis] - axis_values[0]) / spacing[axis]).round_ties_even();
            let max = (axis_values.len() - 1) as f64;
            ijk[axis] = if steps.is_nan() { 0.0 } else { steps.clamp(0.0, max) } as usize;
        }
        ijk
    }
}

fn parse_text(manifest: &Manifest, what: &str, text: &DelimitedText) -> Result<Vec<f64>> {
    text.parse_values().map_err(|message| McdsError::Parse {
        path: manifest.path.clone(),
        line: 0,
        message: format!("{}: {}", what, message),
    })
}

/// Reads a payload and extracts its well-known matrix.
pub(crate) fn load_matrix(
    path: &std::path::Path,
    manifest: &Manifest,
    key: &'static str,
) -> Result<Option<Matrix>> {
    let bytes = crate::error::read_payload(path, &manifest.path)?;
    let mut file = MatFile::parse(&bytes)
        .map_err(|source| McdsError::Mat { path: path.to_path_buf(), source })?;
    if file.is_empty() {
        return Ok(None);
    }
    file.take(key)
        .map(Some)
        .ok_or_else(|| McdsError::MissingMatrix { path: path.to_path_buf(), key })
}

/// Builds the mesh of `manifest`, reading its voxel payload.
pub fn load(manifest: &Manifest) -> Result<Mesh> {
    let text = &manifest.mesh;
    let x = parse_text(manifest, "x_coordinates", &text.x_coordinates)?;
    let y = parse_text(manifest, "y_coordinates", &text.y_coordinates)?;
    let z = parse_text(manifest, "z_coordinates", &text.z_coordinates)?;
    let bbox = parse_text(manifest, "bounding_box", &text.bounding_box)?;
    let bounding_box: [f64; 6] = bbox.as_slice().try_into().map_err(|_| McdsError::Parse {
        path: manifest.path.clone(),
        line: 0,
        message: format!("bounding_box: expected 6 values, found {}", bbox.len()),
    })?;

    let voxels = load_matrix(&manifest.payloads.voxels, manifest, "mesh")?.ok_or_else(|| {
        McdsError::MissingMatrix { path: manifest.payloads.voxels.clone(), key: "mesh" }
    })?;

    Mesh::from_parts(
        &manifest.metadata.spatial_units,
        [&x, &y, &z],
        bounding_box,
        &voxels,
    )
}
