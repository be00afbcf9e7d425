//! One loaded MCDS time step and the queries derived from it.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::time::Instant;

use log::{log, warn, Level};
use mcds_common::{LoadConfig, SnapshotSummary, Vec3};
use serde::{Deserialize, Serialize};

use crate::cells::{self, CellTable};
use crate::error::{McdsError, Result};
use crate::field::{self, Field, SubstrateParameters};
use crate::graph::{self, CellGraph, Graphs};
use crate::grid::Grid3;
use crate::manifest::{Manifest, Metadata};
use crate::mesh::{self, Mesh};
use crate::table::Table;

/// What to load and where from.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadOptions {
    /// Directory of the payload files; defaults to the manifest's directory.
    pub output_dir: Option<PathBuf>,
    /// Load substrate fields.
    pub microenv: bool,
    /// Load the neighbour and attached-cells graphs.
    pub graph: bool,
    /// Report progress at info level instead of debug.
    pub verbose: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        LoadOptions { output_dir: None, microenv: true, graph: true, verbose: true }
    }
}

impl From<&LoadConfig> for LoadOptions {
    fn from(config: &LoadConfig) -> Self {
        LoadOptions {
            output_dir: config.output_dir.clone(),
            microenv: config.microenv,
            graph: config.graph,
            verbose: config.verbose,
        }
    }
}

/// Result of [`Snapshot::validate_ids`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IdReport {
    /// IDs that occur on more than one agent.
    pub duplicate_ids: Vec<i64>,
    /// Graph keys or targets that are not the ID of any agent.
    pub unknown_graph_ids: Vec<i64>,
}

impl IdReport {
    pub fn is_clean(&self) -> bool {
        self.duplicate_ids.is_empty() && self.unknown_graph_ids.is_empty()
    }
}

/// A fully loaded, read-only MCDS snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    manifest: PathBuf,
    metadata: Metadata,
    mesh: Mesh,
    fields: BTreeMap<String, Field>,
    cells: CellTable,
    graphs: Option<Graphs>,
}

impl Snapshot {
    /// Loads the snapshot described by `manifest`. Either every requested
    /// part loads or an error is returned.
    pub fn load(manifest: impl AsRef<Path>, options: &LoadOptions) -> Result<Self> {
        let manifest = Manifest::load(manifest.as_ref(), options.output_dir.as_deref())?;
        Self::from_manifest(manifest, options)
    }

    /// Loads the payloads of an already parsed manifest.
    pub fn from_manifest(manifest: Manifest, options: &LoadOptions) -> Result<Self> {
        let level = if options.verbose { Level::Info } else { Level::Debug };
        let start = Instant::now();
        log!(level, "reading: {}", manifest.path.display());

        log!(level, "working on mesh data ...");
        let mesh = mesh::load(&manifest)?;
        log!(level, "reading: {}", manifest.payloads.voxels.display());

        // the mesh is the only shared dependency; everything else is independent
        let (fields, (cells, graphs)) = rayon::join(
            || {
                if options.microenv {
                    field::load(&manifest, &mesh, options.verbose)
                } else {
                    Ok(BTreeMap::new())
                }
            },
            || {
                rayon::join(
                    || cells::load(&manifest, options.verbose),
                    || {
                        if options.graph {
                            graph::load(&manifest, options.verbose).map(Some)
                        } else {
                            Ok(None)
                        }
                    },
                )
            },
        );

        let snapshot = Snapshot {
            manifest: manifest.path,
            metadata: manifest.metadata,
            mesh,
            fields: fields?,
            cells: cells?,
            graphs: graphs?,
        };
        log!(level, "done ({:.3} s)", start.elapsed().as_secs_f64());
        Ok(snapshot)
    }

    /// Resolved path of the manifest this snapshot was read from.
    pub fn manifest(&self) -> &Path {
        &self.manifest
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn multicellds_version(&self) -> &str {
        &self.metadata.multicellds_version
    }

    pub fn physicell_version(&self) -> &str {
        &self.metadata.physicell_version
    }

    pub fn timestamp(&self) -> &str {
        &self.metadata.created
    }

    /// Simulated time and its unit.
    pub fn time(&self) -> (f64, &str) {
        (self.metadata.current_time, &self.metadata.time_units)
    }

    /// Wall-clock runtime and its unit.
    pub fn runtime(&self) -> (f64, &str) {
        (self.metadata.current_runtime, &self.metadata.runtime_units)
    }

    pub fn spatial_units(&self) -> &str {
        &self.metadata.spatial_units
    }

    pub fn mesh(&self) -> &Mesh {
        &self.mesh
    }

    pub fn fields(&self) -> &BTreeMap<String, Field> {
        &self.fields
    }

    pub fn cells(&self) -> &CellTable {
        &self.cells
    }

    pub fn graphs(&self) -> Option<&Graphs> {
        self.graphs.as_ref()
    }

    pub fn neighbor_graph(&self) -> Option<&CellGraph> {
        self.graphs.as_ref().map(|g| &g.neighbor_cells)
    }

    pub fn attached_graph(&self) -> Option<&CellGraph> {
        self.graphs.as_ref().map(|g| &g.attached_cells)
    }

    // --- mesh queries ---

    pub fn mesh_spacing(&self) -> [f64; 3] {
        self.mesh.mesh_spacing()
    }

    pub fn voxel_spacing(&self) -> [f64; 3] {
        self.mesh.voxel_spacing()
    }

    pub fn is_in_mesh(&self, point: Vec3, halt: bool) -> Result<bool> {
        self.mesh.is_in_mesh(point, halt)
    }

    pub fn voxel_ijk(&self, point: Vec3, check_in_mesh: bool) -> Option<[usize; 3]> {
        self.mesh.voxel_ijk(point, check_in_mesh)
    }

    // --- substrate queries ---

    /// Substrate names in alphabetical order.
    pub fn substrate_names(&self) -> Vec<String> {
        self.fields.keys().cloned().collect()
    }

    pub fn field(&self, substrate: &str) -> Result<&Field> {
        self.fields
            .get(substrate)
            .ok_or_else(|| McdsError::UnknownSubstrate(substrate.to_string()))
    }

    /// Decay rate and diffusion coefficient of every substrate, by name.
    pub fn substrate_parameters(&self) -> Vec<SubstrateParameters> {
        self.fields
            .values()
            .map(|f| SubstrateParameters {
                substrate: f.name.clone(),
                decay_rate: f.decay_rate.value,
                diffusion_coefficient: f.diffusion_coefficient.value,
            })
            .collect()
    }

    /// Concentration of `substrate` in the voxel containing `point`.
    /// `Ok(None)` when the point lies outside the mesh.
    pub fn concentration_at(&self, point: Vec3, substrate: &str) -> Result<Option<f64>> {
        let field = self.field(substrate)?;
        if !self.mesh.is_in_mesh(point, false)? {
            return Ok(None);
        }
        Ok(self
            .mesh
            .voxel_ijk(point, false)
            .and_then(|[i, j, k]| field.data.get(j, i, k)))
    }

    /// Every substrate's concentration at `point`, or `None` outside the mesh.
    pub fn concentrations_at(&self, point: Vec3) -> Result<Option<BTreeMap<String, f64>>> {
        if !self.mesh.is_in_mesh(point, false)? {
            return Ok(None);
        }
        let Some([i, j, k]) = self.mesh.voxel_ijk(point, false) else {
            return Ok(None);
        };
        Ok(Some(
            self.fields
                .iter()
                .filter_map(|(name, f)| f.data.get(j, i, k).map(|v| (name.clone(), v)))
                .collect(),
        ))
    }

    /// Layer index of `z`. A value that is not a mesh centre snaps to the
    /// nearest centre (the smaller one on a tie) unless `halt` is set.
    fn z_layer(&self, z: f64, halt: bool) -> Result<usize> {
        let axis = &self.mesh.mnp_axis()[2];
        if let Some(k) = axis.iter().position(|&p| p == z) {
            return Ok(k);
        }
        warn!("z_slice {} is not an element of the z-axis mesh centers {:?}.", z, axis);
        if halt {
            return Err(McdsError::NotAMeshCenter { z, axis: axis.clone() });
        }
        let mut best = 0;
        for (k, p) in axis.iter().enumerate() {
            if (p - z).abs() < (axis[best] - z).abs() {
                best = k;
            }
        }
        warn!("z_slice set to {}.", axis[best]);
        Ok(best)
    }

    /// The concentration grid of `substrate`, or a single xy layer of it.
    pub fn concentration(&self, substrate: &str, z_slice: Option<f64>, halt: bool) -> Result<Grid3> {
        let field = self.field(substrate)?;
        match z_slice {
            None => Ok(field.data.clone()),
            Some(z) => {
                let k = self.z_layer(z, halt)?;
                field.data.layer(k).ok_or_else(|| McdsError::NotAMeshCenter {
                    z,
                    axis: self.mesh.mnp_axis()[2].clone(),
                })
            }
        }
    }

    /// One row per voxel: voxel indices, mesh centre and every substrate
    /// concentration. With `z_slice`, only the voxels of that layer.
    pub fn concentration_table(&self, z_slice: Option<f64>, halt: bool) -> Result<Table> {
        let layer = z_slice.map(|z| self.z_layer(z, halt)).transpose()?;
        let [m, n, p] = self.mesh.meshgrid();
        let voxels: Vec<[usize; 3]> = m
            .indexed_iter()
            .map(|(jik, _)| jik)
            .filter(|&[_, _, k]| layer.map_or(true, |l| l == k))
            .collect();

        let units = self.spatial_units();
        let mut table = Table::with_rows(voxels.len());
        let pick = |f: &dyn Fn(usize, usize, usize) -> f64| -> Vec<f64> {
            voxels.iter().map(|&[j, i, k]| f(j, i, k)).collect()
        };
        table.push_column("voxel_i", "none", pick(&|_, i, _| i as f64))?;
        table.push_column("voxel_j", "none", pick(&|j, _, _| j as f64))?;
        table.push_column("voxel_k", "none", pick(&|_, _, k| k as f64))?;
        table.push_column("mesh_center_m", units, pick(&|j, i, k| m.get(j, i, k).unwrap_or(f64::NAN)))?;
        table.push_column("mesh_center_n", units, pick(&|j, i, k| n.get(j, i, k).unwrap_or(f64::NAN)))?;
        table.push_column("mesh_center_p", units, pick(&|j, i, k| p.get(j, i, k).unwrap_or(f64::NAN)))?;
        for (name, f) in &self.fields {
            table.push_column(
                name.as_str(),
                f.units.as_str(),
                pick(&|j, i, k| f.data.get(j, i, k).unwrap_or(f64::NAN)),
            )?;
        }
        Ok(table)
    }

    // --- cell queries ---

    /// Cell column names in alphabetical order.
    pub fn cell_variables(&self) -> Vec<String> {
        let mut names: Vec<String> = self.cells.column_names().map(str::to_string).collect();
        names.sort();
        names
    }

    fn positions(&self) -> Result<[&[f64]; 3]> {
        Ok([
            self.cells.require("position_x")?,
            self.cells.require("position_y")?,
            self.cells.require("position_z")?,
        ])
    }

    /// The agents inside the voxel that contains `point`, both voxel faces
    /// included. `Ok(None)` when the point lies outside the mesh.
    pub fn cell_table_at_voxel(&self, point: Vec3) -> Result<Option<CellTable>> {
        if !self.mesh.is_in_mesh(point, false)? {
            return Ok(None);
        }
        let Some(center) = self.mesh.voxel_ijk(point, false).and_then(|ijk| self.mesh.voxel_center(ijk)) else {
            return Ok(None);
        };
        let center = center.to_array();
        let half = self.voxel_spacing().map(|d| d / 2.0);
        let positions = self.positions()?;

        let mask: Vec<bool> = (0..self.cells.len())
            .map(|r| (0..3).all(|a| (positions[a][r] - center[a]).abs() <= half[a]))
            .collect();
        Ok(Some(self.cells.filter(&mask)))
    }

    /// The cell table joined with each agent's voxel, local cell density
    /// and, when substrates are loaded, the voxel's concentrations and the
    /// substrate transport parameters. Columns are sorted by name, `ID` first.
    pub fn cell_table_with_voxels(&self) -> Result<CellTable> {
        let positions = self.positions()?;
        let agents = self.cells.len();
        let voxels: Vec<[usize; 3]> = (0..agents)
            .map(|r| {
                let point = Vec3::new(positions[0][r], positions[1][r], positions[2][r]);
                self.mesh.voxel_ijk(point, false).unwrap_or([0, 0, 0])
            })
            .collect();

        let mut counts: BTreeMap<[usize; 3], usize> = BTreeMap::new();
        for ijk in &voxels {
            *counts.entry(*ijk).or_default() += 1;
        }

        let units = self.spatial_units();
        let volume = self.mesh.voxel_volume();
        let mut table = self.cells.clone();
        for (axis, name) in ["voxel_i", "voxel_j", "voxel_k"].into_iter().enumerate() {
            table.push_column(name, "none", voxels.iter().map(|v| v[axis] as f64).collect())?;
        }
        let count: Vec<f64> = voxels.iter().map(|v| counts[v] as f64).collect();
        let density: Vec<f64> = count.iter().map(|c| c / volume).collect();
        table.push_column("cell_count_voxel", "none", count)?;
        table.push_column(format!("cell_density_{}3", units), format!("1/{}^3", units), density)?;

        if !self.fields.is_empty() {
            for (name, f) in &self.fields {
                table.push_column(
                    format!("{}_decay_rate", name),
                    f.decay_rate.units.as_str(),
                    vec![f.decay_rate.value; agents],
                )?;
                table.push_column(
                    format!("{}_diffusion_coefficient", name),
                    f.diffusion_coefficient.units.as_str(),
                    vec![f.diffusion_coefficient.value; agents],
                )?;
                table.push_column(
                    name.as_str(),
                    f.units.as_str(),
                    voxels.iter().map(|&[i, j, k]| f.data.get(j, i, k).unwrap_or(f64::NAN)).collect(),
                )?;
            }
            for (axis, name) in ["mesh_center_m", "mesh_center_n", "mesh_center_p"].into_iter().enumerate() {
                let centers = &self.mesh.mnp_axis()[axis];
                table.push_column(name, units, voxels.iter().map(|v| centers[v[axis]]).collect())?;
            }
        }

        table.sort_columns("ID");
        Ok(table)
    }

    /// Every unit in the snapshot by quantity name: time, runtime and
    /// spatial unit, substrate concentrations and transport parameters,
    /// and all cell columns except `ID`.
    pub fn units_overview(&self) -> BTreeMap<String, String> {
        let mut units = BTreeMap::new();
        units.insert("time".to_string(), self.metadata.time_units.clone());
        units.insert("runtime".to_string(), self.metadata.runtime_units.clone());
        units.insert("spatial_unit".to_string(), self.metadata.spatial_units.clone());
        for (name, f) in &self.fields {
            units.insert(name.clone(), f.units.clone());
            units.insert(format!("{}_diffusion_coefficient", name), f.diffusion_coefficient.units.clone());
            units.insert(format!("{}_decay_rate", name), f.decay_rate.units.clone());
        }
        for column in self.cells.columns() {
            if column.name != "ID" {
                units.insert(column.name.clone(), column.unit.clone());
            }
        }
        units
    }

    /// Headline numbers of this snapshot.
    pub fn summary(&self) -> SnapshotSummary {
        let edges = self.graphs.as_ref().map(Graphs::edge_counts);
        SnapshotSummary {
            manifest: self.manifest.display().to_string(),
            multicellds_version: self.metadata.multicellds_version.clone(),
            physicell_version: self.metadata.physicell_version.clone(),
            created: self.metadata.created.clone(),
            current_time: self.metadata.current_time,
            time_units: self.metadata.time_units.clone(),
            current_runtime: self.metadata.current_runtime,
            runtime_units: self.metadata.runtime_units.clone(),
            spatial_units: self.metadata.spatial_units.clone(),
            grid_shape: self.mesh.grid_shape(),
            voxel_volume: self.mesh.voxel_volume(),
            substrates: self.substrate_names(),
            cell_count: self.cells.len(),
            neighbor_edges: edges.map(|e| e.0),
            attached_edges: edges.map(|e| e.1),
        }
    }

    /// Checks that agent IDs are unique and that the graphs only mention
    /// known agents. Nothing is enforced at load time.
    pub fn validate_ids(&self) -> Result<IdReport> {
        let ids = self.cells.require("ID")?;
        let mut seen = BTreeSet::new();
        let mut duplicates = BTreeSet::new();
        for &id in ids {
            let id = id as i64;
            if !seen.insert(id) {
                duplicates.insert(id);
            }
        }

        let mut unknown = BTreeSet::new();
        if let Some(graphs) = &self.graphs {
            for graph in [&graphs.neighbor_cells, &graphs.attached_cells] {
                for (key, targets) in graph {
                    for id in std::iter::once(key).chain(targets) {
                        if !seen.contains(id) {
                            unknown.insert(*id);
                        }
                    }
                }
            }
        }

        Ok(IdReport {
            duplicate_ids: duplicates.into_iter().collect(),
            unknown_graph_ids: unknown.into_iter().collect(),
        })
    }
}
