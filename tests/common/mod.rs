#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

pub const X_AXIS: [f64; 3] = [-20.0, 0.0, 20.0];
pub const Y_AXIS: [f64; 2] = [-10.0, 10.0];
pub const VOXEL_VOLUME: f64 = 8000.0;

/// One little-endian, double precision MATLAB level-4 matrix.
pub fn mat_matrix(name: &str, rows: usize, cols: usize, data: &[f64]) -> Vec<u8> {
    assert_eq!(data.len(), rows * cols);
    let mut out = Vec::new();
    for v in [0i32, rows as i32, cols as i32, 0, name.len() as i32 + 1] {
        out.extend_from_slice(&v.to_le_bytes());
    }
    out.extend_from_slice(name.as_bytes());
    out.push(0);
    for v in data {
        out.extend_from_slice(&v.to_le_bytes());
    }
    out
}

/// Voxel centres of the test mesh, x fastest.
pub fn voxel_centres() -> Vec<[f64; 2]> {
    Y_AXIS.iter().flat_map(|&y| X_AXIS.iter().map(move |&x| [x, y])).collect()
}

/// Manifest and payload files of one time step.
pub struct Step {
    pub index: usize,
    pub time: f64,
    /// Agents as `[ID, x, y, z, cell_type, v0, v1, v2]`.
    pub cells: Vec<[f64; 8]>,
    pub neighbor_graph: String,
    pub attached_graph: String,
    pub volumes: Vec<f64>,
    /// Voxel columns are written in reverse order when set.
    pub reverse_microenvironment: bool,
}

impl Default for Step {
    fn default() -> Self {
        Step {
            index: 0,
            time: 0.0,
            cells: vec![
                [0.0, 1.0, 9.0, 0.0, 0.0, 0.1, 0.2, 0.3],
                [1.0, -1.0, 10.0, 0.0, 1.0, 0.4, 0.5, 0.6],
                [2.0, -19.0, -10.0, 0.0, 1.0, 0.7, 0.8, 0.9],
            ],
            neighbor_graph: "0: 1\n1: 0\n2:\n".to_string(),
            attached_graph: "0: 1\n1: 0\n".to_string(),
            volumes: vec![VOXEL_VOLUME; 6],
            reverse_microenvironment: false,
        }
    }
}

/// Oxygen is `x + y`, glucose is `100 + x`.
pub fn oxygen(x: f64, y: f64) -> f64 {
    x + y
}

pub fn glucose(x: f64) -> f64 {
    100.0 + x
}

pub fn manifest_name(index: usize) -> String {
    format!("output{:08}.xml", index)
}

pub fn manifest_xml(step: &Step) -> String {
    let n = step.index;
    format!(
        r#"<?xml version="1.0" encoding="utf-8"?>
<MultiCellDS version="2" type="snapshot/simulation">
  <metadata>
    <software>
      <name>PhysiCell</name>
      <version>1.10.4</version>
    </software>
    <created>2022-08-22T10:00:00Z</created>
    <current_time units="min">{time}</current_time>
    <current_runtime units="sec">{runtime}</current_runtime>
  </metadata>
  <microenvironment>
    <domain name="microenvironment">
      <mesh type="Cartesian" uniform="true" regular="true" units="micron">
        <x_coordinates delimiter=" ">-20.000000 0.000000 20.000000</x_coordinates>
        <y_coordinates delimiter=" ">-10.000000 10.000000</y_coordinates>
        <z_coordinates delimiter=" ">0.000000</z_coordinates>
        <bounding_box type="axis-aligned" units="micron">-30 -20 -10 30 20 10</bounding_box>
        <voxels type="matlab">
          <filename>initial_mesh0.mat</filename>
        </voxels>
      </mesh>
      <variables>
        <variable name="oxygen" units="mmHg" ID="0">
          <physical_parameter_set>
            <diffusion_coefficient units="micron^2/min">100000</diffusion_coefficient>
            <decay_rate units="1/min">0.1</decay_rate>
          </physical_parameter_set>
        </variable>
        <variable name="glucose" units="mM" ID="1">
          <physical_parameter_set>
            <diffusion_coefficient units="micron^2/min">600</diffusion_coefficient>
            <decay_rate units="1/min">0.01</decay_rate>
          </physical_parameter_set>
        </variable>
      </variables>
      <data type="matlab">
        <filename>output{n:08}_microenvironment0.mat</filename>
      </data>
    </domain>
  </microenvironment>
  <cellular_information>
    <cell_populations>
      <cell_population type="individual">
        <custom>
          <simplified_data type="matlab" source="PhysiCell" data_version="2">
            <labels>
              <label index="0" size="1" units="none">ID</label>
              <label index="1" size="3" units="microns">position</label>
              <label index="4" size="1">cell type</label>
              <label index="5" size="3" units="dimensionless">custom_vector</label>
            </labels>
            <filename>output{n:08}_cells.mat</filename>
          </simplified_data>
          <neighbor_graph type="text" source="PhysiCell" data_version="2">
            <filename>output{n:08}_cell_neighbor_graph.txt</filename>
          </neighbor_graph>
          <attached_cells_graph type="text" source="PhysiCell" data_version="2">
            <filename>output{n:08}_attached_cells_graph.txt</filename>
          </attached_cells_graph>
        </custom>
      </cell_population>
    </cell_populations>
  </cellular_information>
</MultiCellDS>
"#,
        time = step.time,
        runtime = step.time / 60.0,
        n = n,
    )
}

/// Writes `step` into `dir` and returns its manifest path.
pub fn write_step(dir: &Path, step: &Step) -> PathBuf {
    let n = step.index;

    let mut mesh = Vec::new();
    for (v, [x, y]) in voxel_centres().into_iter().enumerate() {
        mesh.extend_from_slice(&[x, y, 0.0, step.volumes[v]]);
    }
    fs::write(dir.join("initial_mesh0.mat"), mat_matrix("mesh", 4, 6, &mesh)).unwrap();

    let mut centres = voxel_centres();
    if step.reverse_microenvironment {
        centres.reverse();
    }
    let mut micro = Vec::new();
    for [x, y] in centres {
        micro.extend_from_slice(&[x, y, 0.0, VOXEL_VOLUME, oxygen(x, y), glucose(x)]);
    }
    fs::write(
        dir.join(format!("output{:08}_microenvironment0.mat", n)),
        mat_matrix("multiscale_microenvironment", 6, 6, &micro),
    )
    .unwrap();

    let cells: Vec<f64> = step.cells.iter().flatten().copied().collect();
    let cell_bytes = if step.cells.is_empty() {
        Vec::new()
    } else {
        mat_matrix("cells", 8, step.cells.len(), &cells)
    };
    fs::write(dir.join(format!("output{:08}_cells.mat", n)), cell_bytes).unwrap();

    fs::write(dir.join(format!("output{:08}_cell_neighbor_graph.txt", n)), &step.neighbor_graph).unwrap();
    fs::write(dir.join(format!("output{:08}_attached_cells_graph.txt", n)), &step.attached_graph).unwrap();

    let manifest = dir.join(manifest_name(n));
    fs::write(&manifest, manifest_xml(step)).unwrap();
    manifest
}

/// A temporary run directory holding one default time step.
pub fn default_run() -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let manifest = write_step(dir.path(), &Step::default());
    (dir, manifest)
}
