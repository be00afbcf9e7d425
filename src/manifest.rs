//! MCDS manifest (`output########.xml`) parsing and payload path resolution.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{McdsError, Result};

/// Snapshot-level metadata read from the manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    /// `"MultiCellDS_" + <root version attribute>`.
    pub multicellds_version: String,
    /// `"<software name>_<software version>"`.
    pub physicell_version: String,
    pub created: String,
    pub current_time: f64,
    pub time_units: String,
    pub current_runtime: f64,
    pub runtime_units: String,
    pub spatial_units: String,
}

/// Raw text of one delimited number list from the mesh element.
#[derive(Debug, Clone, PartialEq)]
pub struct DelimitedText {
    pub text: String,
    /// `None` means whitespace separated.
    pub delimiter: Option<String>,
}

impl DelimitedText {
    /// Splits the text into numbers. Empty tokens are skipped.
    pub fn parse_values(&self) -> std::result::Result<Vec<f64>, String> {
        let tokens: Vec<&str> = match self.delimiter.as_deref() {
            Some(d) if !d.trim().is_empty() => self.text.split(d).collect(),
            _ => self.text.split_whitespace().collect(),
        };
        tokens
            .into_iter()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(|t| t.parse::<f64>().map_err(|e| format!("'{}' is not a number: {}", t, e)))
            .collect()
    }
}

/// Mesh description from `microenvironment/domain/mesh`.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshSpec {
    pub x_coordinates: DelimitedText,
    pub y_coordinates: DelimitedText,
    pub z_coordinates: DelimitedText,
    pub bounding_box: DelimitedText,
}

/// A `{value, units}` transport parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quantity {
    pub value: f64,
    pub units: String,
}

/// One `<variable>` of the microenvironment, in declaration order.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableSpec {
    /// Substrate name with spaces replaced by underscores.
    pub name: String,
    pub units: String,
    pub diffusion_coefficient: Quantity,
    pub decay_rate: Quantity,
}

/// One cell-data `<label>`.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelSpec {
    /// Label text with spaces replaced by underscores.
    pub name: String,
    pub size: usize,
    pub units: String,
}

/// Payload files, already resolved against the output directory.
#[derive(Debug, Clone, PartialEq)]
pub struct PayloadPaths {
    pub voxels: PathBuf,
    pub microenvironment: PathBuf,
    pub cells: PathBuf,
    pub neighbor_graph: Option<PathBuf>,
    pub attached_graph: Option<PathBuf>,
}

/// Everything the loaders need from one manifest.
#[derive(Debug, Clone, PartialEq)]
pub struct Manifest {
    /// Resolved manifest path, quoted in every payload error.
    pub path: PathBuf,
    pub output_dir: PathBuf,
    pub metadata: Metadata,
    pub mesh: MeshSpec,
    pub variables: Vec<VariableSpec>,
    pub labels: Vec<LabelSpec>,
    pub payloads: PayloadPaths,
}

/// Splits a manifest argument into (manifest path, output directory).
///
/// Without an explicit directory, a manifest given with a directory component
/// has that directory split off and used as the output directory.
pub fn resolve_paths(manifest: &Path, output_dir: Option<&Path>) -> (PathBuf, PathBuf) {
    let normalised = PathBuf::from(manifest.to_string_lossy().replace('\\', "/"));
    match output_dir {
        Some(dir) => (dir.join(&normalised), dir.to_path_buf()),
        None => {
            let dir = match normalised.parent() {
                Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
                _ => PathBuf::from("."),
            };
            let file = normalised.file_name().map(PathBuf::from).unwrap_or_else(|| normalised.clone());
            (dir.join(file), dir)
        }
    }
}

impl Manifest {
    /// Reads and parses a manifest file.
    pub fn load(manifest: &Path, output_dir: Option<&Path>) -> Result<Self> {
        let (path, output_dir) = resolve_paths(manifest, output_dir);
        let xml = std::fs::read_to_string(&path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                McdsError::ManifestNotFound { path: path.clone(), source }
            } else {
                McdsError::Io { path: path.clone(), source }
            }
        })?;
        Self::from_xml(&xml, path, output_dir)
    }

    /// Parses manifest text; `path` and `output_dir` are used for payload
    /// resolution and error context only.
    pub fn from_xml(xml: &str, path: PathBuf, output_dir: PathBuf) -> Result<Self> {
        let root: xml::MultiCellDs = quick_xml::de::from_str(xml)
            .map_err(|source| McdsError::Xml { path: path.clone(), source })?;

        let metadata = Metadata {
            multicellds_version: format!("MultiCellDS_{}", root.version),
            physicell_version: format!(
                "{}_{}",
                root.metadata.software.name.trim(),
                root.metadata.software.version.trim()
            ),
            created: root.metadata.created.trim().to_string(),
            current_time: root.metadata.current_time.value,
            time_units: root.metadata.current_time.units,
            current_runtime: root.metadata.current_runtime.value,
            runtime_units: root.metadata.current_runtime.units,
            spatial_units: root.microenvironment.domain.mesh.units.clone(),
        };

        let domain = root.microenvironment.domain;
        let mesh = MeshSpec {
            x_coordinates: domain.mesh.x_coordinates.into(),
            y_coordinates: domain.mesh.y_coordinates.into(),
            z_coordinates: domain.mesh.z_coordinates.into(),
            bounding_box: domain.mesh.bounding_box.into(),
        };

        let variables = domain
            .variables
            .variables
            .into_iter()
            .map(|v| VariableSpec {
                name: v.name.replace(' ', "_"),
                units: v.units,
                diffusion_coefficient: v.physical_parameter_set.diffusion_coefficient.into(),
                decay_rate: v.physical_parameter_set.decay_rate.into(),
            })
            .collect();

        let custom = root
            .cellular_information
            .cell_populations
            .cell_population
            .into_iter()
            .next()
            .ok_or_else(|| McdsError::MissingElement { path: path.clone(), element: "cell_population" })?
            .custom;

        let physicell = custom
            .simplified_data
            .into_iter()
            .find(|d| d.source == "PhysiCell")
            .ok_or_else(|| McdsError::MissingElement {
                path: path.clone(),
                element: "simplified_data[@source=\"PhysiCell\"]",
            })?;
        let labels = physicell
            .labels
            .ok_or_else(|| McdsError::MissingElement { path: path.clone(), element: "labels" })?
            .labels
            .into_iter()
            .map(|l| LabelSpec {
                name: l.name.trim().replace(' ', "_"),
                size: l.size,
                units: l.units.unwrap_or_else(|| "none".to_string()),
            })
            .collect();
        let cells_file = physicell
            .filename
            .ok_or_else(|| McdsError::MissingElement { path: path.clone(), element: "simplified_data/filename" })?;

        let resolve = |file: &str| output_dir.join(file.trim());
        let payloads = PayloadPaths {
            voxels: resolve(&domain.mesh.voxels.filename),
            microenvironment: resolve(&domain.data.filename),
            cells: resolve(&cells_file),
            neighbor_graph: custom.neighbor_graph.map(|f| resolve(&f.filename)),
            attached_graph: custom.attached_cells_graph.map(|f| resolve(&f.filename)),
        };

        Ok(Manifest { path, output_dir, metadata, mesh, variables, labels, payloads })
    }

    /// Lists the `output########.xml` manifests of a run directory, in
    /// time-step order.
    pub fn discover(dir: &Path) -> Result<Vec<PathBuf>> {
        let entries = std::fs::read_dir(dir)
            .map_err(|source| McdsError::Io { path: dir.to_path_buf(), source })?;
        let mut found = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| McdsError::Io { path: dir.to_path_buf(), source })?;
            let name = entry.file_name();
            if is_step_manifest(&name.to_string_lossy()) {
                found.push(entry.path());
            }
        }
        found.sort();
        Ok(found)
    }
}

fn is_step_manifest(name: &str) -> bool {
    name.strip_prefix("output")
        .and_then(|rest| rest.strip_suffix(".xml"))
        .map_or(false, |digits| digits.len() == 8 && digits.bytes().all(|b| b.is_ascii_digit()))
}

/// Serde mirror of the manifest elements this reader consumes.
/// Unknown elements and attributes are ignored.
mod xml {
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    pub struct MultiCellDs {
        #[serde(rename = "@version")]
        pub version: String,
        pub metadata: Metadata,
        pub microenvironment: Microenvironment,
        pub cellular_information: CellularInformation,
    }

    #[derive(Debug, Deserialize)]
    pub struct Metadata {
        pub software: Software,
        pub created: String,
        pub current_time: Quantity,
        pub current_runtime: Quantity,
    }

    #[derive(Debug, Deserialize)]
    pub struct Software {
        pub name: String,
        pub version: String,
    }

    #[derive(Debug, Deserialize)]
    pub struct Quantity {
        #[serde(rename = "@units", default)]
        pub units: String,
        #[serde(rename = "$text")]
        pub value: f64,
    }

    #[derive(Debug, Deserialize)]
    pub struct Microenvironment {
        pub domain: Domain,
    }

    #[derive(Debug, Deserialize)]
    pub struct Domain {
        pub mesh: Mesh,
        pub variables: Variables,
        pub data: FileRef,
    }

    #[derive(Debug, Deserialize)]
    pub struct Mesh {
        #[serde(rename = "@units", default)]
        pub units: String,
        pub x_coordinates: Delimited,
        pub y_coordinates: Delimited,
        pub z_coordinates: Delimited,
        pub bounding_box: Delimited,
        pub voxels: FileRef,
    }

    #[derive(Debug, Deserialize)]
    pub struct Delimited {
        #[serde(rename = "@delimiter")]
        pub delimiter: Option<String>,
        #[serde(rename = "$text", default)]
        pub text: String,
    }

    #[derive(Debug, Deserialize)]
    pub struct FileRef {
        pub filename: String,
    }

    #[derive(Debug, Deserialize)]
    pub struct Variables {
        #[serde(rename = "variable", default)]
        pub variables: Vec<Variable>,
    }

    #[derive(Debug, Deserialize)]
    pub struct Variable {
        #[serde(rename = "@name")]
        pub name: String,
        #[serde(rename = "@units", default)]
        pub units: String,
        pub physical_parameter_set: PhysicalParameterSet,
    }

    #[derive(Debug, Deserialize)]
    pub struct PhysicalParameterSet {
        pub diffusion_coefficient: Quantity,
        pub decay_rate: Quantity,
    }

    #[derive(Debug, Deserialize)]
    pub struct CellularInformation {
        pub cell_populations: CellPopulations,
    }

    #[derive(Debug, Deserialize)]
    pub struct CellPopulations {
        #[serde(default)]
        pub cell_population: Vec<CellPopulation>,
    }

    #[derive(Debug, Deserialize)]
    pub struct CellPopulation {
        pub custom: Custom,
    }

    #[derive(Debug, Deserialize)]
    pub struct Custom {
        #[serde(default)]
        pub simplified_data: Vec<SimplifiedData>,
        pub neighbor_graph: Option<FileRef>,
        pub attached_cells_graph: Option<FileRef>,
    }

    #[derive(Debug, Deserialize)]
    pub struct SimplifiedData {
        #[serde(rename = "@source", default)]
        pub source: String,
        pub labels: Option<Labels>,
        pub filename: Option<String>,
    }

    #[derive(Debug, Deserialize)]
    pub struct Labels {
        #[serde(rename = "label", default)]
        pub labels: Vec<Label>,
    }

    #[derive(Debug, Deserialize)]
    pub struct Label {
        #[serde(rename = "@size")]
        pub size: usize,
        #[serde(rename = "@units")]
        pub units: Option<String>,
        #[serde(rename = "$text")]
        pub name: String,
    }
}

impl From<xml::Delimited> for DelimitedText {
    fn from(d: xml::Delimited) -> Self {
        DelimitedText { text: d.text, delimiter: d.delimiter }
    }
}

impl From<xml::Quantity> for Quantity {
    fn from(q: xml::Quantity) -> Self {
        Quantity { value: q.value, units: q.units }
    }
}
