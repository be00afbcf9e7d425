use serde::{Serialize, Deserialize};
use std::collections::BTreeMap;

/// Headline facts about one loaded MCDS time step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotSummary {
    /// Manifest file the snapshot was read from.
    pub manifest: String,
    pub multicellds_version: String,
    pub physicell_version: String,
    /// Creation timestamp as written by the simulator.
    pub created: String,
    /// Simulated time, in `time_units`.
    pub current_time: f64,
    pub time_units: String,
    /// Wall-clock time the run took up to this step, in `runtime_units`.
    pub current_runtime: f64,
    pub runtime_units: String,
    pub spatial_units: String,
    /// Voxel grid shape as (rows = n axis, columns = m axis, layers = p axis).
    pub grid_shape: [usize; 3],
    pub voxel_volume: f64,
    pub substrates: Vec<String>,
    pub cell_count: usize,
    /// Neighbour / attachment edge counts. `None` when graphs were not loaded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub neighbor_edges: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attached_edges: Option<usize>,
}

/// One row of a population time series, one per time step of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesRecord {
    pub manifest: String,
    pub current_time: f64,
    pub current_runtime: f64,
    pub cell_count: usize,
    /// Cell counts keyed by the integer `cell_type` code.
    pub cell_type_counts: BTreeMap<i64, usize>,
}
