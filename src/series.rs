//! Population counts across all time steps of a run.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use anyhow::{Context, Result};
use log::info;
use mcds_common::TimeSeriesRecord;
use rayon::prelude::*;

use crate::manifest::Manifest;
use crate::snapshot::{LoadOptions, Snapshot};

/// Cell counts of one snapshot; agents without a `cell_type` column are
/// only counted in the total.
pub fn record_for(snapshot: &Snapshot) -> TimeSeriesRecord {
    let mut cell_type_counts = BTreeMap::new();
    if let Some(types) = snapshot.cells().column("cell_type") {
        for &t in types {
            *cell_type_counts.entry(t as i64).or_insert(0) += 1;
        }
    }
    TimeSeriesRecord {
        manifest: snapshot.manifest().display().to_string(),
        current_time: snapshot.time().0,
        current_runtime: snapshot.runtime().0,
        cell_count: snapshot.cells().len(),
        cell_type_counts,
    }
}

/// Loads the cell data of every `output########.xml` in `dir`, in parallel,
/// and returns one record per time step in time-step order.
pub fn load_time_series(dir: &Path, verbose: bool) -> crate::Result<Vec<TimeSeriesRecord>> {
    let manifests = Manifest::discover(dir)?;
    info!("Found {} time steps in {}", manifests.len(), dir.display());

    let options = LoadOptions { output_dir: None, microenv: false, graph: false, verbose };
    manifests
        .par_iter()
        .map(|manifest| Snapshot::load(manifest, &options).map(|s| record_for(&s)))
        .collect()
}

/// Writes the series as CSV: time, runtime, total cells and one
/// `cell_type_<code>` column per cell type seen anywhere in the run.
pub fn write_time_series_csv(records: &[TimeSeriesRecord], path: &Path) -> Result<()> {
    let types: BTreeSet<i64> = records.iter().flat_map(|r| r.cell_type_counts.keys().copied()).collect();

    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create CSV file '{}'", path.display()))?;
    let mut header = vec!["time".to_string(), "runtime".to_string(), "cell_count".to_string()];
    header.extend(types.iter().map(|t| format!("cell_type_{}", t)));
    writer.write_record(&header)?;

    for record in records {
        let mut row = vec![
            record.current_time.to_string(),
            record.current_runtime.to_string(),
            record.cell_count.to_string(),
        ];
        row.extend(types.iter().map(|t| record.cell_type_counts.get(t).copied().unwrap_or(0).to_string()));
        writer.write_record(&row)?;
    }
    writer.flush()?;
    info!("Time series of {} steps saved to {}", records.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(time: f64, counts: &[(i64, usize)]) -> TimeSeriesRecord {
        TimeSeriesRecord {
            manifest: String::new(),
            current_time: time,
            current_runtime: time / 10.0,
            cell_count: counts.iter().map(|c| c.1).sum(),
            cell_type_counts: counts.iter().copied().collect(),
        }
    }

    #[test]
    fn csv_has_a_column_per_cell_type() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("series.csv");
        let records = [record(0.0, &[(0, 2)]), record(60.0, &[(0, 3), (2, 1)])];
        write_time_series_csv(&records, &path).unwrap();
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "time,runtime,cell_count,cell_type_0,cell_type_2\n0,0,2,2,0\n60,6,4,3,1\n"
        );
    }

    #[test]
    fn empty_directory_gives_empty_series() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_time_series(dir.path(), false).unwrap().is_empty());
    }
}
