use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::{info, warn};
use std::path::{Path, PathBuf};
use std::time::Instant;

use mcds_common::ReaderConfig;
use physicell_mcds::{export, series, LoadOptions, Snapshot, Vec3};

/// Command-line arguments for the MCDS reader
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Optional path to a reader config TOML file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding the manifest and its payload files
    #[arg(long, global = true)]
    output_dir: Option<PathBuf>,

    /// Skip loading substrate fields
    #[arg(long, global = true)]
    no_microenv: bool,

    /// Skip loading the cell graphs
    #[arg(long, global = true)]
    no_graph: bool,

    /// Report loading progress at debug level only
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print snapshot metadata and write the summary record
    Summary {
        /// Manifest file (output########.xml)
        manifest: PathBuf,
    },
    /// Write cells, units, concentrations, graphs and summary
    Export {
        /// Manifest file (output########.xml)
        manifest: PathBuf,
    },
    /// Voxel, concentrations and cell count at one point
    Query {
        /// Manifest file (output########.xml)
        manifest: PathBuf,
        #[arg(long, allow_hyphen_values = true)]
        x: f64,
        #[arg(long, allow_hyphen_values = true)]
        y: f64,
        #[arg(long, allow_hyphen_values = true, default_value_t = 0.0)]
        z: f64,
        /// Only report this substrate
        #[arg(long)]
        substrate: Option<String>,
    },
    /// Population counts over every time step of a run directory
    Timeseries {
        /// Run output directory
        dir: PathBuf,
    },
}

impl Args {
    /// Config file values, overridden by command-line flags.
    fn reader_config(&self) -> Result<ReaderConfig> {
        let mut config = match &self.config {
            Some(path) => ReaderConfig::load(path)?,
            None => ReaderConfig::default(),
        };
        if self.output_dir.is_some() {
            config.load.output_dir = self.output_dir.clone();
        }
        if self.no_microenv {
            config.load.microenv = false;
        }
        if self.no_graph {
            config.load.graph = false;
        }
        if self.quiet {
            config.load.verbose = false;
        }
        Ok(config)
    }
}

fn load_snapshot(manifest: &Path, options: &LoadOptions) -> Result<Snapshot> {
    let snapshot = Snapshot::load(manifest, options)
        .with_context(|| format!("Failed to load snapshot '{}'", manifest.display()))?;
    match snapshot.validate_ids() {
        Ok(report) if !report.is_clean() => {
            if !report.duplicate_ids.is_empty() {
                warn!("Duplicate cell IDs: {:?}", report.duplicate_ids);
            }
            if !report.unknown_graph_ids.is_empty() {
                warn!("Graph IDs without a cell: {:?}", report.unknown_graph_ids);
            }
        }
        Ok(_) => {}
        Err(e) => warn!("Cell IDs not checked: {}", e),
    }
    Ok(snapshot)
}

fn log_summary(snapshot: &Snapshot) {
    let summary = snapshot.summary();
    info!("{} written by {}", summary.multicellds_version, summary.physicell_version);
    info!(
        "Time: {} {} | Runtime: {} {} | Created: {}",
        summary.current_time, summary.time_units, summary.current_runtime, summary.runtime_units, summary.created
    );
    info!(
        "Mesh: {:?} voxels of {} {}^3 | Substrates: {:?}",
        summary.grid_shape, summary.voxel_volume, summary.spatial_units, summary.substrates
    );
    info!("Cells: {}", summary.cell_count);
    if let (Some(n), Some(a)) = (summary.neighbor_edges, summary.attached_edges) {
        info!("Graph edges: {} neighbor, {} attached", n, a);
    }
}

fn main() -> Result<()> {
    // Initialize the logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = args.reader_config()?;
    let options = LoadOptions::from(&config.load);
    let base = config.output.base_filename.as_str();
    let start_time = Instant::now();

    match &args.command {
        Command::Summary { manifest } => {
            let snapshot = load_snapshot(manifest, &options)?;
            log_summary(&snapshot);
            export::write_record(&snapshot.summary(), base, "summary", config.output_format())?;
        }
        Command::Export { manifest } => {
            let snapshot = load_snapshot(manifest, &options)?;
            log_summary(&snapshot);
            let output = &config.output;

            if output.save_cells {
                let cells = snapshot.cell_table_with_voxels()?;
                export::write_table_csv(&cells, &PathBuf::from(format!("{}_cells.csv", base)))?;
            } else {
                info!("Skipping cell table as per config.");
            }
            if output.save_units {
                export::write_units_csv(&snapshot.units_overview(), &PathBuf::from(format!("{}_units.csv", base)))?;
            }
            if output.save_concentrations && !snapshot.fields().is_empty() {
                let table = snapshot.concentration_table(None, false)?;
                export::write_table_csv(&table, &PathBuf::from(format!("{}_concentrations.csv", base)))?;
            }
            if output.save_graphs {
                match snapshot.graphs() {
                    Some(graphs) => export::write_graphs_json(graphs, &PathBuf::from(format!("{}_graphs.json", base)))?,
                    None => info!("Graphs not loaded; nothing to save."),
                }
            }
            export::write_record(&snapshot.summary(), base, "summary", config.output_format())?;
        }
        Command::Query { manifest, x, y, z, substrate } => {
            let snapshot = load_snapshot(manifest, &options)?;
            let point = Vec3::new(*x, *y, *z);
            if !snapshot.is_in_mesh(point, false)? {
                anyhow::bail!("Point ({}, {}, {}) lies outside the mesh.", x, y, z);
            }
            if let Some([i, j, k]) = snapshot.voxel_ijk(point, true) {
                info!("Voxel [i, j, k] = [{}, {}, {}]", i, j, k);
            }
            match substrate {
                Some(name) => {
                    if let Some(value) = snapshot.concentration_at(point, name)? {
                        info!("{} = {} {}", name, value, snapshot.field(name)?.units);
                    }
                }
                None => {
                    for (name, value) in snapshot.concentrations_at(point)?.unwrap_or_default() {
                        info!("{} = {}", name, value);
                    }
                }
            }
            match snapshot.cell_table_at_voxel(point) {
                Ok(Some(cells)) => info!("Cells in voxel: {}", cells.len()),
                Ok(None) => {}
                Err(e) => warn!("Cells in voxel not counted: {}", e),
            }
        }
        Command::Timeseries { dir } => {
            let records = series::load_time_series(dir, config.load.verbose)
                .with_context(|| format!("Failed to load time series from '{}'", dir.display()))?;
            series::write_time_series_csv(&records, &PathBuf::from(format!("{}_timeseries.csv", base)))?;
        }
    }

    let total_duration = start_time.elapsed();
    info!("Finished in {:.3} seconds.", total_duration.as_secs_f64());
    Ok(())
}
