//! Writing snapshot data to disk: CSV tables and serialized records.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::{error, info};
use serde::Serialize;

use crate::graph::Graphs;
use crate::table::Table;

/// Writes a table as CSV, one header row of column names.
pub fn write_table_csv(table: &Table, path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create CSV file '{}'", path.display()))?;
    writer.write_record(table.column_names())?;
    for r in 0..table.len() {
        if let Some(row) = table.row(r) {
            writer.write_record(row.iter().map(|v| v.to_string()))?;
        }
    }
    writer.flush()?;
    info!("{} rows saved to {}", table.len(), path.display());
    Ok(())
}

/// Writes a `name,unit` CSV of a units overview.
pub fn write_units_csv(units: &BTreeMap<String, String>, path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create CSV file '{}'", path.display()))?;
    writer.write_record(["name", "unit"])?;
    for (name, unit) in units {
        writer.write_record([name, unit])?;
    }
    writer.flush()?;
    info!("Units saved to {}", path.display());
    Ok(())
}

/// Writes both cell graphs as one JSON document.
pub fn write_graphs_json(graphs: &Graphs, path: &Path) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("Failed to create graph file '{}'", path.display()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer(&mut writer, graphs)
        .with_context(|| format!("Failed to serialize graphs to '{}'", path.display()))?;
    writer.flush()?;
    info!("Graphs saved to {}", path.display());
    Ok(())
}

fn write_json<T: Serialize>(value: &T, path: &Path) -> Result<()> {
    let json_string = serde_json::to_string(value).context("Failed to serialize to JSON")?;
    let mut file = File::create(path)
        .with_context(|| format!("Failed to create file '{}'", path.display()))?;
    file.write_all(json_string.as_bytes())?;
    Ok(())
}

/// Serializes `value` to `<base>_<stem>.<ext>` in the requested format and
/// returns the written path. Unknown formats fall back to JSON.
pub fn write_record<T: Serialize>(value: &T, base_filename: &str, stem: &str, format: &str) -> Result<PathBuf> {
    let path = match format {
        "json" => {
            let path = PathBuf::from(format!("{}_{}.json", base_filename, stem));
            write_json(value, &path)?;
            info!("{} saved to {}", stem, path.display());
            path
        }
        "bincode" => {
            // Binary format (compact)
            let path = PathBuf::from(format!("{}_{}.bin", base_filename, stem));
            let file = File::create(&path)
                .with_context(|| format!("Failed to create file '{}'", path.display()))?;
            bincode::serialize_into(BufWriter::new(file), value)
                .with_context(|| format!("Failed to serialize {} to bincode", stem))?;
            info!("{} saved to {} (binary format)", stem, path.display());
            path
        }
        "messagepack" => {
            let path = PathBuf::from(format!("{}_{}.msgpack", base_filename, stem));
            let mut file = File::create(&path)
                .with_context(|| format!("Failed to create file '{}'", path.display()))?;
            rmp_serde::encode::write(&mut file, value)
                .with_context(|| format!("Failed to serialize {} to MessagePack", stem))?;
            info!("{} saved to {} (MessagePack format)", stem, path.display());
            path
        }
        _ => {
            error!("Unknown output format: {}. Using JSON instead.", format);
            let path = PathBuf::from(format!("{}_{}.json", base_filename, stem));
            write_json(value, &path)?;
            info!("{} saved to {}", stem, path.display());
            path
        }
    };
    Ok(path)
}
