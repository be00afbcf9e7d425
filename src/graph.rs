//! Neighbour and attachment graphs written next to the cell payload.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use log::{log, Level};
use serde::{Deserialize, Serialize};

use crate::error::{read_payload, McdsError, Result};
use crate::manifest::Manifest;

/// Cell ID to the IDs it points at. Edges are kept as written, not symmetrised.
pub type CellGraph = BTreeMap<i64, BTreeSet<i64>>;

/// Both per-snapshot cell graphs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Graphs {
    pub neighbor_cells: CellGraph,
    pub attached_cells: CellGraph,
}

impl Graphs {
    /// Number of directed edges in each graph, `(neighbor, attached)`.
    pub fn edge_counts(&self) -> (usize, usize) {
        let count = |g: &CellGraph| g.values().map(BTreeSet::len).sum();
        (count(&self.neighbor_cells), count(&self.attached_cells))
    }
}

fn parse_id(token: &str) -> std::result::Result<i64, String> {
    token
        .parse::<i64>()
        .map_err(|e| format!("'{}' is not a cell ID: {}", token, e))
}

/// Parses `<id>: <id>,<id>,...` lines. Blank lines are skipped and a repeated
/// key keeps the set from its last line. Errors carry the 1-based line number.
pub fn parse_graph(text: &str) -> std::result::Result<CellGraph, (usize, String)> {
    let mut graph = CellGraph::new();
    for (idx, line) in text.lines().enumerate() {
        let line_no = idx + 1;
        if line.trim().is_empty() {
            continue;
        }
        let (key, values) = line
            .split_once(':')
            .ok_or_else(|| (line_no, format!("missing ':' in '{}'", line.trim())))?;
        let id = parse_id(key.trim()).map_err(|m| (line_no, m))?;
        let linked = values
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(parse_id)
            .collect::<std::result::Result<BTreeSet<i64>, String>>()
            .map_err(|m| (line_no, m))?;
        graph.insert(id, linked);
    }
    Ok(graph)
}

/// Reads one graph file named by `manifest`.
pub fn read_graph(path: &Path, manifest: &Path) -> Result<CellGraph> {
    let bytes = read_payload(path, manifest)?;
    let text = String::from_utf8_lossy(&bytes);
    parse_graph(&text).map_err(|(line, message)| McdsError::Parse {
        path: path.to_path_buf(),
        line,
        message,
    })
}

fn graph_path<'a>(path: &'a Option<PathBuf>, manifest: &Manifest, element: &'static str) -> Result<&'a Path> {
    path.as_deref().ok_or_else(|| McdsError::MissingElement { path: manifest.path.clone(), element })
}

/// Reads the neighbour and attached-cells graphs of `manifest`.
pub fn load(manifest: &Manifest, verbose: bool) -> Result<Graphs> {
    let level = if verbose { Level::Info } else { Level::Debug };
    log!(level, "working on graph data ...");

    let neighbor = graph_path(&manifest.payloads.neighbor_graph, manifest, "neighbor_graph")?;
    let attached = graph_path(&manifest.payloads.attached_graph, manifest, "attached_cells_graph")?;

    log!(level, "reading: {}", neighbor.display());
    let neighbor_cells = read_graph(neighbor, &manifest.path)?;
    log!(level, "reading: {}", attached.display());
    let attached_cells = read_graph(attached, &manifest.path)?;

    Ok(Graphs { neighbor_cells, attached_cells })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::io::Write;

    #[test]
    fn empty_value_is_an_empty_set() {
        let graph = parse_graph("0: 1,2\n1:\n").unwrap();
        assert_eq!(graph.len(), 2);
        assert_eq!(graph[&0], BTreeSet::from([1, 2]));
        assert!(graph[&1].is_empty());
    }

    #[test]
    fn whitespace_and_blank_lines_are_ignored() {
        let graph = parse_graph("\n  3 :  4 , 5  \n\n6: 3\n").unwrap();
        assert_eq!(graph[&3], BTreeSet::from([4, 5]));
        assert_eq!(graph[&6], BTreeSet::from([3]));
    }

    #[test]
    fn repeated_key_keeps_last_line() {
        let graph = parse_graph("0: 1,2\n0: 3\n").unwrap();
        assert_eq!(graph[&0], BTreeSet::from([3]));
    }

    #[test]
    fn parsing_is_deterministic() {
        let text = "2: 5,1\n1: 2\n";
        assert_eq!(parse_graph(text).unwrap(), parse_graph(text).unwrap());
    }

    #[test]
    fn bad_lines_report_their_number() {
        assert_eq!(parse_graph("0: 1\n\nnot a line\n").unwrap_err().0, 3);
        let (line, message) = parse_graph("0: 1\n1: x\n").unwrap_err();
        assert_eq!(line, 2);
        assert!(message.contains("'x'"));
    }

    #[test]
    fn files_are_read_with_context() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("graph.txt");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "0: 1").unwrap();
        writeln!(file, "1: ?").unwrap();

        let err = read_graph(&path, Path::new("output00000000.xml")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Parse);
        assert!(err.to_string().contains("graph.txt:2"), "got {}", err);

        let missing = dir.path().join("absent.txt");
        let err = read_graph(&missing, Path::new("output00000000.xml")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FileNotFound);
        let text = err.to_string();
        assert!(text.contains("absent.txt") && text.contains("output00000000.xml"), "got {}", text);
    }

    #[test]
    fn edge_counts_sum_set_sizes() {
        let graphs = Graphs {
            neighbor_cells: parse_graph("0: 1,2\n1: 0\n").unwrap(),
            attached_cells: CellGraph::new(),
        };
        assert_eq!(graphs.edge_counts(), (3, 0));
    }
}
