//! Input adapters. Each one turns a file into either atomic positions or an
//! MSD series precomputed by the MD engine; none of them does MSD or fitting
//! work.
//!
//! Positions must be unwrapped (no periodic-boundary folding). Wrapped input
//! produces a sawtooth MSD that is not detected here.

pub mod elements;
mod json_trajectory;
mod lammps_dump;
mod thermo;

pub use json_trajectory::parse_json_trajectory;
pub use lammps_dump::{DumpOptions, parse_lammps_dump};
pub use thermo::{THERMO_MSD_COLUMN, discard_steps_to_rows, parse_lammps_thermo};

use crate::domain::{DataSource, DiffusionError, ParserResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::info;

/// Unwrapped Cartesian positions, `positions[frame][atom]` in Å.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trajectory {
    /// ps.
    pub time: Vec<f64>,
    pub symbols: Vec<String>,
    pub positions: Vec<Vec<[f64; 3]>>,
    /// K, when the source records one.
    #[serde(default)]
    pub temperature: Option<f64>,
}

impl Trajectory {
    pub fn frame_count(&self) -> usize {
        self.positions.len()
    }
}

/// Mean MSD computed by the MD engine, without a per-atom breakdown.
#[derive(Debug, Clone, PartialEq)]
pub struct PrecomputedMsd {
    /// ps.
    pub time: Vec<f64>,
    /// Å².
    pub msd_mean: Vec<f64>,
    pub temperature: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum InputData {
    Positions(Trajectory),
    Precomputed(PrecomputedMsd),
}

impl InputData {
    pub fn frame_count(&self) -> usize {
        match self {
            Self::Positions(trajectory) => trajectory.frame_count(),
            Self::Precomputed(series) => series.time.len(),
        }
    }
}

pub fn read_input_source(path: &Path) -> ParserResult<String> {
    fs::read_to_string(path).map_err(|source| {
        DiffusionError::io_system(
            "IO.INPUT_READ",
            format!("failed to read input '{}': {}", path.display(), source),
        )
    })
}

/// Reads `path` with the adapter selected by `source`.
pub fn load_input(
    path: &Path,
    source: DataSource,
    dump_options: &DumpOptions,
) -> ParserResult<InputData> {
    let content = read_input_source(path)?;
    let input = match source {
        DataSource::LammpsThermo => InputData::Precomputed(parse_lammps_thermo(&content)?),
        DataSource::LammpsDump => InputData::Positions(parse_lammps_dump(&content, dump_options)?),
        DataSource::JsonTrajectory => InputData::Positions(parse_json_trajectory(&content)?),
    };
    info!(
        path = %path.display(),
        source = %source,
        frames = input.frame_count(),
        "loaded input"
    );
    Ok(input)
}

#[cfg(test)]
mod tests {
    use super::{DumpOptions, InputData, load_input};
    use crate::domain::{DataSource, DiffusionErrorCategory};
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn loader_dispatches_on_source() {
        let temp = TempDir::new().expect("tempdir should be created");
        let path = temp.path().join("traj.json");
        fs::write(
            &path,
            r#"{"time": [0.0, 1.0], "symbols": ["Li"], "positions": [[[0, 0, 0]], [[1, 0, 0]]]}"#,
        )
        .expect("fixture write should succeed");

        let input = load_input(&path, DataSource::JsonTrajectory, &DumpOptions::default())
            .expect("load");
        assert!(matches!(input, InputData::Positions(_)));
        assert_eq!(input.frame_count(), 2);
    }

    #[test]
    fn missing_input_is_an_io_error() {
        let temp = TempDir::new().expect("tempdir should be created");
        let error = load_input(
            &temp.path().join("absent.log"),
            DataSource::LammpsThermo,
            &DumpOptions::default(),
        )
        .expect_err("missing file");
        assert_eq!(error.category(), DiffusionErrorCategory::IoSystemError);
        assert_eq!(error.exit_code(), 4);
    }
}
