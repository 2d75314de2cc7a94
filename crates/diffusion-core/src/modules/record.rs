//! Persisted result of one diffusion analysis and the re-analysis
//! operations that work from it.

use super::arrhenius::fit_arrhenius;
use super::fit::fit_diffusion;
use super::pipeline::AnalysisOutcome;
use super::serialization::{
    format_scientific_f64, read_json_artifact, write_json_artifact, write_text_artifact,
};
use crate::domain::{
    ActivationEnergyResult, ComputeResult, DiffusionError, DiffusionEstimate, DiffusionResult,
    DiscardWindow, MsdCurve, MsdMode, timestep_of,
};
use globset::Glob;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub const RECORD_EXTENSION: &str = "json";
pub const SUMMARY_EXTENSION: &str = "dat";

/// One analysis run, with field names and units stable across versions so
/// stored records can be re-analysed later.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiffusionRecord {
    /// K.
    pub temperature: Option<f64>,
    /// cm²/s.
    pub diffusion_coefficient: f64,
    #[serde(default)]
    pub diffusion_coefficient_std_error: Option<f64>,
    pub msd_type: MsdMode,
    pub diffusing_atom_type: String,
    pub data_source: String,
    /// ps.
    pub time: Vec<f64>,
    /// ps.
    pub total_runtime: f64,
    /// ps.
    pub timestep: f64,
    /// ps of trajectory excluded at the start of the fit.
    pub discard_initial_timesteps: f64,
    /// Frames excluded at the start of the fit.
    pub discard_init_steps: usize,
    #[serde(default)]
    pub discard_final_steps: Option<usize>,
    pub fit_slope: f64,
    pub fit_intercept: f64,
    /// Å².
    pub mean_squared_displacement: Vec<f64>,
    /// Å², `[frame][atom]`.
    #[serde(default)]
    pub mean_squared_displacement_individual_atoms: Option<Vec<Vec<f64>>>,
    #[serde(default)]
    pub standard_deviation_mean_squared_displacement: Option<Vec<f64>>,
    #[serde(default)]
    pub atom_indices: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordPaths {
    pub record: PathBuf,
    pub summary: PathBuf,
}

impl DiffusionRecord {
    pub fn from_outcome(outcome: &AnalysisOutcome) -> Self {
        let mut record = Self {
            temperature: outcome.temperature,
            diffusion_coefficient: 0.0,
            diffusion_coefficient_std_error: None,
            msd_type: outcome.curve.mode(),
            diffusing_atom_type: outcome.atom_type.clone(),
            data_source: outcome.source.label().to_string(),
            time: outcome.time.clone(),
            total_runtime: outcome.time.last().copied().unwrap_or(0.0),
            timestep: timestep_of(&outcome.time).unwrap_or(0.0),
            discard_initial_timesteps: 0.0,
            discard_init_steps: 0,
            discard_final_steps: None,
            fit_slope: 0.0,
            fit_intercept: 0.0,
            mean_squared_displacement: outcome.curve.mean().to_vec(),
            mean_squared_displacement_individual_atoms: outcome.curve.per_atom_rows(),
            standard_deviation_mean_squared_displacement: outcome.curve.std().map(<[f64]>::to_vec),
            atom_indices: outcome.atom_indices.clone(),
        };
        record.apply_estimate(&outcome.estimate);
        record
    }

    fn apply_estimate(&mut self, estimate: &DiffusionEstimate) {
        self.diffusion_coefficient = estimate.diffusion_coefficient;
        self.diffusion_coefficient_std_error = estimate.standard_error;
        self.discard_init_steps = estimate.discard_init_frames;
        self.discard_initial_timesteps = self.timestep * estimate.discard_init_frames as f64;
        self.discard_final_steps = estimate.discard_final_frames;
        self.fit_slope = estimate.slope;
        self.fit_intercept = estimate.intercept;
    }

    /// Rebuilds the MSD curve for re-analysis.
    pub fn msd_curve(&self) -> ComputeResult<MsdCurve> {
        if self.time.len() != self.mean_squared_displacement.len() {
            return Err(DiffusionError::data_precondition(
                "DATA.RECORD_SHAPE",
                format!(
                    "record has {} time values but {} MSD values",
                    self.time.len(),
                    self.mean_squared_displacement.len()
                ),
            ));
        }
        MsdCurve::from_rows(
            self.msd_type,
            self.mean_squared_displacement.clone(),
            self.mean_squared_displacement_individual_atoms.as_deref(),
            self.standard_deviation_mean_squared_displacement.clone(),
        )
    }

    /// Re-fits the stored mean MSD over a new discard window.
    pub fn recompute(&self, window: DiscardWindow) -> ComputeResult<(DiffusionEstimate, Self)> {
        let estimate = fit_diffusion(&self.time, &self.mean_squared_displacement, window)?;
        if let Some(reason) = estimate.confidence.reason() {
            warn!(
                retained = estimate.retained_points,
                "low-confidence diffusion fit: {}",
                reason
            );
        }
        let mut updated = self.clone();
        updated.apply_estimate(&estimate);
        info!(
            previous = self.diffusion_coefficient,
            recomputed = updated.diffusion_coefficient,
            discard_init_frames = estimate.discard_init_frames,
            "recomputed diffusion coefficient"
        );
        Ok((estimate, updated))
    }

    pub fn summary_text(&self) -> String {
        let temperature = self
            .temperature
            .map(|value| format!("{:.0}K", value))
            .unwrap_or_else(|| "unknown".to_string());
        let mut lines = vec![
            format!("Data source: {}", self.data_source),
            format!("Temperature: {}", temperature),
            format!("Total runtime: {:.5} ps", self.total_runtime),
            format!("Timestep: {:.5} ps", self.timestep),
            format!(
                "Initial {:.5} ps has been discarded",
                self.discard_initial_timesteps
            ),
            format!("Diffusing atoms type: {}", self.diffusing_atom_type),
            format!("MSD type: {}", self.msd_type),
            format!(
                "Diffusion coefficient: {} cm^2/s",
                format_scientific_f64(self.diffusion_coefficient, 5)
            ),
        ];
        lines.push(match self.diffusion_coefficient_std_error {
            Some(error) => format!(
                "Standard error: {} cm^2/s",
                format_scientific_f64(error, 5)
            ),
            None => "Standard error: unavailable (low-confidence fit)".to_string(),
        });
        lines.join("\n")
    }

    /// Writes `<rootname>.json` and `<rootname>.dat` into `output_dir`,
    /// creating the directory when needed.
    pub fn write(&self, output_dir: &Path, rootname: &str) -> DiffusionResult<RecordPaths> {
        fs::create_dir_all(output_dir).map_err(|source| {
            DiffusionError::io_system(
                "IO.OUTPUT_DIRECTORY",
                format!(
                    "failed to create output directory '{}': {}",
                    output_dir.display(),
                    source
                ),
            )
        })?;

        let paths = RecordPaths {
            record: output_dir.join(format!("{}.{}", rootname, RECORD_EXTENSION)),
            summary: output_dir.join(format!("{}.{}", rootname, SUMMARY_EXTENSION)),
        };
        write_json_artifact(&paths.record, self)?;
        write_text_artifact(&paths.summary, &self.summary_text()).map_err(|source| {
            DiffusionError::io_system(
                "IO.ARTIFACT_WRITE",
                format!("failed to write '{}': {}", paths.summary.display(), source),
            )
        })?;
        debug!(record = %paths.record.display(), "wrote diffusion record");
        Ok(paths)
    }

    pub fn read(path: &Path) -> DiffusionResult<Self> {
        read_json_artifact(path)
    }
}

/// Files directly inside `dir` whose name matches `pattern`, sorted by path.
pub fn collect_record_paths(dir: &Path, pattern: &str) -> DiffusionResult<Vec<PathBuf>> {
    let matcher = Glob::new(pattern)
        .map_err(|source| {
            DiffusionError::configuration(
                "INPUT.RECORD_PATTERN",
                format!("invalid record pattern '{}': {}", pattern, source),
            )
        })?
        .compile_matcher();

    let entries = fs::read_dir(dir).map_err(|source| {
        DiffusionError::io_system(
            "IO.RECORD_DIRECTORY",
            format!("failed to list '{}': {}", dir.display(), source),
        )
    })?;

    let mut paths = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| {
            DiffusionError::io_system(
                "IO.RECORD_DIRECTORY",
                format!("failed to list '{}': {}", dir.display(), source),
            )
        })?;
        let path = entry.path();
        if path.is_file() && matcher.is_match(entry.file_name()) {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}

/// Arrhenius fit over stored records; every record must carry a temperature.
pub fn arrhenius_from_records(
    records: &[DiffusionRecord],
) -> ComputeResult<ActivationEnergyResult> {
    let mut temperatures = Vec::with_capacity(records.len());
    let mut coefficients = Vec::with_capacity(records.len());
    for (index, record) in records.iter().enumerate() {
        let temperature = record.temperature.ok_or_else(|| {
            DiffusionError::data_precondition(
                "DATA.RECORD_TEMPERATURE",
                format!(
                    "record {} ({}) has no temperature",
                    index, record.data_source
                ),
            )
        })?;
        temperatures.push(temperature);
        coefficients.push(record.diffusion_coefficient);
    }
    fit_arrhenius(&temperatures, &coefficients)
}
