//! End-to-end analysis of one input: species selection, MSD, and the
//! diffusion fit, with the settings that drive them.

use super::fit::fit_diffusion;
use super::jumps::JumpDetectorConfig;
use super::msd::compute_msd;
use crate::domain::{
    ComputeResult, DataSource, DiffusionError, DiffusionEstimate, DiffusionResult, DiscardInit,
    DiscardWindow, MsdCurve, MsdMode, TrajectoryBuffer,
};
use crate::io::{InputData, PrecomputedMsd, Trajectory};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

pub const ALL_ATOMS: &str = "all";

/// Atom-type label for MSD computed by the MD engine, whose atom group is
/// chosen in the engine's own input file.
pub const PRECOMPUTED_ATOM_TYPE: &str = "See lammps input file";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnalysisSettings {
    pub msd_mode: MsdMode,
    pub discard_init: DiscardInit,
    pub discard_final: Option<usize>,
    /// Element symbol of the diffusing species, or `all`.
    pub atom_type: String,
    /// K; overrides the temperature reported by the input, if any.
    pub temperature: Option<f64>,
    pub jumps: JumpDetectorConfig,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            msd_mode: MsdMode::Bare,
            discard_init: DiscardInit::Frames(0),
            discard_final: None,
            atom_type: ALL_ATOMS.to_string(),
            temperature: None,
            jumps: JumpDetectorConfig::default(),
        }
    }
}

impl AnalysisSettings {
    pub fn from_json_str(content: &str) -> DiffusionResult<Self> {
        let settings: Self = serde_json::from_str(content).map_err(|source| {
            DiffusionError::configuration(
                "INPUT.SETTINGS",
                format!("invalid analysis settings: {}", source),
            )
        })?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> DiffusionResult<()> {
        if self.atom_type.trim().is_empty() {
            return Err(DiffusionError::configuration(
                "INPUT.ATOM_TYPE",
                "diffusing atom type must be an element symbol or 'all'",
            ));
        }
        if let DiscardInit::TimePs(threshold) = self.discard_init {
            if !threshold.is_finite() {
                return Err(DiffusionError::configuration(
                    "INPUT.DISCARD_INIT_TIME",
                    format!("discard-init time must be finite, got {}", threshold),
                ));
            }
        }
        if let Some(temperature) = self.temperature {
            if !(temperature.is_finite() && temperature > 0.0) {
                return Err(DiffusionError::configuration(
                    "INPUT.TEMPERATURE",
                    format!("temperature must be positive, got {}", temperature),
                ));
            }
        }
        self.jumps.validate()
    }

    pub fn discard_window(&self) -> DiscardWindow {
        DiscardWindow {
            init: self.discard_init,
            final_frames: self.discard_final,
        }
    }
}

/// Everything one analysis run produces; the result record is built from it.
#[derive(Debug, Clone)]
pub struct AnalysisOutcome {
    pub source: DataSource,
    pub atom_type: String,
    pub atom_indices: Vec<usize>,
    pub temperature: Option<f64>,
    pub time: Vec<f64>,
    pub curve: MsdCurve,
    pub estimate: DiffusionEstimate,
}

/// Indices of the atoms whose symbol equals `atom_type` (case-sensitive), in
/// configuration order; `all` selects every atom.
pub fn select_atoms(symbols: &[String], atom_type: &str) -> ComputeResult<Vec<usize>> {
    if atom_type == ALL_ATOMS {
        return Ok((0..symbols.len()).collect());
    }

    let selected: Vec<usize> = symbols
        .iter()
        .enumerate()
        .filter(|(_, symbol)| symbol.as_str() == atom_type)
        .map(|(index, _)| index)
        .collect();
    if selected.is_empty() {
        let mut available: Vec<&str> = symbols.iter().map(String::as_str).collect();
        available.sort_unstable();
        available.dedup();
        return Err(DiffusionError::data_precondition(
            "DATA.ATOM_TYPE_NOT_FOUND",
            format!(
                "atom type '{}' is not present; available species: {}",
                atom_type,
                available.join(", ")
            ),
        ));
    }
    Ok(selected)
}

pub fn analyze_input(
    input: &InputData,
    source: DataSource,
    settings: &AnalysisSettings,
) -> ComputeResult<AnalysisOutcome> {
    match input {
        InputData::Positions(trajectory) => analyze_trajectory(trajectory, source, settings),
        InputData::Precomputed(series) => analyze_precomputed(series, source, settings),
    }
}

pub fn analyze_trajectory(
    trajectory: &Trajectory,
    source: DataSource,
    settings: &AnalysisSettings,
) -> ComputeResult<AnalysisOutcome> {
    settings.validate()?;
    let atom_indices = select_atoms(&trajectory.symbols, &settings.atom_type)?;
    info!(
        source = %source,
        atom_type = %settings.atom_type,
        selected = atom_indices.len(),
        "selected diffusing atoms"
    );

    let buffer = TrajectoryBuffer::from_positions(
        trajectory.time.clone(),
        &trajectory.positions,
        atom_indices.clone(),
        0,
    )?;
    let curve = compute_msd(&buffer, settings.msd_mode)?;
    let estimate = fit_diffusion(buffer.time(), curve.mean(), settings.discard_window())?;
    log_estimate(&estimate);

    Ok(AnalysisOutcome {
        source,
        atom_type: settings.atom_type.clone(),
        atom_indices,
        temperature: settings.temperature.or(trajectory.temperature),
        time: buffer.time().to_vec(),
        curve,
        estimate,
    })
}

/// Fits an MSD series computed by the MD engine itself; the MSD engine is
/// not involved and no per-atom breakdown exists.
pub fn analyze_precomputed(
    series: &PrecomputedMsd,
    source: DataSource,
    settings: &AnalysisSettings,
) -> ComputeResult<AnalysisOutcome> {
    settings.validate()?;
    info!(
        source = %source,
        frames = series.time.len(),
        "fitting MSD supplied by the MD engine"
    );

    let curve = MsdCurve::from_mean(settings.msd_mode, series.msd_mean.clone())?;
    let estimate = fit_diffusion(&series.time, curve.mean(), settings.discard_window())?;
    log_estimate(&estimate);

    let atom_type = if settings.atom_type == ALL_ATOMS {
        PRECOMPUTED_ATOM_TYPE.to_string()
    } else {
        settings.atom_type.clone()
    };
    Ok(AnalysisOutcome {
        source,
        atom_type,
        atom_indices: Vec::new(),
        temperature: settings.temperature.or(series.temperature),
        time: series.time.clone(),
        curve,
        estimate,
    })
}

fn log_estimate(estimate: &DiffusionEstimate) {
    if let Some(reason) = estimate.confidence.reason() {
        warn!(retained = estimate.retained_points, "low-confidence diffusion fit: {}", reason);
    }
    info!(
        diffusion_cm2_s = estimate.diffusion_coefficient,
        std_error = ?estimate.standard_error,
        retained = estimate.retained_points,
        "diffusion coefficient extracted"
    );
}

#[cfg(test)]
mod tests {
    use super::{
        AnalysisSettings, PRECOMPUTED_ATOM_TYPE, analyze_precomputed, analyze_trajectory,
        select_atoms,
    };
    use crate::domain::{DataSource, DiffusionErrorCategory, DiscardInit, MsdMode};
    use crate::io::{PrecomputedMsd, Trajectory};

    fn symbols(list: &[&str]) -> Vec<String> {
        list.iter().map(|symbol| symbol.to_string()).collect()
    }

    #[test]
    fn settings_defaults_fill_missing_fields() {
        let settings = AnalysisSettings::from_json_str(r#"{"msd_mode": "timesliced"}"#)
            .expect("settings should parse");
        assert_eq!(settings.msd_mode, MsdMode::TimeSliced);
        assert_eq!(settings.discard_init, DiscardInit::Frames(0));
        assert_eq!(settings.atom_type, "all");
        assert_eq!(settings.jumps.lookback, 200);

        let timed = AnalysisSettings::from_json_str(r#"{"discard_init": {"time_ps": 2.5}}"#)
            .expect("time discard should parse");
        assert_eq!(timed.discard_init, DiscardInit::TimePs(2.5));
    }

    #[test]
    fn unknown_mode_is_a_configuration_error() {
        let error = AnalysisSettings::from_json_str(r#"{"msd_mode": "sliding"}"#)
            .expect_err("mode should be rejected");
        assert_eq!(error.category(), DiffusionErrorCategory::ConfigurationError);
        assert_eq!(error.exit_code(), 2);
    }

    #[test]
    fn species_selection_preserves_configuration_order() {
        let list = symbols(&["Li", "O", "Li", "P", "Li"]);
        assert_eq!(select_atoms(&list, "Li").expect("Li"), vec![0, 2, 4]);
        assert_eq!(select_atoms(&list, "all").expect("all").len(), 5);

        let error = select_atoms(&list, "li").expect_err("case-sensitive");
        assert_eq!(error.placeholder(), "DATA.ATOM_TYPE_NOT_FOUND");
        assert!(error.message().contains("Li, O, P"));
    }

    #[test]
    fn trajectory_analysis_fits_selected_species_only() {
        // Li moves 1 Å per frame, O stays put.
        let time: Vec<f64> = (0..10).map(|i| i as f64).collect();
        let positions = (0..10)
            .map(|frame| vec![[frame as f64, 0.0, 0.0], [5.0, 5.0, 5.0]])
            .collect();
        let trajectory = Trajectory {
            time,
            symbols: symbols(&["Li", "O"]),
            positions,
            temperature: None,
        };
        let settings = AnalysisSettings {
            atom_type: "O".to_string(),
            temperature: Some(600.0),
            ..AnalysisSettings::default()
        };

        let outcome = analyze_trajectory(&trajectory, DataSource::JsonTrajectory, &settings)
            .expect("analysis");
        assert_eq!(outcome.atom_indices, vec![1]);
        assert_eq!(outcome.estimate.diffusion_coefficient, 0.0);
        assert_eq!(outcome.temperature, Some(600.0));
        assert_eq!(outcome.curve.atom_count(), Some(1));
    }

    #[test]
    fn precomputed_series_bypasses_msd_engine() {
        let time: Vec<f64> = (0..20).map(|i| i as f64 * 0.5).collect();
        let series = PrecomputedMsd {
            msd_mean: time.iter().map(|t| 6.0 * t).collect(),
            time,
            temperature: Some(900.0),
        };

        let outcome =
            analyze_precomputed(&series, DataSource::LammpsThermo, &AnalysisSettings::default())
                .expect("analysis");
        assert!((outcome.estimate.diffusion_coefficient - 1.0e-4).abs() < 1.0e-15);
        assert_eq!(outcome.curve.atom_count(), None);
        assert_eq!(outcome.temperature, Some(900.0));
        assert!(outcome.atom_indices.is_empty());
        assert_eq!(outcome.atom_type, PRECOMPUTED_ATOM_TYPE);

        let named = AnalysisSettings {
            atom_type: "Li".to_string(),
            ..AnalysisSettings::default()
        };
        let outcome =
            analyze_precomputed(&series, DataSource::LammpsThermo, &named).expect("analysis");
        assert_eq!(outcome.atom_type, "Li");
    }
}
