pub mod errors;
mod trajectory;

pub use errors::{
    ComputeResult, DiffusionError, DiffusionErrorCategory, DiffusionResult, ParserResult,
};
pub use trajectory::{MsdCurve, TrajectoryBuffer, timestep_of};

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Boltzmann constant in eV/K (CODATA 2018).
pub const BOLTZMANN_EV_PER_K: f64 = 8.617_333_262e-5;

/// Å²/ps to cm²/s.
pub const ANGSTROM2_PER_PS_TO_CM2_PER_S: f64 = 1.0e-4;

/// Spatial dimensionality assumed by the Einstein relation `MSD = 2 d D t`.
pub const DIFFUSION_DIMENSIONS: f64 = 3.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MsdMode {
    /// Displacement from a single reference frame.
    #[default]
    Bare,
    /// Average over every pair of frames separated by the same lag.
    TimeSliced,
}

impl MsdMode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Bare => "bare",
            Self::TimeSliced => "timesliced",
        }
    }
}

impl Display for MsdMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str((*self).as_str())
    }
}

impl FromStr for MsdMode {
    type Err = DiffusionError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "bare" => Ok(Self::Bare),
            "timesliced" => Ok(Self::TimeSliced),
            other => Err(DiffusionError::configuration(
                "INPUT.MSD_MODE",
                format!("msd mode must be 'bare' or 'timesliced', got '{}'", other),
            )),
        }
    }
}

/// Where a trajectory or MSD series came from. Only used to pick the input
/// adapter and to label results; the numerical pipeline never branches on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataSource {
    LammpsThermo,
    LammpsDump,
    JsonTrajectory,
}

impl DataSource {
    pub const fn label(self) -> &'static str {
        match self {
            Self::LammpsThermo => "LAMMPS thermo data",
            Self::LammpsDump => "LAMMPS .dump file",
            Self::JsonTrajectory => "JSON trajectory",
        }
    }

    /// Whether the source carries atomic positions. Sources without positions
    /// supply an MSD precomputed by the MD engine and skip the MSD engine.
    pub const fn provides_positions(self) -> bool {
        !matches!(self, Self::LammpsThermo)
    }
}

impl Display for DataSource {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str((*self).label())
    }
}

/// Leading portion of the series excluded from a fit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscardInit {
    Frames(usize),
    /// Resolved to the first frame whose time is not less than this value.
    TimePs(f64),
}

impl Default for DiscardInit {
    fn default() -> Self {
        Self::Frames(0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DiscardWindow {
    #[serde(default)]
    pub init: DiscardInit,
    #[serde(default)]
    pub final_frames: Option<usize>,
}

impl DiscardWindow {
    pub fn frames(init: usize, final_frames: Option<usize>) -> Self {
        Self {
            init: DiscardInit::Frames(init),
            final_frames,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum FitConfidence {
    #[default]
    Nominal,
    LowConfidence(String),
}

impl FitConfidence {
    pub fn low(reason: impl Into<String>) -> Self {
        Self::LowConfidence(reason.into())
    }

    pub fn is_nominal(&self) -> bool {
        matches!(self, Self::Nominal)
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Nominal => None,
            Self::LowConfidence(reason) => Some(reason),
        }
    }
}

/// Linear fit of mean MSD against time over one retained window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiffusionEstimate {
    /// Å²/ps.
    pub slope: f64,
    /// Å².
    pub intercept: f64,
    /// cm²/s.
    pub diffusion_coefficient: f64,
    /// cm²/s; absent when the fit has no residual degrees of freedom.
    pub standard_error: Option<f64>,
    pub discard_init_frames: usize,
    pub discard_final_frames: Option<usize>,
    pub retained_points: usize,
    pub confidence: FitConfidence,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct JumpEvent {
    /// Column of the per-atom MSD, i.e. position within the atom subset.
    pub atom_index: usize,
    pub start_frame: usize,
    pub end_frame: usize,
    pub peak_msd: f64,
}

impl JumpEvent {
    /// Frames covered by the event, both ends included.
    pub fn frame_span(&self) -> usize {
        self.end_frame - self.start_frame + 1
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct JumpReport {
    /// One list per atom, in atom-subset order.
    pub events: Vec<Vec<JumpEvent>>,
    /// Atoms with at least one event, ascending.
    pub jumping_atoms: Vec<usize>,
}

impl JumpReport {
    pub fn total_events(&self) -> usize {
        self.events.iter().map(Vec::len).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowConvergencePoint {
    pub window_frames: usize,
    pub window_width_ps: f64,
    pub window_count: usize,
    pub mean_diffusion: f64,
    /// Population deviation across windows; absent for a single window.
    pub std_diffusion: Option<f64>,
    pub confidence: FitConfidence,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivationEnergyResult {
    pub activation_energy_ev: f64,
    /// cm²/s, `D0` in `D = D0 exp(-Ea / kB T)`.
    pub prefactor: f64,
    pub std_error_ev: Option<f64>,
    pub point_count: usize,
    pub confidence: FitConfidence,
}

#[cfg(test)]
mod tests {
    use super::{
        DataSource, DiffusionErrorCategory, DiscardInit, DiscardWindow, FitConfidence, MsdMode,
    };

    #[test]
    fn msd_mode_parses_known_names_and_rejects_others() {
        assert_eq!("bare".parse::<MsdMode>().expect("bare"), MsdMode::Bare);
        assert_eq!(
            "timesliced".parse::<MsdMode>().expect("timesliced"),
            MsdMode::TimeSliced
        );

        let error = "sliced".parse::<MsdMode>().expect_err("unknown mode");
        assert_eq!(error.category(), DiffusionErrorCategory::ConfigurationError);
        assert_eq!(error.placeholder(), "INPUT.MSD_MODE");
        assert!(error.message().contains("'sliced'"));
    }

    #[test]
    fn msd_mode_serializes_as_lowercase_name() {
        let encoded = serde_json::to_string(&MsdMode::TimeSliced).expect("serialize");
        assert_eq!(encoded, "\"timesliced\"");
        assert!(serde_json::from_str::<MsdMode>("\"sliced\"").is_err());
    }

    #[test]
    fn thermo_source_bypasses_position_processing() {
        assert!(!DataSource::LammpsThermo.provides_positions());
        assert!(DataSource::LammpsDump.provides_positions());
        assert_eq!(DataSource::LammpsThermo.to_string(), "LAMMPS thermo data");
    }

    #[test]
    fn discard_window_defaults_to_no_discard() {
        let window = DiscardWindow::default();
        assert_eq!(window.init, DiscardInit::Frames(0));
        assert_eq!(window.final_frames, None);

        let parsed: DiscardWindow =
            serde_json::from_str(r#"{ "init": { "time_ps": 2.5 } }"#).expect("parse window");
        assert_eq!(
            parsed,
            DiscardWindow {
                init: DiscardInit::TimePs(2.5),
                final_frames: None,
            }
        );
    }

    #[test]
    fn low_confidence_carries_reason() {
        let confidence = FitConfidence::low("single window");
        assert!(!confidence.is_nominal());
        assert_eq!(confidence.reason(), Some("single window"));
        assert_eq!(FitConfidence::Nominal.reason(), None);
    }
}
