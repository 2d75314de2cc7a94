pub mod arrhenius;
pub mod convergence;
pub mod fit;
pub mod jumps;
pub mod msd;
pub mod pipeline;
pub mod record;
pub mod serialization;

pub use arrhenius::fit_arrhenius;
pub use convergence::diffusion_vs_window;
pub use fit::{fit_diffusion, resolve_discard_init, slope_to_diffusion};
pub use jumps::{JumpDetectorConfig, detect_jumps};
pub use msd::compute_msd;
pub use pipeline::{
    AnalysisOutcome, AnalysisSettings, analyze_input, analyze_precomputed, analyze_trajectory,
    select_atoms,
};
pub use record::{DiffusionRecord, RecordPaths, arrhenius_from_records, collect_record_paths};
