use super::CliError;
use anyhow::Context;
use diffusion_core::domain::{DiscardInit, DiscardWindow, FitConfidence, MsdMode};
use diffusion_core::modules::{AnalysisSettings, DiffusionRecord};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Discard-window flags shared by `msd` and `recompute`.
#[derive(clap::Args, Debug, Default)]
pub(super) struct DiscardFlags {
    /// Frames excluded from the start of the fit
    #[arg(long, conflicts_with = "discard_init_time")]
    pub(super) discard_init_frames: Option<usize>,

    /// Time (ps) excluded from the start of the fit; the fit starts at the first frame not before it
    #[arg(long)]
    pub(super) discard_init_time: Option<f64>,

    /// Frames excluded from the end of the fit
    #[arg(long)]
    pub(super) discard_final: Option<usize>,
}

impl DiscardFlags {
    pub(super) fn discard_init(&self) -> Option<DiscardInit> {
        match (self.discard_init_frames, self.discard_init_time) {
            (Some(frames), _) => Some(DiscardInit::Frames(frames)),
            (None, Some(time)) => Some(DiscardInit::TimePs(time)),
            (None, None) => None,
        }
    }

    /// Window with unset flags falling back to `base`.
    pub(super) fn window_over(&self, base: DiscardWindow) -> DiscardWindow {
        DiscardWindow {
            init: self.discard_init().unwrap_or(base.init),
            final_frames: self.discard_final.or(base.final_frames),
        }
    }
}

/// Settings from `--config`, or the defaults when no file is given.
pub(super) fn load_settings(config: Option<&Path>) -> Result<AnalysisSettings, CliError> {
    let Some(path) = config else {
        return Ok(AnalysisSettings::default());
    };
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read settings file '{}'", path.display()))?;
    Ok(AnalysisSettings::from_json_str(&content)?)
}

pub(super) fn parse_mode(mode: &str) -> Result<MsdMode, CliError> {
    Ok(mode.parse::<MsdMode>()?)
}

pub(super) fn read_record(path: &Path) -> Result<DiffusionRecord, CliError> {
    Ok(DiffusionRecord::read(path)?)
}

/// Default rootname and directory for rewriting a record in place.
pub(super) fn record_location(path: &Path) -> (PathBuf, String) {
    let directory = path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let rootname = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("MsdData")
        .to_string();
    (directory, rootname)
}

pub(super) fn print_json<T: Serialize>(value: &T) -> Result<(), CliError> {
    let rendered =
        serde_json::to_string_pretty(value).context("failed to render JSON output")?;
    println!("{}", rendered);
    Ok(())
}

pub(super) fn format_optional(value: Option<f64>) -> String {
    value
        .map(|value| format!("{:.5e}", value))
        .unwrap_or_else(|| "n/a".to_string())
}

pub(super) fn confidence_note(confidence: &FitConfidence) -> String {
    confidence
        .reason()
        .map(|reason| format!("  [low confidence: {}]", reason))
        .unwrap_or_default()
}
