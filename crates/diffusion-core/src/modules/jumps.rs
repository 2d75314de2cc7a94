use crate::domain::{ComputeResult, DiffusionError, JumpEvent, JumpReport, MsdCurve};
use crate::numerics::stable_sum;
use serde::{Deserialize, Serialize};
use tracing::info;

const DEFAULT_JUMP_THRESHOLD: f64 = 4.0;
const DEFAULT_MIN_EXCURSION: f64 = 2.0;
const DEFAULT_BASELINE_LOOKBACK: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JumpDetectorConfig {
    /// Å²; a frame must exceed this MSD to be a candidate.
    pub threshold: f64,
    /// Å²; minimum distance from the rolling baseline.
    pub min_excursion: f64,
    /// Number of preceding frames averaged into the baseline.
    pub lookback: usize,
}

impl Default for JumpDetectorConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_JUMP_THRESHOLD,
            min_excursion: DEFAULT_MIN_EXCURSION,
            lookback: DEFAULT_BASELINE_LOOKBACK,
        }
    }
}

impl JumpDetectorConfig {
    pub fn validate(&self) -> ComputeResult<()> {
        if !self.threshold.is_finite() || !self.min_excursion.is_finite() {
            return Err(DiffusionError::configuration(
                "INPUT.JUMP_THRESHOLD",
                format!(
                    "jump threshold and minimum excursion must be finite, got {} and {}",
                    self.threshold, self.min_excursion
                ),
            ));
        }
        if self.lookback == 0 {
            return Err(DiffusionError::configuration(
                "INPUT.JUMP_LOOKBACK",
                "jump baseline lookback must be at least one frame",
            ));
        }
        Ok(())
    }
}

/// Scans every atom's MSD for sustained upward excursions.
///
/// Frame `i` is a candidate when its MSD exceeds `threshold` and differs from
/// the mean of the up to `lookback` preceding frames by more than
/// `min_excursion`. Frame 0 has no baseline and never qualifies. Runs of
/// consecutive candidates form events; single-frame runs are dropped as noise.
pub fn detect_jumps(curve: &MsdCurve, config: &JumpDetectorConfig) -> ComputeResult<JumpReport> {
    config.validate()?;
    let atom_count = curve.atom_count().ok_or_else(|| {
        DiffusionError::data_precondition(
            "DATA.JUMP_NO_PER_ATOM_MSD",
            "jump detection needs per-atom MSD, which this source does not provide",
        )
    })?;

    let mut report = JumpReport::default();
    for atom in 0..atom_count {
        let series = curve.atom_series(atom).unwrap_or_default();
        let events = detect_series_jumps(atom, &series, config);
        if !events.is_empty() {
            report.jumping_atoms.push(atom);
        }
        report.events.push(events);
    }

    info!(
        atoms = atom_count,
        jumping_atoms = report.jumping_atoms.len(),
        events = report.total_events(),
        "jump detection finished"
    );
    Ok(report)
}

pub fn detect_series_jumps(
    atom_index: usize,
    series: &[f64],
    config: &JumpDetectorConfig,
) -> Vec<JumpEvent> {
    let candidates = candidate_frames(series, config);
    consecutive_blocks(&candidates)
        .into_iter()
        .map(|(start_frame, end_frame)| JumpEvent {
            atom_index,
            start_frame,
            end_frame,
            peak_msd: series[start_frame..=end_frame]
                .iter()
                .copied()
                .fold(f64::NEG_INFINITY, f64::max),
        })
        .collect()
}

fn candidate_frames(series: &[f64], config: &JumpDetectorConfig) -> Vec<usize> {
    (1..series.len())
        .filter(|&frame| {
            let value = series[frame];
            let window = &series[frame.saturating_sub(config.lookback)..frame];
            let baseline = stable_sum(window) / window.len() as f64;
            value > config.threshold && (value - baseline).abs() > config.min_excursion
        })
        .collect()
}

/// Groups ascending frame indices into `(first, last)` runs of consecutive
/// integers, keeping only runs of at least two frames.
fn consecutive_blocks(frames: &[usize]) -> Vec<(usize, usize)> {
    let mut blocks = Vec::new();
    let Some(&first) = frames.first() else {
        return blocks;
    };

    let mut start = first;
    let mut previous = first;
    for &frame in &frames[1..] {
        if frame != previous + 1 {
            if previous > start {
                blocks.push((start, previous));
            }
            start = frame;
        }
        previous = frame;
    }
    if previous > start {
        blocks.push((start, previous));
    }

    blocks
}

#[cfg(test)]
mod tests {
    use super::{JumpDetectorConfig, consecutive_blocks, detect_jumps, detect_series_jumps};
    use crate::domain::{DiffusionErrorCategory, MsdCurve, MsdMode};
    use faer::Mat;

    #[test]
    fn blocks_drop_isolated_frames() {
        assert_eq!(
            consecutive_blocks(&[1, 3, 4, 5, 9, 11, 12]),
            vec![(3, 5), (11, 12)]
        );
        assert!(consecutive_blocks(&[]).is_empty());
        assert!(consecutive_blocks(&[7]).is_empty());
    }

    #[test]
    fn sustained_step_is_one_event_and_spike_is_ignored() {
        let mut series = vec![0.1; 300];
        for value in &mut series[100..106] {
            *value = 10.0;
        }
        series[200] = 10.0;

        let events = detect_series_jumps(3, &series, &JumpDetectorConfig::default());
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].atom_index, 3);
        assert_eq!(events[0].start_frame, 100);
        assert_eq!(events[0].end_frame, 105);
        assert_eq!(events[0].frame_span(), 6);
        assert_eq!(events[0].peak_msd, 10.0);
    }

    #[test]
    fn short_lookback_baseline_absorbs_long_plateaus() {
        let mut series = vec![0.0; 40];
        for value in &mut series[10..] {
            *value = 10.0;
        }
        let config = JumpDetectorConfig {
            lookback: 3,
            ..JumpDetectorConfig::default()
        };

        let events = detect_series_jumps(0, &series, &config);
        // Baselines over frames 10..=12 still include pre-jump zeros.
        assert_eq!(events.len(), 1);
        assert_eq!((events[0].start_frame, events[0].end_frame), (10, 12));
    }

    #[test]
    fn report_lists_jumping_atoms_in_subset_order() {
        let mut per_atom = Mat::<f64>::zeros(20, 3);
        for frame in 5..9 {
            per_atom[(frame, 2)] = 12.0;
        }
        let curve = MsdCurve::from_per_atom(MsdMode::Bare, per_atom).expect("curve");

        let report = detect_jumps(&curve, &JumpDetectorConfig::default()).expect("jumps");
        assert_eq!(report.events.len(), 3);
        assert_eq!(report.jumping_atoms, vec![2]);
        assert_eq!(report.total_events(), 1);
    }

    #[test]
    fn mean_only_curve_cannot_be_scanned() {
        let curve = MsdCurve::from_mean(MsdMode::Bare, vec![0.0; 5]).expect("curve");
        let error = detect_jumps(&curve, &JumpDetectorConfig::default()).expect_err("no atoms");
        assert_eq!(error.category(), DiffusionErrorCategory::DataPreconditionError);
    }

    #[test]
    fn zero_lookback_is_a_configuration_error() {
        let config = JumpDetectorConfig {
            lookback: 0,
            ..JumpDetectorConfig::default()
        };
        assert_eq!(
            config.validate().expect_err("zero lookback").placeholder(),
            "INPUT.JUMP_LOOKBACK"
        );
    }
}
