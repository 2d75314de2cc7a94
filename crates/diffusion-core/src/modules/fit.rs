use crate::domain::{
    ANGSTROM2_PER_PS_TO_CM2_PER_S, ComputeResult, DIFFUSION_DIMENSIONS, DiffusionError,
    DiffusionEstimate, DiscardInit, DiscardWindow, FitConfidence,
};
use crate::numerics::{FitError, linear_fit};
use tracing::debug;

/// Converts an MSD slope in Å²/ps to a diffusion coefficient in cm²/s
/// through the 3D Einstein relation `MSD = 6 D t`.
pub fn slope_to_diffusion(slope: f64) -> f64 {
    slope * ANGSTROM2_PER_PS_TO_CM2_PER_S / (2.0 * DIFFUSION_DIMENSIONS)
}

/// Resolves a discard-init request to a frame index.
///
/// Time requests map to the first frame with `time >= threshold`; a threshold
/// beyond the last frame would discard the whole series and is rejected.
pub fn resolve_discard_init(time: &[f64], init: DiscardInit) -> ComputeResult<usize> {
    match init {
        DiscardInit::Frames(frames) => Ok(frames),
        DiscardInit::TimePs(threshold) => {
            if !threshold.is_finite() {
                return Err(DiffusionError::configuration(
                    "INPUT.DISCARD_INIT_TIME",
                    format!("discard-init time must be finite, got {}", threshold),
                ));
            }
            let index = time.partition_point(|t| *t < threshold);
            if index == time.len() {
                return Err(DiffusionError::data_precondition(
                    "DATA.DISCARD_INIT_TIME",
                    format!(
                        "discard-init time {} ps is beyond the last frame at {} ps",
                        threshold,
                        time.last().copied().unwrap_or(0.0)
                    ),
                ));
            }
            Ok(index)
        }
    }
}

/// Least-squares fit of the mean MSD against time over the retained window
/// `[discard_init, len - discard_final)`.
pub fn fit_diffusion(
    time: &[f64],
    msd_mean: &[f64],
    window: DiscardWindow,
) -> ComputeResult<DiffusionEstimate> {
    if time.len() != msd_mean.len() {
        return Err(DiffusionError::data_precondition(
            "DATA.FIT_SHAPE",
            format!(
                "time has {} entries but the MSD has {}",
                time.len(),
                msd_mean.len()
            ),
        ));
    }

    let start = resolve_discard_init(time, window.init)?;
    let end = match window.final_frames {
        Some(final_frames) => time.len().checked_sub(final_frames).ok_or_else(|| {
            DiffusionError::data_precondition(
                "DATA.FIT_TOO_FEW_POINTS",
                format!(
                    "cannot discard {} final frames from a series of {}",
                    final_frames,
                    time.len()
                ),
            )
        })?,
        None => time.len(),
    };
    let retained = end.saturating_sub(start);
    if retained < 2 {
        return Err(DiffusionError::data_precondition(
            "DATA.FIT_TOO_FEW_POINTS",
            format!(
                "discarding {} initial and {} final frames of {} leaves {} points; at least 2 are required",
                start,
                window.final_frames.unwrap_or(0),
                time.len(),
                retained
            ),
        ));
    }

    let fit = linear_fit(&time[start..end], &msd_mean[start..end]).map_err(fit_error)?;
    let standard_error = fit.slope_std_error().map(slope_to_diffusion);
    let confidence = if standard_error.is_some() {
        FitConfidence::Nominal
    } else {
        debug!(
            retained,
            "diffusion fit over two points has no residual degrees of freedom"
        );
        FitConfidence::low("fit over exactly two points has no standard error")
    };

    let estimate = DiffusionEstimate {
        slope: fit.slope,
        intercept: fit.intercept,
        diffusion_coefficient: slope_to_diffusion(fit.slope),
        standard_error,
        discard_init_frames: start,
        discard_final_frames: window.final_frames,
        retained_points: retained,
        confidence,
    };
    debug!(
        start,
        end,
        diffusion = estimate.diffusion_coefficient,
        "fitted diffusion window"
    );
    Ok(estimate)
}

fn fit_error(error: FitError) -> DiffusionError {
    match error {
        FitError::TooFewPoints(_) | FitError::LengthMismatch { .. } => {
            DiffusionError::data_precondition("DATA.FIT_INPUT", error.to_string())
        }
        FitError::NonFinite { .. } => {
            DiffusionError::data_precondition("DATA.FIT_NON_FINITE", error.to_string())
        }
        FitError::Singular { .. } => {
            DiffusionError::computation("RUN.FIT_SINGULAR", error.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{fit_diffusion, resolve_discard_init, slope_to_diffusion};
    use crate::domain::{DiffusionErrorCategory, DiscardInit, DiscardWindow};

    fn linear_series(points: usize, dt: f64, slope: f64) -> (Vec<f64>, Vec<f64>) {
        let time: Vec<f64> = (0..points).map(|i| i as f64 * dt).collect();
        let msd = time.iter().map(|t| slope * t).collect();
        (time, msd)
    }

    #[test]
    fn slope_conversion_uses_einstein_relation() {
        assert!((slope_to_diffusion(6.0) - 1.0e-4).abs() < 1.0e-18);
    }

    #[test]
    fn exact_linear_msd_recovers_coefficient_with_zero_error() {
        let (time, msd) = linear_series(50, 0.1, 0.6);
        let estimate = fit_diffusion(&time, &msd, DiscardWindow::default()).expect("fit");

        assert!((estimate.diffusion_coefficient - 1.0e-5).abs() < 1.0e-15);
        assert!(estimate.standard_error.expect("error") < 1.0e-15);
        assert!(estimate.confidence.is_nominal());
        assert_eq!(estimate.retained_points, 50);
        assert!(estimate.intercept.abs() < 1.0e-12);
    }

    #[test]
    fn discard_window_trims_both_ends() {
        let (time, mut msd) = linear_series(20, 1.0, 6.0);
        msd[0] = 100.0;
        msd[19] = -100.0;

        let estimate = fit_diffusion(&time, &msd, DiscardWindow::frames(1, Some(1))).expect("fit");
        assert_eq!(estimate.discard_init_frames, 1);
        assert_eq!(estimate.discard_final_frames, Some(1));
        assert_eq!(estimate.retained_points, 18);
        assert!((estimate.slope - 6.0).abs() < 1.0e-10);
    }

    #[test]
    fn discard_time_resolves_to_first_frame_not_before_threshold() {
        let time = [0.0, 0.5, 1.0, 1.5, 2.0];
        assert_eq!(resolve_discard_init(&time, DiscardInit::TimePs(1.0)).expect("exact"), 2);
        assert_eq!(resolve_discard_init(&time, DiscardInit::TimePs(1.2)).expect("between"), 3);
        assert_eq!(resolve_discard_init(&time, DiscardInit::TimePs(-1.0)).expect("before"), 0);

        let error = resolve_discard_init(&time, DiscardInit::TimePs(2.5))
            .expect_err("threshold beyond series");
        assert_eq!(error.placeholder(), "DATA.DISCARD_INIT_TIME");
    }

    #[test]
    fn too_few_retained_points_is_a_data_error() {
        let (time, msd) = linear_series(5, 1.0, 1.0);
        for window in [
            DiscardWindow::frames(4, None),
            DiscardWindow::frames(2, Some(2)),
            DiscardWindow::frames(0, Some(9)),
        ] {
            let error = fit_diffusion(&time, &msd, window).expect_err("window too small");
            assert_eq!(error.category(), DiffusionErrorCategory::DataPreconditionError);
            assert_eq!(error.placeholder(), "DATA.FIT_TOO_FEW_POINTS");
        }
    }

    #[test]
    fn two_point_fit_is_flagged_low_confidence() {
        let (time, msd) = linear_series(5, 1.0, 6.0);
        let estimate = fit_diffusion(&time, &msd, DiscardWindow::frames(3, None)).expect("fit");

        assert_eq!(estimate.retained_points, 2);
        assert_eq!(estimate.standard_error, None);
        assert!(!estimate.confidence.is_nominal());
        assert!((estimate.diffusion_coefficient - 1.0e-4).abs() < 1.0e-15);
    }

    #[test]
    fn sub_femtosecond_time_axis_is_fitted() {
        let time = [0.0, 1.0e-7, 2.0e-7];
        let msd = [0.0, 6.0e-8, 1.2e-7];

        let estimate = fit_diffusion(&time, &msd, DiscardWindow::default())
            .expect("strictly increasing time axis should fit");
        assert!((estimate.diffusion_coefficient - 1.0e-5).abs() < 1.0e-14);
        assert!(estimate.confidence.is_nominal());
    }
}
