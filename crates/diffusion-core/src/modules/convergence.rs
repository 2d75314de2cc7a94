use super::fit::fit_diffusion;
use crate::domain::{
    ComputeResult, DiffusionError, DiscardWindow, FitConfidence, WindowConvergencePoint,
};
use crate::numerics::{mean, population_std};
use tracing::{debug, warn};

/// Diffusion coefficient as a function of averaging-window width.
///
/// For every slice count `n_slice` in `1..=len` the window length is
/// `ceil((len - 1) / n_slice)` frames; repeated lengths are skipped so each
/// width is evaluated once, for the smallest slice count producing it.
/// Consecutive windows share their boundary frame, so every window fit starts
/// from a true MSD sample. A trailing window shorter than the others is kept
/// whenever it holds at least two frames.
///
/// Points are returned by increasing width.
pub fn diffusion_vs_window(
    time: &[f64],
    msd_mean: &[f64],
) -> ComputeResult<Vec<WindowConvergencePoint>> {
    if time.len() != msd_mean.len() {
        return Err(DiffusionError::data_precondition(
            "DATA.CONVERGENCE_SHAPE",
            format!(
                "time has {} entries but the MSD has {}",
                time.len(),
                msd_mean.len()
            ),
        ));
    }
    if time.len() < 2 {
        return Err(DiffusionError::data_precondition(
            "DATA.CONVERGENCE_TOO_SHORT",
            format!(
                "window convergence needs at least 2 frames, got {}",
                time.len()
            ),
        ));
    }

    let frame_count = time.len();
    let last = frame_count - 1;
    let timestep = time[1] - time[0];

    let mut points = Vec::new();
    let mut previous_width = None;
    for slice_count in 1..=frame_count {
        let window_frames = last.div_ceil(slice_count);
        if previous_width == Some(window_frames) {
            continue;
        }
        previous_width = Some(window_frames);

        let point = convergence_point(time, msd_mean, window_frames, timestep)?;
        debug!(
            slice_count,
            window_frames,
            windows = point.window_count,
            mean = point.mean_diffusion,
            "evaluated convergence window"
        );
        points.push(point);
    }

    points.reverse();
    let low_confidence = points
        .iter()
        .filter(|point| !point.confidence.is_nominal())
        .count();
    if low_confidence > 0 {
        warn!(
            low_confidence,
            widths = points.len(),
            "some averaging widths rest on single windows or two-point fits"
        );
    }
    Ok(points)
}

fn convergence_point(
    time: &[f64],
    msd_mean: &[f64],
    window_frames: usize,
    timestep: f64,
) -> ComputeResult<WindowConvergencePoint> {
    let last = time.len() - 1;
    let mut coefficients = Vec::new();
    let mut two_point_windows = 0;
    let mut start = 0;
    while start < last {
        let end = (start + window_frames).min(last);
        let estimate = fit_diffusion(
            &time[start..=end],
            &msd_mean[start..=end],
            DiscardWindow::default(),
        )?;
        if !estimate.confidence.is_nominal() {
            two_point_windows += 1;
        }
        coefficients.push(estimate.diffusion_coefficient);
        start = end;
    }

    let window_count = coefficients.len();
    let mean_diffusion = mean(&coefficients).unwrap_or(0.0);
    let (std_diffusion, confidence) = if window_count < 2 {
        (
            None,
            FitConfidence::low("single window; no spread across windows"),
        )
    } else if two_point_windows > 0 {
        (
            population_std(&coefficients),
            FitConfidence::low(format!(
                "{} of {} windows fitted over two points",
                two_point_windows, window_count
            )),
        )
    } else {
        (population_std(&coefficients), FitConfidence::Nominal)
    };

    Ok(WindowConvergencePoint {
        window_frames,
        window_width_ps: window_frames as f64 * timestep,
        window_count,
        mean_diffusion,
        std_diffusion,
        confidence,
    })
}
