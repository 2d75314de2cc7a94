use crate::domain::{ComputeResult, MsdCurve, MsdMode, TrajectoryBuffer};
use crate::numerics::{squared_distance3, stable_sum_iter};
use faer::Mat;
use rayon::prelude::*;
use tracing::{debug, info};

const LAG_PROGRESS_INTERVAL: usize = 1000;

/// Computes the per-atom MSD and its cross-atom statistics.
///
/// Bare mode measures every frame against frame 0. Time-sliced mode averages,
/// for each lag `t`, all `n - t` frame pairs separated by `t`; that is
/// `O(n^2)` in the frame count, so lags are spread over the rayon pool. Each
/// lag is reduced sequentially in frame order, which makes the result
/// independent of the number of worker threads.
pub fn compute_msd(buffer: &TrajectoryBuffer, mode: MsdMode) -> ComputeResult<MsdCurve> {
    info!(
        frames = buffer.frame_count(),
        atoms = buffer.atom_count(),
        mode = %mode,
        "computing MSD from atomic positions"
    );

    let per_atom = match mode {
        MsdMode::Bare => bare_msd(buffer.displacements()),
        MsdMode::TimeSliced => timesliced_msd(buffer.displacements()),
    };
    MsdCurve::from_per_atom(mode, per_atom)
}

fn bare_msd(displacements: &[Vec<[f64; 3]>]) -> Mat<f64> {
    let frame_count = displacements.len();
    let atom_count = displacements.first().map(Vec::len).unwrap_or(0);
    let mut per_atom = Mat::<f64>::zeros(frame_count, atom_count);

    for (frame, row) in displacements.iter().enumerate() {
        for (atom, displacement) in row.iter().enumerate() {
            per_atom[(frame, atom)] = squared_distance3(*displacement, displacements[0][atom]);
        }
    }

    per_atom
}

fn timesliced_msd(displacements: &[Vec<[f64; 3]>]) -> Mat<f64> {
    let frame_count = displacements.len();
    let atom_count = displacements.first().map(Vec::len).unwrap_or(0);

    let lag_rows: Vec<Vec<f64>> = (0..frame_count)
        .into_par_iter()
        .map(|lag| {
            if lag % LAG_PROGRESS_INTERVAL == 0 {
                debug!(lag, frame_count, "treating time interval");
            }
            let origins = frame_count - lag;
            (0..atom_count)
                .map(|atom| {
                    stable_sum_iter((0..origins).map(|origin| {
                        squared_distance3(
                            displacements[origin + lag][atom],
                            displacements[origin][atom],
                        )
                    })) / origins as f64
                })
                .collect()
        })
        .collect();

    let mut per_atom = Mat::<f64>::zeros(frame_count, atom_count);
    for (lag, row) in lag_rows.iter().enumerate() {
        for (atom, value) in row.iter().enumerate() {
            per_atom[(lag, atom)] = *value;
        }
    }

    per_atom
}

#[cfg(test)]
mod tests {
    use super::compute_msd;
    use crate::domain::{MsdMode, TrajectoryBuffer};

    fn line_buffer() -> TrajectoryBuffer {
        // Atom 0 moves 1 Å per frame along x; atom 1 stays put.
        let displacements = (0..4)
            .map(|frame| vec![[frame as f64, 0.0, 0.0], [0.0, 0.0, 0.0]])
            .collect();
        TrajectoryBuffer::from_displacements(vec![0.0, 1.0, 2.0, 3.0], displacements, vec![0, 1])
            .expect("buffer should build")
    }

    #[test]
    fn bare_msd_measures_from_first_frame() {
        let curve = compute_msd(&line_buffer(), MsdMode::Bare).expect("msd");

        assert_eq!(curve.mode(), MsdMode::Bare);
        assert_eq!(curve.atom_series(0), Some(vec![0.0, 1.0, 4.0, 9.0]));
        assert_eq!(curve.mean(), &[0.0, 0.5, 2.0, 4.5]);
        assert_eq!(curve.std().expect("std"), &[0.0, 0.5, 2.0, 4.5]);
    }

    #[test]
    fn timesliced_msd_averages_every_origin() {
        let displacements = vec![
            vec![[0.0, 0.0, 0.0]],
            vec![[1.0, 0.0, 0.0]],
            vec![[1.0, 0.0, 0.0]],
        ];
        let buffer =
            TrajectoryBuffer::from_displacements(vec![0.0, 1.0, 2.0], displacements, vec![0])
                .expect("buffer should build");

        let curve = compute_msd(&buffer, MsdMode::TimeSliced).expect("msd");
        // lag 1: pairs (1-0)=1, (2-1)=0 -> 0.5; lag 2: (2-0)=1 -> 1.
        assert_eq!(curve.mean(), &[0.0, 0.5, 1.0]);
    }

    #[test]
    fn constant_velocity_gives_identical_bare_and_timesliced_series() {
        let bare = compute_msd(&line_buffer(), MsdMode::Bare).expect("bare");
        let sliced = compute_msd(&line_buffer(), MsdMode::TimeSliced).expect("sliced");
        assert_eq!(bare.atom_series(0), sliced.atom_series(0));
    }
}
