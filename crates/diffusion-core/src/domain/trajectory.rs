use super::{ComputeResult, DiffusionError, MsdMode};
use crate::numerics::{mean, population_std, within_tolerance};
use faer::Mat;

const TIMESTEP_RELATIVE_TOLERANCE: f64 = 1.0e-6;

/// Per-frame Cartesian displacements of the diffusing atoms plus their time
/// axis.
///
/// Positions handed to [`TrajectoryBuffer::from_positions`] must already be
/// unwrapped: folded periodic coordinates produce a sawtooth MSD and are not
/// detected here.
#[derive(Debug, Clone, PartialEq)]
pub struct TrajectoryBuffer {
    time: Vec<f64>,
    displacements: Vec<Vec<[f64; 3]>>,
    atom_subset: Vec<usize>,
}

impl TrajectoryBuffer {
    /// Builds displacements of `atom_subset` relative to `reference_frame`
    /// from absolute positions (`positions[frame][atom]`, all atoms).
    pub fn from_positions(
        time: Vec<f64>,
        positions: &[Vec<[f64; 3]>],
        atom_subset: Vec<usize>,
        reference_frame: usize,
    ) -> ComputeResult<Self> {
        validate_time_axis(&time, positions.len())?;
        if atom_subset.is_empty() {
            return Err(DiffusionError::data_precondition(
                "DATA.TRAJECTORY_EMPTY_SUBSET",
                "atom subset must select at least one atom",
            ));
        }
        if reference_frame >= positions.len() {
            return Err(DiffusionError::data_precondition(
                "DATA.TRAJECTORY_REFERENCE_FRAME",
                format!(
                    "reference frame {} is outside the {} available frames",
                    reference_frame,
                    positions.len()
                ),
            ));
        }

        let atom_count = positions[0].len();
        if let Some((frame, row)) = positions
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != atom_count)
        {
            return Err(DiffusionError::data_precondition(
                "DATA.TRAJECTORY_SHAPE",
                format!(
                    "frame {} holds {} atoms but frame 0 holds {}",
                    frame,
                    row.len(),
                    atom_count
                ),
            ));
        }
        if let Some(atom) = atom_subset.iter().find(|atom| **atom >= atom_count) {
            return Err(DiffusionError::data_precondition(
                "DATA.TRAJECTORY_ATOM_INDEX",
                format!(
                    "atom index {} is outside the {} atoms of the trajectory",
                    atom, atom_count
                ),
            ));
        }

        let reference = &positions[reference_frame];
        let displacements = positions
            .iter()
            .map(|frame| {
                atom_subset
                    .iter()
                    .map(|&atom| {
                        [
                            frame[atom][0] - reference[atom][0],
                            frame[atom][1] - reference[atom][1],
                            frame[atom][2] - reference[atom][2],
                        ]
                    })
                    .collect()
            })
            .collect();

        Self::from_displacements(time, displacements, atom_subset)
    }

    /// Wraps displacements that an adapter already referenced to a frame.
    pub fn from_displacements(
        time: Vec<f64>,
        displacements: Vec<Vec<[f64; 3]>>,
        atom_subset: Vec<usize>,
    ) -> ComputeResult<Self> {
        validate_time_axis(&time, displacements.len())?;
        if let Some((frame, row)) = displacements
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != atom_subset.len())
        {
            return Err(DiffusionError::data_precondition(
                "DATA.TRAJECTORY_SHAPE",
                format!(
                    "frame {} holds {} displacements but the atom subset has {} atoms",
                    frame,
                    row.len(),
                    atom_subset.len()
                ),
            ));
        }
        if atom_subset.is_empty() {
            return Err(DiffusionError::data_precondition(
                "DATA.TRAJECTORY_EMPTY_SUBSET",
                "atom subset must select at least one atom",
            ));
        }

        Ok(Self {
            time,
            displacements,
            atom_subset,
        })
    }

    pub fn time(&self) -> &[f64] {
        &self.time
    }

    pub fn displacements(&self) -> &[Vec<[f64; 3]>] {
        &self.displacements
    }

    pub fn atom_subset(&self) -> &[usize] {
        &self.atom_subset
    }

    pub fn frame_count(&self) -> usize {
        self.time.len()
    }

    pub fn atom_count(&self) -> usize {
        self.atom_subset.len()
    }
}

/// Spacing of the first two samples; `None` for fewer than two.
pub fn timestep_of(time: &[f64]) -> Option<f64> {
    (time.len() >= 2).then(|| time[1] - time[0])
}

fn validate_time_axis(time: &[f64], frame_count: usize) -> ComputeResult<()> {
    if frame_count == 0 {
        return Err(DiffusionError::data_precondition(
            "DATA.TRAJECTORY_EMPTY",
            "trajectory must contain at least one frame",
        ));
    }
    if time.len() != frame_count {
        return Err(DiffusionError::data_precondition(
            "DATA.TRAJECTORY_SHAPE",
            format!(
                "time axis has {} entries but the trajectory has {} frames",
                time.len(),
                frame_count
            ),
        ));
    }
    if let Some(index) = time.iter().position(|t| !t.is_finite()) {
        return Err(DiffusionError::data_precondition(
            "DATA.TIME_AXIS",
            format!("time value at frame {} is not finite", index),
        ));
    }

    let Some(step) = timestep_of(time) else {
        return Ok(());
    };
    if step <= 0.0 {
        return Err(DiffusionError::data_precondition(
            "DATA.TIME_AXIS",
            format!("time axis must be strictly increasing, first step is {}", step),
        ));
    }
    for (index, pair) in time.windows(2).enumerate() {
        let delta = pair[1] - pair[0];
        if !within_tolerance(delta, step, 0.0, TIMESTEP_RELATIVE_TOLERANCE, step.abs()) {
            return Err(DiffusionError::data_precondition(
                "DATA.TIME_AXIS",
                format!(
                    "time axis must be uniformly spaced: step {} between frames {} and {} differs from {}",
                    delta,
                    index,
                    index + 1,
                    step
                ),
            ));
        }
    }

    Ok(())
}

/// MSD in Å² per frame (bare) or per lag (time-sliced).
///
/// `per_atom` is frame-major (`frames x atoms`). Sources that only provide a
/// mean series, such as MD-engine thermo output, carry neither `per_atom` nor
/// `std`.
#[derive(Debug, Clone)]
pub struct MsdCurve {
    mode: MsdMode,
    per_atom: Option<Mat<f64>>,
    mean: Vec<f64>,
    std: Option<Vec<f64>>,
}

impl MsdCurve {
    pub fn from_per_atom(mode: MsdMode, per_atom: Mat<f64>) -> ComputeResult<Self> {
        if per_atom.nrows() == 0 || per_atom.ncols() == 0 {
            return Err(DiffusionError::data_precondition(
                "DATA.MSD_EMPTY",
                format!(
                    "per-atom MSD must be non-empty, got {}x{}",
                    per_atom.nrows(),
                    per_atom.ncols()
                ),
            ));
        }

        let mut mean_series = Vec::with_capacity(per_atom.nrows());
        let mut std_series = Vec::with_capacity(per_atom.nrows());
        let mut row = vec![0.0; per_atom.ncols()];
        for frame in 0..per_atom.nrows() {
            for (atom, value) in row.iter_mut().enumerate() {
                *value = per_atom[(frame, atom)];
            }
            mean_series.push(mean(&row).unwrap_or(0.0));
            std_series.push(population_std(&row).unwrap_or(0.0));
        }

        Ok(Self {
            mode,
            per_atom: Some(per_atom),
            mean: mean_series,
            std: Some(std_series),
        })
    }

    /// Mean-only curve, for MSD series supplied directly by an MD engine.
    pub fn from_mean(mode: MsdMode, mean: Vec<f64>) -> ComputeResult<Self> {
        if mean.is_empty() {
            return Err(DiffusionError::data_precondition(
                "DATA.MSD_EMPTY",
                "mean MSD series must be non-empty",
            ));
        }
        Ok(Self {
            mode,
            per_atom: None,
            mean,
            std: None,
        })
    }

    /// Rebuilds a curve from persisted rows (`rows[frame][atom]`).
    pub fn from_rows(
        mode: MsdMode,
        mean: Vec<f64>,
        rows: Option<&[Vec<f64>]>,
        std: Option<Vec<f64>>,
    ) -> ComputeResult<Self> {
        let Some(rows) = rows else {
            let mut curve = Self::from_mean(mode, mean)?;
            curve.std = std;
            return Ok(curve);
        };
        if rows.len() != mean.len() {
            return Err(DiffusionError::data_precondition(
                "DATA.MSD_SHAPE",
                format!(
                    "per-atom MSD has {} frames but the mean has {}",
                    rows.len(),
                    mean.len()
                ),
            ));
        }

        let atom_count = rows.first().map(Vec::len).unwrap_or(0);
        let mut per_atom = Mat::<f64>::zeros(rows.len(), atom_count);
        for (frame, row) in rows.iter().enumerate() {
            if row.len() != atom_count {
                return Err(DiffusionError::data_precondition(
                    "DATA.MSD_SHAPE",
                    format!(
                        "per-atom MSD frame {} has {} atoms, expected {}",
                        frame,
                        row.len(),
                        atom_count
                    ),
                ));
            }
            for (atom, value) in row.iter().enumerate() {
                per_atom[(frame, atom)] = *value;
            }
        }

        Ok(Self {
            mode,
            per_atom: Some(per_atom),
            mean,
            std,
        })
    }

    pub fn mode(&self) -> MsdMode {
        self.mode
    }

    pub fn mean(&self) -> &[f64] {
        &self.mean
    }

    pub fn std(&self) -> Option<&[f64]> {
        self.std.as_deref()
    }

    pub fn per_atom(&self) -> Option<&Mat<f64>> {
        self.per_atom.as_ref()
    }

    pub fn frame_count(&self) -> usize {
        self.mean.len()
    }

    pub fn atom_count(&self) -> Option<usize> {
        self.per_atom.as_ref().map(|per_atom| per_atom.ncols())
    }

    /// MSD series of one atom (column of `per_atom`).
    pub fn atom_series(&self, atom: usize) -> Option<Vec<f64>> {
        let per_atom = self.per_atom.as_ref()?;
        (atom < per_atom.ncols())
            .then(|| (0..per_atom.nrows()).map(|frame| per_atom[(frame, atom)]).collect())
    }

    /// Frame-major copy of `per_atom`, the layout of the persisted record.
    pub fn per_atom_rows(&self) -> Option<Vec<Vec<f64>>> {
        let per_atom = self.per_atom.as_ref()?;
        Some(
            (0..per_atom.nrows())
                .map(|frame| {
                    (0..per_atom.ncols())
                        .map(|atom| per_atom[(frame, atom)])
                        .collect()
                })
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::{MsdCurve, TrajectoryBuffer, timestep_of};
    use crate::domain::{DiffusionErrorCategory, MsdMode};
    use faer::Mat;

    fn positions() -> Vec<Vec<[f64; 3]>> {
        vec![
            vec![[0.0, 0.0, 0.0], [5.0, 5.0, 5.0], [1.0, 1.0, 1.0]],
            vec![[1.0, 0.0, 0.0], [5.0, 5.0, 5.0], [1.0, 2.0, 1.0]],
            vec![[2.0, 0.0, 0.0], [5.0, 5.0, 5.0], [1.0, 3.0, 1.0]],
        ]
    }

    #[test]
    fn displacements_are_relative_to_reference_frame_and_keep_subset_order() {
        let buffer = TrajectoryBuffer::from_positions(vec![0.0, 0.5, 1.0], &positions(), vec![2, 0], 0)
            .expect("buffer should build");

        assert_eq!(buffer.frame_count(), 3);
        assert_eq!(buffer.atom_count(), 2);
        assert_eq!(buffer.atom_subset(), &[2, 0]);
        assert_eq!(buffer.displacements()[2][0], [0.0, 2.0, 0.0]);
        assert_eq!(buffer.displacements()[2][1], [2.0, 0.0, 0.0]);
        assert_eq!(timestep_of(&[0.0, 0.5, 1.0]), Some(0.5));
        assert_eq!(timestep_of(&[0.0]), None);

        let shifted =
            TrajectoryBuffer::from_positions(vec![0.0, 0.5, 1.0], &positions(), vec![0], 1)
                .expect("buffer should build");
        assert_eq!(shifted.displacements()[0][0], [-1.0, 0.0, 0.0]);
        assert_eq!(shifted.displacements()[1][0], [0.0, 0.0, 0.0]);
    }

    #[test]
    fn invalid_time_axes_are_rejected() {
        let cases = [
            vec![0.0, 0.5],
            vec![0.0, 0.0, 0.0],
            vec![0.0, 0.5, 1.5],
            vec![0.0, f64::NAN, 1.0],
        ];
        for time in cases {
            let error = TrajectoryBuffer::from_positions(time.clone(), &positions(), vec![0], 0)
                .expect_err("time axis should be rejected");
            assert_eq!(
                error.category(),
                DiffusionErrorCategory::DataPreconditionError,
                "time axis {:?}",
                time
            );
        }
    }

    #[test]
    fn out_of_range_atoms_and_empty_subsets_are_rejected() {
        let time = vec![0.0, 0.5, 1.0];
        let error = TrajectoryBuffer::from_positions(time.clone(), &positions(), vec![3], 0)
            .expect_err("atom 3 does not exist");
        assert_eq!(error.placeholder(), "DATA.TRAJECTORY_ATOM_INDEX");

        let error = TrajectoryBuffer::from_positions(time, &positions(), Vec::new(), 0)
            .expect_err("empty subset");
        assert_eq!(error.placeholder(), "DATA.TRAJECTORY_EMPTY_SUBSET");
    }

    #[test]
    fn curve_statistics_are_population_mean_and_std() {
        let mut per_atom = Mat::<f64>::zeros(2, 2);
        per_atom[(1, 0)] = 1.0;
        per_atom[(1, 1)] = 3.0;

        let curve = MsdCurve::from_per_atom(MsdMode::Bare, per_atom).expect("curve");
        assert_eq!(curve.mean(), &[0.0, 2.0]);
        assert_eq!(curve.std().expect("std"), &[0.0, 1.0]);
        assert_eq!(curve.atom_series(1), Some(vec![0.0, 3.0]));
        assert_eq!(curve.atom_series(2), None);
        assert_eq!(
            curve.per_atom_rows(),
            Some(vec![vec![0.0, 0.0], vec![1.0, 3.0]])
        );
    }

    #[test]
    fn mean_only_curve_has_no_breakdown() {
        let curve = MsdCurve::from_mean(MsdMode::Bare, vec![0.0, 1.0]).expect("curve");
        assert_eq!(curve.atom_count(), None);
        assert_eq!(curve.std(), None);
        assert_eq!(curve.per_atom_rows(), None);
    }

    #[test]
    fn persisted_rows_must_match_mean_length() {
        let rows = vec![vec![0.0], vec![1.0]];
        let error = MsdCurve::from_rows(MsdMode::Bare, vec![0.0], Some(&rows), None)
            .expect_err("shape mismatch");
        assert_eq!(error.placeholder(), "DATA.MSD_SHAPE");
    }
}
