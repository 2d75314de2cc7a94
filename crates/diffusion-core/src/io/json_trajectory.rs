use super::Trajectory;
use crate::domain::{DiffusionError, ParserResult};

/// Reads `{ "time": [...], "symbols": [...], "positions": [[[x, y, z], ...], ...] }`,
/// optionally with a `temperature` in K.
pub fn parse_json_trajectory(source: &str) -> ParserResult<Trajectory> {
    let trajectory: Trajectory = serde_json::from_str(source).map_err(|error| {
        DiffusionError::data_precondition(
            "DATA.JSON_TRAJECTORY",
            format!("invalid JSON trajectory: {}", error),
        )
    })?;

    if trajectory.time.len() != trajectory.positions.len() {
        return Err(DiffusionError::data_precondition(
            "DATA.JSON_TRAJECTORY",
            format!(
                "trajectory has {} time values but {} frames",
                trajectory.time.len(),
                trajectory.positions.len()
            ),
        ));
    }
    if let Some(frame) = trajectory
        .positions
        .iter()
        .position(|frame| frame.len() != trajectory.symbols.len())
    {
        return Err(DiffusionError::data_precondition(
            "DATA.JSON_TRAJECTORY",
            format!(
                "frame {} has {} positions for {} symbols",
                frame,
                trajectory.positions[frame].len(),
                trajectory.symbols.len()
            ),
        ));
    }

    Ok(trajectory)
}
