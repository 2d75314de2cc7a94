use super::PrecomputedMsd;
use crate::domain::{ComputeResult, DiffusionError, ParserResult};
use tracing::{debug, warn};

const TABLE_START_MARKER: &str = "Per MPI rank";
const TABLE_END_MARKER: &str = "Loop time of";

pub const THERMO_TIME_COLUMN: &str = "Time";
/// Total MSD component of `compute msd`.
pub const THERMO_MSD_COLUMN: &str = "c_msd[4]";
pub const THERMO_TEMPERATURE_COLUMN: &str = "Temp";

/// Extracts time, MSD and temperature from a LAMMPS log.
///
/// The thermo table is the block between the `Per MPI rank` memory line and
/// the `Loop time of` footer of the first run. A file without those markers is
/// read as an already-extracted table whose first non-blank line is the
/// header. The run temperature is the one of the first row.
pub fn parse_lammps_thermo(source: &str) -> ParserResult<PrecomputedMsd> {
    let table = thermo_table_lines(source);
    let mut rows = table
        .iter()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty());

    let Some((_, header)) = rows.next() else {
        return Err(DiffusionError::data_precondition(
            "DATA.THERMO_EMPTY",
            "no thermo table found in the LAMMPS log",
        ));
    };
    let columns: Vec<&str> = header.split_whitespace().collect();
    let time_column = column_index(&columns, THERMO_TIME_COLUMN)?;
    let msd_column = column_index(&columns, THERMO_MSD_COLUMN)?;
    let temperature_column = column_index(&columns, THERMO_TEMPERATURE_COLUMN)?;

    let mut time = Vec::new();
    let mut msd_mean = Vec::new();
    let mut temperature = None;
    for (line_index, line) in rows {
        if line.trim_start().starts_with("WARNING") {
            warn!(line = line.trim(), "skipping warning inside thermo table");
            continue;
        }
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let cell = |column: usize| -> ParserResult<f64> {
            tokens
                .get(column)
                .and_then(|token| token.parse::<f64>().ok())
                .ok_or_else(|| {
                    DiffusionError::data_precondition(
                        "DATA.THERMO_ROW",
                        format!(
                            "thermo row {} has no numeric '{}' value: '{}'",
                            line_index,
                            columns[column],
                            line.trim()
                        ),
                    )
                })
        };

        time.push(cell(time_column)?);
        msd_mean.push(cell(msd_column)?);
        if temperature.is_none() {
            temperature = Some(cell(temperature_column)?);
        }
    }

    if time.is_empty() {
        return Err(DiffusionError::data_precondition(
            "DATA.THERMO_EMPTY",
            "thermo table has a header but no data rows",
        ));
    }
    debug!(rows = time.len(), ?temperature, "parsed thermo table");

    Ok(PrecomputedMsd {
        time,
        msd_mean,
        temperature,
    })
}

fn thermo_table_lines(source: &str) -> Vec<&str> {
    if !source.contains(TABLE_START_MARKER) {
        return source.lines().collect();
    }

    source
        .lines()
        .skip_while(|line| !line.contains(TABLE_START_MARKER))
        .skip(1)
        .take_while(|line| !line.contains(TABLE_END_MARKER))
        .collect()
}

fn column_index(columns: &[&str], name: &str) -> ParserResult<usize> {
    columns
        .iter()
        .position(|column| *column == name)
        .ok_or_else(|| {
            DiffusionError::data_precondition(
                "DATA.THERMO_COLUMN",
                format!(
                    "thermo header lacks column '{}'; found: {}",
                    name,
                    columns.join(" ")
                ),
            )
        })
}

/// Converts a discard given in MD steps to thermo rows.
///
/// Thermo output is written every `(time[1] - time[0]) / md_timestep_ps` MD
/// steps; partial strides are rounded down.
pub fn discard_steps_to_rows(
    steps: usize,
    md_timestep_ps: f64,
    time: &[f64],
) -> ComputeResult<usize> {
    if !(md_timestep_ps.is_finite() && md_timestep_ps > 0.0) {
        return Err(DiffusionError::configuration(
            "INPUT.MD_TIMESTEP",
            format!("MD timestep must be positive, got {}", md_timestep_ps),
        ));
    }
    if time.len() < 2 {
        return Err(DiffusionError::data_precondition(
            "DATA.THERMO_STRIDE",
            "thermo stride needs at least two rows",
        ));
    }

    let stride = (time[1] - time[0]) / md_timestep_ps;
    if !(stride.is_finite() && stride > 0.0) {
        return Err(DiffusionError::data_precondition(
            "DATA.THERMO_STRIDE",
            format!("thermo stride {} is not positive", stride),
        ));
    }
    // Absorb representation error so that an exact multiple is not rounded down.
    let rows = (steps as f64 / stride * (1.0 + 1.0e-12)).floor() as usize;
    debug!(steps, stride, rows, "converted MD-step discard to thermo rows");
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::{discard_steps_to_rows, parse_lammps_thermo};
    use crate::domain::DiffusionErrorCategory;

    const LOG: &str = "\
LAMMPS (2 Aug 2023)
units metal
Per MPI rank memory allocation (min/avg/max) = 3.1 | 3.1 | 3.1 Mbytes
   Step          Time           Temp          c_msd[1]       c_msd[2]       c_msd[3]       c_msd[4]
         0   0              612.3          0              0              0              0
       100   0.1            600.1          0.01           0.02           0.03           0.06
WARNING: Lost atoms are not lost (src/thermo.cpp:123)
       200   0.2            598.7          0.02           0.04           0.06           0.12
Loop time of 1.234 on 4 procs for 200 steps with 64 atoms
   Step          Time           Temp
";

    #[test]
    fn reads_table_between_markers() {
        let series = parse_lammps_thermo(LOG).expect("thermo should parse");
        assert_eq!(series.time, vec![0.0, 0.1, 0.2]);
        assert_eq!(series.msd_mean, vec![0.0, 0.06, 0.12]);
        assert_eq!(series.temperature, Some(612.3));
    }

    #[test]
    fn extracted_table_without_markers_is_accepted() {
        let table = "Step Time Temp c_msd[4]\n0 0.0 300 0.0\n10 0.5 301 1.5\n";
        let series = parse_lammps_thermo(table).expect("table should parse");
        assert_eq!(series.time, vec![0.0, 0.5]);
        assert_eq!(series.msd_mean, vec![0.0, 1.5]);
    }

    #[test]
    fn missing_msd_column_is_reported() {
        let error = parse_lammps_thermo("Step Time Temp\n0 0.0 300\n").expect_err("no msd");
        assert_eq!(error.placeholder(), "DATA.THERMO_COLUMN");
        assert_eq!(error.category(), DiffusionErrorCategory::DataPreconditionError);
    }

    #[test]
    fn non_numeric_cell_is_reported() {
        let error = parse_lammps_thermo("Time Temp c_msd[4]\n0.0 300 abc\n").expect_err("bad cell");
        assert_eq!(error.placeholder(), "DATA.THERMO_ROW");
    }

    #[test]
    fn md_steps_map_to_thermo_rows() {
        // Thermo every 100 steps of 1 fs.
        let time = [0.0, 0.1, 0.2, 0.3];
        assert_eq!(discard_steps_to_rows(250, 0.001, &time).expect("rows"), 2);
        assert_eq!(discard_steps_to_rows(300, 0.001, &time).expect("rows"), 3);
        assert_eq!(discard_steps_to_rows(0, 0.001, &time).expect("rows"), 0);
        assert!(discard_steps_to_rows(10, 0.0, &time).is_err());
    }
}
