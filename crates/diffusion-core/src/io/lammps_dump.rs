use super::Trajectory;
use super::elements::element_symbol;
use crate::domain::{DiffusionError, ParserResult};
use tracing::{debug, warn};

const UNWRAPPED_COLUMNS: [&str; 3] = ["xu", "yu", "zu"];
const WRAPPED_COLUMNS: [&str; 3] = ["x", "y", "z"];

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DumpOptions {
    /// ps between two dumped frames.
    pub timestep_ps: Option<f64>,
    /// Atomic number of each LAMMPS atom type, `atomic_numbers[type - 1]`.
    pub atomic_numbers: Vec<usize>,
    /// Trailing frames to drop.
    pub skip_last: usize,
    /// K; the dump itself carries no temperature.
    pub temperature: Option<f64>,
}

#[derive(Debug)]
struct DumpFrame {
    /// `(id, type, position)`, sorted by id.
    atoms: Vec<(u64, usize, [f64; 3])>,
}

/// Reads a LAMMPS text dump (`ITEM:` blocks).
///
/// Positions come from the unwrapped `xu yu zu` columns, or from `x y z` when
/// those are absent. Atoms are ordered by id in every frame.
pub fn parse_lammps_dump(source: &str, options: &DumpOptions) -> ParserResult<Trajectory> {
    let timestep = match options.timestep_ps {
        Some(value) if value.is_finite() && value > 0.0 => value,
        Some(value) => {
            return Err(DiffusionError::configuration(
                "INPUT.DUMP_TIMESTEP",
                format!("dump timestep must be positive, got {}", value),
            ));
        }
        None => {
            return Err(DiffusionError::configuration(
                "INPUT.DUMP_TIMESTEP",
                "a LAMMPS dump needs the time between frames (ps)",
            ));
        }
    };
    if options.atomic_numbers.is_empty() {
        return Err(DiffusionError::configuration(
            "INPUT.ATOMIC_NUMBERS",
            "a LAMMPS dump needs the atomic number of every atom type",
        ));
    }

    let mut frames = parse_frames(source)?;
    if frames.is_empty() {
        return Err(DiffusionError::data_precondition(
            "DATA.DUMP_EMPTY",
            "LAMMPS dump contains no frames",
        ));
    }
    if options.skip_last >= frames.len() {
        return Err(DiffusionError::data_precondition(
            "DATA.DUMP_SKIP_LAST",
            format!(
                "cannot skip the last {} frames of a {}-frame dump",
                options.skip_last,
                frames.len()
            ),
        ));
    }
    frames.truncate(frames.len() - options.skip_last);

    let symbols = frames[0]
        .atoms
        .iter()
        .map(|(id, atom_type, _)| symbol_for_type(*id, *atom_type, &options.atomic_numbers))
        .collect::<ParserResult<Vec<String>>>()?;

    let mut positions = Vec::with_capacity(frames.len());
    for (index, frame) in frames.iter().enumerate() {
        if frame.atoms.len() != symbols.len() {
            return Err(DiffusionError::data_precondition(
                "DATA.DUMP_ATOM_COUNT",
                format!(
                    "frame {} has {} atoms but the first frame has {}",
                    index,
                    frame.atoms.len(),
                    symbols.len()
                ),
            ));
        }
        positions.push(frame.atoms.iter().map(|(_, _, position)| *position).collect());
    }

    let time = (0..positions.len())
        .map(|index| index as f64 * timestep)
        .collect();
    debug!(
        frames = positions.len(),
        atoms = symbols.len(),
        "parsed LAMMPS text dump"
    );

    Ok(Trajectory {
        time,
        symbols,
        positions,
        temperature: options.temperature,
    })
}

fn symbol_for_type(id: u64, atom_type: usize, atomic_numbers: &[usize]) -> ParserResult<String> {
    atom_type
        .checked_sub(1)
        .and_then(|index| atomic_numbers.get(index))
        .and_then(|atomic_number| element_symbol(*atomic_number))
        .map(str::to_string)
        .ok_or_else(|| {
            DiffusionError::configuration(
                "INPUT.ATOMIC_NUMBERS",
                format!(
                    "atom {} has type {} with no valid atomic number among {:?}",
                    id, atom_type, atomic_numbers
                ),
            )
        })
}

fn parse_frames(source: &str) -> ParserResult<Vec<DumpFrame>> {
    let lines: Vec<&str> = source.lines().collect();
    let mut frames = Vec::new();
    let mut atom_count: Option<usize> = None;
    let mut warned_wrapped = false;
    let mut cursor = 0;

    while cursor < lines.len() {
        let line = lines[cursor].trim();
        cursor += 1;
        let Some(item) = line.strip_prefix("ITEM:") else {
            if line.is_empty() {
                continue;
            }
            return Err(malformed(cursor, line));
        };
        let item = item.trim();

        if item.starts_with("TIMESTEP") {
            cursor += 1;
        } else if item.starts_with("NUMBER OF ATOMS") {
            let value = lines.get(cursor).map(|value| value.trim()).unwrap_or("");
            atom_count = Some(value.parse().map_err(|_| malformed(cursor + 1, value))?);
            cursor += 1;
        } else if item.starts_with("BOX BOUNDS") {
            cursor += 3;
        } else if let Some(header) = item.strip_prefix("ATOMS") {
            let count = atom_count.ok_or_else(|| {
                DiffusionError::data_precondition(
                    "DATA.DUMP_FORMAT",
                    format!("ATOMS block at line {} precedes NUMBER OF ATOMS", cursor),
                )
            })?;
            let layout = ColumnLayout::from_header(header)?;
            if layout.wrapped && !warned_wrapped {
                warn!(
                    "dump has no xu/yu/zu columns; using x/y/z, which must already be unwrapped"
                );
                warned_wrapped = true;
            }

            let end = cursor + count;
            if end > lines.len() {
                return Err(DiffusionError::data_precondition(
                    "DATA.DUMP_FORMAT",
                    format!(
                        "ATOMS block at line {} expects {} rows but the file ends",
                        cursor, count
                    ),
                ));
            }
            let mut atoms = lines[cursor..end]
                .iter()
                .enumerate()
                .map(|(offset, row)| layout.parse_row(cursor + offset + 1, row))
                .collect::<ParserResult<Vec<_>>>()?;
            atoms.sort_by_key(|(id, _, _)| *id);
            frames.push(DumpFrame { atoms });
            cursor = end;
        } else {
            return Err(malformed(cursor, line));
        }
    }

    Ok(frames)
}

#[derive(Debug)]
struct ColumnLayout {
    id: usize,
    atom_type: usize,
    position: [usize; 3],
    wrapped: bool,
}

impl ColumnLayout {
    fn from_header(header: &str) -> ParserResult<Self> {
        let columns: Vec<&str> = header.split_whitespace().collect();
        let find = |name: &str| columns.iter().position(|column| *column == name);
        let find_all = |names: [&str; 3]| -> Option<[usize; 3]> {
            Some([find(names[0])?, find(names[1])?, find(names[2])?])
        };

        let missing = |name: &str| {
            DiffusionError::data_precondition(
                "DATA.DUMP_COLUMNS",
                format!(
                    "ATOMS header lacks '{}' column: '{}'",
                    name,
                    header.trim()
                ),
            )
        };
        let id = find("id").ok_or_else(|| missing("id"))?;
        let atom_type = find("type").ok_or_else(|| missing("type"))?;
        let (position, wrapped) = match find_all(UNWRAPPED_COLUMNS) {
            Some(position) => (position, false),
            None => (
                find_all(WRAPPED_COLUMNS).ok_or_else(|| missing("xu yu zu"))?,
                true,
            ),
        };

        Ok(Self {
            id,
            atom_type,
            position,
            wrapped,
        })
    }

    fn parse_row(&self, line_number: usize, row: &str) -> ParserResult<(u64, usize, [f64; 3])> {
        let tokens: Vec<&str> = row.split_whitespace().collect();
        let token = |column: usize| tokens.get(column).copied().unwrap_or("");

        let id = token(self.id)
            .parse::<u64>()
            .map_err(|_| malformed(line_number, row))?;
        let atom_type = token(self.atom_type)
            .parse::<usize>()
            .map_err(|_| malformed(line_number, row))?;
        let mut position = [0.0; 3];
        for (axis, column) in self.position.iter().enumerate() {
            position[axis] = token(*column)
                .parse::<f64>()
                .map_err(|_| malformed(line_number, row))?;
        }

        Ok((id, atom_type, position))
    }
}

fn malformed(line_number: usize, line: &str) -> DiffusionError {
    DiffusionError::data_precondition(
        "DATA.DUMP_FORMAT",
        format!(
            "unexpected content at line {} of LAMMPS dump: '{}'",
            line_number,
            line.trim()
        ),
    )
}
