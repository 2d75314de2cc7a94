use super::CliError;
use super::helpers::*;
use diffusion_core::domain::{DataSource, DiscardInit, DiscardWindow};
use diffusion_core::io::{DumpOptions, InputData, discard_steps_to_rows, load_input};
use diffusion_core::modules::serialization::{format_fixed_f64, format_scientific_f64};
use diffusion_core::modules::{
    DiffusionRecord, JumpDetectorConfig, analyze_input, arrhenius_from_records,
    collect_record_paths, detect_jumps, diffusion_vs_window,
};
use std::path::PathBuf;
use tracing::info;

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub(super) enum InputFormat {
    /// LAMMPS dump with per-atom positions
    Dump,
    /// LAMMPS thermo log with an MSD column
    Thermo,
    /// JSON trajectory with time, symbols and positions
    Json,
}

impl InputFormat {
    fn data_source(self) -> DataSource {
        match self {
            Self::Dump => DataSource::LammpsDump,
            Self::Thermo => DataSource::LammpsThermo,
            Self::Json => DataSource::JsonTrajectory,
        }
    }
}

#[derive(clap::Args)]
pub(super) struct MsdArgs {
    /// Trajectory or thermo log to analyze
    input: PathBuf,

    /// Input format
    #[arg(long, value_enum, default_value_t = InputFormat::Dump)]
    format: InputFormat,

    /// JSON analysis settings; explicit flags take precedence
    #[arg(long)]
    config: Option<PathBuf>,

    /// MSD mode: bare or timesliced
    #[arg(long)]
    mode: Option<String>,

    #[command(flatten)]
    discard: DiscardFlags,

    /// Initial discard in MD steps (thermo input only)
    #[arg(
        long,
        requires = "md_timestep",
        conflicts_with_all = ["discard_init_frames", "discard_init_time"]
    )]
    discard_init_md_steps: Option<usize>,

    /// MD integration timestep in ps, used with --discard-init-md-steps
    #[arg(long)]
    md_timestep: Option<f64>,

    /// Element symbol of the diffusing species, or `all`
    #[arg(long)]
    atom_type: Option<String>,

    /// Temperature in K recorded with the result
    #[arg(long)]
    temperature: Option<f64>,

    /// Time between dump frames in ps
    #[arg(long)]
    timestep: Option<f64>,

    /// Atomic number for each LAMMPS atom type, in type order
    #[arg(long, value_delimiter = ',')]
    atomic_numbers: Vec<usize>,

    /// Trailing dump frames to drop
    #[arg(long, default_value_t = 0)]
    skip_last: usize,

    /// Directory receiving the record and summary
    #[arg(long, default_value = "OUT")]
    output_dir: PathBuf,

    /// Base file name of the record and summary
    #[arg(long, default_value = "MsdData")]
    rootname: String,

    /// Print a JSON summary instead of the text summary
    #[arg(long)]
    json: bool,
}

pub(super) fn run_msd_command(args: MsdArgs) -> Result<i32, CliError> {
    let source = args.format.data_source();
    if args.discard_init_md_steps.is_some() && source.provides_positions() {
        return Err(CliError::Usage(
            "--discard-init-md-steps is only valid with --format thermo".to_string(),
        ));
    }

    let mut settings = load_settings(args.config.as_deref())?;
    if let Some(mode) = args.mode.as_deref() {
        settings.msd_mode = parse_mode(mode)?;
    }
    if let Some(atom_type) = args.atom_type {
        settings.atom_type = atom_type;
    }
    if args.temperature.is_some() {
        settings.temperature = args.temperature;
    }
    let window = args.discard.window_over(settings.discard_window());
    settings.discard_init = window.init;
    settings.discard_final = window.final_frames;
    settings.validate()?;

    let dump_options = DumpOptions {
        timestep_ps: args.timestep,
        atomic_numbers: args.atomic_numbers,
        skip_last: args.skip_last,
        temperature: settings.temperature,
    };
    let input = load_input(&args.input, source, &dump_options)?;

    if let (Some(steps), Some(md_timestep), InputData::Precomputed(series)) =
        (args.discard_init_md_steps, args.md_timestep, &input)
    {
        let rows = discard_steps_to_rows(steps, md_timestep, &series.time)?;
        info!(steps, rows, "initial discard converted from MD steps");
        settings.discard_init = DiscardInit::Frames(rows);
    }

    let outcome = analyze_input(&input, source, &settings)?;
    let record = DiffusionRecord::from_outcome(&outcome);
    let paths = record.write(&args.output_dir, &args.rootname)?;

    if args.json {
        print_json(&serde_json::json!({
            "diffusion_coefficient": record.diffusion_coefficient,
            "diffusion_coefficient_std_error": record.diffusion_coefficient_std_error,
            "temperature": record.temperature,
            "msd_type": record.msd_type,
            "retained_points": outcome.estimate.retained_points,
            "confidence": outcome.estimate.confidence,
            "record": paths.record,
            "summary": paths.summary,
        }))?;
    } else {
        println!("{}", record.summary_text());
        if let Some(reason) = outcome.estimate.confidence.reason() {
            println!("Warning: {}", reason);
        }
        println!("Record: {}", paths.record.display());
        println!("Summary: {}", paths.summary.display());
    }
    Ok(0)
}

#[derive(clap::Args)]
pub(super) struct RecomputeArgs {
    /// Result record written by `msd`
    record: PathBuf,

    #[command(flatten)]
    discard: DiscardFlags,

    /// Overwrite the record and summary with the new fit
    #[arg(long)]
    write: bool,

    /// Output directory for --write (defaults to the record's directory)
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Base file name for --write (defaults to the record's file stem)
    #[arg(long)]
    rootname: Option<String>,

    /// Print the new estimate as JSON
    #[arg(long)]
    json: bool,
}

pub(super) fn run_recompute_command(args: RecomputeArgs) -> Result<i32, CliError> {
    let record = read_record(&args.record)?;
    let stored = DiscardWindow::frames(record.discard_init_steps, record.discard_final_steps);
    let (estimate, updated) = record.recompute(args.discard.window_over(stored))?;

    let written = if args.write {
        let (default_dir, default_rootname) = record_location(&args.record);
        let output_dir = args.output_dir.unwrap_or(default_dir);
        let rootname = args.rootname.unwrap_or(default_rootname);
        Some(updated.write(&output_dir, &rootname)?)
    } else {
        None
    };

    if args.json {
        print_json(&estimate)?;
    } else {
        println!(
            "Previous diffusion coefficient: {} cm^2/s",
            format_scientific_f64(record.diffusion_coefficient, 5)
        );
        println!(
            "Recomputed diffusion coefficient: {} cm^2/s{}",
            format_scientific_f64(estimate.diffusion_coefficient, 5),
            confidence_note(&estimate.confidence)
        );
        println!(
            "Standard error: {} cm^2/s",
            format_optional(estimate.standard_error)
        );
        println!(
            "Fit window: frames {}..{} ({} points)",
            estimate.discard_init_frames,
            estimate.discard_init_frames + estimate.retained_points,
            estimate.retained_points
        );
        if let Some(paths) = &written {
            println!("Record: {}", paths.record.display());
            println!("Summary: {}", paths.summary.display());
        }
    }
    Ok(0)
}

#[derive(clap::Args)]
pub(super) struct ConvergenceArgs {
    /// Result record written by `msd`
    record: PathBuf,

    /// Print the convergence points as JSON
    #[arg(long)]
    json: bool,
}

pub(super) fn run_convergence_command(args: ConvergenceArgs) -> Result<i32, CliError> {
    let record = read_record(&args.record)?;
    let points = diffusion_vs_window(&record.time, &record.mean_squared_displacement)?;

    if args.json {
        print_json(&points)?;
        return Ok(0);
    }

    println!(
        "{:>12} {:>8} {:>14} {:>14}",
        "window_ps", "windows", "D_mean", "D_std"
    );
    for point in &points {
        println!(
            "{} {:>8} {:>14} {:>14}{}",
            format_fixed_f64(point.window_width_ps, 12, 4),
            point.window_count,
            format_scientific_f64(point.mean_diffusion, 5),
            format_optional(point.std_diffusion),
            confidence_note(&point.confidence)
        );
    }
    Ok(0)
}

#[derive(clap::Args)]
pub(super) struct JumpsArgs {
    /// Result record written by `msd` from a trajectory with positions
    record: PathBuf,

    /// JSON analysis settings whose `jumps` section seeds the detector
    #[arg(long)]
    config: Option<PathBuf>,

    /// Candidate frames have per-atom MSD above this value in A^2 [default: 4]
    #[arg(long)]
    threshold: Option<f64>,

    /// Minimum MSD rise over the baseline in A^2 [default: 2]
    #[arg(long)]
    min_excursion: Option<f64>,

    /// Frames averaged into the trailing baseline [default: 200]
    #[arg(long)]
    lookback: Option<usize>,

    /// Print the jump report as JSON
    #[arg(long)]
    json: bool,
}

pub(super) fn run_jumps_command(args: JumpsArgs) -> Result<i32, CliError> {
    let base = load_settings(args.config.as_deref())?.jumps;
    let config = JumpDetectorConfig {
        threshold: args.threshold.unwrap_or(base.threshold),
        min_excursion: args.min_excursion.unwrap_or(base.min_excursion),
        lookback: args.lookback.unwrap_or(base.lookback),
    };
    let record = read_record(&args.record)?;
    let curve = record.msd_curve()?;
    let report = detect_jumps(&curve, &config)?;

    if args.json {
        print_json(&report)?;
        return Ok(0);
    }

    println!(
        "{} jump(s) across {} of {} atoms",
        report.total_events(),
        report.jumping_atoms.len(),
        report.events.len()
    );
    for event in report.events.iter().flatten() {
        let atom = record
            .atom_indices
            .get(event.atom_index)
            .copied()
            .unwrap_or(event.atom_index);
        let start = record.time.get(event.start_frame).copied().unwrap_or(0.0);
        let end = record.time.get(event.end_frame).copied().unwrap_or(start);
        println!(
            "atom {}: frames {}-{} ({} frames, {:.3}-{:.3} ps), peak MSD {:.3} A^2",
            atom,
            event.start_frame,
            event.end_frame,
            event.frame_span(),
            start,
            end,
            event.peak_msd
        );
    }
    Ok(0)
}

#[derive(clap::Args)]
pub(super) struct ArrheniusArgs {
    /// Result records at different temperatures
    records: Vec<PathBuf>,

    /// Directory searched for records
    #[arg(long)]
    dir: Option<PathBuf>,

    /// File-name glob applied inside --dir
    #[arg(long, default_value = "*.json")]
    pattern: String,

    /// Print the fit as JSON
    #[arg(long)]
    json: bool,
}

pub(super) fn run_arrhenius_command(args: ArrheniusArgs) -> Result<i32, CliError> {
    if args.records.is_empty() && args.dir.is_none() {
        return Err(CliError::Usage(
            "provide record paths or --dir with the records to fit".to_string(),
        ));
    }

    let mut paths = args.records;
    if let Some(dir) = &args.dir {
        paths.extend(collect_record_paths(dir, &args.pattern)?);
    }
    let records = paths
        .iter()
        .map(|path| read_record(path))
        .collect::<Result<Vec<_>, _>>()?;
    info!(records = records.len(), "fitting Arrhenius relation");
    let result = arrhenius_from_records(&records)?;

    if args.json {
        print_json(&result)?;
        return Ok(0);
    }

    println!("{:>10} {:>14}  record", "T_K", "D_cm2_s");
    for (path, record) in paths.iter().zip(&records) {
        println!(
            "{} {:>14}  {}",
            format_fixed_f64(record.temperature.unwrap_or(f64::NAN), 10, 1),
            format_scientific_f64(record.diffusion_coefficient, 5),
            path.display()
        );
    }
    println!(
        "Activation energy: {:.4} eV{}",
        result.activation_energy_ev,
        confidence_note(&result.confidence)
    );
    println!(
        "Standard error: {}",
        result
            .std_error_ev
            .map(|value| format!("{:.4} eV", value))
            .unwrap_or_else(|| "n/a".to_string())
    );
    println!(
        "Prefactor D0: {} cm^2/s",
        format_scientific_f64(result.prefactor, 5)
    );
    Ok(0)
}
