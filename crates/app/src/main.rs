mod export;

use std::path::{Path, PathBuf};

use beatmap_timing_core::{AudioInfo, EngineConfig, TimingDocument, TimingEngine, TimingRecord};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

fn main() -> beatmap_timing_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::New { output, bpm, offset } => run_new(&output, bpm, offset),
        Commands::Position { document, seconds } => {
            let engine = open_engine(&document, config, cli.duration)?;
            for time in seconds {
                let time = finite(time)?;
                let position = engine.time_to_musical_position(time);
                println!(
                    "{time}\t{position:.6}\tbeat {:.3}",
                    engine.beat_position(time)
                );
            }
            Ok(())
        }
        Commands::Time {
            document,
            positions,
        } => {
            let engine = open_engine(&document, config, cli.duration)?;
            for position in positions {
                let position = finite(position)?;
                println!("{position}\t{:.6}", engine.musical_position_to_time(position));
            }
            Ok(())
        }
        Commands::Grid {
            document,
            from,
            to,
            divisor,
        } => {
            let engine = open_engine(&document, config, cli.duration)?;
            let from = finite(from)?;
            let to = match to {
                Some(to) => finite(to)?,
                None => engine.musical_position_to_time((engine.last_measure() + 1) as f64),
            };
            for line in engine.grid_lines(from, to, divisor) {
                println!(
                    "{:.6}\t{}:{}\t{:?}",
                    line.time_seconds, line.measure, line.index, line.tier
                );
            }
            Ok(())
        }
        Commands::Export { document, output } => {
            let engine = open_engine(&document, config, cli.duration)?;
            run_export(&engine, output.as_deref())
        }
    }
}

fn run_new(output: &Path, bpm: f64, offset: f64) -> beatmap_timing_core::Result<()> {
    tracing::info!(?output, bpm, offset, "writing new timing document");
    let mut engine = TimingEngine::default();
    engine.load_document(&TimingDocument {
        timing_points: vec![TimingRecord {
            offset_seconds: offset,
            bpm,
        }],
        time_signatures: Vec::new(),
    })?;
    engine.to_document().save(output)
}

fn run_export(engine: &TimingEngine, output: Option<&Path>) -> beatmap_timing_core::Result<()> {
    let points = engine.expand_with_boundary_points();
    let synthetic = points.iter().filter(|p| p.synthetic).count();
    tracing::info!(points = points.len(), synthetic, "exporting timing");

    let text = export::format_timing_lines(&points);
    match output {
        Some(path) => std::fs::write(path, text)?,
        None => print!("{text}"),
    }
    Ok(())
}

fn open_engine(
    path: &Path,
    config: EngineConfig,
    duration: Option<f64>,
) -> beatmap_timing_core::Result<TimingEngine> {
    tracing::debug!(?path, "loading timing document");
    let document = TimingDocument::load(path)?;
    let mut engine = TimingEngine::from_document(&document, config)?;
    if let Some(duration) = duration {
        engine.set_audio(AudioInfo::new(duration, 0));
    }
    Ok(engine)
}

fn load_config(path: Option<&Path>) -> beatmap_timing_core::Result<EngineConfig> {
    match path {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .map_err(|err| format!("cannot read config {}: {err}", path.display()))?;
            EngineConfig::from_json_str(&json)
        }
        None => Ok(EngineConfig::default()),
    }
}

fn finite(value: f64) -> beatmap_timing_core::Result<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err("times and positions must be finite numbers".into())
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Tempo and meter mapping for rhythm-game charts", long_about = None)]
struct Cli {
    /// Engine configuration file (JSON).
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    /// Length of the mapped recording in seconds.
    #[arg(short, long, global = true)]
    duration: Option<f64>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write a timing document holding a single tempo point.
    New {
        /// Path of the document to create.
        output: PathBuf,
        /// Tempo of the single timing point.
        #[arg(long, default_value_t = 120.0)]
        bpm: f64,
        /// Offset of the timing point in seconds.
        #[arg(long, default_value_t = 0.0)]
        offset: f64,
    },
    /// Convert playback times to musical positions.
    Position {
        /// Timing document to read.
        document: PathBuf,
        /// Playback times in seconds.
        #[arg(required = true, allow_negative_numbers = true)]
        seconds: Vec<f64>,
    },
    /// Convert musical positions to playback times.
    Time {
        /// Timing document to read.
        document: PathBuf,
        /// Musical positions in measures, e.g. 2.5 for halfway through measure 2.
        #[arg(required = true, allow_negative_numbers = true)]
        positions: Vec<f64>,
    },
    /// List classified grid lines between two times.
    Grid {
        /// Timing document to read.
        document: PathBuf,
        /// Start of the range in seconds.
        #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
        from: f64,
        /// Defaults to the end of the last measure of `--duration`.
        #[arg(long, allow_negative_numbers = true)]
        to: Option<f64>,
        /// Grid lines per beat.
        #[arg(long, default_value_t = 4)]
        divisor: u32,
    },
    /// Print or write the flattened tempo breakpoints for map export.
    Export {
        /// Timing document to read.
        document: PathBuf,
        /// Destination file; prints to stdout when omitted.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}
