//! G-Code generator for splice calibration ("bleed") squares.
//!
//! Reads the printer, filament and splicer settings out of a slicer-generated G-code file, and
//! writes a program printing one purge square per tool transition, with the splicer header
//! in front.
use anyhow::{Context, Result};
use bleed::config::{GeneratorSettings, PrintConfig, SlicerConfig};
use bleed::program::Program;
use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use structopt::StructOpt;
use tracing_subscriber::EnvFilter;

#[derive(Debug, StructOpt)]
#[structopt(
    name = "bleed_gen",
    about = "Generates a splice calibration print for a four-input filament splicer"
)]
struct Opt {
    /// Slicer output to take the printer settings from
    #[structopt(short, long, parse(from_os_str), default_value = "head.gcode")]
    config: PathBuf,

    /// Output file for the resulting G code
    #[structopt(short, long, parse(from_os_str), default_value = "bleed_test.gcode")]
    output: PathBuf,

    /// Space left around the edge of the bed, in mm
    #[structopt(long, default_value = "10")]
    margin: f64,

    /// Space between squares, in mm
    #[structopt(long, default_value = "5")]
    padding: f64,

    /// Volume of the first square, in mm³
    #[structopt(long, default_value = "200")]
    initial_volume: f64,

    /// Volume of each square after a toolchange, in mm³
    #[structopt(long, default_value = "500")]
    transition_volume: f64,

    /// Volume of one fill line, in mm³. Sets the width of the squares.
    #[structopt(long, default_value = "5")]
    line_volume: f64,

    /// Filament used by the start code's priming line, in mm
    #[structopt(long, default_value = "21.5")]
    priming_stroke: f64,

    /// Overwrite the output file if it exists
    #[structopt(long)]
    force: bool,
}

fn settings(opt: &Opt) -> GeneratorSettings {
    GeneratorSettings {
        margin: opt.margin,
        padding: opt.padding,
        initial_volume: opt.initial_volume,
        transition_volume: opt.transition_volume,
        line_volume: opt.line_volume,
        priming_stroke: opt.priming_stroke,
        ..Default::default()
    }
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let opt = Opt::from_args();
    let raw = SlicerConfig::load(&opt.config)
        .with_context(|| format!("Failed to read {}", opt.config.display()))?;
    let config = PrintConfig::from_slicer(&raw)
        .with_context(|| format!("Bad configuration in {}", opt.config.display()))?;
    let settings = settings(&opt);
    let program = Program::new(&config, &settings)?;

    // Generate before touching the output, so a failed run leaves no partial file
    let mut gcode: Vec<u8> = Vec::new();
    let summary = program.generate(&mut gcode)?;

    let mut file = BufWriter::new(
        OpenOptions::new()
            .write(true)
            .create(true)
            .create_new(!opt.force)
            .truncate(true)
            .open(&opt.output)
            .with_context(|| format!("Failed to create {}", opt.output.display()))?,
    );
    file.write_all(&gcode)?;
    file.flush()?;

    println!(
        "Wrote {}: {} splices, {} pings, {:.1}mm of filament",
        opt.output.display(),
        summary.splices,
        summary.pings,
        summary.total_extruded
    );
    Ok(())
}
