//! unbsp: rebuild an editable `.map` from a decoded BSP lump dump.
//!
//! Usage:
//!   unbsp level.json -o level.map
//!   unbsp level.json --config settings.json --to-world --report report.json

use std::{fs, io::BufWriter, path::PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{Level, info, warn};
use tracing_subscriber::FmtSubscriber;
use unbsp::unbsp_map::{MapWriter, OutputSink};
use unbsp::{BspLumps, DecompileConfig, TracingReporter};

#[derive(Parser, Debug)]
#[command(name = "unbsp")]
#[command(about = "Decompile BSP brushes into an editable map")]
struct Args {
    /// Decoded lumps as JSON
    lumps: PathBuf,

    /// Output map file (defaults to the input with a .map extension)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Settings file (JSON); flags below override it
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Write the run report as JSON
    #[arg(long)]
    report: Option<PathBuf>,

    /// Replace flagged surfaces with the null texture
    #[arg(long)]
    null_textures: bool,

    /// Compute full side polygons
    #[arg(long)]
    vertices: bool,

    /// Skip plane-consistency correction
    #[arg(long)]
    no_correction: bool,

    /// Ignore face vertices and derive every side from its plane
    #[arg(long)]
    planes_only: bool,

    /// Attach all brushes to worldspawn
    #[arg(long)]
    to_world: bool,

    /// Write surface flags as 0
    #[arg(long)]
    strip_flags: bool,

    /// Decompile on a single thread
    #[arg(long)]
    single_threaded: bool,

    /// Enable verbose debug logging
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn config(&self) -> Result<DecompileConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let json = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
                DecompileConfig::from_json_str(&json).with_context(|| format!("parsing {}", path.display()))?
            }
            None => DecompileConfig::default(),
        };
        config.replace_with_null |= self.null_textures;
        config.calculate_vertices |= self.vertices;
        config.correct_planes &= !self.no_correction;
        config.use_face_vertices &= !self.planes_only;
        config.brushes_to_world |= self.to_world;
        config.strip_face_flags |= self.strip_flags;
        config.parallel &= !self.single_threaded;
        Ok(config)
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    let log_level = if args.verbose { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .compact()
        .init();

    let config = args.config()?;
    let json = fs::read_to_string(&args.lumps).with_context(|| format!("reading {}", args.lumps.display()))?;
    let lumps = BspLumps::from_json_str(&json).with_context(|| format!("parsing {}", args.lumps.display()))?;
    info!("Loaded {} brushes, {} brush sides", lumps.brushes.len(), lumps.brush_sides.len());

    let decompiled = unbsp::decompile(&lumps, &config, &TracingReporter::default())?;

    let output = args.output.clone().unwrap_or_else(|| args.lumps.with_extension("map"));
    let file = fs::File::create(&output).with_context(|| format!("creating {}", output.display()))?;
    MapWriter::new(BufWriter::new(file))
        .write_entities(&decompiled.entities)
        .with_context(|| format!("writing {}", output.display()))?;
    info!("Wrote {}", output.display());

    if let Some(path) = &args.report {
        let json = serde_json::to_string_pretty(&decompiled.report)?;
        fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
    }

    let errors = decompiled.report.error_count();
    if errors > 0 {
        warn!("{errors} brushes or entities were skipped");
    }
    Ok(())
}
