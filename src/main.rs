use std::{
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use clap::Parser;
use env_logger::Env;
use log::info;

use ring_coherence_sim::{SimConfig, Simulator, Summary, TraceFile};

#[derive(Parser, Debug)]
#[command(
    name = "ring-coherence-sim",
    version,
    about = "Replay memory traces on a 4-core ring with a coherence directory"
)]
struct Cli {
    /// Trace files to replay, each in a fresh system.
    #[arg(required = true)]
    traces: Vec<PathBuf>,

    /// Directory for the reports (defaults to the directory of each trace).
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Blocks held by each prefetch/victim buffer.
    #[arg(long, default_value_t = SimConfig::default().victim_entries)]
    victim_entries: usize,

    /// Extra blocks prefetched on every memory access.
    #[arg(long, default_value_t = SimConfig::default().prefetch_blocks as u8,
          value_parser = clap::value_parser!(u8).range(0..=3))]
    prefetch_blocks: u8,

    /// Start with per-operation narration on (the trace's `v` lines toggle it).
    #[arg(short, long)]
    verbose: bool,

    /// Verify coherence invariants after every operation.
    #[arg(long)]
    check: bool,
}

fn main() -> Result<()> {
    let env = Env::default().filter_or("COHERENCE_LOG", "warn");
    env_logger::init_from_env(env);

    let cli = Cli::parse();
    let config = SimConfig {
        victim_entries: cli.victim_entries,
        prefetch_blocks: usize::from(cli.prefetch_blocks),
        ..Default::default()
    };

    let traces = load_traces(&cli.traces)?;
    println!("Loaded {} trace files.", traces.len());

    let stdout = io::stdout();
    for (trace, path) in traces.iter().zip(&cli.traces) {
        let mut out = stdout.lock();
        let mut sim = Simulator::new(config.clone())
            .with_verbose(cli.verbose)
            .with_checks(cli.check);
        let summary = sim.run(trace, &mut out)?;

        let report = report_path(path, cli.output.as_deref());
        fs::write(&report, summary.to_string())
            .with_context(|| format!("Unable to write report {}", report.display()))?;
        info!("wrote {}", report.display());
        print_summary(&mut out, &trace.name, &summary)?;
    }
    Ok(())
}

fn print_summary(out: &mut impl Write, name: &str, summary: &Summary) -> io::Result<()> {
    writeln!(
        out,
        "  {:<16} accesses {:>8}  private {:>8}  remote {:>8}  off-chip {:>8}  avg {:>8.2}",
        name,
        summary.total_accesses,
        summary.private_accesses,
        summary.remote_accesses,
        summary.off_chip_accesses,
        summary.average_latency
    )
}

fn load_traces(paths: &[PathBuf]) -> Result<Vec<TraceFile>> {
    let mut traces = Vec::new();
    for path in paths {
        traces.push(TraceFile::load(path)?);
    }
    Ok(traces)
}

// out_<trace name>, next to the trace unless an output directory is given
fn report_path(trace: &Path, output: Option<&Path>) -> PathBuf {
    let name = trace
        .file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_else(|| "trace".to_string());
    let dir = output
        .map(Path::to_path_buf)
        .or_else(|| trace.parent().map(Path::to_path_buf))
        .unwrap_or_default();
    dir.join(format!("out_{name}"))
}
