use std::{
    fs::File,
    io::{BufReader, Write as _},
    path::{Path, PathBuf},
};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "clipweave", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compose a video (requires `ffmpeg` and `ffprobe` on PATH).
    Render(RenderArgs),
    /// Print the compiled filter graph without running ffmpeg.
    Graph(GraphArgs),
    /// Print what ffprobe reports about one source, as JSON.
    Probe(ProbeArgs),
}

#[derive(Parser, Debug)]
struct RenderArgs {
    /// Input composition JSON.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Output path; overrides `out_path` from the composition.
    #[arg(long)]
    out: Option<PathBuf>,

    /// Render a small low-fps proxy.
    #[arg(long)]
    fast: bool,

    /// Print the ffmpeg command line instead of running it.
    #[arg(long)]
    dry_run: bool,

    /// Refuse to replace an existing output file.
    #[arg(long)]
    no_overwrite: bool,

    #[arg(long, default_value = "ffmpeg")]
    ffmpeg: String,

    #[arg(long, default_value = "ffprobe")]
    ffprobe: String,
}

#[derive(Parser, Debug)]
struct GraphArgs {
    /// Input composition JSON.
    #[arg(long = "in")]
    in_path: PathBuf,

    #[arg(long)]
    fast: bool,

    #[arg(long, default_value = "ffprobe")]
    ffprobe: String,
}

#[derive(Parser, Debug)]
struct ProbeArgs {
    /// Local path or URL.
    source: String,

    #[arg(long, default_value = "ffprobe")]
    ffprobe: String,
}

fn main() -> anyhow::Result<()> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .try_init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Render(args) => cmd_render(args),
        Command::Graph(args) => cmd_graph(args),
        Command::Probe(args) => cmd_probe(args),
    }
}

fn read_comp_json(path: &Path) -> anyhow::Result<clipweave::Composition> {
    let f = File::open(path).with_context(|| format!("open composition '{}'", path.display()))?;
    let r = BufReader::new(f);
    let comp: clipweave::Composition =
        serde_json::from_reader(r).with_context(|| "parse composition JSON")?;
    Ok(comp)
}

fn cmd_render(args: RenderArgs) -> anyhow::Result<()> {
    let mut comp = read_comp_json(&args.in_path)?;
    if let Some(out) = &args.out {
        comp.out_path = out.to_string_lossy().into_owned();
    }

    let opts = clipweave::ComposeOpts {
        ffmpeg: args.ffmpeg,
        ffprobe: args.ffprobe,
        fast: args.fast,
        overwrite: !args.no_overwrite,
        ..clipweave::ComposeOpts::default()
    };

    if args.dry_run {
        let (_, compiled) = clipweave::prepare(&comp, &opts)?;
        println!(
            "{}",
            compiled
                .invocation
                .command_line(&opts.ffmpeg, &opts.loglevel)
        );
        return Ok(());
    }

    clipweave::compose(&comp, &opts)?;
    eprintln!("wrote {}", comp.out_path);
    Ok(())
}

fn cmd_graph(args: GraphArgs) -> anyhow::Result<()> {
    let comp = read_comp_json(&args.in_path)?;
    let opts = clipweave::ComposeOpts {
        ffprobe: args.ffprobe,
        fast: args.fast,
        ..clipweave::ComposeOpts::default()
    };
    let (_, compiled) = clipweave::prepare(&comp, &opts)?;

    let mut out = std::io::stdout().lock();
    for node in compiled.graph.nodes() {
        writeln!(out, "{}", node.render()).context("write graph")?;
    }
    Ok(())
}

fn cmd_probe(args: ProbeArgs) -> anyhow::Result<()> {
    let info = clipweave::probe_media(&args.ffprobe, &args.source)?;
    println!(
        "{}",
        serde_json::to_string_pretty(&info).context("serialize probe result")?
    );
    Ok(())
}
