use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use crossbeam_channel::RecvTimeoutError;
use tracing_subscriber::EnvFilter;

use montage::media::MediaBackend as _;
use montage::media::file::FileBackend;
use montage::{EngineConfig, RenderEvent, RenderState, TimelineState, VideoEngine};

#[derive(Parser, Debug)]
#[command(name = "montage", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render a saved timeline to a media file (requires `ffmpeg` on PATH).
    Render(RenderArgs),
    /// Composite one timeline frame into a PNG.
    Frame(FrameArgs),
    /// Print the streams and duration of a media file as JSON.
    Probe(ProbeArgs),
}

#[derive(Parser, Debug)]
struct RenderArgs {
    /// Input timeline JSON.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Output media path.
    #[arg(long)]
    out: PathBuf,

    /// Engine config JSON; defaults apply to anything it leaves out.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Parser, Debug)]
struct FrameArgs {
    /// Input timeline JSON.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Timeline time in seconds.
    #[arg(long, default_value_t = 0.0)]
    at: f64,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,

    /// Engine config JSON.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Parser, Debug)]
struct ProbeArgs {
    /// Media file to inspect.
    path: PathBuf,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Render(args) => cmd_render(args),
        Command::Frame(args) => cmd_frame(args),
        Command::Probe(args) => cmd_probe(args),
    }
}

fn read_config(path: Option<&Path>) -> anyhow::Result<EngineConfig> {
    match path {
        Some(p) => EngineConfig::from_json_file(p)
            .with_context(|| format!("load config '{}'", p.display())),
        None => Ok(EngineConfig::default()),
    }
}

fn load_engine(in_path: &Path, config: Option<&Path>) -> anyhow::Result<VideoEngine> {
    let cfg = read_config(config)?;
    let mut state = TimelineState::load_from_file(in_path)?;
    let base = in_path.parent().unwrap_or_else(|| Path::new("."));
    state.resolve_paths(base);

    let mut engine = VideoEngine::with_file_backend(cfg)?;
    engine
        .load_state(&state)
        .with_context(|| format!("restore timeline '{}'", in_path.display()))?;
    for d in engine.timeline().into_iter().flat_map(|t| t.descriptors()) {
        if let Some(e) = d.clip().open_error() {
            tracing::warn!(clip = d.id().0, error = %e, "clip failed to open and will be blank");
        }
    }
    Ok(engine)
}

fn cmd_render(args: RenderArgs) -> anyhow::Result<()> {
    let mut engine = load_engine(&args.in_path, args.config.as_deref())?;
    let events = engine.subscribe_render();
    let handle = engine.start_render(args.out.clone(), None)?;

    let mut reported = 0u32;
    loop {
        match events.recv_timeout(Duration::from_millis(250)) {
            Ok(RenderEvent::Progress(p)) => {
                let pct = (p * 100.0) as u32;
                if pct >= reported + 10 {
                    reported = pct - pct % 10;
                    eprintln!("{reported}%");
                }
            }
            Ok(RenderEvent::Finished(_)) | Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) if handle.state().is_terminal() => break,
            Err(RecvTimeoutError::Timeout) => {}
        }
    }

    match engine.finish_render()? {
        RenderState::Completed => {
            eprintln!("wrote {}", args.out.display());
            Ok(())
        }
        other => anyhow::bail!("render ended as {other:?}"),
    }
}

fn cmd_frame(args: FrameArgs) -> anyhow::Result<()> {
    let mut engine = load_engine(&args.in_path, args.config.as_deref())?;
    let frame = engine
        .frame_at(args.at)?
        .with_context(|| format!("timeline has no frame at {}s", args.at))?;

    if let Some(parent) = args.out.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    image::save_buffer_with_format(
        &args.out,
        &frame.data,
        frame.width,
        frame.height,
        image::ColorType::Rgba8,
        image::ImageFormat::Png,
    )
    .with_context(|| format!("write png '{}'", args.out.display()))?;

    eprintln!("wrote {}", args.out.display());
    Ok(())
}

fn cmd_probe(args: ProbeArgs) -> anyhow::Result<()> {
    let info = FileBackend::default()
        .probe(&args.path)
        .with_context(|| format!("probe '{}'", args.path.display()))?;
    println!("{}", serde_json::to_string_pretty(&info)?);
    Ok(())
}
