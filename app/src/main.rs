use anyhow::Context;
use clap::Parser;
use gridguide_core::{AppContext, Devices, Event};
use gridguide_infra_midi_midir::{MidirMidiInputPort, MidirMidiOutputPort};
use gridguide_infra_storage_fs::FsStorage;
use gridguide_ports::midi::{MidiInputPort, MidiOutputPort};
use gridguide_ports::storage::{Settings, StoragePort};
use std::path::PathBuf;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "gridguide",
    version,
    about = "Lights guide notes on a grid controller and scores how well they are played"
)]
struct Args {
    /// Settings file, defaults to <config dir>/gridguide/settings.json
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print the available MIDI ports and exit
    #[arg(long)]
    list_ports: bool,

    /// Write default settings to the settings file and exit
    #[arg(long)]
    write_default_config: bool,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let storage = match args.config {
        Some(path) => FsStorage::from_file(path),
        None => FsStorage::user_config()?,
    };
    let inputs = MidirMidiInputPort::default();
    let outputs = MidirMidiOutputPort::default();

    if args.list_ports {
        return print_ports(&inputs, &outputs);
    }

    if args.write_default_config {
        storage
            .save_settings(&Settings::default())
            .with_context(|| format!("writing {}", storage.settings_path().display()))?;
        info!(path = %storage.settings_path().display(), "wrote default settings");
        return Ok(());
    }

    let settings = storage
        .load_settings()
        .with_context(|| format!("loading {}", storage.settings_path().display()))?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(run(settings, &inputs, &outputs))
}

async fn run(
    settings: Settings,
    inputs: &dyn MidiInputPort,
    outputs: &dyn MidiOutputPort,
) -> anyhow::Result<()> {
    let (tx, rx) = mpsc::unbounded_channel();
    let devices = Devices::open(&settings, inputs, outputs, tx);

    let (ctx, mut events) = AppContext::new(settings, devices.output.clone(), devices.forwards.clone());
    ctx.start();

    let event_log = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                Event::LayoutChanged { layout } => debug!(?layout, "layout event"),
                Event::TimingFeedback { result, class } => {
                    debug!(note = %result.identifier, offset_ms = ?result.offset_ms, ?class, "timing event")
                }
                Event::StatsFlushed { stats } => debug!(score = stats.score, "stats event"),
            }
        }
    });

    ctx.clone()
        .run(rx, async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                warn!(error = %err, "could not listen for ctrl-c");
            }
        })
        .await;
    info!("shutting down");

    ctx.shutdown();
    devices.close();
    event_log.abort();
    Ok(())
}

fn print_ports(inputs: &dyn MidiInputPort, outputs: &dyn MidiOutputPort) -> anyhow::Result<()> {
    println!("inputs:");
    for device in inputs.list_inputs()? {
        println!("  {}", device.name);
    }
    println!("outputs:");
    for device in outputs.list_outputs()? {
        println!("  {}", device.name);
    }
    Ok(())
}
