use std::fs::OpenOptions;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::Parser;
use rdf_core::connection::ConnectionManager;
use rdf_core::events::{FlashState, TracingObserver};
use rdf_core::session::{FlashJob, FlashSession, SessionConfig};
use rdf_core::source::FileSource;
use rdf_core::transport::{AccessoryChannel, ChannelKind, TcpAcceptor, TransportChannel};
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(author, version, about = "RDF image transfer host agent", long_about = None)]
struct Args {
    /// Path to the image to send
    #[arg(long)]
    image: Option<String>,

    /// Target subvolume label written into the header
    #[arg(long)]
    label: Option<String>,

    /// Listen on this TCP port and accept the receiver
    #[arg(long)]
    port: Option<u16>,

    /// Use an already-open accessory device node instead of TCP
    #[arg(long, conflicts_with = "port")]
    accessory: Option<String>,

    /// Load defaults from a TOML config file
    #[arg(long)]
    config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let args = Args::parse();

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(if args.verbose {
                    tracing::Level::DEBUG.into()
                } else {
                    tracing::Level::INFO.into()
                })
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    if let Err(e) = run(args) {
        error!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<()> {
    let config = match &args.config {
        Some(path) => {
            SessionConfig::load_from_file(path).with_context(|| format!("loading config {path}"))?
        }
        None => SessionConfig::default(),
    };

    let image = args
        .image
        .or(config.image_path)
        .context("no image given (use --image or a config file)")?;
    let label = args
        .label
        .or(config.target_label)
        .unwrap_or_else(|| rdf_core::DEFAULT_TARGET_LABEL.to_string());
    let port = args
        .port
        .or(config.listen_port)
        .unwrap_or(rdf_core::DEFAULT_LISTEN_PORT);

    let observer = Arc::new(TracingObserver);
    let manager = ConnectionManager::new(observer.clone());
    let session = FlashSession::with_observer(observer);

    let source = FileSource::open(&image).with_context(|| format!("opening {image}"))?;
    session.select_source(FlashJob::new(Arc::new(source)).with_target_label(label))?;

    match &args.accessory {
        Some(node) => {
            // The platform already ran the accessory negotiation; we only
            // open the resulting node. On a plain host, a successful open
            // doubles as the authorization grant.
            let file = OpenOptions::new()
                .read(true)
                .write(true)
                .open(node)
                .with_context(|| format!("opening accessory node {node}"))?;
            let channel: Arc<dyn TransportChannel> = Arc::new(AccessoryChannel::from_file(file)?);
            manager.on_channel_available(ChannelKind::Accessory, channel);
            manager.on_authorization(true)?;
        }
        None => {
            info!(port, "Waiting for the receiver to connect...");
            let channel = TcpAcceptor::bind(port)?.accept_one()?;
            manager.on_channel_available(ChannelKind::Socket, Arc::new(channel));
        }
    }

    session.start(&manager)?;
    session.wait();

    match session.state() {
        FlashState::Complete => {
            info!("Flash complete");
            Ok(())
        }
        state => bail!("transfer ended in state {state}"),
    }
}
