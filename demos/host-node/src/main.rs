//! A node running on a host.
//!
//! The node exposes the built-in items on in-memory pins: a motion sensor
//! that can be stimulated periodically and a relay whose level is logged.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use qnode::items::{register_host, register_pir, register_relay};
use qnode::registry::TypeRegistry;

use qnode_os::config::NodeConfig;
use qnode_os::error::Error;
use qnode_os::gpio::VirtualPin;
use qnode_os::runner::{host_hub, run};

use tokio_util::sync::CancellationToken;

use tracing::{info, warn};

// How long a simulated motion stays detected.
const MOTION_PULSE: Duration = Duration::from_secs(1);

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Node configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Broker host, overriding the configuration file.
    #[arg(long)]
    broker: Option<String>,

    /// Node host name, overriding the configuration file.
    #[arg(long)]
    hostname: Option<String>,

    /// Simulates a motion every given number of seconds.
    #[arg(long)]
    motion_every: Option<u64>,
}

fn node_config(cli: &Cli) -> Result<NodeConfig, Error> {
    let mut config = match &cli.config {
        Some(path) => NodeConfig::load(path)?,
        None => NodeConfig::default(),
    };
    if let Some(broker) = &cli.broker {
        config.broker.host.clone_from(broker);
    }
    if let Some(hostname) = &cli.hostname {
        config.hub.hostname = Some(hostname.clone());
    }
    if config.hub.firmware.is_empty() {
        config.hub.firmware = concat!("host-node ", env!("CARGO_PKG_VERSION")).into();
    }
    Ok(config)
}

async fn simulate_motion(pin: VirtualPin, every: Duration, cancellation_token: CancellationToken) {
    let mut interval = tokio::time::interval(every);
    loop {
        tokio::select! {
            () = cancellation_token.cancelled() => { break; }
            _ = interval.tick() => {
                info!("Simulated motion");
                pin.set(true);
                tokio::time::sleep(MOTION_PULSE).await;
                pin.set(false);
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt().init();

    let cli = Cli::parse();
    let config = node_config(&cli)?;

    let motion = VirtualPin::new();
    let relay = VirtualPin::new();

    let mut registry = TypeRegistry::new();
    let _ = register_host(&mut registry);
    let sensor = motion.clone();
    let _ = register_pir(&mut registry, move || sensor.clone());
    let output = relay.clone();
    let _ = register_relay(&mut registry, move || output.clone());

    let mut hub = host_hub(&config, registry)?;
    if let Some(mut host) = hub.registry_mut().create("HOST") {
        host.core_mut().set_id("host");
        let _ = hub.attach(host);
    }

    let cancellation_token = CancellationToken::new();

    if let Some(secs) = cli.motion_every {
        let _ = tokio::spawn(simulate_motion(
            motion,
            Duration::from_secs(secs.max(1)),
            cancellation_token.clone(),
        ));
    }

    let stopper = cancellation_token.clone();
    let _ = tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => stopper.cancel(),
            Err(e) => warn!("Unable to listen for the shutdown signal: {e}"),
        }
    });

    run(&mut hub, config.tick(), cancellation_token).await;
    info!("Relay level at shutdown: {}", relay.level());

    Ok(())
}
