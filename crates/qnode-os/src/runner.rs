use std::time::Duration;

use qnode::hub::Hub;
use qnode::platform::{Platform, Resources};
use qnode::registry::TypeRegistry;

use tokio::time::MissedTickBehavior;

use tokio_util::sync::CancellationToken;

use tracing::info;

use crate::HostPlatform;
use crate::clock::StdClock;
use crate::config::NodeConfig;
use crate::error::Result;
use crate::link::HostLink;
use crate::mqtt::MqttTransport;
use crate::storage::FileStorage;
use crate::time::SystemTimeSync;

/// Creates a [`Hub`] running on the host collaborators described by
/// `config`.
///
/// # Errors
///
/// Returns an error when called outside of a `tokio` runtime.
pub fn host_hub(config: &NodeConfig, registry: TypeRegistry) -> Result<Hub<HostPlatform>> {
    let resources = Resources {
        clock: StdClock::new(),
        link: HostLink::new(&config.broker.host, config.broker.port),
        transport: MqttTransport::new(config.broker.clone())?,
        time_sync: SystemTimeSync::new(),
        storage: FileStorage::new(&config.storage),
    };
    Ok(Hub::new(config.hub.clone(), registry, resources))
}

/// Runs scheduler passes every `period` until `cancellation_token` is
/// cancelled.
///
/// A pass that overruns its period delays the following ones instead of
/// bursting to catch up.
pub async fn run<P: Platform>(
    hub: &mut Hub<P>,
    period: Duration,
    cancellation_token: CancellationToken,
) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!("Node `{}` running", hub.hostname());
    loop {
        tokio::select! {
            () = cancellation_token.cancelled() => { break; }
            _ = interval.tick() => hub.tick(),
        }
    }
    info!("Node `{}` stopped", hub.hostname());
}
