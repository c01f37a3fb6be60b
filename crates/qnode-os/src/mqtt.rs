use std::sync::Arc;
use std::sync::atomic::{AtomicI32, Ordering};

use qnode::platform::{Inbound, Transport, state};

use rumqttc::v5::{
    AsyncClient, ConnectionError, Event, EventLoop, MqttOptions, mqttbytes::QoS,
    mqttbytes::v5::Packet,
};

use tokio::runtime::Handle;

use tokio_util::sync::CancellationToken;

use tracing::{debug, error, info, warn};

use crate::config::BrokerConfig;
use crate::error::{Error, ErrorKind, Result};

// The capacity of the client request channel.
const REQUEST_CHANNEL_CAPACITY: usize = 64;

// State code of a session refused by the broker.
const SESSION_REFUSED: i32 = 5;

struct Session {
    client: AsyncClient,
    inbound: flume::Receiver<Inbound>,
    cancellation_token: CancellationToken,
}

/// An `MQTT` [`Transport`].
///
/// Each session runs its network event loop in a task of the `tokio`
/// runtime the transport was created on. Inbound publishes travel to the
/// scheduler over a channel, and requests are queued without waiting, so
/// no method of this transport blocks.
pub struct MqttTransport {
    broker: BrokerConfig,
    runtime: Handle,
    state: Arc<AtomicI32>,
    session: Option<Session>,
}

impl std::fmt::Debug for MqttTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MqttTransport")
            .field("broker", &self.broker)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl MqttTransport {
    /// Creates an [`MqttTransport`] towards `broker`.
    ///
    /// # Errors
    ///
    /// Returns an error when called outside of a `tokio` runtime.
    pub fn new(broker: BrokerConfig) -> Result<Self> {
        let runtime = Handle::try_current()
            .map_err(|e| Error::new(ErrorKind::Transport, e.to_string()))?;
        Ok(Self {
            broker,
            runtime,
            state: Arc::new(AtomicI32::new(state::DISCONNECTED)),
            session: None,
        })
    }

    fn options(&self, client_id: &str) -> MqttOptions {
        let mut options = MqttOptions::new(client_id, self.broker.host.as_str(), self.broker.port);
        let _ = options.set_keep_alive(self.broker.keep_alive());
        if let Some(username) = &self.broker.username {
            let password = self.broker.password.clone().unwrap_or_default();
            let _ = options.set_credentials(username.as_str(), password);
        }
        options
    }

    fn end_session(&mut self) {
        if let Some(session) = self.session.take() {
            if let Err(e) = session.client.try_disconnect() {
                debug!("Disconnect request not sent: {e}");
            }
            session.cancellation_token.cancel();
        }
    }

    fn connected_session(&self) -> Option<&Session> {
        self.session.as_ref().filter(|_| self.is_connected())
    }
}

impl Drop for MqttTransport {
    fn drop(&mut self) {
        self.end_session();
    }
}

fn classify(error: &ConnectionError, was_connected: bool) -> i32 {
    match error {
        ConnectionError::ConnectionRefused(_) => SESSION_REFUSED,
        _ if was_connected => state::CONNECTION_LOST,
        _ => state::CONNECT_FAILED,
    }
}

async fn run_session(
    mut eventloop: EventLoop,
    cancellation_token: CancellationToken,
    session_state: Arc<AtomicI32>,
    sender: flume::Sender<Inbound>,
) {
    loop {
        tokio::select! {
            // Use the cancellation token to stop the loop
            () = cancellation_token.cancelled() => { break; }
            // Poll the `MQTT` event coming from the network
            event = eventloop.poll() => match event {
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    info!("Session established");
                    session_state.store(state::CONNECTED, Ordering::Release);
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    let topic = String::from_utf8_lossy(&publish.topic).into_owned();
                    if sender.send(Inbound::new(topic, publish.payload.to_vec())).is_err() {
                        break;
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    let was_connected = session_state.load(Ordering::Acquire) == state::CONNECTED;
                    error!("Session ended: {e}");
                    session_state.store(classify(&e, was_connected), Ordering::Release);
                    break;
                }
            }
        }
    }
}

impl Transport for MqttTransport {
    fn connect(&mut self, client_id: &str) -> bool {
        self.end_session();

        let (client, eventloop) = AsyncClient::new(self.options(client_id), REQUEST_CHANNEL_CAPACITY);
        let (sender, inbound) = flume::unbounded();
        let cancellation_token = CancellationToken::new();
        self.state.store(state::DISCONNECTED, Ordering::Release);

        drop(self.runtime.spawn(run_session(
            eventloop,
            cancellation_token.clone(),
            Arc::clone(&self.state),
            sender,
        )));

        info!(
            "Connecting to {}:{} as `{client_id}`",
            self.broker.host, self.broker.port
        );
        self.session = Some(Session {
            client,
            inbound,
            cancellation_token,
        });
        false
    }

    fn is_connected(&self) -> bool {
        self.state() == state::CONNECTED
    }

    fn disconnect(&mut self) {
        self.end_session();
        self.state.store(state::DISCONNECTED, Ordering::Release);
    }

    fn state(&self) -> i32 {
        self.state.load(Ordering::Acquire)
    }

    fn publish(&mut self, topic: &str, payload: &[u8], retain: bool) -> bool {
        let Some(session) = self.connected_session() else {
            return false;
        };
        session
            .client
            .try_publish(topic, QoS::AtMostOnce, retain, payload.to_vec())
            .map_err(|e| warn!("Impossible to publish on `{topic}`: {e}"))
            .is_ok()
    }

    fn subscribe(&mut self, topic: &str) -> bool {
        let Some(session) = self.connected_session() else {
            return false;
        };
        session
            .client
            .try_subscribe(topic, QoS::AtMostOnce)
            .map_err(|e| warn!("Impossible to subscribe to `{topic}`: {e}"))
            .is_ok()
    }

    fn unsubscribe(&mut self, topic: &str) {
        if let Some(session) = self.connected_session()
            && let Err(e) = session.client.try_unsubscribe(topic)
        {
            warn!("Impossible to unsubscribe from `{topic}`: {e}");
        }
    }

    fn poll(&mut self) -> Option<Inbound> {
        self.session.as_ref()?.inbound.try_recv().ok()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use qnode::platform::{Transport, state};

    use crate::config::BrokerConfig;
    use crate::error::ErrorKind;

    use super::MqttTransport;

    fn closed_broker() -> BrokerConfig {
        BrokerConfig {
            host: "127.0.0.1".into(),
            // Nothing listens on the TCP port multiplexer.
            port: 1,
            ..BrokerConfig::default()
        }
    }

    #[test]
    fn requires_a_runtime() {
        let error = MqttTransport::new(BrokerConfig::default()).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Transport);
    }

    #[tokio::test]
    async fn requests_need_a_session() {
        let mut transport = MqttTransport::new(closed_broker()).unwrap();

        assert!(!transport.is_connected());
        assert_eq!(transport.state(), state::DISCONNECTED);
        assert!(!transport.publish("a/b", b"on", false));
        assert!(!transport.subscribe("a/b"));
        assert!(transport.poll().is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn failed_session_is_reported() {
        let mut transport = MqttTransport::new(closed_broker()).unwrap();

        assert!(!transport.connect("qnode-test"));

        let mut code = transport.state();
        for _ in 0..50 {
            if code != state::DISCONNECTED {
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
            code = transport.state();
        }
        assert_eq!(code, state::CONNECT_FAILED);
        assert!(!transport.is_connected());

        transport.disconnect();
        assert_eq!(transport.state(), state::DISCONNECTED);
    }
}
