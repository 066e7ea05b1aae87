//! Bluetooth session state machine.
//!
//! One [`BluetoothSession`] owns the outbound link to the configured
//! peer: adapter acquisition, bounded device discovery, pairing,
//! connection, and message delivery. The session survives failed ticks —
//! state is kept so the next scan tick resumes from [`SessionState::Powered`]
//! rather than starting over from [`SessionState::Unpowered`].

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::bus::{AdapterId, DeviceRef, ObjectBus, PairOutcome};
use crate::error::{Error, Result};

/// Delay between managed-object polls while waiting for the peer.
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Lifecycle states of the outbound link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No adapter acquired yet.
    Unpowered,
    /// Adapter acquired and powered.
    Powered,
    /// Discovery in progress.
    Discovering,
    /// Peer device object present in the managed-object set.
    DeviceFound,
    /// Peer bonded.
    Paired,
    /// Link established.
    Connected,
    /// Notification delivered.
    MessageSent,
    /// Last operation failed; adapter handle is retained.
    Failed,
    /// Terminal state after teardown.
    Idle,
}

/// State machine driving one outbound Bluetooth link.
pub struct BluetoothSession {
    bus: Arc<dyn ObjectBus>,
    peer: String,
    adapter_pattern: Option<String>,
    discovery_timeout: u32,
    poll_interval: Duration,
    state: SessionState,
    adapter: Option<AdapterId>,
    device: Option<DeviceRef>,
}

impl BluetoothSession {
    /// Create a session bound to `peer` (canonical uppercase MAC).
    #[must_use]
    pub fn new(
        bus: Arc<dyn ObjectBus>,
        peer: String,
        adapter_pattern: Option<String>,
        discovery_timeout: u32,
    ) -> Self {
        Self {
            bus,
            peer,
            adapter_pattern,
            discovery_timeout,
            poll_interval: DEFAULT_POLL_INTERVAL,
            state: SessionState::Unpowered,
            adapter: None,
            device: None,
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// Peer address this session is bound to.
    #[must_use]
    pub fn peer(&self) -> &str {
        &self.peer
    }

    /// Override the delay between discovery polls.
    pub fn set_poll_interval(&mut self, interval: Duration) {
        self.poll_interval = interval;
    }

    /// Acquire and power an adapter. Idempotent: once an adapter is
    /// held, re-invoking is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AdapterNotFound`] when the bus lists zero
    /// adapters matching the configured pattern; transport failures
    /// propagate as [`Error::Transport`].
    pub async fn power_on(&mut self) -> Result<()> {
        if self.adapter.is_some() {
            return Ok(());
        }

        let adapters = self.bus.adapters(self.adapter_pattern.as_deref()).await?;
        let Some(current) = adapters.first().cloned() else {
            self.state = SessionState::Failed;
            return Err(Error::AdapterNotFound);
        };
        for adapter in &adapters {
            self.bus.power_on(adapter).await?;
        }

        debug!(adapter = %current, "adapter powered");
        self.adapter = Some(current);
        self.state = SessionState::Powered;
        Ok(())
    }

    /// Wait for the peer device object to appear in the managed-object
    /// set, running discovery for the duration.
    ///
    /// The countdown runs from the configured timeout down to zero
    /// inclusive, one lookup per poll tick — a timeout of zero still
    /// performs exactly one lookup. Discovery stop is a guaranteed
    /// cleanup step on every exit path.
    ///
    /// Returns `Ok(None)` on timeout; the peer simply was not
    /// advertising this tick.
    ///
    /// # Errors
    ///
    /// Transport failure of the discovery start/stop or of the polls
    /// themselves propagates; it is fatal to this call, not retried.
    pub async fn wait_for_device(&mut self) -> Result<Option<DeviceRef>> {
        let adapter = self.current_adapter()?;

        let started = self.bus.start_discovery(&adapter).await;
        if let Err(err) = started {
            self.state = SessionState::Failed;
            return Err(err);
        }
        self.state = SessionState::Discovering;

        let polled = self.poll_for_device(&adapter).await;

        // Unconditional cleanup; a stop failure is an adapter-level
        // transport failure and propagates like any other.
        let stopped = self.bus.stop_discovery(&adapter).await;
        if let Err(err) = stopped {
            self.state = SessionState::Failed;
            return Err(err);
        }

        match polled {
            Ok(Some(device)) => {
                debug!(peer = %self.peer, "peer device discovered");
                self.device = Some(device.clone());
                self.state = SessionState::DeviceFound;
                Ok(Some(device))
            }
            Ok(None) => Ok(None),
            Err(err) => {
                self.state = SessionState::Failed;
                Err(err)
            }
        }
    }

    async fn poll_for_device(&self, adapter: &AdapterId) -> Result<Option<DeviceRef>> {
        let mut remaining = self.discovery_timeout;
        loop {
            if let Some(device) = self.bus.find_device(adapter, &self.peer).await? {
                return Ok(Some(device));
            }
            if remaining == 0 {
                return Ok(None);
            }
            remaining -= 1;
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    /// Whether the peer is bonded. A peer whose device object has not
    /// been discovered yet is reported as not paired, not as an error.
    ///
    /// # Errors
    ///
    /// Transport failures propagate.
    pub async fn is_paired(&self) -> Result<bool> {
        let Some(device) = &self.device else {
            return Ok(false);
        };
        self.bus.is_paired(device).await
    }

    /// Issue a pair request against the discovered peer.
    ///
    /// Both a fresh bond and "already paired" count as success; any
    /// failure is folded into [`PairOutcome::Failed`] rather than an
    /// error, since the caller may legitimately proceed without a bond.
    pub async fn pair(&mut self) -> PairOutcome {
        let Some(device) = self.device.clone() else {
            return PairOutcome::Failed("peer device not discovered".into());
        };

        let outcome = self.bus.pair(&device).await;
        match &outcome {
            PairOutcome::Paired => {
                info!(peer = %self.peer, "paired with peer");
                self.state = SessionState::Paired;
            }
            PairOutcome::AlreadyPaired => {
                debug!(peer = %self.peer, "peer already paired");
                self.state = SessionState::Paired;
            }
            PairOutcome::Failed(reason) => {
                warn!(peer = %self.peer, reason = %reason, "pairing failed");
            }
        }
        outcome
    }

    /// Establish the link to the discovered peer.
    ///
    /// # Errors
    ///
    /// Transport failures propagate; the session does not retry within
    /// the same tick.
    pub async fn connect(&mut self) -> Result<()> {
        let device = self.current_device()?;
        match self.bus.connect(&device).await {
            Ok(()) => {
                self.state = SessionState::Connected;
                Ok(())
            }
            Err(err) => {
                self.state = SessionState::Failed;
                Err(err)
            }
        }
    }

    /// Deliver `text` to the connected peer.
    ///
    /// # Errors
    ///
    /// Transport failures propagate; no automatic retry.
    pub async fn send_message(&mut self, text: &str) -> Result<()> {
        let device = self.current_device()?;
        match self.bus.send_message(&device, text).await {
            Ok(()) => {
                info!(peer = %self.peer, "notification delivered");
                self.state = SessionState::MessageSent;
                Ok(())
            }
            Err(err) => {
                self.state = SessionState::Failed;
                Err(err)
            }
        }
    }

    /// Tear the session down: disconnect if a device was ever reached,
    /// then go [`SessionState::Idle`]. Disconnect errors are logged,
    /// never propagated — teardown cannot fail.
    pub async fn teardown(&mut self) {
        if let Some(device) = self.device.take() {
            if let Err(err) = self.bus.disconnect(&device).await {
                warn!(peer = %self.peer, %err, "disconnect failed during teardown");
            }
        }
        self.adapter = None;
        self.state = SessionState::Idle;
    }

    fn current_adapter(&self) -> Result<AdapterId> {
        self.adapter.clone().ok_or(Error::AdapterNotFound)
    }

    fn current_device(&self) -> Result<DeviceRef> {
        self.device.clone().ok_or_else(|| {
            Error::Transport("peer device not discovered".into())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockBus, MockCall};

    const PEER: &str = "AA:BB:CC:DD:EE:FF";

    fn session_with(bus: &Arc<MockBus>, timeout: u32) -> BluetoothSession {
        let mut session =
            BluetoothSession::new(bus.clone() as Arc<dyn ObjectBus>, PEER.into(), None, timeout);
        session.set_poll_interval(Duration::from_millis(10));
        session
    }

    #[tokio::test]
    async fn power_on_is_idempotent() {
        let bus = Arc::new(MockBus::new());
        let mut session = session_with(&bus, 15);

        session.power_on().await.unwrap();
        session.power_on().await.unwrap();

        assert_eq!(session.state(), SessionState::Powered);
        let powers = bus
            .calls()
            .iter()
            .filter(|c| matches!(c, MockCall::PowerOn(_)))
            .count();
        assert_eq!(powers, 1);
    }

    #[tokio::test]
    async fn power_on_without_adapters_fails() {
        let bus = Arc::new(MockBus::new().with_adapters(&[]));
        let mut session = session_with(&bus, 15);

        let err = session.power_on().await.unwrap_err();
        assert!(matches!(err, Error::AdapterNotFound));
        assert_eq!(session.state(), SessionState::Failed);
    }

    #[tokio::test]
    async fn power_on_powers_every_matching_adapter() {
        let bus = Arc::new(MockBus::new().with_adapters(&["hci0", "hci1"]));
        let mut session = session_with(&bus, 15);

        session.power_on().await.unwrap();

        let powered: Vec<_> = bus
            .calls()
            .iter()
            .filter_map(|c| match c {
                MockCall::PowerOn(id) => Some(id.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(powered, ["hci0", "hci1"]);
    }

    #[tokio::test(start_paused = true)]
    async fn wait_for_device_finds_peer_and_stops_discovery() {
        let bus = Arc::new(MockBus::new().with_device_visible_after(3));
        let mut session = session_with(&bus, 15);
        session.power_on().await.unwrap();

        let device = session.wait_for_device().await.unwrap();

        assert!(device.is_some());
        assert_eq!(session.state(), SessionState::DeviceFound);
        let calls = bus.calls();
        assert!(calls.contains(&MockCall::StartDiscovery));
        assert!(calls.contains(&MockCall::StopDiscovery));
    }

    #[tokio::test(start_paused = true)]
    async fn wait_for_device_timeout_returns_none_and_stops_discovery() {
        let bus = Arc::new(MockBus::new().with_device_never_visible());
        let mut session = session_with(&bus, 15);
        session.power_on().await.unwrap();

        let device = session.wait_for_device().await.unwrap();

        assert!(device.is_none());
        assert!(bus.calls().contains(&MockCall::StopDiscovery));
        // Countdown 15..=0 inclusive.
        assert_eq!(bus.find_device_calls(), 16);
    }

    #[tokio::test]
    async fn zero_timeout_polls_exactly_once() {
        let bus = Arc::new(MockBus::new().with_device_never_visible());
        let mut session = session_with(&bus, 0);
        session.power_on().await.unwrap();

        let device = session.wait_for_device().await.unwrap();

        assert!(device.is_none());
        assert_eq!(bus.find_device_calls(), 1);
    }

    #[tokio::test]
    async fn discovery_start_failure_propagates() {
        let bus = Arc::new(MockBus::new().with_discovery_failure("bus unreachable"));
        let mut session = session_with(&bus, 15);
        session.power_on().await.unwrap();

        let err = session.wait_for_device().await.unwrap_err();
        assert!(matches!(err, Error::Transport(_)));
        assert_eq!(session.state(), SessionState::Failed);
    }

    #[tokio::test]
    async fn pair_twice_against_bonded_peer_succeeds_both_times() {
        let bus = Arc::new(MockBus::new().with_device_visible_after(0).with_paired(true));
        let mut session = session_with(&bus, 15);
        session.power_on().await.unwrap();
        session.wait_for_device().await.unwrap();

        assert!(session.pair().await.is_success());
        assert!(session.pair().await.is_success());
        assert_eq!(session.state(), SessionState::Paired);
    }

    #[tokio::test]
    async fn is_paired_without_discovered_device_is_false_not_error() {
        let bus = Arc::new(MockBus::new());
        let session = session_with(&bus, 15);
        assert!(!session.is_paired().await.unwrap());
    }

    #[tokio::test]
    async fn send_failure_keeps_adapter_for_next_tick() {
        let bus = Arc::new(
            MockBus::new()
                .with_device_visible_after(0)
                .with_send_failure("stream reset"),
        );
        let mut session = session_with(&bus, 15);
        session.power_on().await.unwrap();
        session.wait_for_device().await.unwrap();
        session.connect().await.unwrap();

        let err = session.send_message("hello").await.unwrap_err();
        assert!(matches!(err, Error::SendFailed(_)));
        assert_eq!(session.state(), SessionState::Failed);

        // The next tick resumes from Powered: power_on is a no-op, not a
        // fresh adapter enumeration.
        session.power_on().await.unwrap();
        let enumerations = bus
            .calls()
            .iter()
            .filter(|c| matches!(c, MockCall::Adapters))
            .count();
        assert_eq!(enumerations, 1);
    }

    #[tokio::test]
    async fn full_walk_reaches_message_sent() {
        let bus = Arc::new(MockBus::new().with_device_visible_after(0));
        let mut session = session_with(&bus, 15);

        session.power_on().await.unwrap();
        session.wait_for_device().await.unwrap();
        assert!(session.pair().await.is_success());
        session.connect().await.unwrap();
        session.send_message("ping").await.unwrap();

        assert_eq!(session.state(), SessionState::MessageSent);
        assert_eq!(bus.sent_messages(), ["ping"]);
    }

    #[tokio::test]
    async fn teardown_never_fails_even_when_disconnect_errors() {
        let bus = Arc::new(
            MockBus::new()
                .with_device_visible_after(0)
                .with_disconnect_failure("adapter gone"),
        );
        let mut session = session_with(&bus, 15);
        session.power_on().await.unwrap();
        session.wait_for_device().await.unwrap();

        session.teardown().await;
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn teardown_without_device_is_quiet() {
        let bus = Arc::new(MockBus::new());
        let mut session = session_with(&bus, 15);

        session.teardown().await;

        assert_eq!(session.state(), SessionState::Idle);
        assert!(!bus.calls().contains(&MockCall::Disconnect));
    }
}
