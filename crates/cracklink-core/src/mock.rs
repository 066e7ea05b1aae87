//! Scripted in-memory object bus for tests.
//!
//! [`MockBus`] records every call it receives and plays back behavior
//! configured up front: which adapters exist, after how many lookups the
//! peer device becomes visible, whether the peer is already bonded, and
//! which operations fail. Built for driving the session state machine
//! and the notifier end-to-end without Bluetooth hardware.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::bus::{AdapterId, DeviceRef, ObjectBus, PairOutcome};
use crate::error::{Error, Result};

/// One recorded bus invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    /// `adapters` was queried.
    Adapters,
    /// `power_on` for the named adapter.
    PowerOn(AdapterId),
    /// `start_discovery`.
    StartDiscovery,
    /// `stop_discovery`.
    StopDiscovery,
    /// `find_device` lookup.
    FindDevice,
    /// `is_paired` query.
    IsPaired,
    /// `pair` request.
    Pair,
    /// `connect`.
    Connect,
    /// `send_message` with the delivered text.
    Send(String),
    /// `disconnect`.
    Disconnect,
}

#[derive(Debug)]
struct MockState {
    adapters: Vec<AdapterId>,
    /// `find_device` returns the peer once this many lookups happened;
    /// `None` means the peer never appears.
    device_visible_after: Option<u32>,
    find_device_calls: u32,
    paired: bool,
    pair_failure: Option<String>,
    discovery_failure: Option<String>,
    connect_failure: Option<String>,
    send_failure: Option<String>,
    disconnect_failure: Option<String>,
    calls: Vec<MockCall>,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            adapters: vec!["hci0".into()],
            device_visible_after: Some(0),
            find_device_calls: 0,
            paired: false,
            pair_failure: None,
            discovery_failure: None,
            connect_failure: None,
            send_failure: None,
            disconnect_failure: None,
            calls: Vec::new(),
        }
    }
}

/// Scripted [`ObjectBus`] implementation.
#[derive(Debug, Default)]
pub struct MockBus {
    state: Mutex<MockState>,
}

impl MockBus {
    /// A bus with one adapter (`hci0`) and an immediately visible,
    /// unbonded peer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the adapter list.
    #[must_use]
    pub fn with_adapters(self, adapters: &[&str]) -> Self {
        self.state.lock().unwrap().adapters = adapters.iter().map(|&a| a.into()).collect();
        self
    }

    /// Make the peer visible only after `lookups` failed `find_device`
    /// calls.
    #[must_use]
    pub fn with_device_visible_after(self, lookups: u32) -> Self {
        self.state.lock().unwrap().device_visible_after = Some(lookups);
        self
    }

    /// The peer never appears in the managed-object set.
    #[must_use]
    pub fn with_device_never_visible(self) -> Self {
        self.state.lock().unwrap().device_visible_after = None;
        self
    }

    /// Pre-bond the peer.
    #[must_use]
    pub fn with_paired(self, paired: bool) -> Self {
        self.state.lock().unwrap().paired = paired;
        self
    }

    /// Make `pair` fail with `reason`.
    #[must_use]
    pub fn with_pair_failure(self, reason: &str) -> Self {
        self.state.lock().unwrap().pair_failure = Some(reason.into());
        self
    }

    /// Make `start_discovery` fail with `reason`.
    #[must_use]
    pub fn with_discovery_failure(self, reason: &str) -> Self {
        self.state.lock().unwrap().discovery_failure = Some(reason.into());
        self
    }

    /// Make `connect` fail with `reason`.
    #[must_use]
    pub fn with_connect_failure(self, reason: &str) -> Self {
        self.state.lock().unwrap().connect_failure = Some(reason.into());
        self
    }

    /// Make `send_message` fail with `reason`.
    #[must_use]
    pub fn with_send_failure(self, reason: &str) -> Self {
        self.state.lock().unwrap().send_failure = Some(reason.into());
        self
    }

    /// Make `disconnect` fail with `reason`.
    #[must_use]
    pub fn with_disconnect_failure(self, reason: &str) -> Self {
        self.state.lock().unwrap().disconnect_failure = Some(reason.into());
        self
    }

    /// Every call recorded so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<MockCall> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Number of `find_device` lookups performed.
    #[must_use]
    pub fn find_device_calls(&self) -> u32 {
        self.state.lock().unwrap().find_device_calls
    }

    /// Texts delivered through `send_message`, in order.
    #[must_use]
    pub fn sent_messages(&self) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter_map(|c| match c {
                MockCall::Send(text) => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: MockCall) {
        self.state.lock().unwrap().calls.push(call);
    }
}

#[async_trait]
impl ObjectBus for MockBus {
    async fn adapters(&self, pattern: Option<&str>) -> Result<Vec<AdapterId>> {
        self.record(MockCall::Adapters);
        let state = self.state.lock().unwrap();
        Ok(state
            .adapters
            .iter()
            .filter(|a| pattern.map_or(true, |p| a.contains(p)))
            .cloned()
            .collect())
    }

    async fn power_on(&self, adapter: &AdapterId) -> Result<()> {
        self.record(MockCall::PowerOn(adapter.clone()));
        Ok(())
    }

    async fn start_discovery(&self, _adapter: &AdapterId) -> Result<()> {
        self.record(MockCall::StartDiscovery);
        let state = self.state.lock().unwrap();
        match &state.discovery_failure {
            Some(reason) => Err(Error::Transport(reason.clone())),
            None => Ok(()),
        }
    }

    async fn stop_discovery(&self, _adapter: &AdapterId) -> Result<()> {
        self.record(MockCall::StopDiscovery);
        Ok(())
    }

    async fn find_device(&self, adapter: &AdapterId, address: &str) -> Result<Option<DeviceRef>> {
        self.record(MockCall::FindDevice);
        let mut state = self.state.lock().unwrap();
        let seen = state.find_device_calls;
        state.find_device_calls += 1;
        let visible = state.device_visible_after.is_some_and(|after| seen >= after);
        Ok(visible.then(|| DeviceRef {
            adapter: adapter.clone(),
            address: address.to_owned(),
        }))
    }

    async fn is_paired(&self, _device: &DeviceRef) -> Result<bool> {
        self.record(MockCall::IsPaired);
        Ok(self.state.lock().unwrap().paired)
    }

    async fn pair(&self, _device: &DeviceRef) -> PairOutcome {
        self.record(MockCall::Pair);
        let mut state = self.state.lock().unwrap();
        if let Some(reason) = &state.pair_failure {
            return PairOutcome::Failed(reason.clone());
        }
        if state.paired {
            return PairOutcome::AlreadyPaired;
        }
        state.paired = true;
        PairOutcome::Paired
    }

    async fn connect(&self, _device: &DeviceRef) -> Result<()> {
        self.record(MockCall::Connect);
        let state = self.state.lock().unwrap();
        match &state.connect_failure {
            Some(reason) => Err(Error::Transport(reason.clone())),
            None => Ok(()),
        }
    }

    async fn send_message(&self, _device: &DeviceRef, text: &str) -> Result<()> {
        self.record(MockCall::Send(text.to_owned()));
        let state = self.state.lock().unwrap();
        match &state.send_failure {
            Some(reason) => Err(Error::SendFailed(reason.clone())),
            None => Ok(()),
        }
    }

    async fn disconnect(&self, _device: &DeviceRef) -> Result<()> {
        self.record(MockCall::Disconnect);
        let state = self.state.lock().unwrap();
        match &state.disconnect_failure {
            Some(reason) => Err(Error::Transport(reason.clone())),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn records_calls_in_order() {
        let bus = MockBus::new();
        let adapter: AdapterId = "hci0".into();
        let device = DeviceRef {
            adapter: adapter.clone(),
            address: "AA:BB:CC:DD:EE:FF".into(),
        };

        bus.adapters(None).await.unwrap();
        bus.power_on(&adapter).await.unwrap();
        bus.send_message(&device, "hi").await.unwrap();

        assert_eq!(
            bus.calls(),
            [
                MockCall::Adapters,
                MockCall::PowerOn(adapter),
                MockCall::Send("hi".into()),
            ]
        );
    }

    #[tokio::test]
    async fn adapter_pattern_filters() {
        let bus = MockBus::new().with_adapters(&["hci0", "hci1"]);
        assert_eq!(bus.adapters(Some("hci1")).await.unwrap(), ["hci1"]);
        assert_eq!(bus.adapters(Some("hci9")).await.unwrap(), Vec::<String>::new());
    }

    #[tokio::test]
    async fn device_visibility_countdown() {
        let bus = MockBus::new().with_device_visible_after(2);
        let adapter: AdapterId = "hci0".into();

        assert!(bus.find_device(&adapter, "AA").await.unwrap().is_none());
        assert!(bus.find_device(&adapter, "AA").await.unwrap().is_none());
        assert!(bus.find_device(&adapter, "AA").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn pair_transitions_to_already_paired() {
        let bus = MockBus::new();
        let device = DeviceRef {
            adapter: "hci0".into(),
            address: "AA:BB:CC:DD:EE:FF".into(),
        };

        assert_eq!(bus.pair(&device).await, PairOutcome::Paired);
        assert_eq!(bus.pair(&device).await, PairOutcome::AlreadyPaired);
    }
}
