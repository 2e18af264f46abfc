//! Protocol-agnostic device facade: composes whichever protocols a device
//! offers into a single capability-routed interface.
//!
//! Grounded on the teacher's `client::protocol::select_protocol` (a 2-way
//! AirPlay2-vs-RAOP priority chooser), generalized to the full
//! [`ProtocolKind`] priority order, and on `client::AirPlayClient`'s
//! `connect`/`disconnect` aggregation for the "first failure closes
//! everything" rule.

use std::future::Future;
use std::pin::Pin;

use crate::error::AtvError;
use crate::types::ProtocolKind;

/// An interface capability a protocol can provide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// Play/pause/seek/volume control.
    RemoteControl,
    /// Now-playing metadata (title, artist, progress).
    Metadata,
    /// Power state query/control.
    Power,
    /// Outbound audio/video streaming setup.
    AudioStream,
    /// Server-pushed state-change notifications.
    PushUpdates,
}

type BoxFuture<'a> = Pin<Box<dyn Future<Output = Result<(), AtvError>> + Send + 'a>>;

/// A single protocol's contribution to the facade: which capabilities it
/// provides, and how to connect/close it.
pub struct SetupData {
    /// Protocol this setup data was produced by.
    pub protocol: ProtocolKind,
    /// Capabilities this protocol provides for the device.
    pub capabilities: Vec<Capability>,
    connect: Box<dyn FnOnce() -> BoxFuture<'static> + Send>,
    close: Box<dyn FnOnce() -> BoxFuture<'static> + Send>,
}

impl SetupData {
    /// Build a setup entry from connect/close actions.
    pub fn new<C, X>(protocol: ProtocolKind, capabilities: Vec<Capability>, connect: C, close: X) -> Self
    where
        C: FnOnce() -> BoxFuture<'static> + Send + 'static,
        X: FnOnce() -> BoxFuture<'static> + Send + 'static,
    {
        Self {
            protocol,
            capabilities,
            connect: Box::new(connect),
            close: Box::new(close),
        }
    }
}

/// Composes the capability-routed interface to a device out of each
/// connected protocol's [`SetupData`].
pub struct DeviceFacade {
    entries: Vec<SetupData>,
}

impl DeviceFacade {
    /// Build a facade from each protocol's setup data, in the order they
    /// were registered (this order is preserved for `close()`'s reverse
    /// teardown).
    #[must_use]
    pub fn new(entries: Vec<SetupData>) -> Self {
        Self { entries }
    }

    /// The highest-priority protocol providing `capability`, if any.
    #[must_use]
    pub fn provider(&self, capability: Capability) -> Option<ProtocolKind> {
        self.entries
            .iter()
            .filter(|entry| entry.capabilities.contains(&capability))
            .map(|entry| entry.protocol)
            .min_by_key(|protocol| protocol.priority())
    }

    /// Run every registered connect action. The first failure aborts the
    /// remaining connects, closes everything already connected, and
    /// propagates the error.
    ///
    /// # Errors
    ///
    /// Returns the first connect action's error, or a close-action error
    /// that occurs while unwinding after a connect failure.
    pub async fn connect(&mut self) -> Result<(), AtvError> {
        let mut connected = Vec::with_capacity(self.entries.len());
        for entry in self.entries.drain(..) {
            let connect = entry.connect;
            match connect().await {
                Ok(()) => connected.push(SetupData {
                    protocol: entry.protocol,
                    capabilities: entry.capabilities,
                    connect: Box::new(|| Box::pin(async { Ok(()) })),
                    close: entry.close,
                }),
                Err(err) => {
                    self.entries = connected;
                    let _ = self.close().await;
                    return Err(err);
                }
            }
        }
        self.entries = connected;
        Ok(())
    }

    /// Run every registered close action in reverse registration order.
    ///
    /// # Errors
    ///
    /// Returns the first close action's error; subsequent close actions
    /// still run so a single misbehaving protocol doesn't leak the rest.
    pub async fn close(&mut self) -> Result<(), AtvError> {
        let mut first_err = None;
        for entry in self.entries.drain(..).rev() {
            if let Err(err) = (entry.close)().await {
                first_err.get_or_insert(err);
            }
        }
        match first_err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok_action() -> BoxFuture<'static> {
        Box::pin(async { Ok(()) })
    }

    fn err_action() -> BoxFuture<'static> {
        Box::pin(async { Err(AtvError::Cancelled) })
    }

    #[tokio::test]
    async fn provider_picks_highest_priority_protocol() {
        let facade = DeviceFacade::new(vec![
            SetupData::new(ProtocolKind::Raop, vec![Capability::RemoteControl], ok_action, ok_action),
            SetupData::new(ProtocolKind::Mrp, vec![Capability::RemoteControl], ok_action, ok_action),
        ]);
        assert_eq!(facade.provider(Capability::RemoteControl), Some(ProtocolKind::Mrp));
    }

    #[tokio::test]
    async fn provider_returns_none_for_unserved_capability() {
        let facade = DeviceFacade::new(vec![SetupData::new(
            ProtocolKind::Dmap,
            vec![Capability::Metadata],
            ok_action,
            ok_action,
        )]);
        assert_eq!(facade.provider(Capability::Power), None);
    }

    #[tokio::test]
    async fn connect_failure_closes_already_connected_entries() {
        let mut facade = DeviceFacade::new(vec![
            SetupData::new(ProtocolKind::Mrp, vec![Capability::RemoteControl], ok_action, ok_action),
            SetupData::new(ProtocolKind::Companion, vec![Capability::Power], err_action, ok_action),
        ]);
        let result = facade.connect().await;
        assert!(result.is_err());
        assert!(facade.entries.is_empty());
    }

    #[tokio::test]
    async fn connect_then_close_succeeds_when_all_actions_succeed() {
        let mut facade = DeviceFacade::new(vec![SetupData::new(
            ProtocolKind::AirPlay,
            vec![Capability::AudioStream],
            ok_action,
            ok_action,
        )]);
        facade.connect().await.unwrap();
        facade.close().await.unwrap();
    }
}
