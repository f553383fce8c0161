//! Connection manager - lifecycle of the active transport.
//!
//! Tracks zero or one active `TransportSession`. The first channel reported
//! usable becomes active; further offers are ignored until it detaches.
//! Accessory channels additionally wait for an asynchronous platform grant
//! before they count as usable.

use std::sync::{Arc, Mutex};

use tracing::{info, warn};

use crate::events::{FlashEvent, FlashObserver, LogLevel};
use crate::session::FlashError;
use crate::transport::{ChannelKind, TransportChannel};

/// One open channel and how it was obtained.
///
/// Exclusively owned by the manager; a running session only holds a clone
/// of the channel `Arc` for the duration of its run.
pub struct TransportSession {
    kind: ChannelKind,
    channel: Arc<dyn TransportChannel>,
}

impl TransportSession {
    pub fn new(kind: ChannelKind, channel: Arc<dyn TransportChannel>) -> Self {
        Self { kind, channel }
    }

    pub fn kind(&self) -> ChannelKind {
        self.kind
    }

    pub fn channel(&self) -> Arc<dyn TransportChannel> {
        Arc::clone(&self.channel)
    }

    pub fn is_connected(&self) -> bool {
        self.channel.is_connected()
    }
}

struct ManagerState {
    active: Option<TransportSession>,
    /// Channel offered but still awaiting the platform's grant.
    pending: Option<TransportSession>,
}

pub struct ConnectionManager {
    observer: Arc<dyn FlashObserver>,
    inner: Mutex<ManagerState>,
}

impl ConnectionManager {
    pub fn new(observer: Arc<dyn FlashObserver>) -> Self {
        Self {
            observer,
            inner: Mutex::new(ManagerState {
                active: None,
                pending: None,
            }),
        }
    }

    /// The platform reports a usable (or grant-pending) channel.
    ///
    /// Returns `true` if the channel became active immediately. Offers made
    /// while a channel is active or pending are ignored for selection.
    pub fn on_channel_available(
        &self,
        kind: ChannelKind,
        channel: Arc<dyn TransportChannel>,
    ) -> bool {
        let mut inner = self.inner.lock().unwrap();
        if inner.active.is_some() || inner.pending.is_some() {
            info!(kind = %kind, "Ignoring channel offer, one is already held");
            return false;
        }

        let session = TransportSession::new(kind, channel);
        if kind.requires_authorization() {
            info!(kind = %kind, "Channel offered, awaiting authorization");
            inner.pending = Some(session);
            false
        } else {
            info!(kind = %kind, "Channel active");
            inner.active = Some(session);
            true
        }
    }

    /// The platform's authorization decision for the pending channel.
    ///
    /// On grant the channel is promoted to active; on denial it is dropped
    /// and `PermissionDenied` is surfaced. No-op when nothing is pending.
    pub fn on_authorization(&self, granted: bool) -> Result<(), FlashError> {
        let mut inner = self.inner.lock().unwrap();
        let Some(session) = inner.pending.take() else {
            return Ok(());
        };

        if granted {
            info!(kind = %session.kind(), "Authorization granted, channel active");
            inner.active = Some(session);
            Ok(())
        } else {
            warn!(kind = %session.kind(), "Authorization denied");
            drop(inner);
            let err = FlashError::PermissionDenied;
            self.observer.on_event(&FlashEvent::Error {
                kind: err.kind(),
                message: err.to_string(),
            });
            Err(err)
        }
    }

    /// The active channel detached: tear it down and discard it.
    ///
    /// Closing the channel faults any in-flight run on its next transport
    /// operation, which drives the session to `Failed` on its own worker.
    pub fn on_channel_detached(&self) {
        let session = self.inner.lock().unwrap().active.take();
        if let Some(session) = session {
            warn!(kind = %session.kind(), "Transport detached");
            session.channel.close();
            self.observer.on_event(&FlashEvent::Log {
                level: LogLevel::Warn,
                message: "Transport detached".into(),
            });
        }
    }

    /// Borrow the active channel for a run, if one is connected.
    pub fn active_channel(&self) -> Option<Arc<dyn TransportChannel>> {
        let inner = self.inner.lock().unwrap();
        inner
            .active
            .as_ref()
            .filter(|s| s.is_connected())
            .map(|s| s.channel())
    }

    pub fn active_kind(&self) -> Option<ChannelKind> {
        self.inner.lock().unwrap().active.as_ref().map(|s| s.kind())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::NullObserver;
    use crate::transport::MockChannel;

    fn manager() -> ConnectionManager {
        ConnectionManager::new(Arc::new(NullObserver))
    }

    #[test]
    fn test_first_channel_wins() {
        let m = manager();
        let first = Arc::new(MockChannel::new());
        let second = Arc::new(MockChannel::new());

        assert!(m.on_channel_available(ChannelKind::Socket, Arc::clone(&first) as _));
        assert!(!m.on_channel_available(ChannelKind::Socket, second as _));
        assert_eq!(m.active_kind(), Some(ChannelKind::Socket));

        // The active channel is the first one offered.
        m.active_channel().unwrap().write(b"x").unwrap();
        assert_eq!(first.bytes_written(), 1);
    }

    #[test]
    fn test_detach_tears_down_and_closes() {
        let m = manager();
        let channel = Arc::new(MockChannel::new());
        m.on_channel_available(ChannelKind::Socket, Arc::clone(&channel) as _);

        m.on_channel_detached();
        assert!(m.active_channel().is_none());
        assert!(!channel.is_connected());

        // A new offer is accepted after the teardown.
        assert!(m.on_channel_available(ChannelKind::Socket, Arc::new(MockChannel::new()) as _));
    }

    #[test]
    fn test_accessory_waits_for_grant() {
        let m = manager();
        let channel = Arc::new(MockChannel::new());

        assert!(!m.on_channel_available(ChannelKind::Accessory, channel as _));
        assert!(m.active_channel().is_none());

        m.on_authorization(true).unwrap();
        assert_eq!(m.active_kind(), Some(ChannelKind::Accessory));
        assert!(m.active_channel().is_some());
    }

    #[test]
    fn test_authorization_denied() {
        let m = manager();
        m.on_channel_available(ChannelKind::Accessory, Arc::new(MockChannel::new()) as _);

        assert!(matches!(
            m.on_authorization(false),
            Err(FlashError::PermissionDenied)
        ));
        assert!(m.active_channel().is_none());
        assert!(m.active_kind().is_none());
    }

    #[test]
    fn test_dead_channel_not_offered_to_runs() {
        let m = manager();
        let channel = Arc::new(MockChannel::new());
        m.on_channel_available(ChannelKind::Socket, Arc::clone(&channel) as _);

        channel.disconnect();
        assert!(m.active_channel().is_none());
    }

    #[test]
    fn test_grant_without_pending_is_noop() {
        let m = manager();
        assert!(m.on_authorization(true).is_ok());
        assert!(m.active_channel().is_none());
    }
}
