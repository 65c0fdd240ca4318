//! Observable side of a session: named events fanned out to listeners.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::mpsc;

use crate::error::{Operation, SessionError};
use crate::media::{LocalStream, RemoteStream};
use crate::peer::ConnectionState;
use crate::signaling::SignalPayload;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    LocalStream,
    RemoteStream,
    /// Outbound payload to forward over the signaling transport
    Signal,
    Error,
    ConnectionState,
}

impl EventKind {
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::LocalStream => "localStream",
            EventKind::RemoteStream => "remoteStream",
            EventKind::Signal => "signal",
            EventKind::Error => "error",
            EventKind::ConnectionState => "connectionState",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Asynchronous failure together with the step that produced it
#[derive(Debug, Clone)]
pub struct SessionFailure {
    pub operation: Operation,
    pub error: Arc<SessionError>,
}

impl SessionFailure {
    pub fn new(operation: Operation, error: impl Into<SessionError>) -> Self {
        Self {
            operation,
            error: Arc::new(error.into()),
        }
    }
}

#[derive(Debug, Clone)]
pub enum SessionEvent {
    LocalStream(LocalStream),
    RemoteStream(RemoteStream),
    Signal(SignalPayload),
    Error(SessionFailure),
    ConnectionState(ConnectionState),
}

impl SessionEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            SessionEvent::LocalStream(_) => EventKind::LocalStream,
            SessionEvent::RemoteStream(_) => EventKind::RemoteStream,
            SessionEvent::Signal(_) => EventKind::Signal,
            SessionEvent::Error(_) => EventKind::Error,
            SessionEvent::ConnectionState(_) => EventKind::ConnectionState,
        }
    }
}

pub type Listener = Arc<dyn Fn(&SessionEvent) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Many-listener, many-kind pub/sub
#[derive(Default)]
pub struct EventEmitter {
    listeners: Mutex<HashMap<EventKind, Vec<(ListenerId, Listener)>>>,
    subscribers: Mutex<Vec<mpsc::UnboundedSender<SessionEvent>>>,
    next_id: AtomicU64,
}

impl EventEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on<F>(&self, kind: EventKind, listener: F) -> ListenerId
    where
        F: Fn(&SessionEvent) + Send + Sync + 'static,
    {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(kind)
            .or_default()
            .push((id, Arc::new(listener)));
        id
    }

    /// Returns whether a listener was removed
    pub fn off(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.lock().unwrap_or_else(PoisonError::into_inner);
        for list in listeners.values_mut() {
            if let Some(index) = list.iter().position(|(lid, _)| *lid == id) {
                list.remove(index);
                return true;
            }
        }
        false
    }

    /// Channel receiving every event from now on
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<SessionEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tx);
        rx
    }

    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&kind)
            .map_or(0, Vec::len)
    }

    pub(crate) fn emit(&self, event: SessionEvent) {
        let kind = event.kind();
        log::debug!("emitting {kind}");

        // listeners may subscribe or unsubscribe from inside the callback
        let listeners: Vec<Listener> = self
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&kind)
            .map(|list| list.iter().map(|(_, l)| l.clone()).collect())
            .unwrap_or_default();
        for listener in listeners {
            listener(&event);
        }

        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|tx| tx.send(event.clone()).is_ok());
    }

    pub(crate) fn emit_error(&self, operation: Operation, error: impl Into<SessionError>) {
        let failure = SessionFailure::new(operation, error);
        log::warn!("{operation} failed: {}", failure.error);
        self.emit(SessionEvent::Error(failure));
    }
}

impl fmt::Debug for EventEmitter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let listeners = self.listeners.lock().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("EventEmitter")
            .field("listeners", &listeners.values().map(Vec::len).sum::<usize>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn listeners_only_see_their_kind() {
        let emitter = EventEmitter::new();
        let signals = Arc::new(AtomicUsize::new(0));
        let errors = Arc::new(AtomicUsize::new(0));

        let s = signals.clone();
        emitter.on(EventKind::Signal, move |_| {
            s.fetch_add(1, Ordering::SeqCst);
        });
        let e = errors.clone();
        emitter.on(EventKind::Error, move |event| {
            assert!(matches!(event, SessionEvent::Error(f) if f.operation == Operation::CreateOffer));
            e.fetch_add(1, Ordering::SeqCst);
        });

        emitter.emit(SessionEvent::Signal(SignalPayload::Ready));
        emitter.emit_error(Operation::CreateOffer, EngineError::Closed);

        assert_eq!(signals.load(Ordering::SeqCst), 1);
        assert_eq!(errors.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn off_detaches_listener() {
        let emitter = EventEmitter::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let h = hits.clone();
        let id = emitter.on(EventKind::Signal, move |_| {
            h.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(emitter.listener_count(EventKind::Signal), 1);

        assert!(emitter.off(id));
        assert!(!emitter.off(id));
        emitter.emit(SessionEvent::Signal(SignalPayload::Ready));
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert_eq!(emitter.listener_count(EventKind::Signal), 0);
    }

    #[tokio::test]
    async fn subscribers_receive_every_event() {
        let emitter = EventEmitter::new();
        let mut rx = emitter.subscribe();
        emitter.emit(SessionEvent::ConnectionState(ConnectionState::Connected));
        emitter.emit(SessionEvent::Signal(SignalPayload::Ready));

        assert_eq!(rx.recv().await.unwrap().kind(), EventKind::ConnectionState);
        assert_eq!(rx.recv().await.unwrap().kind(), EventKind::Signal);

        drop(rx);
        emitter.emit(SessionEvent::Signal(SignalPayload::Ready));
        assert!(emitter.subscribers.lock().unwrap().is_empty());
    }
}
