//! The event bus (component C12). A single-writer-many-reader broadcast
//! channel: every component holds a clone of the `EventEmitter` and calls
//! `emit`; a slow or absent subscriber never blocks a publisher, and a
//! lagging subscriber simply misses the oldest buffered events rather than
//! stalling the bus, matching `tokio::sync::broadcast`'s native semantics.

use fleetwright_types::Event;
use tokio::sync::broadcast;

const DEFAULT_BUFFER: usize = 256;

#[derive(Clone)]
pub struct EventEmitter {
    tx: broadcast::Sender<Event>,
}

impl EventEmitter {
    pub fn new() -> Self {
        Self::with_buffer(DEFAULT_BUFFER)
    }

    pub fn with_buffer(buffer: usize) -> Self {
        let (tx, _rx) = broadcast::channel(buffer.max(1));
        Self { tx }
    }

    /// Publishes an event. Never blocks; if nobody is subscribed the event is
    /// simply dropped.
    pub fn emit(&self, event: Event) {
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }
}

impl Default for EventEmitter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscriber_receives_emitted_events() {
        let bus = EventEmitter::new();
        let mut rx = bus.subscribe();
        bus.emit(Event::new("reconcile_started", "engine"));
        let received = rx.recv().await.unwrap();
        assert_eq!(received.kind, "reconcile_started");
    }

    #[test]
    fn emit_without_subscribers_does_not_panic() {
        let bus = EventEmitter::new();
        bus.emit(Event::new("mesh_ready", "mesh"));
    }

    #[tokio::test]
    async fn lagging_subscriber_drops_oldest_rather_than_blocking_publisher() {
        let bus = EventEmitter::with_buffer(2);
        let mut rx = bus.subscribe();
        for i in 0..5 {
            bus.emit(Event::new(format!("e{i}"), "engine"));
        }
        // publisher never blocked; subscriber observes a lag error then catches up
        let mut saw_lag = false;
        loop {
            match rx.try_recv() {
                Ok(_) => continue,
                Err(broadcast::error::TryRecvError::Lagged(_)) => {
                    saw_lag = true;
                    continue;
                }
                Err(_) => break,
            }
        }
        assert!(saw_lag);
    }
}
