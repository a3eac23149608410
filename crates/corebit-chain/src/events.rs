//! Typed observer registry (§9 design notes: "a typed event bus instead of
//! signals/slots"). Hosts register one or more [`ChainNotify`] implementors
//! to learn about chain-state changes without reaching into the activator's
//! internals.

use corebit_consensus::BlockHeader;

/// Callbacks the activator fires as it processes blocks. Default no-op
/// bodies let a host implement only the events it cares about.
pub trait ChainNotify: Send + Sync {
    fn block_connected(&self, _header: &BlockHeader, _height: u64) {}
    fn block_disconnected(&self, _header: &BlockHeader, _height: u64) {}
    fn updated_tip(&self, _tip_hash: &[u8; 32], _height: u64) {}
    /// Mempool integration is out of scope here (§1 Non-goals), but the
    /// notification shape is still exposed so a host's own mempool can plug
    /// into the same bus as everything else.
    fn tx_entered_mempool(&self, _txid: &[u8; 32]) {}
    fn alert(&self, _message: &str) {}
}

/// A bus of registered observers, fired in registration order. Never
/// unregisters on panic inside an observer's callback — a broken observer
/// is the host's bug to fix, not something the activator works around.
#[derive(Default)]
pub struct EventBus {
    observers: Vec<Box<dyn ChainNotify>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self { observers: Vec::new() }
    }

    pub fn register(&mut self, observer: Box<dyn ChainNotify>) {
        self.observers.push(observer);
    }

    pub fn fire_block_connected(&self, header: &BlockHeader, height: u64) {
        for o in &self.observers {
            o.block_connected(header, height);
        }
    }

    pub fn fire_block_disconnected(&self, header: &BlockHeader, height: u64) {
        for o in &self.observers {
            o.block_disconnected(header, height);
        }
    }

    pub fn fire_updated_tip(&self, tip_hash: &[u8; 32], height: u64) {
        for o in &self.observers {
            o.updated_tip(tip_hash, height);
        }
    }

    pub fn fire_alert(&self, message: &str) {
        for o in &self.observers {
            o.alert(message);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;

    struct CountingObserver {
        connected: Arc<AtomicU64>,
    }

    impl ChainNotify for CountingObserver {
        fn block_connected(&self, _header: &BlockHeader, _height: u64) {
            self.connected.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn header() -> BlockHeader {
        BlockHeader {
            version: 1,
            prev_hash: [0; 32],
            merkle_root: [0; 32],
            time: 0,
            bits: 0x207fffff,
            nonce: 0,
        }
    }

    #[test]
    fn fires_every_registered_observer() {
        let counter = Arc::new(AtomicU64::new(0));
        let mut bus = EventBus::new();
        bus.register(Box::new(CountingObserver { connected: counter.clone() }));
        bus.register(Box::new(CountingObserver { connected: counter.clone() }));

        bus.fire_block_connected(&header(), 1);
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn unobserved_events_are_harmless_no_ops() {
        let bus = EventBus::new();
        bus.fire_block_connected(&header(), 1);
        bus.fire_updated_tip(&[0; 32], 1);
        bus.fire_alert("test");
    }
}
