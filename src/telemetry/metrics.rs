//! Metrics collection for packet statistics.
//!
//! Thread-safe counters shared between the capture loop, the rewrite
//! engine, and the control channel.

use std::sync::atomic::{AtomicU64, Ordering};

/// Atomic counter for thread-safe increment operations.
#[derive(Debug, Default)]
pub struct Counter(AtomicU64);

impl Counter {
    /// Creates a new counter initialized to zero.
    pub fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    /// Increments the counter by 1.
    pub fn inc(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    /// Adds a value to the counter.
    pub fn add(&self, val: u64) {
        self.0.fetch_add(val, Ordering::Relaxed);
    }

    /// Gets the current value of the counter.
    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Counters for the whole hook: capture, engine, control.
#[derive(Debug, Default)]
pub struct EngineMetrics {
    // Capture loop
    /// Frames read from the capture socket.
    pub frames_received: Counter,
    /// Bytes read from the capture socket.
    pub rx_bytes: Counter,
    /// Frames skipped because the ethertype was not IPv4.
    pub frames_non_ipv4: Counter,
    /// Rewritten frames sent back out.
    pub reinjected: Counter,
    /// Reinjection attempts that failed.
    pub reinject_errors: Counter,

    // Engine
    /// Buffers handed to the engine.
    pub packets_processed: Counter,
    /// Buffers that failed header validation.
    pub parse_failures: Counter,
    /// IPv4 fragments passed through untouched.
    pub fragments: Counter,
    /// Packets carrying a transport other than TCP or UDP.
    pub non_tcp_udp: Counter,
    /// Packets whose match field equaled the rule port.
    pub matched: Counter,
    /// Matching packets rewritten.
    pub rewritten: Counter,
    /// Matching packets logged in observe mode.
    pub observed: Counter,

    // Control channel
    /// Rule updates applied.
    pub reloads_applied: Counter,
    /// Rule updates rejected.
    pub reloads_rejected: Counter,
}

impl EngineMetrics {
    /// Creates a new metrics registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Exports all metrics as key-value pairs.
    pub fn export(&self) -> Vec<(String, u64)> {
        vec![
            ("frames_received".into(), self.frames_received.get()),
            ("rx_bytes".into(), self.rx_bytes.get()),
            ("frames_non_ipv4".into(), self.frames_non_ipv4.get()),
            ("reinjected".into(), self.reinjected.get()),
            ("reinject_errors".into(), self.reinject_errors.get()),
            ("packets_processed".into(), self.packets_processed.get()),
            ("parse_failures".into(), self.parse_failures.get()),
            ("fragments".into(), self.fragments.get()),
            ("non_tcp_udp".into(), self.non_tcp_udp.get()),
            ("matched".into(), self.matched.get()),
            ("rewritten".into(), self.rewritten.get()),
            ("observed".into(), self.observed.get()),
            ("reloads_applied".into(), self.reloads_applied.get()),
            ("reloads_rejected".into(), self.reloads_rejected.get()),
        ]
    }
}
