//! Pollable timers and the pending-message queue
//!
//! No background threads: the host calls `timer_tick(now)` with a
//! monotonic millisecond clock and all expired deadlines are drained.

use crate::msu::Msu;
use crate::types::Label;

/// One-shot millisecond timer, restartable
#[derive(Debug, Clone, Default)]
pub struct SigTimer {
    interval: u64,
    fire: Option<u64>,
}

impl SigTimer {
    pub fn new(interval: u64) -> Self {
        Self { interval, fire: None }
    }

    pub fn interval(&self) -> u64 {
        self.interval
    }

    pub fn start(&mut self, now: u64) {
        self.fire = Some(now + self.interval);
    }

    pub fn stop(&mut self) {
        self.fire = None;
    }

    pub fn started(&self) -> bool {
        self.fire.is_some()
    }

    /// True when running and the deadline has passed
    pub fn timeout(&self, now: u64) -> bool {
        matches!(self.fire, Some(at) if now >= at)
    }

    /// True when running and the deadline falls within the next `ms`
    pub fn fires_within(&self, now: u64, ms: u64) -> bool {
        self.timeout(now + ms)
    }
}

/// A buffered management message awaiting acknowledgment.
///
/// Retransmitted every `interval` ms until the `global` deadline, when
/// the owner is given a final timeout instead.
#[derive(Debug, Clone)]
pub struct PendingMsg {
    pub msu: Msu,
    pub label: Label,
    pub tx_sls: i32,
    interval: u64,
    fire_at: u64,
    global_at: Option<u64>,
}

impl PendingMsg {
    pub fn new(msu: Msu, label: Label, tx_sls: i32, interval: u64, global: u64, now: u64) -> Self {
        Self {
            msu,
            label,
            tx_sls,
            interval,
            fire_at: now + interval,
            global_at: (global > 0).then(|| now + global),
        }
    }

    /// Heading-code byte of the buffered message
    pub fn snm_code(&self) -> Option<u8> {
        self.msu.as_bytes().get(1 + self.label.length()).copied()
    }

    /// Message-specific bytes following the heading code
    pub fn snm_extra(&self) -> &[u8] {
        let skip = 2 + self.label.length();
        self.msu.as_bytes().get(skip..).unwrap_or(&[])
    }

    /// Whether an incoming label acknowledges this entry (addresses
    /// swapped, same link selector)
    pub fn matches(&self, label: &Label) -> bool {
        self.label.opc == label.dpc && self.label.dpc == label.opc && self.label.sls == label.sls
    }

    /// True once the global deadline has passed (or none was set)
    pub fn expired(&self, now: u64) -> bool {
        self.global_at.map_or(true, |at| now >= at)
    }

    /// Re-arm the retransmission deadline
    pub fn rearm(&mut self, now: u64) {
        self.fire_at = now + self.interval;
    }
}

/// Queue of pending messages ordered by next fire time
#[derive(Debug, Default)]
pub struct PendingQueue {
    entries: Vec<PendingMsg>,
}

impl PendingQueue {
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Insert keeping fire order; equal deadlines keep insertion order
    pub fn add(&mut self, msg: PendingMsg) {
        let pos = self
            .entries
            .iter()
            .position(|e| e.fire_at > msg.fire_at)
            .unwrap_or(self.entries.len());
        self.entries.insert(pos, msg);
    }

    /// Pop the earliest entry whose deadline has passed
    pub fn timeout(&mut self, now: u64) -> Option<PendingMsg> {
        if self.entries.first().map_or(false, |e| e.fire_at <= now) {
            Some(self.entries.remove(0))
        } else {
            None
        }
    }

    /// Remove and return the first entry satisfying `pred`
    pub fn take<F: FnMut(&PendingMsg) -> bool>(&mut self, mut pred: F) -> Option<PendingMsg> {
        let pos = self.entries.iter().position(|e| pred(e))?;
        Some(self.entries.remove(pos))
    }
}
