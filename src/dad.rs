//! Duplicate Address Detection (RFC 5227 probing).
//!
//! Each [`ProbeContext`] tests one candidate address on one interface. While
//! armed it emits `probe_count` ARP probes (sender IP 0.0.0.0) one second
//! apart, optionally with up to one second of random jitter, then waits
//! `final_wait` ticks and reports [`DadOutcome::Accepted`].
//!
//! ```text
//!   arm ──> Waiting ──(fire: probe, n-1 left)──> Waiting
//!              │                                    │
//!              └──────(fire: last probe)────> FinalWait ──(fire)──> Idle + Accepted
//!
//!   any state ──(conflicting ARP from a foreign MAC)──> Idle + Conflict
//! ```
//!
//! The candidate address doubles as the armed flag: clearing it stops the
//! run no matter how many probes remain. Re-arming restarts from scratch.

use alloc::sync::Arc;

use rand::Rng;

use crate::arp::ArpPacket;
use crate::config::ProbeSlot;
use crate::ethernet::EthAddr;
use crate::ipv4::Ipv4Addr;

/// Final result of a probe run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DadOutcome {
    /// No other host claimed the candidate.
    Accepted,
    /// Another host uses the candidate.
    Conflict { local: EthAddr, remote: EthAddr },
}

/// Result callback, invoked once per run with the candidate and outcome.
pub type DadCallback = Arc<dyn Fn(Ipv4Addr, DadOutcome) + Send + Sync>;

/// Index of a probe context, in `ArpConfig::probe_slots` order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProbeId(pub usize);

/// Parameters of one probe run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeParams {
    /// Number of probes to send (RFC 5227 PROBE_NUM is 3).
    pub probe_count: u8,
    /// Ticks to wait after the last probe before accepting.
    pub final_wait: u32,
    /// Add `[0, ticks_per_second)` ticks of jitter between probes.
    pub randomize_interval: bool,
    /// Ticks before the first probe. Zero fires on the next tick.
    pub initial_delay: u32,
}

impl Default for ProbeParams {
    fn default() -> Self {
        ProbeParams {
            probe_count: 3,
            final_wait: 20,
            randomize_interval: true,
            initial_delay: 0,
        }
    }
}

/// Observable phase of a context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeState {
    Idle,
    Waiting,
    FinalWait,
}

/// What a tick asks the resolver to do.
pub enum ProbeAction {
    None,
    /// Send a probe for this candidate.
    Probe(Ipv4Addr),
    /// Run finished cleanly; report acceptance.
    Accepted(Ipv4Addr, DadCallback),
}

/// How an inbound ARP message relates to an armed context.
pub enum ConflictCheck {
    /// Message does not concern this context.
    Unrelated,
    /// Our own probe came back to us.
    Loopback,
    /// Someone else claims the candidate. The context is now idle.
    Conflict(Ipv4Addr, DadCallback),
}

/// Per-slot DAD state.
pub struct ProbeContext {
    slot: ProbeSlot,
    candidate: Option<Ipv4Addr>,
    probes_remaining: u8,
    randomize_interval: bool,
    final_wait: u32,
    next_fire: u32,
    callback: Option<DadCallback>,
}

impl ProbeContext {
    pub fn new(slot: ProbeSlot) -> Self {
        ProbeContext {
            slot,
            candidate: None,
            probes_remaining: 0,
            randomize_interval: false,
            final_wait: 0,
            next_fire: 0,
            callback: None,
        }
    }

    pub fn slot(&self) -> ProbeSlot {
        self.slot
    }

    pub fn candidate(&self) -> Option<Ipv4Addr> {
        self.candidate
    }

    pub fn probes_remaining(&self) -> u8 {
        self.probes_remaining
    }

    pub fn state(&self) -> ProbeState {
        match self.candidate {
            None => ProbeState::Idle,
            Some(_) if self.probes_remaining == 0 => ProbeState::FinalWait,
            Some(_) => ProbeState::Waiting,
        }
    }

    /// Start (or restart) probing `candidate`.
    ///
    /// An unspecified candidate just disarms the context.
    pub fn arm(&mut self, candidate: Ipv4Addr, params: ProbeParams, callback: DadCallback) {
        if candidate.is_unspecified() {
            self.disarm();
            return;
        }
        self.candidate = Some(candidate);
        self.probes_remaining = params.probe_count;
        self.randomize_interval = params.randomize_interval;
        self.final_wait = params.final_wait;
        self.next_fire = params.initial_delay.max(1);
        self.callback = Some(callback);
    }

    /// Stop probing without reporting.
    pub fn disarm(&mut self) {
        self.candidate = None;
        self.probes_remaining = 0;
        self.next_fire = 0;
        self.callback = None;
    }

    /// Advance one tick.
    pub fn on_tick<R: Rng + ?Sized>(&mut self, ticks_per_second: u32, rng: &mut R) -> ProbeAction {
        let candidate = match self.candidate {
            Some(ip) => ip,
            None => return ProbeAction::None,
        };

        self.next_fire = self.next_fire.saturating_sub(1);
        if self.next_fire != 0 {
            return ProbeAction::None;
        }

        if self.probes_remaining > 0 {
            self.probes_remaining -= 1;
            let wait = if self.probes_remaining == 0 {
                self.final_wait
            } else if self.randomize_interval && ticks_per_second > 1 {
                ticks_per_second + rng.gen_range(0..ticks_per_second)
            } else {
                ticks_per_second
            };
            self.next_fire = wait.max(1);
            return ProbeAction::Probe(candidate);
        }

        let callback = self.callback.take();
        self.disarm();
        match callback {
            Some(cb) => ProbeAction::Accepted(candidate, cb),
            None => ProbeAction::None,
        }
    }

    /// Inspect an inbound message received on this context's interface.
    pub fn check_conflict(&mut self, pkt: &ArpPacket, local_hw: EthAddr) -> ConflictCheck {
        let candidate = match self.candidate {
            Some(ip) => ip,
            None => return ConflictCheck::Unrelated,
        };

        let probe_for_candidate = pkt.is_probe() && pkt.target_ip == candidate;
        if !probe_for_candidate && pkt.sender_ip != candidate {
            return ConflictCheck::Unrelated;
        }

        if pkt.sender_hw == local_hw {
            return ConflictCheck::Loopback;
        }

        let callback = self.callback.take();
        self.disarm();
        match callback {
            Some(cb) => ConflictCheck::Conflict(candidate, cb),
            None => ConflictCheck::Unrelated,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
