//! Gratuitous ARP announcements (RFC 5227 section 2.3).
//!
//! One context per interface. After an address is accepted the resolver
//! broadcasts `count` gratuitous messages, the first on the next tick and
//! the rest `interval` ticks apart. The message is request-shaped for
//! self-assigned addresses and reply-shaped when announcing on behalf of a
//! DHCP lease.

use crate::arp::ArpOp;
use crate::config::AssignMethod;
use crate::ipv4::Ipv4Addr;

/// Per-interface announcement schedule.
#[derive(Debug, Clone, Copy)]
pub struct AnnounceContext {
    ip: Ipv4Addr,
    remaining: u8,
    interval: u32,
    op: ArpOp,
    next_fire: u32,
}

impl Default for AnnounceContext {
    fn default() -> Self {
        Self::new()
    }
}

impl AnnounceContext {
    pub const fn new() -> Self {
        AnnounceContext {
            ip: Ipv4Addr::UNSPECIFIED,
            remaining: 0,
            interval: 0,
            op: ArpOp::Request,
            next_fire: 0,
        }
    }

    /// (Re)start announcing `ip`. `count == 0` cancels any schedule.
    pub fn start(&mut self, ip: Ipv4Addr, count: u8, interval: u32, method: AssignMethod) {
        self.ip = ip;
        self.remaining = count;
        self.interval = interval.max(1);
        self.op = match method {
            AssignMethod::Dhcp => ArpOp::Reply,
            AssignMethod::Static | AssignMethod::LinkLocal => ArpOp::Request,
        };
        self.next_fire = if count > 0 { 1 } else { 0 };
    }

    pub fn is_active(&self) -> bool {
        self.next_fire != 0
    }

    /// Advance one tick; yields the address and opcode to announce when due.
    pub fn on_tick(&mut self) -> Option<(Ipv4Addr, ArpOp)> {
        if self.next_fire == 0 {
            return None;
        }
        self.next_fire -= 1;
        if self.next_fire != 0 || self.remaining == 0 {
            return None;
        }

        self.remaining -= 1;
        if self.remaining > 0 {
            self.next_fire = self.interval;
        }
        Some((self.ip, self.op))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ip() -> Ipv4Addr {
        Ipv4Addr::new(10, 0, 0, 42)
    }

    #[test]
    fn test_schedule() {
        let mut ctx = AnnounceContext::new();
        ctx.start(ip(), 2, 20, AssignMethod::LinkLocal);

        let mut fired = Vec::new();
        for t in 1..=50u32 {
            if let Some((addr, op)) = ctx.on_tick() {
                assert_eq!(addr, ip());
                assert_eq!(op, ArpOp::Request);
                fired.push(t);
            }
        }
        assert_eq!(fired, vec![1, 21]);
        assert!(!ctx.is_active());
    }

    #[test]
    fn test_dhcp_is_reply_shaped() {
        let mut ctx = AnnounceContext::new();
        ctx.start(ip(), 1, 10, AssignMethod::Dhcp);
        assert_eq!(ctx.on_tick(), Some((ip(), ArpOp::Reply)));
        assert_eq!(ctx.on_tick(), None);
    }

    #[test]
    fn test_zero_count_halts() {
        let mut ctx = AnnounceContext::new();
        ctx.start(ip(), 3, 10, AssignMethod::Static);
        assert!(ctx.on_tick().is_some());
        ctx.start(ip(), 0, 10, AssignMethod::Static);
        assert!(!ctx.is_active());
        for _ in 0..30 {
            assert_eq!(ctx.on_tick(), None);
        }
    }
}
