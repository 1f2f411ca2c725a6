//! ARP (Address Resolution Protocol) header codec
//!
//! Stateless parsing and serialization of Ethernet/IPv4 ARP messages, plus
//! builders for the message shapes the resolver transmits.
//!
//! # Packet Format (RFC 826)
//!
//! ```text
//! +-------+-------+-------+-------+-------+-------+-------+-------+
//! |         Hardware Type         |         Protocol Type         |
//! +-------+-------+-------+-------+-------+-------+-------+-------+
//! |  HLen |  PLen |            Operation (1=Req, 2=Reply)         |
//! +-------+-------+-------+-------+-------+-------+-------+-------+
//! |                    Sender Hardware Address (6 bytes)          |
//! +-------+-------+-------+-------+-------+-------+-------+-------+
//! |                    Sender Protocol Address (4 bytes)          |
//! +-------+-------+-------+-------+-------+-------+-------+-------+
//! |                    Target Hardware Address (6 bytes)          |
//! +-------+-------+-------+-------+-------+-------+-------+-------+
//! |                    Target Protocol Address (4 bytes)          |
//! +-------+-------+-------+-------+-------+-------+-------+-------+
//! ```
//!
//! Unlike a host-only parser, the codec accepts a zero sender protocol
//! address (RFC 5227 probe) and unknown opcodes; deciding what to do with
//! those is the resolver's job.
//!
//! # References
//!
//! - RFC 826: Ethernet Address Resolution Protocol
//! - RFC 5227: IPv4 Address Conflict Detection

use alloc::vec::Vec;
use core::sync::atomic::{AtomicU64, Ordering};

use crate::ethernet::EthAddr;
use crate::ipv4::Ipv4Addr;

// ============================================================================
// ARP Constants (RFC 826)
// ============================================================================

/// Hardware type: Ethernet
pub const HTYPE_ETHERNET: u16 = 1;

/// Protocol type: IPv4
pub const PTYPE_IPV4: u16 = 0x0800;

/// Hardware address length: Ethernet MAC (6 bytes)
pub const HLEN_ETHERNET: u8 = 6;

/// Protocol address length: IPv4 (4 bytes)
pub const PLEN_IPV4: u8 = 4;

/// ARP operation: Request
pub const OPCODE_REQUEST: u16 = 1;

/// ARP operation: Reply
pub const OPCODE_REPLY: u16 = 2;

/// Length of the fixed control fields preceding the addresses
pub const ARP_FIXED_LEN: usize = 8;

/// ARP packet size for Ethernet/IPv4
pub const ARP_PACKET_LEN: usize =
    ARP_FIXED_LEN + 2 * HLEN_ETHERNET as usize + 2 * PLEN_IPV4 as usize;

// ============================================================================
// ARP Operation Code
// ============================================================================

/// ARP operation type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArpOp {
    /// ARP Request (who-has)
    Request,
    /// ARP Reply (is-at)
    Reply,
    /// Any other opcode (RARP, InARP, ...). Carried through untouched.
    Other(u16),
}

impl ArpOp {
    /// Convert from raw opcode
    pub fn from_raw(op: u16) -> Self {
        match op {
            OPCODE_REQUEST => ArpOp::Request,
            OPCODE_REPLY => ArpOp::Reply,
            other => ArpOp::Other(other),
        }
    }

    /// Convert to raw opcode
    pub fn to_raw(self) -> u16 {
        match self {
            ArpOp::Request => OPCODE_REQUEST,
            ArpOp::Reply => OPCODE_REPLY,
            ArpOp::Other(op) => op,
        }
    }
}

// ============================================================================
// ARP Packet
// ============================================================================

/// Parsed ARP packet for Ethernet/IPv4
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArpPacket {
    /// Sender hardware (MAC) address
    pub sender_hw: EthAddr,
    /// Sender protocol (IP) address
    pub sender_ip: Ipv4Addr,
    /// Target hardware (MAC) address
    pub target_hw: EthAddr,
    /// Target protocol (IP) address
    pub target_ip: Ipv4Addr,
    /// ARP operation
    pub op: ArpOp,
}

impl ArpPacket {
    /// RFC 5227 probe: a request carrying an unspecified sender IP.
    #[inline]
    pub fn is_probe(&self) -> bool {
        self.op == ArpOp::Request && self.sender_ip.is_unspecified()
    }
}

// ============================================================================
// ARP Errors
// ============================================================================

/// Header validation failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArpError {
    /// Packet is shorter than its control fields advertise
    Truncated,
    /// Invalid hardware type (not Ethernet)
    InvalidHardwareType,
    /// Invalid protocol type (not IPv4)
    InvalidProtocolType,
    /// Invalid address lengths
    InvalidAddressLength,
}

// ============================================================================
// ARP Statistics
// ============================================================================

/// ARP protocol statistics
#[derive(Debug, Default)]
pub struct ArpStats {
    /// ARP packets received
    pub rx_packets: AtomicU64,
    /// Packets dropped due to header errors
    pub rx_errors: AtomicU64,
    /// ARP requests received
    pub rx_requests: AtomicU64,
    /// ARP replies received
    pub rx_replies: AtomicU64,
    /// Resolution requests sent
    pub tx_requests: AtomicU64,
    /// ARP replies sent
    pub tx_replies: AtomicU64,
    /// DAD probes sent
    pub tx_probes: AtomicU64,
    /// Gratuitous announcements sent
    pub tx_announcements: AtomicU64,
    /// Transmit attempts the link layer refused
    pub tx_errors: AtomicU64,
    /// Address conflicts detected while probing
    pub conflicts: AtomicU64,
    /// Cache hits
    pub cache_hits: AtomicU64,
    /// Cache misses
    pub cache_misses: AtomicU64,
}

/// Point-in-time copy of [`ArpStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArpStatsSnapshot {
    pub rx_packets: u64,
    pub rx_errors: u64,
    pub rx_requests: u64,
    pub rx_replies: u64,
    pub tx_requests: u64,
    pub tx_replies: u64,
    pub tx_probes: u64,
    pub tx_announcements: u64,
    pub tx_errors: u64,
    pub conflicts: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
}

impl ArpStats {
    pub const fn new() -> Self {
        ArpStats {
            rx_packets: AtomicU64::new(0),
            rx_errors: AtomicU64::new(0),
            rx_requests: AtomicU64::new(0),
            rx_replies: AtomicU64::new(0),
            tx_requests: AtomicU64::new(0),
            tx_replies: AtomicU64::new(0),
            tx_probes: AtomicU64::new(0),
            tx_announcements: AtomicU64::new(0),
            tx_errors: AtomicU64::new(0),
            conflicts: AtomicU64::new(0),
            cache_hits: AtomicU64::new(0),
            cache_misses: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn inc_rx_packets(&self) {
        self.rx_packets.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn inc_rx_errors(&self) {
        self.rx_errors.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn inc_rx_requests(&self) {
        self.rx_requests.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn inc_rx_replies(&self) {
        self.rx_replies.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn inc_tx_requests(&self) {
        self.tx_requests.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn inc_tx_replies(&self) {
        self.tx_replies.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn inc_tx_probes(&self) {
        self.tx_probes.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn inc_tx_announcements(&self) {
        self.tx_announcements.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn inc_tx_errors(&self) {
        self.tx_errors.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn inc_conflicts(&self) {
        self.conflicts.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn inc_cache_hits(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn inc_cache_misses(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Take a snapshot of all counters.
    pub fn snapshot(&self) -> ArpStatsSnapshot {
        ArpStatsSnapshot {
            rx_packets: self.rx_packets.load(Ordering::Relaxed),
            rx_errors: self.rx_errors.load(Ordering::Relaxed),
            rx_requests: self.rx_requests.load(Ordering::Relaxed),
            rx_replies: self.rx_replies.load(Ordering::Relaxed),
            tx_requests: self.tx_requests.load(Ordering::Relaxed),
            tx_replies: self.tx_replies.load(Ordering::Relaxed),
            tx_probes: self.tx_probes.load(Ordering::Relaxed),
            tx_announcements: self.tx_announcements.load(Ordering::Relaxed),
            tx_errors: self.tx_errors.load(Ordering::Relaxed),
            conflicts: self.conflicts.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
        }
    }
}

// ============================================================================
// ARP Parsing
// ============================================================================

/// Parse an ARP packet from raw bytes.
///
/// Validates hardware type, protocol type, both address lengths and that the
/// buffer holds every address the control fields advertise. Trailing bytes
/// (Ethernet padding) are ignored.
pub fn parse_arp(buf: &[u8]) -> Result<ArpPacket, ArpError> {
    if buf.len() < ARP_FIXED_LEN {
        return Err(ArpError::Truncated);
    }

    let htype = u16::from_be_bytes([buf[0], buf[1]]);
    if htype != HTYPE_ETHERNET {
        return Err(ArpError::InvalidHardwareType);
    }

    let ptype = u16::from_be_bytes([buf[2], buf[3]]);
    if ptype != PTYPE_IPV4 {
        return Err(ArpError::InvalidProtocolType);
    }

    let hlen = buf[4];
    let plen = buf[5];
    if hlen != HLEN_ETHERNET || plen != PLEN_IPV4 {
        return Err(ArpError::InvalidAddressLength);
    }

    let advertised = ARP_FIXED_LEN + 2 * hlen as usize + 2 * plen as usize;
    if buf.len() < advertised {
        return Err(ArpError::Truncated);
    }

    let op = ArpOp::from_raw(u16::from_be_bytes([buf[6], buf[7]]));

    let mut sender_hw = [0u8; 6];
    sender_hw.copy_from_slice(&buf[8..14]);
    let sender_ip = Ipv4Addr::new(buf[14], buf[15], buf[16], buf[17]);

    let mut target_hw = [0u8; 6];
    target_hw.copy_from_slice(&buf[18..24]);
    let target_ip = Ipv4Addr::new(buf[24], buf[25], buf[26], buf[27]);

    Ok(ArpPacket {
        sender_hw: EthAddr(sender_hw),
        sender_ip,
        target_hw: EthAddr(target_hw),
        target_ip,
        op,
    })
}

// ============================================================================
// ARP Serialization
// ============================================================================

/// Serialize an ARP packet to bytes.
///
/// Returns the 28-byte ARP payload; Ethernet framing is the link layer's.
pub fn serialize_arp(pkt: &ArpPacket) -> Vec<u8> {
    let mut buf = Vec::with_capacity(ARP_PACKET_LEN);

    buf.extend_from_slice(&HTYPE_ETHERNET.to_be_bytes());
    buf.extend_from_slice(&PTYPE_IPV4.to_be_bytes());
    buf.push(HLEN_ETHERNET);
    buf.push(PLEN_IPV4);
    buf.extend_from_slice(&pkt.op.to_raw().to_be_bytes());
    buf.extend_from_slice(&pkt.sender_hw.0);
    buf.extend_from_slice(&pkt.sender_ip.octets());
    buf.extend_from_slice(&pkt.target_hw.0);
    buf.extend_from_slice(&pkt.target_ip.octets());

    buf
}

/// Build an ARP reply payload answering `target_ip`/`target_mac`.
pub fn build_arp_reply(
    our_mac: EthAddr,
    our_ip: Ipv4Addr,
    target_mac: EthAddr,
    target_ip: Ipv4Addr,
) -> Vec<u8> {
    serialize_arp(&ArpPacket {
        sender_hw: our_mac,
        sender_ip: our_ip,
        target_hw: target_mac,
        target_ip,
        op: ArpOp::Reply,
    })
}

/// Build an ARP request payload asking who has `target_ip`.
pub fn build_arp_request(our_mac: EthAddr, our_ip: Ipv4Addr, target_ip: Ipv4Addr) -> Vec<u8> {
    serialize_arp(&ArpPacket {
        sender_hw: our_mac,
        sender_ip: our_ip,
        target_hw: EthAddr::ZERO,
        target_ip,
        op: ArpOp::Request,
    })
}

/// Build an RFC 5227 probe for `candidate` (sender IP 0.0.0.0).
pub fn build_arp_probe(our_mac: EthAddr, candidate: Ipv4Addr) -> Vec<u8> {
    build_arp_request(our_mac, Ipv4Addr::UNSPECIFIED, candidate)
}

/// Build a gratuitous ARP payload (sender IP == target IP).
///
/// `op` selects a request-shaped or reply-shaped announcement.
pub fn build_gratuitous_arp(our_mac: EthAddr, our_ip: Ipv4Addr, op: ArpOp) -> Vec<u8> {
    serialize_arp(&ArpPacket {
        sender_hw: our_mac,
        sender_ip: our_ip,
        target_hw: EthAddr::ZERO,
        target_ip: our_ip,
        op,
    })
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn make_test_arp_request() -> Vec<u8> {
        let pkt = ArpPacket {
            sender_hw: EthAddr::new(0x00, 0x11, 0x22, 0x33, 0x44, 0x55),
            sender_ip: Ipv4Addr::new(192, 168, 1, 100),
            target_hw: EthAddr::ZERO,
            target_ip: Ipv4Addr::new(192, 168, 1, 1),
            op: ArpOp::Request,
        };
        serialize_arp(&pkt)
    }

    #[test]
    fn test_parse_valid_arp() {
        let data = make_test_arp_request();
        assert_eq!(data.len(), ARP_PACKET_LEN);
        let pkt = parse_arp(&data).expect("should parse");
        assert_eq!(pkt.op, ArpOp::Request);
        assert_eq!(pkt.sender_ip, Ipv4Addr::new(192, 168, 1, 100));
        assert_eq!(pkt.target_ip, Ipv4Addr::new(192, 168, 1, 1));
    }

    #[test]
    fn test_parse_truncated() {
        let data = [0u8; 6];
        assert_eq!(parse_arp(&data), Err(ArpError::Truncated));

        let data = make_test_arp_request();
        assert_eq!(parse_arp(&data[..27]), Err(ArpError::Truncated));
    }

    #[test]
    fn test_parse_invalid_htype() {
        let mut data = make_test_arp_request();
        data[0] = 0x00;
        data[1] = 0x06;
        assert_eq!(parse_arp(&data), Err(ArpError::InvalidHardwareType));
    }

    #[test]
    fn test_parse_invalid_ptype() {
        let mut data = make_test_arp_request();
        data[2] = 0x86;
        data[3] = 0xdd;
        assert_eq!(parse_arp(&data), Err(ArpError::InvalidProtocolType));
    }

    #[test]
    fn test_parse_invalid_lengths() {
        let mut data = make_test_arp_request();
        data[4] = 8;
        assert_eq!(parse_arp(&data), Err(ArpError::InvalidAddressLength));

        let mut data = make_test_arp_request();
        data[5] = 16;
        assert_eq!(parse_arp(&data), Err(ArpError::InvalidAddressLength));
    }

    #[test]
    fn test_parse_accepts_padding_and_unknown_opcode() {
        let mut data = make_test_arp_request();
        data[7] = 9;
        data.extend_from_slice(&[0u8; 18]);
        let pkt = parse_arp(&data).expect("should parse");
        assert_eq!(pkt.op, ArpOp::Other(9));
    }

    #[test]
    fn test_probe_shape() {
        let mac = EthAddr::new(0x02, 0, 0, 0, 0, 1);
        let candidate = Ipv4Addr::new(169, 254, 10, 20);
        let pkt = parse_arp(&build_arp_probe(mac, candidate)).expect("should parse");
        assert!(pkt.is_probe());
        assert_eq!(pkt.target_ip, candidate);
        assert_eq!(pkt.target_hw, EthAddr::ZERO);
        assert_eq!(pkt.sender_hw, mac);
    }

    #[test]
    fn test_gratuitous_shape() {
        let mac = EthAddr::new(0x02, 0, 0, 0, 0, 1);
        let ip = Ipv4Addr::new(10, 0, 0, 5);
        let pkt = parse_arp(&build_gratuitous_arp(mac, ip, ArpOp::Reply)).expect("should parse");
        assert_eq!(pkt.op, ArpOp::Reply);
        assert_eq!(pkt.sender_ip, ip);
        assert_eq!(pkt.target_ip, ip);
        assert!(!pkt.is_probe());
    }

    #[test]
    fn test_reply_roundtrip() {
        let our_mac = EthAddr::new(0x00, 0x11, 0x22, 0x33, 0x44, 0x55);
        let our_ip = Ipv4Addr::new(192, 168, 1, 100);
        let peer_mac = EthAddr::new(0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff);
        let peer_ip = Ipv4Addr::new(192, 168, 1, 1);

        let data = build_arp_reply(our_mac, our_ip, peer_mac, peer_ip);
        let parsed = parse_arp(&data).expect("should parse");
        assert_eq!(parsed.op, ArpOp::Reply);
        assert_eq!(parsed.sender_hw, our_mac);
        assert_eq!(parsed.sender_ip, our_ip);
        assert_eq!(parsed.target_hw, peer_mac);
        assert_eq!(parsed.target_ip, peer_ip);
    }

    #[test]
    fn test_stats_snapshot() {
        let stats = ArpStats::new();
        stats.inc_rx_packets();
        stats.inc_rx_packets();
        stats.inc_tx_probes();
        let snap = stats.snapshot();
        assert_eq!(snap.rx_packets, 2);
        assert_eq!(snap.tx_probes, 1);
        assert_eq!(snap.conflicts, 0);
    }
}
