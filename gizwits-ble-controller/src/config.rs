use std::time::Duration;

use gizwits_proto::ble::DEFAULT_PACKET_SIZE;
use gizwits_proto::packet_size_for_mtu;

/// Knobs for one link
#[derive(Debug, Clone)]
pub struct LinkConfig {
    /// How long to scan before giving up on finding a device
    pub scan_duration: Duration,
    /// Requested upper bound on every written packet
    pub packet_size: usize,
    /// ATT MTU negotiated for the link; packets never exceed `mtu - 3`
    pub mtu: Option<u16>,
    /// Abort a transfer when a write does not complete in time. `None` waits forever.
    pub ack_timeout: Option<Duration>,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            scan_duration: Duration::from_secs(5),
            packet_size: DEFAULT_PACKET_SIZE,
            mtu: None,
            ack_timeout: None,
        }
    }
}

impl LinkConfig {
    /// Size packets for a negotiated ATT MTU
    pub fn with_mtu(mut self, mtu: u16) -> Self {
        self.mtu = Some(mtu);
        self.packet_size = packet_size_for_mtu(mtu);
        self
    }

    /// Packet size the engine should use: the requested size, capped by the
    /// MTU when one is known.
    pub fn packet_ceiling(&self) -> usize {
        match self.mtu {
            Some(mtu) => self.packet_size.min(packet_size_for_mtu(mtu)),
            None => self.packet_size,
        }
    }
}
