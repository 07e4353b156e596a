//! BLE GATT layout for the Gizwits transparent-transfer service
//!
//! The peer exposes one service with a write characteristic (host to device)
//! and a notify characteristic (device to host).

/// BLE Service UUID (16-bit 0xFFB0 on the Bluetooth base UUID)
pub const SERVICE_UUID: &str = "0000ffb0-0000-1000-8000-00805f9b34fb";

/// Write Characteristic UUID (write / write without response)
pub const WRITE_UUID: &str = "0000ffb1-0000-1000-8000-00805f9b34fb";

/// Notify Characteristic UUID (notify)
pub const NOTIFY_UUID: &str = "0000ffb2-0000-1000-8000-00805f9b34fb";

/// Packet size that fits the default 23-byte ATT MTU on every link.
pub const DEFAULT_PACKET_SIZE: usize = 20;

/// ATT opcode + handle overhead of a write.
pub const ATT_HEADER_LEN: usize = 3;

/// Largest attribute value GATT allows.
pub const MAX_ATTRIBUTE_LEN: usize = 512;

/// GATT characteristic property bits
pub mod properties {
    pub const BROADCAST: u8 = 0x01;
    pub const READ: u8 = 0x02;
    pub const WRITE_NO_RESPONSE: u8 = 0x04;
    pub const WRITE: u8 = 0x08;
    pub const NOTIFY: u8 = 0x10;
    pub const INDICATE: u8 = 0x20;
}

/// Advertised properties of a characteristic
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CharProperties(pub u8);

impl CharProperties {
    pub const fn new(bits: u8) -> Self {
        Self(bits)
    }

    pub const fn bits(&self) -> u8 {
        self.0
    }

    pub const fn contains(&self, bits: u8) -> bool {
        self.0 & bits == bits
    }

    /// True if either write flavour is advertised
    pub const fn can_write(&self) -> bool {
        self.0 & (properties::WRITE | properties::WRITE_NO_RESPONSE) != 0
    }

    /// True if the value can be pushed to us (notify or indicate)
    pub const fn can_notify(&self) -> bool {
        self.0 & (properties::NOTIFY | properties::INDICATE) != 0
    }
}

/// How each packet is written
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Write request, completion confirmed by the peer
    AckedRequest,
    /// Write command, no application-level confirmation
    UnackedCommand,
}

impl WriteMode {
    /// Pick the write mode for a characteristic, preferring acknowledged writes.
    ///
    /// Returns `None` when the characteristic is not writable at all.
    pub fn for_properties(props: CharProperties) -> Option<Self> {
        if props.contains(properties::WRITE) {
            Some(WriteMode::AckedRequest)
        } else if props.contains(properties::WRITE_NO_RESPONSE) {
            Some(WriteMode::UnackedCommand)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            WriteMode::AckedRequest => "request",
            WriteMode::UnackedCommand => "command",
        }
    }
}

/// Number of packets needed for `len` bytes. An empty payload needs none.
pub fn packet_count(len: usize, packet_size: usize) -> usize {
    len.div_ceil(packet_size.max(1))
}

/// Packet size for a negotiated ATT MTU
///
/// Never below the default 20 bytes (the minimum MTU every link supports)
/// and never above the largest attribute value.
pub fn packet_size_for_mtu(mtu: u16) -> usize {
    (mtu as usize)
        .saturating_sub(ATT_HEADER_LEN)
        .clamp(DEFAULT_PACKET_SIZE, MAX_ATTRIBUTE_LEN)
}
