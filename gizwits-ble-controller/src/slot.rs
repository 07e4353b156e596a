use gizwits_link::{Transport, WriteMode};

/// A packet the engine asked to write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingWrite {
    pub packet: Vec<u8>,
    pub mode: WriteMode,
}

#[derive(thiserror::Error, Debug)]
#[error("a {0}-byte write is still pending")]
pub struct SlotOccupied(pub usize);

/// Engine transport that parks one write for the async driver to perform
///
/// The session takes the parked write, awaits it on the peripheral and only
/// then acknowledges it, so a second write can never start early.
#[derive(Debug, Default)]
pub struct WriteSlot {
    pending: Option<PendingWrite>,
}

impl WriteSlot {
    pub fn take(&mut self) -> Option<PendingWrite> {
        self.pending.take()
    }
}

impl Transport for WriteSlot {
    type Error = SlotOccupied;

    fn issue_write(&mut self, packet: &[u8], mode: WriteMode) -> Result<(), SlotOccupied> {
        if let Some(pending) = &self.pending {
            return Err(SlotOccupied(pending.packet.len()));
        }
        self.pending = Some(PendingWrite {
            packet: packet.to_vec(),
            mode,
        });
        Ok(())
    }
}
