//! Chunked transfer engine
//!
//! State machine: `Idle -> Sending -> Idle`. While sending exactly one packet
//! is outstanding and progress is driven only by
//! [`Engine::on_packet_acknowledged`].

use gizwits_proto::ble::{DEFAULT_PACKET_SIZE, MAX_ATTRIBUTE_LEN};
use gizwits_proto::{CharProperties, WriteMode};
use log::{debug, info, warn};
use uuid::Uuid;

use crate::{LinkError, Transfer};

/// Performs characteristic writes on behalf of the engine
///
/// Hosts implement this over their BLE stack. `issue_write` must only start
/// the write; completion is reported back through
/// [`Engine::on_packet_acknowledged`].
pub trait Transport {
    type Error: std::error::Error + Send + Sync + 'static;

    fn issue_write(&mut self, packet: &[u8], mode: WriteMode) -> Result<(), Self::Error>;
}

/// Receives completed transfers and inbound messages
pub trait Listener {
    /// The whole payload passed to [`Engine::send`] has been written.
    fn on_data_sent(&mut self, payload: &[u8]);

    /// One notification arrived and decoded.
    fn on_data_received(&mut self, message: String);
}

/// A characteristic as discovered on the peer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Characteristic {
    pub uuid: Uuid,
    pub properties: CharProperties,
}

impl Characteristic {
    pub fn new(uuid: Uuid, properties: CharProperties) -> Self {
        Self { uuid, properties }
    }
}

/// Characteristics bound while connected
#[derive(Debug, Clone, Copy)]
struct Binding {
    write: Characteristic,
    notify: Characteristic,
    mode: WriteMode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Idle,
    Sending,
}

pub struct Engine<T, L> {
    transport: T,
    listener: L,
    binding: Option<Binding>,
    transfer: Option<Transfer>,
    packet_size: usize,
}

impl<T: Transport, L: Listener> Engine<T, L> {
    pub fn new(transport: T, listener: L) -> Self {
        Self {
            transport,
            listener,
            binding: None,
            transfer: None,
            packet_size: DEFAULT_PACKET_SIZE,
        }
    }

    pub fn state(&self) -> State {
        match self.transfer {
            Some(_) => State::Sending,
            None => State::Idle,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.binding.is_some()
    }

    pub fn write_mode(&self) -> Option<WriteMode> {
        self.binding.as_ref().map(|b| b.mode)
    }

    pub fn packet_size(&self) -> usize {
        self.packet_size
    }

    /// (acknowledged bytes, total bytes) of the transfer in flight
    pub fn progress(&self) -> Option<(usize, usize)> {
        self.transfer.as_ref().map(|t| (t.offset(), t.len()))
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn listener(&self) -> &L {
        &self.listener
    }

    pub fn listener_mut(&mut self) -> &mut L {
        &mut self.listener
    }

    /// Apply a negotiated packet size, clamped to `1..=512`.
    ///
    /// Returns the size in effect. Refused while a transfer is in flight.
    pub fn set_packet_size(&mut self, size: usize) -> Result<usize, LinkError> {
        if self.transfer.is_some() {
            return Err(LinkError::Busy);
        }
        self.packet_size = size.clamp(1, MAX_ATTRIBUTE_LEN);
        debug!("packet size set to {}", self.packet_size);
        Ok(self.packet_size)
    }

    /// Bind the write and notify characteristics of a fresh connection.
    ///
    /// On error the engine is left unbound and the caller should drop the
    /// connection.
    pub fn on_connection_established(
        &mut self,
        write: Characteristic,
        notify: Characteristic,
    ) -> Result<WriteMode, LinkError> {
        self.binding = None;
        self.discard_transfer("rebinding");

        let mode = WriteMode::for_properties(write.properties).ok_or(
            LinkError::UnsupportedCharacteristic {
                uuid: write.uuid,
                reason: "neither write nor write-without-response",
            },
        )?;

        if !notify.properties.can_notify() {
            return Err(LinkError::UnsupportedCharacteristic {
                uuid: notify.uuid,
                reason: "neither notify nor indicate",
            });
        }

        info!(
            "bound write {} ({}) and notify {}",
            write.uuid,
            mode.as_str(),
            notify.uuid
        );
        self.binding = Some(Binding {
            write,
            notify,
            mode,
        });
        Ok(mode)
    }

    pub fn on_disconnected(&mut self) {
        self.binding = None;
        self.discard_transfer("disconnected");
    }

    /// Start sending `payload`.
    ///
    /// Writes the first packet immediately. An empty payload completes
    /// at once without any write.
    pub fn send(&mut self, payload: impl Into<Vec<u8>>) -> Result<(), LinkError> {
        let (mode, target) = match &self.binding {
            Some(binding) => (binding.mode, binding.write.uuid),
            None => return Err(LinkError::NotConnected),
        };
        if self.transfer.is_some() {
            return Err(LinkError::Busy);
        }

        let mut transfer = Transfer::new(payload.into());
        if transfer.is_empty() {
            debug!("empty payload, nothing to write");
            self.listener.on_data_sent(transfer.payload());
            return Ok(());
        }

        let total = transfer.len();
        let packet = transfer.next_packet(self.packet_size);
        debug!("packet 0..{} of {} to {}", packet.len(), total, target);
        self.transport
            .issue_write(packet, mode)
            .map_err(|e| LinkError::Transport(Box::new(e)))?;

        self.transfer = Some(transfer);
        Ok(())
    }

    /// The last packet's write completed.
    pub fn on_packet_acknowledged(&mut self) -> Result<(), LinkError> {
        let mut transfer = match self.transfer.take() {
            Some(transfer) => transfer,
            None => {
                warn!("write acknowledged with no transfer in flight");
                return Err(LinkError::UnexpectedAcknowledgement);
            }
        };

        transfer.acknowledge();
        if transfer.is_complete() {
            info!("sent {} bytes", transfer.len());
            self.listener.on_data_sent(transfer.payload());
            return Ok(());
        }

        // disconnect always discards the transfer, so a binding is present
        let mode = match &self.binding {
            Some(binding) => binding.mode,
            None => return Err(LinkError::NotConnected),
        };

        let start = transfer.offset();
        let total = transfer.len();
        let packet = transfer.next_packet(self.packet_size);
        debug!("packet {}..{} of {}", start, start + packet.len(), total);
        if let Err(e) = self.transport.issue_write(packet, mode) {
            warn!("write refused at {start}/{total}, transfer dropped");
            return Err(LinkError::Transport(Box::new(e)));
        }

        self.transfer = Some(transfer);
        Ok(())
    }

    /// A notification arrived on the notify characteristic.
    ///
    /// Each notification is one whole message. Bytes that are not UTF-8 are
    /// handed back in [`LinkError::Decode`] instead of reaching the listener.
    pub fn on_notification_received(&mut self, bytes: &[u8]) -> Result<(), LinkError> {
        let message = match std::str::from_utf8(bytes) {
            Ok(message) => message.to_string(),
            Err(source) => {
                return Err(LinkError::Decode {
                    bytes: bytes.to_vec(),
                    source,
                });
            }
        };
        match &self.binding {
            Some(binding) => debug!("received {} bytes on {}", bytes.len(), binding.notify.uuid),
            None => debug!("received {} bytes while unbound", bytes.len()),
        }
        self.listener.on_data_received(message);
        Ok(())
    }

    /// Drop the transfer in flight, if any, and return its payload.
    ///
    /// Used by host watchdogs when an acknowledgement never arrives.
    pub fn abort(&mut self) -> Option<Vec<u8>> {
        let transfer = self.transfer.take()?;
        warn!(
            "transfer aborted at {}/{}",
            transfer.offset(),
            transfer.len()
        );
        Some(transfer.into_payload())
    }

    fn discard_transfer(&mut self, why: &str) {
        if let Some(transfer) = self.transfer.take() {
            warn!(
                "{why}: discarding transfer at {}/{}",
                transfer.offset(),
                transfer.len()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gizwits_proto::ble::properties;

    #[derive(Debug, thiserror::Error)]
    #[error("link lost")]
    struct LinkLost;

    #[derive(Default)]
    struct Recorder {
        writes: Vec<(Vec<u8>, WriteMode)>,
        fail_after: Option<usize>,
    }

    impl Transport for Recorder {
        type Error = LinkLost;

        fn issue_write(&mut self, packet: &[u8], mode: WriteMode) -> Result<(), LinkLost> {
            if self.fail_after.is_some_and(|n| self.writes.len() >= n) {
                return Err(LinkLost);
            }
            self.writes.push((packet.to_vec(), mode));
            Ok(())
        }
    }

    #[derive(Default)]
    struct Inbox {
        sent: Vec<Vec<u8>>,
        received: Vec<String>,
    }

    impl Listener for Inbox {
        fn on_data_sent(&mut self, payload: &[u8]) {
            self.sent.push(payload.to_vec());
        }

        fn on_data_received(&mut self, message: String) {
            self.received.push(message);
        }
    }

    fn chars(write_props: u8) -> (Characteristic, Characteristic) {
        (
            Characteristic::new(
                Uuid::from_u128(0x0000ffb1_0000_1000_8000_00805f9b34fb),
                CharProperties::new(write_props),
            ),
            Characteristic::new(
                Uuid::from_u128(0x0000ffb2_0000_1000_8000_00805f9b34fb),
                CharProperties::new(properties::NOTIFY),
            ),
        )
    }

    fn connected() -> Engine<Recorder, Inbox> {
        let mut engine = Engine::new(Recorder::default(), Inbox::default());
        let (write, notify) = chars(properties::WRITE | properties::WRITE_NO_RESPONSE);
        engine.on_connection_established(write, notify).unwrap();
        engine
    }

    #[test]
    fn send_requires_binding() {
        let mut engine = Engine::new(Recorder::default(), Inbox::default());
        assert!(matches!(engine.send(vec![1, 2, 3]), Err(LinkError::NotConnected)));
        assert!(matches!(engine.send(Vec::new()), Err(LinkError::NotConnected)));
        assert!(engine.transport().writes.is_empty());
    }

    #[test]
    fn command_mode_when_no_write_request() {
        let mut engine = Engine::new(Recorder::default(), Inbox::default());
        let (write, notify) = chars(properties::WRITE_NO_RESPONSE);
        assert_eq!(
            engine.on_connection_established(write, notify).unwrap(),
            WriteMode::UnackedCommand
        );
        engine.send(b"hi".to_vec()).unwrap();
        assert_eq!(engine.transport().writes[0].1, WriteMode::UnackedCommand);
    }

    #[test]
    fn rejects_unwritable_characteristic() {
        let mut engine = Engine::new(Recorder::default(), Inbox::default());
        let (write, notify) = chars(properties::READ | properties::NOTIFY);
        let err = engine.on_connection_established(write, notify).unwrap_err();
        assert!(matches!(
            err,
            LinkError::UnsupportedCharacteristic { uuid, .. } if uuid == write.uuid
        ));
        assert!(!engine.is_connected());
    }

    #[test]
    fn rejects_silent_notify_characteristic() {
        let mut engine = Engine::new(Recorder::default(), Inbox::default());
        let (write, mut notify) = chars(properties::WRITE);
        notify.properties = CharProperties::new(properties::READ);
        assert!(matches!(
            engine.on_connection_established(write, notify),
            Err(LinkError::UnsupportedCharacteristic { .. })
        ));
        assert!(matches!(engine.send(vec![1]), Err(LinkError::NotConnected)));
    }

    #[test]
    fn empty_payload_completes_immediately() {
        let mut engine = connected();
        engine.send(Vec::new()).unwrap();
        assert!(engine.transport().writes.is_empty());
        assert_eq!(engine.listener().sent, vec![Vec::<u8>::new()]);
        assert_eq!(engine.state(), State::Idle);
    }

    #[test]
    fn empty_payload_is_busy_while_sending() {
        let mut engine = connected();
        engine.send(vec![4; 25]).unwrap();
        assert!(matches!(engine.send(Vec::new()), Err(LinkError::Busy)));
        assert!(engine.listener().sent.is_empty());
        assert_eq!(engine.progress(), Some((0, 25)));
    }

    #[test]
    fn busy_leaves_transfer_alone() {
        let mut engine = connected();
        engine.send(vec![1; 30]).unwrap();
        engine.on_packet_acknowledged().unwrap();

        assert!(matches!(engine.send(vec![2; 5]), Err(LinkError::Busy)));
        assert_eq!(engine.progress(), Some((20, 30)));
        assert_eq!(engine.transport().writes.len(), 2);

        engine.on_packet_acknowledged().unwrap();
        assert_eq!(engine.listener().sent, vec![vec![1; 30]]);
    }

    #[test]
    fn spurious_ack_is_reported() {
        let mut engine = connected();
        assert!(matches!(
            engine.on_packet_acknowledged(),
            Err(LinkError::UnexpectedAcknowledgement)
        ));
        assert_eq!(engine.state(), State::Idle);
    }

    #[test]
    fn refused_first_write_leaves_engine_idle() {
        let mut engine = connected();
        engine.transport_mut().fail_after = Some(0);
        assert!(matches!(engine.send(vec![1; 5]), Err(LinkError::Transport(_))));
        assert_eq!(engine.state(), State::Idle);
    }

    #[test]
    fn refused_continuation_drops_transfer() {
        let mut engine = connected();
        engine.transport_mut().fail_after = Some(1);
        engine.send(vec![9; 50]).unwrap();
        assert!(matches!(
            engine.on_packet_acknowledged(),
            Err(LinkError::Transport(_))
        ));
        assert_eq!(engine.state(), State::Idle);
        assert!(engine.listener().sent.is_empty());
    }

    #[test]
    fn packet_size_is_clamped_and_locked_while_sending() {
        let mut engine = connected();
        assert_eq!(engine.set_packet_size(0).unwrap(), 1);
        assert_eq!(engine.set_packet_size(4096).unwrap(), MAX_ATTRIBUTE_LEN);
        assert_eq!(engine.set_packet_size(64).unwrap(), 64);

        engine.send(vec![0; 100]).unwrap();
        assert!(matches!(engine.set_packet_size(20), Err(LinkError::Busy)));
        assert_eq!(engine.transport().writes[0].0.len(), 64);
    }

    #[test]
    fn abort_returns_payload() {
        let mut engine = connected();
        engine.send(b"abcdefghijklmnopqrstuvwxyz".to_vec()).unwrap();
        assert_eq!(
            engine.abort(),
            Some(b"abcdefghijklmnopqrstuvwxyz".to_vec())
        );
        assert_eq!(engine.state(), State::Idle);
        assert_eq!(engine.abort(), None);
    }

    #[test]
    fn notifications_decode_as_utf8() {
        let mut engine = connected();
        engine.on_notification_received("状态 ok".as_bytes()).unwrap();
        assert_eq!(engine.listener().received, vec!["状态 ok".to_string()]);

        let err = engine.on_notification_received(&[0x66, 0xff, 0x67]).unwrap_err();
        match err {
            LinkError::Decode { bytes, .. } => assert_eq!(bytes, vec![0x66, 0xff, 0x67]),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(engine.listener().received.len(), 1);
    }

    #[test]
    fn rebinding_discards_stale_transfer() {
        let mut engine = connected();
        engine.send(vec![3; 40]).unwrap();
        let (write, notify) = chars(properties::WRITE);
        engine.on_connection_established(write, notify).unwrap();
        assert_eq!(engine.state(), State::Idle);
        assert_eq!(engine.write_mode(), Some(WriteMode::AckedRequest));
    }
}
