//! Async driving of the engine: one write at a time, then notifications
//!
//! Kept apart from the btleplug session so the sequencing can run against
//! any [`PacketWriter`] and any notification stream.

use std::time::Duration;

use btleplug::api::{Peripheral as _, ValueNotification, WriteType};
use btleplug::platform::Peripheral;
use futures::{Stream, StreamExt};
use log::{debug, info, warn};
use uuid::Uuid;

use gizwits_link::{Engine, Listener, WriteMode};

use crate::{ControllerError, WriteSlot};

/// Performs one characteristic write and resolves when it is done
pub(crate) trait PacketWriter {
    async fn write_packet(&mut self, packet: &[u8], mode: WriteMode)
    -> Result<(), btleplug::Error>;
}

/// Writes to the bound write characteristic of a btleplug peripheral
pub(crate) struct PeripheralWriter<'a> {
    pub peripheral: &'a Peripheral,
    pub characteristic: &'a btleplug::api::Characteristic,
}

impl PacketWriter for PeripheralWriter<'_> {
    async fn write_packet(
        &mut self,
        packet: &[u8],
        mode: WriteMode,
    ) -> Result<(), btleplug::Error> {
        let write_type = match mode {
            WriteMode::AckedRequest => WriteType::WithResponse,
            WriteMode::UnackedCommand => WriteType::WithoutResponse,
        };
        self.peripheral
            .write(self.characteristic, packet, write_type)
            .await
    }
}

/// Perform parked writes one at a time, acknowledging each only after the
/// writer reports it done.
///
/// A write error, or a write outlasting `ack_timeout`, aborts the transfer.
pub(crate) async fn drain_writes<W: PacketWriter, L: Listener>(
    writer: &mut W,
    engine: &mut Engine<WriteSlot, L>,
    ack_timeout: Option<Duration>,
) -> Result<(), ControllerError> {
    while let Some(write) = engine.transport_mut().take() {
        let op = writer.write_packet(&write.packet, write.mode);

        let result = match ack_timeout {
            Some(limit) => match tokio::time::timeout(limit, op).await {
                Ok(result) => result,
                Err(_) => {
                    warn!("no write completion within {limit:?}");
                    engine.abort();
                    return Err(ControllerError::AckTimeout(limit));
                }
            },
            None => op.await,
        };

        if let Err(e) = result {
            warn!("write failed: {e}");
            engine.abort();
            return Err(e.into());
        }
        engine.on_packet_acknowledged()?;
    }
    Ok(())
}

/// Wait for the next notification and hand it to the engine.
///
/// Values from other characteristics are skipped. Returns `false` once the
/// stream ends, which means the link is gone.
pub(crate) async fn pump_notification<S, L>(
    notifications: &mut S,
    notify_uuid: Uuid,
    engine: &mut Engine<WriteSlot, L>,
) -> Result<bool, ControllerError>
where
    S: Stream<Item = ValueNotification> + Unpin,
    L: Listener,
{
    let notification = match notifications.next().await {
        Some(notification) => notification,
        None => {
            info!("notification stream closed");
            engine.on_disconnected();
            return Ok(false);
        }
    };

    if notification.uuid != notify_uuid {
        debug!("ignoring notification from {}", notification.uuid);
        return Ok(true);
    }

    engine.on_notification_received(&notification.value)?;
    Ok(true)
}
