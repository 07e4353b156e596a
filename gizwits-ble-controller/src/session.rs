//! One live link to a Gizwits peripheral
//!
//! The session owns the engine and is driven from a single task, so every
//! engine callback runs serialized.

use std::pin::Pin;

use btleplug::api::{Peripheral as _, ValueNotification};
use btleplug::platform::Peripheral;
use futures::Stream;
use log::{info, warn};
use uuid::Uuid;

use gizwits_link::{Engine, Listener, WriteMode};
use gizwits_proto::ble::{NOTIFY_UUID, SERVICE_UUID, WRITE_UUID};

use crate::ble::{parse_uuid, to_link};
use crate::driver::{PeripheralWriter, drain_writes, pump_notification};
use crate::{ControllerError, LinkConfig, WriteSlot};

type Notifications = Pin<Box<dyn Stream<Item = ValueNotification> + Send>>;

pub struct Session<L> {
    peripheral: Peripheral,
    write_char: btleplug::api::Characteristic,
    notify_uuid: Uuid,
    engine: Engine<WriteSlot, L>,
    notifications: Notifications,
    config: LinkConfig,
}

impl<L: Listener> Session<L> {
    /// Connect, bind the Gizwits characteristics and enable notifications.
    ///
    /// The peripheral is disconnected again if binding fails.
    pub async fn connect(
        peripheral: Peripheral,
        listener: L,
        config: LinkConfig,
    ) -> Result<Self, ControllerError> {
        info!("connecting to {}", peripheral.address());
        peripheral.connect().await?;

        match Self::bind(peripheral.clone(), listener, config).await {
            Ok(session) => Ok(session),
            Err(e) => {
                warn!("rejecting connection: {e}");
                if let Err(disconnect) = peripheral.disconnect().await {
                    warn!("disconnect after rejection failed: {disconnect}");
                }
                Err(e)
            }
        }
    }

    async fn bind(
        peripheral: Peripheral,
        listener: L,
        config: LinkConfig,
    ) -> Result<Self, ControllerError> {
        peripheral.discover_services().await?;

        let service_uuid = parse_uuid(SERVICE_UUID);
        let write_uuid = parse_uuid(WRITE_UUID);
        let notify_uuid = parse_uuid(NOTIFY_UUID);

        let characteristics = peripheral.characteristics();

        let write_char = characteristics
            .iter()
            .find(|c| c.service_uuid == service_uuid && c.uuid == write_uuid)
            .cloned()
            .ok_or(ControllerError::CharacteristicMissing(write_uuid))?;

        let notify_char = characteristics
            .iter()
            .find(|c| c.service_uuid == service_uuid && c.uuid == notify_uuid)
            .cloned()
            .ok_or(ControllerError::CharacteristicMissing(notify_uuid))?;

        let mut engine = Engine::new(WriteSlot::default(), listener);
        engine.on_connection_established(to_link(&write_char), to_link(&notify_char))?;
        let packet_size = engine.set_packet_size(config.packet_ceiling())?;
        info!("writing packets of up to {packet_size} bytes");

        peripheral.subscribe(&notify_char).await?;
        let notifications = peripheral.notifications().await?;

        Ok(Self {
            peripheral,
            write_char,
            notify_uuid,
            engine,
            notifications,
            config,
        })
    }

    pub fn write_mode(&self) -> Option<WriteMode> {
        self.engine.write_mode()
    }

    /// Send a payload and wait until its last packet is written.
    pub async fn send(&mut self, payload: impl Into<Vec<u8>>) -> Result<(), ControllerError> {
        self.engine.send(payload)?;
        let mut writer = PeripheralWriter {
            peripheral: &self.peripheral,
            characteristic: &self.write_char,
        };
        drain_writes(&mut writer, &mut self.engine, self.config.ack_timeout).await
    }

    /// Wait for the next notification and hand it to the engine.
    ///
    /// Returns `false` once the notification stream ends, which means the
    /// link is gone.
    pub async fn pump_notification(&mut self) -> Result<bool, ControllerError> {
        pump_notification(&mut self.notifications, self.notify_uuid, &mut self.engine).await
    }

    pub async fn disconnect(&mut self) -> Result<(), ControllerError> {
        self.engine.on_disconnected();
        self.peripheral.disconnect().await?;
        info!("disconnected from {}", self.peripheral.address());
        Ok(())
    }
}
