//! Device discovery for Gizwits peripherals
//!
//! Provides functions to find the adapter and scan for Gizwits devices.

use btleplug::api::{Central, Manager as _, Peripheral as _, ScanFilter};
use btleplug::platform::{Adapter, Manager, Peripheral};
use log::{debug, info};
use std::time::Duration;
use uuid::Uuid;

use gizwits_link::{CharProperties, Characteristic};
use gizwits_proto::ble::SERVICE_UUID;

use crate::ControllerError;

/// A discovered BLE device
#[derive(Debug, Clone)]
pub struct GizwitsDevice {
    pub name: String,
    pub address: String,
    pub rssi: Option<i16>,
    pub is_gizwits: bool,
}

/// Parse UUID string into uuid::Uuid
pub(crate) fn parse_uuid(s: &str) -> Uuid {
    Uuid::parse_str(s).expect("invalid UUID in gizwits_proto")
}

/// The engine's view of a btleplug characteristic
pub(crate) fn to_link(c: &btleplug::api::Characteristic) -> Characteristic {
    Characteristic::new(c.uuid, CharProperties::new(c.properties.bits()))
}

/// Gizwits devices advertise the FFB0 service; some also carry it in the name
fn is_gizwits(name: &str, services: &[Uuid]) -> bool {
    let service = parse_uuid(SERVICE_UUID);
    services.contains(&service) || name.to_ascii_lowercase().contains("gizwits")
}

fn matches_target(target: Option<&str>, name: &str, address: &str, services: &[Uuid]) -> bool {
    match target {
        Some(t) => name.contains(t) || address.contains(t),
        None => is_gizwits(name, services),
    }
}

/// Get the default Bluetooth adapter
pub async fn get_adapter() -> Result<Adapter, ControllerError> {
    let manager = Manager::new().await?;
    let adapters = manager.adapters().await?;
    adapters.into_iter().next().ok_or(ControllerError::NoAdapter)
}

/// Scan for BLE devices
///
/// Returns every discovered device. Gizwits devices have `is_gizwits = true`.
pub async fn scan(duration: Duration) -> Result<Vec<GizwitsDevice>, ControllerError> {
    let adapter = get_adapter().await?;

    adapter.start_scan(ScanFilter::default()).await?;
    tokio::time::sleep(duration).await;

    let peripherals = adapter.peripherals().await?;
    let mut devices = Vec::new();

    for peripheral in peripherals {
        if let Some(props) = peripheral.properties().await? {
            let name = props.local_name.unwrap_or_else(|| "Unknown".to_string());
            let address = peripheral.address().to_string();
            let is_gizwits = is_gizwits(&name, &props.services);

            devices.push(GizwitsDevice {
                name,
                address,
                rssi: props.rssi,
                is_gizwits,
            });
        }
    }

    adapter.stop_scan().await?;
    info!("scan found {} devices", devices.len());
    Ok(devices)
}

/// Find a device by name/address pattern, or find any Gizwits device
pub async fn find_device(
    target: Option<&str>,
    duration: Duration,
) -> Result<Peripheral, ControllerError> {
    let adapter = get_adapter().await?;

    adapter.start_scan(ScanFilter::default()).await?;
    tokio::time::sleep(duration).await;

    let peripherals = adapter.peripherals().await?;

    for peripheral in peripherals {
        if let Some(props) = peripheral.properties().await? {
            let name = props.local_name.unwrap_or_default();
            let address = peripheral.address().to_string();

            if matches_target(target, &name, &address, &props.services) {
                adapter.stop_scan().await?;
                info!("found device: {name} ({address})");
                return Ok(peripheral);
            }
            debug!("skipping {name} ({address})");
        }
    }

    adapter.stop_scan().await?;
    Err(ControllerError::DeviceNotFound)
}
