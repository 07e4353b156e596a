use std::time::Duration;

#[derive(thiserror::Error, Debug)]
pub enum ControllerError {
    #[error("no Bluetooth adapter found")]
    NoAdapter,
    #[error("no Gizwits device found")]
    DeviceNotFound,
    #[error("characteristic {0} not found")]
    CharacteristicMissing(uuid::Uuid),
    #[error("write not acknowledged within {0:?}")]
    AckTimeout(Duration),
    #[error("bluetooth: {0}")]
    Btleplug(#[from] btleplug::Error),
    #[error(transparent)]
    Link(#[from] gizwits_link::LinkError),
}
