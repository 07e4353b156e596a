//! Gizwits BLE Controller
//!
//! BLE client for talking to Gizwits devices through the chunked transfer
//! engine in `gizwits-link`.
//!
//! # Example
//!
//! ```ignore
//! use gizwits_ble_controller::{ble, ChannelListener, LinkConfig, Session};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = LinkConfig::default();
//!     let device = ble::find_device(None, config.scan_duration).await?;
//!
//!     let (listener, mut events) = ChannelListener::new();
//!     let mut session = Session::connect(device, listener, config).await?;
//!     session.send(b"hello".to_vec()).await?;
//!     println!("{:?}", events.recv().await);
//!
//!     session.disconnect().await?;
//!     Ok(())
//! }
//! ```

pub mod ble;
mod config;
mod driver;
mod error;
mod events;
mod session;
mod slot;

pub use config::LinkConfig;
pub use error::ControllerError;
pub use events::{ChannelListener, LinkEvent};
pub use session::Session;
pub use slot::{PendingWrite, SlotOccupied, WriteSlot};
