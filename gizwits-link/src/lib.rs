//! Gizwits Link
//!
//! The chunked transfer engine behind the Gizwits BLE link. It splits
//! outbound payloads into bounded packets, writes them one at a time, and
//! relays inbound notifications to a listener.
//!
//! The engine does no I/O. Hosts implement [`Transport`] to perform the
//! actual characteristic writes and call back into the [`Engine`] when a
//! write completes, a notification arrives, or the link goes away.
//!
//! # Example
//!
//! ```ignore
//! let mut engine = Engine::new(transport, listener);
//! engine.on_connection_established(write_char, notify_char)?;
//! engine.send(b"hello gizwits".to_vec())?;
//! // ... transport reports completion
//! engine.on_packet_acknowledged()?;
//! ```

mod engine;
mod error;
mod transfer;

pub use engine::{Characteristic, Engine, Listener, State, Transport};
pub use error::LinkError;
pub use transfer::Transfer;

pub use gizwits_proto::{CharProperties, WriteMode};
