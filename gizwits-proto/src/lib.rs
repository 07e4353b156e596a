//! Gizwits link protocol - service layout and packet-size policy
//!
//! This crate has no dependencies. The engine (`gizwits-link`) and the host
//! adapter (`gizwits-ble-controller`) both build on these constants.

pub mod ble;

pub use ble::{CharProperties, WriteMode, packet_count, packet_size_for_mtu};
