//! Command-line front end for BLE peripheral advertising
//!
//! Loads an advertise configuration from a file and/or command-line flags and
//! drives a [`PeripheralController`](ble_peripheral_core::PeripheralController)
//! against the platform Bluetooth stack or the in-memory simulated stack.

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
