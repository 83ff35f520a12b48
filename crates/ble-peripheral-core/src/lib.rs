//! Core types for driving a native Bluetooth Low Energy peripheral stack
//!
//! This crate turns a plain [`AdvertiseConfig`] into calls against an abstract
//! [`NativeBluetoothStack`], tracks whether the peripheral is currently
//! advertising, and maps native failure codes onto a small error taxonomy.
//! It does not encode advertisement packets itself; that is left to the
//! operating system's Bluetooth stack.
//!
//! ## Architecture
//!
//! - [`config`] - The advertise configuration sent by the application layer
//! - [`encoding`] - Byte-valued integer sequence encoding
//! - [`error`] - Error types and the native failure-code taxonomy
//! - [`payload`] - Advertise settings, advertisement payload and GATT service types
//! - [`observer`] - Callback observers handed to the native stack
//! - [`stack`] - The native stack trait
//! - [`controller`] - The peripheral controller and its advertising state machine
//! - [`simulated`] - In-memory native stack for tests and dry runs
//!
//! ## Usage
//!
//! ```rust,no_run
//! use ble_peripheral_core::{AdvertiseConfig, PeripheralController, SimulatedStack};
//!
//! # async fn example() -> ble_peripheral_core::Result<()> {
//! let config = AdvertiseConfig::new("0000180d-0000-1000-8000-00805f9b34fb")?
//!     .with_manufacturer_data(0x004C, vec![0x02, 0x15]);
//!
//! let mut controller = PeripheralController::new(SimulatedStack::new());
//! controller.initialize().await?;
//! controller.start(&config).await?;
//! controller.await_start().await?;
//! assert!(controller.is_advertising());
//!
//! controller.stop().await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod controller;
pub mod encoding;
pub mod error;
pub mod observer;
pub mod payload;
pub mod simulated;
pub mod stack;

// Public API exports
pub use config::AdvertiseConfig;
pub use controller::{
    AdvertisingState, PeripheralController, PeripheralEvent, RequestId, StartOutcome,
};
pub use encoding::encode_bytes;
pub use error::{AdvertiseFailure, FailureKind, PeripheralError, Result};
pub use observer::{AdvertiseObserver, ConnectionObserver, ConnectionState, NativeCallback};
pub use payload::{
    AdvertiseMode, AdvertisePayload, AdvertisePayloadBuilder, AdvertiseSettings, GattService,
    ServiceType, MAX_ADVERTISEMENT_LEN,
};
pub use simulated::{SimulatedStack, StackCall, StartResponse};
pub use stack::NativeBluetoothStack;
