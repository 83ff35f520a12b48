//! Native Bluetooth stacks for the BLE peripheral controller
//!
//! This crate provides implementations of
//! [`NativeBluetoothStack`](ble_peripheral_core::NativeBluetoothStack) backed by the
//! operating system, and picks the right one for the current target.
//!
//! ## Platform Support
//!
//! - **Linux**: BlueZ via the `bluer` crate; LE advertisement registration and a
//!   GATT application holding the registered primary services
//! - **Other platforms**: no peripheral support; initialization fails with
//!   `PeripheralError::Unavailable`
//!
//! ## Usage
//!
//! ```rust,no_run
//! use ble_peripheral::create_platform_controller;
//! use ble_peripheral_core::AdvertiseConfig;
//!
//! # async fn example() -> ble_peripheral_core::Result<()> {
//! let mut controller = create_platform_controller();
//! controller.initialize().await?;
//!
//! let config = AdvertiseConfig::new("0000180d-0000-1000-8000-00805f9b34fb")?;
//! controller.start(&config).await?;
//! controller.await_start().await?;
//! # Ok(())
//! # }
//! ```

pub mod fallback;
#[cfg(target_os = "linux")]
pub mod linux;

use ble_peripheral_core::PeripheralController;

pub use fallback::FallbackStack;
#[cfg(target_os = "linux")]
pub use linux::BluezStack;

// ----------------------------------------------------------------------------
// Platform Detection and Factory
// ----------------------------------------------------------------------------

/// Native stack for the current platform
#[cfg(target_os = "linux")]
pub type PlatformStack = linux::BluezStack;

/// Native stack for the current platform
#[cfg(not(target_os = "linux"))]
pub type PlatformStack = fallback::FallbackStack;

/// Create the native stack for the current platform
pub fn create_platform_stack() -> PlatformStack {
    PlatformStack::new()
}

/// Create a controller driving the current platform's native stack
pub fn create_platform_controller() -> PeripheralController<PlatformStack> {
    PeripheralController::new(create_platform_stack())
}

/// Whether this build has a native peripheral implementation
pub fn platform_supported() -> bool {
    cfg!(target_os = "linux")
}
