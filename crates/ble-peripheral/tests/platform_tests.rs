//! Platform stack selection tests
//!
//! These never touch a real adapter; BlueZ-backed behavior needs hardware and
//! is exercised manually through the CLI.

use ble_peripheral::{platform_supported, FallbackStack};
use ble_peripheral_core::{AdvertiseConfig, PeripheralController, PeripheralError};

#[test]
fn test_platform_support_flag() {
    assert_eq!(platform_supported(), cfg!(target_os = "linux"));
}

#[test]
fn test_fallback_initialize_fails_every_time() {
    let mut controller = PeripheralController::new(FallbackStack::new());

    for _ in 0..2 {
        let err = tokio_test::block_on(controller.initialize()).unwrap_err();
        assert!(matches!(err, PeripheralError::Unavailable { .. }));
        assert!(!controller.is_initialized());
    }
}

#[test]
fn test_fallback_stop_requires_initialize() {
    let mut controller = PeripheralController::new(FallbackStack::new());
    let config = AdvertiseConfig::new("0000180f-0000-1000-8000-00805f9b34fb").unwrap();

    assert!(matches!(
        tokio_test::block_on(controller.start(&config)),
        Err(PeripheralError::NotInitialized)
    ));
    assert!(matches!(
        tokio_test::block_on(controller.stop()),
        Err(PeripheralError::NotInitialized)
    ));
}

#[cfg(not(target_os = "linux"))]
#[test]
fn test_platform_controller_is_unavailable() {
    let mut controller = ble_peripheral::create_platform_controller();
    assert!(tokio_test::block_on(controller.initialize()).is_err());
}
