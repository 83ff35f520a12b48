//! Fallback stack for platforms without peripheral support

use std::convert::Infallible;

use ble_peripheral_core::{
    AdvertiseObserver, AdvertisePayload, AdvertiseSettings, ConnectionObserver, GattService,
    NativeBluetoothStack, PeripheralError, Result,
};
use tracing::warn;

// ----------------------------------------------------------------------------
// Fallback Implementation
// ----------------------------------------------------------------------------

/// Stack that never yields handles
///
/// Its handle types are uninhabited, so the controller can never get past
/// initialization with it.
#[derive(Debug, Default)]
pub struct FallbackStack;

impl FallbackStack {
    pub fn new() -> Self {
        Self
    }

    fn unavailable(what: &str) -> PeripheralError {
        warn!(
            "BLE peripheral mode not supported on this platform; cannot acquire {}",
            what
        );
        PeripheralError::Unavailable {
            reason: format!("{} not supported on {}", what, std::env::consts::OS),
        }
    }
}

#[async_trait::async_trait]
impl NativeBluetoothStack for FallbackStack {
    type Advertiser = Infallible;
    type GattServer = Infallible;

    async fn acquire_advertiser(&mut self) -> Result<Infallible> {
        Err(Self::unavailable("LE advertiser"))
    }

    async fn open_gatt_server(&mut self, _observer: ConnectionObserver) -> Result<Infallible> {
        Err(Self::unavailable("GATT server"))
    }

    async fn add_service(&mut self, server: &mut Infallible, _service: GattService) -> Result<()> {
        match *server {}
    }

    async fn clear_services(&mut self, server: &mut Infallible) -> Result<()> {
        match *server {}
    }

    async fn start_advertising(
        &mut self,
        advertiser: &mut Infallible,
        _settings: &AdvertiseSettings,
        _payload: &AdvertisePayload,
        _observer: AdvertiseObserver,
    ) {
        match *advertiser {}
    }

    async fn stop_advertising(&mut self, advertiser: &mut Infallible) {
        match *advertiser {}
    }
}
