//! The native Bluetooth stack abstraction

use crate::error::Result;
use crate::observer::{AdvertiseObserver, ConnectionObserver};
use crate::payload::{AdvertisePayload, AdvertiseSettings, GattService};

// ----------------------------------------------------------------------------
// Native Stack Trait
// ----------------------------------------------------------------------------

/// Operations a platform Bluetooth stack must offer for peripheral advertising
///
/// Handles are opaque to the controller, which owns them exclusively once
/// acquired. Start results are reported through the [`AdvertiseObserver`],
/// possibly after `start_advertising` has returned.
#[async_trait::async_trait]
pub trait NativeBluetoothStack: Send {
    /// Advertiser handle
    type Advertiser: Send;
    /// GATT server handle
    type GattServer: Send;

    /// Obtain the LE advertiser, `Unavailable` without adapter or support
    async fn acquire_advertiser(&mut self) -> Result<Self::Advertiser>;

    /// Open the GATT server, reporting connection changes to `observer`
    async fn open_gatt_server(&mut self, observer: ConnectionObserver) -> Result<Self::GattServer>;

    async fn add_service(&mut self, server: &mut Self::GattServer, service: GattService)
        -> Result<()>;

    async fn clear_services(&mut self, server: &mut Self::GattServer) -> Result<()>;

    /// Request advertising; the outcome arrives through `observer`
    async fn start_advertising(
        &mut self,
        advertiser: &mut Self::Advertiser,
        settings: &AdvertiseSettings,
        payload: &AdvertisePayload,
        observer: AdvertiseObserver,
    );

    async fn stop_advertising(&mut self, advertiser: &mut Self::Advertiser);
}
