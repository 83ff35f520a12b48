//! Linux native stack using bluer (BlueZ)

use std::collections::{BTreeSet, HashMap};
use std::future::Future;

use ble_peripheral_core::{
    AdvertiseFailure, AdvertiseObserver, AdvertisePayload, AdvertiseSettings, ConnectionObserver,
    ConnectionState, GattService, NativeBluetoothStack, PeripheralError, Result,
};
use bluer::adv::{Advertisement, AdvertisementHandle, Feature, Type};
use bluer::gatt::local::{Application, ApplicationHandle, Service};
use bluer::{
    Adapter, AdapterEvent, Address, Device, DeviceEvent, DeviceProperty, ErrorKind, Session,
};
use futures::{pin_mut, StreamExt};
use tokio::task::{AbortHandle, JoinHandle, JoinSet};
use tracing::{debug, info, warn};

// ----------------------------------------------------------------------------
// Handles
// ----------------------------------------------------------------------------

/// LE advertiser bound to a BlueZ adapter
pub struct BluezAdvertiser {
    adapter: Adapter,
    advertisement: Option<AdvertisementHandle>,
}

/// GATT server bound to a BlueZ adapter
///
/// BlueZ applications cannot change once registered, so every service change
/// re-registers one application holding all services.
pub struct BluezGattServer {
    adapter: Adapter,
    services: Vec<GattService>,
    application: Option<ApplicationHandle>,
    connection_watcher: JoinHandle<()>,
}

impl BluezGattServer {
    async fn add(&mut self, service: GattService) -> Result<()> {
        let adapter = self.adapter.clone();
        register_services(
            &mut self.services,
            service,
            &mut self.application,
            |services| {
                let adapter = adapter.clone();
                async move {
                    adapter
                        .serve_gatt_application(application(&services))
                        .await
                        .map_err(|e| {
                            PeripheralError::Native(format!(
                                "Failed to register GATT services: {}",
                                e
                            ))
                        })
                }
            },
        )
        .await
    }
}

impl Drop for BluezGattServer {
    fn drop(&mut self) {
        self.connection_watcher.abort();
    }
}

// ----------------------------------------------------------------------------
// Linux Implementation
// ----------------------------------------------------------------------------

pub struct BluezStack {
    session: Option<Session>,
    adapter: Option<Adapter>,
}

impl BluezStack {
    pub fn new() -> Self {
        Self {
            session: None,
            adapter: None,
        }
    }

    /// The default adapter, powered on; created once and shared by both handles
    async fn adapter(&mut self) -> Result<Adapter> {
        if let Some(adapter) = &self.adapter {
            return Ok(adapter.clone());
        }

        let session = Session::new()
            .await
            .map_err(|e| PeripheralError::Unavailable {
                reason: format!("BlueZ session: {}", e),
            })?;

        let adapter = session
            .default_adapter()
            .await
            .map_err(|e| PeripheralError::Unavailable {
                reason: format!("BLE adapter: {}", e),
            })?;

        // Enable adapter if needed
        if !adapter.is_powered().await.unwrap_or(false) {
            adapter.set_powered(true).await.map_err(|e| {
                PeripheralError::Native(format!("Failed to power on adapter: {}", e))
            })?;
        }

        info!("Linux BLE adapter {} initialized", adapter.name());
        self.session = Some(session);
        self.adapter = Some(adapter.clone());
        Ok(adapter)
    }
}

impl Default for BluezStack {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl NativeBluetoothStack for BluezStack {
    type Advertiser = BluezAdvertiser;
    type GattServer = BluezGattServer;

    async fn acquire_advertiser(&mut self) -> Result<BluezAdvertiser> {
        let adapter = self.adapter().await?;

        // Adapters without LE advertising lack the advertising manager interface
        match adapter.supported_advertising_instances().await {
            Ok(0) => {
                return Err(PeripheralError::Unavailable {
                    reason: format!("adapter {} supports no advertising instances", adapter.name()),
                })
            }
            Ok(instances) => debug!("Adapter supports {} advertising instances", instances),
            Err(e) => {
                return Err(PeripheralError::Unavailable {
                    reason: format!("LE advertising not supported: {}", e),
                })
            }
        }

        Ok(BluezAdvertiser {
            adapter,
            advertisement: None,
        })
    }

    async fn open_gatt_server(&mut self, observer: ConnectionObserver) -> Result<BluezGattServer> {
        let adapter = self.adapter().await?;
        let connection_watcher = tokio::spawn(watch_connections(adapter.clone(), observer));

        Ok(BluezGattServer {
            adapter,
            services: Vec::new(),
            application: None,
            connection_watcher,
        })
    }

    async fn add_service(&mut self, server: &mut BluezGattServer, service: GattService) -> Result<()> {
        server.add(service).await
    }

    async fn clear_services(&mut self, server: &mut BluezGattServer) -> Result<()> {
        if !server.services.is_empty() {
            debug!("Clearing {} GATT service(s)", server.services.len());
        }
        server.services.clear();
        server.application = None;
        Ok(())
    }

    async fn start_advertising(
        &mut self,
        advertiser: &mut BluezAdvertiser,
        settings: &AdvertiseSettings,
        payload: &AdvertisePayload,
        observer: AdvertiseObserver,
    ) {
        if advertiser.advertisement.is_some() {
            observer.on_start_failure(AdvertiseFailure::ALREADY_STARTED);
            return;
        }

        let name = device_name(&advertiser.adapter).await;
        match advertiser
            .adapter
            .advertise(advertisement(settings, payload, name))
            .await
        {
            Ok(handle) => {
                advertiser.advertisement = Some(handle);
                observer.on_start_success();
            }
            Err(e) => {
                warn!("BlueZ rejected advertisement: {}", e);
                observer.on_start_failure(failure_code(&e.kind, &e.message));
            }
        }
    }

    async fn stop_advertising(&mut self, advertiser: &mut BluezAdvertiser) {
        if let Some(handle) = advertiser.advertisement.take() {
            drop(handle); // Dropping the handle stops advertising
            debug!("Removed LE advertisement");
        }
    }
}

// ----------------------------------------------------------------------------
// GATT Registration
// ----------------------------------------------------------------------------

fn application(services: &[GattService]) -> Application {
    Application {
        services: services
            .iter()
            .map(|service| Service {
                uuid: service.uuid,
                primary: service.is_primary(),
                ..Default::default()
            })
            .collect(),
        ..Default::default()
    }
}

/// Register `services` plus `service` as one application
///
/// The previous application is unregistered first. On failure the previous
/// set is registered again; if that fails as well the set is emptied so it
/// matches what BlueZ serves.
async fn register_services<H, F, Fut>(
    services: &mut Vec<GattService>,
    service: GattService,
    application: &mut Option<H>,
    register: F,
) -> Result<()>
where
    F: Fn(Vec<GattService>) -> Fut,
    Fut: Future<Output = Result<H>>,
{
    services.push(service);
    // Dropping the handle unregisters the previous application
    *application = None;

    let error = match register(services.clone()).await {
        Ok(handle) => {
            *application = Some(handle);
            debug!("Registered {} GATT service(s)", services.len());
            return Ok(());
        }
        Err(e) => e,
    };

    services.pop();
    if !services.is_empty() {
        match register(services.clone()).await {
            Ok(handle) => {
                *application = Some(handle);
                warn!("Restored {} GATT service(s) after failed registration", services.len());
            }
            Err(e) => {
                warn!("Lost {} GATT service(s): {}", services.len(), e);
                services.clear();
            }
        }
    }
    Err(error)
}

// ----------------------------------------------------------------------------
// Advertisement
// ----------------------------------------------------------------------------

async fn device_name(adapter: &Adapter) -> String {
    adapter
        .alias()
        .await
        .unwrap_or_else(|_| adapter.name().to_string())
}

/// BlueZ advertisement for a payload; `name` is only advertised when requested
fn advertisement(
    settings: &AdvertiseSettings,
    payload: &AdvertisePayload,
    name: String,
) -> Advertisement {
    let mut system_includes = BTreeSet::new();
    if payload.include_tx_power_level == Some(true) {
        system_includes.insert(Feature::TxPower);
    }

    Advertisement {
        advertisement_type: if settings.connectable {
            Type::Peripheral
        } else {
            Type::Broadcast
        },
        service_uuids: payload.service_uuids.iter().copied().collect(),
        service_data: payload.service_data.clone(),
        manufacturer_data: payload.manufacturer_data.clone(),
        system_includes,
        local_name: (payload.include_device_name == Some(true)).then_some(name),
        discoverable: Some(true),
        timeout: (!settings.is_indefinite()).then_some(settings.timeout),
        ..Default::default()
    }
}

/// Map a BlueZ advertising error onto a native failure code
fn failure_code(kind: &ErrorKind, message: &str) -> i32 {
    match kind {
        ErrorKind::AlreadyExists => AdvertiseFailure::ALREADY_STARTED,
        ErrorKind::InvalidLength => AdvertiseFailure::DATA_TOO_LARGE,
        ErrorKind::NotSupported => AdvertiseFailure::FEATURE_UNSUPPORTED,
        ErrorKind::Failed if message.contains("Maximum advertisements") => {
            AdvertiseFailure::TOO_MANY_ADVERTISERS
        }
        _ => AdvertiseFailure::INTERNAL_ERROR,
    }
}

// ----------------------------------------------------------------------------
// Connection Watching
// ----------------------------------------------------------------------------

/// Connection watchers, at most one per device address
struct DeviceWatchers {
    tasks: JoinSet<()>,
    watched: HashMap<Address, AbortHandle>,
}

impl DeviceWatchers {
    fn new() -> Self {
        Self {
            tasks: JoinSet::new(),
            watched: HashMap::new(),
        }
    }

    /// Spawn `watcher` unless `address` is already watched
    fn watch<F>(&mut self, address: Address, watcher: F) -> bool
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if self.watched.contains_key(&address) {
            return false;
        }
        let handle = self.tasks.spawn(watcher);
        self.watched.insert(address, handle);
        true
    }

    fn forget(&mut self, address: &Address) {
        if let Some(handle) = self.watched.remove(address) {
            handle.abort();
        }
    }
}

fn watch_address(
    adapter: &Adapter,
    watchers: &mut DeviceWatchers,
    address: Address,
    observer: &ConnectionObserver,
) {
    match adapter.device(address) {
        Ok(device) => {
            if watchers.watch(address, watch_device(device, observer.clone())) {
                debug!("Watching connection state of {}", address);
            }
        }
        Err(e) => debug!("Ignoring device {}: {}", address, e),
    }
}

/// Report connection changes of known and newly appearing devices
async fn watch_connections(adapter: Adapter, observer: ConnectionObserver) {
    let events = match adapter.events().await {
        Ok(events) => events,
        Err(e) => {
            warn!("Cannot watch adapter events, connection changes unreported: {}", e);
            return;
        }
    };
    pin_mut!(events);

    // Dropped with this task, taking the device watchers along
    let mut watchers = DeviceWatchers::new();

    // Devices BlueZ already knows, such as bonded phones, raise no DeviceAdded
    match adapter.device_addresses().await {
        Ok(addresses) => {
            for address in addresses {
                watch_address(&adapter, &mut watchers, address, &observer);
            }
        }
        Err(e) => warn!("Cannot list known devices: {}", e),
    }

    loop {
        tokio::select! {
            event = events.next() => match event {
                Some(AdapterEvent::DeviceAdded(address)) => {
                    watch_address(&adapter, &mut watchers, address, &observer);
                }
                Some(AdapterEvent::DeviceRemoved(address)) => watchers.forget(&address),
                Some(_) => {}
                None => break,
            },
            Some(_) = watchers.tasks.join_next(), if !watchers.tasks.is_empty() => {}
        }
    }
}

async fn watch_device(device: Device, observer: ConnectionObserver) {
    let events = match device.events().await {
        Ok(events) => events,
        Err(e) => {
            debug!("Cannot watch device {}: {}", device.address(), e);
            return;
        }
    };
    pin_mut!(events);

    while let Some(event) = events.next().await {
        if let DeviceEvent::PropertyChanged(DeviceProperty::Connected(connected)) = event {
            let state = if connected {
                ConnectionState::Connected
            } else {
                ConnectionState::Disconnected
            };
            observer.on_connection_state_changed(device.address().to_string(), 0, state);
        }
    }
}
