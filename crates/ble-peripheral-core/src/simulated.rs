//! In-memory native stack
//!
//! Records every call it receives and answers start requests from a script,
//! so controller behavior can be exercised without a radio. Clones share the
//! same state, which lets a test keep a handle after moving the stack into a
//! controller.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::debug;

use crate::controller::RequestId;
use crate::error::{AdvertiseFailure, PeripheralError, Result};
use crate::observer::{AdvertiseObserver, ConnectionObserver, ConnectionState};
use crate::payload::{AdvertisePayload, AdvertiseSettings, GattService, MAX_ADVERTISEMENT_LEN};
use crate::stack::NativeBluetoothStack;

const DEFAULT_DEVICE_NAME: &str = "simulated-peripheral";

/// How the simulated stack answers the next start request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartResponse {
    Success,
    Failure(i32),
    /// Hold the observer until [`SimulatedStack::complete_deferred`]
    Deferred,
}

/// A call received by the simulated stack
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StackCall {
    AcquireAdvertiser,
    OpenGattServer,
    AddService(GattService),
    ClearServices,
    StartAdvertising {
        request: RequestId,
        settings: AdvertiseSettings,
        payload: AdvertisePayload,
    },
    StopAdvertising,
}

#[derive(Debug)]
struct SimulatedState {
    available: bool,
    device_name: String,
    calls: Vec<StackCall>,
    services: Vec<GattService>,
    responses: VecDeque<StartResponse>,
    advertising: bool,
    deferred: VecDeque<AdvertiseObserver>,
    connection_observer: Option<ConnectionObserver>,
}

/// Opaque advertiser handle of the simulated stack
#[derive(Debug)]
pub struct SimulatedAdvertiser(());

/// Opaque GATT server handle of the simulated stack
#[derive(Debug)]
pub struct SimulatedGattServer(());

#[derive(Debug, Clone)]
pub struct SimulatedStack {
    state: Arc<Mutex<SimulatedState>>,
}

impl SimulatedStack {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(SimulatedState {
                available: true,
                device_name: DEFAULT_DEVICE_NAME.to_string(),
                calls: Vec::new(),
                services: Vec::new(),
                responses: VecDeque::new(),
                advertising: false,
                deferred: VecDeque::new(),
                connection_observer: None,
            })),
        }
    }

    /// A stack whose adapter is missing
    pub fn unavailable() -> Self {
        let stack = Self::new();
        stack.set_available(false);
        stack
    }

    pub fn set_available(&self, available: bool) {
        self.lock().available = available;
    }

    /// Name used when a payload asks to include the device name
    pub fn set_device_name(&self, name: impl Into<String>) {
        self.lock().device_name = name.into();
    }

    /// Queue the answer for a future start request; unscripted starts succeed
    pub fn push_start_response(&self, response: StartResponse) {
        self.lock().responses.push_back(response);
    }

    pub fn calls(&self) -> Vec<StackCall> {
        self.lock().calls.clone()
    }

    /// Services currently registered on the GATT server
    pub fn services(&self) -> Vec<GattService> {
        self.lock().services.clone()
    }

    pub fn is_advertising(&self) -> bool {
        self.lock().advertising
    }

    pub fn deferred_count(&self) -> usize {
        self.lock().deferred.len()
    }

    /// Answer the oldest deferred start request
    ///
    /// Returns `false` when nothing was deferred.
    pub fn complete_deferred(&self, response: StartResponse) -> bool {
        let mut state = self.lock();
        let Some(observer) = state.deferred.pop_front() else {
            return false;
        };
        match response {
            StartResponse::Success => {
                state.advertising = true;
                observer.on_start_success();
            }
            StartResponse::Failure(code) => observer.on_start_failure(code),
            StartResponse::Deferred => state.deferred.push_front(observer),
        }
        true
    }

    /// Report a connection change from a remote central
    pub fn simulate_connection(&self, device_id: &str, new_state: ConnectionState) -> bool {
        match &self.lock().connection_observer {
            Some(observer) => {
                observer.on_connection_state_changed(device_id, 0, new_state);
                true
            }
            None => false,
        }
    }

    fn lock(&self) -> MutexGuard<'_, SimulatedState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for SimulatedStack {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl NativeBluetoothStack for SimulatedStack {
    type Advertiser = SimulatedAdvertiser;
    type GattServer = SimulatedGattServer;

    async fn acquire_advertiser(&mut self) -> Result<SimulatedAdvertiser> {
        let mut state = self.lock();
        state.calls.push(StackCall::AcquireAdvertiser);
        if !state.available {
            return Err(PeripheralError::Unavailable {
                reason: "simulated adapter disabled".into(),
            });
        }
        Ok(SimulatedAdvertiser(()))
    }

    async fn open_gatt_server(&mut self, observer: ConnectionObserver) -> Result<SimulatedGattServer> {
        let mut state = self.lock();
        state.calls.push(StackCall::OpenGattServer);
        if !state.available {
            return Err(PeripheralError::Unavailable {
                reason: "simulated adapter disabled".into(),
            });
        }
        state.connection_observer = Some(observer);
        Ok(SimulatedGattServer(()))
    }

    async fn add_service(
        &mut self,
        _server: &mut SimulatedGattServer,
        service: GattService,
    ) -> Result<()> {
        let mut state = self.lock();
        state.calls.push(StackCall::AddService(service.clone()));
        state.services.push(service);
        Ok(())
    }

    async fn clear_services(&mut self, _server: &mut SimulatedGattServer) -> Result<()> {
        let mut state = self.lock();
        state.calls.push(StackCall::ClearServices);
        state.services.clear();
        Ok(())
    }

    async fn start_advertising(
        &mut self,
        _advertiser: &mut SimulatedAdvertiser,
        settings: &AdvertiseSettings,
        payload: &AdvertisePayload,
        observer: AdvertiseObserver,
    ) {
        let mut state = self.lock();
        state.calls.push(StackCall::StartAdvertising {
            request: observer.request(),
            settings: settings.clone(),
            payload: payload.clone(),
        });

        let scripted = state.responses.pop_front().unwrap_or(StartResponse::Success);
        let response = if state.advertising {
            StartResponse::Failure(AdvertiseFailure::ALREADY_STARTED)
        } else if scripted == StartResponse::Success
            && payload.estimated_len(&state.device_name) > MAX_ADVERTISEMENT_LEN
        {
            StartResponse::Failure(AdvertiseFailure::DATA_TOO_LARGE)
        } else {
            scripted
        };
        debug!("Simulated start for {} answered with {:?}", observer.request(), response);

        match response {
            StartResponse::Success => {
                state.advertising = true;
                observer.on_start_success();
            }
            StartResponse::Failure(code) => observer.on_start_failure(code),
            StartResponse::Deferred => state.deferred.push_back(observer),
        }
    }

    async fn stop_advertising(&mut self, _advertiser: &mut SimulatedAdvertiser) {
        let mut state = self.lock();
        state.calls.push(StackCall::StopAdvertising);
        state.advertising = false;
    }
}
