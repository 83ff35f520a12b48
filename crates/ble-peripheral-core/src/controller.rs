//! Peripheral controller and advertising lifecycle

use serde::Serialize;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};

use crate::config::AdvertiseConfig;
use crate::error::{AdvertiseFailure, PeripheralError, Result};
use crate::observer::{
    AdvertiseObserver, CallbackSender, ConnectionObserver, ConnectionState, NativeCallback,
};
use crate::payload::{AdvertisePayload, AdvertiseSettings, GattService};
use crate::stack::NativeBluetoothStack;

const EVENT_BUFFER_SIZE: usize = 64;

// ----------------------------------------------------------------------------
// Lifecycle Types
// ----------------------------------------------------------------------------

/// Token identifying one advertising start request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct RequestId(pub(crate) u64);

impl RequestId {
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "request #{}", self.0)
    }
}

/// Advertising lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AdvertisingState {
    Idle,
    Starting,
    Advertising,
    StartFailed,
}

/// Successful resolution of a start request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StartOutcome {
    Started,
    /// The native stack reported advertising was already running
    AlreadyStarted,
}

type StartResult = std::result::Result<StartOutcome, AdvertiseFailure>;

/// Status events published to subscribers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeripheralEvent {
    AdvertisingStarted {
        request: RequestId,
        outcome: StartOutcome,
    },
    AdvertisingFailed {
        request: RequestId,
        failure: AdvertiseFailure,
    },
    AdvertisingStopped,
    ConnectionStateChanged {
        device_id: String,
        status: i32,
        new_state: ConnectionState,
    },
}

struct NativeHandles<S: NativeBluetoothStack> {
    advertiser: S::Advertiser,
    gatt_server: S::GattServer,
}

// ----------------------------------------------------------------------------
// Peripheral Controller
// ----------------------------------------------------------------------------

/// Owns an advertising session and its co-located GATT server registration
///
/// All methods take `&mut self`; the controller is meant to be driven from a
/// single control task. Native callbacks are queued on a channel and applied
/// by [`process_callbacks`](Self::process_callbacks),
/// [`next_callback`](Self::next_callback) or [`await_start`](Self::await_start).
///
/// The callback queue is unbounded. Connection changes keep arriving while
/// the GATT server is open, so the owner must keep draining it, typically by
/// looping on `next_callback` alongside its other work.
pub struct PeripheralController<S: NativeBluetoothStack> {
    stack: S,
    handles: Option<NativeHandles<S>>,
    is_advertising: bool,
    state: AdvertisingState,
    next_request: u64,
    pending: Option<RequestId>,
    last_outcome: Option<(RequestId, StartResult)>,
    callback_tx: CallbackSender,
    callback_rx: mpsc::UnboundedReceiver<NativeCallback>,
    events: broadcast::Sender<PeripheralEvent>,
}

impl<S: NativeBluetoothStack> PeripheralController<S> {
    /// Create a controller; no native calls are made until [`initialize`](Self::initialize)
    pub fn new(stack: S) -> Self {
        let (callback_tx, callback_rx) = mpsc::unbounded_channel();
        let (events, _) = broadcast::channel(EVENT_BUFFER_SIZE);
        Self {
            stack,
            handles: None,
            is_advertising: false,
            state: AdvertisingState::Idle,
            next_request: 0,
            pending: None,
            last_outcome: None,
            callback_tx,
            callback_rx,
            events,
        }
    }

    /// Acquire the advertiser and GATT server handles
    ///
    /// Only the first successful call talks to the native stack.
    pub async fn initialize(&mut self) -> Result<()> {
        if self.handles.is_some() {
            return Ok(());
        }

        let advertiser = self.stack.acquire_advertiser().await?;
        let observer = ConnectionObserver::new(self.callback_tx.clone());
        let gatt_server = self.stack.open_gatt_server(observer).await?;

        self.handles = Some(NativeHandles {
            advertiser,
            gatt_server,
        });
        info!("Peripheral controller initialized");
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.handles.is_some()
    }

    /// Register the configured service and request advertising
    ///
    /// Returns once the request has been handed to the native stack; the
    /// outcome is delivered later as a native callback.
    pub async fn start(&mut self, config: &AdvertiseConfig) -> Result<RequestId> {
        let handles = self
            .handles
            .as_mut()
            .ok_or(PeripheralError::NotInitialized)?;

        let settings = AdvertiseSettings::default();
        let payload = AdvertisePayload::from_config(config)?;
        let service = GattService::primary(config.uuid);

        if config.clears_services() {
            self.stack.clear_services(&mut handles.gatt_server).await?;
        }
        self.stack.add_service(&mut handles.gatt_server, service).await?;

        self.next_request += 1;
        let request = RequestId(self.next_request);
        self.pending = Some(request);
        self.last_outcome = None;
        self.state = AdvertisingState::Starting;

        debug!(%request, service = %config.uuid, "Requesting LE advertising");
        let observer = AdvertiseObserver::new(request, self.callback_tx.clone());
        self.stack
            .start_advertising(&mut handles.advertiser, &settings, &payload, observer)
            .await;

        Ok(request)
    }

    /// Stop advertising and clear all registered services
    ///
    /// Leaves the controller idle even when clearing services fails; any
    /// start still in flight is forgotten.
    pub async fn stop(&mut self) -> Result<()> {
        let handles = self
            .handles
            .as_mut()
            .ok_or(PeripheralError::NotInitialized)?;

        self.stack.stop_advertising(&mut handles.advertiser).await;
        let cleared = self.stack.clear_services(&mut handles.gatt_server).await;

        let previous = self.state;
        self.is_advertising = false;
        self.state = AdvertisingState::Idle;
        self.pending = None;
        self.last_outcome = None;

        if previous != AdvertisingState::Idle {
            info!("LE advertising stopped");
            self.publish(PeripheralEvent::AdvertisingStopped);
        }
        cleared
    }

    pub fn is_advertising(&self) -> bool {
        self.is_advertising
    }

    pub fn state(&self) -> AdvertisingState {
        self.state
    }

    /// The start request still waiting for a native answer
    pub fn pending_request(&self) -> Option<RequestId> {
        self.pending
    }

    /// Subscribe to status events
    pub fn subscribe(&self) -> broadcast::Receiver<PeripheralEvent> {
        self.events.subscribe()
    }

    pub fn stack(&self) -> &S {
        &self.stack
    }

    /// Apply every callback already delivered, without waiting
    pub fn process_callbacks(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(callback) = self.callback_rx.try_recv() {
            self.apply(callback);
            applied += 1;
        }
        applied
    }

    /// Wait for the next native callback and apply it
    pub async fn next_callback(&mut self) -> Option<NativeCallback> {
        let callback = self.callback_rx.recv().await?;
        self.apply(callback.clone());
        Some(callback)
    }

    /// Wait until the latest start request resolves
    ///
    /// Callers wanting a deadline should wrap this in `tokio::time::timeout`.
    pub async fn await_start(&mut self) -> Result<StartOutcome> {
        let Some(request) = self.pending else {
            return match self.last_outcome {
                Some((_, result)) => start_result_to_error(result),
                None => Err(PeripheralError::NoPendingRequest),
            };
        };

        loop {
            let callback = self
                .callback_rx
                .recv()
                .await
                .ok_or_else(|| PeripheralError::Native("callback channel closed".into()))?;
            if let Some((resolved, result)) = self.apply(callback) {
                if resolved == request {
                    return start_result_to_error(result);
                }
            }
        }
    }

    // ------------------------------------------------------------------------
    // Callback Handling
    // ------------------------------------------------------------------------

    fn apply(&mut self, callback: NativeCallback) -> Option<(RequestId, StartResult)> {
        match callback {
            NativeCallback::StartSuccess { request } => {
                if !self.take_pending(request) {
                    return None;
                }
                info!("LE advertising started ({})", request);
                Some(self.resolve(request, Ok(StartOutcome::Started)))
            }
            NativeCallback::StartFailure { request, code } => {
                if !self.take_pending(request) {
                    return None;
                }
                let failure = AdvertiseFailure::from_code(code);
                if failure == AdvertiseFailure::AlreadyStarted {
                    warn!("LE advertising already active ({}): {}", request, failure);
                    Some(self.resolve(request, Ok(StartOutcome::AlreadyStarted)))
                } else {
                    error!("Error while starting advertising ({}): {}", request, failure);
                    Some(self.resolve(request, Err(failure)))
                }
            }
            NativeCallback::ConnectionStateChanged {
                device_id,
                status,
                new_state,
            } => {
                info!(
                    "GATT server connection changed: {} is {:?} (status {})",
                    device_id, new_state, status
                );
                self.publish(PeripheralEvent::ConnectionStateChanged {
                    device_id,
                    status,
                    new_state,
                });
                None
            }
        }
    }

    fn take_pending(&mut self, request: RequestId) -> bool {
        if self.pending == Some(request) {
            self.pending = None;
            true
        } else {
            debug!("Ignoring stale advertise callback for {}", request);
            false
        }
    }

    fn resolve(&mut self, request: RequestId, result: StartResult) -> (RequestId, StartResult) {
        match result {
            Ok(outcome) => {
                self.is_advertising = true;
                self.state = AdvertisingState::Advertising;
                self.publish(PeripheralEvent::AdvertisingStarted { request, outcome });
            }
            Err(failure) => {
                self.is_advertising = false;
                self.state = AdvertisingState::StartFailed;
                self.publish(PeripheralEvent::AdvertisingFailed { request, failure });
            }
        }
        self.last_outcome = Some((request, result));
        (request, result)
    }

    fn publish(&self, event: PeripheralEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }
}

fn start_result_to_error(result: StartResult) -> Result<StartOutcome> {
    result.map_err(|failure| {
        failure
            .into_error()
            .unwrap_or(PeripheralError::Unknown {
                code: failure.code(),
            })
    })
}
