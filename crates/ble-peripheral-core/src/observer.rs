//! Callback observers handed to the native stack
//!
//! The native stack reports results later, on a thread or task it controls.
//! Observers turn those callbacks into [`NativeCallback`] messages on a channel
//! drained by the controller, so no callback ever touches controller state.

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::debug;

use crate::controller::RequestId;

/// Connection state reported by the GATT server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Disconnecting,
}

impl ConnectionState {
    /// Decode the native profile state value
    pub fn from_native(state: i32) -> Option<Self> {
        match state {
            0 => Some(Self::Disconnected),
            1 => Some(Self::Connecting),
            2 => Some(Self::Connected),
            3 => Some(Self::Disconnecting),
            _ => None,
        }
    }
}

/// A callback delivered by the native stack
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NativeCallback {
    StartSuccess {
        request: RequestId,
    },
    StartFailure {
        request: RequestId,
        code: i32,
    },
    ConnectionStateChanged {
        device_id: String,
        status: i32,
        new_state: ConnectionState,
    },
}

pub(crate) type CallbackSender = mpsc::UnboundedSender<NativeCallback>;

/// Result observer for one advertising start request
#[derive(Debug, Clone)]
pub struct AdvertiseObserver {
    request: RequestId,
    tx: CallbackSender,
}

impl AdvertiseObserver {
    pub(crate) fn new(request: RequestId, tx: CallbackSender) -> Self {
        Self { request, tx }
    }

    /// The request this observer answers
    pub fn request(&self) -> RequestId {
        self.request
    }

    pub fn on_start_success(&self) {
        self.send(NativeCallback::StartSuccess {
            request: self.request,
        });
    }

    pub fn on_start_failure(&self, code: i32) {
        self.send(NativeCallback::StartFailure {
            request: self.request,
            code,
        });
    }

    fn send(&self, callback: NativeCallback) {
        // The controller is gone; nobody is left to care
        if self.tx.send(callback).is_err() {
            debug!("Dropping advertise callback for {}: controller closed", self.request);
        }
    }
}

/// Connection-state observer registered with the GATT server
#[derive(Debug, Clone)]
pub struct ConnectionObserver {
    tx: CallbackSender,
}

impl ConnectionObserver {
    pub(crate) fn new(tx: CallbackSender) -> Self {
        Self { tx }
    }

    pub fn on_connection_state_changed(
        &self,
        device_id: impl Into<String>,
        status: i32,
        new_state: ConnectionState,
    ) {
        let callback = NativeCallback::ConnectionStateChanged {
            device_id: device_id.into(),
            status,
            new_state,
        };
        if self.tx.send(callback).is_err() {
            debug!("Dropping connection callback: controller closed");
        }
    }
}
