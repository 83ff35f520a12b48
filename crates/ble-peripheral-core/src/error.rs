//! Error types for the peripheral controller

use thiserror::Error;

// ----------------------------------------------------------------------------
// Error Types
// ----------------------------------------------------------------------------

/// Errors surfaced by the peripheral controller and native stacks
#[derive(Error, Debug)]
pub enum PeripheralError {
    #[error("BLE advertising unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("Advertising failed to start: {status} ({code})")]
    TransientStart { status: &'static str, code: i32 },

    #[error("Advertisement payload exceeds {max} bytes ({code})", max = crate::payload::MAX_ADVERTISEMENT_LEN)]
    PayloadTooLarge { code: i32 },

    #[error("Unknown advertising failure code: {code}")]
    Unknown { code: i32 },

    #[error("Invalid UUID '{value}': {source}")]
    InvalidUuid {
        value: String,
        #[source]
        source: uuid::Error,
    },

    #[error("Byte value {value} at index {index} is outside 0..=255")]
    ByteOutOfRange { index: usize, value: i32 },

    #[error("Peripheral controller is not initialized")]
    NotInitialized,

    #[error("No advertising start request is pending")]
    NoPendingRequest,

    #[error("Native stack error: {0}")]
    Native(String),
}

impl PeripheralError {
    /// Whether the caller may retry the same request unchanged
    pub fn is_retryable(&self) -> bool {
        matches!(self, PeripheralError::TransientStart { .. })
    }
}

/// Result type for peripheral operations
pub type Result<T> = std::result::Result<T, PeripheralError>;

// ----------------------------------------------------------------------------
// Native Failure Codes
// ----------------------------------------------------------------------------

/// How a native start failure should be treated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Not an error; advertising is already running
    Benign,
    /// The platform can never advertise
    Permanent,
    /// The native stack may succeed if asked again later
    Transient,
    /// The configuration must change before retrying
    CallerError,
    /// Code not documented by the native stack
    Unknown,
}

/// A failure code reported by the native stack's start callback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvertiseFailure {
    DataTooLarge,
    TooManyAdvertisers,
    AlreadyStarted,
    InternalError,
    FeatureUnsupported,
    Unknown(i32),
}

impl AdvertiseFailure {
    pub const DATA_TOO_LARGE: i32 = 1;
    pub const TOO_MANY_ADVERTISERS: i32 = 2;
    pub const ALREADY_STARTED: i32 = 3;
    pub const INTERNAL_ERROR: i32 = 4;
    pub const FEATURE_UNSUPPORTED: i32 = 5;

    /// Decode a raw native failure code
    pub fn from_code(code: i32) -> Self {
        match code {
            Self::DATA_TOO_LARGE => Self::DataTooLarge,
            Self::TOO_MANY_ADVERTISERS => Self::TooManyAdvertisers,
            Self::ALREADY_STARTED => Self::AlreadyStarted,
            Self::INTERNAL_ERROR => Self::InternalError,
            Self::FEATURE_UNSUPPORTED => Self::FeatureUnsupported,
            other => Self::Unknown(other),
        }
    }

    /// The raw native code
    pub fn code(&self) -> i32 {
        match self {
            Self::DataTooLarge => Self::DATA_TOO_LARGE,
            Self::TooManyAdvertisers => Self::TOO_MANY_ADVERTISERS,
            Self::AlreadyStarted => Self::ALREADY_STARTED,
            Self::InternalError => Self::INTERNAL_ERROR,
            Self::FeatureUnsupported => Self::FEATURE_UNSUPPORTED,
            Self::Unknown(code) => *code,
        }
    }

    /// Status text reported alongside the code
    pub fn status_text(&self) -> &'static str {
        match self {
            Self::DataTooLarge => "ADVERTISE_FAILED_DATA_TOO_LARGE",
            Self::TooManyAdvertisers => "ADVERTISE_FAILED_TOO_MANY_ADVERTISERS",
            Self::AlreadyStarted => "ADVERTISE_FAILED_ALREADY_STARTED",
            Self::InternalError => "ADVERTISE_FAILED_INTERNAL_ERROR",
            Self::FeatureUnsupported => "ADVERTISE_FAILED_FEATURE_UNSUPPORTED",
            Self::Unknown(_) => "UNDOCUMENTED",
        }
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            Self::AlreadyStarted => FailureKind::Benign,
            Self::FeatureUnsupported => FailureKind::Permanent,
            Self::InternalError | Self::TooManyAdvertisers => FailureKind::Transient,
            Self::DataTooLarge => FailureKind::CallerError,
            Self::Unknown(_) => FailureKind::Unknown,
        }
    }

    /// Map the failure onto the error taxonomy, `None` for the benign code
    pub fn into_error(self) -> Option<PeripheralError> {
        let code = self.code();
        match self.kind() {
            FailureKind::Benign => None,
            FailureKind::Permanent => Some(PeripheralError::Unavailable {
                reason: format!("{} ({})", self.status_text(), code),
            }),
            FailureKind::Transient => Some(PeripheralError::TransientStart {
                status: self.status_text(),
                code,
            }),
            FailureKind::CallerError => Some(PeripheralError::PayloadTooLarge { code }),
            FailureKind::Unknown => Some(PeripheralError::Unknown { code }),
        }
    }
}

impl std::fmt::Display for AdvertiseFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} - {}", self.code(), self.status_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_code_mapping() {
        for code in 1..=5 {
            assert_eq!(AdvertiseFailure::from_code(code).code(), code);
        }
        assert_eq!(AdvertiseFailure::from_code(42), AdvertiseFailure::Unknown(42));
        assert_eq!(AdvertiseFailure::from_code(42).status_text(), "UNDOCUMENTED");
    }

    #[test]
    fn test_failure_taxonomy() {
        assert!(AdvertiseFailure::AlreadyStarted.into_error().is_none());

        assert!(matches!(
            AdvertiseFailure::FeatureUnsupported.into_error(),
            Some(PeripheralError::Unavailable { .. })
        ));
        assert!(matches!(
            AdvertiseFailure::DataTooLarge.into_error(),
            Some(PeripheralError::PayloadTooLarge { code: 1 })
        ));
        assert!(matches!(
            AdvertiseFailure::Unknown(-7).into_error(),
            Some(PeripheralError::Unknown { code: -7 })
        ));

        let transient = AdvertiseFailure::TooManyAdvertisers.into_error().unwrap();
        assert!(transient.is_retryable());
        assert!(!AdvertiseFailure::DataTooLarge
            .into_error()
            .unwrap()
            .is_retryable());
    }

    #[test]
    fn test_failure_display() {
        assert_eq!(
            AdvertiseFailure::InternalError.to_string(),
            "4 - ADVERTISE_FAILED_INTERNAL_ERROR"
        );
    }
}
