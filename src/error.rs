//! Error taxonomy for the broadcast core
//!
//! Every failure the core can report falls into one of a handful of
//! categories. Boundary errors (malformed payloads, invalid coordinates,
//! refused subscriptions) are surfaced to the caller; delivery failures are
//! recovered inside the hub and never leave it.

use thiserror::Error;

/// Rejection of a device id or coordinate pair
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    /// The device id was empty or only whitespace
    #[error("device_id must not be empty")]
    EmptyDeviceId,

    /// Latitude outside [-90, 90] or not finite
    #[error("latitude {0} is outside the range [-90, 90]")]
    LatitudeOutOfRange(f64),

    /// Longitude outside [-180, 180] or not finite
    #[error("longitude {0} is outside the range [-180, 180]")]
    LongitudeOutOfRange(f64),
}

/// Failure of a single ingestion call
#[derive(Debug, Clone, PartialEq, Error)]
pub enum IngestError {
    /// Payload was not JSON, or `device_id`/`lat`/`lng` were missing or mistyped
    #[error("malformed request: {0}")]
    MalformedRequest(String),

    /// Payload parsed but the values were rejected
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// Failure to set up a new subscriber
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HubError {
    /// The configured subscriber limit has been reached
    #[error("subscriber limit of {limit} reached")]
    SubscriberLimit { limit: usize },

    /// The snapshot could not be queued for the new subscriber
    #[error("failed to replay current locations to new subscriber")]
    ReplayFailed,
}

/// Categorized error kinds, used for reporting at the HTTP boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Missing or wrong-typed ingestion fields
    MalformedRequest,

    /// Out-of-range coordinates or empty device id
    Validation,

    /// A subscriber could not be attached
    SubscriptionSetup,

    /// A subscriber's channel was closed (recovered internally)
    DeliveryFailure,

    /// Unknown device
    NotFound,
}

impl ErrorKind {
    /// Stable snake_case name used in error bodies
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::MalformedRequest => "malformed_request",
            ErrorKind::Validation => "validation_error",
            ErrorKind::SubscriptionSetup => "subscription_setup_failure",
            ErrorKind::DeliveryFailure => "delivery_failure",
            ErrorKind::NotFound => "not_found",
        }
    }

    /// Whether the caller, not the server, is at fault
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ErrorKind::MalformedRequest | ErrorKind::Validation | ErrorKind::NotFound
        )
    }
}

impl IngestError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            IngestError::MalformedRequest(_) => ErrorKind::MalformedRequest,
            IngestError::Validation(_) => ErrorKind::Validation,
        }
    }
}

impl HubError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::SubscriptionSetup
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_categorization() {
        let malformed = IngestError::MalformedRequest("missing field `lat`".to_string());
        assert_eq!(malformed.kind(), ErrorKind::MalformedRequest);

        let invalid = IngestError::from(ValidationError::LatitudeOutOfRange(95.0));
        assert_eq!(invalid.kind(), ErrorKind::Validation);

        let refused = HubError::SubscriberLimit { limit: 4 };
        assert_eq!(refused.kind(), ErrorKind::SubscriptionSetup);
    }

    #[test]
    fn test_client_errors() {
        assert!(ErrorKind::MalformedRequest.is_client_error());
        assert!(ErrorKind::Validation.is_client_error());
        assert!(!ErrorKind::SubscriptionSetup.is_client_error());
        assert!(!ErrorKind::DeliveryFailure.is_client_error());
    }

    #[test]
    fn test_validation_message_passes_through() {
        let err = IngestError::from(ValidationError::LongitudeOutOfRange(200.0));
        assert_eq!(
            err.to_string(),
            "longitude 200 is outside the range [-180, 180]"
        );
    }
}
