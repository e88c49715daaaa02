use std::time::Duration;

/// Status code published when the request could not be built.
pub const STATUS_REQUEST_NOT_BUILT: u16 = 0;
/// Status code published when the transport failed before a response arrived.
pub const STATUS_TRANSPORT_ERROR: u16 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// A response arrived with an acceptable status.
    Healthy,
    /// A response arrived, but its status marks the target as down.
    Unhealthy,
    /// No response: the request could not be built or the transport failed.
    Failed,
}

impl Classification {
    /// Classify a received status code. Informational-or-lower codes, 404
    /// and every 5xx count as down; everything else is healthy.
    pub fn from_status(status: u16) -> Self {
        if status < 100 || status >= 500 || status == 404 {
            Classification::Unhealthy
        } else {
            Classification::Healthy
        }
    }

    pub fn is_healthy(self) -> bool {
        self == Classification::Healthy
    }
}

/// Result of one probe cycle. Consumed by the metric set and then dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeOutcome {
    pub request_built: bool,
    pub response_received: bool,
    pub status_code: Option<u16>,
    pub duration: Duration,
    /// `NotAfter` of the leaf certificate, unix seconds.
    pub certificate_expiry: Option<i64>,
    pub classification: Classification,
}

impl ProbeOutcome {
    pub fn request_not_built() -> Self {
        Self {
            request_built: false,
            response_received: false,
            status_code: None,
            duration: Duration::ZERO,
            certificate_expiry: None,
            classification: Classification::Failed,
        }
    }

    pub fn transport_error(duration: Duration) -> Self {
        Self {
            request_built: true,
            response_received: false,
            status_code: None,
            duration,
            certificate_expiry: None,
            classification: Classification::Failed,
        }
    }

    pub fn response(status: u16, duration: Duration, certificate_expiry: Option<i64>) -> Self {
        Self {
            request_built: true,
            response_received: true,
            status_code: Some(status),
            duration,
            certificate_expiry,
            classification: Classification::from_status(status),
        }
    }

    /// The value of the status code gauge, including the failure sentinels.
    pub fn status_code_value(&self) -> u16 {
        match self.status_code {
            Some(code) => code,
            None if !self.request_built => STATUS_REQUEST_NOT_BUILT,
            None => STATUS_TRANSPORT_ERROR,
        }
    }
}
