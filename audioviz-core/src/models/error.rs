use thiserror::Error;

/// Errors that can occur while configuring or running a capture source.
///
/// Per-block anomalies (undecodable formats, silence) never surface here;
/// they are absorbed by the pipeline.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CaptureError {
    #[error("capture backend unavailable: {0}")]
    PlatformNotSupported(String),

    #[error("device not available: {0}")]
    DeviceNotAvailable(String),

    #[error("permission denied")]
    PermissionDenied,

    #[error("configuration failed: {0}")]
    ConfigurationFailed(String),

    #[error("capture stream stopped unexpectedly: {0}")]
    StreamFault(String),

    #[error("source no longer usable")]
    Disposed,

    #[error("unknown error: {0}")]
    Unknown(String),
}

impl CaptureError {
    /// Whether this error came from setting up a stream (as opposed to a
    /// running one failing or the source being misused).
    pub fn is_setup_fault(&self) -> bool {
        matches!(
            self,
            Self::PlatformNotSupported(_)
                | Self::DeviceNotAvailable(_)
                | Self::PermissionDenied
                | Self::ConfigurationFailed(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disposed_message() {
        assert_eq!(CaptureError::Disposed.to_string(), "source no longer usable");
    }

    #[test]
    fn setup_fault_classification() {
        assert!(CaptureError::DeviceNotAvailable("mic".into()).is_setup_fault());
        assert!(CaptureError::PlatformNotSupported("linux".into()).is_setup_fault());
        assert!(!CaptureError::StreamFault("unplugged".into()).is_setup_fault());
        assert!(!CaptureError::Disposed.is_setup_fault());
    }
}
