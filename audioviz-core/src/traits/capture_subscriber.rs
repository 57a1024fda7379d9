use crate::models::error::CaptureError;
use crate::processing::pipeline::AnalysisFrame;

/// Receiver for a capture source's per-block results.
///
/// All methods are called from the backend's capture thread, not the UI
/// thread. Implementations should marshal to the UI thread if needed.
pub trait CaptureSubscriber: Send + Sync {
    /// Called once per processed block, in delivery order.
    fn on_frame(&self, frame: &AnalysisFrame);

    /// Called when the stream stops on its own. The source is already
    /// stopped when this runs and will not restart by itself.
    fn on_fault(&self, error: &CaptureError);
}
