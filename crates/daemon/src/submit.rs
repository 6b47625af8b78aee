//! Ordered delivery of layout batches to the backend.

use std::sync::Arc;
use tilework_backend::Backend;
use tilework_ipc::AppLayoutInfo;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Hands layout batches to a single worker task.
///
/// Batches reach the backend in submission order and at most one
/// `apply_layout` call is in flight. Batches queued behind an in-flight
/// call are superseded by the newest one.
pub struct LayoutSubmitter {
    tx: mpsc::UnboundedSender<Vec<AppLayoutInfo>>,
}

impl LayoutSubmitter {
    /// Start the worker. Must be called inside a tokio runtime.
    pub fn spawn(backend: Arc<dyn Backend>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_submitter(backend, rx));
        Self { tx }
    }

    pub fn submit(&self, layouts: Vec<AppLayoutInfo>) {
        if self.tx.send(layouts).is_err() {
            warn!("Layout submitter stopped, dropping batch");
        }
    }
}

async fn run_submitter(
    backend: Arc<dyn Backend>,
    mut rx: mpsc::UnboundedReceiver<Vec<AppLayoutInfo>>,
) {
    while let Some(mut batch) = rx.recv().await {
        let mut superseded = 0usize;
        while let Ok(newer) = rx.try_recv() {
            batch = newer;
            superseded += 1;
        }
        if superseded > 0 {
            debug!("Skipping {} superseded layout batch(es)", superseded);
        }
        if let Err(e) = backend.apply_layout(batch).await {
            warn!("Failed to apply tiling layout: {}", e);
        }
    }
    debug!("Layout submitter exiting");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tilework_backend::MemoryBackend;

    fn batch(app_id: &str, width: f64) -> Vec<AppLayoutInfo> {
        vec![AppLayoutInfo {
            app_id: app_id.to_string(),
            x: 0.0,
            y: 0.0,
            width,
            height: 600.0,
        }]
    }

    #[tokio::test]
    async fn test_queued_batches_collapse_to_latest() {
        let backend = Arc::new(MemoryBackend::new());
        let submitter = LayoutSubmitter::spawn(backend.clone());

        // Nothing runs until the test task yields, so all three queue up.
        submitter.submit(batch("a", 100.0));
        submitter.submit(batch("a", 200.0));
        submitter.submit(batch("a", 300.0));
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(backend.applied_layouts(), vec![batch("a", 300.0)]);
    }

    #[tokio::test]
    async fn test_batches_arrive_in_order() {
        let backend = Arc::new(MemoryBackend::new());
        let submitter = LayoutSubmitter::spawn(backend.clone());

        submitter.submit(batch("a", 100.0));
        tokio::time::sleep(Duration::from_millis(10)).await;
        submitter.submit(batch("a", 200.0));
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(
            backend.applied_layouts(),
            vec![batch("a", 100.0), batch("a", 200.0)]
        );
    }
}
