//! Background worker for model loading.
//!
//! Loading and preparing a model is the slow part of placing it. The worker
//! does both off the render thread; the owner of the [`SceneBuilder`] polls
//! for results and commits them.

use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use super::builder::{PlacementReport, SceneBuilder};
use super::instances::PlacementId;
use super::prepare::{prepare_model, PreparedModel};
use crate::model::ModelLoader;
use crate::util::{Error, Result};

/// Commands sent to the worker.
#[derive(Debug)]
pub enum LoadCommand {
    /// Load `source` for a placement reserved with `begin_placement`.
    Load { placement: PlacementId, source: String },
    /// Stop the worker thread.
    Stop,
}

/// Results sent back from the worker.
#[derive(Debug)]
pub enum LoadResult {
    Ready {
        placement: PlacementId,
        model: Result<PreparedModel>,
    },
}

impl LoadResult {
    pub fn placement(&self) -> PlacementId {
        match self {
            Self::Ready { placement, .. } => *placement,
        }
    }

    /// Commit the model into `scene`.
    ///
    /// A failed load cancels the placement and returns the load error.
    /// `Ok(None)` means the placement was removed while loading.
    pub fn apply(self, scene: &mut SceneBuilder) -> Result<Option<PlacementReport>> {
        match self {
            Self::Ready {
                placement,
                model: Ok(prepared),
            } => scene.finish_placement(placement, prepared),
            Self::Ready {
                placement,
                model: Err(e),
            } => {
                if scene.is_pending(placement) {
                    scene.remove(placement)?;
                }
                Err(e)
            }
        }
    }
}

/// Handle to communicate with the loading thread.
pub struct LoadWorker {
    /// Send commands to worker.
    pub tx: Sender<LoadCommand>,
    /// Receive results from worker.
    pub rx: Receiver<LoadResult>,
    /// Thread handle for cleanup.
    handle: Option<JoinHandle<()>>,
}

impl LoadWorker {
    /// Spawn a loading thread using `loader`.
    pub fn spawn(loader: Arc<dyn ModelLoader>, smooth_angle: f32) -> Self {
        let (cmd_tx, cmd_rx) = channel::<LoadCommand>();
        let (res_tx, res_rx) = channel::<LoadResult>();

        let handle = thread::Builder::new()
            .name("roomtrace-loader".into())
            .spawn(move || worker_loop(loader, smooth_angle, cmd_rx, res_tx))
            .map_err(|e| tracing::error!(error = %e, "failed to spawn loader thread"))
            .ok();

        Self {
            tx: cmd_tx,
            rx: res_rx,
            handle,
        }
    }

    /// Queue a model for loading.
    ///
    /// Fails when the loader thread is gone; the caller should cancel the
    /// placement since no result will arrive for it.
    pub fn request(&self, placement: PlacementId, source: impl Into<String>) -> Result<()> {
        self.tx
            .send(LoadCommand::Load {
                placement,
                source: source.into(),
            })
            .map_err(|_| Error::other(format!("loader thread stopped, placement {placement} not queued")))
    }

    /// Check for ready results (non-blocking).
    pub fn try_recv(&self) -> Option<LoadResult> {
        self.rx.try_recv().ok()
    }

    /// Wait up to `timeout` for the next result.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<LoadResult> {
        self.rx.recv_timeout(timeout).ok()
    }

    /// Stop the worker and wait for it to finish.
    pub fn stop(&mut self) {
        let _ = self.tx.send(LoadCommand::Stop);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for LoadWorker {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Main worker loop - runs in background thread.
fn worker_loop(
    loader: Arc<dyn ModelLoader>,
    smooth_angle: f32,
    rx: Receiver<LoadCommand>,
    tx: Sender<LoadResult>,
) {
    // Channel closed ends the loop as well
    while let Ok(cmd) = rx.recv() {
        match cmd {
            LoadCommand::Load { placement, source } => {
                let _span = tracing::info_span!("load", placement = %placement, source = %source).entered();
                let model = loader
                    .load(&source)
                    .map(|tree| prepare_model(&tree, smooth_angle));
                if let Err(e) = &model {
                    tracing::warn!(error = %e, "model load failed");
                }
                if tx.send(LoadResult::Ready { placement, model }).is_err() {
                    break; // owner disconnected
                }
            }
            LoadCommand::Stop => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::LayoutConfig;
    use crate::model::primitives::box_model;
    use crate::model::{MaterialDesc, ModelTree};
    use crate::util::Error;
    use glam::{Mat4, Vec3};

    /// Serves boxes for "box", fails for everything else.
    struct BoxLoader;

    impl ModelLoader for BoxLoader {
        fn load(&self, source: &str) -> Result<ModelTree> {
            match source {
                "box" => Ok(box_model(Vec3::splat(0.5), MaterialDesc::default())),
                other => Err(Error::other(format!("no model '{other}'"))),
            }
        }
    }

    const WAIT: Duration = Duration::from_secs(10);

    #[test]
    fn test_load_and_commit() {
        let mut scene = SceneBuilder::with_config(LayoutConfig::default(), 45.0).unwrap();
        let worker = LoadWorker::spawn(Arc::new(BoxLoader), 45.0);

        let id = scene.begin_placement(Mat4::IDENTITY);
        worker.request(id, "box").unwrap();
        let result = worker.recv_timeout(WAIT).unwrap();
        assert_eq!(result.placement(), id);

        let report = result.apply(&mut scene).unwrap().unwrap();
        assert_eq!(report.ranges.tri_count, 12);
        assert_eq!(scene.instances().len(), 1);
    }

    #[test]
    fn test_failed_load_cancels_placement() {
        let mut scene = SceneBuilder::with_config(LayoutConfig::default(), 45.0).unwrap();
        let worker = LoadWorker::spawn(Arc::new(BoxLoader), 45.0);

        let id = scene.begin_placement(Mat4::IDENTITY);
        worker.request(id, "sofa").unwrap();
        let err = worker.recv_timeout(WAIT).unwrap().apply(&mut scene).unwrap_err();
        assert!(err.to_string().contains("sofa"));
        assert!(!scene.is_pending(id));
    }

    #[test]
    fn test_removed_while_loading() {
        let mut scene = SceneBuilder::with_config(LayoutConfig::default(), 45.0).unwrap();
        let mut worker = LoadWorker::spawn(Arc::new(BoxLoader), 45.0);

        let id = scene.begin_placement(Mat4::IDENTITY);
        worker.request(id, "box").unwrap();
        scene.remove(id).unwrap();

        let outcome = worker.recv_timeout(WAIT).unwrap().apply(&mut scene).unwrap();
        assert!(outcome.is_none());
        assert!(scene.materials().is_empty());
        worker.stop();
        assert!(worker.try_recv().is_none());
    }

    #[test]
    fn test_request_after_stop_fails() {
        let mut scene = SceneBuilder::with_config(LayoutConfig::default(), 45.0).unwrap();
        let mut worker = LoadWorker::spawn(Arc::new(BoxLoader), 45.0);
        worker.stop();

        let id = scene.begin_placement(Mat4::IDENTITY);
        assert!(worker.request(id, "box").is_err());
        scene.remove(id).unwrap();
        assert!(!scene.is_pending(id));
    }
}
