// The frame loop: acquire → detect → warp + composite → present.
//
// The loop owns its frame source and detector and closes both on every exit
// path. It runs on a background thread owned by `RenderController`; the only
// state shared with that thread is the read-only `EffectAsset` and a
// cancellation flag checked at the top of each iteration.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use image::RgbImage;
use parking_lot::Mutex;

use crate::adjust::{Adjustment, SharedAdjustment};
use crate::effect::EffectAsset;
use crate::error::{Error, Result};
use crate::types::LandmarkFrame;

/// Cooperative cancellation flag shared with the render thread.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

/// Where frames come from (a camera, a file, a test vector).
pub trait FrameSource {
    /// The latest frame. Blocks until one is available.
    fn next_frame(&mut self) -> Result<RgbImage>;

    fn close(&mut self) {}
}

/// Face landmark detection. `Ok(None)` means no face in this frame.
pub trait LandmarkDetector {
    fn detect(&mut self, frame: &RgbImage) -> Result<Option<LandmarkFrame>>;

    fn close(&mut self) {}
}

impl<F> LandmarkDetector for F
where
    F: FnMut(&RgbImage) -> Option<LandmarkFrame>,
{
    fn detect(&mut self, frame: &RgbImage) -> Result<Option<LandmarkFrame>> {
        Ok(self(frame))
    }
}

/// What the loop knows about a presented frame.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FrameInfo {
    pub index: u64,
    /// Frames per second, measured over the last full second.
    pub fps: f32,
    /// False when the frame is shown without the effect.
    pub face_found: bool,
}

/// Where finished frames go.
pub trait FrameSink {
    fn present(&mut self, frame: &RgbImage, info: &FrameInfo) -> Result<()>;

    /// The loop stops once the sink reports closed.
    fn is_open(&self) -> bool {
        true
    }
}

#[derive(Clone, Debug)]
pub struct LoopOptions {
    pub blur: Option<u32>,
    pub mirror: bool,
    pub max_source_failures: u32,
    /// Read every frame, so changes show up while the loop runs.
    pub adjustment: SharedAdjustment,
}

impl Default for LoopOptions {
    fn default() -> Self {
        Self {
            blur: None,
            mirror: true,
            max_source_failures: 30,
            adjustment: Adjustment::default().shared(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LoopStats {
    /// Frames presented.
    pub frames: u64,
    /// Frames presented with the effect applied.
    pub rendered: u64,
    /// Frames presented bare because no face was found.
    pub no_face: u64,
    /// Frames presented bare after another frame-level error.
    pub skipped: u64,
    /// Camera frames that failed to arrive.
    pub source_failures: u64,
}

/// Closes the source and detector however the loop ends.
struct Resources<S: FrameSource, D: LandmarkDetector> {
    source: S,
    detector: D,
}

impl<S: FrameSource, D: LandmarkDetector> Drop for Resources<S, D> {
    fn drop(&mut self) {
        self.source.close();
        self.detector.close();
        tracing::debug!("frame source and detector closed");
    }
}

/// Detect landmarks on `frame` and composite the effect onto it.
pub fn render_frame<D: LandmarkDetector + ?Sized>(
    asset: &EffectAsset,
    frame: &RgbImage,
    detector: &mut D,
    blur: Option<u32>,
) -> Result<RgbImage> {
    let landmarks = detector.detect(frame)?.ok_or(Error::MissingLandmarks)?;
    asset.render(frame, &landmarks, blur)
}

/// Run until `token` is cancelled, the sink closes, or a fatal error occurs.
///
/// Detector and compositing errors show the bare camera frame and keep going.
/// The source may fail up to `max_source_failures` times in a row before the
/// last error ends the loop. A sink error ends it at once.
pub fn run_loop<S, D, K>(
    token: &CancelToken,
    asset: &EffectAsset,
    source: S,
    detector: D,
    sink: &mut K,
    opts: &LoopOptions,
) -> Result<LoopStats>
where
    S: FrameSource,
    D: LandmarkDetector,
    K: FrameSink + ?Sized,
{
    let mut res = Resources { source, detector };
    let mut stats = LoopStats::default();
    let mut consecutive_failures: u32 = 0;

    let mut last_fps_time = Instant::now();
    let mut frames_this_second: u32 = 0;
    let mut fps: f32 = 0.0;

    tracing::info!(
        blur = ?opts.blur,
        mirror = opts.mirror,
        triangles = asset.triangles().len(),
        "render loop started"
    );

    loop {
        if token.is_cancelled() {
            tracing::info!("render loop cancelled");
            break;
        }
        if !sink.is_open() {
            tracing::info!("display closed");
            break;
        }

        // 1) Grab the newest camera frame.
        let frame = match res.source.next_frame() {
            Ok(f) => {
                consecutive_failures = 0;
                f
            }
            Err(e) if e.is_frame_level() => {
                consecutive_failures += 1;
                stats.source_failures += 1;
                tracing::warn!(error = %e, consecutive_failures, "frame source failed");
                if consecutive_failures >= opts.max_source_failures {
                    return Err(e);
                }
                continue;
            }
            Err(e) => return Err(e),
        };

        // 2) Find the face and paint the effect on it. Whatever goes wrong
        //    here only costs this frame; it is shown bare.
        let (output, face_found) = match res.detector.detect(&frame) {
            Ok(Some(landmarks)) => match asset.render(&frame, &landmarks, opts.blur) {
                Ok(img) => {
                    stats.rendered += 1;
                    (img, true)
                }
                Err(e) => {
                    stats.skipped += 1;
                    tracing::warn!(error = %e, "frame shown without effect");
                    (frame, false)
                }
            },
            Ok(None) => {
                stats.no_face += 1;
                tracing::trace!("no face in frame");
                (frame, false)
            }
            Err(e) => {
                stats.skipped += 1;
                tracing::warn!(error = %e, "landmark detection failed");
                (frame, false)
            }
        };

        // 3) Zoom/shift, then mirror for the selfie view.
        let adjustment = *opts.adjustment.lock();
        let output = adjustment.apply(output);
        let output = if opts.mirror {
            image::imageops::flip_horizontal(&output)
        } else {
            output
        };

        // 4) FPS over the last full second.
        frames_this_second += 1;
        let now = Instant::now();
        if now.duration_since(last_fps_time) >= Duration::from_secs(1) {
            let secs = now.duration_since(last_fps_time).as_secs_f32();
            fps = frames_this_second as f32 / secs;
            tracing::debug!(fps, "frame rate");
            frames_this_second = 0;
            last_fps_time = now;
        }

        let info = FrameInfo {
            index: stats.frames,
            fps,
            face_found,
        };
        sink.present(&output, &info)?;
        stats.frames += 1;
    }

    tracing::info!(?stats, "render loop stopped");
    Ok(stats)
}

/// Latest-frame slot handing rendered frames from the render thread to the
/// display thread. A frame not yet taken is overwritten, so nothing queues.
#[derive(Clone, Default)]
pub struct LatestFrame {
    slot: Arc<Mutex<Option<(RgbImage, FrameInfo)>>>,
    closed: Arc<AtomicBool>,
}

impl LatestFrame {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn take(&self) -> Option<(RgbImage, FrameInfo)> {
        self.slot.lock().take()
    }

    /// Tell the producer to stop.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }
}

impl FrameSink for LatestFrame {
    fn present(&mut self, frame: &RgbImage, info: &FrameInfo) -> Result<()> {
        *self.slot.lock() = Some((frame.clone(), info.clone()));
        Ok(())
    }

    fn is_open(&self) -> bool {
        !self.closed.load(Ordering::Acquire)
    }
}

/// Owns at most one render thread at a time.
#[derive(Default)]
pub struct RenderController {
    token: Option<CancelToken>,
    handle: Option<JoinHandle<Result<LoopStats>>>,
}

impl RenderController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stop any running job, then run `job` on a fresh thread with a fresh token.
    pub fn start<F>(&mut self, job: F) -> Result<()>
    where
        F: FnOnce(CancelToken) -> Result<LoopStats> + Send + 'static,
    {
        if let Some(previous) = self.stop() {
            match previous {
                Ok(stats) => tracing::debug!(?stats, "previous render job replaced"),
                Err(e) => tracing::warn!(error = %e, "previous render job ended with an error"),
            }
        }

        let token = CancelToken::new();
        let worker_token = token.clone();
        let handle = std::thread::Builder::new()
            .name("facepaint-render".to_string())
            .spawn(move || job(worker_token))
            .map_err(|e| Error::RenderThread(format!("spawn: {e}")))?;

        self.token = Some(token);
        self.handle = Some(handle);
        Ok(())
    }

    /// Cancel the running job and wait for it. `None` if nothing was running.
    pub fn stop(&mut self) -> Option<Result<LoopStats>> {
        if let Some(token) = self.token.take() {
            token.cancel();
        }
        let handle = self.handle.take()?;
        Some(
            handle
                .join()
                .unwrap_or_else(|_| Err(Error::RenderThread("render thread panicked".into()))),
        )
    }

    /// True while a job is running (it may have finished on its own).
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for RenderController {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}
