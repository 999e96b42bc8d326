// Opens a webcam and hands out RGB frames to the render loop.
// Visual expectation: each `next_frame()` blocks until the device delivers
// the next image; the loop paints the effect on it and the window shows it.

use image::RgbImage;
use nokhwa::{
    Camera,
    pixel_format::RgbFormat,
    utils::{
        CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType, Resolution,
    },
};

use crate::config::CameraConfig;
use crate::error::{Error, Result};
use crate::pipeline::FrameSource;

// A small wrapper around nokhwa::Camera so the loop only sees RgbImage.
pub struct CameraCapture {
    cam: Camera,
}

impl CameraCapture {
    /// Open the configured device at (or near) the requested resolution.
    /// Nothing is shown yet; we only hold an open stream.
    pub fn open(cfg: &CameraConfig) -> Result<Self> {
        // 1) Choose the device (0 = default webcam).
        let idx = CameraIndex::Index(cfg.index);

        let fmt = CameraFormat::new(
            Resolution::new(cfg.width, cfg.height),
            FrameFormat::YUYV, // uncompressed; cheap to convert to RGB
            cfg.fps,
        );

        // 2) Ask for RGB frames at the closest format the device offers.
        let req = RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(fmt));

        // 3) Create the camera (fails if no such device exists), then stream.
        let mut cam = Camera::new(idx, req)
            .map_err(|e| Error::CameraInit(format!("Create camera: {e}")))?;

        cam.open_stream()
            .map_err(|e| Error::CameraInit(format!("Open stream: {e}")))?;

        // 4) The stream might choose a slightly different resolution; the
        //    warp works at whatever size arrives.
        let actual = cam.resolution();
        tracing::info!(
            index = cfg.index,
            width = actual.width(),
            height = actual.height(),
            "camera opened"
        );

        Ok(Self { cam })
    }
}

impl FrameSource for CameraCapture {
    fn next_frame(&mut self) -> Result<RgbImage> {
        // 1) Pull a frame (blocks until the device has one).
        let frame = self
            .cam
            .frame()
            .map_err(|e| Error::CameraFrame(format!("Fetch frame: {e}")))?;

        // 2) Decode to ImageBuffer<Rgb<u8>, Vec<u8>> whatever the raw format was.
        //    This is the background the overlay lands on.
        frame
            .decode_image::<RgbFormat>()
            .map_err(|e| Error::CameraFrame(format!("Decode RGB: {e}")))
    }

    // Visual: the camera light goes off.
    fn close(&mut self) {
        if let Err(e) = self.cam.stop_stream() {
            tracing::warn!(error = %e, "camera stream did not stop cleanly");
        } else {
            tracing::info!("camera released");
        }
    }
}
