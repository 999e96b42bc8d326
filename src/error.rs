// Error taxonomy for the whole pipeline.
// Every variant states *where* things went wrong: asset load time, per frame,
// or the camera/window collaborators around the loop.

pub type Result<T> = std::result::Result<T, Error>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Triangulation impossible: too few, collinear or out-of-bounds points.
    #[error("degenerate input: {0}")]
    DegenerateInput(String),

    /// Asset image does not have the canonical size.
    #[error("asset size error: expected {expected_width}x{expected_height}, got {width}x{height}")]
    AssetSize {
        expected_width: u32,
        expected_height: u32,
        width: u32,
        height: u32,
    },

    /// The detector found no face in this frame.
    #[error("missing landmarks: no face found in frame")]
    MissingLandmarks,

    /// A destination triangle collapsed; only that triangle is skipped.
    #[error("degenerate triangle ({0}, {1}, {2})")]
    DegenerateTriangle(usize, usize, usize),

    /// A frame's landmark array does not match the reference point count.
    #[error("landmark count mismatch: expected {expected}, got {actual}")]
    LandmarkCount { expected: usize, actual: usize },

    #[error("invalid point filter: {0}")]
    InvalidFilter(String),

    #[error("invalid color: {0}")]
    InvalidColor(String),

    #[error("dimension mismatch: {0}")]
    DimensionMismatch(String),

    #[error("asset load error: {0}")]
    AssetLoad(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("camera init error: {0}")]
    CameraInit(String),

    #[error("camera frame error: {0}")]
    CameraFrame(String),

    #[error("window init error: {0}")]
    WindowInit(String),

    #[error("window update error: {0}")]
    WindowUpdate(String),

    /// The background render thread could not be spawned or panicked.
    #[error("render thread error: {0}")]
    RenderThread(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Image(#[from] image::ImageError),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn degenerate_input(msg: impl Into<String>) -> Self {
        Self::DegenerateInput(msg.into())
    }

    pub fn invalid_filter(msg: impl Into<String>) -> Self {
        Self::InvalidFilter(msg.into())
    }

    pub fn invalid_color(msg: impl Into<String>) -> Self {
        Self::InvalidColor(msg.into())
    }

    pub fn dimension_mismatch(msg: impl Into<String>) -> Self {
        Self::DimensionMismatch(msg.into())
    }

    pub fn asset_load(msg: impl Into<String>) -> Self {
        Self::AssetLoad(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Errors the frame loop recovers from by skipping compositing for one frame.
    pub fn is_frame_level(&self) -> bool {
        matches!(
            self,
            Error::MissingLandmarks
                | Error::DegenerateTriangle(..)
                | Error::LandmarkCount { .. }
                | Error::CameraFrame(_)
        )
    }
}
