// facepaint: warps a flat makeup image onto tracked face landmarks and
// composites it over live camera frames.
//
// Pipeline: asset load (+ recolor, layering) → triangulation (once) →
// per frame: landmarks → per-triangle affine warp → alpha overlay → display.

pub mod adjust;
pub mod assets;
pub mod camera;
pub mod composite;
pub mod config;
pub mod delaunay;
pub mod draw;
pub mod effect;
pub mod error;
pub mod mode;
pub mod palette;
pub mod pipeline;
pub mod recolor;
pub mod replay;
pub mod types;
pub mod warp;

pub use crate::adjust::{Adjustment, SharedAdjustment};
pub use crate::assets::{FacePaint, compose_effect_image, load_filter, load_points, load_rgba};
pub use crate::composite::{alpha_composite, overlay_image};
pub use crate::config::AppConfig;
pub use crate::delaunay::build_triangulation;
pub use crate::effect::{EFFECT_IMAGE_HEIGHT, EFFECT_IMAGE_WIDTH, EffectAsset};
pub use crate::error::{Error, Result};
pub use crate::mode::{ChoiceRule, ModeConfig, ModeKind};
pub use crate::palette::Palette;
pub use crate::pipeline::{
    CancelToken, FrameInfo, FrameSink, FrameSource, LandmarkDetector, LoopOptions, LoopStats,
    RenderController, run_loop,
};
pub use crate::recolor::recolor;
pub use crate::replay::ReplayDetector;
pub use crate::types::{Hsv, Landmark, LandmarkFrame, Point2, PointFilter, Rect, Triangle};
pub use crate::warp::warp_triangles;
