// facepaint CLI.
// • run: live camera, effect warped onto replayed landmarks, shown in a window.
//   N cycles the paint color through the palette, arrows and +/- move and
//   zoom the picture, ESC quits.
// • adjust: the same live view with the config mode's sample image; prints
//   the final adjustment so it can be pasted into the settings file.
// • still: render one frame from a PNG and a landmark recording.
// • recolor / palette / choices: asset tooling.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use clap::{Args, Parser, Subcommand};
use facepaint::assets::load_skin;
use facepaint::camera::CameraCapture;
use facepaint::draw::Drawer;
use facepaint::pipeline::{LatestFrame, render_frame};
use facepaint::{
    Adjustment, AppConfig, EFFECT_IMAGE_HEIGHT, EFFECT_IMAGE_WIDTH, EffectAsset, Error, FacePaint,
    FrameSink, Hsv, LoopOptions, ModeConfig, ModeKind, Palette, RenderController, ReplayDetector,
    compose_effect_image, load_filter, load_points, load_rgba, recolor, run_loop,
};
use image::RgbaImage;
use tracing_subscriber::EnvFilter;

const CANONICAL: (u32, u32) = (EFFECT_IMAGE_WIDTH, EFFECT_IMAGE_HEIGHT);

#[derive(Parser, Debug)]
#[command(name = "facepaint", version)]
struct Cli {
    /// Settings file (JSON). Defaults are used when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Live view from the camera.
    Run(RunArgs),
    /// Live view of the sample image for lining up the output.
    Adjust(AdjustArgs),
    /// Render a single frame to a PNG.
    Still(StillArgs),
    /// Recolor a marker-blue asset PNG.
    Recolor(RecolorArgs),
    /// Print a palette as JSON.
    Palette(PaletteArgs),
    /// List the facepaint choices of a mode as JSON.
    Choices(ChoicesArgs),
}

/// Which effect image to warp.
#[derive(Args, Debug)]
struct EffectArgs {
    /// A ready-made 1024x1024 effect image. Without it the skin layer plus
    /// `--paint` layers are used.
    #[arg(long)]
    image: Option<PathBuf>,

    /// Facepaint PNG stacked on the skin (repeatable, in order).
    #[arg(long)]
    paint: Vec<PathBuf>,

    /// Paint color as `h,s,v` (degrees, percent, percent).
    #[arg(long)]
    color: Option<Hsv>,

    /// Skin color as `h,s,v`; defaults to the configured skin color.
    #[arg(long)]
    skin: Option<Hsv>,
}

#[derive(Args, Debug)]
struct RunArgs {
    #[command(flatten)]
    effect: EffectArgs,

    /// Landmark recording replayed as the face detector.
    #[arg(long)]
    landmarks: PathBuf,

    /// Palette that N cycles through.
    #[arg(long, default_value_t = Palette::Color)]
    palette: Palette,

    /// Median blur radius for the overlay alpha.
    #[arg(long)]
    blur: Option<u32>,

    /// Show the camera unmirrored.
    #[arg(long)]
    no_mirror: bool,
}

#[derive(Args, Debug)]
struct AdjustArgs {
    /// Landmark recording replayed as the face detector.
    #[arg(long)]
    landmarks: PathBuf,

    /// Show the camera unmirrored.
    #[arg(long)]
    no_mirror: bool,
}

#[derive(Args, Debug)]
struct StillArgs {
    #[command(flatten)]
    effect: EffectArgs,

    /// Background frame (any image format).
    #[arg(long)]
    frame: PathBuf,

    /// Landmark recording; its first frame is used.
    #[arg(long)]
    landmarks: PathBuf,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,

    #[arg(long)]
    blur: Option<u32>,

    /// Flip the output horizontally.
    #[arg(long)]
    mirror: bool,
}

#[derive(Args, Debug)]
struct RecolorArgs {
    #[arg(long = "in")]
    in_path: PathBuf,

    #[arg(long)]
    out: PathBuf,

    /// Target color as `h,s,v`.
    #[arg(long)]
    hsv: Hsv,
}

#[derive(Args, Debug)]
struct PaletteArgs {
    /// skin, color or dark.
    name: Palette,
}

#[derive(Args, Debug)]
struct ChoicesArgs {
    /// event, practice, easy, custom or config.
    mode: ModeKind,

    /// Part directory of the custom mode. Without it the parts are listed.
    #[arg(long)]
    part: Option<String>,
}

fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let cfg = AppConfig::load_or_default(cli.config.as_deref()).context("load config")?;
    match cli.cmd {
        Command::Run(args) => cmd_run(&cfg, args),
        Command::Adjust(args) => cmd_adjust(&cfg, args),
        Command::Still(args) => cmd_still(&cfg, args),
        Command::Recolor(args) => cmd_recolor(args),
        Command::Palette(args) => cmd_palette(args),
        Command::Choices(args) => cmd_choices(&cfg, args),
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn paint_from_path(path: &Path, color: Option<Hsv>) -> anyhow::Result<FacePaint> {
    let filename = path
        .file_name()
        .with_context(|| format!("paint path '{}' has no file name", path.display()))?
        .to_string_lossy()
        .into_owned();
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut paint = FacePaint::new(filename, dir);
    paint.hsv = color;
    Ok(paint)
}

/// The effect image: given directly, or the recolored skin with paints on top.
fn effect_image(cfg: &AppConfig, args: &EffectArgs, color: Option<Hsv>) -> anyhow::Result<RgbaImage> {
    if let Some(path) = &args.image {
        return load_rgba(path, CANONICAL)
            .with_context(|| format!("load effect image '{}'", path.display()));
    }

    let skin_hsv = args.skin.unwrap_or(cfg.skin_hsv);
    let skin = load_skin(&cfg.assets.skin_image, CANONICAL, skin_hsv)
        .with_context(|| format!("load skin '{}'", cfg.assets.skin_image.display()))?;
    let paints = args
        .paint
        .iter()
        .map(|p| paint_from_path(p, color))
        .collect::<anyhow::Result<Vec<_>>>()?;
    Ok(compose_effect_image(&skin, &paints).context("stack facepaints")?)
}

fn build_asset(cfg: &AppConfig, args: &EffectArgs) -> anyhow::Result<EffectAsset> {
    let points_path = &cfg.assets.reference_points;
    let points = load_points(points_path)
        .with_context(|| format!("load reference points '{}'", points_path.display()))?;

    let filter = if cfg.use_filter {
        let filter = load_filter(&cfg.assets.filter, points.len())
            .with_context(|| format!("load point filter '{}'", cfg.assets.filter.display()))?;
        Some(filter)
    } else {
        None
    };

    let image = effect_image(cfg, args, args.color)?;
    let asset = EffectAsset::new(image, &points, filter).context("build effect asset")?;
    if let Some(filter) = asset.filter() {
        tracing::info!(kept = filter.len(), of = points.len(), "landmark filter applied");
    }
    Ok(asset)
}

/// (Re)start the render thread: open the camera and the recording inside it.
fn start_render(
    controller: &mut RenderController,
    asset: Arc<EffectAsset>,
    cfg: &AppConfig,
    landmarks: &Path,
    opts: &LoopOptions,
    display: &LatestFrame,
) -> anyhow::Result<()> {
    let camera_cfg = cfg.camera.clone();
    let landmarks = landmarks.to_path_buf();
    let opts = opts.clone();
    let mut sink = display.clone();
    controller.start(move |token| {
        let camera = CameraCapture::open(&camera_cfg)?;
        let detector = ReplayDetector::load(&landmarks)?;
        run_loop(&token, &asset, camera, detector, &mut sink, &opts)
    })?;
    Ok(())
}

fn loop_options(cfg: &AppConfig, blur: Option<u32>, no_mirror: bool) -> LoopOptions {
    LoopOptions {
        blur: blur.or(cfg.blur),
        mirror: cfg.mirror && !no_mirror,
        max_source_failures: cfg.max_source_failures,
        adjustment: cfg.adjustment.shared(),
    }
}

/// Paint colors that N steps through, and the layers they recolor.
struct ColorCycle<'a> {
    effect: &'a EffectArgs,
    colors: &'static [Hsv],
    current: Option<usize>,
}

/// Window loop on the main thread; rendering runs on the controller's thread.
/// Returns the adjustment in effect when the window closed.
fn live_view(
    cfg: &AppConfig,
    mut asset: Arc<EffectAsset>,
    landmarks: &Path,
    opts: &LoopOptions,
    mut cycle: Option<ColorCycle<'_>>,
) -> anyhow::Result<Adjustment> {
    /* --- Window + hand-off slot ---
       Visual: the window opens black and shows frames as the render thread
       finishes them. */
    let display = LatestFrame::new();
    let mut drawer = Drawer::new(
        &cfg.window_title,
        cfg.camera.width as usize,
        cfg.camera.height as usize,
    )?;
    let keys = if cycle.is_some() { "N: NEXT COLOR | " } else { "" };

    /* --- Render thread ---
       Visual: camera light turns on; the effect appears once a face is replayed. */
    let mut controller = RenderController::new();
    start_render(&mut controller, asset.clone(), cfg, landmarks, opts, &display)?;

    /* ------------------------------ Main loop ------------------------------ */
    while drawer.is_open() && !drawer.esc_pressed() {
        /* 1) N: next palette color.
           Visual: the paint changes color after a brief camera restart. */
        if let Some(cycle) = cycle.as_mut().filter(|_| drawer.n_pressed_once()) {
            let idx = cycle.current.map_or(0, |i| (i + 1) % cycle.colors.len());
            cycle.current = Some(idx);
            let color = cycle.colors[idx];
            tracing::info!(%color, "switching paint color");

            // Same points, so the triangulation is reused.
            let mut next = (*asset).clone();
            next.set_image(effect_image(cfg, cycle.effect, Some(color))?)?;
            asset = Arc::new(next);
            start_render(&mut controller, asset.clone(), cfg, landmarks, opts, &display)?;
        }

        /* 2) Arrows / +/-: shift and zoom.
           Visual: the whole picture moves at once; the HUD shows the values. */
        let (scale, dx, dy) = drawer.adjustment_keys();
        if scale != 0.0 || dx != 0 || dy != 0 {
            opts.adjustment.lock().nudge(scale, dx, dy);
        }
        let adj = *opts.adjustment.lock();
        drawer.set_hint(format!(
            "{keys}ZOOM {:.2} X {} Y {}",
            adj.scale, adj.x_offset, adj.y_offset
        ));

        /* 3) Show the newest frame, or keep the window alive while waiting. */
        match display.take() {
            Some((frame, info)) => drawer.present(&frame, &info)?,
            None => {
                if !controller.is_running() {
                    break;
                }
                drawer.pump();
                std::thread::sleep(Duration::from_millis(2));
            }
        }
    }

    display.close();
    if let Some(result) = controller.stop() {
        let stats = result.context("render loop")?;
        tracing::info!(
            frames = stats.frames,
            rendered = stats.rendered,
            no_face = stats.no_face,
            skipped = stats.skipped,
            "done"
        );
    }
    let adj = *opts.adjustment.lock();
    Ok(adj)
}

fn cmd_run(cfg: &AppConfig, args: RunArgs) -> anyhow::Result<()> {
    let opts = loop_options(cfg, args.blur, args.no_mirror);
    let asset = Arc::new(build_asset(cfg, &args.effect)?);
    let recolorable = args.effect.image.is_none() && !args.effect.paint.is_empty();
    let cycle = recolorable.then(|| ColorCycle {
        effect: &args.effect,
        colors: args.palette.colors(),
        current: None,
    });

    let adj = live_view(cfg, asset, &args.landmarks, &opts, cycle)?;
    if adj != cfg.adjustment {
        tracing::info!(
            scale = adj.scale,
            x_offset = adj.x_offset,
            y_offset = adj.y_offset,
            "adjustment changed (not saved)"
        );
    }
    Ok(())
}

fn cmd_adjust(cfg: &AppConfig, args: AdjustArgs) -> anyhow::Result<()> {
    let mode = ModeConfig::for_kind(ModeKind::Config, &cfg.assets.facepaints_root);
    let sample = mode
        .adjustment_sample()
        .context("config mode has no sample image")?;
    let image = load_rgba(sample, CANONICAL)
        .with_context(|| format!("load sample '{}'", sample.display()))?;

    let points_path = &cfg.assets.reference_points;
    let points = load_points(points_path)
        .with_context(|| format!("load reference points '{}'", points_path.display()))?;
    let asset = Arc::new(EffectAsset::new(image, &points, None).context("build sample asset")?);

    let opts = loop_options(cfg, None, args.no_mirror);
    let adj = live_view(cfg, asset, &args.landmarks, &opts, None)?;
    println!(
        "{}",
        serde_json::to_string_pretty(&serde_json::json!({ "adjustment": adj }))?
    );
    Ok(())
}

fn cmd_still(cfg: &AppConfig, args: StillArgs) -> anyhow::Result<()> {
    let asset = build_asset(cfg, &args.effect)?;
    let frame = image::open(&args.frame)
        .with_context(|| format!("open frame '{}'", args.frame.display()))?
        .into_rgb8();
    let mut detector = ReplayDetector::load(&args.landmarks)
        .with_context(|| format!("load landmarks '{}'", args.landmarks.display()))?;

    let out = match render_frame(&asset, &frame, &mut detector, args.blur.or(cfg.blur)) {
        Ok(img) => img,
        Err(Error::MissingLandmarks) => {
            tracing::warn!("no face in the recording; writing the bare frame");
            frame
        }
        Err(e) => return Err(e).context("render frame"),
    };
    let out = cfg.adjustment.apply(out);
    let out = if args.mirror {
        image::imageops::flip_horizontal(&out)
    } else {
        out
    };

    if let Some(parent) = args.out.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    out.save(&args.out)
        .with_context(|| format!("write '{}'", args.out.display()))?;
    tracing::info!(out = %args.out.display(), "frame written");
    Ok(())
}

fn cmd_recolor(args: RecolorArgs) -> anyhow::Result<()> {
    let img = image::open(&args.in_path)
        .with_context(|| format!("open '{}'", args.in_path.display()))?
        .into_rgba8();
    recolor(&img, args.hsv)
        .save(&args.out)
        .with_context(|| format!("write '{}'", args.out.display()))?;
    tracing::info!(hsv = %args.hsv, out = %args.out.display(), "recolored");
    Ok(())
}

fn cmd_palette(args: PaletteArgs) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(args.name.colors())?);
    Ok(())
}

fn cmd_choices(cfg: &AppConfig, args: ChoicesArgs) -> anyhow::Result<()> {
    let mode = ModeConfig::for_kind(args.mode, &cfg.assets.facepaints_root);

    let custom_without_part = matches!(mode.choices, facepaint::ChoiceRule::ByPart { .. })
        && args.part.is_none();
    let listing = if custom_without_part {
        serde_json::to_value(mode.part_kinds().context("list parts")?)?
    } else {
        let paints = mode
            .list_choices(args.part.as_deref())
            .with_context(|| format!("list choices of mode '{}'", args.mode))?;
        let entries: Vec<serde_json::Value> = paints
            .iter()
            .map(|p| {
                serde_json::json!({
                    "filename": p.filename,
                    "image_path": p.image_path(),
                    "thumbnail_path": p.thumbnail_path().unwrap_or_else(|| p.image_path()),
                    "part_kind": p.part_kind,
                })
            })
            .collect();
        serde_json::Value::Array(entries)
    };
    println!("{}", serde_json::to_string_pretty(&listing)?);
    Ok(())
}
