//! Headless post-processing demo
//!
//! Renders an HDR gradient through the shadow composite and tonemapping
//! stages on the CPU reference backend and writes the result as a PNG.
//!
//! ```bash
//! postfx_demo --width 640 --height 360 --frames 3 --output postfx.png
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use bevy_ecs::world::World;
use clap::Parser;
use glam::Vec3;
use image::{DynamicImage, Rgba, Rgba32FImage};

use camera_postfx::backend::RenderTextureDescriptor;
use camera_postfx::{
    register_builtin_shaders, Camera, CpuBackend, GraphicsBackend, PostProcess,
    PostProcessSettings, Projection, ShadowCompositeStage, ShadowSync, TextureFormat,
    TonemapOperator, TonemappingStage, Transform,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
enum CliTonemap {
    Reinhard,
    #[default]
    Aces,
    Uncharted2,
    None,
}

impl From<CliTonemap> for TonemapOperator {
    fn from(cli: CliTonemap) -> Self {
        match cli {
            CliTonemap::Reinhard => TonemapOperator::Reinhard,
            CliTonemap::Aces => TonemapOperator::Aces,
            CliTonemap::Uncharted2 => TonemapOperator::Uncharted2,
            CliTonemap::None => TonemapOperator::None,
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "postfx_demo", about = "Run the post-processing chain headlessly")]
struct Args {
    /// Frame width in pixels
    #[arg(long, default_value_t = 640)]
    width: u32,

    /// Frame height in pixels
    #[arg(long, default_value_t = 360)]
    height: u32,

    /// Number of frames to render
    #[arg(long, default_value_t = 1)]
    frames: u64,

    /// Shadow density in [0, 1]
    #[arg(long, default_value_t = 0.5)]
    density: f32,

    #[arg(long, value_enum, default_value_t = CliTonemap::Aces)]
    tonemap: CliTonemap,

    #[arg(long, default_value_t = 1.0)]
    exposure: f32,

    /// Copy the primary camera's lens into the shadow camera every frame
    #[arg(long)]
    sync_every_frame: bool,

    /// Output PNG path
    #[arg(short, long, default_value = "postfx.png")]
    output: PathBuf,
}

fn gradient(width: u32, height: u32) -> Rgba32FImage {
    Rgba32FImage::from_fn(width, height, |x, y| {
        let u = x as f32 / width.max(1) as f32;
        let v = y as f32 / height.max(1) as f32;
        Rgba([u * 4.0, v * 2.0, (1.0 - u) * 0.5, 1.0])
    })
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut backend = CpuBackend::new();
    register_builtin_shaders(&mut backend);

    let frame_target = backend.create_render_texture(
        &RenderTextureDescriptor::new(args.width, args.height, 24)
            .with_label("FrameBuffer")
            .with_format(TextureFormat::Rgba32Float),
    )?;

    let mut world = World::new();
    let mut camera = Camera::new(
        Projection::perspective(60.0, args.width as f32 / args.height.max(1) as f32, 0.3, 500.0),
        args.width,
        args.height,
    );
    camera.target_texture = Some(frame_target);
    let mut transform = Transform::from_position(Vec3::new(0.0, 2.0, 8.0));
    transform.look_at(Vec3::ZERO, Vec3::Y);
    let camera = world.spawn((transform, camera)).id();

    let mut settings = PostProcessSettings::from_camera(
        world
            .get::<Camera>(camera)
            .ok_or("camera was not spawned")?,
    );
    settings.set_density(args.density);
    if args.sync_every_frame {
        settings.shadow_sync = ShadowSync::EveryFrame;
    }

    let mut pipeline = PostProcess::attach(&mut world, camera, settings)?;
    pipeline.stages().push(Arc::new(ShadowCompositeStage::new()));
    pipeline.stages().push(Arc::new(
        TonemappingStage::new(args.tonemap.into()).with_exposure(args.exposure),
    ));
    log::info!("Stages: {:?}", pipeline.stages().names());

    for _ in 0..args.frames {
        backend.write_image(frame_target, &gradient(args.width, args.height))?;
        let report = pipeline.render_frame(&mut world, &mut backend)?;
        log::info!(
            "Frame {} done: {} stages, shadow pass {}",
            report.frame_index,
            report.stages_recorded,
            if report.shadow_rendered { "rendered" } else { "skipped" }
        );
    }

    let stats = backend.stats();
    log::info!(
        "{} textures created, {} temporaries allocated, {} reused, {} blits",
        stats.textures_created,
        stats.temporaries_allocated,
        stats.temporaries_reused,
        stats.blits
    );

    let image = backend
        .read_image(frame_target)
        .ok_or("frame buffer was destroyed")?
        .clone();
    DynamicImage::ImageRgba32F(image).to_rgba8().save(&args.output)?;
    log::info!("Wrote {}", args.output.display());

    pipeline.detach(&mut world, &mut backend);
    Ok(())
}
