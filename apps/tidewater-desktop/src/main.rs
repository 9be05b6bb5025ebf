mod assets;

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use egui::Context as EguiContext;
use glam::Vec3;
use tidewater_common::Resolution;
use tidewater_render::{FrameStats, IslandConfig, IslandRenderer, RenderingOverrides};
use tidewater_render_wgpu::{FlyCamera, WgpuBackend, request_device};
use tidewater_terrain::{ProceduralTerrain, TerrainParams};
use tidewater_waves::Wave;
use tracing_subscriber::EnvFilter;
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::{DeviceEvent, ElementState, KeyEvent, MouseButton, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Fullscreen, Window, WindowId};

/// Frame interval when presenting at half rate.
const HALF_RATE_INTERVAL: Duration = Duration::from_micros(33_333);

#[derive(Parser)]
#[command(name = "tidewater-desktop", about = "Interactive island renderer")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// YAML config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory holding shaders/ and textures/
    #[arg(long, default_value = "./assets")]
    assets: PathBuf,

    /// Window size
    #[arg(long, num_args = 2, value_names = ["W", "H"])]
    wxh: Option<Vec<u32>>,

    /// Height of the offscreen targets
    #[arg(long = "internal-res")]
    internal_res: Option<u32>,

    #[arg(long)]
    novsync: bool,

    #[arg(long)]
    fullscreen: bool,

    #[arg(long)]
    half_rate: bool,

    /// Keep the window at its initial aspect ratio
    #[arg(long)]
    force_aspect_ratio: bool,
}

impl Cli {
    fn overrides(&self) -> RenderingOverrides {
        RenderingOverrides {
            wxh: self.wxh.as_deref().and_then(|v| match v {
                [w, h] => Some((*w, *h)),
                _ => None,
            }),
            internal_vertical_resolution: self.internal_res,
            no_vsync: self.novsync,
            fullscreen: self.fullscreen,
            half_rate: self.half_rate,
            force_aspect_ratio: self.force_aspect_ratio,
        }
    }

    fn island_config(&self) -> Result<IslandConfig> {
        let mut config = match &self.config {
            Some(path) => IslandConfig::load(path)
                .with_context(|| format!("loading config {}", path.display()))?,
            None => IslandConfig::default(),
        };
        config.rendering.apply(&self.overrides());
        config.validate()?;
        Ok(config)
    }
}

/// Everything that lives once the GPU is up.
struct Scene {
    backend: WgpuBackend,
    renderer: IslandRenderer,
    camera: FlyCamera,
    stats: FrameStats,
    keys_held: HashSet<KeyCode>,
    mouse_captured: bool,
    show_panel: bool,
    start: Instant,
    last_frame: Instant,
    frame_time: f32,
}

impl Scene {
    fn update(&mut self, dt: f32) {
        let speed_mult = if self.keys_held.contains(&KeyCode::ShiftLeft) {
            5.0
        } else {
            1.0
        };
        let mut amount = Vec3::ZERO;
        for (key, axis) in [
            (KeyCode::KeyW, Vec3::Z),
            (KeyCode::KeyS, Vec3::NEG_Z),
            (KeyCode::KeyD, Vec3::X),
            (KeyCode::KeyA, Vec3::NEG_X),
            (KeyCode::Space, Vec3::Y),
            (KeyCode::ControlLeft, Vec3::NEG_Y),
        ] {
            if self.keys_held.contains(&key) {
                amount += axis;
            }
        }
        if amount != Vec3::ZERO {
            self.camera.translate(amount, dt * speed_mult);
        }
    }

    fn handle_key(&mut self, key: KeyCode, pressed: bool) {
        if pressed {
            self.keys_held.insert(key);
        } else {
            self.keys_held.remove(&key);
            return;
        }

        match key {
            KeyCode::F1 => self.show_panel = !self.show_panel,
            KeyCode::KeyP => {
                let toggles = self.renderer.toggles_mut();
                toggles.stop_time = !toggles.stop_time;
            }
            KeyCode::KeyL => {
                let toggles = self.renderer.toggles_mut();
                toggles.wireframe = !toggles.wireframe;
            }
            KeyCode::KeyR => self.regenerate_waves(),
            _ => {}
        }
    }

    fn regenerate_waves(&mut self) {
        match self.renderer.regenerate_waves(&mut self.backend) {
            Ok(()) => tracing::info!("regenerated waves"),
            Err(e) => tracing::warn!("wave regeneration failed: {e}"),
        }
    }

    fn draw_ui(&mut self, ctx: &EguiContext) {
        if !self.show_panel {
            return;
        }

        egui::SidePanel::left("island")
            .default_width(260.0)
            .show(ctx, |ui| {
                ui.heading("Island");
                ui.label(format!(
                    "{:.1} ms ({:.0} fps)",
                    self.frame_time * 1000.0,
                    1.0 / self.frame_time.max(1e-4)
                ));
                let rendering = self.renderer.rendering_resolution();
                ui.label(format!("Internal: {}x{}", rendering.width, rendering.height));
                ui.label(format!(
                    "Cells: {} / {} ({} culled)",
                    self.stats.cells_drawn,
                    self.stats.cells_total,
                    self.stats.cells_culled()
                ));
                ui.label(format!(
                    "Sky generation: {}{}",
                    self.stats.sky_generation,
                    if self.stats.underwater { " | underwater" } else { "" }
                ));
                ui.label(format!("Draws: {}", self.backend.draw_count()));

                ui.separator();
                let toggles = self.renderer.toggles_mut();
                ui.checkbox(&mut toggles.terrain, "Terrain");
                ui.checkbox(&mut toggles.ocean, "Ocean");
                ui.checkbox(&mut toggles.sky, "Sky");
                ui.checkbox(&mut toggles.wireframe, "Wireframe (L)");
                ui.checkbox(&mut toggles.stop_time, "Stop time (P)");

                ui.separator();
                ui.label("Light direction:");
                let mut light = self.renderer.light_direction().to_array();
                let old_light = light;
                ui.horizontal(|ui| {
                    for (value, prefix) in light.iter_mut().zip(["X: ", "Y: ", "Z: "]) {
                        ui.add(egui::DragValue::new(value).prefix(prefix).speed(0.01));
                    }
                });
                if light != old_light && Vec3::from_array(light).length_squared() > f32::EPSILON
                {
                    self.renderer.set_light_direction(Vec3::from_array(light));
                }

                ui.separator();
                egui::CollapsingHeader::new("Tessellation").show(ui, |ui| {
                    let tess = self.renderer.tessellation_mut();
                    let keep = egui::SliderClamping::Edits;
                    ui.add(
                        egui::Slider::new(&mut tess.max_level_x, 0.0..=7.0)
                            .clamping(keep)
                            .text("Max level X"),
                    );
                    ui.add(
                        egui::Slider::new(&mut tess.max_level_y, 1.0..=128.0)
                            .clamping(keep)
                            .text("Max level Y"),
                    );
                    ui.add(
                        egui::Slider::new(&mut tess.distance_scale, 0.5..=24.0)
                            .clamping(keep)
                            .text("Distance scale"),
                    );
                });

                egui::CollapsingHeader::new("Waves")
                    .default_open(true)
                    .show(ui, |ui| {
                        ui.label(format!(
                            "{} active, displacement {:.3}",
                            self.renderer.waves().active_count(),
                            self.renderer.waves().total_displacement_factor()
                        ));
                        if ui.button("Regenerate (R)").clicked() {
                            self.regenerate_waves();
                        }
                        let waves = *self.renderer.waves().waves();
                        for (index, wave) in waves.iter().enumerate() {
                            let mut edited = *wave;
                            egui::CollapsingHeader::new(format!("Wave {index}"))
                                .show(ui, |ui| wave_fields(ui, &mut edited));
                            if edited != *wave {
                                if let Err(e) =
                                    self.renderer
                                        .edit_wave(&mut self.backend, index, |w| *w = edited)
                                {
                                    tracing::warn!(index, "wave edit failed: {e}");
                                }
                            }
                        }
                    });

                ui.separator();
                ui.small("F1: Panel | RMB: Look | WASD: Move | Shift: Fast");
            });
    }
}

/// Editors for one wave. Values are never clamped, so showing a wave leaves it untouched.
fn wave_fields(ui: &mut egui::Ui, wave: &mut Wave) {
    let mut active = wave.is_active();
    if ui.checkbox(&mut active, "Active").changed() {
        wave.set_active(active);
    }
    let mut amplitude = wave.amplitude();
    if ui
        .add(egui::DragValue::new(&mut amplitude).prefix("A: ").speed(0.001))
        .changed()
    {
        wave.set_amplitude(amplitude.max(0.0));
    }
    let mut steepness = wave.steepness();
    if ui
        .add(egui::DragValue::new(&mut steepness).prefix("Q: ").speed(0.01))
        .changed()
    {
        wave.set_steepness(steepness.max(0.0));
    }
    let mut frequency = wave.frequency();
    if ui
        .add(egui::DragValue::new(&mut frequency).prefix("w: ").speed(0.01))
        .changed()
    {
        wave.set_frequency(frequency.max(0.0));
    }
    let mut phase = wave.phase();
    if ui
        .add(egui::DragValue::new(&mut phase).prefix("phi: ").speed(0.01))
        .changed()
    {
        wave.set_phase(phase);
    }
    let mut angle = wave.angle();
    ui.horizontal(|ui| {
        ui.label("Angle:");
        if ui.drag_angle(&mut angle).changed() {
            wave.set_angle(angle);
        }
    });
}

struct GpuApp {
    config: IslandConfig,
    assets: PathBuf,
    window: Option<Arc<Window>>,
    surface: Option<wgpu::Surface<'static>>,
    surface_config: Option<wgpu::SurfaceConfiguration>,
    scene: Option<Scene>,
    egui_ctx: EguiContext,
    egui_winit: Option<egui_winit::State>,
    egui_renderer: Option<egui_wgpu::Renderer>,
    init_error: Option<anyhow::Error>,
}

impl GpuApp {
    fn new(config: IslandConfig, assets: PathBuf) -> Self {
        Self {
            config,
            assets,
            window: None,
            surface: None,
            surface_config: None,
            scene: None,
            egui_ctx: EguiContext::default(),
            egui_winit: None,
            egui_renderer: None,
            init_error: None,
        }
    }

    fn init(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let rendering = &self.config.rendering;
        let mut attrs = Window::default_attributes()
            .with_title("Tidewater")
            .with_inner_size(PhysicalSize::new(
                rendering.screen_resolution.width,
                rendering.screen_resolution.height,
            ));
        if rendering.fullscreen {
            attrs = attrs.with_fullscreen(Some(Fullscreen::Borderless(None)));
        }
        let window = Arc::new(event_loop.create_window(attrs)?);

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });
        let surface = instance.create_surface(window.clone())?;
        let (adapter, device, queue) = pollster::block_on(request_device(&instance, Some(&surface)))?;

        // The tonemap pass picks the sRGB view itself, so configure the linear format.
        let size = window.inner_size();
        let caps = surface.get_capabilities(&adapter);
        let format = caps
            .formats
            .iter()
            .copied()
            .find(|f| !f.is_srgb())
            .or_else(|| caps.formats.first().copied())
            .context("surface reports no formats")?;
        let view_formats = [format.add_srgb_suffix(), format.remove_srgb_suffix()]
            .into_iter()
            .filter(|f| *f != format)
            .collect();
        let surface_config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: if rendering.vsync {
                wgpu::PresentMode::AutoVsync
            } else {
                wgpu::PresentMode::AutoNoVsync
            },
            alpha_mode: caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats,
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &surface_config);

        let egui_renderer = egui_wgpu::Renderer::new(&device, format, None, 1, false);
        let mut backend = WgpuBackend::new(device, queue);

        let mut config = self.config.clone();
        config.rendering.screen_resolution = Resolution::new(surface_config.width, surface_config.height);
        let mut resources = assets::load(&self.assets, config.terrain_seed)?;
        let terrain = ProceduralTerrain::new(
            &mut backend,
            TerrainParams {
                resolution: config.terrain_resolution,
                seed: config.terrain_seed,
                ..Default::default()
            },
        )?;
        let renderer =
            IslandRenderer::with_gaussian_blur(&mut backend, &mut resources, Box::new(terrain), &config)?;

        let egui_winit = egui_winit::State::new(
            self.egui_ctx.clone(),
            egui::ViewportId::ROOT,
            &window,
            Some(window.scale_factor() as f32),
            None,
            None,
        );

        tracing::info!(
            width = surface_config.width,
            height = surface_config.height,
            ?format,
            "island ready"
        );

        let now = Instant::now();
        self.scene = Some(Scene {
            backend,
            renderer,
            camera: FlyCamera::default(),
            stats: FrameStats::default(),
            keys_held: HashSet::new(),
            mouse_captured: false,
            show_panel: true,
            start: now,
            last_frame: now,
            frame_time: 0.0,
        });
        self.window = Some(window);
        self.surface = Some(surface);
        self.surface_config = Some(surface_config);
        self.egui_winit = Some(egui_winit);
        self.egui_renderer = Some(egui_renderer);
        Ok(())
    }

    fn resize(&mut self, new_size: PhysicalSize<u32>) {
        let requested = Resolution::new(new_size.width, new_size.height);
        if let (Some(window), Some(fixed)) = (
            &self.window,
            self.config.rendering.constrain_window(requested),
        ) {
            // Another Resized arrives once the window manager applies the size.
            let _ = window.request_inner_size(PhysicalSize::new(fixed.width, fixed.height));
            return;
        }

        let (Some(surface), Some(surface_config), Some(scene)) =
            (&self.surface, &mut self.surface_config, &mut self.scene)
        else {
            return;
        };
        surface_config.width = new_size.width.max(1);
        surface_config.height = new_size.height.max(1);
        surface.configure(scene.backend.device(), surface_config);

        let display = Resolution::new(surface_config.width, surface_config.height);
        let mut rendering = self.config.rendering.clone();
        rendering.screen_resolution = display;
        scene.renderer.set_display_resolution(display);
        if let Err(e) = scene
            .renderer
            .resize(&mut scene.backend, rendering.rendering_resolution())
        {
            tracing::error!("resize failed: {e}");
        }
    }

    fn redraw(&mut self) {
        let (Some(window), Some(surface), Some(surface_config), Some(scene)) = (
            &self.window,
            &self.surface,
            &self.surface_config,
            &mut self.scene,
        ) else {
            return;
        };

        let now = Instant::now();
        let elapsed = now - scene.last_frame;
        if self.config.rendering.half_rate && elapsed < HALF_RATE_INTERVAL {
            return;
        }
        let dt = elapsed.as_secs_f32().min(0.1);
        scene.last_frame = now;
        scene.frame_time = dt;
        scene.update(dt);

        let output = match surface.get_current_texture() {
            Ok(t) => t,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                surface.configure(scene.backend.device(), surface_config);
                return;
            }
            Err(e) => {
                tracing::error!("surface error: {e}");
                return;
            }
        };

        let aspect = surface_config.width as f32 / surface_config.height.max(1) as f32;
        let camera = scene.camera.camera(aspect);
        scene.backend.begin_frame(&output.texture);
        scene.stats = scene
            .renderer
            .draw(&mut scene.backend, &camera, scene.start.elapsed().as_secs_f32());
        scene.backend.finish_frame();

        let (Some(egui_winit), Some(egui_renderer)) = (&mut self.egui_winit, &mut self.egui_renderer)
        else {
            output.present();
            return;
        };
        let raw_input = egui_winit.take_egui_input(window);
        let full_output = self.egui_ctx.run(raw_input, |ctx| {
            scene.draw_ui(ctx);
        });
        egui_winit.handle_platform_output(window, full_output.platform_output);

        let paint_jobs = self
            .egui_ctx
            .tessellate(full_output.shapes, full_output.pixels_per_point);
        let screen_descriptor = egui_wgpu::ScreenDescriptor {
            size_in_pixels: [surface_config.width, surface_config.height],
            pixels_per_point: full_output.pixels_per_point,
        };

        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let (device, queue) = (scene.backend.device(), scene.backend.queue());
        for (id, image_delta) in &full_output.textures_delta.set {
            egui_renderer.update_texture(device, queue, *id, image_delta);
        }
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("egui_encoder"),
        });
        egui_renderer.update_buffers(device, queue, &mut encoder, &paint_jobs, &screen_descriptor);
        {
            let mut pass = encoder
                .begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some("egui_pass"),
                    color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                        view: &view,
                        resolve_target: None,
                        ops: wgpu::Operations {
                            load: wgpu::LoadOp::Load,
                            store: wgpu::StoreOp::Store,
                        },
                    })],
                    depth_stencil_attachment: None,
                    ..Default::default()
                })
                .forget_lifetime();
            egui_renderer.render(&mut pass, &paint_jobs, &screen_descriptor);
        }
        queue.submit(std::iter::once(encoder.finish()));
        for id in &full_output.textures_delta.free {
            egui_renderer.free_texture(id);
        }

        output.present();
    }
}

impl ApplicationHandler for GpuApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        if let Err(e) = self.init(event_loop) {
            tracing::error!("startup failed: {e:#}");
            self.init_error = Some(e);
            event_loop.exit();
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        if let (Some(egui_winit), Some(window)) = (&mut self.egui_winit, &self.window) {
            if egui_winit.on_window_event(window, &event).consumed {
                return;
            }
        }

        match event {
            WindowEvent::CloseRequested => {
                if let Some(mut scene) = self.scene.take() {
                    scene.renderer.clean(&mut scene.backend);
                }
                event_loop.exit();
            }
            WindowEvent::Resized(new_size) => self.resize(new_size),
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(key),
                        state: key_state,
                        repeat: false,
                        ..
                    },
                ..
            } => {
                if key == KeyCode::Escape {
                    event_loop.exit();
                    return;
                }
                if let Some(scene) = &mut self.scene {
                    scene.handle_key(key, key_state == ElementState::Pressed);
                }
            }
            WindowEvent::MouseInput {
                button: MouseButton::Right,
                state: btn_state,
                ..
            } => {
                if let (Some(scene), Some(window)) = (&mut self.scene, &self.window) {
                    scene.mouse_captured = btn_state == ElementState::Pressed;
                    window.set_cursor_visible(!scene.mouse_captured);
                }
            }
            WindowEvent::RedrawRequested => self.redraw(),
            _ => {}
        }
    }

    fn device_event(
        &mut self,
        _event_loop: &ActiveEventLoop,
        _device_id: winit::event::DeviceId,
        event: DeviceEvent,
    ) {
        if let (DeviceEvent::MouseMotion { delta }, Some(scene)) = (event, &mut self.scene) {
            if scene.mouse_captured {
                scene.camera.rotate(delta.0 as f32, delta.1 as f32);
            }
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    let config = cli.island_config()?;
    tracing::info!(
        width = config.rendering.screen_resolution.width,
        height = config.rendering.screen_resolution.height,
        internal = ?config.rendering.internal_vertical_resolution,
        "tidewater-desktop starting"
    );

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = GpuApp::new(config, cli.assets);
    event_loop.run_app(&mut app)?;

    match app.init_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
