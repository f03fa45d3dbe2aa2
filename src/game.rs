//! The host application: window, frame clock, and scene switching.
//!
//! [`Game`] owns the winit loop, the [`GpuContext`], input state, the scene
//! registry, and at most one active scene plus one pending switch. Scene
//! switches are asynchronous: the incoming scene's manifest loads in the
//! background while the outgoing scene keeps drawing, and requesting another
//! switch drops the in-flight one — its [`LoadBatch`] goes with it, so a
//! superseded scene can never be started by a completion that arrives late.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use winit::application::ApplicationHandler;
use winit::event::{DeviceEvent, DeviceId, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::{Window, WindowId};

use crate::error::{Error, Result};
use crate::gpu::GpuContext;
use crate::input::Input;
use crate::loader::{AssetBundle, LoadBatch, ResourceLoader};
use crate::scene::{Lifecycle, Scene, SceneRegistry};

/// Everything a scene sees during `draw`.
pub struct FrameContext<'a> {
    pub gpu: &'a GpuContext,
    pub input: &'a Input,
    /// This frame's swapchain view. Scenes are responsible for covering it.
    pub surface_view: &'a wgpu::TextureView,
    /// Seconds since the game started.
    pub time: f32,
}

/// Startup configuration.
#[derive(Clone, Debug)]
pub struct GameConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    /// Root directory manifest paths resolve against.
    pub asset_root: PathBuf,
    /// What the screen shows when no scene is running.
    pub clear_color: wgpu::Color,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            title: "proscenium".into(),
            width: 1280,
            height: 720,
            asset_root: PathBuf::from("."),
            clear_color: wgpu::Color {
                r: 0.05,
                g: 0.05,
                b: 0.08,
                a: 1.0,
            },
        }
    }
}

struct ActiveScene {
    scene: Box<dyn Scene>,
    lifecycle: Lifecycle,
}

struct PendingSwitch {
    scene: Box<dyn Scene>,
    lifecycle: Lifecycle,
    batch: LoadBatch,
}

enum SwitchOutcome {
    Idle,
    Ready {
        scene: Box<dyn Scene>,
        lifecycle: Lifecycle,
        bundle: AssetBundle,
    },
    Failed {
        name: String,
        error: Error,
    },
}

/// Holds the at-most-one in-flight scene switch.
///
/// Replacing the pending slot drops the previous batch, disconnecting its
/// channel; that drop is the entire stale-completion guard.
#[derive(Default)]
struct SceneSwitcher {
    pending: Option<PendingSwitch>,
}

impl SceneSwitcher {
    fn request(
        &mut self,
        name: &str,
        mut scene: Box<dyn Scene>,
        loader: &ResourceLoader,
    ) -> Result<()> {
        let mut lifecycle = Lifecycle::new(name);
        lifecycle.begin_loading()?;
        let manifest = scene.load();
        log::info!("scene '{}': loading {} asset(s)", name, manifest.len());
        let batch = loader.begin(&manifest);

        if let Some(old) = self.pending.replace(PendingSwitch {
            scene,
            lifecycle,
            batch,
        }) {
            log::info!(
                "scene '{}': switch superseded before its assets resolved",
                old.lifecycle.name()
            );
        }
        Ok(())
    }

    fn poll(&mut self) -> SwitchOutcome {
        let resolved = match self.pending.as_mut().and_then(|p| p.batch.poll()) {
            Some(result) => result,
            None => return SwitchOutcome::Idle,
        };

        // The batch resolved one way or the other; the slot empties now.
        let Some(PendingSwitch {
            scene,
            mut lifecycle,
            ..
        }) = self.pending.take()
        else {
            return SwitchOutcome::Idle;
        };

        match resolved {
            Ok(bundle) => match lifecycle.mark_ready() {
                Ok(()) => SwitchOutcome::Ready {
                    scene,
                    lifecycle,
                    bundle,
                },
                Err(error) => SwitchOutcome::Failed {
                    name: lifecycle.name().to_string(),
                    error,
                },
            },
            Err(error) => SwitchOutcome::Failed {
                name: lifecycle.name().to_string(),
                error,
            },
        }
    }

    fn is_pending(&self) -> bool {
        self.pending.is_some()
    }
}

/// The application shell driving scenes.
pub struct Game {
    config: GameConfig,
    registry: SceneRegistry,
    loader: ResourceLoader,
    switcher: SceneSwitcher,
    window: Option<Arc<Window>>,
    gpu: Option<GpuContext>,
    input: Input,
    active: Option<ActiveScene>,
    queued_scene: Option<String>,
    start_time: Instant,
    last_frame: Option<Instant>,
}

impl Game {
    pub fn new(config: GameConfig) -> Self {
        let loader = ResourceLoader::new(config.asset_root.clone());
        Self {
            config,
            registry: SceneRegistry::new(),
            loader,
            switcher: SceneSwitcher::default(),
            window: None,
            gpu: None,
            input: Input::new(),
            active: None,
            queued_scene: None,
            start_time: Instant::now(),
            last_frame: None,
        }
    }

    /// Merge a registry of scene factories into this game.
    pub fn add_scenes(&mut self, registry: SceneRegistry) {
        self.registry.merge(registry);
    }

    /// Request a switch to the named scene. Takes effect at the start of
    /// the next frame; a later request overrides an earlier one.
    pub fn queue_scene(&mut self, name: impl Into<String>) {
        self.queued_scene = Some(name.into());
    }

    /// Initialize logging, open the window, and drive frames until the
    /// window closes. `initial_scene` must be registered.
    pub fn run(mut self, initial_scene: &str) -> Result<()> {
        let _ = env_logger::Builder::from_env(
            env_logger::Env::default().default_filter_or("info"),
        )
        .try_init();

        if !self.registry.contains(initial_scene) {
            return Err(Error::UnknownScene(initial_scene.to_string()));
        }
        self.queued_scene = Some(initial_scene.to_string());

        let event_loop = EventLoop::new()?;
        event_loop.set_control_flow(ControlFlow::Poll);
        event_loop.run_app(&mut self)?;
        Ok(())
    }

    fn begin_queued_switch(&mut self) {
        let Some(name) = self.queued_scene.take() else {
            return;
        };
        let scene = match self.registry.create(&name) {
            Ok(scene) => scene,
            Err(e) => {
                log::error!("scene switch refused: {}", e);
                return;
            }
        };
        if let Err(e) = self.switcher.request(&name, scene, &self.loader) {
            log::error!("scene switch refused: {}", e);
        }
    }

    fn end_active(&mut self, gpu: &GpuContext) {
        if let Some(mut active) = self.active.take() {
            if let Err(e) = active.lifecycle.mark_ended() {
                log::error!("{}", e);
            }
            active.scene.end(gpu);
            log::info!("scene '{}': ended", active.lifecycle.name());
        }
    }

    fn apply_switch_outcome(&mut self) {
        if self.gpu.is_none() {
            return;
        }
        match self.switcher.poll() {
            SwitchOutcome::Idle => {}
            SwitchOutcome::Failed { name, error } => {
                log::error!("scene '{}': load failed, staying put: {}", name, error);
            }
            SwitchOutcome::Ready {
                mut scene,
                mut lifecycle,
                bundle,
            } => {
                // Taken out so end_active can borrow self mutably.
                let Some(gpu) = self.gpu.take() else {
                    return;
                };
                self.end_active(&gpu);

                match scene.start(&gpu, &bundle) {
                    Ok(()) => {
                        if let Err(e) = lifecycle.begin_running() {
                            log::error!("{}", e);
                        } else {
                            log::info!("scene '{}': running", lifecycle.name());
                            self.active = Some(ActiveScene { scene, lifecycle });
                        }
                    }
                    Err(e) => {
                        log::error!("scene '{}': start failed: {}", lifecycle.name(), e);
                        let _ = lifecycle.mark_ended();
                        scene.end(&gpu);
                    }
                }
                self.gpu = Some(gpu);
            }
        }
    }

    fn redraw(&mut self) {
        self.begin_queued_switch();
        self.apply_switch_outcome();

        let now = Instant::now();
        let dt = self
            .last_frame
            .map(|prev| (now - prev).as_secs_f32())
            .unwrap_or(0.0);
        self.last_frame = Some(now);

        let Some(gpu) = self.gpu.as_ref() else {
            return;
        };

        let output = match gpu.surface.get_current_texture() {
            Ok(output) => output,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                let (w, h) = (gpu.width(), gpu.height());
                if let Some(gpu) = self.gpu.as_mut() {
                    gpu.resize(w, h);
                }
                return;
            }
            Err(e) => {
                log::error!("surface error: {}", e);
                return;
            }
        };
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut draw_failed = false;
        match self.active.as_mut() {
            Some(active) => {
                let result = active.lifecycle.check_draw().and_then(|()| {
                    let mut ctx = FrameContext {
                        gpu,
                        input: &self.input,
                        surface_view: &view,
                        time: self.start_time.elapsed().as_secs_f32(),
                    };
                    active.scene.draw(&mut ctx, dt)
                });
                if let Err(e) = result {
                    log::error!("scene '{}': draw failed: {}", active.lifecycle.name(), e);
                    draw_failed = true;
                }
            }
            None => {
                // Nothing running (startup, or a failed switch): hold the
                // clear color so the window doesn't show stale contents.
                let mut encoder =
                    gpu.device
                        .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                            label: Some("Idle Clear Encoder"),
                        });
                encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some("Idle Clear Pass"),
                    color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                        view: &view,
                        depth_slice: None,
                        resolve_target: None,
                        ops: wgpu::Operations {
                            load: wgpu::LoadOp::Clear(self.config.clear_color),
                            store: wgpu::StoreOp::Store,
                        },
                    })],
                    depth_stencil_attachment: None,
                    timestamp_writes: None,
                    occlusion_query_set: None,
                });
                gpu.queue.submit(std::iter::once(encoder.finish()));
            }
        }
        output.present();

        if draw_failed {
            // A failing scene is stopped rather than left to error every
            // frame; the process keeps running.
            let gpu = self.gpu.take();
            if let Some(gpu) = gpu {
                self.end_active(&gpu);
                self.gpu = Some(gpu);
            }
        }

        self.input.begin_frame();
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }
}

impl ApplicationHandler for Game {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        let attributes = Window::default_attributes()
            .with_title(self.config.title.clone())
            .with_inner_size(winit::dpi::LogicalSize::new(
                self.config.width,
                self.config.height,
            ));
        let window = Arc::new(
            event_loop
                .create_window(attributes)
                .expect("Failed to create window"),
        );

        match GpuContext::new(window.clone()) {
            Ok(gpu) => self.gpu = Some(gpu),
            Err(e) => {
                log::error!("{}", e);
                event_loop.exit();
                return;
            }
        }
        self.window = Some(window);
        self.start_time = Instant::now();
        self.last_frame = None;
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        self.input.handle_event(&event);
        match event {
            WindowEvent::CloseRequested => {
                if let Some(gpu) = self.gpu.take() {
                    self.end_active(&gpu);
                    self.gpu = Some(gpu);
                }
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                if let Some(gpu) = &mut self.gpu {
                    gpu.resize(size.width, size.height);
                }
            }
            WindowEvent::RedrawRequested => {
                self.redraw();
            }
            _ => {}
        }
    }

    fn device_event(&mut self, _event_loop: &ActiveEventLoop, _id: DeviceId, event: DeviceEvent) {
        self.input.handle_device_event(&event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::Manifest;
    use std::io::Write as _;
    use std::sync::Arc as StdArc;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct RecordingScene {
        manifest: Manifest,
        dropped: StdArc<AtomicBool>,
    }

    impl Drop for RecordingScene {
        fn drop(&mut self) {
            self.dropped.store(true, Ordering::SeqCst);
        }
    }

    impl Scene for RecordingScene {
        fn load(&mut self) -> Manifest {
            self.manifest.clone()
        }
        fn start(&mut self, _gpu: &GpuContext, _assets: &AssetBundle) -> Result<()> {
            Ok(())
        }
        fn draw(&mut self, _ctx: &mut FrameContext<'_>, _dt: f32) -> Result<()> {
            Ok(())
        }
    }

    fn loader_with_file(tag: &str) -> (ResourceLoader, Manifest) {
        let dir = std::env::temp_dir().join(format!("proscenium-game-{}-{}", tag, std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let mut f = std::fs::File::create(dir.join("asset.txt")).unwrap();
        f.write_all(b"payload").unwrap();
        let manifest = Manifest::new().with("asset", "asset.txt", crate::loader::AssetKind::Text);
        (ResourceLoader::new(dir), manifest)
    }

    #[test]
    fn superseded_switch_is_dropped_and_never_started() {
        let (loader, manifest) = loader_with_file("supersede");
        let first_dropped = StdArc::new(AtomicBool::new(false));
        let second_dropped = StdArc::new(AtomicBool::new(false));

        let mut switcher = SceneSwitcher::default();
        switcher
            .request(
                "first",
                Box::new(RecordingScene {
                    manifest: manifest.clone(),
                    dropped: first_dropped.clone(),
                }),
                &loader,
            )
            .unwrap();
        switcher
            .request(
                "second",
                Box::new(RecordingScene {
                    manifest,
                    dropped: second_dropped.clone(),
                }),
                &loader,
            )
            .unwrap();

        // The first scene (and its batch) died with the replacement.
        assert!(first_dropped.load(Ordering::SeqCst));
        assert!(!second_dropped.load(Ordering::SeqCst));

        // Only the second switch can ever resolve.
        let outcome = loop {
            match switcher.poll() {
                SwitchOutcome::Idle => std::thread::yield_now(),
                other => break other,
            }
        };
        match outcome {
            SwitchOutcome::Ready { lifecycle, bundle, .. } => {
                assert_eq!(lifecycle.name(), "second");
                assert_eq!(bundle.text("asset").unwrap(), "payload");
            }
            _ => panic!("expected the second switch to resolve"),
        }
        assert!(!switcher.is_pending());
    }

    #[test]
    fn failed_load_reports_and_clears_the_slot() {
        let (loader, _) = loader_with_file("fail");
        let manifest = Manifest::new().with("nope", "missing.txt", crate::loader::AssetKind::Text);
        let dropped = StdArc::new(AtomicBool::new(false));

        let mut switcher = SceneSwitcher::default();
        switcher
            .request(
                "broken",
                Box::new(RecordingScene {
                    manifest,
                    dropped: dropped.clone(),
                }),
                &loader,
            )
            .unwrap();

        let outcome = loop {
            match switcher.poll() {
                SwitchOutcome::Idle => std::thread::yield_now(),
                other => break other,
            }
        };
        match outcome {
            SwitchOutcome::Failed { name, error } => {
                assert_eq!(name, "broken");
                assert!(matches!(error, Error::AssetLoad { .. }));
            }
            _ => panic!("expected a failed switch"),
        }
        assert!(!switcher.is_pending());
        // The scene boxed into the failed switch is gone too.
        assert!(dropped.load(Ordering::SeqCst));
    }
}
