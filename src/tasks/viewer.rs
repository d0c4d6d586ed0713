use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use crossbeam_channel::Receiver;
use image::RgbaImage;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use wgpu::{self, SurfaceError};
use winit::{
    application::ApplicationHandler,
    dpi::{LogicalSize, PhysicalPosition, PhysicalSize},
    event::{ElementState, MouseButton, MouseScrollDelta, TouchPhase, WindowEvent},
    event_loop::{ActiveEventLoop, EventLoop},
    keyboard::{Key, NamedKey},
    window::{Fullscreen, Window, WindowAttributes},
};

use crate::config::Configuration;
use crate::events::LoaderEvent;
use crate::gallery::{CarouselEngine, ScreenSize};
use crate::render::{GalleryRenderer, RenderStyle};

/// Pixels of vertical scroll reported per wheel line.
const LINE_DELTA_PX: f32 = 100.0;

#[derive(Debug)]
enum ViewerEvent {
    Cancelled,
}

/// Converts a winit scroll delta to a DOM-style `deltaY` (positive scrolls down).
pub fn wheel_delta_y(delta: MouseScrollDelta) -> f32 {
    match delta {
        MouseScrollDelta::LineDelta(_, y) => -y * LINE_DELTA_PX,
        MouseScrollDelta::PixelDelta(p) => -p.y as f32,
    }
}

/// Screen size in logical pixels, the unit the responsive breakpoints use.
pub fn logical_screen(size: PhysicalSize<u32>, scale_factor: f64) -> ScreenSize {
    let logical: LogicalSize<f64> = size.to_logical(scale_factor);
    ScreenSize::new(logical.width.round() as u32, logical.height.round() as u32)
}

struct ViewerApp {
    cfg: Configuration,
    cancel: CancellationToken,
    engine: CarouselEngine,
    from_loader: Receiver<LoaderEvent>,
    window: Option<Arc<Window>>,
    surface: Option<wgpu::Surface<'static>>,
    surface_config: Option<wgpu::SurfaceConfiguration>,
    device: Option<wgpu::Device>,
    queue: Option<wgpu::Queue>,
    renderer: Option<GalleryRenderer>,
    /// Images that arrived before the renderer existed.
    pending_uploads: Vec<(usize, Arc<RgbaImage>)>,
    cursor_x: f32,
    touch_id: Option<u64>,
}

impl ViewerApp {
    fn new(
        cfg: Configuration,
        cancel: CancellationToken,
        engine: CarouselEngine,
        from_loader: Receiver<LoaderEvent>,
    ) -> Self {
        Self {
            cfg,
            cancel,
            engine,
            from_loader,
            window: None,
            surface: None,
            surface_config: None,
            device: None,
            queue: None,
            renderer: None,
            pending_uploads: Vec::new(),
            cursor_x: 0.0,
            touch_id: None,
        }
    }

    fn ensure_window(&mut self, event_loop: &ActiveEventLoop) -> Option<Arc<Window>> {
        if let Some(window) = self.window.as_ref() {
            return Some(window.clone());
        }

        let mut attrs = WindowAttributes::default().with_title(self.cfg.window.title.clone());
        if self.cfg.window.fullscreen {
            attrs = attrs.with_fullscreen(Some(Fullscreen::Borderless(None)));
        }
        match event_loop.create_window(attrs) {
            Ok(window) => {
                let window = Arc::new(window);
                self.window = Some(window.clone());
                Some(window)
            }
            Err(err) => {
                error!(error = %err, "failed to create gallery window");
                None
            }
        }
    }

    fn init_gpu(&mut self, window: Arc<Window>) -> Result<()> {
        let instance = wgpu::Instance::default();
        let surface = instance
            .create_surface(window.clone())
            .context("failed to create surface")?;
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        }))
        .context("failed to acquire GPU adapter")?;

        let caps = surface.get_capabilities(&adapter);
        let format = caps
            .formats
            .iter()
            .copied()
            .find(|fmt| fmt.is_srgb())
            .or_else(|| caps.formats.first().copied())
            .context("surface reports no supported formats")?;
        let alpha_mode = caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);

        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("gallery-device"),
            required_features: wgpu::Features::empty(),
            required_limits: adapter.limits(),
            ..Default::default()
        }))
        .context("failed to acquire GPU device")?;

        let size = window.inner_size();
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);
        info!(
            width = config.width,
            height = config.height,
            format = ?config.format,
            "gallery surface configured",
        );

        let background = self.cfg.window.background.linear();
        let style = RenderStyle {
            background: wgpu::Color {
                r: background.red as f64,
                g: background.green as f64,
                b: background.blue as f64,
                a: background.alpha as f64,
            },
            border_radius: self.cfg.border_radius,
        };
        let mut renderer = GalleryRenderer::new(
            &device,
            &queue,
            format,
            (config.width, config.height),
            self.engine.items(),
            style,
        );
        for (slot, image) in self.pending_uploads.drain(..) {
            renderer.upload_image(&device, &queue, slot, &image);
        }
        self.engine
            .resize(logical_screen(size, window.scale_factor()));

        self.surface = Some(surface);
        self.surface_config = Some(config);
        self.device = Some(device);
        self.queue = Some(queue);
        self.renderer = Some(renderer);
        Ok(())
    }

    fn handle_resize(&mut self, new_size: PhysicalSize<u32>) {
        let (Some(surface), Some(device), Some(config), Some(window)) = (
            self.surface.as_ref(),
            self.device.as_ref(),
            self.surface_config.as_mut(),
            self.window.as_ref(),
        ) else {
            return;
        };

        config.width = new_size.width.max(1);
        config.height = new_size.height.max(1);
        surface.configure(device, config);
        if let Some(renderer) = self.renderer.as_mut() {
            renderer.resize(device, (config.width, config.height));
        }
        self.engine
            .resize(logical_screen(new_size, window.scale_factor()));
        debug!(
            width = config.width,
            height = config.height,
            "gallery surface resized",
        );
    }

    /// Applies finished loads; never blocks.
    fn drain_loader(&mut self) {
        while let Ok(event) = self.from_loader.try_recv() {
            match event {
                LoaderEvent::Loaded(done) => {
                    let (w, h) = done.image.dimensions();
                    if !self.engine.apply_image(done.slot, done.generation, w, h) {
                        continue;
                    }
                    match (self.renderer.as_mut(), self.device.as_ref(), self.queue.as_ref()) {
                        (Some(renderer), Some(device), Some(queue)) => {
                            renderer.upload_image(device, queue, done.slot, &done.image);
                        }
                        _ => self.pending_uploads.push((done.slot, done.image)),
                    }
                }
                LoaderEvent::Failed(failed) => {
                    debug!(slot = failed.slot, source = %failed.source, reason = %failed.reason, "item left blank");
                }
            }
        }
    }

    fn draw(&mut self, event_loop: &ActiveEventLoop) {
        let (Some(surface), Some(device), Some(queue), Some(renderer), Some(window)) = (
            self.surface.as_ref(),
            self.device.as_ref(),
            self.queue.as_ref(),
            self.renderer.as_ref(),
            self.window.as_ref(),
        ) else {
            return;
        };

        let frame = match surface.get_current_texture() {
            Ok(frame) => frame,
            Err(SurfaceError::Outdated) | Err(SurfaceError::Lost) => {
                info!("gallery surface lost; reconfiguring");
                let size = window.inner_size();
                self.handle_resize(size);
                return;
            }
            Err(SurfaceError::OutOfMemory) => {
                error!("gallery surface out of memory; exiting event loop");
                self.shutdown(event_loop);
                return;
            }
            Err(SurfaceError::Timeout) => {
                warn!("gallery surface acquisition timed out");
                return;
            }
            Err(SurfaceError::Other) => {
                warn!("gallery surface reported an unknown error; retrying");
                let size = window.inner_size();
                self.handle_resize(size);
                return;
            }
        };

        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("gallery-encoder"),
        });

        let rendered = self.engine.frame(Instant::now(), |frame_view| {
            renderer.render(queue, &mut encoder, &view, &frame_view);
        });
        if rendered.is_none() {
            return;
        }

        queue.submit(std::iter::once(encoder.finish()));
        window.pre_present_notify();
        frame.present();
    }

    /// Tears down the engine and GPU state and leaves the event loop. Idempotent.
    fn shutdown(&mut self, event_loop: &ActiveEventLoop) {
        self.engine.teardown();
        self.cancel.cancel();
        self.renderer = None;
        self.surface = None;
        event_loop.exit();
    }

    fn pointer_x(&self, position: PhysicalPosition<f64>) -> f32 {
        let scale = self.window.as_ref().map_or(1.0, |w| w.scale_factor());
        position.to_logical::<f64>(scale).x as f32
    }
}

impl ApplicationHandler<ViewerEvent> for ViewerApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.cancel.is_cancelled() {
            self.shutdown(event_loop);
            return;
        }

        let Some(window) = self.ensure_window(event_loop) else {
            self.shutdown(event_loop);
            return;
        };

        if self.device.is_none() {
            if let Err(err) = self.init_gpu(window.clone()) {
                error!(error = ?err, "failed to initialize GPU state");
                self.shutdown(event_loop);
                return;
            }
        }

        window.request_redraw();
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        window_id: winit::window::WindowId,
        event: WindowEvent,
    ) {
        let Some(window) = self.window.as_ref() else {
            return;
        };
        if window.id() != window_id {
            return;
        }

        match event {
            WindowEvent::CloseRequested => {
                info!("gallery window close requested");
                self.shutdown(event_loop);
            }
            WindowEvent::KeyboardInput { event, .. }
                if event.state == ElementState::Pressed
                    && event.logical_key == Key::Named(NamedKey::Escape) =>
            {
                info!("escape pressed; closing gallery");
                self.shutdown(event_loop);
            }
            WindowEvent::Resized(new_size) => {
                self.handle_resize(new_size);
            }
            WindowEvent::ScaleFactorChanged { .. } => {
                let size = window.inner_size();
                self.handle_resize(size);
            }
            WindowEvent::CursorMoved { position, .. } => {
                self.cursor_x = self.pointer_x(position);
                self.engine.pointer_move(self.cursor_x);
            }
            WindowEvent::MouseInput {
                state,
                button: MouseButton::Left,
                ..
            } => match state {
                ElementState::Pressed => self.engine.pointer_down(self.cursor_x),
                ElementState::Released => self.engine.pointer_up(),
            },
            WindowEvent::MouseWheel { delta, .. } => {
                self.engine.wheel(wheel_delta_y(delta), Instant::now());
            }
            WindowEvent::Touch(touch) => {
                let x = self.pointer_x(touch.location);
                match touch.phase {
                    TouchPhase::Started if self.touch_id.is_none() => {
                        self.touch_id = Some(touch.id);
                        self.engine.pointer_down(x);
                    }
                    TouchPhase::Moved if self.touch_id == Some(touch.id) => {
                        self.engine.pointer_move(x);
                    }
                    TouchPhase::Ended | TouchPhase::Cancelled if self.touch_id == Some(touch.id) => {
                        self.touch_id = None;
                        self.engine.pointer_up();
                    }
                    _ => {}
                }
            }
            WindowEvent::RedrawRequested => {
                self.draw(event_loop);
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        self.drain_loader();
        if self.engine.is_alive() {
            if let Some(window) = self.window.as_ref() {
                window.request_redraw();
            }
        }
    }

    fn user_event(&mut self, event_loop: &ActiveEventLoop, event: ViewerEvent) {
        match event {
            ViewerEvent::Cancelled => {
                info!("gallery received cancellation event");
                self.shutdown(event_loop);
            }
        }
    }
}

/// Runs the windowed gallery on the current thread until the window closes or
/// `cancel` fires.
pub fn run_windowed(
    engine: CarouselEngine,
    from_loader: Receiver<LoaderEvent>,
    cancel: CancellationToken,
    cfg: Configuration,
) -> Result<()> {
    let event_loop = EventLoop::<ViewerEvent>::with_user_event()
        .build()
        .context("failed to build gallery event loop")?;
    let proxy = event_loop.create_proxy();

    let cancel_task = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            cancel.cancelled().await;
            let _ = proxy.send_event(ViewerEvent::Cancelled);
        })
    };

    let mut app = ViewerApp::new(cfg, cancel, engine, from_loader);
    let run_result = event_loop.run_app(&mut app);
    cancel_task.abort();

    run_result.context("gallery event loop failed")
}
