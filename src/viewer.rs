//! Application shell and event loop.
//!
//! The frame loop is redraw-driven: every `RedrawRequested` schedules the
//! next one, drains pending load events, advances the simulation by the
//! elapsed wall time and renders. All per-frame state updates live in
//! [`ViewerState::advance`] so they can run against a headless context in
//! principle; the winit plumbing only decides *when* a frame happens.

use std::sync::Arc;
use std::sync::mpsc::Receiver;

use cgmath::Vector3;
use instant::{Duration, Instant};
use winit::{
    application::ApplicationHandler,
    event::{DeviceEvent, DeviceId, MouseButton, WindowEvent},
    event_loop::{ActiveEventLoop, EventLoop},
    window::Window,
};

use crate::config::ViewerConfig;
use crate::context::Context;
use crate::loader::{self, LoadEvent, ProgressIndicator};
use crate::render;
use crate::scene::Scene;

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

/// Which pointer button is currently held. Left orbits, right pans.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
enum MouseButtonState {
    #[default]
    None,
    Left,
    Right,
}

/// Everything that exists once the window and GPU are up: the context, the
/// scene and the pending load channel.
pub struct ViewerState {
    ctx: Context,
    scene: Scene,
    /// Present while the model load is in flight; dropped once a terminal
    /// event arrived.
    load_events: Option<Receiver<LoadEvent>>,
    indicator: Box<dyn ProgressIndicator>,
    mouse: MouseButtonState,
}

impl ViewerState {
    async fn new(window: Arc<Window>, config: &ViewerConfig) -> anyhow::Result<Self> {
        let ctx = Context::new(window, config).await?;
        let scene = Scene::with_initial_contents(&config.ground, &config.light);

        #[cfg(not(target_arch = "wasm32"))]
        let indicator: Box<dyn ProgressIndicator> = Box::new(loader::LogIndicator);
        #[cfg(target_arch = "wasm32")]
        let indicator: Box<dyn ProgressIndicator> = Box::new(loader::DomIndicator {
            element_id: config.progress_element.clone(),
        });

        Ok(Self {
            ctx,
            scene,
            load_events: None,
            indicator,
            mouse: MouseButtonState::None,
        })
    }

    /// Drain pending load events. The channel is dropped after a terminal
    /// event, nothing arrives on it afterwards.
    fn poll_load_events(&mut self, model_offset: Vector3<f32>) {
        let Some(rx) = &self.load_events else {
            return;
        };
        let mut spent = false;
        while let Ok(event) = rx.try_recv() {
            if loader::apply_load_event(
                &mut self.scene,
                self.indicator.as_ref(),
                model_offset,
                event,
            ) {
                spent = true;
                break;
            }
        }
        if spent {
            self.load_events = None;
        }
    }

    /// Advance the viewer by `dt`: integrate load results, move the camera
    /// and refresh the scene's world transforms. Idempotent when nothing
    /// happened since the last call.
    fn advance(&mut self, dt: Duration, model_offset: Vector3<f32>) {
        self.poll_load_events(model_offset);

        let ctx = &mut self.ctx;
        ctx.camera.controller.update(&mut ctx.camera.camera, dt);
        ctx.camera
            .uniform
            .update_view_proj(&ctx.camera.camera, &ctx.projection);
        ctx.queue.write_buffer(
            &ctx.camera.buffer,
            0,
            bytemuck::cast_slice(&[ctx.camera.uniform]),
        );

        self.scene.update_world_transforms();
    }
}

pub struct Viewer {
    #[cfg(not(target_arch = "wasm32"))]
    async_runtime: tokio::runtime::Runtime,
    #[cfg(target_arch = "wasm32")]
    proxy: winit::event_loop::EventLoopProxy<ViewerEvent>,
    config: ViewerConfig,
    state: Option<ViewerState>,
    last_time: Instant,
}

/// User events. Only WASM needs one: GPU setup is async there and reports
/// back into the event loop once it finished.
pub enum ViewerEvent {
    Initialized(ViewerState),
}

impl Viewer {
    fn new(event_loop: &EventLoop<ViewerEvent>, config: ViewerConfig) -> anyhow::Result<Self> {
        #[cfg(target_arch = "wasm32")]
        let proxy = event_loop.create_proxy();
        #[cfg(not(target_arch = "wasm32"))]
        let _ = event_loop;

        Ok(Self {
            #[cfg(not(target_arch = "wasm32"))]
            async_runtime: tokio::runtime::Runtime::new()?,
            #[cfg(target_arch = "wasm32")]
            proxy,
            config,
            state: None,
            last_time: Instant::now(),
        })
    }
}

impl ApplicationHandler<ViewerEvent> for Viewer {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        #[allow(unused_mut)]
        let mut window_attributes = Window::default_attributes().with_title(&self.config.title);

        #[cfg(target_arch = "wasm32")]
        {
            use wasm_bindgen::JsCast;
            use winit::platform::web::WindowAttributesExtWebSys;

            const CANVAS_ID: &str = "canvas";

            let window = web_sys::window().unwrap_throw();
            let document = window.document().unwrap_throw();
            let canvas = document.get_element_by_id(CANVAS_ID).unwrap_throw();
            let html_canvas_element = canvas.unchecked_into();
            window_attributes = window_attributes.with_canvas(Some(html_canvas_element));
        }

        let window = Arc::new(event_loop.create_window(window_attributes).unwrap());

        #[cfg(not(target_arch = "wasm32"))]
        {
            let mut state = match self
                .async_runtime
                .block_on(ViewerState::new(window, &self.config))
            {
                Ok(state) => state,
                Err(e) => panic!("viewer initialization failed: {}", e),
            };
            state.load_events = Some(loader::begin_load(
                self.async_runtime.handle(),
                &self.config.asset_base,
                &self.config.model_file,
            ));
            state.ctx.window.request_redraw();
            self.last_time = Instant::now();
            self.state = Some(state);
        }

        #[cfg(target_arch = "wasm32")]
        {
            let proxy = self.proxy.clone();
            let config = self.config.clone();
            wasm_bindgen_futures::spawn_local(async move {
                let state = match ViewerState::new(window, &config).await {
                    Ok(state) => state,
                    Err(e) => panic!("viewer initialization failed: {}", e),
                };
                assert!(proxy.send_event(ViewerEvent::Initialized(state)).is_ok());
            });
        }
    }

    #[cfg(target_arch = "wasm32")]
    fn user_event(&mut self, _event_loop: &ActiveEventLoop, event: ViewerEvent) {
        match event {
            ViewerEvent::Initialized(mut state) => {
                // The canvas may have been laid out while the GPU came up.
                let size = state.ctx.window.inner_size();
                state.ctx.resize(size.width, size.height);
                state.load_events = Some(loader::begin_load(
                    &self.config.asset_base,
                    &self.config.model_file,
                ));
                state.ctx.window.request_redraw();
                self.last_time = Instant::now();
                self.state = Some(state);
            }
        }
    }

    fn device_event(
        &mut self,
        _event_loop: &ActiveEventLoop,
        _device_id: DeviceId,
        event: DeviceEvent,
    ) {
        let Some(state) = &mut self.state else {
            return;
        };
        if let DeviceEvent::MouseMotion { delta: (dx, dy) } = event {
            match state.mouse {
                MouseButtonState::Left => state.ctx.camera.controller.handle_mouse(dx, dy),
                MouseButtonState::Right => state.ctx.camera.controller.handle_pan(dx, dy),
                MouseButtonState::None => {}
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: winit::window::WindowId,
        event: WindowEvent,
    ) {
        let Some(state) = &mut self.state else {
            return;
        };

        state.ctx.camera.controller.handle_window_events(&event);

        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::Resized(size) => state.ctx.resize(size.width, size.height),
            WindowEvent::MouseInput {
                state: button_state,
                button,
                ..
            } => {
                state.mouse = match (button, button_state.is_pressed()) {
                    (MouseButton::Left, true) => MouseButtonState::Left,
                    (MouseButton::Right, true) => MouseButtonState::Right,
                    _ => MouseButtonState::None,
                };
            }
            WindowEvent::RedrawRequested => {
                // Keep the loop going.
                state.ctx.window.request_redraw();

                let dt = self.last_time.elapsed();
                self.last_time = Instant::now();
                state.advance(dt, self.config.model_offset);

                match render::render_frame(&state.ctx, &mut state.scene) {
                    Ok(()) => {}
                    // Reconfigure the surface if it's lost or outdated.
                    Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                        let size = state.ctx.window.inner_size();
                        state.ctx.resize(size.width, size.height);
                    }
                    Err(e) => log::error!("unable to render: {}", e),
                }
            }
            _ => {}
        }
    }
}

/// Build the event loop and run the viewer until the window closes.
pub fn run(config: ViewerConfig) -> anyhow::Result<()> {
    #[cfg(not(target_arch = "wasm32"))]
    {
        if let Err(e) = env_logger::try_init() {
            println!("Warning: Could not initialize logger: {}", e);
        }
    }

    #[cfg(target_arch = "wasm32")]
    {
        console_log::init_with_level(log::Level::Info).unwrap_throw();
    }

    let event_loop: EventLoop<ViewerEvent> = EventLoop::with_user_event().build()?;
    let mut app = Viewer::new(&event_loop, config)?;
    event_loop.run_app(&mut app)?;

    Ok(())
}

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(start)]
pub fn start() {
    if let Err(e) = run(ViewerConfig::default()) {
        log::error!("viewer exited with error: {}", e);
    }
}
