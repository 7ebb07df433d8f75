//! vantage
//!
//! A minimal cross-platform glTF scene viewer built on wgpu. The crate sets up
//! a renderer surface, a perspective camera with orbit controls, a lit ground
//! plane with shadow mapping, loads a single glTF model asynchronously and
//! runs a continuous render loop. Native windows and WASM canvases are both
//! supported through the same code paths.
//!
//! High-level modules
//! - `camera`: camera, projection and the orbit controller with its uniforms
//! - `config`: the viewer configuration struct and its defaults
//! - `context`: central GPU context that owns device/queue/pipelines
//! - `loader`: asynchronous model loading and scene integration
//! - `mesh`: CPU mesh data and its GPU counterpart
//! - `pipelines`: render pipeline construction (scene, shadow, light data)
//! - `render`: frame composition (shadow pass + main pass)
//! - `scene`: the scene graph (nodes, transforms, ground plane)
//! - `viewer`: the application event loop
//!

pub mod camera;
pub mod config;
pub mod context;
pub mod loader;
pub mod mesh;
pub mod pipelines;
pub mod render;
pub mod resources;
pub mod scene;
pub mod texture;
pub mod viewer;

// Re-exports commonly used types for convenience in downstream code.
pub use cgmath::{Deg, Point3, Quaternion, Rad, Vector3};
pub use winit::event::DeviceEvent;
pub use winit::event::WindowEvent;

pub use config::ViewerConfig;
pub use viewer::run;
