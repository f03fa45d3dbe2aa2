//! # Proscenium
//!
//! **A minimal real-time rendering harness over wgpu.**
//!
//! Structure a program as scenes with an explicit lifecycle
//! (`load -> start -> draw -> end`), load assets asynchronously while the
//! previous scene keeps drawing, and write GL-flavored rendering code
//! (shader programs with by-name uniforms, multi-stream meshes, offscreen
//! targets) on top of a modern GPU API.
//!
//! ## Quick Start
//!
//! ```no_run
//! use proscenium::*;
//!
//! struct Triangle;
//!
//! impl Scene for Triangle {
//!     fn start(&mut self, _gpu: &GpuContext, _assets: &AssetBundle) -> Result<()> {
//!         Ok(())
//!     }
//!
//!     fn draw(&mut self, _ctx: &mut FrameContext<'_>, _dt: f32) -> Result<()> {
//!         Ok(())
//!     }
//! }
//!
//! fn main() -> Result<()> {
//!     let mut game = Game::new(GameConfig::default());
//!     game.add_scenes(SceneRegistry::new().with("triangle", || Triangle));
//!     game.run("triangle")
//! }
//! ```
//!
//! ## Design notes
//!
//! - **Fail fast** — a bad shader, a missing asset, or an incomplete render
//!   target surfaces as a descriptive [`Error`] at creation time, not as a
//!   blank frame later.
//! - **Scenes own their resources** — everything a scene allocates in
//!   `start` is released in `end`; nothing leaks across a switch.
//! - **Loading never blocks drawing** — the active scene keeps rendering
//!   while the next scene's assets resolve on worker threads.

mod camera;
mod camera_controller;
mod error;
mod game;
mod gpu;
mod input;
mod loader;
mod mesh;
mod mesh_utils;
mod postprocess;
mod scene;
mod shader;
mod target;
mod texture;

pub use camera::{Camera, Projection};
pub use camera_controller::FlyCameraController;
pub use error::{Error, FramebufferIssue, Result};
pub use game::{FrameContext, Game, GameConfig};
pub use gpu::GpuContext;
pub use input::Input;
pub use loader::{AssetBundle, AssetKind, AssetPayload, LoadBatch, Manifest, ResourceLoader};
pub use mesh::{Mesh, StreamLayout, UsageHint};
pub use mesh_utils::{MeshData, cube, from_obj_text, plane, sphere, standard_streams};
pub use postprocess::{EffectInput, GeometryBuffers, PostEffect, PostProcessPass};
pub use scene::{Lifecycle, Scene, SceneRegistry, SceneState};
pub use shader::{
    PipelineDesc, ShaderProgram, ShaderStage, TextureSampleKind, TextureSlot, UniformLayout,
    UniformType, UniformValue, build_program,
};
pub use target::{AttachmentDesc, CubemapCapture, RenderTarget, RenderTargetDesc};
pub use texture::{Cubemap, MipmapGenerator, Texture, full_mip_chain};

// Re-export glam math types for convenience
pub use glam::{Mat4, Quat, Vec2, Vec3, Vec4};

// Re-export commonly used winit types for convenience
pub use winit::event::MouseButton;
pub use winit::keyboard::KeyCode;
