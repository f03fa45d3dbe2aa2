//! Crate-wide error taxonomy.

use crate::scene::SceneState;

/// Errors the harness can produce.
///
/// Setup errors (shader compile/link, framebuffer validation, unknown scene
/// keys) are fatal to the operation that produced them. Per-frame draw errors
/// are reported by [`Game`](crate::Game) and stop the offending scene without
/// taking the process down.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An asset failed to fetch or decode, or a bundle lookup missed.
    #[error("asset '{id}' failed to load: {reason}")]
    AssetLoad { id: String, reason: String },

    /// WGSL validation rejected a shader module.
    #[error("shader '{label}' failed to compile ({stage} stage): {diagnostics}")]
    ShaderCompile {
        label: String,
        stage: &'static str,
        diagnostics: String,
    },

    /// Pipeline creation rejected a program (stage interface mismatch,
    /// missing entry point, incompatible targets).
    #[error("program '{label}' failed to link: {diagnostics}")]
    ShaderLink { label: String, diagnostics: String },

    /// A render target's attachments cannot form a usable framebuffer.
    #[error("render target '{label}' is incomplete: {issue}")]
    FramebufferIncomplete {
        label: String,
        issue: FramebufferIssue,
    },

    /// A lifecycle method was invoked out of order.
    #[error("scene '{scene}' received '{attempted}' while {state:?}")]
    InvalidLifecycle {
        scene: String,
        state: SceneState,
        attempted: &'static str,
    },

    /// A scene key was requested that no factory was registered for.
    #[error("no scene registered under '{0}'")]
    UnknownScene(String),

    /// A program was bound with a declared texture slot still empty.
    #[error("program '{label}': texture slot '{slot}' has no texture bound")]
    TextureUnbound { label: String, slot: String },

    /// A mesh was drawn before any vertex data was uploaded, or an unknown
    /// stream name was addressed.
    #[error("mesh '{label}': {reason}")]
    MeshNotReady { label: String, reason: String },

    /// The GPU stack could not be brought up: no surface, no compatible
    /// adapter, or the device request was refused.
    #[error("gpu initialization failed: {0}")]
    GpuInit(String),

    /// The surface was lost or failed to provide a frame.
    #[error("surface error: {0}")]
    Surface(#[from] wgpu::SurfaceError),

    /// The windowing event loop failed to start or run.
    #[error("event loop error: {0}")]
    EventLoop(#[from] winit::error::EventLoopError),
}

/// Why a render target failed completeness validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FramebufferIssue {
    #[error("no attachments")]
    MissingAttachment,
    #[error("attachment '{attachment}' is {found:?}, expected {expected:?}")]
    DimensionMismatch {
        attachment: String,
        expected: (u32, u32),
        found: (u32, u32),
    },
    #[error("attachment '{attachment}' was created without RENDER_ATTACHMENT usage")]
    NotRenderable { attachment: String },
    #[error("cube face {width}x{height} is not square")]
    NonSquareCubeFace { width: u32, height: u32 },
    #[error("attachment '{attachment}' sample count {found} does not match {expected}")]
    SampleCountMismatch {
        attachment: String,
        expected: u32,
        found: u32,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Shorthand for asset failures, the most commonly constructed variant.
    pub fn asset(id: impl Into<String>, reason: impl ToString) -> Self {
        Error::AssetLoad {
            id: id.into(),
            reason: reason.to_string(),
        }
    }
}
