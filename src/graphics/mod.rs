//! Graphics backend seam. The session and frame code only ever sees this
//! trait; which device actually renders is picked once at startup.

pub mod headless;
#[cfg(feature = "render-wgpu")]
pub mod wgpu_backend;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::options::OptionsError;
use crate::runtime::SwapchainSpec;

pub use headless::HeadlessBackend;

pub type GraphicsResult<T> = Result<T, GraphicsError>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GraphicsError {
    #[error("{0} backend does not support swapchain format {1}")]
    UnsupportedFormat(&'static str, i64),
    #[error("unknown texture id {0}")]
    UnknownTexture(u64),
    #[error("unknown render target id {0}")]
    UnknownRenderTarget(u64),
    #[error("scene resources have not been prepared")]
    SceneNotPrepared,
    #[error("{0}")]
    Backend(&'static str),
}

/// Color texture formats a backend can render into. Swapchain negotiation
/// speaks native format codes; this is the typed form a backend uses once a
/// code has been accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureFormat {
    Rgba8Unorm,
    Rgba8Srgb,
    Bgra8Unorm,
    Bgra8Srgb,
}

// VkFormat codes, the native format vocabulary of Vulkan-backed runtimes.
pub const FORMAT_R8G8B8A8_UNORM: i64 = 37;
pub const FORMAT_R8G8B8A8_SRGB: i64 = 43;
pub const FORMAT_B8G8R8A8_UNORM: i64 = 44;
pub const FORMAT_B8G8R8A8_SRGB: i64 = 50;

/// Formats the renderers accept, most preferred first. sRGB comes first so a
/// runtime offering both picks the gamma-correct path.
pub const PREFERRED_COLOR_FORMATS: [i64; 4] = [
    FORMAT_B8G8R8A8_SRGB,
    FORMAT_R8G8B8A8_SRGB,
    FORMAT_B8G8R8A8_UNORM,
    FORMAT_R8G8B8A8_UNORM,
];

impl TextureFormat {
    pub fn from_vulkan(code: i64) -> Option<Self> {
        match code {
            FORMAT_R8G8B8A8_UNORM => Some(Self::Rgba8Unorm),
            FORMAT_R8G8B8A8_SRGB => Some(Self::Rgba8Srgb),
            FORMAT_B8G8R8A8_UNORM => Some(Self::Bgra8Unorm),
            FORMAT_B8G8R8A8_SRGB => Some(Self::Bgra8Srgb),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RenderTargetId(pub u64);

/// Opaque description of the graphics device handed to the runtime at
/// session creation. The runtime only needs to know which device the
/// compositor will share images with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionBinding {
    pub backend: &'static str,
    pub device_id: u64,
}

/// One cube instance, fully transformed for a single view.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CubeDraw {
    pub mvp: [[f32; 4]; 4],
}

pub trait GraphicsBackend: Send {
    fn label(&self) -> &'static str;

    /// Swapchain format codes this backend can render to, most preferred
    /// first. Used to negotiate against the runtime's advertised list.
    fn supported_color_formats(&self) -> &[i64];

    /// Translate a native format code into the backend's typed form, or
    /// `None` when the code is outside `supported_color_formats`.
    fn texture_format(&self, native_format: i64) -> Option<TextureFormat>;

    fn session_binding(&self) -> SessionBinding;

    /// Wrap runtime-owned swapchain images as backend textures, preserving
    /// image order.
    fn import_swapchain_images(
        &mut self,
        images: &[u64],
        spec: &SwapchainSpec,
    ) -> GraphicsResult<Vec<TextureId>>;

    fn create_render_target(
        &mut self,
        texture: TextureId,
        format: TextureFormat,
    ) -> GraphicsResult<RenderTargetId>;

    /// Build the pipeline and cube mesh buffers for the negotiated format.
    /// Must be called before the first `render_view`.
    fn prepare_scene(&mut self, color_format: TextureFormat) -> GraphicsResult<()>;

    /// Clear the target and draw the given cubes into it.
    fn render_view(
        &mut self,
        target: RenderTargetId,
        extent: [u32; 2],
        clear_color: [f32; 4],
        cubes: &[CubeDraw],
    ) -> GraphicsResult<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BackendKind {
    Headless,
    Wgpu,
}

impl BackendKind {
    pub fn from_name(name: &str) -> Result<Self, OptionsError> {
        match name.to_ascii_lowercase().as_str() {
            "headless" => Ok(Self::Headless),
            "wgpu" => Ok(Self::Wgpu),
            _ => Err(OptionsError::UnknownBackend(name.to_string())),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Headless => "headless",
            Self::Wgpu => "wgpu",
        }
    }
}

/// Instantiate the requested backend, or `None` when it is unavailable in
/// this build or failed to find a device. Callers decide whether that is
/// fatal; nothing backend-specific leaks past the trait object.
pub fn try_create_backend(kind: BackendKind) -> Option<Box<dyn GraphicsBackend>> {
    match kind {
        BackendKind::Headless => Some(Box::new(HeadlessBackend::default())),
        BackendKind::Wgpu => {
            #[cfg(feature = "render-wgpu")]
            {
                match wgpu_backend::WgpuBackend::initialize() {
                    Ok(backend) => Some(Box::new(backend)),
                    Err(err) => {
                        log::warn!("[graphics] wgpu backend failed to initialize: {err}");
                        None
                    }
                }
            }
            #[cfg(not(feature = "render-wgpu"))]
            {
                log::warn!(
                    "[graphics] wgpu backend requested but the 'render-wgpu' feature is disabled"
                );
                None
            }
        }
    }
}
