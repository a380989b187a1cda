//! Backend that validates and records draw calls without touching a GPU.
//! This is what CI and the default binary run; it keeps the whole frame loop
//! executable on machines with no graphics device at all.

use std::sync::{Arc, Mutex};

use crate::graphics::{
    CubeDraw, GraphicsBackend, GraphicsError, GraphicsResult, RenderTargetId, SessionBinding,
    TextureFormat, TextureId, PREFERRED_COLOR_FORMATS,
};
use crate::runtime::SwapchainSpec;

/// One completed `render_view` call.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewDrawRecord {
    pub target: RenderTargetId,
    pub extent: [u32; 2],
    pub clear_color: [f32; 4],
    pub cube_count: usize,
}

#[derive(Debug)]
struct HeadlessTexture {
    extent: [u32; 2],
    format: i64,
}

#[derive(Debug, Default)]
pub struct HeadlessBackend {
    textures: Vec<HeadlessTexture>,
    targets: Vec<TextureId>,
    scene_format: Option<TextureFormat>,
    draws: Arc<Mutex<Vec<ViewDrawRecord>>>,
}

impl HeadlessBackend {
    /// Shared handle onto the draw log. Clones stay valid after the backend
    /// is boxed up and handed to the frame loop.
    pub fn draw_log(&self) -> Arc<Mutex<Vec<ViewDrawRecord>>> {
        Arc::clone(&self.draws)
    }

    pub fn texture_count(&self) -> usize {
        self.textures.len()
    }
}

impl GraphicsBackend for HeadlessBackend {
    fn label(&self) -> &'static str {
        "headless"
    }

    fn supported_color_formats(&self) -> &[i64] {
        &PREFERRED_COLOR_FORMATS
    }

    fn texture_format(&self, native_format: i64) -> Option<TextureFormat> {
        TextureFormat::from_vulkan(native_format)
    }

    fn session_binding(&self) -> SessionBinding {
        SessionBinding {
            backend: "headless",
            device_id: 0,
        }
    }

    fn import_swapchain_images(
        &mut self,
        images: &[u64],
        spec: &SwapchainSpec,
    ) -> GraphicsResult<Vec<TextureId>> {
        if self.texture_format(spec.format).is_none() {
            return Err(GraphicsError::UnsupportedFormat("headless", spec.format));
        }
        let mut ids = Vec::with_capacity(images.len());
        for _ in images {
            let id = TextureId(self.textures.len() as u64);
            self.textures.push(HeadlessTexture {
                extent: [spec.width, spec.height],
                format: spec.format,
            });
            ids.push(id);
        }
        Ok(ids)
    }

    fn create_render_target(
        &mut self,
        texture: TextureId,
        format: TextureFormat,
    ) -> GraphicsResult<RenderTargetId> {
        let record = self
            .textures
            .get(texture.0 as usize)
            .ok_or(GraphicsError::UnknownTexture(texture.0))?;
        if self.texture_format(record.format) != Some(format) {
            return Err(GraphicsError::UnsupportedFormat("headless", record.format));
        }
        let id = RenderTargetId(self.targets.len() as u64);
        self.targets.push(texture);
        Ok(id)
    }

    fn prepare_scene(&mut self, color_format: TextureFormat) -> GraphicsResult<()> {
        self.scene_format = Some(color_format);
        Ok(())
    }

    fn render_view(
        &mut self,
        target: RenderTargetId,
        extent: [u32; 2],
        clear_color: [f32; 4],
        cubes: &[CubeDraw],
    ) -> GraphicsResult<()> {
        if self.scene_format.is_none() {
            return Err(GraphicsError::SceneNotPrepared);
        }
        let texture = self
            .targets
            .get(target.0 as usize)
            .ok_or(GraphicsError::UnknownRenderTarget(target.0))?;
        let stored = &self.textures[texture.0 as usize];
        log::trace!(
            "[graphics] headless draw: target={} extent={}x{} cubes={}",
            target.0,
            stored.extent[0],
            stored.extent[1],
            cubes.len()
        );
        let mut draws = self.draws.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        draws.push(ViewDrawRecord {
            target,
            extent,
            clear_color,
            cube_count: cubes.len(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graphics::FORMAT_B8G8R8A8_SRGB;

    fn spec() -> SwapchainSpec {
        SwapchainSpec {
            format: FORMAT_B8G8R8A8_SRGB,
            width: 1440,
            height: 1600,
            sample_count: 1,
        }
    }

    #[test]
    fn imports_one_texture_per_image() {
        let mut backend = HeadlessBackend::default();
        let ids = backend
            .import_swapchain_images(&[10, 11, 12], &spec())
            .expect("import succeeds");
        assert_eq!(ids.len(), 3);
        assert_eq!(backend.texture_count(), 3);
    }

    #[test]
    fn rejects_unknown_format_codes() {
        let mut backend = HeadlessBackend::default();
        let bad = SwapchainSpec { format: 999, ..spec() };
        assert_eq!(
            backend.import_swapchain_images(&[1], &bad),
            Err(GraphicsError::UnsupportedFormat("headless", 999))
        );
    }

    #[test]
    fn render_view_requires_a_prepared_scene() {
        let mut backend = HeadlessBackend::default();
        let textures = backend
            .import_swapchain_images(&[1], &spec())
            .expect("import succeeds");
        let target = backend
            .create_render_target(textures[0], TextureFormat::Bgra8Srgb)
            .expect("target creation succeeds");
        assert_eq!(
            backend.render_view(target, [1440, 1600], [0.0; 4], &[]),
            Err(GraphicsError::SceneNotPrepared)
        );
    }

    #[test]
    fn render_view_records_the_draw() {
        let mut backend = HeadlessBackend::default();
        let log = backend.draw_log();
        let textures = backend
            .import_swapchain_images(&[1], &spec())
            .expect("import succeeds");
        let target = backend
            .create_render_target(textures[0], TextureFormat::Bgra8Srgb)
            .expect("target creation succeeds");
        backend
            .prepare_scene(TextureFormat::Bgra8Srgb)
            .expect("prepare succeeds");

        let cube = CubeDraw {
            mvp: [[1.0, 0.0, 0.0, 0.0]; 4],
        };
        backend
            .render_view(target, [1440, 1600], [0.35, 0.35, 0.35, 1.0], &[cube, cube])
            .expect("draw succeeds");

        let draws = log.lock().expect("draw log lock");
        assert_eq!(draws.len(), 1);
        assert_eq!(draws[0].cube_count, 2);
        assert_eq!(draws[0].extent, [1440, 1600]);
    }

    #[test]
    fn unknown_render_target_is_rejected() {
        let mut backend = HeadlessBackend::default();
        backend
            .prepare_scene(TextureFormat::Bgra8Srgb)
            .expect("prepare succeeds");
        assert_eq!(
            backend.render_view(RenderTargetId(7), [64, 64], [0.0; 4], &[]),
            Err(GraphicsError::UnknownRenderTarget(7))
        );
    }
}
