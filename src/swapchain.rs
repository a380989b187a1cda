//! Swapchain creation and the image acquire/release protocol. One color
//! swapchain per view, sized from the runtime's recommendation, in a format
//! both the runtime and the graphics backend agreed on.

use thiserror::Error;

use crate::graphics::{GraphicsBackend, GraphicsError, RenderTargetId};
use crate::runtime::{
    RuntimeBridge, RuntimeError, RuntimeSwapchain, SwapchainId, SwapchainSpec, ViewSpec,
    INFINITE_DURATION,
};

#[derive(Debug, Error)]
pub enum SwapchainError {
    #[error(
        "no swapchain format supported by both the runtime and the {backend} backend \
         (runtime advertised {advertised:?})"
    )]
    NoCompatibleFormat {
        backend: &'static str,
        advertised: Vec<i64>,
    },
    #[error("swapchain reported image index {index} but only {count} images exist")]
    ImageIndexOutOfRange { index: u32, count: usize },
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
    #[error(transparent)]
    Graphics(#[from] GraphicsError),
}

/// Pick the color format: first runtime-advertised code the backend also
/// supports. Runtime order wins; the backend's own preference order only
/// matters to the backend.
pub fn select_color_format(runtime_formats: &[i64], backend_formats: &[i64]) -> Option<i64> {
    runtime_formats
        .iter()
        .copied()
        .find(|format| backend_formats.contains(format))
}

/// Render the advertised format list with the selected entry bracketed, the
/// way it appears in the startup log.
fn format_list(formats: &[i64], selected: i64) -> String {
    let mut out = String::new();
    for &format in formats {
        if format == selected {
            out.push_str(&format!(" [{format}]"));
        } else {
            out.push_str(&format!(" {format}"));
        }
    }
    out
}

/// One view's swapchain plus the render targets wrapping its images.
pub struct ViewSwapchain {
    chain: Box<dyn RuntimeSwapchain>,
    targets: Vec<RenderTargetId>,
    extent: [u32; 2],
}

impl ViewSwapchain {
    pub fn id(&self) -> SwapchainId {
        self.chain.id()
    }

    pub fn extent(&self) -> [u32; 2] {
        self.extent
    }

    pub fn image_count(&self) -> usize {
        self.targets.len()
    }

    /// Run one acquire / wait / render / release cycle. The image is always
    /// released, even when the render closure fails; the closure's error
    /// wins over a release error.
    pub fn render_into<F>(&mut self, render: F) -> Result<(), SwapchainError>
    where
        F: FnOnce(RenderTargetId, [u32; 2]) -> Result<(), GraphicsError>,
    {
        let index = self.chain.acquire()?;
        self.chain.wait_image(INFINITE_DURATION)?;
        let rendered = match self.targets.get(index as usize).copied() {
            Some(target) => render(target, self.extent).map_err(SwapchainError::from),
            None => Err(SwapchainError::ImageIndexOutOfRange {
                index,
                count: self.targets.len(),
            }),
        };
        let released = self.chain.release().map_err(SwapchainError::from);
        rendered.and(released)
    }
}

pub struct SwapchainSet {
    views: Vec<ViewSwapchain>,
    color_format: i64,
}

impl SwapchainSet {
    /// Negotiate a format and build one swapchain per view, wiring every
    /// image through the backend as a render target. Finishes by preparing
    /// the backend's scene resources for the chosen format.
    pub fn create(
        bridge: &mut dyn RuntimeBridge,
        backend: &mut dyn GraphicsBackend,
        view_specs: &[ViewSpec],
    ) -> Result<Self, SwapchainError> {
        let advertised = bridge.swapchain_formats()?;
        let color_format = select_color_format(&advertised, backend.supported_color_formats())
            .ok_or_else(|| SwapchainError::NoCompatibleFormat {
                backend: backend.label(),
                advertised: advertised.clone(),
            })?;
        log::debug!(
            "[swapchain] runtime formats:{}",
            format_list(&advertised, color_format)
        );
        let texture_format = backend
            .texture_format(color_format)
            .ok_or(GraphicsError::UnsupportedFormat(backend.label(), color_format))?;

        let mut views = Vec::with_capacity(view_specs.len());
        for (index, spec) in view_specs.iter().enumerate() {
            log::info!(
                "[swapchain] creating swapchain for view {index}: {}x{} samples={}",
                spec.recommended_extent[0],
                spec.recommended_extent[1],
                spec.recommended_samples
            );
            let create = SwapchainSpec {
                format: color_format,
                width: spec.recommended_extent[0],
                height: spec.recommended_extent[1],
                sample_count: 1,
            };
            let chain = bridge.create_swapchain(&create)?;
            let images = chain.images()?;
            let textures = backend.import_swapchain_images(&images, &create)?;
            let targets = textures
                .iter()
                .map(|&texture| backend.create_render_target(texture, texture_format))
                .collect::<Result<Vec<_>, _>>()?;
            views.push(ViewSwapchain {
                chain,
                targets,
                extent: [create.width, create.height],
            });
        }

        backend.prepare_scene(texture_format)?;
        Ok(Self {
            views,
            color_format,
        })
    }

    pub fn view_count(&self) -> usize {
        self.views.len()
    }

    pub fn view_mut(&mut self, index: usize) -> &mut ViewSwapchain {
        &mut self.views[index]
    }

    pub fn views(&self) -> &[ViewSwapchain] {
        &self.views
    }

    pub fn color_format(&self) -> i64 {
        self.color_format
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graphics::{
        HeadlessBackend, SessionBinding, FORMAT_B8G8R8A8_SRGB, FORMAT_B8G8R8A8_UNORM,
        FORMAT_R8G8B8A8_SRGB,
    };
    use crate::runtime::{HeadlessRuntime, RuntimeResult};

    #[test]
    fn runtime_order_decides_the_format() {
        let runtime_formats = [FORMAT_R8G8B8A8_SRGB, FORMAT_B8G8R8A8_SRGB];
        let backend_formats = [FORMAT_B8G8R8A8_SRGB, FORMAT_R8G8B8A8_SRGB];
        assert_eq!(
            select_color_format(&runtime_formats, &backend_formats),
            Some(FORMAT_R8G8B8A8_SRGB)
        );
    }

    #[test]
    fn unsupported_runtime_codes_are_skipped() {
        let runtime_formats = [999, FORMAT_B8G8R8A8_UNORM];
        let backend_formats = [FORMAT_B8G8R8A8_UNORM];
        assert_eq!(
            select_color_format(&runtime_formats, &backend_formats),
            Some(FORMAT_B8G8R8A8_UNORM)
        );
    }

    #[test]
    fn disjoint_lists_select_nothing() {
        assert_eq!(select_color_format(&[1, 2, 3], &[4, 5]), None);
    }

    #[test]
    fn format_log_brackets_the_selection() {
        assert_eq!(format_list(&[43, 50, 37], 50), " 43 [50] 37");
    }

    fn stereo_set(
        runtime: &mut HeadlessRuntime,
        backend: &mut HeadlessBackend,
    ) -> Result<SwapchainSet, SwapchainError> {
        runtime
            .create_session(&SessionBinding {
                backend: "headless",
                device_id: 0,
            })
            .expect("session creates");
        let view_specs = runtime
            .view_config_views(crate::options::ViewConfigKind::Stereo)
            .expect("view specs enumerate");
        SwapchainSet::create(runtime, backend, &view_specs)
    }

    #[test]
    fn creates_one_swapchain_per_view() {
        let (mut runtime, _handle) = HeadlessRuntime::scripted();
        let mut backend = HeadlessBackend::default();
        let set = stereo_set(&mut runtime, &mut backend).expect("set creates");

        assert_eq!(set.view_count(), 2);
        for view in set.views() {
            assert_eq!(view.extent(), [1440, 1600]);
            assert_eq!(view.image_count(), 3);
        }
        // Every image got a backend texture.
        assert_eq!(backend.texture_count(), 6);
    }

    #[test]
    fn negotiation_honors_runtime_preference() {
        let (mut runtime, _handle) = HeadlessRuntime::scripted();
        let mut backend = HeadlessBackend::default();
        let set = stereo_set(&mut runtime, &mut backend).expect("set creates");
        // The headless runtime leads with RGBA sRGB even though the backend
        // prefers BGRA.
        assert_eq!(set.color_format(), FORMAT_R8G8B8A8_SRGB);
    }

    #[test]
    fn render_into_walks_the_protocol_in_order() {
        use std::sync::{Arc, Mutex};

        struct RecordingChain {
            calls: Arc<Mutex<Vec<&'static str>>>,
        }

        impl RuntimeSwapchain for RecordingChain {
            fn id(&self) -> SwapchainId {
                SwapchainId(1)
            }
            fn images(&self) -> RuntimeResult<Vec<u64>> {
                Ok(vec![1])
            }
            fn acquire(&mut self) -> RuntimeResult<u32> {
                self.calls.lock().expect("call log lock").push("acquire");
                Ok(0)
            }
            fn wait_image(&mut self, _timeout_nanos: i64) -> RuntimeResult<()> {
                self.calls.lock().expect("call log lock").push("wait");
                Ok(())
            }
            fn release(&mut self) -> RuntimeResult<()> {
                self.calls.lock().expect("call log lock").push("release");
                Ok(())
            }
        }

        let calls = Arc::new(Mutex::new(Vec::new()));
        let mut view = ViewSwapchain {
            chain: Box::new(RecordingChain {
                calls: Arc::clone(&calls),
            }),
            targets: vec![RenderTargetId(0)],
            extent: [64, 64],
        };

        view.render_into(|target, extent| {
            calls.lock().expect("call log lock").push("render");
            assert_eq!(target, RenderTargetId(0));
            assert_eq!(extent, [64, 64]);
            Ok(())
        })
        .expect("render succeeds");

        assert_eq!(
            *calls.lock().expect("call log lock"),
            vec!["acquire", "wait", "render", "release"]
        );
    }

    #[test]
    fn closure_error_wins_over_release() {
        struct QuietChain;

        impl RuntimeSwapchain for QuietChain {
            fn id(&self) -> SwapchainId {
                SwapchainId(1)
            }
            fn images(&self) -> RuntimeResult<Vec<u64>> {
                Ok(vec![1])
            }
            fn acquire(&mut self) -> RuntimeResult<u32> {
                Ok(0)
            }
            fn wait_image(&mut self, _timeout_nanos: i64) -> RuntimeResult<()> {
                Ok(())
            }
            fn release(&mut self) -> RuntimeResult<()> {
                Ok(())
            }
        }

        let mut view = ViewSwapchain {
            chain: Box::new(QuietChain),
            targets: vec![RenderTargetId(0)],
            extent: [64, 64],
        };
        let err = view
            .render_into(|_, _| Err(GraphicsError::SceneNotPrepared))
            .unwrap_err();
        assert!(matches!(
            err,
            SwapchainError::Graphics(GraphicsError::SceneNotPrepared)
        ));
    }

    #[test]
    fn render_into_releases_after_closure_failure() {
        struct CountingChain {
            acquires: u32,
            releases: std::sync::Arc<std::sync::atomic::AtomicU32>,
        }

        impl RuntimeSwapchain for CountingChain {
            fn id(&self) -> SwapchainId {
                SwapchainId(2)
            }
            fn images(&self) -> RuntimeResult<Vec<u64>> {
                Ok(vec![1])
            }
            fn acquire(&mut self) -> RuntimeResult<u32> {
                self.acquires += 1;
                Ok(0)
            }
            fn wait_image(&mut self, _timeout_nanos: i64) -> RuntimeResult<()> {
                Ok(())
            }
            fn release(&mut self) -> RuntimeResult<()> {
                self.releases
                    .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                Ok(())
            }
        }

        let releases = std::sync::Arc::new(std::sync::atomic::AtomicU32::new(0));
        let mut view = ViewSwapchain {
            chain: Box::new(CountingChain {
                acquires: 0,
                releases: std::sync::Arc::clone(&releases),
            }),
            targets: vec![RenderTargetId(0)],
            extent: [32, 32],
        };

        let _ = view.render_into(|_, _| Err(GraphicsError::SceneNotPrepared));
        assert_eq!(releases.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[test]
    fn out_of_range_image_index_is_reported() {
        struct WildChain;

        impl RuntimeSwapchain for WildChain {
            fn id(&self) -> SwapchainId {
                SwapchainId(3)
            }
            fn images(&self) -> RuntimeResult<Vec<u64>> {
                Ok(vec![1])
            }
            fn acquire(&mut self) -> RuntimeResult<u32> {
                Ok(9)
            }
            fn wait_image(&mut self, _timeout_nanos: i64) -> RuntimeResult<()> {
                Ok(())
            }
            fn release(&mut self) -> RuntimeResult<()> {
                Ok(())
            }
        }

        let mut view = ViewSwapchain {
            chain: Box::new(WildChain),
            targets: vec![RenderTargetId(0)],
            extent: [32, 32],
        };
        let err = view.render_into(|_, _| Ok(())).unwrap_err();
        assert!(matches!(
            err,
            SwapchainError::ImageIndexOutOfRange { index: 9, count: 1 }
        ));
    }
}
