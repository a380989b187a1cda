//! OpenXR-backed bridge. Discovery (instance, system, view configurations,
//! blend modes) runs against the live runtime; session-scoped calls run on
//! the headless core until a graphics binding is wired in, so the lifecycle
//! and input paths stay exercised end to end.

use openxr::{ApplicationInfo, Entry, EnvironmentBlendMode, ExtensionSet, Instance, SystemId,
    ViewConfigurationType};

use crate::graphics::SessionBinding;
use crate::math::{BaseSpace, Pose};
use crate::options::{BlendMode, FormFactor, Options, ViewConfigKind};
use crate::platform::PlatformPlugin;
use crate::runtime::{
    ActionId, ActionValue, FrameTiming, Hand, HapticPulse, HeadlessRuntime, ProfileBindings,
    ProjectionLayer, RuntimeBridge, RuntimeDescription, RuntimeError, RuntimeEvent, RuntimeResult,
    RuntimeSwapchain, RuntimeTime, SessionId, SpaceId, SpaceLocation, SwapchainSpec,
    SystemProperties, ViewSnapshot, ViewSpec,
};

pub struct OpenXrRuntime {
    instance: Instance,
    system: SystemId,
    description: RuntimeDescription,
    core: HeadlessRuntime,
}

impl OpenXrRuntime {
    pub fn initialize(
        options: &Options,
        platform: &dyn PlatformPlugin,
    ) -> Result<Self, RuntimeError> {
        let entry = unsafe { Entry::load() }.map_err(|err| {
            RuntimeError::Unavailable(format!("failed to load OpenXR loader: {err}"))
        })?;

        let available = entry.enumerate_extensions().map_err(|err| {
            RuntimeError::Unavailable(format!("failed to enumerate extensions: {err}"))
        })?;
        log::debug!("[openxr] runtime extensions: {available:?}");

        let layers = entry.enumerate_layers().map_err(|err| {
            RuntimeError::Unavailable(format!("failed to enumerate api layers: {err}"))
        })?;
        let layer_names: Vec<String> = layers
            .iter()
            .map(|layer| layer.layer_name.clone())
            .collect();

        let requested = platform.instance_extensions();
        if !requested.is_empty() {
            log::debug!(
                "[openxr] platform {} requested extensions: {requested:?}",
                platform.label()
            );
        }

        let app_info = ApplicationInfo {
            application_name: "cubist_xr",
            application_version: 1,
            engine_name: "cubist_xr",
            engine_version: 1,
        };
        let extensions = extension_set(&requested);
        let instance = entry
            .create_instance(&app_info, &extensions, &[])
            .map_err(|err| {
                RuntimeError::Unavailable(format!("failed to create OpenXR instance: {err}"))
            })?;

        let properties = instance.properties().map_err(|err| {
            RuntimeError::Unavailable(format!("failed to query instance properties: {err}"))
        })?;
        let runtime_version = format!(
            "{}.{}.{}",
            properties.runtime_version.major(),
            properties.runtime_version.minor(),
            properties.runtime_version.patch()
        );

        let system = instance.system(form_factor(options.form_factor)).map_err(|err| {
            RuntimeError::Unavailable(format!(
                "no {} system available: {err}",
                options.form_factor.label()
            ))
        })?;

        Ok(Self {
            instance,
            system,
            description: RuntimeDescription {
                runtime_name: properties.runtime_name,
                runtime_version,
                layers: layer_names,
                extensions: requested,
            },
            core: HeadlessRuntime::new(),
        })
    }

    fn view_config_type(&self, config: ViewConfigKind) -> RuntimeResult<ViewConfigurationType> {
        let ty = match config {
            ViewConfigKind::Mono => ViewConfigurationType::PRIMARY_MONO,
            ViewConfigKind::Stereo => ViewConfigurationType::PRIMARY_STEREO,
        };
        let offered = self
            .instance
            .enumerate_view_configurations(self.system)
            .map_err(api_error)?;
        if !offered.contains(&ty) {
            return Err(RuntimeError::UnsupportedViewConfiguration(config));
        }
        Ok(ty)
    }
}

fn form_factor(form_factor: FormFactor) -> openxr::FormFactor {
    match form_factor {
        FormFactor::HeadMounted => openxr::FormFactor::HEAD_MOUNTED_DISPLAY,
        FormFactor::Handheld => openxr::FormFactor::HANDHELD_DISPLAY,
    }
}

// Names the generated bindings do not recognize still reach the loader
// through the `other` list.
fn extension_set(names: &[String]) -> ExtensionSet {
    let mut extensions = ExtensionSet::default();
    extensions.other.extend(names.iter().cloned());
    extensions
}

fn api_error(err: impl std::fmt::Display) -> RuntimeError {
    RuntimeError::Api(err.to_string())
}

impl RuntimeBridge for OpenXrRuntime {
    fn label(&self) -> &'static str {
        "openxr"
    }

    fn describe(&self) -> RuntimeDescription {
        self.description.clone()
    }

    fn system_properties(&self) -> RuntimeResult<SystemProperties> {
        let properties = self
            .instance
            .system_properties(self.system)
            .map_err(api_error)?;
        Ok(SystemProperties {
            system_name: properties.system_name,
            vendor_id: properties.vendor_id,
            max_swapchain_extent: [
                properties.graphics_properties.max_swapchain_image_width,
                properties.graphics_properties.max_swapchain_image_height,
            ],
            max_layer_count: properties.graphics_properties.max_layer_count,
            orientation_tracking: properties.tracking_properties.orientation_tracking,
            position_tracking: properties.tracking_properties.position_tracking,
        })
    }

    fn view_configurations(&self) -> RuntimeResult<Vec<ViewConfigKind>> {
        let offered = self
            .instance
            .enumerate_view_configurations(self.system)
            .map_err(api_error)?;
        Ok(offered
            .into_iter()
            .filter_map(|ty| match ty {
                ViewConfigurationType::PRIMARY_MONO => Some(ViewConfigKind::Mono),
                ViewConfigurationType::PRIMARY_STEREO => Some(ViewConfigKind::Stereo),
                _ => None,
            })
            .collect())
    }

    fn view_config_views(&self, config: ViewConfigKind) -> RuntimeResult<Vec<ViewSpec>> {
        let ty = self.view_config_type(config)?;
        let views = self
            .instance
            .enumerate_view_configuration_views(self.system, ty)
            .map_err(api_error)?;
        Ok(views
            .into_iter()
            .map(|view| ViewSpec {
                recommended_extent: [
                    view.recommended_image_rect_width,
                    view.recommended_image_rect_height,
                ],
                max_extent: [view.max_image_rect_width, view.max_image_rect_height],
                recommended_samples: view.recommended_swapchain_sample_count,
                max_samples: view.max_swapchain_sample_count,
            })
            .collect())
    }

    fn blend_modes(&self, config: ViewConfigKind) -> RuntimeResult<Vec<BlendMode>> {
        let ty = self.view_config_type(config)?;
        let offered = self
            .instance
            .enumerate_environment_blend_modes(self.system, ty)
            .map_err(api_error)?;
        Ok(offered
            .into_iter()
            .filter_map(|mode| match mode {
                EnvironmentBlendMode::OPAQUE => Some(BlendMode::Opaque),
                EnvironmentBlendMode::ADDITIVE => Some(BlendMode::Additive),
                EnvironmentBlendMode::ALPHA_BLEND => Some(BlendMode::AlphaBlend),
                _ => None,
            })
            .collect())
    }

    fn reference_space_names(&self) -> RuntimeResult<Vec<String>> {
        self.core.reference_space_names()
    }

    fn create_session(&mut self, binding: &SessionBinding) -> RuntimeResult<SessionId> {
        // TODO: create the real session once a Vulkan binding is exposed by
        // the wgpu backend. For now sessions run on the headless core so the
        // lifecycle and input paths stay exercised against a live runtime.
        log::warn!(
            "[openxr] no graphics binding for {}, session runs on the headless core",
            binding.backend
        );
        self.core.create_session(binding)
    }

    fn poll_event(&mut self) -> RuntimeResult<Option<RuntimeEvent>> {
        self.core.poll_event()
    }

    fn begin_session(&mut self, config: ViewConfigKind) -> RuntimeResult<()> {
        self.core.begin_session(config)
    }

    fn end_session(&mut self) -> RuntimeResult<()> {
        self.core.end_session()
    }

    fn request_exit(&mut self) -> RuntimeResult<()> {
        self.core.request_exit()
    }

    fn create_reference_space(&mut self, base: BaseSpace, pose: Pose) -> RuntimeResult<SpaceId> {
        self.core.create_reference_space(base, pose)
    }

    fn locate_space(
        &self,
        space: SpaceId,
        base: SpaceId,
        time: RuntimeTime,
    ) -> RuntimeResult<SpaceLocation> {
        self.core.locate_space(space, base, time)
    }

    fn locate_views(
        &self,
        config: ViewConfigKind,
        time: RuntimeTime,
        base: SpaceId,
    ) -> RuntimeResult<ViewSnapshot> {
        self.core.locate_views(config, time, base)
    }

    fn swapchain_formats(&self) -> RuntimeResult<Vec<i64>> {
        self.core.swapchain_formats()
    }

    fn create_swapchain(&mut self, spec: &SwapchainSpec) -> RuntimeResult<Box<dyn RuntimeSwapchain>> {
        self.core.create_swapchain(spec)
    }

    fn wait_frame(&mut self) -> RuntimeResult<FrameTiming> {
        self.core.wait_frame()
    }

    fn begin_frame(&mut self) -> RuntimeResult<()> {
        self.core.begin_frame()
    }

    fn end_frame(
        &mut self,
        display_time: RuntimeTime,
        blend_mode: BlendMode,
        layers: &[ProjectionLayer],
    ) -> RuntimeResult<()> {
        self.core.end_frame(display_time, blend_mode, layers)
    }

    fn initialize_actions(&mut self, profiles: &[ProfileBindings]) -> RuntimeResult<()> {
        self.core.initialize_actions(profiles)
    }

    fn create_hand_space(&mut self, hand: Hand) -> RuntimeResult<SpaceId> {
        self.core.create_hand_space(hand)
    }

    fn attach_actions(&mut self) -> RuntimeResult<()> {
        self.core.attach_actions()
    }

    fn sync_actions(&mut self) -> RuntimeResult<()> {
        self.core.sync_actions()
    }

    fn grab_state(&self, hand: Hand) -> RuntimeResult<ActionValue<f32>> {
        self.core.grab_state(hand)
    }

    fn pose_active(&self, hand: Hand) -> RuntimeResult<bool> {
        self.core.pose_active(hand)
    }

    fn quit_state(&self) -> RuntimeResult<ActionValue<bool>> {
        self.core.quit_state()
    }

    fn apply_haptic(&mut self, hand: Hand, pulse: HapticPulse) -> RuntimeResult<()> {
        self.core.apply_haptic(hand, pulse)
    }

    fn action_sources(&self, action: ActionId) -> RuntimeResult<Vec<String>> {
        self.core.action_sources(action)
    }
}
