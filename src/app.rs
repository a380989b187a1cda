//! Application orchestration: startup phases in order, then the event and
//! frame loop, then teardown. Each phase checks that the previous one
//! happened, so a misordered caller gets an error instead of a panic.

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use thiserror::Error;

use crate::frame::{FrameError, FrameOutcome, FrameRenderer, SceneSpaces};
use crate::graphics::{self, BackendKind, GraphicsBackend, GraphicsError};
use crate::input::InputState;
use crate::math::reference_space_definition;
use crate::options::{BlendMode, Options, OptionsError, ReferenceSpace, ViewConfigKind};
use crate::platform::{NullPlatform, PlatformPlugin};
use crate::runtime::{self, RuntimeBridge, RuntimeError, ViewSpec};
use crate::session::{LoopSignal, SessionLifecycle};
use crate::swapchain::{SwapchainError, SwapchainSet};

/// Sleep used while the session is alive but not running, so the event poll
/// does not spin a core.
const IDLE_POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Error)]
pub enum AppError {
    #[error("instance has not been created")]
    NoInstance,
    #[error("system has not been initialized")]
    NoSystem,
    #[error("session has not been initialized")]
    NoSession,
    #[error("swapchains have already been created")]
    SwapchainsExist,
    #[error("swapchains have not been created")]
    NoSwapchains,
    #[error("view configuration {} is not supported, only stereo rendering is implemented", .0.label())]
    UnsupportedViewConfiguration(ViewConfigKind),
    #[error("environment blend mode {} is not offered by the system", .0.label())]
    BlendModeUnavailable(BlendMode),
    #[error("graphics backend {} is unavailable in this build or on this machine", .0.label())]
    BackendUnavailable(BackendKind),
    #[error(transparent)]
    Options(#[from] OptionsError),
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
    #[error(transparent)]
    Graphics(#[from] GraphicsError),
    #[error(transparent)]
    Swapchain(#[from] SwapchainError),
    #[error(transparent)]
    Frame(#[from] FrameError),
}

/// How a run ended and what the outer loop should do about it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunSummary {
    /// Stand up a fresh instance and run again.
    pub restart_requested: bool,
    pub frames_rendered: u64,
}

pub struct App {
    options: Options,
    platform: Box<dyn PlatformPlugin>,
    lifecycle: SessionLifecycle,
    renderer: FrameRenderer,
    input: Option<InputState>,
    spaces: Option<SceneSpaces>,
    // Declaration order doubles as teardown order: swapchains drop before
    // the backend, the backend before the bridge.
    swapchains: Option<SwapchainSet>,
    view_specs: Vec<ViewSpec>,
    backend: Option<Box<dyn GraphicsBackend>>,
    bridge: Option<Box<dyn RuntimeBridge>>,
}

impl App {
    pub fn new(options: Options) -> Self {
        Self::with_platform(options, Box::new(NullPlatform))
    }

    pub fn with_platform(options: Options, platform: Box<dyn PlatformPlugin>) -> Self {
        let lifecycle = SessionLifecycle::new(options.view_configuration);
        let renderer = FrameRenderer::new(options.view_configuration, options.blend_mode);
        Self {
            options,
            platform,
            lifecycle,
            renderer,
            input: None,
            spaces: None,
            swapchains: None,
            view_specs: Vec::new(),
            backend: None,
            bridge: None,
        }
    }

    /// Construction hook for injecting a pre-built bridge and backend.
    /// `create_instance` and `initialize_system` keep whatever is already
    /// in place.
    pub fn with_parts(
        options: Options,
        bridge: Box<dyn RuntimeBridge>,
        backend: Box<dyn GraphicsBackend>,
    ) -> Self {
        let mut app = Self::new(options);
        app.bridge = Some(bridge);
        app.backend = Some(backend);
        app
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn is_session_running(&self) -> bool {
        self.lifecycle.is_running()
    }

    pub fn is_session_focused(&self) -> bool {
        self.lifecycle.is_focused()
    }

    /// Stand up the runtime bridge and log what the runtime is.
    pub fn create_instance(&mut self) -> Result<(), AppError> {
        if self.bridge.is_none() {
            self.bridge = Some(runtime::create_runtime(
                &self.options,
                self.platform.as_ref(),
            ));
        }
        let bridge = self.bridge.as_deref().ok_or(AppError::NoInstance)?;
        let description = bridge.describe();
        log::info!(
            "[app] runtime: {} version {}",
            description.runtime_name,
            description.runtime_version
        );
        log::info!(
            "[app] {} api layers available: {:?}",
            description.layers.len(),
            description.layers
        );
        log::info!(
            "[app] {} instance extensions enabled: {:?}",
            description.extensions.len(),
            description.extensions
        );
        Ok(())
    }

    /// Resolve the system: log what it offers, validate the configured
    /// blend mode against it, and create the graphics backend.
    pub fn initialize_system(&mut self) -> Result<(), AppError> {
        let bridge = self.bridge.as_deref().ok_or(AppError::NoInstance)?;
        self.log_view_configurations(bridge)?;

        let offered = bridge.blend_modes(self.options.view_configuration)?;
        if !offered.contains(&self.options.blend_mode) {
            return Err(AppError::BlendModeUnavailable(self.options.blend_mode));
        }

        if self.backend.is_none() {
            self.backend = Some(
                graphics::try_create_backend(self.options.backend)
                    .ok_or(AppError::BackendUnavailable(self.options.backend))?,
            );
        }
        let backend = self.backend.as_deref().ok_or(AppError::NoSystem)?;
        log::info!("[app] graphics backend: {}", backend.label());
        Ok(())
    }

    fn log_view_configurations(&self, bridge: &dyn RuntimeBridge) -> Result<(), AppError> {
        let configs = bridge.view_configurations()?;
        log::info!("[app] available view configurations: {}", configs.len());
        for config in configs {
            let selected = if config == self.options.view_configuration {
                " (selected)"
            } else {
                ""
            };
            log::info!("[app]   view configuration {}{selected}", config.label());
            for (index, view) in bridge.view_config_views(config)?.iter().enumerate() {
                log::info!(
                    "[app]     view {index}: recommended {}x{} (max {}x{}), samples {} (max {})",
                    view.recommended_extent[0],
                    view.recommended_extent[1],
                    view.max_extent[0],
                    view.max_extent[1],
                    view.recommended_samples,
                    view.max_samples
                );
            }
            let blend_modes = bridge.blend_modes(config)?;
            for mode in blend_modes {
                let selected = if mode == self.options.blend_mode {
                    " (selected)"
                } else {
                    ""
                };
                log::info!("[app]     blend mode {}{selected}", mode.label());
            }
        }
        Ok(())
    }

    /// Create the session against the backend's device, then everything
    /// scoped to it: input, the visualized spaces, and the app space.
    pub fn initialize_session(&mut self) -> Result<(), AppError> {
        let backend = self.backend.as_deref().ok_or(AppError::NoSystem)?;
        let binding = backend.session_binding();
        let bridge = self.bridge.as_deref_mut().ok_or(AppError::NoInstance)?;

        let session = bridge.create_session(&binding)?;
        self.lifecycle.bind_session(session);
        log::info!("[app] session created ({:?})", session);

        let names = bridge.reference_space_names()?;
        log::info!(
            "[app] {} reference spaces available: {}",
            names.len(),
            names.join(", ")
        );

        self.input = Some(InputState::initialize(bridge)?);

        let mut visualized = Vec::with_capacity(ReferenceSpace::VISUALIZED.len());
        for space in ReferenceSpace::VISUALIZED {
            let definition = reference_space_definition(space);
            match bridge.create_reference_space(definition.base, definition.pose) {
                Ok(id) => visualized.push((id, space)),
                Err(err) => {
                    log::warn!(
                        "[app] failed to create visualized space {}: {err}",
                        space.label()
                    );
                }
            }
        }

        let definition = reference_space_definition(self.options.app_space);
        let app_space = bridge.create_reference_space(definition.base, definition.pose)?;
        log::info!(
            "[app] app space {} over {}",
            self.options.app_space.label(),
            definition.base.label()
        );

        self.spaces = Some(SceneSpaces {
            app_space,
            visualized,
        });
        Ok(())
    }

    /// Log the system details and build one swapchain per view. Stereo only;
    /// anything else fails before touching the runtime.
    pub fn create_swapchains(&mut self) -> Result<(), AppError> {
        if self.swapchains.is_some() {
            return Err(AppError::SwapchainsExist);
        }
        if self.spaces.is_none() {
            return Err(AppError::NoSession);
        }
        let backend = self.backend.as_deref_mut().ok_or(AppError::NoSystem)?;
        let bridge = self.bridge.as_deref_mut().ok_or(AppError::NoInstance)?;

        let properties = bridge.system_properties()?;
        log::info!(
            "[app] system: {} (vendor {})",
            properties.system_name,
            properties.vendor_id
        );
        log::info!(
            "[app] graphics limits: max swapchain {}x{}, max layers {}",
            properties.max_swapchain_extent[0],
            properties.max_swapchain_extent[1],
            properties.max_layer_count
        );
        log::info!(
            "[app] tracking: orientation={} position={}",
            properties.orientation_tracking,
            properties.position_tracking
        );

        if self.options.view_configuration != ViewConfigKind::Stereo {
            return Err(AppError::UnsupportedViewConfiguration(
                self.options.view_configuration,
            ));
        }

        self.view_specs = bridge.view_config_views(self.options.view_configuration)?;
        self.swapchains = Some(SwapchainSet::create(bridge, backend, &self.view_specs)?);
        Ok(())
    }

    /// Drain runtime events through the state machine.
    pub fn poll_events(&mut self) -> Result<LoopSignal, AppError> {
        let bridge = self.bridge.as_deref_mut().ok_or(AppError::NoInstance)?;
        Ok(self.lifecycle.poll_events(bridge)?)
    }

    /// Sync and react to input. Call while the session is running.
    pub fn poll_actions(&mut self) -> Result<(), AppError> {
        let bridge = self.bridge.as_deref_mut().ok_or(AppError::NoInstance)?;
        let input = self.input.as_mut().ok_or(AppError::NoSession)?;
        Ok(input.poll(bridge)?)
    }

    pub fn render_frame(&mut self) -> Result<FrameOutcome, AppError> {
        let bridge = self.bridge.as_deref_mut().ok_or(AppError::NoInstance)?;
        let backend = self.backend.as_deref_mut().ok_or(AppError::NoSystem)?;
        let swapchains = self.swapchains.as_mut().ok_or(AppError::NoSwapchains)?;
        let input = self.input.as_ref().ok_or(AppError::NoSession)?;
        let spaces = self.spaces.as_ref().ok_or(AppError::NoSession)?;
        Ok(self
            .renderer
            .render_frame(bridge, backend, swapchains, input, spaces)?)
    }

    /// Ask the runtime to wind the session down. Only meaningful while the
    /// session is running; otherwise the caller should just stop looping.
    pub fn request_exit(&mut self) -> Result<(), AppError> {
        let bridge = self.bridge.as_deref_mut().ok_or(AppError::NoInstance)?;
        Ok(bridge.request_exit()?)
    }

    /// Full lifecycle: set up, loop until the runtime says exit (or the
    /// quit flag trips), tear down by drop order.
    pub fn run(&mut self, quit: &AtomicBool) -> Result<RunSummary, AppError> {
        self.create_instance()?;
        self.initialize_system()?;
        self.initialize_session()?;
        self.create_swapchains()?;

        let mut summary = RunSummary::default();
        let mut exit_requested = false;

        loop {
            if quit.load(Ordering::Relaxed) && !exit_requested {
                if self.is_session_running() {
                    log::info!("[app] quit flag set, requesting session exit");
                    self.request_exit()?;
                    exit_requested = true;
                } else {
                    log::info!("[app] quit flag set while session idle, leaving loop");
                    break;
                }
            }

            let signal = self.poll_events()?;
            if signal.exit {
                summary.restart_requested = signal.restart;
                break;
            }

            if !self.is_session_running() {
                thread::sleep(IDLE_POLL_INTERVAL);
                continue;
            }

            self.poll_actions()?;
            let outcome = self.render_frame()?;
            if outcome.layer_count > 0 {
                summary.frames_rendered += 1;
            }

            if let Some(max_frames) = self.options.max_frames {
                if summary.frames_rendered >= max_frames && !exit_requested {
                    log::info!("[app] rendered {max_frames} frames, requesting session exit");
                    self.request_exit()?;
                    exit_requested = true;
                }
            }
        }

        log::info!(
            "[app] leaving render loop after {} frames (restart={})",
            summary.frames_rendered,
            summary.restart_requested
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graphics::HeadlessBackend;
    use crate::runtime::{HeadlessHandle, HeadlessRuntime, SessionState};

    fn scripted_app() -> (App, HeadlessHandle) {
        let (runtime, handle) = HeadlessRuntime::scripted();
        let app = App::with_parts(
            Options::default(),
            Box::new(runtime),
            Box::new(HeadlessBackend::default()),
        );
        (app, handle)
    }

    fn set_up(app: &mut App) {
        app.create_instance().expect("instance creates");
        app.initialize_system().expect("system initializes");
        app.initialize_session().expect("session initializes");
        app.create_swapchains().expect("swapchains create");
    }

    #[test]
    fn phases_must_run_in_order() {
        let (mut app, _handle) = scripted_app();
        assert!(matches!(
            app.create_swapchains(),
            Err(AppError::NoSession)
        ));
        assert!(matches!(app.render_frame(), Err(AppError::NoSwapchains)));
    }

    #[test]
    fn swapchains_cannot_be_created_twice() {
        let (mut app, _handle) = scripted_app();
        set_up(&mut app);
        assert!(matches!(
            app.create_swapchains(),
            Err(AppError::SwapchainsExist)
        ));
    }

    #[test]
    fn mono_configuration_is_rejected_before_swapchain_creation() {
        let (runtime, _handle) = HeadlessRuntime::scripted();
        let mut app = App::with_parts(
            Options {
                view_configuration: ViewConfigKind::Mono,
                ..Options::default()
            },
            Box::new(runtime),
            Box::new(HeadlessBackend::default()),
        );
        app.create_instance().expect("instance creates");
        app.initialize_system().expect("system initializes");
        app.initialize_session().expect("session initializes");
        assert!(matches!(
            app.create_swapchains(),
            Err(AppError::UnsupportedViewConfiguration(ViewConfigKind::Mono))
        ));
    }

    #[test]
    fn unavailable_blend_mode_is_fatal_at_system_init() {
        let (runtime, _handle) = HeadlessRuntime::scripted();
        let mut app = App::with_parts(
            Options {
                blend_mode: BlendMode::Additive,
                ..Options::default()
            },
            Box::new(runtime),
            Box::new(HeadlessBackend::default()),
        );
        app.create_instance().expect("instance creates");
        assert!(matches!(
            app.initialize_system(),
            Err(AppError::BlendModeUnavailable(_))
        ));
    }

    #[test]
    fn visualized_space_failure_is_a_warning_not_an_error() {
        let (mut app, handle) = scripted_app();
        handle.remove_base_space(crate::math::BaseSpace::Stage);
        app.create_instance().expect("instance creates");
        app.initialize_system().expect("system initializes");
        app.initialize_session().expect("session initializes");
        // Local app space still created; only the stage-based spaces fell
        // away (five of the seven).
        let spaces = app.spaces.as_ref().expect("spaces exist");
        assert_eq!(spaces.visualized.len(), 2);
    }

    #[test]
    fn app_space_failure_is_fatal() {
        let (runtime, handle) = HeadlessRuntime::scripted();
        let mut app = App::with_parts(
            Options {
                app_space: ReferenceSpace::Stage,
                ..Options::default()
            },
            Box::new(runtime),
            Box::new(HeadlessBackend::default()),
        );
        handle.remove_base_space(crate::math::BaseSpace::Stage);
        app.create_instance().expect("instance creates");
        app.initialize_system().expect("system initializes");
        assert!(matches!(
            app.initialize_session(),
            Err(AppError::Runtime(RuntimeError::Api(_)))
        ));
    }

    #[test]
    fn event_driven_session_reaches_running_and_renders() {
        let (mut app, handle) = scripted_app();
        set_up(&mut app);

        handle.push_state(SessionState::Idle, None);
        handle.push_state(SessionState::Ready, None);
        let signal = app.poll_events().expect("events drain");
        assert_eq!(signal, LoopSignal::default());
        assert!(app.is_session_running());

        app.poll_actions().expect("actions poll");
        let outcome = app.render_frame().expect("frame renders");
        assert_eq!(outcome.layer_count, 1);
    }

    #[test]
    fn run_with_frame_cap_exits_cleanly() {
        // Self-driving runtime so lifecycle events arrive on their own.
        let mut app = App::with_parts(
            Options {
                max_frames: Some(3),
                ..Options::default()
            },
            Box::new(HeadlessRuntime::new()),
            Box::new(HeadlessBackend::default()),
        );
        let quit = AtomicBool::new(false);
        let summary = app.run(&quit).expect("run completes");
        assert!(!summary.restart_requested);
        assert!(summary.frames_rendered >= 3);
        assert!(!app.is_session_running());
    }

    #[test]
    fn quit_flag_during_run_winds_the_session_down() {
        let mut app = App::with_parts(
            Options::default(),
            Box::new(HeadlessRuntime::new()),
            Box::new(HeadlessBackend::default()),
        );
        let quit = AtomicBool::new(true);
        let summary = app.run(&quit).expect("run completes");
        assert!(!summary.restart_requested);
    }
}
