//! Runtime bridge seam. Everything the application asks of an XR runtime
//! goes through [`RuntimeBridge`], so the session state machine, input
//! polling, and frame loop never name a concrete runtime. The headless
//! implementation keeps the whole lifecycle runnable (and testable) with no
//! runtime installed; the OpenXR implementation is compiled in behind the
//! `runtime-openxr` feature.

pub mod headless;
#[cfg(feature = "runtime-openxr")]
pub mod openxr;

use thiserror::Error;

use crate::graphics::SessionBinding;
use crate::math::{BaseSpace, Fov, Pose};
use crate::options::{BlendMode, Options, ViewConfigKind};
use crate::platform::PlatformPlugin;

pub use headless::{HeadlessHandle, HeadlessRuntime};

pub type RuntimeResult<T> = Result<T, RuntimeError>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RuntimeError {
    #[error("runtime unavailable: {0}")]
    Unavailable(String),
    #[error("call out of order: {0}")]
    CallOrder(&'static str),
    #[error("no session has been created")]
    NoSession,
    #[error("a session already exists")]
    SessionExists,
    #[error("unknown space id {0}")]
    UnknownSpace(u64),
    #[error("view configuration {0:?} is not offered by the system")]
    UnsupportedViewConfiguration(ViewConfigKind),
    #[error("runtime call failed: {0}")]
    Api(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SpaceId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SwapchainId(pub u64);

/// Runtime timestamp in nanoseconds. Only ever compared and echoed back to
/// the runtime; the application never interprets the epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct RuntimeTime(pub i64);

impl RuntimeTime {
    pub const fn as_nanos(self) -> i64 {
        self.0
    }
}

/// Session lifecycle states as reported by the runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    Unknown,
    Idle,
    Ready,
    Synchronized,
    Visible,
    Focused,
    Stopping,
    LossPending,
    Exiting,
}

impl SessionState {
    pub fn label(self) -> &'static str {
        match self {
            Self::Unknown => "UNKNOWN",
            Self::Idle => "IDLE",
            Self::Ready => "READY",
            Self::Synchronized => "SYNCHRONIZED",
            Self::Visible => "VISIBLE",
            Self::Focused => "FOCUSED",
            Self::Stopping => "STOPPING",
            Self::LossPending => "LOSS_PENDING",
            Self::Exiting => "EXITING",
        }
    }
}

/// Events drained from the runtime queue each tick.
#[derive(Debug, Clone, PartialEq)]
pub enum RuntimeEvent {
    StateChanged {
        state: SessionState,
        session: Option<SessionId>,
        time: RuntimeTime,
    },
    InstanceLossPending {
        loss_time: RuntimeTime,
    },
    EventsLost {
        count: u32,
    },
    InteractionProfileChanged,
    ReferenceSpaceChangePending {
        session: Option<SessionId>,
    },
}

/// Identity and discovery data logged once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeDescription {
    pub runtime_name: String,
    pub runtime_version: String,
    pub layers: Vec<String>,
    /// Extensions enabled on the instance, not the runtime's full catalog.
    pub extensions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemProperties {
    pub system_name: String,
    pub vendor_id: u32,
    pub max_swapchain_extent: [u32; 2],
    pub max_layer_count: u32,
    pub orientation_tracking: bool,
    pub position_tracking: bool,
}

/// Per-view render dimensions reported by the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewSpec {
    pub recommended_extent: [u32; 2],
    pub max_extent: [u32; 2],
    pub recommended_samples: u32,
    pub max_samples: u32,
}

/// Creation parameters for a color swapchain. Images are allocated for
/// sampled color-attachment usage with an array size, face count, and mip
/// count of one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapchainSpec {
    pub format: i64,
    pub width: u32,
    pub height: u32,
    pub sample_count: u32,
}

/// Timing handed back by `wait_frame`. `should_render` is the runtime's
/// word on whether submitted layers would actually reach the display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameTiming {
    pub predicted_display_time: RuntimeTime,
    pub should_render: bool,
}

/// Result of locating one space in another at a given time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpaceLocation {
    pub pose: Pose,
    pub position_valid: bool,
    pub orientation_valid: bool,
}

impl SpaceLocation {
    pub fn is_fully_valid(&self) -> bool {
        self.position_valid && self.orientation_valid
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewPose {
    pub pose: Pose,
    pub fov: Fov,
}

/// All view poses for one frame, plus whether tracking was valid at all.
/// Invalid tracking means the frame must not submit any layers.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewSnapshot {
    pub position_valid: bool,
    pub orientation_valid: bool,
    pub views: Vec<ViewPose>,
}

impl ViewSnapshot {
    pub fn is_fully_valid(&self) -> bool {
        self.position_valid && self.orientation_valid
    }
}

/// One view's contribution to a submitted projection layer. The image rect
/// always covers the full swapchain extent from the origin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProjectionView {
    pub pose: Pose,
    pub fov: Fov,
    pub swapchain: SwapchainId,
    pub extent: [u32; 2],
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProjectionLayer {
    pub space: SpaceId,
    pub views: Vec<ProjectionView>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Hand {
    Left,
    Right,
}

impl Hand {
    pub const BOTH: [Hand; 2] = [Hand::Left, Hand::Right];

    pub const fn index(self) -> usize {
        match self {
            Self::Left => 0,
            Self::Right => 1,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Right => "right",
        }
    }

    pub fn user_path(self) -> &'static str {
        match self {
            Self::Left => "/user/hand/left",
            Self::Right => "/user/hand/right",
        }
    }
}

/// The four gameplay actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionId {
    Grab,
    HandPose,
    Vibrate,
    Quit,
}

impl ActionId {
    pub const ALL: [ActionId; 4] = [
        ActionId::Grab,
        ActionId::HandPose,
        ActionId::Vibrate,
        ActionId::Quit,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Grab => "grab_object",
            Self::HandPose => "hand_pose",
            Self::Vibrate => "vibrate_hand",
            Self::Quit => "quit_session",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Self::Grab => "Grab Object",
            Self::HandPose => "Hand Pose",
            Self::Vibrate => "Vibrate Hand",
            Self::Quit => "Quit Session",
        }
    }

    /// Whether the action carries per-hand subaction paths. Quit is bound
    /// once for the whole session.
    pub fn per_hand(self) -> bool {
        !matches!(self, Self::Quit)
    }
}

/// Sampled state of one action, in the runtime's terms: the value, whether
/// any bound source is active, and whether the value changed during the most
/// recent sync.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActionValue<T> {
    pub current: T,
    pub changed_since_last_sync: bool,
    pub is_active: bool,
}

impl<T: Default> Default for ActionValue<T> {
    fn default() -> Self {
        Self {
            current: T::default(),
            changed_since_last_sync: false,
            is_active: false,
        }
    }
}

/// Haptic output request for one hand.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HapticPulse {
    pub amplitude: f32,
    pub duration_nanos: i64,
    pub frequency_hz: f32,
}

/// Runtime sentinel for "shortest pulse the hardware can produce".
pub const MIN_HAPTIC_DURATION: i64 = -1;
/// Runtime sentinel for "let the hardware pick the frequency".
pub const FREQUENCY_UNSPECIFIED: f32 = 0.0;

/// Suggested bindings for one interaction profile: the profile path plus
/// `(action, binding path)` pairs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProfileBindings {
    pub profile: &'static str,
    pub bindings: &'static [(ActionId, &'static str)],
}

/// Timeout that never expires, for swapchain image waits.
pub const INFINITE_DURATION: i64 = i64::MAX;

/// One runtime swapchain. Images cycle through an acquire, wait, release
/// protocol; violating that order is an error, not undefined behavior.
pub trait RuntimeSwapchain: Send {
    fn id(&self) -> SwapchainId;

    /// Handles for the images backing this swapchain, in image-index order.
    fn images(&self) -> RuntimeResult<Vec<u64>>;

    /// Reserve the next image for rendering and return its index.
    fn acquire(&mut self) -> RuntimeResult<u32>;

    /// Block until the acquired image is safe to write.
    fn wait_image(&mut self, timeout_nanos: i64) -> RuntimeResult<()>;

    /// Hand the image back to the compositor.
    fn release(&mut self) -> RuntimeResult<()>;
}

/// The application's entire view of an XR runtime.
///
/// Discovery methods are callable as soon as the bridge exists; session
/// methods require `create_session` to have succeeded; action queries
/// require `attach_actions`. Implementations report ordering violations as
/// [`RuntimeError::CallOrder`] rather than panicking.
pub trait RuntimeBridge: Send {
    fn label(&self) -> &'static str;

    fn describe(&self) -> RuntimeDescription;

    fn system_properties(&self) -> RuntimeResult<SystemProperties>;

    /// View configurations the system offers, in runtime preference order.
    fn view_configurations(&self) -> RuntimeResult<Vec<ViewConfigKind>>;

    fn view_config_views(&self, config: ViewConfigKind) -> RuntimeResult<Vec<ViewSpec>>;

    /// Blend modes for a view configuration, in runtime preference order.
    fn blend_modes(&self, config: ViewConfigKind) -> RuntimeResult<Vec<BlendMode>>;

    /// Names of the reference space types the session supports.
    fn reference_space_names(&self) -> RuntimeResult<Vec<String>>;

    fn create_session(&mut self, binding: &SessionBinding) -> RuntimeResult<SessionId>;

    /// Drain one event from the runtime queue, `None` when it is empty.
    fn poll_event(&mut self) -> RuntimeResult<Option<RuntimeEvent>>;

    fn begin_session(&mut self, config: ViewConfigKind) -> RuntimeResult<()>;

    fn end_session(&mut self) -> RuntimeResult<()>;

    /// Ask the runtime to wind the session down through `Stopping` toward
    /// `Exiting`. The state changes arrive as events, not synchronously.
    fn request_exit(&mut self) -> RuntimeResult<()>;

    fn create_reference_space(&mut self, base: BaseSpace, pose: Pose) -> RuntimeResult<SpaceId>;

    fn locate_space(
        &self,
        space: SpaceId,
        base: SpaceId,
        time: RuntimeTime,
    ) -> RuntimeResult<SpaceLocation>;

    fn locate_views(
        &self,
        config: ViewConfigKind,
        time: RuntimeTime,
        base: SpaceId,
    ) -> RuntimeResult<ViewSnapshot>;

    /// Swapchain format codes the session supports, in runtime preference
    /// order.
    fn swapchain_formats(&self) -> RuntimeResult<Vec<i64>>;

    fn create_swapchain(&mut self, spec: &SwapchainSpec) -> RuntimeResult<Box<dyn RuntimeSwapchain>>;

    fn wait_frame(&mut self) -> RuntimeResult<FrameTiming>;

    fn begin_frame(&mut self) -> RuntimeResult<()>;

    fn end_frame(
        &mut self,
        display_time: RuntimeTime,
        blend_mode: BlendMode,
        layers: &[ProjectionLayer],
    ) -> RuntimeResult<()>;

    /// Create the gameplay action set and its actions, and suggest bindings
    /// for every interaction profile in `profiles`.
    fn initialize_actions(&mut self, profiles: &[ProfileBindings]) -> RuntimeResult<()>;

    /// Create the pose-tracking space for one hand's aim, at an identity
    /// offset from the hand pose action.
    fn create_hand_space(&mut self, hand: Hand) -> RuntimeResult<SpaceId>;

    /// Attach the action set to the session. After this the set is
    /// immutable and action queries become legal.
    fn attach_actions(&mut self) -> RuntimeResult<()>;

    fn sync_actions(&mut self) -> RuntimeResult<()>;

    fn grab_state(&self, hand: Hand) -> RuntimeResult<ActionValue<f32>>;

    /// Whether the hand pose action has any active source this sync.
    fn pose_active(&self, hand: Hand) -> RuntimeResult<bool>;

    fn quit_state(&self) -> RuntimeResult<ActionValue<bool>>;

    fn apply_haptic(&mut self, hand: Hand, pulse: HapticPulse) -> RuntimeResult<()>;

    /// Human-readable names of the input sources an action is currently
    /// bound to. Empty before attach or when nothing is bound.
    fn action_sources(&self, action: ActionId) -> RuntimeResult<Vec<String>>;
}

/// Build the best runtime available: OpenXR when the feature is compiled in
/// and a runtime answers, otherwise the headless stand-in.
pub fn create_runtime(
    options: &Options,
    platform: &dyn PlatformPlugin,
) -> Box<dyn RuntimeBridge> {
    #[cfg(feature = "runtime-openxr")]
    {
        match openxr::OpenXrRuntime::initialize(options, platform) {
            Ok(runtime) => {
                log::info!("[runtime] OpenXR runtime initialized");
                return Box::new(runtime);
            }
            Err(err) => {
                log::warn!("[runtime] OpenXR unavailable, falling back to headless: {err}");
            }
        }
    }
    let requested = platform.instance_extensions();
    if !requested.is_empty() {
        log::debug!("[runtime] platform requested extensions: {requested:?}");
    }
    log::info!(
        "[runtime] using headless runtime ({} form factor)",
        options.form_factor.label()
    );
    Box::new(HeadlessRuntime::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hand_indices_are_stable() {
        assert_eq!(Hand::Left.index(), 0);
        assert_eq!(Hand::Right.index(), 1);
        assert_eq!(Hand::BOTH[0], Hand::Left);
    }

    #[test]
    fn quit_has_no_subaction_paths() {
        assert!(!ActionId::Quit.per_hand());
        for action in [ActionId::Grab, ActionId::HandPose, ActionId::Vibrate] {
            assert!(action.per_hand(), "{action:?} should be per hand");
        }
    }

    #[test]
    fn action_names_match_their_titles() {
        assert_eq!(ActionId::Grab.name(), "grab_object");
        assert_eq!(ActionId::Grab.title(), "Grab Object");
        assert_eq!(ActionId::Quit.name(), "quit_session");
        assert_eq!(ActionId::Quit.title(), "Quit Session");
    }

    #[cfg(not(feature = "runtime-openxr"))]
    #[test]
    fn factory_falls_back_to_headless() {
        let options = Options::default();
        let platform = crate::platform::NullPlatform;
        let runtime = create_runtime(&options, &platform);
        assert_eq!(runtime.label(), "headless");
    }
}
