//! Runtime stand-in that speaks the full bridge protocol from memory. It
//! enforces the same call ordering a real runtime would, synthesizes poses
//! and input in its self-driving mode, and journals everything it is asked
//! to do so tests can assert on the traffic instead of on log output.

use std::collections::HashSet;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use glam::{Quat, Vec3};

use crate::graphics::{
    SessionBinding, FORMAT_B8G8R8A8_SRGB, FORMAT_B8G8R8A8_UNORM, FORMAT_R8G8B8A8_SRGB,
    FORMAT_R8G8B8A8_UNORM,
};
use crate::math::{BaseSpace, Fov, Pose};
use crate::options::{BlendMode, ViewConfigKind};
use crate::runtime::{
    ActionId, ActionValue, FrameTiming, Hand, HapticPulse, ProfileBindings, ProjectionLayer,
    RuntimeBridge, RuntimeDescription, RuntimeError, RuntimeEvent, RuntimeResult, RuntimeSwapchain,
    RuntimeTime, SessionId, SessionState, SpaceId, SpaceLocation, SwapchainId, SwapchainSpec,
    SystemProperties, ViewPose, ViewSnapshot, ViewSpec,
};

const RECOMMENDED_EXTENT: [u32; 2] = [1440, 1600];
const MAX_EXTENT: [u32; 2] = [2880, 3200];
const IMAGES_PER_SWAPCHAIN: usize = 3;
const FRAME_PERIOD_NANOS: i64 = 16_666_667;
const EYE_OFFSET: f32 = 0.032;
const HEAD_HEIGHT: f32 = 1.6;

/// Knobs a test (or the self-driving mode) turns to shape what the runtime
/// reports next.
#[derive(Debug)]
struct Script {
    pending_events: VecDeque<RuntimeEvent>,
    grab: [f32; 2],
    grab_active: [bool; 2],
    pose_active: [bool; 2],
    quit_pressed: bool,
    tracking_valid: bool,
    should_render: bool,
    supported_bases: HashSet<BaseSpace>,
    unlocatable_spaces: HashSet<u64>,
    failing_spaces: HashSet<u64>,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            pending_events: VecDeque::new(),
            grab: [0.0; 2],
            grab_active: [true; 2],
            pose_active: [true; 2],
            quit_pressed: false,
            tracking_valid: true,
            should_render: true,
            supported_bases: HashSet::from([BaseSpace::View, BaseSpace::Local, BaseSpace::Stage]),
            unlocatable_spaces: HashSet::new(),
            failing_spaces: HashSet::new(),
        }
    }
}

/// One frame as submitted through `end_frame`.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameRecord {
    pub display_time: i64,
    pub blend_mode: BlendMode,
    /// View count of each submitted layer; empty when the frame carried no
    /// layers.
    pub layer_views: Vec<usize>,
}

/// Everything the runtime was asked to do, in order of arrival.
#[derive(Debug, Default)]
pub struct Journal {
    pub begin_session_calls: u32,
    pub end_session_calls: u32,
    pub exit_requests: u32,
    pub sync_calls: u32,
    pub haptics: Vec<(Hand, HapticPulse)>,
    pub frames: Vec<FrameRecord>,
}

/// Cloneable handle onto a [`HeadlessRuntime`]'s script and journal. Stays
/// valid after the runtime is boxed and moved into the application.
#[derive(Clone)]
pub struct HeadlessHandle {
    script: Arc<Mutex<Script>>,
    journal: Arc<Mutex<Journal>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl HeadlessHandle {
    pub fn push_event(&self, event: RuntimeEvent) {
        lock(&self.script).pending_events.push_back(event);
    }

    pub fn push_state(&self, state: SessionState, session: Option<SessionId>) {
        self.push_event(RuntimeEvent::StateChanged {
            state,
            session,
            time: RuntimeTime(0),
        });
    }

    pub fn set_grab(&self, hand: Hand, value: f32) {
        lock(&self.script).grab[hand.index()] = value;
    }

    pub fn set_grab_active(&self, hand: Hand, active: bool) {
        lock(&self.script).grab_active[hand.index()] = active;
    }

    pub fn set_pose_active(&self, hand: Hand, active: bool) {
        lock(&self.script).pose_active[hand.index()] = active;
    }

    pub fn set_quit_pressed(&self, pressed: bool) {
        lock(&self.script).quit_pressed = pressed;
    }

    pub fn set_tracking_valid(&self, valid: bool) {
        lock(&self.script).tracking_valid = valid;
    }

    pub fn set_should_render(&self, should_render: bool) {
        lock(&self.script).should_render = should_render;
    }

    /// Drop a base space from the supported set, making creation of spaces
    /// over it fail the way a runtime without (say) stage tracking would.
    pub fn remove_base_space(&self, base: BaseSpace) {
        lock(&self.script).supported_bases.remove(&base);
    }

    /// Make `locate_space` report the space with invalid tracking flags.
    pub fn set_space_unlocatable(&self, space: SpaceId, unlocatable: bool) {
        let mut script = lock(&self.script);
        if unlocatable {
            script.unlocatable_spaces.insert(space.0);
        } else {
            script.unlocatable_spaces.remove(&space.0);
        }
    }

    /// Make `locate_space` fail outright for one space.
    pub fn set_space_failing(&self, space: SpaceId, failing: bool) {
        let mut script = lock(&self.script);
        if failing {
            script.failing_spaces.insert(space.0);
        } else {
            script.failing_spaces.remove(&space.0);
        }
    }

    pub fn begin_session_calls(&self) -> u32 {
        lock(&self.journal).begin_session_calls
    }

    pub fn end_session_calls(&self) -> u32 {
        lock(&self.journal).end_session_calls
    }

    pub fn exit_requests(&self) -> u32 {
        lock(&self.journal).exit_requests
    }

    pub fn sync_calls(&self) -> u32 {
        lock(&self.journal).sync_calls
    }

    pub fn haptics(&self) -> Vec<(Hand, HapticPulse)> {
        lock(&self.journal).haptics.clone()
    }

    pub fn frames(&self) -> Vec<FrameRecord> {
        lock(&self.journal).frames.clone()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FramePhase {
    Idle,
    Waited,
    Begun,
}

#[derive(Debug, Clone, Copy)]
enum SpaceKind {
    Reference { base: BaseSpace, pose: Pose },
    HandGrip { hand: Hand },
}

#[derive(Debug, Clone, Copy, Default)]
struct ActionSnapshots {
    grab: [ActionValue<f32>; 2],
    pose_active: [bool; 2],
    quit: ActionValue<bool>,
}

pub struct HeadlessRuntime {
    script: Arc<Mutex<Script>>,
    journal: Arc<Mutex<Journal>>,
    /// Self-driving mode: queue lifecycle events and synthesize input so the
    /// binary runs a full session with nobody scripting it.
    auto: bool,
    frame_sleep: Duration,
    clock_nanos: i64,
    session: Option<SessionId>,
    running: bool,
    exit_requested: bool,
    frame_phase: FramePhase,
    spaces: Vec<SpaceKind>,
    chains_created: u64,
    profiles: Vec<ProfileBindings>,
    actions_ready: bool,
    attached: bool,
    snapshots: ActionSnapshots,
}

impl HeadlessRuntime {
    /// Self-driving runtime with real-time frame pacing, as handed out by
    /// the runtime factory.
    pub fn new() -> Self {
        Self::build(true, Duration::from_nanos(FRAME_PERIOD_NANOS as u64))
    }

    /// Fully scripted runtime with no frame pacing, plus the handle that
    /// scripts it. Nothing happens unless the handle makes it happen.
    pub fn scripted() -> (Self, HeadlessHandle) {
        let runtime = Self::build(false, Duration::ZERO);
        let handle = runtime.handle();
        (runtime, handle)
    }

    fn build(auto: bool, frame_sleep: Duration) -> Self {
        Self {
            script: Arc::new(Mutex::new(Script::default())),
            journal: Arc::new(Mutex::new(Journal::default())),
            auto,
            frame_sleep,
            clock_nanos: 0,
            session: None,
            running: false,
            exit_requested: false,
            frame_phase: FramePhase::Idle,
            spaces: Vec::new(),
            chains_created: 0,
            profiles: Vec::new(),
            actions_ready: false,
            attached: false,
            snapshots: ActionSnapshots::default(),
        }
    }

    pub fn handle(&self) -> HeadlessHandle {
        HeadlessHandle {
            script: Arc::clone(&self.script),
            journal: Arc::clone(&self.journal),
        }
    }

    fn session_id(&self) -> RuntimeResult<SessionId> {
        self.session.ok_or(RuntimeError::NoSession)
    }

    fn queue_state(&self, state: SessionState) {
        let event = RuntimeEvent::StateChanged {
            state,
            session: self.session,
            time: RuntimeTime(self.clock_nanos),
        };
        lock(&self.script).pending_events.push_back(event);
    }

    fn space(&self, id: SpaceId) -> RuntimeResult<SpaceKind> {
        let index = (id.0 as usize)
            .checked_sub(1)
            .ok_or(RuntimeError::UnknownSpace(id.0))?;
        self.spaces
            .get(index)
            .copied()
            .ok_or(RuntimeError::UnknownSpace(id.0))
    }

    fn clock_seconds(&self) -> f32 {
        self.clock_nanos as f32 * 1e-9
    }

    /// Current head pose in the shared world frame. The self-driving mode
    /// adds a little sway so motion shows up in the logs.
    fn head_pose(&self) -> Pose {
        let sway = if self.auto {
            0.01 * (self.clock_seconds() * 0.5).sin()
        } else {
            0.0
        };
        Pose::translation([sway, HEAD_HEIGHT, 0.0])
    }

    /// World pose of a base frame. Local starts at head height, stage at the
    /// floor, view follows the head.
    fn base_world_pose(&self, base: BaseSpace) -> Pose {
        match base {
            BaseSpace::View => self.head_pose(),
            BaseSpace::Local => Pose::translation([0.0, HEAD_HEIGHT, 0.0]),
            BaseSpace::Stage => Pose::IDENTITY,
        }
    }

    fn hand_world_pose(&self, hand: Hand) -> Pose {
        let side = match hand {
            Hand::Left => -1.0,
            Hand::Right => 1.0,
        };
        let (bob, reach) = if self.auto {
            let t = self.clock_seconds();
            (0.05 * (t * 1.3).sin(), 0.1 * (t * 0.9).cos())
        } else {
            (0.0, 0.0)
        };
        Pose::translation([side * 0.3, 1.4 + bob, -0.4 + reach])
    }

    fn world_pose(&self, kind: SpaceKind) -> Pose {
        match kind {
            SpaceKind::Reference { base, pose } => self.base_world_pose(base).compose(pose),
            SpaceKind::HandGrip { hand } => self.hand_world_pose(hand),
        }
    }

    /// Synthesized hand input for the self-driving mode: a slow squeeze
    /// cycle that crosses the haptic threshold once per period.
    fn auto_grab(&self, hand: Hand) -> f32 {
        let phase = match hand {
            Hand::Left => 0.0,
            Hand::Right => std::f32::consts::PI,
        };
        let raw = (self.clock_seconds() * 0.8 + phase).sin();
        (raw * 1.25).clamp(0.0, 1.0)
    }
}

impl Default for HeadlessRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl RuntimeBridge for HeadlessRuntime {
    fn label(&self) -> &'static str {
        "headless"
    }

    fn describe(&self) -> RuntimeDescription {
        RuntimeDescription {
            runtime_name: "Headless".to_string(),
            runtime_version: env!("CARGO_PKG_VERSION").to_string(),
            layers: Vec::new(),
            extensions: Vec::new(),
        }
    }

    fn system_properties(&self) -> RuntimeResult<SystemProperties> {
        Ok(SystemProperties {
            system_name: "Headless System".to_string(),
            vendor_id: 0,
            max_swapchain_extent: MAX_EXTENT,
            max_layer_count: 16,
            orientation_tracking: true,
            position_tracking: true,
        })
    }

    fn view_configurations(&self) -> RuntimeResult<Vec<ViewConfigKind>> {
        Ok(vec![ViewConfigKind::Stereo, ViewConfigKind::Mono])
    }

    fn view_config_views(&self, config: ViewConfigKind) -> RuntimeResult<Vec<ViewSpec>> {
        let spec = ViewSpec {
            recommended_extent: RECOMMENDED_EXTENT,
            max_extent: MAX_EXTENT,
            recommended_samples: 1,
            max_samples: 4,
        };
        Ok(vec![spec; config.view_count()])
    }

    fn blend_modes(&self, _config: ViewConfigKind) -> RuntimeResult<Vec<BlendMode>> {
        Ok(vec![BlendMode::Opaque])
    }

    fn reference_space_names(&self) -> RuntimeResult<Vec<String>> {
        self.session_id()?;
        let script = lock(&self.script);
        let mut names: Vec<String> = script
            .supported_bases
            .iter()
            .map(|base| base.label().to_string())
            .collect();
        names.sort();
        Ok(names)
    }

    fn create_session(&mut self, binding: &SessionBinding) -> RuntimeResult<SessionId> {
        if self.session.is_some() {
            return Err(RuntimeError::SessionExists);
        }
        log::debug!(
            "[runtime] creating headless session for the {} device (id {})",
            binding.backend,
            binding.device_id
        );
        let session = SessionId(1);
        self.session = Some(session);
        if self.auto {
            self.queue_state(SessionState::Idle);
            self.queue_state(SessionState::Ready);
        }
        Ok(session)
    }

    fn poll_event(&mut self) -> RuntimeResult<Option<RuntimeEvent>> {
        Ok(lock(&self.script).pending_events.pop_front())
    }

    fn begin_session(&mut self, config: ViewConfigKind) -> RuntimeResult<()> {
        self.session_id()?;
        if self.running {
            return Err(RuntimeError::CallOrder("begin_session on a running session"));
        }
        if !self.view_configurations()?.contains(&config) {
            return Err(RuntimeError::UnsupportedViewConfiguration(config));
        }
        self.running = true;
        lock(&self.journal).begin_session_calls += 1;
        if self.auto {
            self.queue_state(SessionState::Synchronized);
            self.queue_state(SessionState::Visible);
            self.queue_state(SessionState::Focused);
        }
        Ok(())
    }

    fn end_session(&mut self) -> RuntimeResult<()> {
        self.session_id()?;
        if !self.running {
            return Err(RuntimeError::CallOrder("end_session without a running session"));
        }
        self.running = false;
        lock(&self.journal).end_session_calls += 1;
        if self.auto {
            self.queue_state(SessionState::Idle);
            if self.exit_requested {
                self.queue_state(SessionState::Exiting);
            }
        }
        Ok(())
    }

    fn request_exit(&mut self) -> RuntimeResult<()> {
        self.session_id()?;
        if !self.running {
            return Err(RuntimeError::CallOrder("request_exit without a running session"));
        }
        self.exit_requested = true;
        lock(&self.journal).exit_requests += 1;
        if self.auto {
            self.queue_state(SessionState::Stopping);
        }
        Ok(())
    }

    fn create_reference_space(&mut self, base: BaseSpace, pose: Pose) -> RuntimeResult<SpaceId> {
        self.session_id()?;
        if !lock(&self.script).supported_bases.contains(&base) {
            return Err(RuntimeError::Api(format!(
                "reference space type {} is not supported",
                base.label()
            )));
        }
        self.spaces.push(SpaceKind::Reference { base, pose });
        Ok(SpaceId(self.spaces.len() as u64))
    }

    fn locate_space(
        &self,
        space: SpaceId,
        base: SpaceId,
        _time: RuntimeTime,
    ) -> RuntimeResult<SpaceLocation> {
        let target = self.space(space)?;
        let reference = self.space(base)?;
        {
            let script = lock(&self.script);
            if script.failing_spaces.contains(&space.0) {
                return Err(RuntimeError::Api(format!(
                    "tracking lost for space {}",
                    space.0
                )));
            }
            if script.unlocatable_spaces.contains(&space.0) {
                return Ok(SpaceLocation {
                    pose: Pose::IDENTITY,
                    position_valid: false,
                    orientation_valid: false,
                });
            }
        }
        let pose = self
            .world_pose(reference)
            .inverse()
            .compose(self.world_pose(target));
        Ok(SpaceLocation {
            pose,
            position_valid: true,
            orientation_valid: true,
        })
    }

    fn locate_views(
        &self,
        config: ViewConfigKind,
        _time: RuntimeTime,
        base: SpaceId,
    ) -> RuntimeResult<ViewSnapshot> {
        self.session_id()?;
        let reference = self.space(base)?;
        let tracking_valid = lock(&self.script).tracking_valid;
        let head_in_base = self
            .world_pose(reference)
            .inverse()
            .compose(self.head_pose());
        let fov = Fov::symmetric(std::f32::consts::FRAC_PI_4);
        let views = match config {
            ViewConfigKind::Mono => vec![ViewPose {
                pose: head_in_base,
                fov,
            }],
            ViewConfigKind::Stereo => Hand::BOTH
                .iter()
                .map(|hand| {
                    let side = match hand {
                        Hand::Left => -EYE_OFFSET,
                        Hand::Right => EYE_OFFSET,
                    };
                    ViewPose {
                        pose: head_in_base.compose(Pose {
                            orientation: Quat::IDENTITY,
                            position: Vec3::new(side, 0.0, 0.0),
                        }),
                        fov,
                    }
                })
                .collect(),
        };
        Ok(ViewSnapshot {
            position_valid: tracking_valid,
            orientation_valid: tracking_valid,
            views,
        })
    }

    fn swapchain_formats(&self) -> RuntimeResult<Vec<i64>> {
        self.session_id()?;
        Ok(vec![
            FORMAT_R8G8B8A8_SRGB,
            FORMAT_B8G8R8A8_SRGB,
            FORMAT_R8G8B8A8_UNORM,
            FORMAT_B8G8R8A8_UNORM,
        ])
    }

    fn create_swapchain(&mut self, spec: &SwapchainSpec) -> RuntimeResult<Box<dyn RuntimeSwapchain>> {
        self.session_id()?;
        if !self.swapchain_formats()?.contains(&spec.format) {
            return Err(RuntimeError::Api(format!(
                "swapchain format {} is not supported",
                spec.format
            )));
        }
        self.chains_created += 1;
        let id = SwapchainId(self.chains_created);
        Ok(Box::new(HeadlessSwapchain::new(id)))
    }

    fn wait_frame(&mut self) -> RuntimeResult<FrameTiming> {
        self.session_id()?;
        if !self.running {
            return Err(RuntimeError::CallOrder("wait_frame without a running session"));
        }
        if self.frame_phase != FramePhase::Idle {
            return Err(RuntimeError::CallOrder(
                "wait_frame before the previous frame ended",
            ));
        }
        if !self.frame_sleep.is_zero() {
            thread::sleep(self.frame_sleep);
        }
        self.clock_nanos += FRAME_PERIOD_NANOS;
        self.frame_phase = FramePhase::Waited;
        let should_render = lock(&self.script).should_render;
        Ok(FrameTiming {
            predicted_display_time: RuntimeTime(self.clock_nanos + FRAME_PERIOD_NANOS),
            should_render,
        })
    }

    fn begin_frame(&mut self) -> RuntimeResult<()> {
        self.session_id()?;
        if self.frame_phase != FramePhase::Waited {
            return Err(RuntimeError::CallOrder("begin_frame before wait_frame"));
        }
        self.frame_phase = FramePhase::Begun;
        Ok(())
    }

    fn end_frame(
        &mut self,
        display_time: RuntimeTime,
        blend_mode: BlendMode,
        layers: &[ProjectionLayer],
    ) -> RuntimeResult<()> {
        self.session_id()?;
        if self.frame_phase != FramePhase::Begun {
            return Err(RuntimeError::CallOrder("end_frame before begin_frame"));
        }
        self.frame_phase = FramePhase::Idle;
        lock(&self.journal).frames.push(FrameRecord {
            display_time: display_time.as_nanos(),
            blend_mode,
            layer_views: layers.iter().map(|layer| layer.views.len()).collect(),
        });
        Ok(())
    }

    fn initialize_actions(&mut self, profiles: &[ProfileBindings]) -> RuntimeResult<()> {
        if self.actions_ready {
            return Err(RuntimeError::CallOrder("actions already initialized"));
        }
        self.profiles = profiles.to_vec();
        self.actions_ready = true;
        Ok(())
    }

    fn create_hand_space(&mut self, hand: Hand) -> RuntimeResult<SpaceId> {
        self.session_id()?;
        if !self.actions_ready {
            return Err(RuntimeError::CallOrder(
                "create_hand_space before initialize_actions",
            ));
        }
        self.spaces.push(SpaceKind::HandGrip { hand });
        Ok(SpaceId(self.spaces.len() as u64))
    }

    fn attach_actions(&mut self) -> RuntimeResult<()> {
        self.session_id()?;
        if !self.actions_ready {
            return Err(RuntimeError::CallOrder(
                "attach_actions before initialize_actions",
            ));
        }
        if self.attached {
            return Err(RuntimeError::CallOrder("action set already attached"));
        }
        self.attached = true;
        Ok(())
    }

    fn sync_actions(&mut self) -> RuntimeResult<()> {
        self.session_id()?;
        if !self.attached {
            return Err(RuntimeError::CallOrder("sync_actions before attach_actions"));
        }
        lock(&self.journal).sync_calls += 1;

        let (grab_values, grab_active, pose_active, quit_pressed) = {
            let script = lock(&self.script);
            let grab_values = if self.auto {
                [self.auto_grab(Hand::Left), self.auto_grab(Hand::Right)]
            } else {
                script.grab
            };
            (
                grab_values,
                script.grab_active,
                script.pose_active,
                script.quit_pressed,
            )
        };

        for hand in Hand::BOTH {
            let index = hand.index();
            let previous = self.snapshots.grab[index];
            self.snapshots.grab[index] = ActionValue {
                current: grab_values[index],
                changed_since_last_sync: grab_values[index] != previous.current,
                is_active: grab_active[index],
            };
        }
        self.snapshots.pose_active = pose_active;
        let previous_quit = self.snapshots.quit;
        self.snapshots.quit = ActionValue {
            current: quit_pressed,
            changed_since_last_sync: quit_pressed != previous_quit.current,
            is_active: true,
        };
        Ok(())
    }

    fn grab_state(&self, hand: Hand) -> RuntimeResult<ActionValue<f32>> {
        if !self.attached {
            return Err(RuntimeError::CallOrder("grab_state before attach_actions"));
        }
        Ok(self.snapshots.grab[hand.index()])
    }

    fn pose_active(&self, hand: Hand) -> RuntimeResult<bool> {
        if !self.attached {
            return Err(RuntimeError::CallOrder("pose_active before attach_actions"));
        }
        Ok(self.snapshots.pose_active[hand.index()])
    }

    fn quit_state(&self) -> RuntimeResult<ActionValue<bool>> {
        if !self.attached {
            return Err(RuntimeError::CallOrder("quit_state before attach_actions"));
        }
        Ok(self.snapshots.quit)
    }

    fn apply_haptic(&mut self, hand: Hand, pulse: HapticPulse) -> RuntimeResult<()> {
        if !self.attached {
            return Err(RuntimeError::CallOrder("apply_haptic before attach_actions"));
        }
        lock(&self.journal).haptics.push((hand, pulse));
        Ok(())
    }

    fn action_sources(&self, action: ActionId) -> RuntimeResult<Vec<String>> {
        if !self.attached {
            return Ok(Vec::new());
        }
        // Pretend the simple controller profile is the one in play.
        let simple = self
            .profiles
            .iter()
            .find(|profile| profile.profile.ends_with("khr/simple_controller"));
        let Some(profile) = simple else {
            return Ok(Vec::new());
        };
        Ok(profile
            .bindings
            .iter()
            .filter(|(bound, _)| *bound == action)
            .map(|(_, path)| (*path).to_string())
            .collect())
    }
}

/// Swapchain with three recycled images and strict protocol enforcement.
#[derive(Debug)]
pub struct HeadlessSwapchain {
    id: SwapchainId,
    images: Vec<u64>,
    phase: ChainPhase,
    next_image: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChainPhase {
    Idle,
    Acquired,
    Waited,
}

impl HeadlessSwapchain {
    fn new(id: SwapchainId) -> Self {
        let images = (0..IMAGES_PER_SWAPCHAIN as u64)
            .map(|index| (id.0 << 8) | index)
            .collect();
        Self {
            id,
            images,
            phase: ChainPhase::Idle,
            next_image: 0,
        }
    }
}

impl RuntimeSwapchain for HeadlessSwapchain {
    fn id(&self) -> SwapchainId {
        self.id
    }

    fn images(&self) -> RuntimeResult<Vec<u64>> {
        Ok(self.images.clone())
    }

    fn acquire(&mut self) -> RuntimeResult<u32> {
        if self.phase != ChainPhase::Idle {
            return Err(RuntimeError::CallOrder(
                "acquire before releasing the previous image",
            ));
        }
        self.phase = ChainPhase::Acquired;
        Ok(self.next_image as u32)
    }

    fn wait_image(&mut self, _timeout_nanos: i64) -> RuntimeResult<()> {
        if self.phase != ChainPhase::Acquired {
            return Err(RuntimeError::CallOrder("wait_image before acquire"));
        }
        self.phase = ChainPhase::Waited;
        Ok(())
    }

    fn release(&mut self) -> RuntimeResult<()> {
        if self.phase != ChainPhase::Waited {
            return Err(RuntimeError::CallOrder("release before wait_image"));
        }
        self.phase = ChainPhase::Idle;
        self.next_image = (self.next_image + 1) % self.images.len();
        Ok(())
    }
}
