//! Gameplay input: one action set, four actions, and suggested bindings for
//! the five controller profiles the application knows. Polling is pull-based
//! and runs once per frame while the session is running; outside focus the
//! runtime simply reports every action inactive.

use crate::runtime::{
    ActionId, ActionValue, Hand, HapticPulse, ProfileBindings, RuntimeBridge, RuntimeError,
    SpaceId, FREQUENCY_UNSPECIFIED, MIN_HAPTIC_DURATION,
};

pub const ACTION_SET_NAME: &str = "gameplay";
pub const ACTION_SET_TITLE: &str = "Gameplay";
pub const ACTION_SET_PRIORITY: u32 = 0;

/// Squeeze level above which a haptic pulse fires. Strictly above: a grab at
/// exactly the threshold stays silent.
pub const GRAB_HAPTIC_THRESHOLD: f32 = 0.9;

pub const GRAB_PULSE: HapticPulse = HapticPulse {
    amplitude: 0.5,
    duration_nanos: MIN_HAPTIC_DURATION,
    frequency_hz: FREQUENCY_UNSPECIFIED,
};

/// Cube edge scale for a hand: full size when open, half size at full grab.
pub fn hand_scale_for_grab(grab: f32) -> f32 {
    1.0 - 0.5 * grab
}

pub fn grab_wants_haptic(grab: f32) -> bool {
    grab > GRAB_HAPTIC_THRESHOLD
}

/// A quit press counts only on the sync where it changed to pressed while
/// its source was active. Holding the button does not retrigger.
pub fn quit_edge(value: &ActionValue<bool>) -> bool {
    value.is_active && value.changed_since_last_sync && value.current
}

const KHR_SIMPLE: &[(ActionId, &str)] = &[
    (ActionId::Grab, "/user/hand/left/input/select/click"),
    (ActionId::Grab, "/user/hand/right/input/select/click"),
    (ActionId::HandPose, "/user/hand/left/input/grip/pose"),
    (ActionId::HandPose, "/user/hand/right/input/grip/pose"),
    (ActionId::Quit, "/user/hand/left/input/menu/click"),
    (ActionId::Quit, "/user/hand/right/input/menu/click"),
    (ActionId::Vibrate, "/user/hand/left/output/haptic"),
    (ActionId::Vibrate, "/user/hand/right/output/haptic"),
];

// The touch controller has no menu button on the right; quit binds to the
// left menu only.
const OCULUS_TOUCH: &[(ActionId, &str)] = &[
    (ActionId::Grab, "/user/hand/left/input/squeeze/value"),
    (ActionId::Grab, "/user/hand/right/input/squeeze/value"),
    (ActionId::HandPose, "/user/hand/left/input/grip/pose"),
    (ActionId::HandPose, "/user/hand/right/input/grip/pose"),
    (ActionId::Quit, "/user/hand/left/input/menu/click"),
    (ActionId::Vibrate, "/user/hand/left/output/haptic"),
    (ActionId::Vibrate, "/user/hand/right/output/haptic"),
];

const HTC_VIVE: &[(ActionId, &str)] = &[
    (ActionId::Grab, "/user/hand/left/input/trigger/value"),
    (ActionId::Grab, "/user/hand/right/input/trigger/value"),
    (ActionId::HandPose, "/user/hand/left/input/grip/pose"),
    (ActionId::HandPose, "/user/hand/right/input/grip/pose"),
    (ActionId::Quit, "/user/hand/left/input/menu/click"),
    (ActionId::Quit, "/user/hand/right/input/menu/click"),
    (ActionId::Vibrate, "/user/hand/left/output/haptic"),
    (ActionId::Vibrate, "/user/hand/right/output/haptic"),
];

const VALVE_INDEX: &[(ActionId, &str)] = &[
    (ActionId::Grab, "/user/hand/left/input/squeeze/force"),
    (ActionId::Grab, "/user/hand/right/input/squeeze/force"),
    (ActionId::HandPose, "/user/hand/left/input/grip/pose"),
    (ActionId::HandPose, "/user/hand/right/input/grip/pose"),
    (ActionId::Quit, "/user/hand/left/input/b/click"),
    (ActionId::Quit, "/user/hand/right/input/b/click"),
    (ActionId::Vibrate, "/user/hand/left/output/haptic"),
    (ActionId::Vibrate, "/user/hand/right/output/haptic"),
];

const MICROSOFT_MOTION: &[(ActionId, &str)] = &[
    (ActionId::Grab, "/user/hand/left/input/squeeze/click"),
    (ActionId::Grab, "/user/hand/right/input/squeeze/click"),
    (ActionId::HandPose, "/user/hand/left/input/grip/pose"),
    (ActionId::HandPose, "/user/hand/right/input/grip/pose"),
    (ActionId::Quit, "/user/hand/left/input/menu/click"),
    (ActionId::Quit, "/user/hand/right/input/menu/click"),
    (ActionId::Vibrate, "/user/hand/left/output/haptic"),
    (ActionId::Vibrate, "/user/hand/right/output/haptic"),
];

/// Suggested bindings for every profile we ship, keyed by interaction
/// profile path.
pub fn suggested_bindings() -> [ProfileBindings; 5] {
    [
        ProfileBindings {
            profile: "/interaction_profiles/khr/simple_controller",
            bindings: KHR_SIMPLE,
        },
        ProfileBindings {
            profile: "/interaction_profiles/oculus/touch_controller",
            bindings: OCULUS_TOUCH,
        },
        ProfileBindings {
            profile: "/interaction_profiles/htc/vive_controller",
            bindings: HTC_VIVE,
        },
        ProfileBindings {
            profile: "/interaction_profiles/valve/index_controller",
            bindings: VALVE_INDEX,
        },
        ProfileBindings {
            profile: "/interaction_profiles/microsoft/motion_controller",
            bindings: MICROSOFT_MOTION,
        },
    ]
}

/// Per-hand input state carried across frames. Construction is all or
/// nothing: if any runtime step fails, no `InputState` exists and the error
/// propagates.
#[derive(Debug)]
pub struct InputState {
    hand_spaces: [SpaceId; 2],
    hand_scale: [f32; 2],
    hand_active: [bool; 2],
}

impl InputState {
    pub fn initialize(bridge: &mut dyn RuntimeBridge) -> Result<Self, RuntimeError> {
        let profiles = suggested_bindings();
        bridge.initialize_actions(&profiles)?;
        let left = bridge.create_hand_space(Hand::Left)?;
        let right = bridge.create_hand_space(Hand::Right)?;
        bridge.attach_actions()?;
        log::info!(
            "[input] action set {ACTION_SET_NAME:?} attached with {} profiles",
            profiles.len()
        );
        Ok(Self {
            hand_spaces: [left, right],
            hand_scale: [1.0; 2],
            hand_active: [false; 2],
        })
    }

    /// Sync actions and fold the results into per-hand state. Pose activity
    /// is re-derived every poll; grab scale keeps its last value while the
    /// grab source is inactive.
    pub fn poll(&mut self, bridge: &mut dyn RuntimeBridge) -> Result<(), RuntimeError> {
        self.hand_active = [false; 2];
        bridge.sync_actions()?;

        for hand in Hand::BOTH {
            let grab = bridge.grab_state(hand)?;
            if grab.is_active {
                self.hand_scale[hand.index()] = hand_scale_for_grab(grab.current);
                if grab_wants_haptic(grab.current) {
                    bridge.apply_haptic(hand, GRAB_PULSE)?;
                }
            }
            self.hand_active[hand.index()] = bridge.pose_active(hand)?;
        }

        let quit = bridge.quit_state()?;
        if quit_edge(&quit) {
            log::info!("[input] quit requested through the quit action");
            bridge.request_exit()?;
        }
        Ok(())
    }

    pub fn hand_space(&self, hand: Hand) -> SpaceId {
        self.hand_spaces[hand.index()]
    }

    pub fn hand_scale(&self, hand: Hand) -> f32 {
        self.hand_scale[hand.index()]
    }

    pub fn hand_active(&self, hand: Hand) -> bool {
        self.hand_active[hand.index()]
    }
}
