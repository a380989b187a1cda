//! Session lifecycle state machine. Runtime events drive every transition;
//! nothing here moves the state on its own. The machine owns the decisions
//! the rest of the loop consumes: whether frames may be submitted, whether
//! input is worth syncing, and whether the process should leave the render
//! loop (and if so, whether a fresh instance should be stood up afterward).

use crate::runtime::{
    ActionId, RuntimeBridge, RuntimeError, RuntimeEvent, SessionId, SessionState,
};
use crate::options::ViewConfigKind;

/// What the render loop should do after an event drain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LoopSignal {
    /// Leave the render loop.
    pub exit: bool,
    /// After leaving, tear down and create a new instance rather than
    /// terminating.
    pub restart: bool,
}

#[derive(Debug)]
pub struct SessionLifecycle {
    state: SessionState,
    session: Option<SessionId>,
    running: bool,
    view_config: ViewConfigKind,
}

impl SessionLifecycle {
    pub fn new(view_config: ViewConfigKind) -> Self {
        Self {
            state: SessionState::Unknown,
            session: None,
            running: false,
            view_config,
        }
    }

    pub fn bind_session(&mut self, session: SessionId) {
        self.session = Some(session);
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Whether the session sits between `begin_session` and `end_session`,
    /// meaning the frame loop must keep waiting and submitting frames.
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Input only reaches the application while focused.
    pub fn is_focused(&self) -> bool {
        self.state == SessionState::Focused
    }

    /// Drain every pending runtime event and fold the results into one
    /// signal. Draining completely each tick keeps an `Exiting` that follows
    /// a burst of earlier transitions from being missed until the next tick.
    pub fn poll_events(
        &mut self,
        bridge: &mut dyn RuntimeBridge,
    ) -> Result<LoopSignal, RuntimeError> {
        let mut signal = LoopSignal::default();
        while let Some(event) = bridge.poll_event()? {
            match event {
                RuntimeEvent::StateChanged {
                    state,
                    session,
                    time,
                } => {
                    self.handle_state_change(bridge, state, session, time.as_nanos(), &mut signal)?;
                }
                RuntimeEvent::InstanceLossPending { loss_time } => {
                    log::warn!(
                        "[session] instance loss pending at {}",
                        loss_time.as_nanos()
                    );
                    signal.exit = true;
                    signal.restart = true;
                }
                RuntimeEvent::EventsLost { count } => {
                    log::warn!("[session] {count} runtime events lost");
                }
                RuntimeEvent::InteractionProfileChanged => {
                    self.log_action_sources(bridge)?;
                }
                RuntimeEvent::ReferenceSpaceChangePending { session } => {
                    log::debug!("[session] ignoring reference space change for {session:?}");
                }
            }
        }
        Ok(signal)
    }

    fn handle_state_change(
        &mut self,
        bridge: &mut dyn RuntimeBridge,
        state: SessionState,
        session: Option<SessionId>,
        time_nanos: i64,
        signal: &mut LoopSignal,
    ) -> Result<(), RuntimeError> {
        // A state event naming a session we do not own is someone else's
        // news. Log it and change nothing.
        if session.is_some() && session != self.session {
            log::error!("[session] state change for unknown session {session:?}");
            return Ok(());
        }

        let old_state = self.state;
        self.state = state;
        log::info!(
            "[session] state {} -> {} (session={:?} time={})",
            old_state.label(),
            state.label(),
            session,
            time_nanos
        );

        match state {
            SessionState::Ready => {
                bridge.begin_session(self.view_config)?;
                self.running = true;
                log::info!(
                    "[session] session began with {} views",
                    self.view_config.label()
                );
            }
            SessionState::Stopping => {
                self.running = false;
                bridge.end_session()?;
            }
            SessionState::Exiting => {
                signal.exit = true;
                signal.restart = false;
            }
            SessionState::LossPending => {
                // Session (not instance) loss: poll for a new system and
                // try again with a fresh instance.
                signal.exit = true;
                signal.restart = true;
            }
            _ => {}
        }
        Ok(())
    }

    fn log_action_sources(&self, bridge: &mut dyn RuntimeBridge) -> Result<(), RuntimeError> {
        for action in ActionId::ALL {
            let sources = bridge.action_sources(action)?;
            if sources.is_empty() {
                log::info!("[input] {} action is bound to nothing", action.name());
            } else {
                let joined = sources
                    .iter()
                    .map(|source| format!("'{source}'"))
                    .collect::<Vec<_>>()
                    .join(" and ");
                log::info!("[input] {} action is bound to {joined}", action.name());
            }
        }
        Ok(())
    }
}
