//! Per-frame pipeline: wait, begin, gather the cube scene, render each view
//! into its swapchain, and submit. Every frame that waits also begins and
//! ends, including frames where nothing is rendered.

use glam::Mat4;
use thiserror::Error;

use crate::graphics::{CubeDraw, GraphicsBackend, GraphicsError};
use crate::input::InputState;
use crate::math::{self, Pose};
use crate::options::{BlendMode, ReferenceSpace, ViewConfigKind};
use crate::runtime::{
    Hand, ProjectionLayer, ProjectionView, RuntimeBridge, RuntimeError, RuntimeTime, SpaceId,
};
use crate::swapchain::{SwapchainError, SwapchainSet};

pub const CLEAR_COLOR: [f32; 4] = [0.35, 0.35, 0.35, 1.0];
pub const NEAR_CLIP: f32 = 0.05;
pub const FAR_CLIP: f32 = 20.0;

/// Edge length for the cubes marking visualized reference spaces.
pub const SPACE_CUBE_SCALE: f32 = 0.25;
/// Base edge length for hand cubes, before the grab squeeze scales it.
pub const HAND_CUBE_SCALE: f32 = 0.1;

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("runtime located {located} views but {expected} swapchains exist")]
    ViewCountMismatch { located: usize, expected: usize },
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
    #[error(transparent)]
    Graphics(#[from] GraphicsError),
    #[error(transparent)]
    Swapchain(#[from] SwapchainError),
}

/// The session's spaces: the application base space plus the visualized set
/// that survived creation.
pub struct SceneSpaces {
    pub app_space: SpaceId,
    pub visualized: Vec<(SpaceId, ReferenceSpace)>,
}

/// One cube to draw this frame, posed in the application space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cube {
    pub pose: Pose,
    pub scale: f32,
}

/// What a completed frame did, for callers that count or log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameOutcome {
    pub display_time: RuntimeTime,
    pub rendered_views: usize,
    pub layer_count: usize,
}

pub struct FrameRenderer {
    view_config: ViewConfigKind,
    blend_mode: BlendMode,
}

impl FrameRenderer {
    pub fn new(view_config: ViewConfigKind, blend_mode: BlendMode) -> Self {
        Self {
            view_config,
            blend_mode,
        }
    }

    /// Run one frame end to end. `end_frame` is reached on every path that
    /// passed `begin_frame`, with zero layers whenever the runtime asked for
    /// no rendering or tracking was invalid.
    pub fn render_frame(
        &mut self,
        bridge: &mut dyn RuntimeBridge,
        backend: &mut dyn GraphicsBackend,
        swapchains: &mut SwapchainSet,
        input: &InputState,
        spaces: &SceneSpaces,
    ) -> Result<FrameOutcome, FrameError> {
        let timing = bridge.wait_frame()?;
        bridge.begin_frame()?;

        let layer = if timing.should_render {
            self.compose_layer(
                bridge,
                backend,
                swapchains,
                input,
                spaces,
                timing.predicted_display_time,
            )?
        } else {
            None
        };

        let layers: Vec<ProjectionLayer> = layer.into_iter().collect();
        bridge.end_frame(timing.predicted_display_time, self.blend_mode, &layers)?;

        Ok(FrameOutcome {
            display_time: timing.predicted_display_time,
            rendered_views: layers.first().map_or(0, |layer| layer.views.len()),
            layer_count: layers.len(),
        })
    }

    /// Locate the views, render the cube scene into each swapchain, and
    /// build the projection layer. `None` when tracking is invalid.
    fn compose_layer(
        &mut self,
        bridge: &mut dyn RuntimeBridge,
        backend: &mut dyn GraphicsBackend,
        swapchains: &mut SwapchainSet,
        input: &InputState,
        spaces: &SceneSpaces,
        display_time: RuntimeTime,
    ) -> Result<Option<ProjectionLayer>, FrameError> {
        let snapshot = bridge.locate_views(self.view_config, display_time, spaces.app_space)?;
        if !snapshot.is_fully_valid() {
            log::debug!("[frame] view tracking invalid, submitting no layers");
            return Ok(None);
        }
        if snapshot.views.len() != swapchains.view_count() {
            return Err(FrameError::ViewCountMismatch {
                located: snapshot.views.len(),
                expected: swapchains.view_count(),
            });
        }

        let cubes = gather_cubes(bridge, input, spaces, display_time);

        let mut projection_views = Vec::with_capacity(snapshot.views.len());
        for (index, view) in snapshot.views.iter().enumerate() {
            let view_proj = math::projection_from_fov(view.fov, NEAR_CLIP, FAR_CLIP)
                * math::view_from_pose(view.pose);
            let draws: Vec<CubeDraw> = cubes
                .iter()
                .map(|cube| CubeDraw {
                    mvp: mvp_for(view_proj, cube),
                })
                .collect();

            let swapchain = swapchains.view_mut(index);
            swapchain
                .render_into(|target, extent| {
                    backend.render_view(target, extent, CLEAR_COLOR, &draws)
                })?;
            projection_views.push(ProjectionView {
                pose: view.pose,
                fov: view.fov,
                swapchain: swapchain.id(),
                extent: swapchain.extent(),
            });
        }

        Ok(Some(ProjectionLayer {
            space: spaces.app_space,
            views: projection_views,
        }))
    }
}

fn mvp_for(view_proj: Mat4, cube: &Cube) -> [[f32; 4]; 4] {
    (view_proj * math::model_matrix(cube.pose, cube.scale)).to_cols_array_2d()
}

/// Collect the cubes for this frame: one per locatable visualized space,
/// one per locatable hand, scaled by that hand's grab. Location failures
/// drop the cube, never the frame.
fn gather_cubes(
    bridge: &dyn RuntimeBridge,
    input: &InputState,
    spaces: &SceneSpaces,
    time: RuntimeTime,
) -> Vec<Cube> {
    let mut cubes = Vec::with_capacity(spaces.visualized.len() + 2);

    for &(space, name) in &spaces.visualized {
        match bridge.locate_space(space, spaces.app_space, time) {
            Ok(location) if location.is_fully_valid() => cubes.push(Cube {
                pose: location.pose,
                scale: SPACE_CUBE_SCALE,
            }),
            Ok(_) => {}
            Err(err) => {
                log::debug!(
                    "[frame] unable to locate {} space in app space: {err}",
                    name.label()
                );
            }
        }
    }

    for hand in Hand::BOTH {
        match bridge.locate_space(input.hand_space(hand), spaces.app_space, time) {
            Ok(location) if location.is_fully_valid() => cubes.push(Cube {
                pose: location.pose,
                scale: HAND_CUBE_SCALE * input.hand_scale(hand),
            }),
            Ok(_) => {}
            Err(err) => {
                // Only worth a line when the hand is actually being tracked.
                if input.hand_active(hand) {
                    log::debug!(
                        "[frame] unable to locate {} hand action space: {err}",
                        hand.label()
                    );
                }
            }
        }
    }

    cubes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graphics::{HeadlessBackend, SessionBinding};
    use crate::math::reference_space_definition;
    use crate::runtime::{HeadlessHandle, HeadlessRuntime};

    struct FrameRig {
        runtime: HeadlessRuntime,
        handle: HeadlessHandle,
        backend: HeadlessBackend,
        swapchains: SwapchainSet,
        input: InputState,
        spaces: SceneSpaces,
        renderer: FrameRenderer,
    }

    fn rig() -> FrameRig {
        let (mut runtime, handle) = HeadlessRuntime::scripted();
        let mut backend = HeadlessBackend::default();
        runtime
            .create_session(&SessionBinding {
                backend: "headless",
                device_id: 0,
            })
            .expect("session creates");

        let mut input = InputState::initialize(&mut runtime).expect("input initializes");
        let definition = reference_space_definition(ReferenceSpace::Local);
        let app_space = runtime
            .create_reference_space(definition.base, definition.pose)
            .expect("app space creates");
        let mut visualized = Vec::new();
        for space in ReferenceSpace::VISUALIZED {
            let definition = reference_space_definition(space);
            let id = runtime
                .create_reference_space(definition.base, definition.pose)
                .expect("visualized space creates");
            visualized.push((id, space));
        }

        let view_specs = runtime
            .view_config_views(ViewConfigKind::Stereo)
            .expect("view specs enumerate");
        let swapchains =
            SwapchainSet::create(&mut runtime, &mut backend, &view_specs).expect("set creates");
        runtime
            .begin_session(ViewConfigKind::Stereo)
            .expect("session begins");
        input.poll(&mut runtime).expect("first poll succeeds");

        FrameRig {
            runtime,
            handle,
            backend,
            swapchains,
            input,
            spaces: SceneSpaces {
                app_space,
                visualized,
            },
            renderer: FrameRenderer::new(ViewConfigKind::Stereo, BlendMode::Opaque),
        }
    }

    fn render_one(rig: &mut FrameRig) -> FrameOutcome {
        rig.renderer
            .render_frame(
                &mut rig.runtime,
                &mut rig.backend,
                &mut rig.swapchains,
                &rig.input,
                &rig.spaces,
            )
            .expect("frame renders")
    }

    #[test]
    fn full_frame_renders_both_views() {
        let mut rig = rig();
        let log = rig.backend.draw_log();
        let outcome = render_one(&mut rig);

        assert_eq!(outcome.layer_count, 1);
        assert_eq!(outcome.rendered_views, 2);
        let draws = log.lock().expect("draw log lock");
        assert_eq!(draws.len(), 2);
        // Seven visualized spaces plus two hands.
        assert!(draws.iter().all(|draw| draw.cube_count == 9));
        assert!(draws.iter().all(|draw| draw.clear_color == CLEAR_COLOR));
    }

    #[test]
    fn frame_submission_carries_blend_mode_and_time() {
        let mut rig = rig();
        let outcome = render_one(&mut rig);
        let frames = rig.handle.frames();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].display_time, outcome.display_time.as_nanos());
        assert_eq!(frames[0].blend_mode, BlendMode::Opaque);
        assert_eq!(frames[0].layer_views, vec![2]);
    }

    #[test]
    fn should_render_false_submits_no_layers_but_ends_the_frame() {
        let mut rig = rig();
        rig.handle.set_should_render(false);
        let outcome = render_one(&mut rig);

        assert_eq!(outcome.layer_count, 0);
        assert_eq!(outcome.rendered_views, 0);
        let frames = rig.handle.frames();
        assert_eq!(frames.len(), 1);
        assert!(frames[0].layer_views.is_empty());
        assert!(rig.backend.draw_log().lock().expect("draw log lock").is_empty());
    }

    #[test]
    fn invalid_tracking_submits_no_layers() {
        let mut rig = rig();
        rig.handle.set_tracking_valid(false);
        let outcome = render_one(&mut rig);

        assert_eq!(outcome.layer_count, 0);
        let frames = rig.handle.frames();
        assert_eq!(frames.len(), 1);
        assert!(frames[0].layer_views.is_empty());
    }

    #[test]
    fn unlocatable_space_just_drops_its_cube() {
        let mut rig = rig();
        let log = rig.backend.draw_log();
        let (stage_id, _) = rig.spaces.visualized[2];
        rig.handle.set_space_unlocatable(stage_id, true);

        render_one(&mut rig);
        let draws = log.lock().expect("draw log lock");
        assert!(draws.iter().all(|draw| draw.cube_count == 8));
    }

    #[test]
    fn failing_space_location_is_survivable() {
        let mut rig = rig();
        let log = rig.backend.draw_log();
        let (front_id, _) = rig.spaces.visualized[0];
        rig.handle.set_space_failing(front_id, true);

        render_one(&mut rig);
        let draws = log.lock().expect("draw log lock");
        assert!(draws.iter().all(|draw| draw.cube_count == 8));
    }

    #[test]
    fn grab_scales_the_hand_cube() {
        let mut rig = rig();
        rig.handle.set_grab(Hand::Left, 1.0);
        rig.input.poll(&mut rig.runtime).expect("poll succeeds");

        let cubes = gather_cubes(&rig.runtime, &rig.input, &rig.spaces, RuntimeTime(0));
        assert_eq!(cubes.len(), 9);
        // Hands come last: left then right.
        let left_hand = cubes[7];
        assert!((left_hand.scale - HAND_CUBE_SCALE * 0.5).abs() < 1e-6);
        let right_hand = cubes[8];
        assert!((right_hand.scale - HAND_CUBE_SCALE).abs() < 1e-6);
    }

    #[test]
    fn successive_frames_reuse_the_swapchains() {
        let mut rig = rig();
        for _ in 0..4 {
            render_one(&mut rig);
        }
        assert_eq!(rig.handle.frames().len(), 4);
        assert_eq!(
            rig.backend
                .draw_log()
                .lock()
                .expect("draw log lock")
                .len(),
            8
        );
    }
}
