//! Pose and projection math. Everything here is pure so the view transforms
//! and reference-space layout can be pinned down by unit tests.

use glam::{Mat4, Quat, Vec3, Vec4};

use crate::options::ReferenceSpace;

/// Rigid transform: rotation followed by translation, no scale.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    pub orientation: Quat,
    pub position: Vec3,
}

impl Pose {
    pub const IDENTITY: Self = Self {
        orientation: Quat::IDENTITY,
        position: Vec3::ZERO,
    };

    pub fn translation(position: [f32; 3]) -> Self {
        Self {
            orientation: Quat::IDENTITY,
            position: Vec3::from_array(position),
        }
    }

    /// Counter-clockwise rotation about +Y combined with a translation.
    pub fn rotated_about_y(radians: f32, position: [f32; 3]) -> Self {
        Self {
            orientation: Quat::from_rotation_y(radians),
            position: Vec3::from_array(position),
        }
    }

    pub fn to_matrix(self) -> Mat4 {
        Mat4::from_rotation_translation(self.orientation, self.position)
    }

    /// Apply `self` then `other`: the pose of `other` expressed through
    /// `self`'s frame.
    pub fn compose(self, other: Pose) -> Pose {
        Pose {
            orientation: self.orientation * other.orientation,
            position: self.position + self.orientation * other.position,
        }
    }

    pub fn inverse(self) -> Pose {
        let orientation = self.orientation.inverse();
        Pose {
            orientation,
            position: -(orientation * self.position),
        }
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Asymmetric view frustum in half-angles (radians). Left and down are
/// negative for a forward-facing view.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fov {
    pub angle_left: f32,
    pub angle_right: f32,
    pub angle_up: f32,
    pub angle_down: f32,
}

impl Fov {
    pub const fn symmetric(half_angle: f32) -> Self {
        Self {
            angle_left: -half_angle,
            angle_right: half_angle,
            angle_up: half_angle,
            angle_down: -half_angle,
        }
    }
}

/// Base frame a derived reference space is expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BaseSpace {
    View,
    Local,
    Stage,
}

impl BaseSpace {
    pub fn label(self) -> &'static str {
        match self {
            Self::View => "VIEW",
            Self::Local => "LOCAL",
            Self::Stage => "STAGE",
        }
    }
}

/// A reference space expressed as a fixed pose over a runtime base space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpaceDefinition {
    pub base: BaseSpace,
    pub pose: Pose,
}

/// Pose offsets for the named spaces. The stage satellites sit two meters out
/// to each side; the rotated pair is lifted half a meter and yawed 3.14/3
/// radians toward the center (the truncated literal, not pi/3).
#[allow(clippy::approx_constant)]
pub fn reference_space_definition(space: ReferenceSpace) -> SpaceDefinition {
    let (base, pose) = match space {
        ReferenceSpace::View => (BaseSpace::View, Pose::IDENTITY),
        ReferenceSpace::ViewFront => (BaseSpace::View, Pose::translation([0.0, 0.0, -2.0])),
        ReferenceSpace::Local => (BaseSpace::Local, Pose::IDENTITY),
        ReferenceSpace::Stage => (BaseSpace::Stage, Pose::IDENTITY),
        ReferenceSpace::StageLeft => (
            BaseSpace::Stage,
            Pose::rotated_about_y(0.0, [-2.0, 0.0, -2.0]),
        ),
        ReferenceSpace::StageRight => (
            BaseSpace::Stage,
            Pose::rotated_about_y(0.0, [2.0, 0.0, -2.0]),
        ),
        ReferenceSpace::StageLeftRotated => (
            BaseSpace::Stage,
            Pose::rotated_about_y(3.14 / 3.0, [-2.0, 0.5, -2.0]),
        ),
        ReferenceSpace::StageRightRotated => (
            BaseSpace::Stage,
            Pose::rotated_about_y(-3.14 / 3.0, [2.0, 0.5, -2.0]),
        ),
    };
    SpaceDefinition { base, pose }
}

/// Projection matrix from an asymmetric fov, right-handed, depth 0..1.
/// Matches what a compositor expects for a submitted projection layer.
pub fn projection_from_fov(fov: Fov, near: f32, far: f32) -> Mat4 {
    let tan_left = fov.angle_left.tan();
    let tan_right = fov.angle_right.tan();
    let tan_up = fov.angle_up.tan();
    let tan_down = fov.angle_down.tan();

    let tan_width = tan_right - tan_left;
    let tan_height = tan_up - tan_down;

    Mat4::from_cols(
        Vec4::new(2.0 / tan_width, 0.0, 0.0, 0.0),
        Vec4::new(0.0, 2.0 / tan_height, 0.0, 0.0),
        Vec4::new(
            (tan_right + tan_left) / tan_width,
            (tan_up + tan_down) / tan_height,
            far / (near - far),
            -1.0,
        ),
        Vec4::new(0.0, 0.0, -(far * near) / (far - near), 0.0),
    )
}

/// View matrix for an eye pose reported by the runtime.
pub fn view_from_pose(pose: Pose) -> Mat4 {
    pose.to_matrix().inverse()
}

/// Model matrix for a cube at `pose` with a uniform edge scale.
pub fn model_matrix(pose: Pose, scale: f32) -> Mat4 {
    Mat4::from_scale_rotation_translation(Vec3::splat(scale), pose.orientation, pose.position)
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f32 = 1e-6;

    fn assert_vec3_eq(actual: Vec3, expected: [f32; 3]) {
        let expected = Vec3::from_array(expected);
        assert!(
            (actual - expected).length() < EPSILON,
            "expected {expected:?}, got {actual:?}"
        );
    }

    #[test]
    fn view_front_sits_two_meters_ahead() {
        let definition = reference_space_definition(ReferenceSpace::ViewFront);
        assert_eq!(definition.base, BaseSpace::View);
        assert_vec3_eq(definition.pose.position, [0.0, 0.0, -2.0]);
        assert_eq!(definition.pose.orientation, Quat::IDENTITY);
    }

    #[test]
    fn plain_spaces_use_identity_poses() {
        for space in [
            ReferenceSpace::View,
            ReferenceSpace::Local,
            ReferenceSpace::Stage,
        ] {
            let definition = reference_space_definition(space);
            assert_eq!(definition.pose, Pose::IDENTITY, "{space:?}");
        }
    }

    #[test]
    fn stage_satellites_flank_the_origin() {
        let left = reference_space_definition(ReferenceSpace::StageLeft);
        let right = reference_space_definition(ReferenceSpace::StageRight);
        assert_vec3_eq(left.pose.position, [-2.0, 0.0, -2.0]);
        assert_vec3_eq(right.pose.position, [2.0, 0.0, -2.0]);
        assert_eq!(left.pose.orientation, Quat::IDENTITY);
        assert_eq!(right.pose.orientation, Quat::IDENTITY);
    }

    #[test]
    #[allow(clippy::approx_constant)]
    fn rotated_satellites_yaw_toward_center() {
        let left = reference_space_definition(ReferenceSpace::StageLeftRotated);
        let right = reference_space_definition(ReferenceSpace::StageRightRotated);
        assert_vec3_eq(left.pose.position, [-2.0, 0.5, -2.0]);
        assert_vec3_eq(right.pose.position, [2.0, 0.5, -2.0]);

        // The yaw is the 3.14/3 literal, not pi/3; the two differ in f32.
        assert_eq!(left.pose.orientation, Quat::from_rotation_y(3.14 / 3.0));
        assert_eq!(right.pose.orientation, Quat::from_rotation_y(-3.14 / 3.0));

        // CCW about +Y rotates -Z toward -X for the left satellite, and the
        // mirrored angle sends the right one the other way.
        let forward = left.pose.orientation * Vec3::NEG_Z;
        assert!(forward.x < -0.5);
        let forward = right.pose.orientation * Vec3::NEG_Z;
        assert!(forward.x > 0.5);
    }

    #[test]
    fn definitions_are_deterministic() {
        for space in ReferenceSpace::VISUALIZED {
            assert_eq!(
                reference_space_definition(space),
                reference_space_definition(space)
            );
        }
    }

    #[test]
    fn symmetric_projection_centers_the_frustum() {
        let projection = projection_from_fov(Fov::symmetric(std::f32::consts::FRAC_PI_4), 0.05, 20.0);
        // No skew for a symmetric fov.
        assert!(projection.z_axis.x.abs() < EPSILON);
        assert!(projection.z_axis.y.abs() < EPSILON);
        // tan(45 deg) = 1 on both half-angles gives unit focal lengths.
        assert!((projection.x_axis.x - 1.0).abs() < EPSILON);
        assert!((projection.y_axis.y - 1.0).abs() < EPSILON);
    }

    #[test]
    fn asymmetric_projection_skews_toward_the_wide_side() {
        let fov = Fov {
            angle_left: -0.2,
            angle_right: 0.8,
            angle_up: 0.6,
            angle_down: -0.4,
        };
        let projection = projection_from_fov(fov, 0.05, 20.0);
        assert!(projection.z_axis.x > 0.0);
        assert!(projection.z_axis.y > 0.0);
    }

    #[test]
    fn projection_maps_near_and_far_to_unit_depth() {
        let near = 0.05;
        let far = 20.0;
        let projection = projection_from_fov(Fov::symmetric(1.0), near, far);

        let at_near = projection * Vec4::new(0.0, 0.0, -near, 1.0);
        assert!((at_near.z / at_near.w).abs() < EPSILON);

        let at_far = projection * Vec4::new(0.0, 0.0, -far, 1.0);
        assert!((at_far.z / at_far.w - 1.0).abs() < 1e-4);
    }

    #[test]
    fn view_matrix_inverts_the_eye_pose() {
        let pose = Pose::rotated_about_y(0.7, [1.0, 1.6, -0.3]);
        let round_trip = view_from_pose(pose) * pose.to_matrix();
        let identity = Mat4::IDENTITY;
        for column in 0..4 {
            assert!((round_trip.col(column) - identity.col(column)).length() < 1e-5);
        }
    }

    #[test]
    fn model_matrix_applies_uniform_scale() {
        let matrix = model_matrix(Pose::translation([0.0, 1.0, 0.0]), 0.25);
        let corner = matrix * Vec4::new(0.5, 0.5, 0.5, 1.0);
        assert_vec3_eq(corner.truncate(), [0.125, 1.125, 0.125]);
    }

    #[test]
    fn pose_compose_with_inverse_is_identity() {
        let pose = Pose::rotated_about_y(1.1, [0.4, 1.6, -2.0]);
        let round_trip = pose.compose(pose.inverse());
        assert!(round_trip.position.length() < EPSILON);
        assert!(round_trip.orientation.angle_between(Quat::IDENTITY) < 1e-4);
    }

    #[test]
    fn pose_compose_translates_through_rotation() {
        // Quarter turn CCW about +Y carries a forward offset onto -X.
        let turned = Pose::rotated_about_y(std::f32::consts::FRAC_PI_2, [0.0, 0.0, 0.0]);
        let composed = turned.compose(Pose::translation([0.0, 0.0, -1.0]));
        assert_vec3_eq(composed.position, [-1.0, 0.0, 0.0]);
    }
}
