//! Cube mesh shared by every graphics backend. One unit cube centered at the
//! origin, each face a solid color, indexed as two triangles per face.

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "render-wgpu", derive(bytemuck::Pod, bytemuck::Zeroable))]
pub struct Vertex {
    pub position: [f32; 3],
    pub color: [f32; 3],
}

const fn vertex(position: [f32; 3], color: [f32; 3]) -> Vertex {
    Vertex { position, color }
}

const RED: [f32; 3] = [1.0, 0.0, 0.0];
const DARK_RED: [f32; 3] = [0.25, 0.0, 0.0];
const GREEN: [f32; 3] = [0.0, 1.0, 0.0];
const DARK_GREEN: [f32; 3] = [0.0, 0.25, 0.0];
const BLUE: [f32; 3] = [0.0, 0.0, 1.0];
const DARK_BLUE: [f32; 3] = [0.0, 0.0, 0.25];

/// Four corners per face, six faces. Dark shades sit on the negative axes so
/// orientation reads at a glance.
pub const VERTICES: [Vertex; 24] = [
    // -X
    vertex([-0.5, -0.5, -0.5], DARK_RED),
    vertex([-0.5, -0.5, 0.5], DARK_RED),
    vertex([-0.5, 0.5, 0.5], DARK_RED),
    vertex([-0.5, 0.5, -0.5], DARK_RED),
    // +X
    vertex([0.5, -0.5, 0.5], RED),
    vertex([0.5, -0.5, -0.5], RED),
    vertex([0.5, 0.5, -0.5], RED),
    vertex([0.5, 0.5, 0.5], RED),
    // -Y
    vertex([-0.5, -0.5, -0.5], DARK_GREEN),
    vertex([0.5, -0.5, -0.5], DARK_GREEN),
    vertex([0.5, -0.5, 0.5], DARK_GREEN),
    vertex([-0.5, -0.5, 0.5], DARK_GREEN),
    // +Y
    vertex([-0.5, 0.5, 0.5], GREEN),
    vertex([0.5, 0.5, 0.5], GREEN),
    vertex([0.5, 0.5, -0.5], GREEN),
    vertex([-0.5, 0.5, -0.5], GREEN),
    // -Z
    vertex([0.5, -0.5, -0.5], DARK_BLUE),
    vertex([-0.5, -0.5, -0.5], DARK_BLUE),
    vertex([-0.5, 0.5, -0.5], DARK_BLUE),
    vertex([0.5, 0.5, -0.5], DARK_BLUE),
    // +Z
    vertex([-0.5, -0.5, 0.5], BLUE),
    vertex([0.5, -0.5, 0.5], BLUE),
    vertex([0.5, 0.5, 0.5], BLUE),
    vertex([-0.5, 0.5, 0.5], BLUE),
];

#[rustfmt::skip]
pub const INDICES: [u32; 36] = [
    0, 1, 2, 0, 2, 3,       // -X
    4, 5, 6, 4, 6, 7,       // +X
    8, 9, 10, 8, 10, 11,    // -Y
    12, 13, 14, 12, 14, 15, // +Y
    16, 17, 18, 16, 18, 19, // -Z
    20, 21, 22, 20, 22, 23, // +Z
];

pub const INDEX_COUNT: u32 = INDICES.len() as u32;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_count_covers_twelve_triangles() {
        assert_eq!(INDEX_COUNT, 36);
        assert_eq!(INDICES.len() % 3, 0);
    }

    #[test]
    fn every_index_points_at_a_vertex() {
        for &index in &INDICES {
            assert!((index as usize) < VERTICES.len());
        }
    }

    #[test]
    fn cube_is_centered_with_unit_extent() {
        for vertex in &VERTICES {
            for &coordinate in &vertex.position {
                assert_eq!(coordinate.abs(), 0.5);
            }
        }
    }
}
