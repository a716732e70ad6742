// Triangle geometry and its vertex layout
//
// The layout is described without any graphics-API types so every backend
// builds its vertex input state from the same numbers.

use bytemuck::{Pod, Zeroable};
use glam::Vec3;
use std::mem::{offset_of, size_of};

/// Interleaved position + color vertex
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: Vec3,
    pub color: Vec3,
}

impl Vertex {
    pub const fn new(position: Vec3, color: Vec3) -> Self {
        Self { position, color }
    }

    pub const LAYOUT: VertexLayout = VertexLayout {
        stride: size_of::<Vertex>() as u32,
        attributes: [
            VertexAttribute {
                location: 0,
                offset: offset_of!(Vertex, position) as u32,
                components: 3,
            },
            VertexAttribute {
                location: 1,
                offset: offset_of!(Vertex, color) as u32,
                components: 3,
            },
        ],
    };
}

/// The one triangle this renderer draws, in clip space (counter-clockwise).
pub const TRIANGLE_VERTICES: [Vertex; 3] = [
    Vertex::new(Vec3::new(0.0, -0.5, 0.0), Vec3::new(1.0, 0.0, 0.0)),
    Vertex::new(Vec3::new(-0.5, 0.5, 0.0), Vec3::new(0.0, 0.0, 1.0)),
    Vertex::new(Vec3::new(0.5, 0.5, 0.0), Vec3::new(0.0, 1.0, 0.0)),
];

/// Vertices submitted per draw call
pub const TRIANGLE_VERTEX_COUNT: u32 = TRIANGLE_VERTICES.len() as u32;

/// Single-binding vertex layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexLayout {
    pub stride: u32,
    pub attributes: [VertexAttribute; 2],
}

/// One `f32` vector attribute at a shader location
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexAttribute {
    pub location: u32,
    pub offset: u32,
    /// Number of f32 components
    pub components: u32,
}

/// Raw bytes of a vertex slice, ready for upload
pub fn vertex_bytes(vertices: &[Vertex]) -> &[u8] {
    bytemuck::cast_slice(vertices)
}
