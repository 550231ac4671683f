//! Vertex data structures and input descriptions.

use ash::vk;
use bytemuck::{Pod, Zeroable};
use glam::Vec3;

/// Vertex format with position and color.
///
/// Layout (repr C): position at offset 0, color at offset 12, 24 bytes
/// total. Shader locations 0 and 1 respectively.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, Pod, Zeroable)]
pub struct Vertex {
    pub position: Vec3,
    pub color: Vec3,
}

impl Vertex {
    #[inline]
    pub const fn new(position: Vec3, color: Vec3) -> Self {
        Self { position, color }
    }

    /// Vertex input binding description for binding 0.
    pub fn binding_description() -> vk::VertexInputBindingDescription {
        vk::VertexInputBindingDescription {
            binding: 0,
            stride: std::mem::size_of::<Self>() as u32,
            input_rate: vk::VertexInputRate::VERTEX,
        }
    }

    /// Vertex attribute descriptions.
    pub fn attribute_descriptions() -> [vk::VertexInputAttributeDescription; 2] {
        [
            vk::VertexInputAttributeDescription {
                binding: 0,
                location: 0,
                format: vk::Format::R32G32B32_SFLOAT,
                offset: 0,
            },
            vk::VertexInputAttributeDescription {
                binding: 0,
                location: 1,
                format: vk::Format::R32G32B32_SFLOAT,
                offset: 12,
            },
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vertex_size() {
        assert_eq!(std::mem::size_of::<Vertex>(), 24);
    }

    #[test]
    fn test_binding_description() {
        let binding = Vertex::binding_description();
        assert_eq!(binding.binding, 0);
        assert_eq!(binding.stride, 24);
        assert_eq!(binding.input_rate, vk::VertexInputRate::VERTEX);
    }

    #[test]
    fn test_attribute_offsets() {
        let attrs = Vertex::attribute_descriptions();
        assert_eq!(attrs[0].offset, 0);
        assert_eq!(attrs[1].offset, 12);
        assert_eq!(attrs[1].location, 1);
    }

    #[test]
    fn test_vertex_bytes_round_trip() {
        let vertex = Vertex::new(Vec3::new(1.0, 2.0, 3.0), Vec3::new(0.5, 0.6, 0.7));
        let bytes: &[u8] = bytemuck::bytes_of(&vertex);
        assert_eq!(bytes.len(), 24);

        let back: &Vertex = bytemuck::from_bytes(bytes);
        assert_eq!(back.position, vertex.position);
        assert_eq!(back.color, vertex.color);
    }
}
