//! GPU-visible scene data
//!
//! Plain-old-data mirrors of what the scene, BVH, and material collaborators
//! supply, laid out to match the shader-side declarations. These are copied
//! verbatim into the structured scene buffer and the uniform block.

use bytemuck::{Pod, Zeroable};
use nalgebra::{Matrix4, Point3, Vector3};

use crate::render::vulkan::context::{VulkanError, VulkanResult};

pub use crate::render::vulkan::shader::ShaderSet;

/// Fixed capacity of the BVH node table in the scene buffer
pub const MAX_BVH_NODES: usize = 2048;
/// Fixed capacity of the material table in the scene buffer
pub const MAX_MATERIALS: usize = 64;

/// Triangle-soup geometry from the scene collaborator: three vertices per
/// face, no shared index buffer.
#[derive(Debug, Clone, Default)]
pub struct SceneGeometry {
    /// Vertex positions
    pub positions: Vec<[f32; 3]>,
    /// Vertex normals
    pub normals: Vec<[f32; 3]>,
    /// Per-vertex material table indices
    pub material_ids: Vec<u32>,
}

impl SceneGeometry {
    /// Number of vertices
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    /// Check that the attribute arrays agree and form whole triangles
    pub fn validate(&self) -> VulkanResult<()> {
        if self.positions.len() != self.normals.len() || self.positions.len() != self.material_ids.len() {
            return Err(VulkanError::InvalidOperation {
                reason: format!(
                    "geometry attribute arrays disagree: {} positions, {} normals, {} material ids",
                    self.positions.len(),
                    self.normals.len(),
                    self.material_ids.len()
                ),
            });
        }
        if self.positions.len() % 3 != 0 {
            return Err(VulkanError::InvalidOperation {
                reason: format!("{} vertices is not a whole number of triangles", self.positions.len()),
            });
        }
        Ok(())
    }
}

/// One BVH node: axis-aligned bound, child indices, leaf vertex range.
/// Matches the std430 declaration in the path-tracing shader.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct BvhNode {
    /// AABB minimum corner
    pub aabb_min: [f32; 3],
    /// Left child index, -1 for leaves
    pub left: i32,
    /// AABB maximum corner
    pub aabb_max: [f32; 3],
    /// Right child index, -1 for leaves
    pub right: i32,
    /// First vertex of the leaf range
    pub first_vertex: u32,
    /// Vertex count of the leaf range (0 for interior nodes)
    pub vertex_count: u32,
    /// Explicit std430 padding
    pub _pad: [u32; 2],
}

/// One material record. Matches the std430 declaration in the shaders.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct MaterialRecord {
    /// Albedo color (RGBA)
    pub albedo: [f32; 4],
    /// BRDF kind selector
    pub brdf: u32,
    /// Diffuse coefficient
    pub diffuse: f32,
    /// Emissive coefficient
    pub emissive: f32,
    /// Explicit std430 padding
    pub _pad: u32,
}

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct SceneBufferHeader {
    node_count: u32,
    material_count: u32,
    _pad: [u32; 2],
}

/// The structured scene description: BVH nodes and material records with
/// their counts, copied verbatim from the collaborators.
#[derive(Debug, Clone, Default)]
pub struct SceneDescription {
    /// BVH nodes, at most [`MAX_BVH_NODES`]
    pub nodes: Vec<BvhNode>,
    /// Material records, at most [`MAX_MATERIALS`]
    pub materials: Vec<MaterialRecord>,
}

impl SceneDescription {
    /// Byte size of the encoded scene buffer (fixed-capacity layout)
    pub const fn buffer_size() -> usize {
        std::mem::size_of::<SceneBufferHeader>()
            + MAX_BVH_NODES * std::mem::size_of::<BvhNode>()
            + MAX_MATERIALS * std::mem::size_of::<MaterialRecord>()
    }

    /// Encode into the fixed-capacity GPU layout: header, node table,
    /// material table. Unused table slots stay zeroed.
    pub fn encode(&self) -> VulkanResult<Vec<u8>> {
        if self.nodes.len() > MAX_BVH_NODES {
            return Err(VulkanError::InvalidOperation {
                reason: format!("{} BVH nodes exceed capacity {MAX_BVH_NODES}", self.nodes.len()),
            });
        }
        if self.materials.len() > MAX_MATERIALS {
            return Err(VulkanError::InvalidOperation {
                reason: format!("{} materials exceed capacity {MAX_MATERIALS}", self.materials.len()),
            });
        }

        let header = SceneBufferHeader {
            node_count: self.nodes.len() as u32,
            material_count: self.materials.len() as u32,
            _pad: [0; 2],
        };

        let mut bytes = vec![0u8; Self::buffer_size()];
        let header_size = std::mem::size_of::<SceneBufferHeader>();
        let nodes_offset = header_size;
        let materials_offset = nodes_offset + MAX_BVH_NODES * std::mem::size_of::<BvhNode>();

        bytes[..header_size].copy_from_slice(bytemuck::bytes_of(&header));
        let node_bytes: &[u8] = bytemuck::cast_slice(&self.nodes);
        bytes[nodes_offset..nodes_offset + node_bytes.len()].copy_from_slice(node_bytes);
        let material_bytes: &[u8] = bytemuck::cast_slice(&self.materials);
        bytes[materials_offset..materials_offset + material_bytes.len()].copy_from_slice(material_bytes);

        Ok(bytes)
    }
}

/// The per-frame uniform block. Matches the std140 declaration shared by all
/// four pass shaders.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct FrameUniforms {
    /// Camera view matrix
    pub view: [[f32; 4]; 4],
    /// Camera projection matrix
    pub projection: [[f32; 4]; 4],
    /// Light-space view-projection for shadow lookups
    pub light_view_projection: [[f32; 4]; 4],
    /// Camera position (w unused)
    pub camera_position: [f32; 4],
    /// Directional light direction (w = intensity)
    pub light_direction: [f32; 4],
    /// Framebuffer resolution in pixels
    pub resolution: [f32; 2],
    /// Near and far clip distances
    pub near_far: [f32; 2],
}

impl FrameUniforms {
    /// Build the block from camera and light state
    pub fn new(
        view: Matrix4<f32>,
        projection: Matrix4<f32>,
        light_view_projection: Matrix4<f32>,
        camera_position: Point3<f32>,
        light_direction: Vector3<f32>,
        light_intensity: f32,
        resolution: (u32, u32),
        near_far: (f32, f32),
    ) -> Self {
        Self {
            view: view.into(),
            projection: projection.into(),
            light_view_projection: light_view_projection.into(),
            camera_position: [camera_position.x, camera_position.y, camera_position.z, 1.0],
            light_direction: [light_direction.x, light_direction.y, light_direction.z, light_intensity],
            resolution: [resolution.0 as f32, resolution.1 as f32],
            near_far: [near_far.0, near_far.1],
        }
    }
}

impl Default for FrameUniforms {
    fn default() -> Self {
        Self::new(
            Matrix4::identity(),
            Matrix4::identity(),
            Matrix4::identity(),
            Point3::origin(),
            -Vector3::y(),
            1.0,
            (1, 1),
            (0.1, 100.0),
        )
    }
}

/// Per-draw push-constant block, kept as scratch in each frame slot
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct FramePushConstants {
    /// Path-tracing accumulation sample index
    pub sample_index: u32,
    /// Current frame slot index
    pub frame_index: u32,
    /// Seconds since renderer start
    pub time_seconds: f32,
    /// Current scene vertex count
    pub vertex_count: u32,
}

impl FramePushConstants {
    /// The push-constant range every pipeline layout merges in
    pub fn range() -> ash::vk::PushConstantRange {
        ash::vk::PushConstantRange {
            stage_flags: ash::vk::ShaderStageFlags::VERTEX | ash::vk::ShaderStageFlags::FRAGMENT,
            offset: 0,
            size: std::mem::size_of::<Self>() as u32,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn pod_layouts_match_shader_declarations() {
        assert_eq!(std::mem::size_of::<BvhNode>(), 48);
        assert_eq!(std::mem::size_of::<MaterialRecord>(), 32);
        assert_eq!(std::mem::size_of::<FrameUniforms>(), 240);
        assert_eq!(std::mem::size_of::<FramePushConstants>(), 16);
    }

    #[test]
    fn scene_buffer_size_is_header_plus_tables() {
        assert_eq!(
            SceneDescription::buffer_size(),
            16 + MAX_BVH_NODES * 48 + MAX_MATERIALS * 32
        );
    }

    #[test]
    fn encode_places_counts_and_tables() {
        let scene = SceneDescription {
            nodes: vec![BvhNode {
                aabb_min: [-1.0; 3],
                left: -1,
                aabb_max: [1.0; 3],
                right: -1,
                first_vertex: 0,
                vertex_count: 3,
                _pad: [0; 2],
            }],
            materials: vec![MaterialRecord {
                albedo: [0.5, 0.5, 0.5, 1.0],
                brdf: 1,
                diffuse: 0.8,
                emissive: 0.0,
                _pad: 0,
            }],
        };

        let bytes = scene.encode().unwrap();
        assert_eq!(bytes.len(), SceneDescription::buffer_size());

        let node_count = u32::from_ne_bytes(bytes[0..4].try_into().unwrap());
        let material_count = u32::from_ne_bytes(bytes[4..8].try_into().unwrap());
        assert_eq!(node_count, 1);
        assert_eq!(material_count, 1);

        // First node starts right after the 16-byte header
        let first_min_x = f32::from_ne_bytes(bytes[16..20].try_into().unwrap());
        assert_relative_eq!(first_min_x, -1.0);
    }

    #[test]
    fn encode_rejects_over_capacity_tables() {
        let scene = SceneDescription {
            nodes: vec![BvhNode::zeroed(); MAX_BVH_NODES + 1],
            materials: Vec::new(),
        };
        assert!(scene.encode().is_err());
    }

    #[test]
    fn geometry_validation_catches_mismatched_arrays() {
        let geometry = SceneGeometry {
            positions: vec![[0.0; 3]; 6],
            normals: vec![[0.0; 3]; 5],
            material_ids: vec![0; 6],
        };
        assert!(geometry.validate().is_err());
    }

    #[test]
    fn geometry_validation_requires_whole_triangles() {
        let geometry = SceneGeometry {
            positions: vec![[0.0; 3]; 4],
            normals: vec![[0.0; 3]; 4],
            material_ids: vec![0; 4],
        };
        assert!(geometry.validate().is_err());

        let geometry = SceneGeometry {
            positions: vec![[0.0; 3]; 6],
            normals: vec![[0.0; 3]; 6],
            material_ids: vec![0; 6],
        };
        assert!(geometry.validate().is_ok());
    }

    #[test]
    fn uniforms_embed_camera_state() {
        let uniforms = FrameUniforms::new(
            Matrix4::identity(),
            Matrix4::identity(),
            Matrix4::identity(),
            Point3::new(1.0, 2.0, 3.0),
            Vector3::new(0.0, -1.0, 0.0),
            0.8,
            (1280, 720),
            (0.1, 100.0),
        );

        assert_relative_eq!(uniforms.camera_position[0], 1.0);
        assert_relative_eq!(uniforms.camera_position[2], 3.0);
        assert_relative_eq!(uniforms.light_direction[3], 0.8);
        assert_relative_eq!(uniforms.resolution[0], 1280.0);
        assert_relative_eq!(uniforms.view[0][0], 1.0);
    }
}
