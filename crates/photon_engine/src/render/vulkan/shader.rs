//! Shader module handling
//!
//! SPIR-V bytecode arrives pre-compiled from the external shader-compiler
//! collaborator; this module only wraps it into `vk::ShaderModule`s.

use ash::{vk, Device};

use crate::render::vulkan::context::{VulkanError, VulkanResult};

/// Shader entry point shared by every stage
pub const SHADER_ENTRY_POINT: &std::ffi::CStr =
    unsafe { std::ffi::CStr::from_bytes_with_nul_unchecked(b"main\0") };

/// Shader module wrapper with RAII cleanup
pub struct ShaderModule {
    device: Device,
    module: vk::ShaderModule,
}

impl ShaderModule {
    /// Create a shader module from SPIR-V bytecode
    pub fn from_spirv(device: Device, bytes: &[u8]) -> VulkanResult<Self> {
        // SPIR-V words are u32-aligned
        let (prefix, words, suffix) = unsafe { bytes.align_to::<u32>() };
        if !prefix.is_empty() || !suffix.is_empty() {
            return Err(VulkanError::InitializationFailed(
                "SPIR-V bytecode is not 4-byte aligned".to_string(),
            ));
        }

        let create_info = vk::ShaderModuleCreateInfo::builder().code(words);
        let module = unsafe {
            device
                .create_shader_module(&create_info, None)
                .map_err(VulkanError::Api)?
        };

        Ok(Self { device, module })
    }

    /// Get the shader module handle
    pub fn handle(&self) -> vk::ShaderModule {
        self.module
    }

    /// Build the stage create info for this module
    pub fn stage_info(&self, stage: vk::ShaderStageFlags) -> vk::PipelineShaderStageCreateInfo {
        vk::PipelineShaderStageCreateInfo::builder()
            .stage(stage)
            .module(self.module)
            .name(SHADER_ENTRY_POINT)
            .build()
    }
}

impl Drop for ShaderModule {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_shader_module(self.module, None);
        }
    }
}

/// The complete set of SPIR-V blobs the render systems are built from,
/// supplied once by the shader-compiler collaborator.
#[derive(Clone)]
pub struct ShaderSet {
    /// Output composite vertex stage
    pub output_vertex: Vec<u8>,
    /// Output composite fragment stage
    pub output_fragment: Vec<u8>,
    /// Rasterization vertex stage
    pub rasterization_vertex: Vec<u8>,
    /// Rasterization fragment stage
    pub rasterization_fragment: Vec<u8>,
    /// Shadow-map vertex stage
    pub shadow_map_vertex: Vec<u8>,
    /// Shadow-map fragment stage
    pub shadow_map_fragment: Vec<u8>,
    /// Path-tracing vertex stage
    pub path_tracing_vertex: Vec<u8>,
    /// Path-tracing fragment stage
    pub path_tracing_fragment: Vec<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_point_is_main() {
        assert_eq!(SHADER_ENTRY_POINT.to_bytes(), b"main");
    }
}
