// Shader library loading
//
// The triangle's vertex and fragment stages are SPIR-V files produced by
// build.rs. They are read at runtime so a missing or corrupt file is a
// setup failure rather than a build failure.

use anyhow::{Context, Result};
use ash::vk;
use std::fs::File;
use std::path::Path;

use super::VulkanDevice;

pub const VERTEX_SHADER_FILE: &str = "triangle.vert.spv";
pub const FRAGMENT_SHADER_FILE: &str = "triangle.frag.spv";

/// Compiled vertex + fragment modules, immutable once created
pub struct ShaderLibrary {
    pub vertex: vk::ShaderModule,
    pub fragment: vk::ShaderModule,
}

impl ShaderLibrary {
    pub fn load(device: &VulkanDevice, dir: &Path) -> Result<Self> {
        log::info!("Loading shaders from {:?}", dir);

        let vertex_code = read_spirv(&dir.join(VERTEX_SHADER_FILE))?;
        let fragment_code = read_spirv(&dir.join(FRAGMENT_SHADER_FILE))?;

        let vertex = create_shader_module(device, &vertex_code)?;
        let fragment = match create_shader_module(device, &fragment_code) {
            Ok(module) => module,
            Err(e) => {
                unsafe { device.device.destroy_shader_module(vertex, None) };
                return Err(e);
            }
        };

        Ok(Self { vertex, fragment })
    }

    pub fn destroy(self, device: &VulkanDevice) {
        unsafe {
            device.device.destroy_shader_module(self.fragment, None);
            device.device.destroy_shader_module(self.vertex, None);
        }
    }
}

/// Read a SPIR-V file as aligned 32-bit words, checking the magic number
fn read_spirv(path: &Path) -> Result<Vec<u32>> {
    let mut file = File::open(path).with_context(|| {
        format!("Failed to open shader {:?} (was glslc available at build time?)", path)
    })?;

    ash::util::read_spv(&mut file).with_context(|| format!("Invalid SPIR-V in {:?}", path))
}

fn create_shader_module(device: &VulkanDevice, code: &[u32]) -> Result<vk::ShaderModule> {
    let create_info = vk::ShaderModuleCreateInfo::builder().code(code);

    unsafe {
        device
            .device
            .create_shader_module(&create_info, None)
            .context("Failed to create shader module")
    }
}
