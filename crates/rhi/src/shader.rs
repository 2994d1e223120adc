//! Shader compilation and module management.
//!
//! Shaders ship as GLSL text and are compiled to SPIR-V at startup with
//! shaderc. [`ShaderCompiler`] wraps the compiler, [`Shader`] wraps the
//! resulting VkShaderModule.

use std::ffi::CString;
use std::path::Path;
use std::sync::Arc;

use ash::vk;
use tracing::{debug, info};

use crate::device::Device;
use crate::error::{RhiError, RhiResult};

/// Shader stage type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    /// Vertex shader stage
    Vertex,
    /// Fragment shader stage
    Fragment,
}

impl ShaderStage {
    /// Converts the shader stage to Vulkan shader stage flags.
    pub fn to_vk_stage(self) -> vk::ShaderStageFlags {
        match self {
            ShaderStage::Vertex => vk::ShaderStageFlags::VERTEX,
            ShaderStage::Fragment => vk::ShaderStageFlags::FRAGMENT,
        }
    }

    fn to_shaderc_kind(self) -> shaderc::ShaderKind {
        match self {
            ShaderStage::Vertex => shaderc::ShaderKind::Vertex,
            ShaderStage::Fragment => shaderc::ShaderKind::Fragment,
        }
    }

    /// Returns a human-readable name for the shader stage.
    pub fn name(self) -> &'static str {
        match self {
            ShaderStage::Vertex => "vertex",
            ShaderStage::Fragment => "fragment",
        }
    }
}

impl std::fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Runtime GLSL to SPIR-V compiler.
///
/// Targets Vulkan 1.3 with performance optimizations. Compile errors are
/// fatal to startup and carry shaderc's diagnostic text.
pub struct ShaderCompiler {
    compiler: shaderc::Compiler,
}

impl ShaderCompiler {
    /// Creates a compiler instance.
    ///
    /// # Errors
    ///
    /// Returns an error when the shaderc backend is unavailable.
    pub fn new() -> RhiResult<Self> {
        let compiler = shaderc::Compiler::new()
            .ok_or_else(|| RhiError::ShaderError("shaderc compiler unavailable".to_string()))?;
        Ok(Self { compiler })
    }

    /// Compiles GLSL source to SPIR-V words.
    ///
    /// # Arguments
    ///
    /// * `source` - GLSL source text
    /// * `stage` - Shader stage of the source
    /// * `name` - Name used in diagnostics, usually the file name
    pub fn compile(&self, source: &str, stage: ShaderStage, name: &str) -> RhiResult<Vec<u32>> {
        let mut options = shaderc::CompileOptions::new()
            .ok_or_else(|| RhiError::ShaderError("shaderc options unavailable".to_string()))?;
        options.set_target_env(
            shaderc::TargetEnv::Vulkan,
            shaderc::EnvVersion::Vulkan1_3 as u32,
        );
        options.set_optimization_level(shaderc::OptimizationLevel::Performance);

        let artifact = self
            .compiler
            .compile_into_spirv(source, stage.to_shaderc_kind(), name, "main", Some(&options))
            .map_err(|e| RhiError::ShaderError(format!("{}: {}", name, e)))?;

        debug!(
            "Compiled {} shader '{}' ({} words)",
            stage,
            name,
            artifact.as_binary().len()
        );

        Ok(artifact.as_binary().to_vec())
    }

    /// Reads a GLSL file and compiles it.
    pub fn compile_file(&self, path: &Path, stage: ShaderStage) -> RhiResult<Vec<u32>> {
        let source = std::fs::read_to_string(path).map_err(|e| {
            RhiError::ShaderError(format!("failed to read shader {:?}: {}", path, e))
        })?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "shader".to_string());
        self.compile(&source, stage, &name)
    }
}

/// Vulkan shader module wrapper.
pub struct Shader {
    device: Arc<Device>,
    module: vk::ShaderModule,
    stage: ShaderStage,
    entry_point: CString,
}

impl Shader {
    /// Creates a shader module from SPIR-V words.
    ///
    /// # Arguments
    ///
    /// * `words` - SPIR-V code, typically from [`ShaderCompiler::compile`]
    /// * `stage` - The shader stage
    /// * `entry_point` - Entry point function name, typically "main"
    ///
    /// # Errors
    ///
    /// Returns an error if module creation fails or the entry point name
    /// contains a null byte.
    pub fn from_spirv_words(
        device: Arc<Device>,
        words: &[u32],
        stage: ShaderStage,
        entry_point: &str,
    ) -> RhiResult<Self> {
        let create_info = vk::ShaderModuleCreateInfo::default().code(words);

        let module = unsafe { device.handle().create_shader_module(&create_info, None)? };

        let entry_point_cstring = CString::new(entry_point)
            .map_err(|e| RhiError::ShaderError(format!("invalid entry point name: {}", e)))?;

        info!("Created {} shader module", stage);

        Ok(Self {
            device,
            module,
            stage,
            entry_point: entry_point_cstring,
        })
    }

    /// Returns the Vulkan shader module handle.
    #[inline]
    pub fn handle(&self) -> vk::ShaderModule {
        self.module
    }

    /// Returns the shader stage.
    #[inline]
    pub fn stage(&self) -> ShaderStage {
        self.stage
    }

    /// Creates a pipeline shader stage create info for this module.
    ///
    /// The returned structure borrows from this shader and must not
    /// outlive it.
    pub fn stage_create_info(&self) -> vk::PipelineShaderStageCreateInfo<'_> {
        vk::PipelineShaderStageCreateInfo::default()
            .stage(self.stage.to_vk_stage())
            .module(self.module)
            .name(&self.entry_point)
    }
}

impl Drop for Shader {
    fn drop(&mut self) {
        unsafe {
            self.device
                .handle()
                .destroy_shader_module(self.module, None);
        }
        debug!("Destroyed {} shader module", self.stage);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shader_stage_to_vk_stage() {
        assert_eq!(
            ShaderStage::Vertex.to_vk_stage(),
            vk::ShaderStageFlags::VERTEX
        );
        assert_eq!(
            ShaderStage::Fragment.to_vk_stage(),
            vk::ShaderStageFlags::FRAGMENT
        );
    }

    #[test]
    fn test_shader_stage_display() {
        assert_eq!(format!("{}", ShaderStage::Vertex), "vertex");
        assert_eq!(format!("{}", ShaderStage::Fragment), "fragment");
    }

    #[test]
    fn test_compile_minimal_vertex_shader() {
        // Skips when the shaderc backend is not installed
        let Ok(compiler) = ShaderCompiler::new() else {
            eprintln!("Skipping test: shaderc not available");
            return;
        };

        let source = "#version 450\nvoid main() { gl_Position = vec4(0.0); }\n";
        let words = compiler
            .compile(source, ShaderStage::Vertex, "minimal.vert")
            .expect("minimal shader should compile");
        assert!(!words.is_empty());
        // SPIR-V magic number
        assert_eq!(words[0], 0x0723_0203);
    }

    #[test]
    fn test_compile_reports_errors() {
        let Ok(compiler) = ShaderCompiler::new() else {
            eprintln!("Skipping test: shaderc not available");
            return;
        };

        let broken = "#version 450\nvoid main() { this is not glsl }\n";
        let result = compiler.compile(broken, ShaderStage::Fragment, "broken.frag");
        assert!(matches!(result, Err(RhiError::ShaderError(_))));
    }
}
