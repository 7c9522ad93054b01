use bitflags::bitflags;
use spv::ExecutionModel;

use crate::{ReflectError, Result};

bitflags! {
    /// Shader stage bits, numerically identical to the Vulkan
    /// `VK_SHADER_STAGE_*` values so a pipeline-layout builder can pass
    /// them through unchanged.
    pub struct ShaderStageFlags: u32 {
        const VERTEX = 0x01;
        const FRAGMENT = 0x10;
        const COMPUTE = 0x20;
    }
}

// The consuming pipeline supports exactly these three stages; anything
// else is rejected rather than guessed at.
pub(crate) fn stage_flags(model: ExecutionModel) -> Result<ShaderStageFlags> {
    match model {
        ExecutionModel::Vertex => Ok(ShaderStageFlags::VERTEX),
        ExecutionModel::Fragment => Ok(ShaderStageFlags::FRAGMENT),
        ExecutionModel::GLCompute => Ok(ShaderStageFlags::COMPUTE),
        _ => Err(ReflectError::UnsupportedExecutionModel),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_supported_models() {
        assert_eq!(
            stage_flags(ExecutionModel::Vertex).unwrap(),
            ShaderStageFlags::VERTEX,
        );
        assert_eq!(
            stage_flags(ExecutionModel::Fragment).unwrap(),
            ShaderStageFlags::FRAGMENT,
        );
        assert_eq!(
            stage_flags(ExecutionModel::GLCompute).unwrap(),
            ShaderStageFlags::COMPUTE,
        );
    }

    #[test]
    fn rejects_other_models() {
        assert_eq!(
            stage_flags(ExecutionModel::Geometry),
            Err(ReflectError::UnsupportedExecutionModel),
        );
    }
}
