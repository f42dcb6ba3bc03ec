// Shader module loading
//
// Vulkan consumes SPIR-V as 4-byte words. Binaries arrive as raw bytes from
// the file-system collaborator, so they are re-packed into aligned words
// before the driver sees them.

use super::VulkanDevice;
use crate::error::{Error, Result, VkResultExt};
use ash::vk;
use std::io::Cursor;

/// A shader module that only lives as long as pipeline creation needs it.
pub struct ShaderModule<'a> {
    pub module: vk::ShaderModule,
    device: &'a VulkanDevice,
}

impl<'a> ShaderModule<'a> {
    pub fn new(device: &'a VulkanDevice, code: &[u8]) -> Result<Self> {
        let words = spirv_words(code)?;
        let create_info = vk::ShaderModuleCreateInfo::builder().code(&words);

        let module = unsafe { device.device.create_shader_module(&create_info, None) }
            .renderer_context("Failed to create shader module")?;

        Ok(Self { module, device })
    }
}

impl Drop for ShaderModule<'_> {
    fn drop(&mut self) {
        unsafe { self.device.device.destroy_shader_module(self.module, None) };
    }
}

const SPIRV_MAGIC: u32 = 0x0723_0203;

/// Validate length and magic number and return the binary as aligned,
/// host-endian words.
pub fn spirv_words(code: &[u8]) -> Result<Vec<u32>> {
    let words = ash::util::read_spv(&mut Cursor::new(code))
        .map_err(|e| Error::renderer(format!("Invalid SPIR-V binary: {e}")))?;

    // read_spv already swapped byte order if the magic came in reversed.
    match words.first() {
        Some(&SPIRV_MAGIC) => Ok(words),
        _ => Err(Error::renderer("Invalid SPIR-V binary: bad magic number")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repacks_little_endian_words() {
        let mut bytes = SPIRV_MAGIC.to_le_bytes().to_vec();
        bytes.extend_from_slice(&0x0001_0000u32.to_le_bytes());

        let words = spirv_words(&bytes).unwrap();
        assert_eq!(words, vec![SPIRV_MAGIC, 0x0001_0000]);
    }

    #[test]
    fn rejects_truncated_binary() {
        let mut bytes = SPIRV_MAGIC.to_le_bytes().to_vec();
        bytes.push(0x01);

        assert!(matches!(spirv_words(&bytes), Err(Error::Renderer { .. })));
    }

    #[test]
    fn rejects_unaligned_length() {
        // 13 bytes
        assert!(spirv_words(b"#version 450\n").is_err());
    }

    #[test]
    fn rejects_aligned_bytes_without_magic() {
        // 12 bytes of GLSL source: right length, wrong content.
        let err = spirv_words(b"#version 450").unwrap_err();
        assert!(err.to_string().contains("magic"));
    }

    #[test]
    fn rejects_empty_binary() {
        assert!(spirv_words(&[]).is_err());
    }

    #[test]
    fn accepts_big_endian_binary() {
        let mut bytes = SPIRV_MAGIC.to_be_bytes().to_vec();
        bytes.extend_from_slice(&7u32.to_be_bytes());

        assert_eq!(spirv_words(&bytes).unwrap(), vec![SPIRV_MAGIC, 7]);
    }
}
