// Error taxonomy for the renderer core
//
// Three failure kinds cross the core's boundary: file reads, the window
// system, and everything at the graphics-API boundary. Nothing in the core
// recovers from any of them; they travel up with `?` to `main`.

use ash::prelude::VkResult;
use ash::vk;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// A file (shader binary) could not be opened or fully read.
    #[error("cannot read file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Window creation, event loop, or surface creation failed.
    #[error("window error: {0}")]
    Window(String),

    /// Anything rejected or unsupported at the Vulkan boundary.
    #[error("renderer error: {message}")]
    Renderer {
        message: String,
        #[source]
        source: Option<vk::Result>,
    },
}

impl Error {
    pub fn renderer(message: impl Into<String>) -> Self {
        Self::Renderer {
            message: message.into(),
            source: None,
        }
    }

    pub fn window(message: impl Into<String>) -> Self {
        Self::Window(message.into())
    }
}

/// Attach a message to a raw Vulkan result, turning it into a renderer error.
pub trait VkResultExt<T> {
    fn renderer_context(self, message: &str) -> Result<T>;
}

impl<T> VkResultExt<T> for VkResult<T> {
    fn renderer_context(self, message: &str) -> Result<T> {
        self.map_err(|result| Error::Renderer {
            message: format!("{message} ({result})"),
            source: Some(result),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vk_failures_keep_their_result_code() {
        let failed: VkResult<()> = Err(vk::Result::ERROR_DEVICE_LOST);
        let err = failed.renderer_context("Cannot wait for fences").unwrap_err();

        match err {
            Error::Renderer { message, source } => {
                assert!(message.starts_with("Cannot wait for fences"));
                assert_eq!(source, Some(vk::Result::ERROR_DEVICE_LOST));
            }
            other => panic!("unexpected error kind: {other:?}"),
        }
    }

    #[test]
    fn io_errors_name_the_path() {
        let err = Error::Io {
            path: PathBuf::from("shaders/missing.spv"),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        };
        assert!(err.to_string().contains("shaders/missing.spv"));
    }
}
