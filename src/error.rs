use std::path::PathBuf;

use thiserror::Error;

use crate::renderer::kernel::InputDimension;

#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid input {path:?}: {reason}")]
    InputValidation { path: PathBuf, reason: String },

    #[error("{0}")]
    Usage(String),

    #[error("failed to initialize GPU context: {0}")]
    ContextInit(String),

    #[error("{stage}: render target with side width {side_width} is incomplete: {reason}")]
    TargetIncomplete {
        stage: &'static str,
        side_width: u32,
        reason: String,
    },

    #[error("expected a 16-bit float RGB texture, found {found:?}")]
    UnexpectedFormat { found: wgpu::TextureFormat },

    #[error("mip level {level} out of range, texture has {count} levels")]
    MipOutOfRange { level: u32, count: u32 },

    #[error("{stage}: device error: {reason}")]
    Device { stage: &'static str, reason: String },

    #[error("kernel {kernel} has no {name} parameter of that type")]
    UnknownKernelParameter { kernel: String, name: String },

    #[error("kernel {kernel} samples a {expected:?} input, got {found:?}")]
    KernelInput {
        kernel: String,
        expected: InputDimension,
        found: InputDimension,
    },

    #[error("shader {label} failed to compile: {reason}")]
    Shader { label: &'static str, reason: String },

    #[error("invalid radiance image: {reason}")]
    InvalidImage { reason: String },

    #[error("failed to decode radiance image: {0}")]
    Decode(#[from] image::ImageError),

    #[error("failed to encode {path:?}: {source}")]
    Encode {
        path: PathBuf,
        source: image::ImageError,
    },

    #[error("texture readback failed: {0}")]
    Readback(#[from] wgpu::BufferAsyncError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Process exit status for the command line tool.
    pub fn exit_code(&self) -> u8 {
        match self {
            Error::InputValidation { .. } | Error::Usage(_) => 2,
            _ => 1,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
