pub mod capture;
pub mod cube;
pub mod gpu_context;
pub mod kernel;
pub mod pipelines;
pub mod render_target;
pub mod utils;

pub use capture::CubeCaptureRenderer;
pub use cube::CubeFace;
pub use gpu_context::GpuContext;
pub use kernel::{EnvironmentInput, InputDimension, Kernel, KernelParam, ShaderKernel};
pub use render_target::{ActiveTarget, MipChain, RenderTarget, RenderTargetManager, TargetId};
