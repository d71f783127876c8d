pub mod diffuse_irradiance;
pub mod env_prefilter;
pub mod equirectangular;
pub mod mipmap;

pub use diffuse_irradiance::IrradianceConvolver;
pub use env_prefilter::{MipSpec, SpecularPrefilterer};
pub use equirectangular::{background_side_width, BackgroundGenerator};
pub use mipmap::MipmapPipeline;
