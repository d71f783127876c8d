use crate::{Error, Result};

/// Headless device and queue. No surface is ever created.
pub struct GpuContext {
    pub adapter: wgpu::Adapter,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
}

/// Rejects backends that cannot bake. On GL, copies out of six-layer textures
/// read back as zeros without raising an error.
pub fn check_backend(backend: wgpu::Backend) -> Result<()> {
    match backend {
        wgpu::Backend::Gl | wgpu::Backend::Empty => Err(Error::ContextInit(format!(
            "{backend:?} adapters cannot read back cube textures"
        ))),
        _ => Ok(()),
    }
}

impl GpuContext {
    pub async fn new() -> Result<Self> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions::default())
            .await
            .ok_or_else(|| Error::ContextInit("no compatible GPU adapter found".to_string()))?;

        let info = adapter.get_info();
        check_backend(info.backend)?;
        log::info!("using adapter {} ({:?})", info.name, info.backend);

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("envmap-baker device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::downlevel_defaults()
                        .using_resolution(adapter.limits()),
                },
                None,
            )
            .await
            .map_err(|e| Error::ContextInit(e.to_string()))?;

        Ok(Self {
            adapter,
            device,
            queue,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gl_adapters_are_refused() {
        let err = check_backend(wgpu::Backend::Gl).unwrap_err();
        assert!(matches!(err, Error::ContextInit(ref reason) if reason.contains("Gl")), "{err}");
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn native_backends_are_accepted() {
        for backend in [wgpu::Backend::Vulkan, wgpu::Backend::Metal, wgpu::Backend::Dx12] {
            assert!(check_backend(backend).is_ok(), "{backend:?}");
        }
    }
}
