use bytemuck::{Pod, Zeroable};
use glam::Mat4;

use crate::renderer::cube::cube_vertex_layout;
use crate::renderer::render_target::{CUBE_FORMAT, DEPTH_FORMAT};
use crate::renderer::utils::{bind_sampled_texture, create_shader_module, sampled_texture_layout, with_validation};
use crate::{Error, Result};

/// Shared vertex stage: transforms the unit cube and hands the local position
/// to the fragment kernel as the sampling direction.
const CAPTURE_WGSL: &str = include_str!("shaders/capture.wgsl");

/// The only texture slot a capture kernel samples from.
pub const ENVIRONMENT_SLOT: u32 = 0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum KernelParam {
    Matrix(Mat4),
    Scalar(f32),
    TextureSlot(u32),
}

/// Shape of the environment a kernel samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputDimension {
    Equirectangular,
    Cube,
}

impl InputDimension {
    fn view_dimension(self) -> wgpu::TextureViewDimension {
        match self {
            InputDimension::Equirectangular => wgpu::TextureViewDimension::D2,
            InputDimension::Cube => wgpu::TextureViewDimension::Cube,
        }
    }
}

/// A shading kernel the cube capture renderer can drive.
pub trait Kernel {
    fn label(&self) -> &str;

    fn input_dimension(&self) -> InputDimension;

    fn set(&mut self, name: &str, value: KernelParam) -> Result<()>;

    /// Uploads the current parameters. Must run before the pass that reads them is submitted.
    fn flush(&self, queue: &wgpu::Queue);

    fn record<'a>(&'a self, pass: &mut wgpu::RenderPass<'a>, input: &'a EnvironmentInput);
}

#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
pub struct CaptureUniforms {
    pub projection: [[f32; 4]; 4],
    pub view: [[f32; 4]; 4],
    pub roughness: f32,
    pub source_resolution: f32,
    _padding: [f32; 2],
}

/// Parameter state of a capture kernel, independent of any device.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KernelParams {
    pub projection: Mat4,
    pub view: Mat4,
    pub roughness: f32,
    pub source_resolution: f32,
}

impl Default for KernelParams {
    fn default() -> Self {
        Self {
            projection: Mat4::IDENTITY,
            view: Mat4::IDENTITY,
            roughness: 0.0,
            source_resolution: 1.0,
        }
    }
}

impl KernelParams {
    pub fn set(&mut self, kernel: &str, name: &str, value: KernelParam) -> Result<()> {
        match (name, value) {
            ("projection", KernelParam::Matrix(m)) => self.projection = m,
            ("view", KernelParam::Matrix(m)) => self.view = m,
            ("roughness", KernelParam::Scalar(r)) => self.roughness = r,
            ("resolution", KernelParam::Scalar(r)) => self.source_resolution = r,
            ("environment", KernelParam::TextureSlot(ENVIRONMENT_SLOT)) => {}
            _ => {
                return Err(Error::UnknownKernelParameter {
                    kernel: kernel.to_string(),
                    name: name.to_string(),
                })
            }
        }
        Ok(())
    }

    pub fn uniforms(&self) -> CaptureUniforms {
        CaptureUniforms {
            projection: self.projection.to_cols_array_2d(),
            view: self.view.to_cols_array_2d(),
            roughness: self.roughness,
            source_resolution: self.source_resolution,
            _padding: [0.0; 2],
        }
    }
}

pub struct KernelDesc {
    pub label: &'static str,
    /// WGSL fragment stage, appended to the shared capture vertex stage.
    pub fragment: &'static str,
    pub input: InputDimension,
}

/// Environment texture bound for one kernel's input group.
pub struct EnvironmentInput {
    bind_group: wgpu::BindGroup,
    dimension: InputDimension,
}

impl EnvironmentInput {
    pub fn dimension(&self) -> InputDimension {
        self.dimension
    }
}

/// wgpu-backed kernel: group 0 holds the sampled environment, group 1 the
/// capture uniforms.
pub struct ShaderKernel {
    label: &'static str,
    input: InputDimension,
    params: KernelParams,
    uniform_buffer: wgpu::Buffer,
    uniform_bind_group: wgpu::BindGroup,
    input_layout: wgpu::BindGroupLayout,
    render_pipeline: wgpu::RenderPipeline,
}

impl ShaderKernel {
    pub fn new(device: &wgpu::Device, desc: &KernelDesc) -> Result<Self> {
        let input_layout = sampled_texture_layout(device, "Kernel Input Bind Group Layout", desc.input.view_dimension());

        let uniform_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: wgpu::BufferSize::new(std::mem::size_of::<CaptureUniforms>() as u64),
                },
                count: None,
            }],
            label: Some("Capture Uniforms Bind Group Layout"),
        });

        let params = KernelParams::default();
        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(desc.label),
            size: std::mem::size_of::<CaptureUniforms>() as wgpu::BufferAddress,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let uniform_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &uniform_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
            label: Some("Capture Uniforms Bind Group"),
        });

        let render_pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(desc.label),
            bind_group_layouts: &[&input_layout, &uniform_layout],
            push_constant_ranges: &[],
        });

        let shader_module = create_shader_module(device, desc.label, format!("{CAPTURE_WGSL}\n{}", desc.fragment))?;
        let (render_pipeline, error) = with_validation(device, || {
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(desc.label),
                layout: Some(&render_pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &shader_module,
                    entry_point: "vs_main",
                    buffers: &[cube_vertex_layout()],
                },
                fragment: Some(wgpu::FragmentState {
                    module: &shader_module,
                    entry_point: "fs_main",
                    targets: &[Some(wgpu::ColorTargetState {
                        format: CUBE_FORMAT,
                        blend: None,
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                }),
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    strip_index_format: None,
                    front_face: wgpu::FrontFace::Ccw,
                    // The camera sits inside the cube.
                    cull_mode: None,
                    ..Default::default()
                },
                depth_stencil: Some(wgpu::DepthStencilState {
                    format: DEPTH_FORMAT,
                    depth_write_enabled: true,
                    depth_compare: wgpu::CompareFunction::LessEqual,
                    stencil: wgpu::StencilState::default(),
                    bias: wgpu::DepthBiasState::default(),
                }),
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
            })
        });
        if let Some(e) = error {
            return Err(Error::Shader {
                label: desc.label,
                reason: e.to_string(),
            });
        }

        Ok(Self {
            label: desc.label,
            input: desc.input,
            params,
            uniform_buffer,
            uniform_bind_group,
            input_layout,
            render_pipeline,
        })
    }

    /// Binds `view` as this kernel's sampled environment. The view must match
    /// the kernel's input dimension.
    pub fn bind_input(&self, device: &wgpu::Device, view: &wgpu::TextureView, sampler: &wgpu::Sampler) -> EnvironmentInput {
        let bind_group = bind_sampled_texture(device, &self.input_layout, "Kernel Input Bind Group", view, sampler);
        EnvironmentInput {
            bind_group,
            dimension: self.input,
        }
    }
}

impl Kernel for ShaderKernel {
    fn label(&self) -> &str {
        self.label
    }

    fn input_dimension(&self) -> InputDimension {
        self.input
    }

    fn set(&mut self, name: &str, value: KernelParam) -> Result<()> {
        self.params.set(self.label, name, value)
    }

    fn flush(&self, queue: &wgpu::Queue) {
        queue.write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(&self.params.uniforms()));
    }

    fn record<'a>(&'a self, pass: &mut wgpu::RenderPass<'a>, input: &'a EnvironmentInput) {
        pass.set_pipeline(&self.render_pipeline);
        pass.set_bind_group(0, &input.bind_group, &[]);
        pass.set_bind_group(1, &self.uniform_bind_group, &[]);
    }
}
