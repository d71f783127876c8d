use std::sync::OnceLock;

use glam::{Mat4, Vec3};

pub const CAPTURE_FOV_Y_DEGREES: f32 = 90.0;
pub const CAPTURE_NEAR: f32 = 0.1;
pub const CAPTURE_FAR: f32 = 10.0;

/// Face order shared by view selection, GPU array layers and output file names.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CubeFace {
    PositiveX = 0,
    NegativeX = 1,
    PositiveY = 2,
    NegativeY = 3,
    PositiveZ = 4,
    NegativeZ = 5,
}

impl CubeFace {
    pub const ALL: [CubeFace; 6] = [
        CubeFace::PositiveX,
        CubeFace::NegativeX,
        CubeFace::PositiveY,
        CubeFace::NegativeY,
        CubeFace::PositiveZ,
        CubeFace::NegativeZ,
    ];

    pub fn index(self) -> u32 {
        self as u32
    }

    pub fn forward(self) -> Vec3 {
        match self {
            CubeFace::PositiveX => Vec3::X,
            CubeFace::NegativeX => Vec3::NEG_X,
            CubeFace::PositiveY => Vec3::Y,
            CubeFace::NegativeY => Vec3::NEG_Y,
            CubeFace::PositiveZ => Vec3::Z,
            CubeFace::NegativeZ => Vec3::NEG_Z,
        }
    }

    // Cube-map texel rows run against world up on the side faces, hence -Y.
    pub fn up(self) -> Vec3 {
        match self {
            CubeFace::PositiveY => Vec3::Z,
            CubeFace::NegativeY => Vec3::NEG_Z,
            _ => Vec3::NEG_Y,
        }
    }

    pub fn view(self) -> Mat4 {
        view_state().views[self as usize]
    }
}

/// Capture matrices, built once per process.
pub struct ViewState {
    pub projection: Mat4,
    pub views: [Mat4; 6],
}

pub fn view_state() -> &'static ViewState {
    static VIEW_STATE: OnceLock<ViewState> = OnceLock::new();
    VIEW_STATE.get_or_init(|| {
        // wgpu writes clip-space +Y to texel row 0; flipping Y puts the
        // cube-map t = 0 row there instead, matching cube sampling.
        let flip_y = Mat4::from_scale(Vec3::new(1.0, -1.0, 1.0));
        let projection = flip_y
            * Mat4::perspective_rh(
                CAPTURE_FOV_Y_DEGREES.to_radians(),
                1.0,
                CAPTURE_NEAR,
                CAPTURE_FAR,
            );
        let views = CubeFace::ALL.map(|face| Mat4::look_at_rh(Vec3::ZERO, face.forward(), face.up()));
        ViewState { projection, views }
    })
}

pub const FLOATS_PER_VERTEX: usize = 8;
pub const CUBE_VERTEX_COUNT: u32 = 36;

pub fn cube_vertex_layout() -> wgpu::VertexBufferLayout<'static> {
    const ATTRIBUTES: [wgpu::VertexAttribute; 3] =
        wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3, 2 => Float32x2];
    wgpu::VertexBufferLayout {
        array_stride: (FLOATS_PER_VERTEX * std::mem::size_of::<f32>()) as wgpu::BufferAddress,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &ATTRIBUTES,
    }
}

/// Unit cube around the origin: position, normal, uv per vertex.
#[rustfmt::skip]
pub const CUBE_VERTICES: [f32; FLOATS_PER_VERTEX * CUBE_VERTEX_COUNT as usize] = [
    // -z
    -1.0, -1.0, -1.0,  0.0,  0.0, -1.0,  0.0, 0.0,
     1.0,  1.0, -1.0,  0.0,  0.0, -1.0,  1.0, 1.0,
     1.0, -1.0, -1.0,  0.0,  0.0, -1.0,  1.0, 0.0,
     1.0,  1.0, -1.0,  0.0,  0.0, -1.0,  1.0, 1.0,
    -1.0, -1.0, -1.0,  0.0,  0.0, -1.0,  0.0, 0.0,
    -1.0,  1.0, -1.0,  0.0,  0.0, -1.0,  0.0, 1.0,
    // +z
    -1.0, -1.0,  1.0,  0.0,  0.0,  1.0,  0.0, 0.0,
     1.0, -1.0,  1.0,  0.0,  0.0,  1.0,  1.0, 0.0,
     1.0,  1.0,  1.0,  0.0,  0.0,  1.0,  1.0, 1.0,
     1.0,  1.0,  1.0,  0.0,  0.0,  1.0,  1.0, 1.0,
    -1.0,  1.0,  1.0,  0.0,  0.0,  1.0,  0.0, 1.0,
    -1.0, -1.0,  1.0,  0.0,  0.0,  1.0,  0.0, 0.0,
    // -x
    -1.0,  1.0,  1.0, -1.0,  0.0,  0.0,  1.0, 0.0,
    -1.0,  1.0, -1.0, -1.0,  0.0,  0.0,  1.0, 1.0,
    -1.0, -1.0, -1.0, -1.0,  0.0,  0.0,  0.0, 1.0,
    -1.0, -1.0, -1.0, -1.0,  0.0,  0.0,  0.0, 1.0,
    -1.0, -1.0,  1.0, -1.0,  0.0,  0.0,  0.0, 0.0,
    -1.0,  1.0,  1.0, -1.0,  0.0,  0.0,  1.0, 0.0,
    // +x
     1.0,  1.0,  1.0,  1.0,  0.0,  0.0,  1.0, 0.0,
     1.0, -1.0, -1.0,  1.0,  0.0,  0.0,  0.0, 1.0,
     1.0,  1.0, -1.0,  1.0,  0.0,  0.0,  1.0, 1.0,
     1.0, -1.0, -1.0,  1.0,  0.0,  0.0,  0.0, 1.0,
     1.0,  1.0,  1.0,  1.0,  0.0,  0.0,  1.0, 0.0,
     1.0, -1.0,  1.0,  1.0,  0.0,  0.0,  0.0, 0.0,
    // -y
    -1.0, -1.0, -1.0,  0.0, -1.0,  0.0,  0.0, 1.0,
     1.0, -1.0, -1.0,  0.0, -1.0,  0.0,  1.0, 1.0,
     1.0, -1.0,  1.0,  0.0, -1.0,  0.0,  1.0, 0.0,
     1.0, -1.0,  1.0,  0.0, -1.0,  0.0,  1.0, 0.0,
    -1.0, -1.0,  1.0,  0.0, -1.0,  0.0,  0.0, 0.0,
    -1.0, -1.0, -1.0,  0.0, -1.0,  0.0,  0.0, 1.0,
    // +y
    -1.0,  1.0, -1.0,  0.0,  1.0,  0.0,  0.0, 1.0,
     1.0,  1.0,  1.0,  0.0,  1.0,  0.0,  1.0, 0.0,
     1.0,  1.0, -1.0,  0.0,  1.0,  0.0,  1.0, 1.0,
     1.0,  1.0,  1.0,  0.0,  1.0,  0.0,  1.0, 0.0,
    -1.0,  1.0, -1.0,  0.0,  1.0,  0.0,  0.0, 1.0,
    -1.0,  1.0,  1.0,  0.0,  1.0,  0.0,  0.0, 0.0,
];
