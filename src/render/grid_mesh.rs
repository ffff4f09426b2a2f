use bevy::render::{
    mesh::{Indices, Mesh, PrimitiveTopology},
    render_asset::RenderAssetUsages,
};

/// The grid all tiles are drawn with.
///
/// It has `(grid_size + 1)²` vertices centered around the origin, one unit apart.
/// Each tile transform scales it to the size of the tile, the height is sampled in the shader.
#[derive(Clone, Debug)]
pub struct GridMesh {
    grid_size: u32,
    vertices: Vec<[f32; 2]>,
    indices: Vec<u16>,
}

impl GridMesh {
    /// The largest grid whose vertices can still be addressed with 16 bit indices.
    pub const MAX_GRID_SIZE: u32 = 128;

    pub fn new(grid_size: u32) -> Self {
        assert!(
            grid_size <= Self::MAX_GRID_SIZE,
            "grid size {grid_size} exceeds the maximum of {}",
            Self::MAX_GRID_SIZE
        );

        let stride = grid_size + 1;
        let half = (grid_size / 2) as f32;

        let vertices = (0..stride)
            .flat_map(|k| (0..stride).map(move |i| [i as f32 - half, k as f32 - half]))
            .collect();

        let mut indices = Vec::with_capacity(6 * (grid_size * grid_size) as usize);

        for k in 0..grid_size {
            for i in 0..grid_size {
                let v = (k * stride + i) as u16;
                let stride = stride as u16;

                indices.extend([v, v + 1, v + stride]);
                indices.extend([v + stride, v + 1, v + stride + 1]);
            }
        }

        Self {
            grid_size,
            vertices,
            indices,
        }
    }

    pub fn grid_size(&self) -> u32 {
        self.grid_size
    }

    pub fn vertices(&self) -> &[[f32; 2]] {
        &self.vertices
    }

    pub fn indices(&self) -> &[u16] {
        &self.indices
    }

    pub fn index_count(&self) -> u32 {
        self.indices.len() as u32
    }

    /// The grid as a triangle mesh in the x/z plane.
    pub fn to_mesh(&self) -> Mesh {
        let positions = self
            .vertices
            .iter()
            .map(|&[x, z]| [x, 0.0, z])
            .collect::<Vec<_>>();

        Mesh::new(
            PrimitiveTopology::TriangleList,
            RenderAssetUsages::RENDER_WORLD | RenderAssetUsages::MAIN_WORLD,
        )
        .with_inserted_attribute(Mesh::ATTRIBUTE_POSITION, positions)
        .with_inserted_indices(Indices::U16(self.indices.clone()))
    }
}

/// The edges of the box `[-1, 1]³` as a line list, used to visualize tile bounds.
pub struct BoxLines;

impl BoxLines {
    pub const VERTICES: [[f32; 3]; 8] = [
        [-1.0, 1.0, -1.0],
        [-1.0, 1.0, 1.0],
        [1.0, 1.0, 1.0],
        [1.0, 1.0, -1.0],
        [-1.0, -1.0, -1.0],
        [-1.0, -1.0, 1.0],
        [1.0, -1.0, 1.0],
        [1.0, -1.0, -1.0],
    ];

    #[rustfmt::skip]
    pub const INDICES: [u16; 24] = [
        0, 1, 1, 2, 2, 3, 3, 0,
        4, 5, 5, 6, 6, 7, 7, 4,
        0, 4, 1, 5, 2, 6, 3, 7,
    ];

    pub const INDEX_COUNT: u32 = Self::INDICES.len() as u32;

    pub fn to_mesh() -> Mesh {
        Mesh::new(
            PrimitiveTopology::LineList,
            RenderAssetUsages::RENDER_WORLD | RenderAssetUsages::MAIN_WORLD,
        )
        .with_inserted_attribute(Mesh::ATTRIBUTE_POSITION, Self::VERTICES.to_vec())
        .with_inserted_indices(Indices::U16(Self::INDICES.to_vec()))
    }
}
