//! Lane geometry: collision mesh input and the standard pin rack.

use rapier3d::prelude::Vector;

use crate::config::SimulationConfig;
use crate::simulation::{PIN_COUNT, SimulationError};

/// Centre-to-centre distance between neighbouring pins (12 in).
pub const PIN_SPACING: f32 = 0.3048;

/// Lane collision geometry as delivered by the mesh importer: a flat vertex
/// array (xyz per vertex) and a flat triangle index array.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LaneMesh {
    pub vertices: Vec<f32>,
    pub indices: Vec<u32>,
}

impl LaneMesh {
    pub fn new(vertices: Vec<f32>, indices: Vec<u32>) -> Self {
        Self { vertices, indices }
    }

    /// Builds a flat lane from the approach to the end of the pin deck,
    /// with a sunken gutter strip down each side that ends at the head pin.
    ///
    /// Nothing catches a body past the outer gutter edges or the end of the
    /// deck, which is how gutter balls and flung pins end up below the floor
    /// height.
    pub fn flat(config: &SimulationConfig) -> Self {
        const APPROACH: f32 = 3.0;
        const DECK: f32 = 1.5;
        const GUTTER_WIDTH: f32 = 0.24;
        const GUTTER_DEPTH: f32 = 0.1;

        let x0 = config.lane_center_x - config.lane_half_width;
        let x1 = config.lane_center_x + config.lane_half_width;
        let y = config.lane_surface_y;
        let z_near = config.foul_line_z + APPROACH;
        let z_head = config.foul_line_z - config.lane_length;

        let mut mesh = Self::default();
        mesh.push_strip([x0, x1], y, [z_near, z_head - DECK]);
        let gutter_y = y - GUTTER_DEPTH;
        mesh.push_strip([x0 - GUTTER_WIDTH, x0], gutter_y, [z_near, z_head]);
        mesh.push_strip([x1, x1 + GUTTER_WIDTH], gutter_y, [z_near, z_head]);
        mesh
    }

    /// Appends a horizontal rectangle split into short segments along z,
    /// wound so the normals face up.
    fn push_strip(&mut self, [x0, x1]: [f32; 2], y: f32, [z_near, z_far]: [f32; 2]) {
        const SEGMENT: f32 = 2.0;

        let total = z_near - z_far;
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let segments = (total / SEGMENT).ceil().max(1.0) as u32;
        #[allow(clippy::cast_possible_truncation)]
        let base = (self.vertices.len() / 3) as u32;

        #[allow(clippy::cast_precision_loss)]
        for i in 0..=segments {
            let z = z_near - total * (i as f32 / segments as f32);
            self.vertices.extend_from_slice(&[x0, y, z, x1, y, z]);
        }
        for i in 0..segments {
            let a = base + i * 2;
            let (b, c, d) = (a + 1, a + 2, a + 3);
            self.indices.extend_from_slice(&[a, b, c, b, d, c]);
        }
    }

    /// Converts the flat arrays into the point/triangle lists the engine wants.
    pub fn to_trimesh(&self) -> Result<(Vec<Vector>, Vec<[u32; 3]>), SimulationError> {
        if self.vertices.is_empty() || self.vertices.len() % 3 != 0 {
            return Err(SimulationError::LaneVertices(self.vertices.len()));
        }
        if self.indices.is_empty() || self.indices.len() % 3 != 0 {
            return Err(SimulationError::LaneIndices(self.indices.len()));
        }

        let points: Vec<Vector> = self
            .vertices
            .chunks_exact(3)
            .map(|v| Vector::new(v[0], v[1], v[2]))
            .collect();

        let vertex_count = points.len();
        let mut triangles = Vec::with_capacity(self.indices.len() / 3);
        for tri in self.indices.chunks_exact(3) {
            if let Some(&bad) = tri.iter().find(|&&i| i as usize >= vertex_count) {
                return Err(SimulationError::LaneIndexOutOfRange {
                    index: bad,
                    vertex_count,
                });
            }
            triangles.push([tri[0], tri[1], tri[2]]);
        }

        Ok((points, triangles))
    }
}

/// Lays out the classic 1-2-3-4 triangle behind `head_pin`, which is the
/// front pin's centre. Rows extend toward -z.
pub fn standard_pin_rack(head_pin: Vector, spacing: f32) -> [Vector; PIN_COUNT] {
    let row_depth = spacing * 3f32.sqrt() * 0.5;
    let mut rack = [head_pin; PIN_COUNT];
    let mut slot = 0;
    for row in 0..4u8 {
        let r = f32::from(row);
        for j in 0..=row {
            let x = head_pin.x + (f32::from(j) - r * 0.5) * spacing;
            let z = head_pin.z - r * row_depth;
            rack[slot] = Vector::new(x, head_pin.y, z);
            slot += 1;
        }
    }
    rack
}

/// Pin centres for the configured lane.
pub fn default_pin_spots(config: &SimulationConfig) -> [Vector; PIN_COUNT] {
    let head = Vector::new(
        config.lane_center_x,
        config.lane_surface_y + config.pin_half_height,
        config.foul_line_z - config.lane_length,
    );
    standard_pin_rack(head, PIN_SPACING)
}

/// Resting ball position just behind the foul line.
pub fn default_ball_start(config: &SimulationConfig) -> Vector {
    Vector::new(
        config.lane_center_x,
        config.lane_surface_y + config.ball_radius,
        config.foul_line_z + 0.5,
    )
}
