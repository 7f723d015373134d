/// Light records and the append-only light set
///
/// Layouts match the shader-side std430 structs bit for bit.

use bytemuck::{Pod, Zeroable};
use glam::{Vec3, Vec4};
use rand::{Rng, SeedableRng};
use rand::rngs::StdRng;
use static_assertions::const_assert_eq;

/// Omnidirectional light
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct PointLight {
    pub position: Vec3,
    pub radius: f32,
    pub color: Vec3,
    pub falloff: f32,
}

impl PointLight {
    pub fn new(position: Vec3, radius: f32, color: Vec3, falloff: f32) -> Self {
        Self { position, radius, color, falloff }
    }
}

/// Cone light
///
/// `cutoff` and `inner_cutoff` are passed through to the shader unchanged.
/// Lights loaded from glTF carry the outer and inner cone angles in radians.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct SpotLight {
    pub position: Vec3,
    pub radius: f32,
    pub direction: Vec4,
    pub color: Vec3,
    pub falloff: f32,
    pub cutoff: f32,
    pub inner_cutoff: f32,
    pub padding: [f32; 2],
}

impl SpotLight {
    pub fn new(
        position: Vec3,
        radius: f32,
        direction: Vec4,
        color: Vec3,
        falloff: f32,
        cutoff: f32,
        inner_cutoff: f32,
    ) -> Self {
        Self {
            position,
            radius,
            direction,
            color,
            falloff,
            cutoff,
            inner_cutoff,
            padding: [0.0; 2],
        }
    }
}

/// Light without position
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct DirLight {
    pub direction: Vec4,
    pub color: Vec4,
}

impl DirLight {
    pub fn new(direction: Vec4, color: Vec4) -> Self {
        Self { direction, color }
    }
}

const_assert_eq!(std::mem::size_of::<PointLight>(), 32);
const_assert_eq!(std::mem::size_of::<SpotLight>(), 64);
const_assert_eq!(std::mem::size_of::<DirLight>(), 32);

/// Seed of the reproducible demo light field
pub const DEMO_LIGHT_SEED: u64 = 3_529_725_061;

/// Point the demo spot lights aim at
pub const DEMO_LIGHT_CENTRE: Vec3 = Vec3::new(20.0, 0.0, 25.0);

// ============================================================================
// LightSet
// ============================================================================

/// The three light arrays of a scene
///
/// Lights are only ever appended; their order is the upload order.
#[derive(Debug, Clone, Default)]
pub struct LightSet {
    point_lights: Vec<PointLight>,
    spot_lights: Vec<SpotLight>,
    dir_lights: Vec<DirLight>,
}

impl LightSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_point_light(&mut self, light: PointLight) -> u32 {
        self.point_lights.push(light);
        self.point_lights.len() as u32 - 1
    }

    pub fn add_spot_light(&mut self, light: SpotLight) -> u32 {
        self.spot_lights.push(light);
        self.spot_lights.len() as u32 - 1
    }

    pub fn add_dir_light(&mut self, light: DirLight) -> u32 {
        self.dir_lights.push(light);
        self.dir_lights.len() as u32 - 1
    }

    pub fn point_lights(&self) -> &[PointLight] {
        &self.point_lights
    }

    pub fn spot_lights(&self) -> &[SpotLight] {
        &self.spot_lights
    }

    pub fn dir_lights(&self) -> &[DirLight] {
        &self.dir_lights
    }

    pub fn total(&self) -> usize {
        self.point_lights.len() + self.spot_lights.len() + self.dir_lights.len()
    }

    /// Append the demo light field: 100 white spot lights scattered around
    /// and aimed at `DEMO_LIGHT_CENTRE`, then one point light, one
    /// directional light and one extra spot light
    ///
    /// The same seed always produces the same lights.
    pub fn spawn_demo_lights(&mut self, seed: u64) {
        let mut rng = StdRng::seed_from_u64(seed);
        for _ in 0..100 {
            let position = Vec3::new(
                rng.gen_range(-10..=60) as f32,
                rng.gen_range(-10..=20) as f32,
                rng.gen_range(-10..=60) as f32,
            );
            let radius = rng.gen_range(5..=30) as f32;
            let direction = (DEMO_LIGHT_CENTRE - position).normalize_or_zero();
            self.add_spot_light(SpotLight::new(
                position,
                radius,
                direction.extend(1.0),
                Vec3::ONE,
                0.0,
                0.95,
                0.96,
            ));
        }

        self.add_point_light(PointLight::new(
            Vec3::new(20.0, 0.0, 0.0),
            25.0,
            Vec3::new(0.0, 0.2, 0.5),
            10.0,
        ));
        self.add_dir_light(DirLight::new(
            Vec4::new(-1.0, 1.0, -1.0, 1.0),
            Vec4::new(0.85, 0.85, 0.5, 1.0),
        ));
        self.add_spot_light(SpotLight::new(
            Vec3::new(-9.0, -1.0, 2.0),
            10.0,
            Vec4::new(1.0, 0.0, -1.0, 1.0),
            Vec3::ONE,
            0.0,
            0.95,
            0.96,
        ));
    }
}

#[cfg(test)]
#[path = "lights_tests.rs"]
mod tests;
