use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Shader configuration assigned to every mesh node of a loaded fragment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Material {
    pub color: Vec3,
    pub emissive: Vec3,
    pub metalness: f32,
    pub roughness: f32,
    pub flat_shading: bool,
    pub vertex_colors: bool,
    pub fog: bool,
    pub env_map_intensity: f32,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            color: Vec3::ONE,
            emissive: Vec3::ZERO,
            metalness: 0.0,
            roughness: 1.0,
            flat_shading: false,
            vertex_colors: false,
            fog: true,
            env_map_intensity: 1.0,
        }
    }
}

impl Material {
    fn crystal(color: u32, emissive: u32) -> Self {
        Self {
            color: rgb(color),
            emissive: rgb(emissive),
            metalness: 1.0,
            roughness: 0.0,
            flat_shading: true,
            vertex_colors: true,
            fog: true,
            env_map_intensity: 1.0,
        }
    }

    /// Material shared by the 400 star spheres: white, highly reflective.
    pub fn star() -> Self {
        Self {
            env_map_intensity: 10.0,
            ..Self::default()
        }
    }

    /// Cloud model material: keeps the colors baked into the asset.
    pub fn cloud() -> Self {
        Self {
            vertex_colors: true,
            ..Self::default()
        }
    }

    /// Black marker sphere sitting at the scene origin.
    pub fn core() -> Self {
        Self {
            color: Vec3::ZERO,
            ..Self::default()
        }
    }
}

/// Converts a packed `0xRRGGBB` value into linear-ish unit RGB.
pub fn rgb(hex: u32) -> Vec3 {
    Vec3::new(
        ((hex >> 16) & 0xff) as f32 / 255.0,
        ((hex >> 8) & 0xff) as f32 / 255.0,
        (hex & 0xff) as f32 / 255.0,
    )
}

/// The fixed ordered palette assigned to crystals by load index.
pub fn crystal_materials() -> [Material; 8] {
    [
        Material::crystal(0xe7e2da, 0x000fe7),
        Material::crystal(0x1e00c4, 0x5700e7),
        Material::crystal(0xe7d29a, 0x0b0b0b),
        Material::crystal(0x77feff, 0x949494),
        Material::crystal(0x1a00e7, 0x000000),
        Material::crystal(0xb4895a, 0x684f31),
        Material::crystal(0xfffffd, 0x8a00e7),
        Material::crystal(0x9dc1e7, 0x001be7),
    ]
}
