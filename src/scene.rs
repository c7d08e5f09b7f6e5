use glam::{Mat4, Quat, Vec3};
use serde::{Deserialize, Serialize};

use crate::animation::AnimationClip;
use crate::material::{self, Material};
use crate::mesh::MeshData;

/// Number of crystal slots in the scene.
pub const CRYSTAL_SLOTS: usize = 8;

/// One node of a loaded model fragment.
///
/// Nodes are stored parents-first, so a node's parent index always refers to
/// an earlier entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FragmentNode {
    pub name: String,
    pub parent: Option<usize>,
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mesh: Option<MeshData>,
}

impl FragmentNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent: None,
            translation: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
            mesh: None,
        }
    }

    pub fn local_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }
}

/// A loaded model: flattened node hierarchy plus its embedded animation clips.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SceneFragment {
    pub name: String,
    pub nodes: Vec<FragmentNode>,
    pub clips: Vec<AnimationClip>,
}

impl SceneFragment {
    /// Composes every node's local transform with its parent chain.
    pub fn global_transforms(&self) -> Vec<Mat4> {
        let mut globals = Vec::with_capacity(self.nodes.len());
        for node in &self.nodes {
            let local = node.local_matrix();
            let global = match node.parent {
                Some(parent) => globals[parent] * local,
                None => local,
            };
            globals.push(global);
        }
        globals
    }

    pub fn mesh_count(&self) -> usize {
        self.nodes.iter().filter(|node| node.mesh.is_some()).count()
    }
}

/// A crystal fragment bound to its palette material.
#[derive(Debug, Clone, PartialEq)]
pub struct CrystalInstance {
    pub fragment: SceneFragment,
    pub material: Material,
}

/// One star of the procedural star field.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Star {
    pub position: Vec3,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointLight {
    pub position: Vec3,
    pub color: Vec3,
    pub intensity: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AmbientLight {
    pub color: Vec3,
    pub intensity: f32,
}

/// Exponential-squared distance fog.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Fog {
    pub color: Vec3,
    pub density: f32,
}

/// The composed scene: star field, crystal slots, cloud, lights and fog.
///
/// Crystal slots start empty and are filled as loads complete; a slot whose
/// load failed simply stays `None` for the lifetime of the scene.
#[derive(Debug, Clone, PartialEq)]
pub struct Scene {
    pub stars: Vec<Star>,
    pub crystals: Vec<Option<CrystalInstance>>,
    pub cloud: Option<SceneFragment>,
    pub core_position: Vec3,
    pub point_light: PointLight,
    pub ambient_light: AmbientLight,
    pub fog: Fog,
}

impl Scene {
    pub fn new() -> Self {
        Self {
            stars: Vec::new(),
            crystals: vec![None; CRYSTAL_SLOTS],
            cloud: None,
            core_position: Vec3::ZERO,
            point_light: PointLight {
                position: Vec3::new(5.0, 5.0, 5.0),
                color: Vec3::ONE,
                intensity: 1.0,
            },
            ambient_light: AmbientLight {
                color: Vec3::ONE,
                intensity: 1.0,
            },
            fog: Fog {
                color: Vec3::ONE,
                density: 0.05,
            },
        }
    }

    /// Inserts a loaded crystal fragment at its slot, binding the palette
    /// material for that index.
    pub fn insert_crystal(&mut self, slot: usize, fragment: SceneFragment) {
        debug_assert!(slot < CRYSTAL_SLOTS);
        let material = material::crystal_materials()[slot];
        self.crystals[slot] = Some(CrystalInstance { fragment, material });
    }

    pub fn crystal(&self, slot: usize) -> Option<&CrystalInstance> {
        self.crystals.get(slot).and_then(Option::as_ref)
    }

    pub fn set_cloud(&mut self, fragment: SceneFragment) {
        self.cloud = Some(fragment);
    }

    pub fn loaded_crystal_count(&self) -> usize {
        self.crystals.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn star_count(&self) -> usize {
        self.stars.len()
    }
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}
