//! Core modules for the crystal scene viewer.
//!
//! The crate exposes the scene graph, asset pipeline, animation playback
//! and camera logic as plain building blocks.  Rendering and windowing sit
//! in their own modules so the rest of the crate stays testable headless.

pub mod animation;
pub mod app;
pub mod assets;
pub mod camera;
pub mod material;
pub mod mesh;
pub mod orbit;
pub mod render;
pub mod scene;
pub mod stars;

pub use animation::{AnimationClip, AnimationMixer, Channel, Keyframes};
pub use app::{AppContext, FrameClock};
pub use assets::{AssetLoader, LoadError, LoadEvent};
pub use camera::{CameraParams, PerspectiveCamera};
pub use material::Material;
pub use mesh::MeshData;
pub use orbit::OrbitControls;
pub use render::Renderer;
pub use scene::{CrystalInstance, FragmentNode, Scene, SceneFragment, Star};
pub use stars::{generate_stars, STAR_COUNT};
