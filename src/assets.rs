use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver};
use std::thread::{self, JoinHandle};

use glam::{Quat, Vec3};
use log::warn;
use thiserror::Error;

use crate::animation::{AnimationClip, Channel, Keyframes};
use crate::mesh::{self, MeshData};
use crate::scene::{FragmentNode, SceneFragment};

/// Crystal asset names, in slot order. Each file is expected to embed an
/// animation clip named `<name>-action`.
pub const CRYSTAL_NAMES: [&str; 8] = ["c1", "c2", "c3", "c4", "c5", "c6", "c7", "c8"];

/// Cube map face names, in the renderer's layer order: +X, -X, +Y, -Y, +Z, -Z.
pub const CUBE_MAP_FACES: [&str; 6] = ["px", "nx", "py", "ny", "pz", "nz"];

/// Total number of load events the loader emits: eight crystals plus the cloud.
pub const EXPECTED_EVENTS: usize = CRYSTAL_NAMES.len() + 1;

pub fn crystal_path(root: &Path, name: &str) -> PathBuf {
    root.join("action").join(format!("{name}.glb"))
}

pub fn cloud_path(root: &Path) -> PathBuf {
    root.join("cloud").join("cloud.glb")
}

pub fn background_path(root: &Path) -> PathBuf {
    root.join("images").join("bg.png")
}

pub fn cube_map_paths(root: &Path) -> [PathBuf; 6] {
    CUBE_MAP_FACES.map(|face| root.join("images").join(format!("{face}.png")))
}

/// Why a single asset failed to load. Load failures are reported and the
/// asset stays absent; they never affect other assets.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: gltf::Error,
    },
    #[error("failed to decode {path}: {source}")]
    Image {
        path: String,
        #[source]
        source: image::ImageError,
    },
    #[error("{path} contains no scene nodes")]
    EmptyScene { path: String },
    #[error("{path}: {detail}")]
    Unsupported { path: String, detail: String },
}

/// Completion notice for one asynchronous load.
#[derive(Debug)]
pub enum LoadEvent {
    Crystal {
        slot: usize,
        name: String,
        result: Result<SceneFragment, LoadError>,
    },
    Cloud(Result<SceneFragment, LoadError>),
}

/// Issues every asset load at once, each on its own thread.
///
/// Completion order is unconstrained; the frame loop drains finished events
/// with `poll` and never waits on outstanding loads.
pub struct AssetLoader {
    receiver: Receiver<LoadEvent>,
    threads: Vec<JoinHandle<()>>,
}

impl AssetLoader {
    pub fn spawn(root: &Path) -> Self {
        let (sender, receiver) = mpsc::channel();
        let mut threads = Vec::new();
        for (slot, name) in CRYSTAL_NAMES.iter().enumerate() {
            let sender = sender.clone();
            let path = crystal_path(root, name);
            let name = name.to_string();
            threads.push(thread::spawn(move || {
                let result = load_fragment(&path, &name);
                let _ = sender.send(LoadEvent::Crystal { slot, name, result });
            }));
        }
        let path = cloud_path(root);
        threads.push(thread::spawn(move || {
            let result = load_fragment(&path, "cloud");
            let _ = sender.send(LoadEvent::Cloud(result));
        }));
        Self { receiver, threads }
    }

    /// Drains the load events that have completed so far, without blocking.
    pub fn poll(&self) -> Vec<LoadEvent> {
        self.receiver.try_iter().collect()
    }

    /// Blocks until every load thread has finished. Remaining events stay
    /// queued for the next `poll`.
    pub fn wait(&mut self) {
        for handle in std::mem::take(&mut self.threads) {
            if handle.join().is_err() {
                log::error!("asset loader thread panicked");
            }
        }
    }

    pub fn is_finished(&self) -> bool {
        self.threads.iter().all(JoinHandle::is_finished)
    }
}

impl Drop for AssetLoader {
    fn drop(&mut self) {
        self.wait();
    }
}

/// Loads a GLB file into a flattened fragment with its animation clips.
pub fn load_fragment(path: &Path, name: &str) -> Result<SceneFragment, LoadError> {
    let display = path.display().to_string();
    let bytes = std::fs::read(path).map_err(|source| LoadError::Io {
        path: display.clone(),
        source,
    })?;
    let gltf = gltf::Gltf::from_slice(&bytes).map_err(|source| LoadError::Parse {
        path: display.clone(),
        source,
    })?;

    let buffers = read_buffers(&gltf, path, &display)?;

    let scene = gltf
        .default_scene()
        .or_else(|| gltf.scenes().next())
        .ok_or_else(|| LoadError::EmptyScene {
            path: display.clone(),
        })?;

    let mut nodes = Vec::new();
    let mut node_map = HashMap::new();
    for node in scene.nodes() {
        flatten_node(&node, None, &buffers, &mut nodes, &mut node_map);
    }
    if nodes.is_empty() {
        return Err(LoadError::EmptyScene { path: display });
    }

    let clips = read_clips(&gltf, &buffers, &node_map);

    Ok(SceneFragment {
        name: name.to_string(),
        nodes,
        clips,
    })
}

fn read_buffers(
    gltf: &gltf::Gltf,
    path: &Path,
    display: &str,
) -> Result<Vec<Vec<u8>>, LoadError> {
    let mut buffers = Vec::new();
    for buffer in gltf.buffers() {
        match buffer.source() {
            gltf::buffer::Source::Bin => {
                let blob = gltf.blob.as_deref().ok_or_else(|| LoadError::Unsupported {
                    path: display.to_string(),
                    detail: "buffer references a missing binary chunk".into(),
                })?;
                buffers.push(blob.to_vec());
            }
            gltf::buffer::Source::Uri(uri) => {
                if uri.starts_with("data:") {
                    return Err(LoadError::Unsupported {
                        path: display.to_string(),
                        detail: "embedded data URIs are not supported".into(),
                    });
                }
                let sibling = path.parent().unwrap_or_else(|| Path::new(".")).join(uri);
                let bytes = std::fs::read(&sibling).map_err(|source| LoadError::Io {
                    path: sibling.display().to_string(),
                    source,
                })?;
                buffers.push(bytes);
            }
        }
    }
    Ok(buffers)
}

fn flatten_node(
    node: &gltf::Node<'_>,
    parent: Option<usize>,
    buffers: &[Vec<u8>],
    nodes: &mut Vec<FragmentNode>,
    node_map: &mut HashMap<usize, usize>,
) {
    let (translation, rotation, scale) = node.transform().decomposed();
    let index = nodes.len();
    node_map.insert(node.index(), index);
    nodes.push(FragmentNode {
        name: node.name().unwrap_or_default().to_string(),
        parent,
        translation: Vec3::from(translation),
        rotation: Quat::from_array(rotation),
        scale: Vec3::from(scale),
        mesh: node.mesh().and_then(|m| read_mesh(&m, buffers)),
    });
    for child in node.children() {
        flatten_node(&child, Some(index), buffers, nodes, node_map);
    }
}

fn read_mesh(gltf_mesh: &gltf::Mesh<'_>, buffers: &[Vec<u8>]) -> Option<MeshData> {
    let mut data = MeshData::default();
    for primitive in gltf_mesh.primitives() {
        if primitive.mode() != gltf::mesh::Mode::Triangles {
            warn!(
                "skipping non-triangle primitive in mesh {:?}",
                gltf_mesh.name().unwrap_or_default()
            );
            continue;
        }
        let reader = primitive.reader(|buffer| buffers.get(buffer.index()).map(Vec::as_slice));
        let Some(positions) = reader.read_positions() else {
            continue;
        };
        let positions: Vec<[f32; 3]> = positions.collect();
        let normals: Option<Vec<[f32; 3]>> = reader.read_normals().map(Iterator::collect);
        let colors: Option<Vec<[f32; 4]>> = reader
            .read_colors(0)
            .map(|colors| colors.into_rgba_f32().collect());
        // Primitives without a COLOR_0 attribute fall back to the base color
        // factor of their material, so embedded tints survive the import.
        let base_color = primitive
            .material()
            .pbr_metallic_roughness()
            .base_color_factor();
        let fallback_color = Vec3::new(base_color[0], base_color[1], base_color[2]);

        let base = data.vertex_count() as u32;
        for (i, position) in positions.iter().enumerate() {
            let normal = normals
                .as_ref()
                .and_then(|n| n.get(i))
                .copied()
                .unwrap_or([0.0; 3]);
            let color = colors
                .as_ref()
                .and_then(|c| c.get(i))
                .map(|c| Vec3::new(c[0], c[1], c[2]))
                .unwrap_or(fallback_color);
            data.push_vertex(Vec3::from(*position), Vec3::from(normal), color);
        }
        match reader.read_indices() {
            Some(indices) => data.indices.extend(indices.into_u32().map(|i| i + base)),
            None => data
                .indices
                .extend((0..positions.len() as u32).map(|i| i + base)),
        }
    }

    if data.vertex_count() == 0 {
        return None;
    }
    if mesh::needs_normals(&data) {
        mesh::compute_normals(&mut data);
    }
    Some(data)
}

fn read_clips(
    gltf: &gltf::Gltf,
    buffers: &[Vec<u8>],
    node_map: &HashMap<usize, usize>,
) -> Vec<AnimationClip> {
    let mut clips = Vec::new();
    for animation in gltf.animations() {
        let mut channels = Vec::new();
        for channel in animation.channels() {
            let Some(&target) = node_map.get(&channel.target().node().index()) else {
                continue;
            };
            let reader = channel.reader(|buffer| buffers.get(buffer.index()).map(Vec::as_slice));
            let timestamps: Vec<f32> = match reader.read_inputs() {
                Some(gltf::accessor::Iter::Standard(times)) => times.collect(),
                _ => continue,
            };
            let keyframes = match reader.read_outputs() {
                Some(gltf::animation::util::ReadOutputs::Translations(values)) => {
                    Keyframes::Translation(values.map(Vec3::from).collect())
                }
                Some(gltf::animation::util::ReadOutputs::Rotations(values)) => {
                    Keyframes::Rotation(values.into_f32().map(Quat::from_array).collect())
                }
                Some(gltf::animation::util::ReadOutputs::Scales(values)) => {
                    Keyframes::Scale(values.map(Vec3::from).collect())
                }
                _ => continue,
            };
            channels.push(Channel {
                target,
                timestamps,
                keyframes,
            });
        }
        clips.push(AnimationClip {
            name: animation.name().unwrap_or("unnamed").to_string(),
            channels,
        });
    }
    clips
}

/// Decodes a PNG texture asset into RGBA pixels.
pub fn load_rgba_image(path: &Path) -> Result<image::RgbaImage, LoadError> {
    let decoded = image::open(path).map_err(|source| LoadError::Image {
        path: path.display().to_string(),
        source,
    })?;
    Ok(decoded.to_rgba8())
}

#[cfg(test)]
mod tests {
    use super::*;
    use once_cell::sync::Lazy;
    use std::io::Write;

    static C1_GLB: Lazy<Vec<u8>> = Lazy::new(|| build_crystal_glb("c1"));

    fn put_f32(buffer: &mut Vec<u8>, values: &[f32]) {
        for value in values {
            buffer.extend_from_slice(&value.to_le_bytes());
        }
    }

    /// Hand-builds a minimal GLB: one triangle node named after the crystal,
    /// with a looping rotation clip named `<name>-action`.
    fn build_crystal_glb(name: &str) -> Vec<u8> {
        let json = format!(
            concat!(
                "{{\"asset\":{{\"version\":\"2.0\"}},",
                "\"scene\":0,\"scenes\":[{{\"nodes\":[0]}}],",
                "\"nodes\":[{{\"name\":\"{name}\",\"mesh\":0}}],",
                "\"meshes\":[{{\"primitives\":[{{\"attributes\":{{\"POSITION\":0}},\"indices\":1}}]}}],",
                "\"animations\":[{{\"name\":\"{name}-action\",",
                "\"samplers\":[{{\"input\":2,\"output\":3,\"interpolation\":\"LINEAR\"}}],",
                "\"channels\":[{{\"sampler\":0,\"target\":{{\"node\":0,\"path\":\"rotation\"}}}}]}}],",
                "\"buffers\":[{{\"byteLength\":84}}],",
                "\"bufferViews\":[",
                "{{\"buffer\":0,\"byteOffset\":0,\"byteLength\":36}},",
                "{{\"buffer\":0,\"byteOffset\":36,\"byteLength\":6}},",
                "{{\"buffer\":0,\"byteOffset\":44,\"byteLength\":8}},",
                "{{\"buffer\":0,\"byteOffset\":52,\"byteLength\":32}}],",
                "\"accessors\":[",
                "{{\"bufferView\":0,\"componentType\":5126,\"count\":3,\"type\":\"VEC3\",",
                "\"min\":[0,0,0],\"max\":[1,1,0]}},",
                "{{\"bufferView\":1,\"componentType\":5123,\"count\":3,\"type\":\"SCALAR\"}},",
                "{{\"bufferView\":2,\"componentType\":5126,\"count\":2,\"type\":\"SCALAR\",",
                "\"min\":[0],\"max\":[1]}},",
                "{{\"bufferView\":3,\"componentType\":5126,\"count\":2,\"type\":\"VEC4\"}}]}}"
            ),
            name = name
        );

        let mut bin = Vec::new();
        put_f32(
            &mut bin,
            &[0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0],
        );
        for index in [0u16, 1, 2] {
            bin.extend_from_slice(&index.to_le_bytes());
        }
        bin.extend_from_slice(&[0, 0]); // 4-byte alignment
        put_f32(&mut bin, &[0.0, 1.0]);
        let half = std::f32::consts::FRAC_1_SQRT_2;
        put_f32(&mut bin, &[0.0, 0.0, 0.0, 1.0, 0.0, half, 0.0, half]);
        assert_eq!(bin.len(), 84);

        let mut json_bytes = json.into_bytes();
        while json_bytes.len() % 4 != 0 {
            json_bytes.push(b' ');
        }

        let total = 12 + 8 + json_bytes.len() + 8 + bin.len();
        let mut glb = Vec::new();
        glb.extend_from_slice(b"glTF");
        glb.extend_from_slice(&2u32.to_le_bytes());
        glb.extend_from_slice(&(total as u32).to_le_bytes());
        glb.extend_from_slice(&(json_bytes.len() as u32).to_le_bytes());
        glb.extend_from_slice(b"JSON");
        glb.extend_from_slice(&json_bytes);
        glb.extend_from_slice(&(bin.len() as u32).to_le_bytes());
        glb.extend_from_slice(b"BIN\0");
        glb.extend_from_slice(&bin);
        glb
    }

    /// A single tinted triangle: a base color factor on the material, no
    /// COLOR_0 attribute and no animation.
    fn build_tinted_glb() -> Vec<u8> {
        let json = concat!(
            "{\"asset\":{\"version\":\"2.0\"},",
            "\"scene\":0,\"scenes\":[{\"nodes\":[0]}],",
            "\"nodes\":[{\"name\":\"cloud\",\"mesh\":0}],",
            "\"meshes\":[{\"primitives\":[{\"attributes\":{\"POSITION\":0},",
            "\"indices\":1,\"material\":0}]}],",
            "\"materials\":[{\"pbrMetallicRoughness\":",
            "{\"baseColorFactor\":[0.2,0.4,0.6,1.0]}}],",
            "\"buffers\":[{\"byteLength\":44}],",
            "\"bufferViews\":[",
            "{\"buffer\":0,\"byteOffset\":0,\"byteLength\":36},",
            "{\"buffer\":0,\"byteOffset\":36,\"byteLength\":6}],",
            "\"accessors\":[",
            "{\"bufferView\":0,\"componentType\":5126,\"count\":3,\"type\":\"VEC3\",",
            "\"min\":[0,0,0],\"max\":[1,1,0]},",
            "{\"bufferView\":1,\"componentType\":5123,\"count\":3,\"type\":\"SCALAR\"}]}"
        );

        let mut bin = Vec::new();
        put_f32(
            &mut bin,
            &[0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0],
        );
        for index in [0u16, 1, 2] {
            bin.extend_from_slice(&index.to_le_bytes());
        }
        bin.extend_from_slice(&[0, 0]); // 4-byte alignment
        assert_eq!(bin.len(), 44);

        let mut json_bytes = json.as_bytes().to_vec();
        while json_bytes.len() % 4 != 0 {
            json_bytes.push(b' ');
        }

        let total = 12 + 8 + json_bytes.len() + 8 + bin.len();
        let mut glb = Vec::new();
        glb.extend_from_slice(b"glTF");
        glb.extend_from_slice(&2u32.to_le_bytes());
        glb.extend_from_slice(&(total as u32).to_le_bytes());
        glb.extend_from_slice(&(json_bytes.len() as u32).to_le_bytes());
        glb.extend_from_slice(b"JSON");
        glb.extend_from_slice(&json_bytes);
        glb.extend_from_slice(&(bin.len() as u32).to_le_bytes());
        glb.extend_from_slice(b"BIN\0");
        glb.extend_from_slice(&bin);
        glb
    }

    fn write_asset(dir: &Path, relative: &Path, bytes: &[u8]) {
        let path = dir.join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        let mut file = std::fs::File::create(path).unwrap();
        file.write_all(bytes).unwrap();
    }

    #[test]
    fn parses_a_hand_built_crystal() {
        let dir = tempfile::tempdir().unwrap();
        let path = crystal_path(dir.path(), "c1");
        write_asset(dir.path(), Path::new("action/c1.glb"), &C1_GLB);

        let fragment = load_fragment(&path, "c1").unwrap();
        assert_eq!(fragment.name, "c1");
        assert_eq!(fragment.nodes.len(), 1);
        assert_eq!(fragment.mesh_count(), 1);
        let mesh = fragment.nodes[0].mesh.as_ref().unwrap();
        assert_eq!(mesh.vertex_count(), 3);
        assert_eq!(mesh.indices, vec![0, 1, 2]);
        // Normals were absent in the file and must be reconstructed.
        assert!(!mesh::needs_normals(mesh));

        let clip = AnimationClip::find_by_name(&fragment.clips, "c1-action").unwrap();
        assert_eq!(clip.channels.len(), 1);
        assert!((clip.duration() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn base_color_factor_tints_meshes_without_vertex_colors() {
        let dir = tempfile::tempdir().unwrap();
        write_asset(dir.path(), Path::new("cloud/cloud.glb"), &build_tinted_glb());

        let fragment = load_fragment(&cloud_path(dir.path()), "cloud").unwrap();
        let mesh = fragment.nodes[0].mesh.as_ref().unwrap();
        let tint = Vec3::new(0.2, 0.4, 0.6);
        for index in 0..mesh.vertex_count() {
            assert!((mesh.color(index) - tint).length() < 1e-6);
        }
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_fragment(&crystal_path(dir.path(), "c3"), "c3").unwrap_err();
        assert!(matches!(err, LoadError::Io { .. }));
    }

    #[test]
    fn garbage_bytes_are_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        write_asset(dir.path(), Path::new("action/c1.glb"), b"not a glb");
        let err = load_fragment(&crystal_path(dir.path(), "c1"), "c1").unwrap_err();
        assert!(matches!(err, LoadError::Parse { .. }));
    }

    #[test]
    fn loader_reports_every_asset_independently() {
        let dir = tempfile::tempdir().unwrap();
        // Only c1 exists; the seven other crystals and the cloud must fail
        // without affecting it.
        write_asset(dir.path(), Path::new("action/c1.glb"), &C1_GLB);

        let mut loader = AssetLoader::spawn(dir.path());
        loader.wait();
        let events = loader.poll();
        assert_eq!(events.len(), EXPECTED_EVENTS);

        let mut ok_slots = Vec::new();
        let mut failures = 0;
        for event in events {
            match event {
                LoadEvent::Crystal { slot, result: Ok(_), .. } => ok_slots.push(slot),
                LoadEvent::Crystal { result: Err(_), .. } => failures += 1,
                LoadEvent::Cloud(result) => assert!(result.is_err()),
            }
        }
        assert_eq!(ok_slots, vec![0]);
        assert_eq!(failures, 7);
    }

    #[test]
    fn asset_paths_follow_the_layout() {
        let root = Path::new("/assets");
        assert_eq!(
            crystal_path(root, "c5"),
            Path::new("/assets/action/c5.glb")
        );
        assert_eq!(cloud_path(root), Path::new("/assets/cloud/cloud.glb"));
        assert_eq!(background_path(root), Path::new("/assets/images/bg.png"));
        let faces = cube_map_paths(root);
        assert_eq!(faces[0], Path::new("/assets/images/px.png"));
        assert_eq!(faces[5], Path::new("/assets/images/nz.png"));
    }
}
