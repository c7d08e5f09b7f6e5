use assert_cmd::prelude::*;
use predicates::str::contains;
use std::path::Path;
use std::process::Command;
use tempfile::TempDir;

fn put_f32(buffer: &mut Vec<u8>, values: &[f32]) {
    for value in values {
        buffer.extend_from_slice(&value.to_le_bytes());
    }
}

/// Builds a minimal GLB asset: one triangle node carrying a looping rotation
/// clip named `<name>-action`.
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
    put_f32(&mut bin, &[0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0]);
    for index in [0u16, 1, 2] {
        bin.extend_from_slice(&index.to_le_bytes());
    }
    bin.extend_from_slice(&[0, 0]);
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

fn write_asset(root: &Path, relative: &str, bytes: &[u8]) {
    let path = root.join(relative);
    std::fs::create_dir_all(path.parent().unwrap()).expect("asset dir");
    std::fs::write(path, bytes).expect("write asset");
}

#[test]
fn headless_run_reports_loaded_crystals() {
    let root = TempDir::new().expect("temp asset root");
    write_asset(root.path(), "action/c1.glb", &build_crystal_glb("c1"));
    write_asset(root.path(), "cloud/cloud.glb", &build_crystal_glb("cloud"));

    let mut cmd = Command::cargo_bin("crystal-scene").expect("binary exists");
    cmd.arg(root.path())
        .arg("--headless")
        .arg("--frames")
        .arg("30")
        .arg("--seed")
        .arg("1");
    cmd.assert()
        .success()
        .stdout(contains(" - stars: 400"))
        .stdout(contains(" - crystals loaded: 1 of 8"))
        .stdout(contains(" - cloud: loaded"))
        .stdout(contains(" - c1 playing c1-action at t="));
}

#[test]
fn headless_run_survives_an_empty_asset_root() {
    let root = TempDir::new().expect("temp asset root");

    let mut cmd = Command::cargo_bin("crystal-scene").expect("binary exists");
    cmd.arg(root.path())
        .arg("--headless")
        .arg("--frames")
        .arg("1");
    cmd.assert()
        .success()
        .stdout(contains(" - stars: 400"))
        .stdout(contains(" - crystals loaded: 0 of 8"))
        .stdout(contains(" - cloud: missing"));
}

#[test]
fn missing_asset_root_is_an_error() {
    let mut cmd = Command::cargo_bin("crystal-scene").expect("binary exists");
    cmd.arg("/does/not/exist").arg("--headless");
    cmd.assert().failure().stderr(contains("not a directory"));
}

#[test]
fn unknown_flags_are_rejected() {
    let root = TempDir::new().expect("temp asset root");
    let mut cmd = Command::cargo_bin("crystal-scene").expect("binary exists");
    cmd.arg(root.path()).arg("--bogus");
    cmd.assert()
        .failure()
        .stderr(contains("Unknown argument: --bogus"));
}
