use assert_cmd::prelude::*;
use predicates::str::{contains, is_empty};
use std::io::Write;
use std::process::Command;
use tempfile::{Builder, NamedTempFile};

fn mesh_file(suffix: &str, contents: &str) -> NamedTempFile {
    let mut tmp = Builder::new().suffix(suffix).tempfile().expect("temp mesh");
    tmp.write_all(contents.as_bytes()).expect("write mesh");
    tmp
}

fn demo() -> Command {
    let mut cmd = Command::cargo_bin("shadowmap-demo").expect("binary exists");
    cmd.env_remove("SHADOWMAP_DEMO_CONFIG");
    cmd
}

#[test]
fn missing_argument_prints_usage() {
    demo()
        .assert()
        .failure()
        .stderr(contains("Usage: shadowmap-demo <input-mesh>"));
}

#[test]
fn extra_arguments_are_rejected() {
    demo()
        .arg("bunny.ply")
        .arg("--fast")
        .assert()
        .failure()
        .stderr(contains("Unexpected argument: --fast"));
}

#[test]
fn unreadable_mesh_is_reported() {
    demo()
        .arg("does/not/exist.obj")
        .assert()
        .failure()
        .stderr(contains("failed to read mesh does/not/exist.obj"))
        .stderr(contains("unable to read"));
}

#[test]
fn unsupported_extension_is_reported() {
    let mesh = mesh_file(".stl", "solid cube\nendsolid cube\n");
    demo()
        .arg(mesh.path())
        .assert()
        .failure()
        .stderr(contains("unsupported mesh format: .stl"));
}

#[test]
fn malformed_off_is_reported_with_line() {
    let mesh = mesh_file(".off", "OFF\n3 1 0\n0 0 0\n1 0 0\n");
    demo()
        .arg(mesh.path())
        .assert()
        .failure()
        .stdout(is_empty())
        .stderr(contains("failed to read mesh"))
        .stderr(contains("line"));
}

#[test]
fn out_of_range_obj_face_is_reported() {
    let mesh = mesh_file(".obj", "v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 9\n");
    demo()
        .arg(mesh.path())
        .assert()
        .failure()
        .stderr(contains("face references vertex 9 but the mesh has 3 vertices"));
}

#[test]
fn invalid_config_file_is_reported() {
    let mut config = NamedTempFile::new().expect("temp config");
    config
        .write_all(br#"{ "shadow_map_size": 0 }"#)
        .expect("write config");
    let mesh = mesh_file(".obj", "v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n");
    demo()
        .env("SHADOWMAP_DEMO_CONFIG", config.path())
        .arg(mesh.path())
        .assert()
        .failure()
        .stderr(contains("invalid config"))
        .stderr(contains("shadow_map_size must be positive"));
}
