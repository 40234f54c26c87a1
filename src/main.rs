use std::env;
use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use log::info;

use shadowmap_demo::{read_3dobject, run_demo, DemoConfig};

fn main() {
    env_logger::init();
    if let Err(err) = run() {
        eprintln!("Error: {err:?}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let options = CliOptions::parse()?;
    let config = DemoConfig::from_env()?;

    let mut mesh = read_3dobject(&options.mesh_path)
        .with_context(|| format!("failed to read mesh {}", options.mesh_path.display()))?;
    if mesh.normals.is_none() {
        info!("mesh has no normals, computing per-vertex normals");
        mesh.ensure_normals();
    }
    info!(
        "loaded {} ({} vertices, {} triangles)",
        options.mesh_path.display(),
        mesh.verts.len(),
        mesh.faces.len()
    );

    let stats = run_demo(mesh, &config)?;
    info!("rendered {} frames", stats.frames);
    Ok(())
}

struct CliOptions {
    mesh_path: PathBuf,
}

impl CliOptions {
    fn parse() -> Result<Self> {
        let mut args = env::args_os().skip(1);
        let Some(path) = args.next() else {
            return Err(anyhow!("Usage: shadowmap-demo <input-mesh>"));
        };
        if let Some(extra) = args.next() {
            return Err(anyhow!(
                "Unexpected argument: {}. Usage: shadowmap-demo <input-mesh>",
                extra.to_string_lossy()
            ));
        }
        Ok(Self {
            mesh_path: PathBuf::from(path),
        })
    }
}
