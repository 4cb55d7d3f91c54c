use lumen::error::{Error, Result};
use lumen::renderer;
use lumen::resources::Resources;
use lumen::scene;

use clap::{App, Arg};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::thread;
use std::time::Instant;

fn main() {
    env_logger::init();

    let matches = App::new("lumen")
        .about("Monte Carlo ray tracer")
        .arg(
            Arg::with_name("threads")
                .short("t")
                .long("threads")
                .value_name("N")
                .help("Number of render threads (defaults to the available cores)")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("output")
                .short("o")
                .long("output")
                .value_name("BASENAME")
                .help("Basename for the output images (defaults to the scene basename)")
                .takes_value(true),
        )
        .arg(
            Arg::with_name("SCENE")
                .help("The scene description to render")
                .required(true)
                .index(1),
        )
        .get_matches();

    if let Err(e) = run(
        Path::new(matches.value_of("SCENE").unwrap_or_default()),
        matches.value_of("threads"),
        matches.value_of("output"),
    ) {
        log::error!("{}", e);
        eprintln!("Fatal error: {}", e);
        process::exit(-1);
    }
}

fn run(scene_path: &Path, threads: Option<&str>, output: Option<&str>) -> Result<()> {
    let num_threads = match threads {
        Some(value) => value
            .parse::<u32>()
            .ok()
            .filter(|n| *n > 0)
            .ok_or_else(|| {
                Error::Config(String::from(
                    "--threads expects a positive integer.",
                ))
            })?,
        None => thread::available_parallelism()
            .map(|n| n.get() as u32)
            .unwrap_or(1),
    };

    let program_start = Instant::now();

    let mut resources = Resources::new();
    let scene = Arc::new(scene::load_from_file(scene_path, &mut resources)?);

    let stop = Arc::new(AtomicBool::new(false));
    let bitmap = renderer::render(scene, num_threads, stop)?;

    // EXR keeps the linear radiance; the PNG goes through the sRGB
    // tonemap for display.
    let base: PathBuf = match output {
        Some(base) => PathBuf::from(base),
        None => scene_path.with_extension(""),
    };
    let exr_path = base.with_extension("exr");
    let png_path = base.with_extension("png");
    bitmap.save_exr(&exr_path)?;
    bitmap.save_png(&png_path, true)?;

    log::info!(
        "wrote {} and {} ({:.2} s total)",
        exr_path.display(),
        png_path.display(),
        program_start.elapsed().as_secs_f64()
    );
    Ok(())
}
