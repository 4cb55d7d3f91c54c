use crate::bitmap::Bitmap;
use crate::block::{BlockGenerator, ImageBlock, BLOCK_SIZE};
use crate::error::{Error, Result};
use crate::progress::Progress;
use crate::sampler::Sampler;
use crate::scene::Scene;
use crate::vector::Point2;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Instant;

/// Renders the scene with a pool of workers pulling tiles from a
/// shared block generator and merging results into one image block.
///
/// Cancellation is cooperative: raising `stop` makes workers finish
/// their current tile and exit, and the render reports `Cancelled`.
pub fn render(scene: Arc<Scene>, num_threads: u32, stop: Arc<AtomicBool>) -> Result<Bitmap> {
    if num_threads == 0 {
        return Err(Error::Config(String::from(
            "Need at least one render thread.",
        )));
    }

    scene.integrator().preprocess(&scene);

    let output_size = scene.camera().output_size();
    let generator = Arc::new(BlockGenerator::new(output_size, BLOCK_SIZE));
    let result = Arc::new(Mutex::new(ImageBlock::new(
        output_size,
        scene.camera().rfilter(),
    )));
    let progress = Arc::new(Mutex::new(Progress::new(
        generator.block_count() as u64,
        20,
    )));

    log::info!(
        "rendering {}x{} with {} thread(s), {} blocks",
        output_size.0,
        output_size.1,
        num_threads,
        generator.block_count()
    );
    let render_start = Instant::now();

    // Spawn one worker fewer than requested; the calling thread works
    // too instead of idling at the join.
    let mut workers = Vec::new();
    for _ in 0..num_threads - 1 {
        let scene = Arc::clone(&scene);
        let generator = Arc::clone(&generator);
        let result = Arc::clone(&result);
        let progress = Arc::clone(&progress);
        let stop = Arc::clone(&stop);
        workers.push(thread::spawn(move || {
            render_worker(&scene, &generator, &result, &progress, &stop)
        }));
    }
    render_worker(&scene, &generator, &result, &progress, &stop);

    for worker in workers {
        if worker.join().is_err() {
            log::error!("a render worker panicked; its remaining blocks were re-queued to others");
        }
    }
    progress
        .lock()
        .expect("Failed to acquire progress lock.")
        .done();

    if stop.load(Ordering::Relaxed) && generator.blocks_left() > 0 {
        return Err(Error::Cancelled);
    }

    log::info!(
        "rendering finished in {:.2} s",
        render_start.elapsed().as_secs_f64()
    );

    let result = result
        .lock()
        .expect("Failed to acquire result lock for readback.");
    Ok(result.to_bitmap())
}

fn render_worker(
    scene: &Scene,
    generator: &BlockGenerator,
    result: &Mutex<ImageBlock>,
    progress: &Mutex<Progress>,
    stop: &AtomicBool,
) {
    let mut block = ImageBlock::new((BLOCK_SIZE, BLOCK_SIZE), scene.camera().rfilter());
    let mut sampler = scene.sampler().clone_sampler();

    while !stop.load(Ordering::Relaxed) {
        if !generator.next(&mut block) {
            break;
        }
        // Seed the per-thread sample stream from the block offset so
        // the image is deterministic however tiles get scheduled.
        sampler.prepare(&block);
        render_block(scene, sampler.as_mut(), &mut block);

        result
            .lock()
            .expect("Failed to acquire result lock for merging.")
            .put_block(&block);
        progress
            .lock()
            .expect("Failed to acquire progress lock.")
            .update(1);
    }
}

fn render_block(scene: &Scene, sampler: &mut dyn Sampler, block: &mut ImageBlock) {
    block.clear();
    let camera = scene.camera();
    let integrator = scene.integrator();
    let (offset_x, offset_y) = block.offset();
    let (width, height) = block.size();

    for y in 0..height {
        for x in 0..width {
            sampler.generate();
            if sampler.sample_count() == 1 {
                // A single sample per pixel goes through the center.
                let position = Point2::new(
                    (x + offset_x) as f32 + 0.5_f32,
                    (y + offset_y) as f32 + 0.5_f32,
                );
                let ray = camera.sample_ray(position);
                block.put(position, integrator.li(scene, sampler, &ray));
            } else {
                for _ in 0..sampler.sample_count() {
                    let position = Point2::new((x + offset_x) as f32, (y + offset_y) as f32)
                        + sampler.next_2d();
                    let ray = camera.sample_ray(position);
                    block.put(position, integrator.li(scene, sampler, &ray));
                    sampler.advance();
                }
            }
        }
    }
}
