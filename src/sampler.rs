use crate::block::ImageBlock;
use crate::utils::ONE_MINUS_EPSILON;
use crate::vector::Point2;

use rand::{Rng, RngCore};
use rand_pcg::Pcg32;
use serde::Deserialize;

// Default stream constants of the PCG32 generator.
const PCG32_DEFAULT_STATE: u64 = 0x853c_49e6_748f_ea9b;
const PCG32_DEFAULT_STREAM: u64 = 0xda3e_39cb_94b9_5bdb;

fn default_rng() -> Pcg32 {
    Pcg32::new(PCG32_DEFAULT_STATE, PCG32_DEFAULT_STREAM)
}

/// Per-pixel stream of (pseudo) random sample dimensions.
///
/// The renderer calls `prepare` once per block (seeding the stream
/// from the block offset so runs are repeatable), `generate` at each
/// new pixel, and `advance` between the samples of one pixel.
#[typetag::deserialize]
pub trait Sampler: Send + Sync {
    /// Independent copy for a render worker; the clone's sequence is
    /// reseeded per block and shares no state with the original.
    fn clone_sampler(&self) -> Box<dyn Sampler>;

    fn prepare(&mut self, block: &ImageBlock);

    fn generate(&mut self);

    fn advance(&mut self);

    fn next_1d(&mut self) -> f32;

    fn next_2d(&mut self) -> Point2;

    fn sample_count(&self) -> u32;
}

/// Uniform white-noise sampler over a PCG32 stream.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Independent {
    #[serde(default = "Independent::default_sample_count")]
    sample_count: u32,
    #[serde(skip, default = "default_rng")]
    rng: Pcg32,
}

impl Independent {
    pub fn new(sample_count: u32) -> Independent {
        Independent {
            sample_count,
            rng: default_rng(),
        }
    }

    fn default_sample_count() -> u32 {
        1
    }
}

#[typetag::deserialize(name = "independent")]
impl Sampler for Independent {
    fn clone_sampler(&self) -> Box<dyn Sampler> {
        Box::new(Independent {
            sample_count: self.sample_count,
            rng: self.rng.clone(),
        })
    }

    fn prepare(&mut self, block: &ImageBlock) {
        let (x, y) = block.offset();
        self.rng = Pcg32::new(x as u64, y as u64);
    }

    fn generate(&mut self) {}

    fn advance(&mut self) {}

    fn next_1d(&mut self) -> f32 {
        self.rng.gen::<f32>().min(ONE_MINUS_EPSILON)
    }

    fn next_2d(&mut self) -> Point2 {
        Point2::new(
            self.rng.gen::<f32>().min(ONE_MINUS_EPSILON),
            self.rng.gen::<f32>().min(ONE_MINUS_EPSILON),
        )
    }

    fn sample_count(&self) -> u32 {
        self.sample_count
    }
}

/// Jittered stratified sampling over the first `max_dimension` 1D and
/// 2D dimensions of every pixel; later dimensions fall through to the
/// underlying PCG32 stream.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stratified {
    #[serde(default = "Stratified::default_pixel_samples")]
    x_pixel_samples: u32,
    #[serde(default = "Stratified::default_pixel_samples")]
    y_pixel_samples: u32,
    #[serde(default = "Stratified::default_jitter")]
    jitter: bool,
    #[serde(default = "Stratified::default_max_dimension")]
    max_dimension: usize,

    #[serde(skip, default = "default_rng")]
    rng: Pcg32,
    #[serde(skip)]
    samples_1d: Vec<Vec<f32>>,
    #[serde(skip)]
    samples_2d: Vec<Vec<Point2>>,
    #[serde(skip)]
    sample_index: usize,
    #[serde(skip)]
    dimension_1d: usize,
    #[serde(skip)]
    dimension_2d: usize,
}

impl Stratified {
    pub fn new(
        x_pixel_samples: u32,
        y_pixel_samples: u32,
        jitter: bool,
        max_dimension: usize,
    ) -> Stratified {
        Stratified {
            x_pixel_samples,
            y_pixel_samples,
            jitter,
            max_dimension,
            rng: default_rng(),
            samples_1d: Vec::new(),
            samples_2d: Vec::new(),
            sample_index: 0,
            dimension_1d: 0,
            dimension_2d: 0,
        }
    }

    fn default_pixel_samples() -> u32 {
        4
    }

    fn default_jitter() -> bool {
        true
    }

    fn default_max_dimension() -> usize {
        2
    }

    fn stratified_1d(&mut self, dimension: usize) {
        let count = (self.x_pixel_samples * self.y_pixel_samples) as usize;
        let inv = 1.0_f32 / count as f32;
        let samples = &mut self.samples_1d[dimension];
        for i in 0..count {
            let delta = if self.jitter {
                self.rng.gen::<f32>()
            } else {
                0.5_f32
            };
            samples[i] = ((i as f32 + delta) * inv).min(ONE_MINUS_EPSILON);
        }
    }

    fn stratified_2d(&mut self, dimension: usize) {
        let dx = 1.0_f32 / self.x_pixel_samples as f32;
        let dy = 1.0_f32 / self.y_pixel_samples as f32;
        let mut i = 0;
        for y in 0..self.y_pixel_samples {
            for x in 0..self.x_pixel_samples {
                let (jx, jy) = if self.jitter {
                    (self.rng.gen::<f32>(), self.rng.gen::<f32>())
                } else {
                    (0.5_f32, 0.5_f32)
                };
                self.samples_2d[dimension][i] = Point2::new(
                    ((x as f32 + jx) * dx).min(ONE_MINUS_EPSILON),
                    ((y as f32 + jy) * dy).min(ONE_MINUS_EPSILON),
                );
                i += 1;
            }
        }
    }

    /// Fisher-Yates driven by the sampler's own stream, so shuffles
    /// stay reproducible under the per-block seeding.
    fn shuffle_1d(&mut self, dimension: usize) {
        let samples = &mut self.samples_1d[dimension];
        for i in (1..samples.len()).rev() {
            let j = (self.rng.next_u32() % (i as u32 + 1)) as usize;
            samples.swap(i, j);
        }
    }

    fn shuffle_2d(&mut self, dimension: usize) {
        let samples = &mut self.samples_2d[dimension];
        for i in (1..samples.len()).rev() {
            let j = (self.rng.next_u32() % (i as u32 + 1)) as usize;
            samples.swap(i, j);
        }
    }
}

#[typetag::deserialize(name = "stratified")]
impl Sampler for Stratified {
    fn clone_sampler(&self) -> Box<dyn Sampler> {
        Box::new(Stratified {
            x_pixel_samples: self.x_pixel_samples,
            y_pixel_samples: self.y_pixel_samples,
            jitter: self.jitter,
            max_dimension: self.max_dimension,
            rng: self.rng.clone(),
            samples_1d: Vec::new(),
            samples_2d: Vec::new(),
            sample_index: 0,
            dimension_1d: 0,
            dimension_2d: 0,
        })
    }

    fn prepare(&mut self, block: &ImageBlock) {
        let (x, y) = block.offset();
        self.rng = Pcg32::new(x as u64, y as u64);
    }

    fn generate(&mut self) {
        let count = (self.x_pixel_samples * self.y_pixel_samples) as usize;
        if self.samples_1d.len() != self.max_dimension {
            self.samples_1d = vec![vec![0.0_f32; count]; self.max_dimension];
            self.samples_2d = vec![vec![Point2::zero(); count]; self.max_dimension];
        }

        for dimension in 0..self.max_dimension {
            self.stratified_1d(dimension);
            if self.jitter {
                self.shuffle_1d(dimension);
            }
        }
        for dimension in 0..self.max_dimension {
            self.stratified_2d(dimension);
            if self.jitter {
                self.shuffle_2d(dimension);
            }
        }

        self.sample_index = 0;
        self.dimension_1d = 0;
        self.dimension_2d = 0;
    }

    fn advance(&mut self) {
        self.sample_index += 1;
        self.dimension_1d = 0;
        self.dimension_2d = 0;
    }

    fn next_1d(&mut self) -> f32 {
        if self.dimension_1d < self.max_dimension && self.sample_index < self.samples_1d[0].len() {
            let value = self.samples_1d[self.dimension_1d][self.sample_index];
            self.dimension_1d += 1;
            value
        } else {
            self.rng.gen::<f32>().min(ONE_MINUS_EPSILON)
        }
    }

    fn next_2d(&mut self) -> Point2 {
        if self.dimension_2d < self.max_dimension && self.sample_index < self.samples_2d[0].len() {
            let value = self.samples_2d[self.dimension_2d][self.sample_index];
            self.dimension_2d += 1;
            value
        } else {
            Point2::new(
                self.rng.gen::<f32>().min(ONE_MINUS_EPSILON),
                self.rng.gen::<f32>().min(ONE_MINUS_EPSILON),
            )
        }
    }

    fn sample_count(&self) -> u32 {
        self.x_pixel_samples * self.y_pixel_samples
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rfilter::BoxFilter;

    fn block_at(offset: (u32, u32)) -> ImageBlock {
        let mut block = ImageBlock::new((4, 4), &BoxFilter {});
        block.set_offset(offset);
        block
    }

    #[test]
    fn independent_is_deterministic_per_block() {
        let mut a = Independent::new(4);
        let mut b = Independent::new(4);
        a.prepare(&block_at((32, 64)));
        b.prepare(&block_at((32, 64)));
        for _ in 0..16 {
            assert_eq!(a.next_1d(), b.next_1d());
        }

        // A different block offset decorrelates the stream.
        let mut c = Independent::new(4);
        c.prepare(&block_at((64, 32)));
        let mut all_equal = true;
        let mut a2 = Independent::new(4);
        a2.prepare(&block_at((32, 64)));
        for _ in 0..16 {
            if a2.next_1d() != c.next_1d() {
                all_equal = false;
            }
        }
        assert!(!all_equal);
    }

    #[test]
    fn samples_stay_strictly_below_one() {
        let mut sampler = Independent::new(1);
        sampler.prepare(&block_at((0, 0)));
        for _ in 0..1000 {
            assert!(sampler.next_1d() < 1.0);
            let p = sampler.next_2d();
            assert!(p.x() < 1.0 && p.y() < 1.0);
        }
    }

    #[test]
    fn stratified_first_dimension_covers_every_cell() {
        // 4x4 pixel samples with maxDimension 2: the first next2D of
        // each of the 16 samples must land in a distinct cell of the
        // 4x4 grid.
        let mut sampler = Stratified::new(4, 4, true, 2);
        sampler.prepare(&block_at((96, 128)));
        sampler.generate();

        let mut occupied = [[false; 4]; 4];
        for i in 0..16 {
            let p = sampler.next_2d();
            let cx = (p.x() * 4.0) as usize;
            let cy = (p.y() * 4.0) as usize;
            assert!(
                !occupied[cy][cx],
                "cell ({}, {}) sampled twice at sample {}",
                cx,
                cy,
                i
            );
            occupied[cy][cx] = true;
            sampler.advance();
        }
        for row in &occupied {
            for &cell in row {
                assert!(cell);
            }
        }
    }

    #[test]
    fn stratified_1d_dimensions_are_stratified() {
        let mut sampler = Stratified::new(2, 2, true, 2);
        sampler.prepare(&block_at((0, 32)));
        sampler.generate();
        // Gather the first 1D dimension across all four samples.
        let mut values = Vec::new();
        for _ in 0..4 {
            values.push(sampler.next_1d());
            sampler.advance();
        }
        values.sort_by(|a, b| a.partial_cmp(b).unwrap());
        for (i, v) in values.iter().enumerate() {
            assert!(
                *v >= i as f32 * 0.25 && *v < (i as f32 + 1.0) * 0.25,
                "value {} outside stratum {}",
                v,
                i
            );
        }
    }

    #[test]
    fn dimensions_beyond_the_limit_fall_through() {
        let mut sampler = Stratified::new(2, 2, true, 1);
        sampler.prepare(&block_at((0, 0)));
        sampler.generate();
        let _stratified = sampler.next_2d();
        // Second dimension exceeds maxDimension; still valid samples.
        let free = sampler.next_2d();
        assert!(free.x() >= 0.0 && free.x() < 1.0);
    }

    #[test]
    fn without_jitter_samples_sit_at_cell_centers() {
        let mut sampler = Stratified::new(2, 2, false, 2);
        sampler.prepare(&block_at((0, 0)));
        sampler.generate();
        let p = sampler.next_2d();
        let centered = |v: f32| (v * 4.0 - (v * 4.0).floor() - 0.5).abs() < 1e-4
            || (v * 2.0 - (v * 2.0).floor() - 0.5).abs() < 1e-4;
        assert!(centered(p.x()) && centered(p.y()), "{:?}", (p.x(), p.y()));
    }
}
