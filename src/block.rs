use crate::bitmap::Bitmap;
use crate::color::Color3;
use crate::rfilter::ReconstructionFilter;
use crate::vector::Point2;

use std::sync::Mutex;

/// Edge length of the tiles handed out to render workers.
pub const BLOCK_SIZE: u32 = 32;

/// Resolution of the tabulated filter profile.
const FILTER_RESOLUTION: usize = 32;

/// Rectangular tile of (weighted color, weight) accumulators with a
/// border wide enough for the reconstruction filter's support. Knows
/// its pixel-space offset into the full image.
pub struct ImageBlock {
    offset: (u32, u32),
    size: (u32, u32),
    alloc_size: (u32, u32),
    border_size: u32,
    filter_radius: f32,
    lookup_factor: f32,
    filter_lut: Vec<f32>,
    pixels: Vec<(Color3, f32)>,
}

impl ImageBlock {
    pub fn new(size: (u32, u32), filter: &dyn ReconstructionFilter) -> ImageBlock {
        let filter_radius = filter.radius();
        let border_size = (filter_radius - 0.5_f32).ceil().max(0.0_f32) as u32;

        // Tabulate the profile; the extra entry keeps the lookup at
        // exactly the radius in range (and at zero).
        let mut filter_lut = Vec::with_capacity(FILTER_RESOLUTION + 1);
        for i in 0..FILTER_RESOLUTION {
            filter_lut.push(filter.eval(filter_radius * i as f32 / FILTER_RESOLUTION as f32));
        }
        filter_lut.push(0.0_f32);

        let alloc_size = (size.0 + 2 * border_size, size.1 + 2 * border_size);
        let mut pixels = Vec::new();
        pixels.resize((alloc_size.0 * alloc_size.1) as usize, (Color3::black(), 0.0_f32));

        ImageBlock {
            offset: (0, 0),
            size,
            alloc_size,
            border_size,
            filter_radius,
            lookup_factor: FILTER_RESOLUTION as f32 / filter_radius,
            filter_lut,
            pixels,
        }
    }

    pub fn offset(&self) -> (u32, u32) {
        self.offset
    }

    pub fn size(&self) -> (u32, u32) {
        self.size
    }

    pub fn border_size(&self) -> u32 {
        self.border_size
    }

    pub fn set_offset(&mut self, offset: (u32, u32)) {
        self.offset = offset;
    }

    /// Shrink the active area (for edge tiles); the allocation is
    /// sized for the largest tile and left untouched.
    pub fn set_size(&mut self, size: (u32, u32)) {
        debug_assert!(size.0 + 2 * self.border_size <= self.alloc_size.0);
        debug_assert!(size.1 + 2 * self.border_size <= self.alloc_size.1);
        self.size = size;
    }

    pub fn clear(&mut self) {
        for p in self.pixels.iter_mut() {
            *p = (Color3::black(), 0.0_f32);
        }
    }

    fn index(&self, x: u32, y: u32) -> usize {
        (y * self.alloc_size.0 + x) as usize
    }

    fn filter_weight(&self, distance: f32) -> f32 {
        let i = (distance.abs() * self.lookup_factor) as usize;
        self.filter_lut[i.min(FILTER_RESOLUTION)]
    }

    /// Splat a radiance sample through the reconstruction filter into
    /// the surrounding accumulators. Invalid estimates are discarded
    /// as failed samples.
    pub fn put(&mut self, pos: Point2, value: Color3) {
        if !value.is_valid() {
            log::warn!("discarding invalid radiance sample {:?}", value);
            return;
        }

        // Sample position relative to this block, border included.
        let px = pos.x() - 0.5_f32 - (self.offset.0 as f32 - self.border_size as f32);
        let py = pos.y() - 0.5_f32 - (self.offset.1 as f32 - self.border_size as f32);

        let max_x = (self.size.0 + 2 * self.border_size - 1) as i64;
        let max_y = (self.size.1 + 2 * self.border_size - 1) as i64;
        let x0 = ((px - self.filter_radius).ceil() as i64).max(0);
        let x1 = ((px + self.filter_radius).floor() as i64).min(max_x);
        let y0 = ((py - self.filter_radius).ceil() as i64).max(0);
        let y1 = ((py + self.filter_radius).floor() as i64).min(max_y);

        for y in y0..=y1 {
            let wy = self.filter_weight(y as f32 - py);
            for x in x0..=x1 {
                let weight = self.filter_weight(x as f32 - px) * wy;
                let index = self.index(x as u32, y as u32);
                let (color, total) = &mut self.pixels[index];
                *color += value * weight;
                *total += weight;
            }
        }
    }

    /// Merge a rendered tile into this block at the tile's offset.
    pub fn put_block(&mut self, other: &ImageBlock) {
        debug_assert_eq!(self.border_size, other.border_size);
        let copy_w = other.size.0 + 2 * other.border_size;
        let copy_h = other.size.1 + 2 * other.border_size;
        // The tile's outermost border cell maps to image coordinate
        // (offset - border), which this block stores at index
        // (offset - border) + border = offset.
        for y in 0..copy_h {
            for x in 0..copy_w {
                let source = other.pixels[other.index(x, y)];
                let index = self.index(other.offset.0 + x, other.offset.1 + y);
                let (color, total) = &mut self.pixels[index];
                *color += source.0;
                *total += source.1;
            }
        }
    }

    /// Normalized image: accumulated color over accumulated weight,
    /// border cropped away.
    pub fn to_bitmap(&self) -> Bitmap {
        let mut bitmap = Bitmap::new(self.size.0 as usize, self.size.1 as usize);
        for y in 0..self.size.1 {
            for x in 0..self.size.0 {
                let (color, weight) =
                    self.pixels[self.index(x + self.border_size, y + self.border_size)];
                let value = if weight > 0.0_f32 {
                    color / weight
                } else {
                    Color3::black()
                };
                bitmap.set(x as usize, y as usize, value);
            }
        }
        bitmap
    }
}

#[derive(Clone, Copy, PartialEq)]
enum Direction {
    Right,
    Down,
    Left,
    Up,
}

struct GeneratorState {
    block: (i64, i64),
    num_blocks: (i64, i64),
    blocks_left: usize,
    direction: Direction,
    steps_left: i64,
    num_steps: i64,
}

/// Hands out image tiles in an outward spiral starting at the center,
/// which keeps consecutive tiles close together in the image. Safe to
/// poll from many render workers at once.
pub struct BlockGenerator {
    size: (u32, u32),
    block_size: u32,
    state: Mutex<GeneratorState>,
}

impl BlockGenerator {
    pub fn new(size: (u32, u32), block_size: u32) -> BlockGenerator {
        let num_blocks = (
            ((size.0 + block_size - 1) / block_size) as i64,
            ((size.1 + block_size - 1) / block_size) as i64,
        );
        BlockGenerator {
            size,
            block_size,
            state: Mutex::new(GeneratorState {
                block: ((num_blocks.0 - 1) / 2, (num_blocks.1 - 1) / 2),
                num_blocks,
                blocks_left: (num_blocks.0 * num_blocks.1) as usize,
                direction: Direction::Right,
                steps_left: 1,
                num_steps: 1,
            }),
        }
    }

    pub fn block_count(&self) -> usize {
        let state = self.state.lock().expect("Block generator lock poisoned.");
        (state.num_blocks.0 * state.num_blocks.1) as usize
    }

    pub fn blocks_left(&self) -> usize {
        let state = self.state.lock().expect("Block generator lock poisoned.");
        state.blocks_left
    }

    /// Assign the next tile's offset and size. Returns false once the
    /// image is exhausted.
    pub fn next(&self, block: &mut ImageBlock) -> bool {
        let mut state = self.state.lock().expect("Block generator lock poisoned.");
        if state.blocks_left == 0 {
            return false;
        }

        let pos = (
            state.block.0 as u32 * self.block_size,
            state.block.1 as u32 * self.block_size,
        );
        block.set_offset(pos);
        block.set_size((
            (self.size.0 - pos.0).min(self.block_size),
            (self.size.1 - pos.1).min(self.block_size),
        ));

        state.blocks_left -= 1;
        if state.blocks_left == 0 {
            return true;
        }

        // March the spiral until it lands on a tile inside the image.
        loop {
            match state.direction {
                Direction::Right => state.block.0 += 1,
                Direction::Down => state.block.1 += 1,
                Direction::Left => state.block.0 -= 1,
                Direction::Up => state.block.1 -= 1,
            }
            state.steps_left -= 1;
            if state.steps_left == 0 {
                state.direction = match state.direction {
                    Direction::Right => Direction::Down,
                    Direction::Down => Direction::Left,
                    Direction::Left => Direction::Up,
                    Direction::Up => Direction::Right,
                };
                if state.direction == Direction::Left || state.direction == Direction::Right {
                    state.num_steps += 1;
                }
                state.steps_left = state.num_steps;
            }
            if state.block.0 >= 0
                && state.block.1 >= 0
                && state.block.0 < state.num_blocks.0
                && state.block.1 < state.num_blocks.1
            {
                break;
            }
        }
        true
    }
}
