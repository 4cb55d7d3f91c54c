use std::io;
use std::io::Write;

const PROGRESS_PREFIX: &str = "\rRendering: <";
const FILLED_CHAR: char = '#';
const EMPTY_CHAR: char = ' ';

// Only redraw after at least this much forward progress.
const UPDATE_DELTA: f32 = 0.009_f32;

/// Console progress bar over a fixed amount of work (one unit per
/// rendered block). Shared between workers behind a mutex.
pub struct Progress {
    total_work: u64,
    current_progress: u64,
    bar_length: u32,
    last_percentage: f32,
}

impl Progress {
    pub fn new(total_work: u64, bar_length: u32) -> Progress {
        Progress {
            total_work: total_work.max(1),
            current_progress: 0,
            bar_length,
            last_percentage: -1.0_f32,
        }
    }

    pub fn update(&mut self, progress_made: u64) {
        self.current_progress = (self.current_progress + progress_made).min(self.total_work);
        let percentage = self.current_progress as f32 / self.total_work as f32;
        if (percentage - self.last_percentage).abs() > UPDATE_DELTA {
            self.print(percentage);
        }
    }

    pub fn done(&mut self) {
        self.print(1.0_f32);
        let mut out = io::stdout();
        let _ = out.write(b"\n");
        let _ = out.flush();
    }

    fn print(&mut self, percentage: f32) {
        self.last_percentage = percentage;

        let filled = (percentage * self.bar_length as f32).round() as u32;
        let mut bar = String::with_capacity(PROGRESS_PREFIX.len() + self.bar_length as usize + 8);
        bar.push_str(PROGRESS_PREFIX);
        for _ in 0..filled {
            bar.push(FILLED_CHAR);
        }
        for _ in filled..self.bar_length {
            bar.push(EMPTY_CHAR);
        }
        bar.push_str(&format!("> ({}%)", (percentage * 100.0_f32).round() as u32));

        let mut out = io::stdout();
        let _ = out.write(bar.as_bytes());
        let _ = out.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_saturates_at_the_total() {
        let mut progress = Progress::new(4, 10);
        progress.update(10);
        assert_eq!(progress.current_progress, 4);
    }
}
