/// Discrete probability distribution over a list of non-negative
/// weights, stored as a running CDF. Meshes use one entry per face so
/// that area sampling picks faces proportionally to their area.
pub struct DiscretePdf {
    cdf: Vec<f32>,
    normalization: f32,
}

impl DiscretePdf {
    pub fn with_capacity(n: usize) -> DiscretePdf {
        let mut cdf = Vec::with_capacity(n + 1);
        cdf.push(0.0_f32);
        DiscretePdf {
            cdf,
            normalization: 0.0_f32,
        }
    }

    pub fn append(&mut self, weight: f32) {
        let last = *self.cdf.last().unwrap_or(&0.0_f32);
        self.cdf.push(last + weight);
    }

    pub fn len(&self) -> usize {
        self.cdf.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Scales the CDF to end at one. Returns the original sum of the
    /// weights (for a mesh, its total surface area).
    pub fn normalize(&mut self) -> f32 {
        let sum = *self.cdf.last().unwrap_or(&0.0_f32);
        if sum > 0.0_f32 {
            for v in self.cdf.iter_mut() {
                *v /= sum;
            }
            let last = self.cdf.len() - 1;
            self.cdf[last] = 1.0_f32;
        }
        self.normalization = sum;
        sum
    }

    pub fn normalization(&self) -> f32 {
        self.normalization
    }

    /// Index of the entry whose CDF interval contains `u`.
    pub fn sample(&self, u: f32) -> usize {
        // First entry strictly above u, minus one for the leading zero.
        let mut lo = 0;
        let mut hi = self.cdf.len();
        while lo < hi {
            let mid = (lo + hi) / 2;
            if self.cdf[mid] <= u {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        lo.saturating_sub(1).min(self.len().saturating_sub(1))
    }

    /// Samples an entry and rescales `u` to a fresh uniform variate so
    /// callers can reuse it for a follow-up decision.
    pub fn sample_reuse(&self, u: &mut f32) -> usize {
        let index = self.sample(*u);
        let lo = self.cdf[index];
        let hi = self.cdf[index + 1];
        if hi > lo {
            *u = (*u - lo) / (hi - lo);
        }
        index
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_returns_the_weight_sum() {
        let mut pdf = DiscretePdf::with_capacity(3);
        pdf.append(1.0);
        pdf.append(3.0);
        pdf.append(4.0);
        assert_eq!(pdf.normalize(), 8.0);
        assert_eq!(pdf.normalization(), 8.0);
    }

    #[test]
    fn sample_picks_the_matching_interval() {
        let mut pdf = DiscretePdf::with_capacity(3);
        pdf.append(1.0);
        pdf.append(3.0);
        pdf.append(4.0);
        pdf.normalize();
        // Intervals: [0, 0.125), [0.125, 0.5), [0.5, 1]
        assert_eq!(pdf.sample(0.0), 0);
        assert_eq!(pdf.sample(0.1), 0);
        assert_eq!(pdf.sample(0.2), 1);
        assert_eq!(pdf.sample(0.499), 1);
        assert_eq!(pdf.sample(0.75), 2);
        assert_eq!(pdf.sample(1.0), 2);
    }

    #[test]
    fn sample_reuse_rescales_the_variate() {
        let mut pdf = DiscretePdf::with_capacity(2);
        pdf.append(1.0);
        pdf.append(1.0);
        pdf.normalize();
        let mut u = 0.75_f32;
        let index = pdf.sample_reuse(&mut u);
        assert_eq!(index, 1);
        assert!((u - 0.5).abs() < 1e-6);
    }
}
