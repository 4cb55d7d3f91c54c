//! Transformations from the unit square to the sampling domains used
//! by the BSDFs, shapes and integrators, each paired with its density.

use crate::frame::Frame;
use crate::utils::{INV_FOURPI, INV_PI, INV_TWOPI};
use crate::vector::{Point2, Vector3};

use std::f32::consts::PI;

pub fn square_to_uniform_square(sample: Point2) -> Point2 {
    sample
}

pub fn square_to_uniform_square_pdf(p: Point2) -> f32 {
    if p.x() >= 0.0_f32 && p.x() <= 1.0_f32 && p.y() >= 0.0_f32 && p.y() <= 1.0_f32 {
        1.0_f32
    } else {
        0.0_f32
    }
}

pub fn square_to_uniform_disk(sample: Point2) -> Point2 {
    let r = sample.x().sqrt();
    let phi = 2.0_f32 * PI * sample.y();
    Point2::new(r * phi.cos(), r * phi.sin())
}

pub fn square_to_uniform_disk_pdf(p: Point2) -> f32 {
    if p.x() * p.x() + p.y() * p.y() <= 1.0_f32 {
        INV_PI
    } else {
        0.0_f32
    }
}

pub fn square_to_uniform_sphere(sample: Point2) -> Vector3 {
    let z = 1.0_f32 - 2.0_f32 * sample.x();
    let r = (1.0_f32 - z * z).max(0.0_f32).sqrt();
    let phi = 2.0_f32 * PI * sample.y();
    Vector3::new(r * phi.cos(), r * phi.sin(), z)
}

pub fn square_to_uniform_sphere_pdf(_v: Vector3) -> f32 {
    INV_FOURPI
}

pub fn square_to_uniform_hemisphere(sample: Point2) -> Vector3 {
    let z = sample.x();
    let r = (1.0_f32 - z * z).max(0.0_f32).sqrt();
    let phi = 2.0_f32 * PI * sample.y();
    Vector3::new(r * phi.cos(), r * phi.sin(), z)
}

pub fn square_to_uniform_hemisphere_pdf(v: Vector3) -> f32 {
    if Frame::cos_theta(v) >= 0.0_f32 {
        INV_TWOPI
    } else {
        0.0_f32
    }
}

/// Cosine-weighted hemisphere direction via Malley's method: sample
/// the unit disk, then project up onto the hemisphere.
pub fn square_to_cosine_hemisphere(sample: Point2) -> Vector3 {
    let d = square_to_uniform_disk(sample);
    let z = (1.0_f32 - d.x() * d.x() - d.y() * d.y()).max(0.0_f32).sqrt();
    Vector3::new(d.x(), d.y(), z)
}

pub fn square_to_cosine_hemisphere_pdf(v: Vector3) -> f32 {
    let cos_theta = Frame::cos_theta(v);
    if cos_theta <= 0.0_f32 {
        0.0_f32
    } else {
        cos_theta * INV_PI
    }
}

/// Barycentric coordinates uniformly distributed over the triangle
/// (0,0), (1,0), (0,1).
pub fn square_to_uniform_triangle(sample: Point2) -> Point2 {
    let su = sample.x().sqrt();
    Point2::new(1.0_f32 - su, sample.y() * su)
}

pub fn square_to_uniform_triangle_pdf(p: Point2) -> f32 {
    if p.x() >= 0.0_f32 && p.y() >= 0.0_f32 && p.x() + p.y() <= 1.0_f32 {
        2.0_f32
    } else {
        0.0_f32
    }
}

/// Beckmann-distributed microfacet normal with roughness `alpha`.
pub fn square_to_beckmann(sample: Point2, alpha: f32) -> Vector3 {
    let phi = 2.0_f32 * PI * sample.x();
    let tan_theta_sqr = -alpha * alpha * (1.0_f32 - sample.y()).ln();
    let cos_theta = 1.0_f32 / (1.0_f32 + tan_theta_sqr).sqrt();
    let sin_theta = (1.0_f32 - cos_theta * cos_theta).max(0.0_f32).sqrt();
    Vector3::new(phi.cos() * sin_theta, phi.sin() * sin_theta, cos_theta)
}

pub fn square_to_beckmann_pdf(m: Vector3, alpha: f32) -> f32 {
    let cos_theta = Frame::cos_theta(m);
    if cos_theta <= 0.0_f32 {
        return 0.0_f32;
    }
    let cos_theta_sqr = cos_theta * cos_theta;
    let tan_theta_sqr = (1.0_f32 - cos_theta_sqr) / cos_theta_sqr;
    (-tan_theta_sqr / (alpha * alpha)).exp()
        / (PI * alpha * alpha * cos_theta_sqr * cos_theta)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;
    use rand_pcg::Pcg32;

    fn samples(n: usize) -> Vec<Point2> {
        let mut rng = Pcg32::new(0xcafe_f00d, 0xa02_bdbf_7bb3_c0a7);
        (0..n)
            .map(|_| Point2::new(rng.gen::<f32>(), rng.gen::<f32>()))
            .collect()
    }

    #[test]
    fn warps_land_in_support_with_positive_pdf() {
        for s in samples(512) {
            let d = square_to_uniform_disk(s);
            assert!(square_to_uniform_disk_pdf(d) > 0.0);

            let v = square_to_uniform_sphere(s);
            assert!((v.length() - 1.0).abs() < 1e-4);

            let h = square_to_uniform_hemisphere(s);
            assert!(h.z() >= 0.0);
            assert!(square_to_uniform_hemisphere_pdf(h) > 0.0);

            let c = square_to_cosine_hemisphere(s);
            assert!(c.z() >= 0.0);
            assert!((c.length() - 1.0).abs() < 1e-4);

            let b = square_to_uniform_triangle(s);
            assert!(square_to_uniform_triangle_pdf(b) > 0.0);

            let m = square_to_beckmann(s, 0.3);
            assert!(m.z() > 0.0);
            assert!(square_to_beckmann_pdf(m, 0.3) > 0.0);
        }
    }

    #[test]
    fn cosine_hemisphere_matches_its_density() {
        // Chi-square style check over cos(theta) bands: observed
        // frequency in each band against the analytic integral.
        const BANDS: usize = 4;
        const N: usize = 20_000;
        let mut counts = [0_usize; BANDS];
        for s in samples(N) {
            let v = square_to_cosine_hemisphere(s);
            let band = ((v.z() * BANDS as f32) as usize).min(BANDS - 1);
            counts[band] += 1;
        }
        for band in 0..BANDS {
            let z0 = band as f32 / BANDS as f32;
            let z1 = (band + 1) as f32 / BANDS as f32;
            // Integral of 2 z dz over [z0, z1] (density of cos(theta)
            // under cosine-weighted sampling).
            let expected = (z1 * z1 - z0 * z0) * N as f32;
            let observed = counts[band] as f32;
            assert!(
                (observed - expected).abs() < 0.05 * N as f32,
                "band {}: observed {} expected {}",
                band,
                observed,
                expected
            );
        }
    }

    #[test]
    fn uniform_hemisphere_mean_cosine() {
        // E[cos(theta)] over the uniform hemisphere is 1/2.
        let n = 20_000;
        let mut sum = 0.0_f64;
        for s in samples(n) {
            sum += square_to_uniform_hemisphere(s).z() as f64;
        }
        let mean = sum / n as f64;
        assert!((mean - 0.5).abs() < 0.01, "mean cosine {}", mean);
    }
}
