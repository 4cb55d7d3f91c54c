use crate::color::Color3;
use crate::frame::Frame;
use crate::texture::Texture;
use crate::utils::{fresnel, EPSILON, INV_PI, INV_TWOPI};
use crate::vector::{Point2, Vector3};
use crate::warp;

use std::f32::consts::PI;

/// Integration measure a sampled direction was drawn under.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Measure {
    Unknown,
    SolidAngle,
    Discrete,
}

/// Query record shared by the evaluation and sampling routines. All
/// directions live in the local shading frame with the normal on +Z.
pub struct BsdfQueryRecord {
    /// Incident direction.
    pub wi: Vector3,
    /// Outgoing direction, filled in by `sample`.
    pub wo: Vector3,
    /// Texture coordinates at the hit point.
    pub uv: Point2,
    /// Relative index of refraction along the sampled direction.
    pub eta: f32,
    pub measure: Measure,
}

impl BsdfQueryRecord {
    /// Record prepared for `sample`; the BSDF fills in the rest.
    pub fn for_sampling(wi: Vector3, uv: Point2) -> BsdfQueryRecord {
        BsdfQueryRecord {
            wi,
            wo: Vector3::zero(),
            uv,
            eta: 1.0_f32,
            measure: Measure::Unknown,
        }
    }

    /// Record for querying a known pair of directions.
    pub fn new(wi: Vector3, wo: Vector3, measure: Measure, uv: Point2) -> BsdfQueryRecord {
        BsdfQueryRecord {
            wi,
            wo,
            uv,
            eta: 1.0_f32,
            measure,
        }
    }
}

pub trait Bsdf {
    /// Sample an outgoing direction, filling `wo`, `eta` and `measure`.
    /// Returns the importance weight: BSDF value times the outgoing
    /// cosine over the sample density. Black means the sample failed.
    fn sample(&self, query: &mut BsdfQueryRecord, sample: Point2) -> Color3;

    /// BSDF value for the direction pair in `query`. Discrete BSDFs
    /// always evaluate to zero.
    fn eval(&self, query: &BsdfQueryRecord) -> Color3;

    /// Density realized by `sample`, with respect to solid angle.
    /// Zero for discrete BSDFs.
    fn pdf(&self, query: &BsdfQueryRecord) -> f32;

    /// Whether an integrator may treat this BSDF as non-specular.
    fn is_diffuse(&self) -> bool {
        false
    }
}

pub type SyncBsdf = dyn Bsdf + Send + Sync;

/// Lambertian reflectance.
pub struct Diffuse {
    albedo: Texture,
}

impl Diffuse {
    pub fn new(albedo: Texture) -> Diffuse {
        Diffuse { albedo }
    }

    /// Stand-in material for shapes declared without a BSDF.
    pub fn default_grey() -> Diffuse {
        Diffuse::new(Texture::constant(Color3::grey(0.5_f32)))
    }
}

impl Bsdf for Diffuse {
    fn sample(&self, query: &mut BsdfQueryRecord, sample: Point2) -> Color3 {
        if Frame::cos_theta(query.wi) <= 0.0_f32 {
            return Color3::black();
        }

        query.wo = warp::square_to_cosine_hemisphere(sample);
        query.eta = 1.0_f32;
        query.measure = Measure::SolidAngle;

        // eval() * cos(theta_o) / pdf() collapses to the albedo for a
        // cosine-distributed sample.
        self.albedo.look_up(query.uv)
    }

    fn eval(&self, query: &BsdfQueryRecord) -> Color3 {
        if query.measure != Measure::SolidAngle
            || Frame::cos_theta(query.wi) <= 0.0_f32
            || Frame::cos_theta(query.wo) <= 0.0_f32
        {
            return Color3::black();
        }
        self.albedo.look_up(query.uv) * INV_PI
    }

    fn pdf(&self, query: &BsdfQueryRecord) -> f32 {
        if query.measure != Measure::SolidAngle
            || Frame::cos_theta(query.wi) <= 0.0_f32
            || Frame::cos_theta(query.wo) <= 0.0_f32
        {
            return 0.0_f32;
        }
        INV_PI * Frame::cos_theta(query.wo)
    }

    fn is_diffuse(&self) -> bool {
        true
    }
}

/// Ideal mirror.
pub struct Mirror {
    reflectance: Texture,
}

impl Mirror {
    pub fn new(reflectance: Texture) -> Mirror {
        Mirror { reflectance }
    }
}

impl Bsdf for Mirror {
    fn sample(&self, query: &mut BsdfQueryRecord, _sample: Point2) -> Color3 {
        if Frame::cos_theta(query.wi) <= 0.0_f32 {
            return Color3::black();
        }

        query.wo = Frame::reflect(query.wi);
        query.eta = 1.0_f32;
        query.measure = Measure::Discrete;

        self.reflectance.look_up(query.uv)
    }

    fn eval(&self, _query: &BsdfQueryRecord) -> Color3 {
        // Discrete BRDFs always evaluate to zero.
        Color3::black()
    }

    fn pdf(&self, _query: &BsdfQueryRecord) -> f32 {
        0.0_f32
    }
}

/// Smooth dielectric boundary. Chooses between reflection and
/// refraction with probability equal to the Fresnel reflectance.
pub struct Dielectric {
    int_ior: f32,
    ext_ior: f32,
    weight: Texture,
}

impl Dielectric {
    pub fn new(int_ior: f32, ext_ior: f32, weight: Texture) -> Dielectric {
        Dielectric {
            int_ior,
            ext_ior,
            weight,
        }
    }
}

impl Bsdf for Dielectric {
    fn sample(&self, query: &mut BsdfQueryRecord, sample: Point2) -> Color3 {
        let eta = self.int_ior / self.ext_ior;
        let (f, cos_theta_t) = fresnel(
            Frame::cos_theta(query.wi),
            self.ext_ior,
            self.int_ior,
        );

        let pdf;
        if sample.x() <= f {
            query.wo = Frame::reflect(query.wi);
            query.eta = 1.0_f32;
            pdf = f;
        } else {
            query.wo = Frame::refract(query.wi, cos_theta_t, eta);
            query.eta = if cos_theta_t < 0.0_f32 {
                eta
            } else {
                1.0_f32 / eta
            };
            pdf = 1.0_f32 - f;
        }
        query.measure = Measure::Discrete;

        if pdf < EPSILON {
            return Color3::black();
        }
        self.weight.look_up(query.uv)
    }

    fn eval(&self, _query: &BsdfQueryRecord) -> Color3 {
        Color3::black()
    }

    fn pdf(&self, _query: &BsdfQueryRecord) -> f32 {
        0.0_f32
    }
}

/// Energy-conserving Phong lobe over a Lambertian base.
pub struct Phong {
    kd: Texture,
    ks: Color3,
    exponent: f32,
    specular_sampling_weight: f32,
}

impl Phong {
    pub fn new(kd_color: Color3, kd: Texture, ks: Color3, exponent: f32) -> Phong {
        let specular_sampling_weight = ks.mean() / (kd_color.mean() + ks.mean());
        Phong {
            kd,
            ks,
            exponent,
            specular_sampling_weight,
        }
    }
}

impl Bsdf for Phong {
    fn sample(&self, query: &mut BsdfQueryRecord, sample: Point2) -> Color3 {
        if Frame::cos_theta(query.wi) <= 0.0_f32 {
            return Color3::black();
        }

        query.measure = Measure::SolidAngle;
        query.eta = 1.0_f32;

        let mut u = sample.x();
        let v = sample.y();
        let choose_specular = if u <= self.specular_sampling_weight {
            u /= self.specular_sampling_weight;
            true
        } else {
            u = (u - self.specular_sampling_weight) / (1.0_f32 - self.specular_sampling_weight);
            false
        };

        if choose_specular {
            // Power-cosine lobe around the mirror direction.
            let reflected = Frame::reflect(query.wi);
            let phi = 2.0_f32 * PI * u;
            let cos_alpha = v.powf(1.0_f32 / (self.exponent + 1.0_f32));
            let sin_alpha = (1.0_f32 - cos_alpha * cos_alpha).max(0.0_f32).sqrt();
            let local = Vector3::new(phi.cos() * sin_alpha, phi.sin() * sin_alpha, cos_alpha);
            query.wo = Frame::from_normal(reflected).to_world(local);
        } else {
            query.wo = warp::square_to_cosine_hemisphere(Point2::new(u, v));
        }

        let value = self.eval(query);
        if value.is_black() {
            return Color3::black();
        }
        let pdf = self.pdf(query);
        if pdf < EPSILON {
            return Color3::black();
        }
        value * Frame::cos_theta(query.wo) / pdf
    }

    fn eval(&self, query: &BsdfQueryRecord) -> Color3 {
        if query.measure != Measure::SolidAngle
            || Frame::cos_theta(query.wi) <= 0.0_f32
            || Frame::cos_theta(query.wo) <= 0.0_f32
        {
            return Color3::black();
        }

        let alpha = query.wo.dot(Frame::reflect(query.wi));
        let mut color = self.kd.look_up(query.uv) * INV_PI;
        if alpha > 0.0_f32 {
            color += self.ks
                * ((self.exponent + 2.0_f32) * alpha.powf(self.exponent) * INV_TWOPI);
        }
        color
    }

    fn pdf(&self, query: &BsdfQueryRecord) -> f32 {
        if query.measure != Measure::SolidAngle
            || Frame::cos_theta(query.wi) <= 0.0_f32
            || Frame::cos_theta(query.wo) <= 0.0_f32
        {
            return 0.0_f32;
        }

        let alpha = query.wo.dot(Frame::reflect(query.wi));
        let spec_prob = if alpha > 0.0_f32 {
            alpha.powf(self.exponent) * (self.exponent + 1.0_f32) * INV_TWOPI
        } else {
            0.0_f32
        };
        let diffuse_prob = warp::square_to_cosine_hemisphere_pdf(query.wo);
        self.specular_sampling_weight * spec_prob
            + (1.0_f32 - self.specular_sampling_weight) * diffuse_prob
    }

    fn is_diffuse(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;
    use rand_pcg::Pcg32;

    fn rng() -> Pcg32 {
        Pcg32::new(42, 54)
    }

    fn wi_45deg() -> Vector3 {
        Vector3::new(0.0, 1.0, 1.0).normalized()
    }

    #[test]
    fn diffuse_sample_weight_is_the_albedo() {
        let albedo = Color3::new(0.7, 0.4, 0.1);
        let bsdf = Diffuse::new(Texture::constant(albedo));
        let mut query = BsdfQueryRecord::for_sampling(wi_45deg(), Point2::zero());
        let weight = bsdf.sample(&mut query, Point2::new(0.3, 0.8));
        assert_eq!(weight, albedo);
        assert_eq!(query.measure, Measure::SolidAngle);
        assert!(Frame::cos_theta(query.wo) > 0.0);
    }

    #[test]
    fn diffuse_reflectance_integrates_to_the_albedo() {
        // Monte Carlo estimate of the directional-hemispherical
        // reflectance with uniform hemisphere sampling:
        //   E[eval * cos / pdf] = albedo
        let albedo = 0.65_f32;
        let bsdf = Diffuse::new(Texture::constant(Color3::grey(albedo)));
        let wi = wi_45deg();
        let mut rng = rng();
        let n = 50_000;
        let mut sum = 0.0_f64;
        for _ in 0..n {
            let wo = warp::square_to_uniform_hemisphere(Point2::new(
                rng.gen::<f32>(),
                rng.gen::<f32>(),
            ));
            let query = BsdfQueryRecord::new(wi, wo, Measure::SolidAngle, Point2::zero());
            let value = bsdf.eval(&query);
            sum += (value.r() * Frame::cos_theta(wo)
                / warp::square_to_uniform_hemisphere_pdf(wo)) as f64;
        }
        let estimate = sum / n as f64;
        assert!(
            (estimate - albedo as f64).abs() < 0.01,
            "estimate {} albedo {}",
            estimate,
            albedo
        );
    }

    #[test]
    fn diffuse_rejects_queries_from_below_the_surface() {
        let bsdf = Diffuse::new(Texture::constant(Color3::white()));
        let below = Vector3::new(0.0, 0.0, -1.0);
        let mut query = BsdfQueryRecord::for_sampling(below, Point2::zero());
        assert!(bsdf.sample(&mut query, Point2::new(0.5, 0.5)).is_black());
        let pair = BsdfQueryRecord::new(
            below,
            Vector3::new(0.0, 0.0, 1.0),
            Measure::SolidAngle,
            Point2::zero(),
        );
        assert!(bsdf.eval(&pair).is_black());
        assert_eq!(bsdf.pdf(&pair), 0.0);
    }

    #[test]
    fn mirror_reflects_and_is_discrete() {
        let bsdf = Mirror::new(Texture::constant(Color3::white()));
        let wi = wi_45deg();
        let mut query = BsdfQueryRecord::for_sampling(wi, Point2::zero());
        let weight = bsdf.sample(&mut query, Point2::zero());
        assert_eq!(weight, Color3::white());
        assert_eq!(query.measure, Measure::Discrete);
        assert!((query.wo.x() + wi.x()).abs() < 1e-6);
        assert!((query.wo.y() + wi.y()).abs() < 1e-6);
        assert!((query.wo.z() - wi.z()).abs() < 1e-6);
        // Below the horizon there is nothing to reflect.
        let mut backface =
            BsdfQueryRecord::for_sampling(Vector3::new(0.0, 0.5, -0.5), Point2::zero());
        assert!(bsdf.sample(&mut backface, Point2::zero()).is_black());
        assert_eq!(bsdf.pdf(&query), 0.0);
        assert!(bsdf.eval(&query).is_black());
    }

    #[test]
    fn dielectric_splits_by_the_fresnel_term() {
        let bsdf = Dielectric::new(1.5, 1.0, Texture::constant(Color3::white()));
        let wi = Vector3::new(0.0, 0.0, 1.0);
        let (f, _) = fresnel(1.0, 1.0, 1.5);

        // A sample below the reflectance picks the mirror branch.
        let mut query = BsdfQueryRecord::for_sampling(wi, Point2::zero());
        bsdf.sample(&mut query, Point2::new(f * 0.5, 0.0));
        assert!((query.wo.z() - 1.0).abs() < 1e-5);
        assert_eq!(query.eta, 1.0);

        // A sample above it refracts into the denser medium.
        let mut query = BsdfQueryRecord::for_sampling(wi, Point2::zero());
        bsdf.sample(&mut query, Point2::new(f + (1.0 - f) * 0.5, 0.0));
        assert!(query.wo.z() < 0.0);
        assert!((query.eta - 1.5).abs() < 1e-5);
        assert_eq!(query.measure, Measure::Discrete);
    }

    #[test]
    fn dielectric_total_internal_reflection_always_reflects() {
        let bsdf = Dielectric::new(1.5, 1.0, Texture::constant(Color3::white()));
        // Grazing direction inside the glass, beyond the critical angle.
        let wi = Vector3::new(0.0, 0.995, -0.0998).normalized();
        for u in &[0.1_f32, 0.5, 0.9999] {
            let mut query = BsdfQueryRecord::for_sampling(wi, Point2::zero());
            let weight = bsdf.sample(&mut query, Point2::new(*u, 0.0));
            assert_eq!(weight, Color3::white());
            assert!((query.wo.z() - Frame::reflect(wi).z()).abs() < 1e-6);
        }
    }

    #[test]
    fn phong_sample_weights_are_finite_and_unbiased_direction() {
        let bsdf = Phong::new(
            Color3::grey(0.4),
            Texture::constant(Color3::grey(0.4)),
            Color3::grey(0.4),
            30.0,
        );
        let wi = wi_45deg();
        let mut rng = rng();
        for _ in 0..1_000 {
            let mut query = BsdfQueryRecord::for_sampling(wi, Point2::zero());
            let weight = bsdf.sample(
                &mut query,
                Point2::new(rng.gen::<f32>(), rng.gen::<f32>()),
            );
            assert!(weight.is_valid());
            if !weight.is_black() {
                assert!(Frame::cos_theta(query.wo) > 0.0);
                assert!(bsdf.pdf(&query) > 0.0);
            }
        }
    }

    #[test]
    fn phong_eval_adds_the_lobe_only_in_the_mirror_cone() {
        let bsdf = Phong::new(
            Color3::grey(0.5),
            Texture::constant(Color3::grey(0.5)),
            Color3::grey(0.5),
            50.0,
        );
        let wi = wi_45deg();
        let mirror = Frame::reflect(wi);
        let aligned = BsdfQueryRecord::new(wi, mirror, Measure::SolidAngle, Point2::zero());
        let away = BsdfQueryRecord::new(
            wi,
            Vector3::new(-mirror.x(), -mirror.y(), mirror.z()).normalized(),
            Measure::SolidAngle,
            Point2::zero(),
        );
        assert!(bsdf.eval(&aligned).r() > bsdf.eval(&away).r());
    }
}
