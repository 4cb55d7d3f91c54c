use crate::bsdf::{BsdfQueryRecord, Measure};
use crate::color::Color3;
use crate::ray::{Hit, Ray};
use crate::sampler::Sampler;
use crate::scene::Scene;
use crate::utils::EPSILON;
use crate::vector::Point2;
use crate::warp;

use serde::Deserialize;
use std::f32::consts::PI;

/// Maps a camera ray to a radiance estimate.
#[typetag::deserialize]
pub trait Integrator: Send + Sync {
    /// Hook invoked once before rendering starts.
    fn preprocess(&self, _scene: &Scene) {}

    fn li(&self, scene: &Scene, sampler: &mut dyn Sampler, ray: &Ray) -> Color3;
}

/// Debug integrator: the BSDF sampling weight with a zero sample,
/// which for the bundled materials is the albedo texture.
#[derive(Deserialize)]
pub struct Flat {}

#[typetag::deserialize(name = "flat")]
impl Integrator for Flat {
    fn li(&self, scene: &Scene, _sampler: &mut dyn Sampler, ray: &Ray) -> Color3 {
        let mut hit = Hit::none();
        if !scene.intersect(ray, &mut hit) {
            return Color3::black();
        }
        let shape = &scene.shapes()[hit.shape.unwrap_or(0)];
        let mut query = BsdfQueryRecord::for_sampling(hit.to_local(-ray.direction), hit.uv);
        shape.bsdf().sample(&mut query, Point2::zero())
    }
}

/// Ambient occlusion: the unoccluded fraction of the hemisphere above
/// the hit point, importance-sampled either uniformly or by cosine.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AmbientOcclusion {
    #[serde(default = "AmbientOcclusion::default_sample_count")]
    sample_count: u32,
    #[serde(default = "AmbientOcclusion::default_cosine_weighted")]
    cosine_weighted: bool,
}

impl AmbientOcclusion {
    fn default_sample_count() -> u32 {
        32
    }

    fn default_cosine_weighted() -> bool {
        true
    }
}

#[typetag::deserialize(name = "ao")]
impl Integrator for AmbientOcclusion {
    fn li(&self, scene: &Scene, sampler: &mut dyn Sampler, ray: &Ray) -> Color3 {
        let mut hit = Hit::none();
        if !scene.intersect(ray, &mut hit) {
            return scene.background_color(ray.direction);
        }

        let normal = hit.local_frame.n;
        let pos = ray.at(hit.t);

        let mut sum = 0.0_f32;
        for _ in 0..self.sample_count {
            let sample = sampler.next_2d();
            let local = if self.cosine_weighted {
                warp::square_to_cosine_hemisphere(sample)
            } else {
                warp::square_to_uniform_hemisphere(sample)
            };
            let world = hit.to_world(local).normalized();

            let shadow_ray = Ray::shadow_ray(pos + normal * EPSILON, world);
            let mut shadow_hit = Hit::none();
            if !scene.intersect(&shadow_ray, &mut shadow_hit) {
                let pdf = if self.cosine_weighted {
                    warp::square_to_cosine_hemisphere_pdf(local)
                } else {
                    warp::square_to_uniform_hemisphere_pdf(local)
                };
                if pdf > EPSILON {
                    sum += normal.dot(world).max(0.0_f32) / pdf;
                }
            }
        }

        Color3::grey(sum / (PI * self.sample_count as f32))
    }
}

/// Single-bounce direct lighting with explicit light sampling.
#[derive(Deserialize)]
pub struct Direct {}

#[typetag::deserialize(name = "direct")]
impl Integrator for Direct {
    fn li(&self, scene: &Scene, sampler: &mut dyn Sampler, ray: &Ray) -> Color3 {
        let mut hit = Hit::none();
        if !scene.intersect(ray, &mut hit) {
            return scene.background_color(ray.direction);
        }

        let shape_index = match hit.shape {
            Some(index) => index,
            None => return Color3::black(),
        };
        let bsdf = scene.shapes()[shape_index].bsdf();
        let normal = hit.local_frame.n;
        let pos = ray.at(hit.t);

        let mut radiance = Color3::black();
        for light in scene.lights() {
            let light_sample = light.sample(scene, &pos, sampler.next_2d());
            if light_sample.pdf < EPSILON {
                continue;
            }
            if scene.occluded(&pos, &normal, &light_sample, light.shape()) {
                continue;
            }
            let cos_term = light_sample.wi.dot(normal).max(0.0_f32);
            let value = bsdf.eval(&BsdfQueryRecord::new(
                hit.to_local(-ray.direction),
                hit.to_local(light_sample.wi),
                Measure::SolidAngle,
                hit.uv,
            ));
            radiance += light_sample.intensity * value * (cos_term / light_sample.pdf);
        }
        radiance
    }
}

/// Whitted-style integrator: perfect specular chains are followed
/// recursively, diffuse surfaces gather direct lighting.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Whitted {
    #[serde(default = "Whitted::default_max_recursion")]
    max_recursion: u32,
}

impl Whitted {
    fn default_max_recursion() -> u32 {
        4
    }
}

#[typetag::deserialize(name = "whitted")]
impl Integrator for Whitted {
    fn li(&self, scene: &Scene, sampler: &mut dyn Sampler, ray: &Ray) -> Color3 {
        if ray.depth >= self.max_recursion {
            return Color3::black();
        }

        let mut hit = Hit::none();
        if !scene.intersect(ray, &mut hit) {
            return scene.background_color(ray.direction);
        }

        let shape_index = match hit.shape {
            Some(index) => index,
            None => return Color3::black(),
        };
        let bsdf = scene.shapes()[shape_index].bsdf();
        let normal = hit.local_frame.n;
        let pos = ray.at(hit.t);

        // Specular materials bounce; importance weight times whatever
        // the reflected or refracted ray sees.
        if !bsdf.is_diffuse() {
            let mut query = BsdfQueryRecord::for_sampling(hit.to_local(-ray.direction), hit.uv);
            let weight = bsdf.sample(&mut query, sampler.next_2d());
            if weight.is_black() {
                return Color3::black();
            }
            let direction = hit.to_world(query.wo);
            // Offset the child ray to the side it actually travels on.
            let origin = if direction.dot(normal) < 0.0_f32 {
                pos - normal * EPSILON
            } else {
                pos + normal * EPSILON
            };
            let child = ray.child(origin, direction);
            return weight * self.li(scene, sampler, &child);
        }

        let mut radiance = Color3::black();
        for light in scene.lights() {
            let light_sample = light.sample(scene, &pos, sampler.next_2d());
            if light_sample.pdf < EPSILON {
                continue;
            }
            if scene.occluded(&pos, &normal, &light_sample, light.shape()) {
                continue;
            }
            let cos_term = light_sample.wi.dot(normal).max(0.0_f32);
            let value = bsdf.eval(&BsdfQueryRecord::new(
                hit.to_local(-ray.direction),
                hit.to_local(light_sample.wi),
                Measure::SolidAngle,
                hit.uv,
            ));
            radiance += light_sample.intensity * value * (cos_term / light_sample.pdf);
        }
        radiance
    }
}
