use crate::color::Color3;
use crate::point::Point3;
use crate::scene::Scene;
use crate::texture::LightProbe;
use crate::transform::Transform;
use crate::utils::EPSILON;
use crate::vector::{Point2, Vector3};

use std::f32;
use std::f32::consts::PI;

/// Result of sampling a direction towards a light from a reference
/// point: incident radiance, the direction, the distance to the light
/// and the solid-angle density (one for delta lights).
pub struct LightSample {
    pub intensity: Color3,
    pub wi: Vector3,
    pub dist: f32,
    pub pdf: f32,
}

impl LightSample {
    fn failed(wi: Vector3, dist: f32) -> LightSample {
        LightSample {
            intensity: Color3::black(),
            wi,
            dist,
            pdf: 0.0_f32,
        }
    }
}

pub trait Light {
    /// Sample the direction from `x` towards the light. Callers must
    /// skip samples whose pdf falls below epsilon.
    fn sample(&self, scene: &Scene, x: &Point3, u: Point2) -> LightSample;

    /// Radiance arriving from `direction`, for lights at infinity.
    fn intensity(&self, _direction: Vector3) -> Color3 {
        Color3::black()
    }

    /// Delta lights concentrate their emission in a single position
    /// or direction and always report a pdf of one.
    fn is_delta(&self) -> bool;

    /// Index of the emitting shape, for area lights.
    fn shape(&self) -> Option<usize> {
        None
    }

    fn is_infinite(&self) -> bool {
        false
    }
}

pub type SyncLight = dyn Light + Send + Sync;

/// Isotropic point emitter.
pub struct PointLight {
    position: Point3,
    intensity: Color3,
}

impl PointLight {
    pub fn new(intensity: Color3, transform: &Transform) -> PointLight {
        PointLight {
            position: transform.point(&Point3::origin()),
            intensity,
        }
    }
}

impl Light for PointLight {
    fn sample(&self, _scene: &Scene, x: &Point3, _u: Point2) -> LightSample {
        let to_light = self.position - *x;
        let dist_sqr = to_light.squared_length();
        let dist = dist_sqr.sqrt();
        LightSample {
            intensity: self.intensity / dist_sqr,
            wi: to_light / dist,
            dist,
            pdf: 1.0_f32,
        }
    }

    fn is_delta(&self) -> bool {
        true
    }
}

/// Parallel emitter arriving from a fixed direction.
pub struct DirectionalLight {
    direction: Vector3,
    intensity: Color3,
}

impl DirectionalLight {
    pub fn new(intensity: Color3, direction: Vector3, transform: &Transform) -> DirectionalLight {
        DirectionalLight {
            direction: transform.vector(&direction.normalized()).normalized(),
            intensity,
        }
    }
}

impl Light for DirectionalLight {
    fn sample(&self, _scene: &Scene, _x: &Point3, _u: Point2) -> LightSample {
        LightSample {
            intensity: self.intensity,
            wi: -self.direction,
            dist: f32::INFINITY,
            pdf: 1.0_f32,
        }
    }

    fn is_delta(&self) -> bool {
        true
    }
}

/// Emitter attached to a scene shape. The shape is referenced by index
/// into the scene's shape table; the scene wires the two together when
/// it is built.
pub struct AreaLight {
    radiance: Color3,
    two_sided: bool,
    shape: usize,
}

impl AreaLight {
    pub fn new(radiance: Color3, two_sided: bool, shape: usize) -> AreaLight {
        AreaLight {
            radiance,
            two_sided,
            shape,
        }
    }
}

impl Light for AreaLight {
    fn sample(&self, scene: &Scene, x: &Point3, u: Point2) -> LightSample {
        let shape_sample = match scene.shapes()[self.shape].sample(u) {
            Ok(s) => s,
            Err(_) => return LightSample::failed(Vector3::zero(), f32::INFINITY),
        };

        let to_light = shape_sample.p - *x;
        let dist_sqr = to_light.squared_length();
        let dist = dist_sqr.sqrt();
        if dist < EPSILON {
            return LightSample::failed(Vector3::zero(), dist);
        }
        let wi = to_light / dist;

        // Cosine at the emitter converts the area density to solid
        // angle; a grazing sample carries no usable density.
        let cos_at_light = shape_sample.n.dot(-wi);
        if cos_at_light.abs() < EPSILON {
            return LightSample::failed(wi, dist);
        }

        let intensity = if cos_at_light > 0.0_f32 || self.two_sided {
            self.radiance
        } else {
            Color3::black()
        };

        LightSample {
            intensity,
            wi,
            dist,
            pdf: shape_sample.pdf * dist_sqr / cos_at_light.abs(),
        }
    }

    fn is_delta(&self) -> bool {
        false
    }

    fn shape(&self) -> Option<usize> {
        Some(self.shape)
    }
}

/// Environment emitter wrapping the scene in an equirectangular light
/// probe.
pub struct InfiniteLight {
    probe: LightProbe,
    transform: Transform,
}

impl InfiniteLight {
    pub fn new(probe: LightProbe, transform: Transform) -> InfiniteLight {
        InfiniteLight { probe, transform }
    }
}

impl Light for InfiniteLight {
    fn sample(&self, _scene: &Scene, _x: &Point3, u: Point2) -> LightSample {
        let theta = u.y() * PI;
        let phi = u.x() * 2.0_f32 * PI;
        let sin_theta = theta.sin();

        // Probe axes: theta from the +Y pole, phi = atan2(x, z).
        let local = Vector3::new(
            sin_theta * phi.sin(),
            theta.cos(),
            sin_theta * phi.cos(),
        );

        // Near the poles the mapping degenerates; report a zero pdf
        // and let the caller discard the sample.
        let pdf = if sin_theta > EPSILON {
            1.0_f32 / (2.0_f32 * PI * PI * sin_theta)
        } else {
            0.0_f32
        };

        LightSample {
            intensity: self.probe.intensity(local),
            wi: self.transform.vector(&local).normalized(),
            dist: f32::INFINITY,
            pdf,
        }
    }

    fn intensity(&self, direction: Vector3) -> Color3 {
        self.probe.intensity(self.transform.inv_vector(&direction))
    }

    fn is_delta(&self) -> bool {
        false
    }

    fn is_infinite(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bsdf::{Diffuse, SyncBsdf};
    use crate::camera::{Camera, CameraDescription};
    use crate::color::Color3;
    use crate::integrator::Flat;
    use crate::matrix::Matrix4;
    use crate::sampler::Independent;
    use crate::scene::Scene;
    use crate::shape::{Quad, SyncShape};
    use crate::texture::LightProbe;
    use std::f32::consts::PI;
    use std::sync::Arc;

    fn scene_with(shapes: Vec<Box<SyncShape>>) -> Scene {
        let camera = Camera::new(CameraDescription {
            fov: 45.0,
            near_clip: 1e-4,
            far_clip: 1e4,
            width: 4,
            height: 4,
            to_world: None,
            rfilter: None,
        })
        .unwrap();
        Scene::new(
            camera,
            Box::new(Flat {}),
            Box::new(Independent::new(1)),
            shapes,
            Vec::new(),
            None,
            Color3::black(),
        )
    }

    fn bsdf() -> Arc<SyncBsdf> {
        Arc::new(Diffuse::default_grey())
    }

    /// 2x2 quad at z = 2 whose emitting side faces the origin.
    fn emitter_quad() -> Box<SyncShape> {
        Box::new(Quad::new(
            Some(Point2::new(2.0, 2.0)),
            Transform::new(
                Matrix4::translation(&Vector3::new(0.0, 0.0, 2.0))
                    * Matrix4::rotation_x(PI),
            )
            .unwrap(),
            bsdf(),
        ))
    }

    #[test]
    fn point_light_falls_off_with_the_squared_distance() {
        let scene = scene_with(Vec::new());
        let light = PointLight::new(
            Color3::grey(9.0),
            &Transform::new(Matrix4::translation(&Vector3::new(0.0, 3.0, 0.0))).unwrap(),
        );
        let sample = light.sample(&scene, &Point3::origin(), Point2::zero());
        assert_eq!(sample.pdf, 1.0);
        assert!((sample.dist - 3.0).abs() < 1e-5);
        assert!((sample.intensity.r() - 1.0).abs() < 1e-5);
        assert!((sample.wi.y() - 1.0).abs() < 1e-5);
        assert!(light.is_delta());
    }

    #[test]
    fn directional_light_arrives_from_infinity() {
        let scene = scene_with(Vec::new());
        let light = DirectionalLight::new(
            Color3::grey(2.0),
            Vector3::new(0.0, -1.0, 0.0),
            &Transform::identity(),
        );
        let sample = light.sample(&scene, &Point3::origin(), Point2::zero());
        assert_eq!(sample.pdf, 1.0);
        assert!(sample.dist.is_infinite());
        assert!((sample.wi.y() - 1.0).abs() < 1e-5);
        assert!(light.is_delta());
    }

    #[test]
    fn area_light_converts_area_density_to_solid_angle() {
        let scene = scene_with(vec![emitter_quad()]);
        let radiance = Color3::new(3.0, 2.0, 1.0);
        let light = AreaLight::new(radiance, false, 0);

        // The center sample: distance 2, emitter cosine 1, area 4.
        let sample = light.sample(&scene, &Point3::origin(), Point2::new(0.5, 0.5));
        assert!((sample.dist - 2.0).abs() < 1e-5);
        assert!((sample.pdf - (0.25 * 4.0)).abs() < 1e-4);
        assert_eq!(sample.intensity, radiance);
        assert!(!light.is_delta());
        assert_eq!(light.shape(), Some(0));
    }

    #[test]
    fn one_sided_area_light_is_dark_from_behind() {
        let scene = scene_with(vec![emitter_quad()]);
        let behind = Point3::new(0.0, 0.0, 4.0);

        let one_sided = AreaLight::new(Color3::white(), false, 0);
        let sample = one_sided.sample(&scene, &behind, Point2::new(0.5, 0.5));
        assert!(sample.intensity.is_black());
        // The density itself is still well defined.
        assert!(sample.pdf > 0.0);

        let two_sided = AreaLight::new(Color3::white(), true, 0);
        let sample = two_sided.sample(&scene, &behind, Point2::new(0.5, 0.5));
        assert_eq!(sample.intensity, Color3::white());
    }

    #[test]
    fn infinite_light_pole_samples_report_zero_pdf() {
        let scene = scene_with(Vec::new());
        let light = InfiniteLight::new(
            LightProbe::constant(Color3::grey(0.5)),
            Transform::identity(),
        );

        // theta = 0: the equirectangular mapping degenerates.
        let pole = light.sample(&scene, &Point3::origin(), Point2::new(0.3, 0.0));
        assert_eq!(pole.pdf, 0.0);

        // At the equator the density is 1 / (2 pi^2).
        let equator = light.sample(&scene, &Point3::origin(), Point2::new(0.25, 0.5));
        assert!((equator.pdf - 1.0 / (2.0 * PI * PI)).abs() < 1e-6);
        assert!(equator.dist.is_infinite());
        assert!((equator.wi.x() - 1.0).abs() < 1e-4);
        assert!(light.is_infinite());
    }
}
