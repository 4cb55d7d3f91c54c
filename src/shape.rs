use crate::bsdf::SyncBsdf;
use crate::bvh::Aabb;
use crate::error::{Error, Result};
use crate::frame::Frame;
use crate::point::Point3;
use crate::ray::{Hit, Ray};
use crate::transform::Transform;
use crate::utils::{clamp, EPSILON, INV_TWOPI};
use crate::vector::{Point2, Vector3};
use crate::warp;

use std::f32;
use std::f32::consts::PI;
use std::sync::Arc;

/// A point sampled uniformly on a shape's surface: world-space
/// position, normal, and the area-measure density.
pub struct ShapeSample {
    pub p: Point3,
    pub n: Vector3,
    pub pdf: f32,
}

/// Geometry plus appearance. Intersection happens in the shape's local
/// coordinates; the scene owns the conversion to and from world space.
pub trait Shape {
    /// Nearest intersection along a shape-local ray that is closer
    /// than the incoming `hit.t`. Shadow rays may return on the first
    /// qualifying hit without filling the frame or UV.
    fn intersect(&self, ray: &Ray, hit: &mut Hit) -> bool;

    /// World-space axis-aligned bounds.
    fn bounding_box(&self) -> Aabb;

    /// Surface area used for light sampling.
    fn area(&self) -> f32;

    /// Uniform area sample in world space.
    fn sample(&self, sample: Point2) -> Result<ShapeSample>;

    fn transform(&self) -> &Transform;

    fn bsdf(&self) -> &Arc<SyncBsdf>;

    /// Index of the attached area light in the scene's light table.
    fn area_light(&self) -> Option<usize>;
    fn set_area_light(&mut self, light: usize);

    /// Whether area sampling is meaningful for this shape.
    fn can_sample_area(&self) -> bool {
        true
    }
}

pub type SyncShape = dyn Shape + Send + Sync;

/// Origin-centered sphere of the given radius.
pub struct Sphere {
    radius: f32,
    transform: Transform,
    bsdf: Arc<SyncBsdf>,
    area_light: Option<usize>,
}

impl Sphere {
    pub fn new(radius: f32, transform: Transform, bsdf: Arc<SyncBsdf>) -> Sphere {
        Sphere {
            radius,
            transform,
            bsdf,
            area_light: None,
        }
    }
}

impl Shape for Sphere {
    fn intersect(&self, ray: &Ray, hit: &mut Hit) -> bool {
        let towards_origin = ray.origin - Point3::origin();
        let a = ray.direction.dot(ray.direction);
        let b = 2.0_f32 * towards_origin.dot(ray.direction);
        let c = towards_origin.dot(towards_origin) - self.radius * self.radius;
        let discriminant = b * b - 4.0_f32 * a * c;
        if discriminant < 0.0_f32 {
            return false;
        }

        // A tangent ray (zero discriminant) collapses both roots.
        let sqrt_discriminant = discriminant.sqrt();
        let mut t = (-b - sqrt_discriminant) / (2.0_f32 * a);
        if t < EPSILON || t >= hit.t {
            t = (-b + sqrt_discriminant) / (2.0_f32 * a);
        }
        if t < EPSILON || t >= hit.t {
            return false;
        }

        hit.t = t;
        if ray.shadow {
            return true;
        }

        let point = ray.at(t);
        let normal = (point.to_vector() / self.radius).normalized();
        hit.local_frame = Frame::from_normal(normal);

        let mut phi = point.y().atan2(point.x());
        if phi < 0.0_f32 {
            phi += 2.0_f32 * PI;
        }
        let theta = clamp(point.z() / self.radius, -1.0_f32, 1.0_f32).acos();
        hit.uv = Point2::new(phi / (2.0_f32 * PI), theta / PI);
        true
    }

    fn bounding_box(&self) -> Aabb {
        let r = Vector3::new(self.radius, self.radius, self.radius);
        self.transform.aabb(&Aabb::new(
            Point3::origin() - r,
            Point3::origin() + r,
        ))
    }

    fn area(&self) -> f32 {
        4.0_f32 * PI * self.radius * self.radius
    }

    fn sample(&self, sample: Point2) -> Result<ShapeSample> {
        let dir = warp::square_to_uniform_sphere(sample);
        let local = Point3::origin() + dir * self.radius;
        Ok(ShapeSample {
            p: self.transform.point(&local),
            n: self.transform.normal(&dir).normalized(),
            pdf: 1.0_f32 / self.area(),
        })
    }

    fn transform(&self) -> &Transform {
        &self.transform
    }

    fn bsdf(&self) -> &Arc<SyncBsdf> {
        &self.bsdf
    }

    fn area_light(&self) -> Option<usize> {
        self.area_light
    }

    fn set_area_light(&mut self, light: usize) {
        self.area_light = Some(light);
    }
}

/// Quad in the Z = 0 plane facing +Z; without a size it extends to
/// infinity.
pub struct Quad {
    size: Option<Point2>,
    transform: Transform,
    bsdf: Arc<SyncBsdf>,
    area_light: Option<usize>,
}

impl Quad {
    pub fn new(size: Option<Point2>, transform: Transform, bsdf: Arc<SyncBsdf>) -> Quad {
        Quad {
            size,
            transform,
            bsdf,
            area_light: None,
        }
    }
}

impl Shape for Quad {
    fn intersect(&self, ray: &Ray, hit: &mut Hit) -> bool {
        // Direction in the plane means no crossing at all.
        if ray.direction.z() == 0.0_f32 {
            return false;
        }

        let t = -ray.origin.z() / ray.direction.z();
        if t <= EPSILON || t >= hit.t {
            return false;
        }

        let pos = ray.at(t);
        if let Some(size) = &self.size {
            if pos.x() < -size.x() * 0.5_f32
                || pos.x() > size.x() * 0.5_f32
                || pos.y() < -size.y() * 0.5_f32
                || pos.y() > size.y() * 0.5_f32
            {
                return false;
            }
        }

        hit.t = t;
        if ray.shadow {
            return true;
        }

        hit.local_frame = Frame::from_normal(Vector3::new(0.0_f32, 0.0_f32, 1.0_f32));
        hit.uv = match &self.size {
            Some(size) => Point2::new(
                pos.x() / size.x() + 0.5_f32,
                pos.y() / size.y() + 0.5_f32,
            ),
            None => Point2::new(pos.x(), pos.y()),
        };
        true
    }

    fn bounding_box(&self) -> Aabb {
        match &self.size {
            Some(size) => self.transform.aabb(&Aabb::new(
                Point3::new(-size.x() * 0.5_f32, -size.y() * 0.5_f32, 0.0_f32),
                Point3::new(size.x() * 0.5_f32, size.y() * 0.5_f32, 0.0_f32),
            )),
            None => Aabb::new(
                Point3::new(-f32::MAX, -f32::MAX, -f32::MAX),
                Point3::new(f32::MAX, f32::MAX, f32::MAX),
            ),
        }
    }

    fn area(&self) -> f32 {
        match &self.size {
            Some(size) => size.x() * size.y(),
            None => f32::INFINITY,
        }
    }

    fn sample(&self, sample: Point2) -> Result<ShapeSample> {
        let size = match &self.size {
            Some(size) => size,
            None => {
                return Err(Error::Geometry(String::from(
                    "Cannot sample a point on an infinite plane.",
                )))
            }
        };
        let local = Point3::new(
            (sample.x() - 0.5_f32) * size.x(),
            (sample.y() - 0.5_f32) * size.y(),
            0.0_f32,
        );
        Ok(ShapeSample {
            p: self.transform.point(&local),
            n: self
                .transform
                .normal(&Vector3::new(0.0_f32, 0.0_f32, 1.0_f32))
                .normalized(),
            pdf: 1.0_f32 / self.area(),
        })
    }

    fn transform(&self) -> &Transform {
        &self.transform
    }

    fn bsdf(&self) -> &Arc<SyncBsdf> {
        &self.bsdf
    }

    fn area_light(&self) -> Option<usize> {
        self.area_light
    }

    fn set_area_light(&mut self, light: usize) {
        self.area_light = Some(light);
    }

    fn can_sample_area(&self) -> bool {
        self.size.is_some()
    }
}

/// Disk of the given radius in the Z = 0 plane facing +Z.
pub struct Disk {
    radius: f32,
    transform: Transform,
    bsdf: Arc<SyncBsdf>,
    area_light: Option<usize>,
}

impl Disk {
    pub fn new(radius: f32, transform: Transform, bsdf: Arc<SyncBsdf>) -> Disk {
        Disk {
            radius,
            transform,
            bsdf,
            area_light: None,
        }
    }
}

impl Shape for Disk {
    fn intersect(&self, ray: &Ray, hit: &mut Hit) -> bool {
        if ray.direction.z() == 0.0_f32 {
            return false;
        }

        let t = -ray.origin.z() / ray.direction.z();
        if t <= EPSILON || t >= hit.t {
            return false;
        }

        let pos = ray.at(t);
        let dist_sqr = pos.x() * pos.x() + pos.y() * pos.y();
        if dist_sqr > self.radius * self.radius {
            return false;
        }

        hit.t = t;
        if ray.shadow {
            return true;
        }

        hit.local_frame = Frame::from_normal(Vector3::new(0.0_f32, 0.0_f32, 1.0_f32));

        let mut phi = pos.y().atan2(pos.x());
        if phi < 0.0_f32 {
            phi += 2.0_f32 * PI;
        }
        // Radial coordinate runs from 1 at the center to 0 at the rim.
        hit.uv = Point2::new(
            phi * INV_TWOPI,
            (self.radius - dist_sqr.sqrt()) / self.radius,
        );
        true
    }

    fn bounding_box(&self) -> Aabb {
        self.transform.aabb(&Aabb::new(
            Point3::new(-self.radius, -self.radius, 0.0_f32),
            Point3::new(self.radius, self.radius, 0.0_f32),
        ))
    }

    fn area(&self) -> f32 {
        PI * self.radius * self.radius
    }

    fn sample(&self, sample: Point2) -> Result<ShapeSample> {
        let pos = warp::square_to_uniform_disk(sample);
        let local = Point3::new(pos.x() * self.radius, pos.y() * self.radius, 0.0_f32);
        Ok(ShapeSample {
            p: self.transform.point(&local),
            n: self
                .transform
                .normal(&Vector3::new(0.0_f32, 0.0_f32, 1.0_f32))
                .normalized(),
            pdf: 1.0_f32 / self.area(),
        })
    }

    fn transform(&self) -> &Transform {
        &self.transform
    }

    fn bsdf(&self) -> &Arc<SyncBsdf> {
        &self.bsdf
    }

    fn area_light(&self) -> Option<usize> {
        self.area_light
    }

    fn set_area_light(&mut self, light: usize) {
        self.area_light = Some(light);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bsdf::Diffuse;

    fn bsdf() -> Arc<SyncBsdf> {
        Arc::new(Diffuse::default_grey())
    }

    fn sphere(radius: f32) -> Sphere {
        Sphere::new(radius, Transform::identity(), bsdf())
    }

    #[test]
    fn sphere_hits_from_outside() {
        let s = sphere(1.0);
        let ray = Ray::new(Point3::new(0.0, 0.0, -3.0), Vector3::new(0.0, 0.0, 1.0));
        let mut hit = Hit::none();
        assert!(s.intersect(&ray, &mut hit));
        assert!((hit.t - 2.0).abs() < 1e-4);
        // Normal faces the ray origin.
        assert!((hit.local_frame.n.z() + 1.0).abs() < 1e-4);
    }

    #[test]
    fn sphere_hits_from_inside_with_larger_root() {
        let s = sphere(1.0);
        let ray = Ray::new(Point3::origin(), Vector3::new(0.0, 0.0, 1.0));
        let mut hit = Hit::none();
        assert!(s.intersect(&ray, &mut hit));
        assert!((hit.t - 1.0).abs() < 1e-4);
    }

    #[test]
    fn sphere_tangent_ray_reports_the_single_root() {
        let s = sphere(1.0);
        let ray = Ray::new(Point3::new(1.0, 0.0, -3.0), Vector3::new(0.0, 0.0, 1.0));
        let mut hit = Hit::none();
        assert!(s.intersect(&ray, &mut hit));
        assert!((hit.t - 3.0).abs() < 1e-3);
    }

    #[test]
    fn sphere_respects_the_incoming_bound() {
        let s = sphere(1.0);
        let ray = Ray::new(Point3::new(0.0, 0.0, -3.0), Vector3::new(0.0, 0.0, 1.0));
        let mut hit = Hit::none();
        hit.t = 1.5; // something closer was already found
        assert!(!s.intersect(&ray, &mut hit));
        assert_eq!(hit.t, 1.5);
    }

    #[test]
    fn sphere_uv_covers_the_parameterization() {
        let s = sphere(1.0);
        // Hit the north pole: theta = 0.
        let ray = Ray::new(Point3::new(0.0, 0.0, 3.0), Vector3::new(0.0, 0.0, -1.0));
        let mut hit = Hit::none();
        assert!(s.intersect(&ray, &mut hit));
        assert!(hit.uv.y() < 1e-3);
    }

    #[test]
    fn quad_parallel_ray_misses() {
        let q = Quad::new(
            Some(Point2::new(2.0, 2.0)),
            Transform::identity(),
            bsdf(),
        );
        let ray = Ray::new(Point3::new(0.0, 0.0, 1.0), Vector3::new(1.0, 0.0, 0.0));
        let mut hit = Hit::none();
        assert!(!q.intersect(&ray, &mut hit));
    }

    #[test]
    fn quad_clips_to_its_extent_and_normalizes_uv() {
        let q = Quad::new(
            Some(Point2::new(2.0, 4.0)),
            Transform::identity(),
            bsdf(),
        );
        let mut hit = Hit::none();
        let inside = Ray::new(Point3::new(0.5, -1.0, 2.0), Vector3::new(0.0, 0.0, -1.0));
        assert!(q.intersect(&inside, &mut hit));
        assert!((hit.uv.x() - 0.75).abs() < 1e-5);
        assert!((hit.uv.y() - 0.25).abs() < 1e-5);

        let outside = Ray::new(Point3::new(1.5, 0.0, 2.0), Vector3::new(0.0, 0.0, -1.0));
        let mut hit = Hit::none();
        assert!(!q.intersect(&outside, &mut hit));
    }

    #[test]
    fn infinite_quad_hits_everywhere_but_cannot_be_sampled() {
        let q = Quad::new(None, Transform::identity(), bsdf());
        let ray = Ray::new(Point3::new(1e4, -1e4, 1.0), Vector3::new(0.0, 0.0, -1.0));
        let mut hit = Hit::none();
        assert!(q.intersect(&ray, &mut hit));
        assert!(!q.can_sample_area());
        assert!(q.sample(Point2::new(0.5, 0.5)).is_err());
    }

    #[test]
    fn disk_checks_the_radius() {
        let d = Disk::new(1.0, Transform::identity(), bsdf());
        let inside = Ray::new(Point3::new(0.5, 0.0, 1.0), Vector3::new(0.0, 0.0, -1.0));
        let mut hit = Hit::none();
        assert!(d.intersect(&inside, &mut hit));
        // v = (r - dist) / r at dist 0.5
        assert!((hit.uv.y() - 0.5).abs() < 1e-5);

        let outside = Ray::new(Point3::new(1.5, 0.0, 1.0), Vector3::new(0.0, 0.0, -1.0));
        let mut hit = Hit::none();
        assert!(!d.intersect(&outside, &mut hit));
    }

    #[test]
    fn area_samples_have_uniform_density() {
        let q = Quad::new(
            Some(Point2::new(2.0, 3.0)),
            Transform::identity(),
            bsdf(),
        );
        let s = q.sample(Point2::new(0.25, 0.5)).unwrap();
        assert!((s.pdf - 1.0 / 6.0).abs() < 1e-5);
        assert!((s.p.x() + 0.5).abs() < 1e-5);

        let d = Disk::new(2.0, Transform::identity(), bsdf());
        let s = d.sample(Point2::new(0.3, 0.7)).unwrap();
        assert!((s.pdf - 1.0 / (PI * 4.0)).abs() < 1e-5);
        assert!(s.p.x() * s.p.x() + s.p.y() * s.p.y() <= 4.0 + 1e-4);
    }
}
