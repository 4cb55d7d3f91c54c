use crate::frame::Frame;
use crate::point::Point3;
use crate::vector::{Point2, Vector3};

use std::f32;

pub struct Ray {
    pub origin: Point3,
    pub direction: Vector3,
    /// Recursion level, used as a stopping criterion by the
    /// Whitted integrator.
    pub depth: u32,
    /// Shadow rays only test occlusion; shapes may skip frame and
    /// texture coordinate computation for them.
    pub shadow: bool,
}

impl Ray {
    pub fn new(origin: Point3, direction: Vector3) -> Ray {
        Ray {
            origin,
            direction,
            depth: 0,
            shadow: false,
        }
    }

    pub fn shadow_ray(origin: Point3, direction: Vector3) -> Ray {
        Ray {
            origin,
            direction,
            depth: 0,
            shadow: true,
        }
    }

    pub fn child(&self, origin: Point3, direction: Vector3) -> Ray {
        Ray {
            origin,
            direction,
            depth: self.depth + 1,
            shadow: false,
        }
    }

    pub fn at(&self, t: f32) -> Point3 {
        self.origin + (self.direction * t)
    }
}

/// Record of the nearest intersection found so far along a ray.
///
/// `t` starts at infinity; an intersection routine only writes the
/// record when it finds something strictly closer.
pub struct Hit {
    /// Unoccluded distance along the ray.
    pub t: f32,
    /// Texture coordinates, if any.
    pub uv: Point2,
    /// Shading frame at the hit point.
    pub local_frame: Frame,
    /// Index of the intersected shape in the scene's shape table.
    pub shape: Option<usize>,
    /// Index of the intersected face for mesh shapes.
    pub face: Option<u32>,
}

impl Hit {
    pub fn none() -> Hit {
        Hit {
            t: f32::INFINITY,
            uv: Point2::zero(),
            local_frame: Frame::identity(),
            shape: None,
            face: None,
        }
    }

    pub fn found_intersection(&self) -> bool {
        self.t < f32::INFINITY
    }

    /// Transform a direction into the local shading frame.
    pub fn to_local(&self, d: Vector3) -> Vector3 {
        self.local_frame.to_local(d)
    }

    /// Transform a direction from the shading frame back to world space.
    pub fn to_world(&self, d: Vector3) -> Vector3 {
        self.local_frame.to_world(d)
    }
}
