use crate::vector::Vector3;

/// Orthonormal shading frame. `n` is the normal, `s`/`t` span the
/// tangent plane, and local coordinates put the normal on +Z.
#[derive(Debug, Clone, Copy)]
pub struct Frame {
    pub s: Vector3,
    pub t: Vector3,
    pub n: Vector3,
}

impl Frame {
    pub fn new(s: Vector3, t: Vector3, n: Vector3) -> Frame {
        Frame { s, t, n }
    }

    /// Completes a frame around a unit normal, after Duff et al.
    pub fn from_normal(n: Vector3) -> Frame {
        let s = if n.x().abs() > n.y().abs() {
            let inv_len = 1.0_f32 / (n.x() * n.x() + n.z() * n.z()).sqrt();
            Vector3::new(n.z() * inv_len, 0.0_f32, -n.x() * inv_len)
        } else {
            let inv_len = 1.0_f32 / (n.y() * n.y() + n.z() * n.z()).sqrt();
            Vector3::new(0.0_f32, n.z() * inv_len, -n.y() * inv_len)
        };
        let t = n.cross(s);
        Frame { s, t, n }
    }

    pub fn identity() -> Frame {
        Frame {
            s: Vector3::new(1.0, 0.0, 0.0),
            t: Vector3::new(0.0, 1.0, 0.0),
            n: Vector3::new(0.0, 0.0, 1.0),
        }
    }

    pub fn to_local(&self, v: Vector3) -> Vector3 {
        Vector3::new(v.dot(self.s), v.dot(self.t), v.dot(self.n))
    }

    pub fn to_world(&self, v: Vector3) -> Vector3 {
        self.s * v.x() + self.t * v.y() + self.n * v.z()
    }

    /// Cosine of the angle between a local direction and the normal.
    pub fn cos_theta(v: Vector3) -> f32 {
        v.z()
    }

    /// Mirror a local direction about the normal.
    pub fn reflect(wi: Vector3) -> Vector3 {
        Vector3::new(-wi.x(), -wi.y(), wi.z())
    }

    /// Refract a local direction given the (signed) transmitted cosine
    /// and the relative index of refraction.
    pub fn refract(wi: Vector3, cos_theta_t: f32, eta: f32) -> Vector3 {
        let scale = -(if cos_theta_t < 0.0_f32 {
            1.0_f32 / eta
        } else {
            eta
        });
        Vector3::new(scale * wi.x(), scale * wi.y(), cos_theta_t)
    }
}
