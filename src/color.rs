use crate::base::BasicThreeTuple;

use serde::Deserialize;
use std::convert;
use std::ops;

/// Linear HDR RGB value.
#[derive(Deserialize, Debug, PartialEq)]
#[serde(try_from = "Vec<f32>")]
pub struct Color3(pub BasicThreeTuple<f32>);

impl Copy for Color3 {}
impl Clone for Color3 {
    fn clone(&self) -> Color3 {
        *self
    }
}

impl Color3 {
    pub fn new(r: f32, g: f32, b: f32) -> Color3 {
        Color3(BasicThreeTuple::new(r, g, b))
    }

    pub fn black() -> Color3 {
        Color3(BasicThreeTuple::new(0_f32, 0_f32, 0_f32))
    }

    pub fn grey(v: f32) -> Color3 {
        Color3(BasicThreeTuple::new(v, v, v))
    }

    pub fn white() -> Color3 {
        Color3::grey(1_f32)
    }

    pub fn r(&self) -> f32 {
        self.0.x
    }
    pub fn g(&self) -> f32 {
        self.0.y
    }
    pub fn b(&self) -> f32 {
        self.0.z
    }

    pub fn mean(&self) -> f32 {
        (self.r() + self.g() + self.b()) / 3.0_f32
    }

    pub fn max_coeff(&self) -> f32 {
        self.r().max(self.g()).max(self.b())
    }

    pub fn luminance(&self) -> f32 {
        self.r() * 0.212671_f32 + self.g() * 0.715160_f32 + self.b() * 0.072169_f32
    }

    pub fn is_black(&self) -> bool {
        self.r() == 0_f32 && self.g() == 0_f32 && self.b() == 0_f32
    }

    /// A radiance estimate is usable when every channel is finite
    /// and non-negative.
    pub fn is_valid(&self) -> bool {
        let ok = |v: f32| v.is_finite() && v >= 0_f32;
        ok(self.r()) && ok(self.g()) && ok(self.b())
    }

    /// Linear -> sRGB, applied channel-wise when tonemapping for
    /// 8-bit output.
    pub fn to_srgb(&self) -> Color3 {
        let conv = |v: f32| {
            if v <= 0.0031308_f32 {
                v * 12.92_f32
            } else {
                1.055_f32 * v.powf(1.0_f32 / 2.4_f32) - 0.055_f32
            }
        };
        Color3::new(conv(self.r()), conv(self.g()), conv(self.b()))
    }

    /// sRGB -> linear, applied when reading 8-bit texture sources.
    pub fn to_linear(&self) -> Color3 {
        let conv = |v: f32| {
            if v <= 0.04045_f32 {
                v / 12.92_f32
            } else {
                ((v + 0.055_f32) / 1.055_f32).powf(2.4_f32)
            }
        };
        Color3::new(conv(self.r()), conv(self.g()), conv(self.b()))
    }
}

impl ops::Add for Color3 {
    type Output = Color3;
    fn add(self, rhs: Color3) -> Color3 {
        Color3(self.0.add(rhs.0))
    }
}

impl ops::AddAssign for Color3 {
    fn add_assign(&mut self, rhs: Color3) {
        *self = *self + rhs;
    }
}

impl ops::Mul for Color3 {
    type Output = Color3;
    fn mul(self, rhs: Color3) -> Color3 {
        Color3(self.0.mul(rhs.0))
    }
}

impl ops::Mul<f32> for Color3 {
    type Output = Color3;
    fn mul(self, rhs: f32) -> Color3 {
        Color3(self.0.mul(rhs))
    }
}

impl ops::Mul<Color3> for f32 {
    type Output = Color3;
    fn mul(self, rhs: Color3) -> Color3 {
        rhs * self
    }
}

impl ops::Div<f32> for Color3 {
    type Output = Color3;
    fn div(self, rhs: f32) -> Color3 {
        Color3(self.0.div(rhs))
    }
}

impl convert::TryFrom<Vec<f32>> for Color3 {
    type Error = &'static str;

    fn try_from(vec: Vec<f32>) -> Result<Self, Self::Error> {
        match vec.len() {
            // A single float is accepted as a grey value.
            1 => Ok(Color3::grey(vec[0])),
            3 => Ok(Color3::new(vec[0], vec[1], vec[2])),
            _ => Err("Deserializing in to Color3 requires a Vec of length 1 or 3!"),
        }
    }
}
