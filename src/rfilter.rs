use serde::Deserialize;

/// Reconstruction filter used to splat radiance samples into pixels.
/// All filters are separable; `eval` is the 1D profile.
#[typetag::deserialize]
pub trait ReconstructionFilter: Send + Sync {
    fn radius(&self) -> f32;
    fn eval(&self, x: f32) -> f32;
}

/// Unit-pixel box filter, mostly useful for debugging since it never
/// blurs across pixels.
#[derive(Deserialize)]
pub struct BoxFilter {}

#[typetag::deserialize(name = "box")]
impl ReconstructionFilter for BoxFilter {
    fn radius(&self) -> f32 {
        0.5_f32
    }

    fn eval(&self, _x: f32) -> f32 {
        1.0_f32
    }
}

#[derive(Deserialize)]
pub struct TentFilter {}

#[typetag::deserialize(name = "tent")]
impl ReconstructionFilter for TentFilter {
    fn radius(&self) -> f32 {
        1.0_f32
    }

    fn eval(&self, x: f32) -> f32 {
        (1.0_f32 - x.abs()).max(0.0_f32)
    }
}

/// Truncated Gaussian, offset so it falls to zero at the radius.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GaussianFilter {
    #[serde(default = "GaussianFilter::default_stddev")]
    stddev: f32,
    #[serde(default = "GaussianFilter::default_radius")]
    radius: f32,
}

impl GaussianFilter {
    fn default_stddev() -> f32 {
        0.5_f32
    }

    fn default_radius() -> f32 {
        2.0_f32
    }
}

impl Default for GaussianFilter {
    fn default() -> GaussianFilter {
        GaussianFilter {
            stddev: GaussianFilter::default_stddev(),
            radius: GaussianFilter::default_radius(),
        }
    }
}

#[typetag::deserialize(name = "gaussian")]
impl ReconstructionFilter for GaussianFilter {
    fn radius(&self) -> f32 {
        self.radius
    }

    fn eval(&self, x: f32) -> f32 {
        let alpha = -1.0_f32 / (2.0_f32 * self.stddev * self.stddev);
        ((x * x * alpha).exp() - (self.radius * self.radius * alpha).exp()).max(0.0_f32)
    }
}

/// Mitchell-Netravali cubic.
#[derive(Deserialize)]
pub struct MitchellFilter {
    #[serde(default = "MitchellFilter::default_b")]
    b: f32,
    #[serde(default = "MitchellFilter::default_c")]
    c: f32,
    #[serde(default = "MitchellFilter::default_radius")]
    radius: f32,
}

impl MitchellFilter {
    fn default_b() -> f32 {
        1.0_f32 / 3.0_f32
    }

    fn default_c() -> f32 {
        1.0_f32 / 3.0_f32
    }

    fn default_radius() -> f32 {
        2.0_f32
    }
}

#[typetag::deserialize(name = "mitchell")]
impl ReconstructionFilter for MitchellFilter {
    fn radius(&self) -> f32 {
        self.radius
    }

    fn eval(&self, x: f32) -> f32 {
        let x = (2.0_f32 * x / self.radius).abs();
        let x2 = x * x;
        let x3 = x2 * x;
        let (b, c) = (self.b, self.c);
        if x < 1.0_f32 {
            ((12.0_f32 - 9.0_f32 * b - 6.0_f32 * c) * x3
                + (-18.0_f32 + 12.0_f32 * b + 6.0_f32 * c) * x2
                + (6.0_f32 - 2.0_f32 * b))
                / 6.0_f32
        } else if x < 2.0_f32 {
            ((-b - 6.0_f32 * c) * x3
                + (6.0_f32 * b + 30.0_f32 * c) * x2
                + (-12.0_f32 * b - 48.0_f32 * c) * x
                + (8.0_f32 * b + 24.0_f32 * c))
                / 6.0_f32
        } else {
            0.0_f32
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profiles_vanish_at_the_radius() {
        let filters: Vec<Box<dyn ReconstructionFilter>> = vec![
            Box::new(TentFilter {}),
            Box::new(GaussianFilter::default()),
            Box::new(MitchellFilter {
                b: 1.0 / 3.0,
                c: 1.0 / 3.0,
                radius: 2.0,
            }),
        ];
        for f in &filters {
            assert!(f.eval(0.0) > 0.0);
            assert!(f.eval(f.radius()).abs() < 1e-4);
        }
    }

    #[test]
    fn deserializes_by_class_tag() {
        let f: Box<dyn ReconstructionFilter> =
            serde_json::from_str(r#"{"gaussian": {"stddev": 0.25, "radius": 1.5}}"#).unwrap();
        assert_eq!(f.radius(), 1.5);
        let f: Box<dyn ReconstructionFilter> = serde_json::from_str(r#"{"box": {}}"#).unwrap();
        assert_eq!(f.radius(), 0.5);
    }
}
