/// Phong material coefficients.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct MaterialProperties {
    pub ambient: f32,
    pub diffuse: f32,
    pub specular: f32,
    pub specular_power: f32,
}

impl MaterialProperties {
    pub const fn new(ambient: f32, diffuse: f32, specular: f32, specular_power: f32) -> Self {
        Self {
            ambient,
            diffuse,
            specular,
            specular_power,
        }
    }

    /// Packed as `(ambient, diffuse, specular, power)`.
    #[inline]
    pub fn to_array(self) -> [f32; 4] {
        [self.ambient, self.diffuse, self.specular, self.specular_power]
    }
}

impl Default for MaterialProperties {
    fn default() -> Self {
        Self::new(0.3, 1.0, 1.0, 6.0)
    }
}
