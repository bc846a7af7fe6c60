/// Degenerate-length threshold for normalization.
pub const VEC_EPSILON: f64 = 1e-10;

#[derive(Debug, Copy, Clone, PartialEq, Default)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3::new(0.0, 0.0, 0.0);
    pub const X: Vec3 = Vec3::new(1.0, 0.0, 0.0);
    pub const Y: Vec3 = Vec3::new(0.0, 1.0, 0.0);
    pub const Z: Vec3 = Vec3::new(0.0, 0.0, 1.0);

    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn dot(self, other: Self) -> f64 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn cross(self, other: Self) -> Self {
        Self::new(
            self.y * other.z - self.z * other.y,
            self.z * other.x - self.x * other.z,
            self.x * other.y - self.y * other.x,
        )
    }

    pub fn length(self) -> f64 {
        self.dot(self).sqrt()
    }

    /// Unit vector in the same direction, or `None` when the length is
    /// below [`VEC_EPSILON`].
    pub fn try_normalize(self) -> Option<Self> {
        let n = self.length();
        if n > VEC_EPSILON && n.is_finite() {
            Some(self * (1.0 / n))
        } else {
            None
        }
    }

    /// Like [`Vec3::try_normalize`] but returns zero for degenerate input.
    pub fn normalize(self) -> Self {
        self.try_normalize().unwrap_or(Self::ZERO)
    }

    pub fn lerp(self, other: Self, t: f64) -> Self {
        self + (other - self) * t
    }

    pub fn midpoint(self, other: Self) -> Self {
        self.lerp(other, 0.5)
    }

    /// Angle between two directions in radians, in `[0, π]`.
    pub fn angle_between(self, other: Self) -> f64 {
        let (Some(a), Some(b)) = (self.try_normalize(), other.try_normalize()) else {
            return 0.0;
        };
        a.dot(b).clamp(-1.0, 1.0).acos()
    }

    /// Any unit vector perpendicular to `self`.
    pub fn any_perpendicular(self) -> Self {
        let ax = self.x.abs();
        let ay = self.y.abs();
        let az = self.z.abs();
        // Cross with the axis the vector is least aligned with.
        let axis = if ax <= ay && ax <= az {
            Self::X
        } else if ay <= az {
            Self::Y
        } else {
            Self::Z
        };
        self.cross(axis).normalize()
    }

    /// Rotation about +Y by `angle` radians (right-handed).
    pub fn rotate_y(self, angle: f64) -> Self {
        let (s, c) = angle.sin_cos();
        Self::new(self.x * c + self.z * s, self.y, -self.x * s + self.z * c)
    }

    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }

    pub fn to_f32_array(self) -> [f32; 3] {
        [self.x as f32, self.y as f32, self.z as f32]
    }
}

impl std::ops::Add for Vec3 {
    type Output = Self;

    fn add(self, other: Self) -> Self::Output {
        Self::new(self.x + other.x, self.y + other.y, self.z + other.z)
    }
}

impl std::ops::Sub for Vec3 {
    type Output = Self;

    fn sub(self, other: Self) -> Self::Output {
        Self::new(self.x - other.x, self.y - other.y, self.z - other.z)
    }
}

impl std::ops::Mul<f64> for Vec3 {
    type Output = Self;

    fn mul(self, s: f64) -> Self::Output {
        Self::new(self.x * s, self.y * s, self.z * s)
    }
}

impl std::ops::Neg for Vec3 {
    type Output = Self;

    fn neg(self) -> Self::Output {
        Self::new(-self.x, -self.y, -self.z)
    }
}
