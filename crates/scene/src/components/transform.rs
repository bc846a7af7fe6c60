use foundation::math::Vec3;

/// Translation, rotation about +Y and uniform scale.
///
/// Restricting rotation to one axis and scale to a single factor keeps
/// composition closed: a parent transform applied to a child transform is
/// again a `Transform`.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Transform {
    pub position: Vec3,
    pub rotation_y: f64,
    pub scale: f64,
}

impl Default for Transform {
    fn default() -> Self {
        Self::identity()
    }
}

impl Transform {
    pub fn identity() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation_y: 0.0,
            scale: 1.0,
        }
    }

    pub fn translate(position: Vec3) -> Self {
        Self {
            position,
            ..Self::identity()
        }
    }

    pub fn apply(&self, point: Vec3) -> Vec3 {
        self.position + (point * self.scale).rotate_y(self.rotation_y)
    }

    /// `self` is the parent; the result maps child-local points to the
    /// parent's space.
    pub fn compose(&self, child: &Transform) -> Transform {
        Transform {
            position: self.apply(child.position),
            rotation_y: self.rotation_y + child.rotation_y,
            scale: self.scale * child.scale,
        }
    }
}
