use crate::resources::{MaterialHandle, MeshHandle};

/// Renderable mesh + material pair attached to an entity.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Drawable3D {
    pub mesh: MeshHandle,
    pub material: MaterialHandle,
}

impl Drawable3D {
    pub fn new(mesh: MeshHandle, material: MaterialHandle) -> Self {
        Self { mesh, material }
    }
}
