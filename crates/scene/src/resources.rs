//! Owned geometry and material storage.
//!
//! The scene never talks to the GPU. It allocates meshes and materials
//! here and releases them when their owner is torn down; the render backend
//! drains [`Resources::drain_released_meshes`] each frame and frees the
//! matching buffers.

use foundation::arena::Arena;
use foundation::handles::Handle;
use serde::{Deserialize, Serialize};

use crate::mesh::Mesh;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MeshHandle(pub Handle);

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct MaterialHandle(pub Handle);

#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Material {
    /// Linear RGB.
    pub color: [f32; 3],
    pub opacity: f32,
    /// 0 = fully lit by scene lights, 1 = ignores lighting.
    pub emissive: f32,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            color: [1.0, 1.0, 1.0],
            opacity: 1.0,
            emissive: 0.0,
        }
    }
}

impl Material {
    pub fn color(color: [f32; 3]) -> Self {
        Self {
            color,
            ..Self::default()
        }
    }
}

#[derive(Debug, Default)]
pub struct Resources {
    meshes: Arena<Mesh>,
    materials: Arena<Material>,
    released_meshes: Vec<MeshHandle>,
}

impl Resources {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_mesh(&mut self, mesh: Mesh) -> MeshHandle {
        MeshHandle(self.meshes.alloc(mesh))
    }

    pub fn mesh(&self, handle: MeshHandle) -> Option<&Mesh> {
        self.meshes.get(handle.0)
    }

    pub fn meshes(&self) -> impl Iterator<Item = (MeshHandle, &Mesh)> {
        self.meshes.iter().map(|(h, m)| (MeshHandle(h), m))
    }

    /// Returns `false` if the mesh was already released.
    pub fn release_mesh(&mut self, handle: MeshHandle) -> bool {
        if self.meshes.remove(handle.0).is_some() {
            self.released_meshes.push(handle);
            true
        } else {
            false
        }
    }

    pub fn add_material(&mut self, material: Material) -> MaterialHandle {
        MaterialHandle(self.materials.alloc(material))
    }

    pub fn material(&self, handle: MaterialHandle) -> Option<&Material> {
        self.materials.get(handle.0)
    }

    pub fn material_mut(&mut self, handle: MaterialHandle) -> Option<&mut Material> {
        self.materials.get_mut(handle.0)
    }

    /// Returns `false` if the material was already released.
    pub fn release_material(&mut self, handle: MaterialHandle) -> bool {
        self.materials.remove(handle.0).is_some()
    }

    pub fn live_meshes(&self) -> usize {
        self.meshes.len()
    }

    pub fn live_materials(&self) -> usize {
        self.materials.len()
    }

    /// Meshes released since the last drain, oldest first.
    pub fn drain_released_meshes(&mut self) -> Vec<MeshHandle> {
        std::mem::take(&mut self.released_meshes)
    }
}
