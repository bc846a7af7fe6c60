use crate::components::{Drawable3D, Transform};
use crate::entity::EntityId;
use foundation::handles::Handle;

/// Column-per-component entity store.
///
/// Entity slots are recycled; each slot carries a generation so a stale
/// [`EntityId`] never resolves to the entity that replaced it.
#[derive(Debug, Default)]
pub struct World {
    generations: Vec<u32>,
    alive: Vec<bool>,
    free: Vec<u32>,
    transforms: Vec<Option<Transform>>,
    parents: Vec<Option<EntityId>>,
    drawables_3d: Vec<Option<Drawable3D>>,
}

impl World {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spawn(&mut self) -> EntityId {
        let index = match self.free.pop() {
            Some(index) => index,
            None => {
                let index = self.generations.len() as u32;
                self.ensure_capacity(index as usize);
                index
            }
        };
        let idx = index as usize;
        self.alive[idx] = true;
        self.transforms[idx] = Some(Transform::identity());
        EntityId(Handle::new(index, self.generations[idx]))
    }

    pub fn spawn_child(&mut self, parent: EntityId) -> EntityId {
        let child = self.spawn();
        self.set_parent(child, Some(parent));
        child
    }

    pub fn is_alive(&self, entity: EntityId) -> bool {
        let idx = entity.index() as usize;
        self.alive.get(idx).copied().unwrap_or(false)
            && self.generations.get(idx) == Some(&entity.generation())
    }

    pub fn entity_count(&self) -> usize {
        self.alive.iter().filter(|a| **a).count()
    }

    /// Returns `false` if the entity was already gone. Children are detached,
    /// not despawned.
    pub fn despawn(&mut self, entity: EntityId) -> bool {
        if !self.is_alive(entity) {
            return false;
        }
        let idx = entity.index() as usize;
        for parent in self.parents.iter_mut() {
            if *parent == Some(entity) {
                *parent = None;
            }
        }
        self.alive[idx] = false;
        self.generations[idx] = self.generations[idx].wrapping_add(1);
        self.transforms[idx] = None;
        self.parents[idx] = None;
        self.drawables_3d[idx] = None;
        self.free.push(entity.index());
        true
    }

    /// Despawns `entity` and everything below it. Returns how many entities
    /// were removed.
    pub fn despawn_recursive(&mut self, entity: EntityId) -> usize {
        if !self.is_alive(entity) {
            return 0;
        }
        let mut removed = 0;
        for child in self.children(entity) {
            removed += self.despawn_recursive(child);
        }
        if self.despawn(entity) {
            removed += 1;
        }
        removed
    }

    pub fn set_transform(&mut self, entity: EntityId, transform: Transform) {
        if self.is_alive(entity) {
            self.transforms[entity.index() as usize] = Some(transform);
        }
    }

    pub fn transform(&self, entity: EntityId) -> Option<Transform> {
        if !self.is_alive(entity) {
            return None;
        }
        self.transforms.get(entity.index() as usize).and_then(|t| *t)
    }

    pub fn transform_mut(&mut self, entity: EntityId) -> Option<&mut Transform> {
        if !self.is_alive(entity) {
            return None;
        }
        self.transforms
            .get_mut(entity.index() as usize)
            .and_then(|t| t.as_mut())
    }

    /// Ignored when either side is dead or the link would form a cycle.
    pub fn set_parent(&mut self, child: EntityId, parent: Option<EntityId>) {
        if !self.is_alive(child) {
            return;
        }
        if let Some(parent) = parent {
            if !self.is_alive(parent) || self.is_ancestor(child, parent) {
                return;
            }
        }
        self.parents[child.index() as usize] = parent;
    }

    pub fn parent(&self, entity: EntityId) -> Option<EntityId> {
        if !self.is_alive(entity) {
            return None;
        }
        self.parents.get(entity.index() as usize).and_then(|p| *p)
    }

    pub fn children(&self, entity: EntityId) -> Vec<EntityId> {
        self.parents
            .iter()
            .enumerate()
            .filter(|(idx, parent)| **parent == Some(entity) && self.alive[*idx])
            .map(|(idx, _)| EntityId(Handle::new(idx as u32, self.generations[idx])))
            .collect()
    }

    /// Local transform composed with every ancestor's.
    pub fn world_transform(&self, entity: EntityId) -> Option<Transform> {
        let mut transform = self.transform(entity)?;
        let mut cursor = self.parent(entity);
        while let Some(parent) = cursor {
            let parent_transform = self.transform(parent).unwrap_or_default();
            transform = parent_transform.compose(&transform);
            cursor = self.parent(parent);
        }
        Some(transform)
    }

    pub fn set_drawable_3d(&mut self, entity: EntityId, drawable: Drawable3D) {
        if self.is_alive(entity) {
            self.drawables_3d[entity.index() as usize] = Some(drawable);
        }
    }

    pub fn drawable_3d(&self, entity: EntityId) -> Option<Drawable3D> {
        if !self.is_alive(entity) {
            return None;
        }
        self.drawables_3d.get(entity.index() as usize).and_then(|d| *d)
    }

    /// Every live drawable with its world-space transform.
    pub fn drawables_3d(&self) -> Vec<(EntityId, Transform, Drawable3D)> {
        let mut out = Vec::new();
        for (idx, drawable) in self.drawables_3d.iter().enumerate() {
            let Some(drawable) = drawable else { continue };
            if !self.alive[idx] {
                continue;
            }
            let entity = EntityId(Handle::new(idx as u32, self.generations[idx]));
            let Some(transform) = self.world_transform(entity) else {
                continue;
            };
            out.push((entity, transform, *drawable));
        }
        out
    }

    fn is_ancestor(&self, ancestor: EntityId, entity: EntityId) -> bool {
        let mut cursor = Some(entity);
        while let Some(current) = cursor {
            if current == ancestor {
                return true;
            }
            cursor = self.parent(current);
        }
        false
    }

    fn ensure_capacity(&mut self, idx: usize) {
        if self.generations.len() <= idx {
            let new_len = idx + 1;
            self.generations.resize(new_len, 0);
            self.alive.resize(new_len, false);
            self.transforms.resize(new_len, None);
            self.parents.resize(new_len, None);
            self.drawables_3d.resize(new_len, None);
        }
    }
}
