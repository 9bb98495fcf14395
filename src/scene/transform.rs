//! Transform and hierarchy components

use bevy_ecs::component::Component;
use bevy_ecs::entity::Entity;
use bevy_ecs::world::World;
use glam::{Mat4, Quat, Vec3};

/// Hierarchies deeper than this are treated as cyclic.
const MAX_HIERARCHY_DEPTH: usize = 64;

/// Local transform relative to the parent entity (or world, for roots)
#[derive(Component, Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Transform {
    pub const IDENTITY: Self = Self {
        position: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: Vec3::ONE,
    };

    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Self::IDENTITY
        }
    }

    pub fn from_position_rotation(position: Vec3, rotation: Quat) -> Self {
        Self {
            position,
            rotation,
            ..Self::IDENTITY
        }
    }

    /// Get the model matrix for this transform
    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.position)
    }

    /// Get forward direction (local -Z in world space)
    pub fn forward(&self) -> Vec3 {
        self.rotation * -Vec3::Z
    }

    /// Look at a target position
    pub fn look_at(&mut self, target: Vec3, up: Vec3) {
        let forward = (target - self.position).normalize();
        let right = forward.cross(up).normalize();
        let up = right.cross(forward);

        self.rotation = Quat::from_mat3(&glam::Mat3::from_cols(right, up, -forward));
    }
}

/// Debug name for an entity, also used to find well-known children.
#[derive(Component, Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Name(pub String);

impl Name {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Name {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Marks an entity as a child of another entity.
///
/// Use [`set_parent`] so the parent's [`Children`] stays in sync.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Parent(pub Entity);

/// Ordered list of child entities, maintained by [`set_parent`].
#[derive(Component, Debug, Clone, Default, PartialEq)]
pub struct Children(pub Vec<Entity>);

impl Children {
    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Sets `entity` as a child of `parent`, updating both sides of the link.
///
/// Both entities must exist.
///
/// # Panics
///
/// Panics if `entity == parent`.
pub fn set_parent(world: &mut World, entity: Entity, parent: Entity) {
    assert_ne!(entity, parent, "Cannot set entity as its own parent: {entity}");

    if let Some(old_parent) = world.get::<Parent>(entity).map(|p| p.0) {
        if old_parent == parent {
            return;
        }
        if let Some(mut children) = world.get_mut::<Children>(old_parent) {
            children.0.retain(|&e| e != entity);
        }
    }

    world.entity_mut(entity).insert(Parent(parent));

    // Entries for entities despawned without `despawn_child` are dropped here
    let mut children: Vec<Entity> = world
        .get::<Children>(parent)
        .map(|c| {
            c.iter()
                .copied()
                .filter(|&e| world.entities().contains(e))
                .collect()
        })
        .unwrap_or_default();
    if !children.contains(&entity) {
        children.push(entity);
    }
    world.entity_mut(parent).insert(Children(children));
}

/// Despawns `entity` and unlinks it from its parent's [`Children`].
///
/// Returns `false` if the entity no longer exists.
pub fn despawn_child(world: &mut World, entity: Entity) -> bool {
    if let Some(parent) = world.get::<Parent>(entity).map(|p| p.0) {
        if let Some(mut children) = world.get_mut::<Children>(parent) {
            children.0.retain(|&e| e != entity);
        }
    }
    world.despawn(entity)
}

/// Finds the first live child of `parent` carrying `name`.
pub fn find_child_by_name(world: &World, parent: Entity, name: &str) -> Option<Entity> {
    let children = world.get::<Children>(parent)?;
    children.iter().copied().find(|&child| {
        world.get::<Parent>(child).map(|p| p.0) == Some(parent)
            && world.get::<Name>(child).is_some_and(|n| n.as_str() == name)
    })
}

/// Computes the world matrix of `entity` by walking its parent chain.
///
/// Entities without a [`Transform`] contribute identity. Returns `None` if the
/// entity does not exist or the chain is cyclic.
pub fn world_matrix(world: &World, entity: Entity) -> Option<Mat4> {
    if !world.entities().contains(entity) {
        return None;
    }

    let mut matrix = Mat4::IDENTITY;
    let mut current = Some(entity);
    let mut depth = 0;

    while let Some(e) = current {
        if depth > MAX_HIERARCHY_DEPTH {
            log::warn!("Hierarchy above {:?} exceeds {} levels", entity, MAX_HIERARCHY_DEPTH);
            return None;
        }
        if let Some(transform) = world.get::<Transform>(e) {
            matrix = transform.matrix() * matrix;
        }
        current = world.get::<Parent>(e).map(|p| p.0);
        depth += 1;
    }

    Some(matrix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_parent_links_both_sides() {
        let mut world = World::new();
        let parent = world.spawn(Transform::default()).id();
        let child = world.spawn(Transform::default()).id();

        set_parent(&mut world, child, parent);
        set_parent(&mut world, child, parent);

        assert_eq!(world.get::<Parent>(child), Some(&Parent(parent)));
        assert_eq!(world.get::<Children>(parent).map(|c| c.len()), Some(1));
    }

    #[test]
    fn reparenting_removes_from_old_parent() {
        let mut world = World::new();
        let a = world.spawn_empty().id();
        let b = world.spawn_empty().id();
        let child = world.spawn_empty().id();

        set_parent(&mut world, child, a);
        set_parent(&mut world, child, b);

        assert!(world.get::<Children>(a).is_some_and(|c| c.is_empty()));
        assert_eq!(world.get::<Children>(b).map(|c| c.0.clone()), Some(vec![child]));
    }

    #[test]
    fn set_parent_drops_despawned_children() {
        let mut world = World::new();
        let parent = world.spawn_empty().id();
        let stale = world.spawn_empty().id();
        set_parent(&mut world, stale, parent);

        world.despawn(stale);
        let child = world.spawn_empty().id();
        set_parent(&mut world, child, parent);

        assert_eq!(world.get::<Children>(parent).map(|c| c.0.clone()), Some(vec![child]));
    }

    #[test]
    fn find_child_by_name_ignores_other_names() {
        let mut world = World::new();
        let parent = world.spawn_empty().id();
        let other = world.spawn(Name::new("Other")).id();
        let wanted = world.spawn(Name::new("Wanted")).id();
        set_parent(&mut world, other, parent);
        set_parent(&mut world, wanted, parent);

        assert_eq!(find_child_by_name(&world, parent, "Wanted"), Some(wanted));
        assert_eq!(find_child_by_name(&world, parent, "Missing"), None);
    }

    #[test]
    fn despawned_child_is_not_found() {
        let mut world = World::new();
        let parent = world.spawn_empty().id();
        let child = world.spawn(Name::new("Child")).id();
        set_parent(&mut world, child, parent);

        assert!(despawn_child(&mut world, child));
        assert_eq!(find_child_by_name(&world, parent, "Child"), None);
        assert!(!despawn_child(&mut world, child));
    }

    #[test]
    fn child_inherits_parent_pose() {
        let mut world = World::new();
        let parent = world
            .spawn(Transform::from_position(Vec3::new(1.0, 2.0, 3.0)))
            .id();
        let child = world.spawn(Transform::default()).id();
        set_parent(&mut world, child, parent);

        let matrix = world_matrix(&world, child).unwrap();
        assert_eq!(matrix.w_axis.truncate(), Vec3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn world_matrix_of_missing_entity() {
        let mut world = World::new();
        let entity = world.spawn_empty().id();
        world.despawn(entity);
        assert!(world_matrix(&world, entity).is_none());
    }

    #[test]
    fn look_at_faces_target() {
        let mut transform = Transform::from_position(Vec3::new(0.0, 0.0, 5.0));
        transform.look_at(Vec3::ZERO, Vec3::Y);
        assert!(transform.forward().abs_diff_eq(-Vec3::Z, 1e-5));
    }
}
