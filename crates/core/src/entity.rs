//! Entity trait: identity + continuity across state changes.

/// Entity marker + minimal interface.
///
/// Products keep their identity while their stock changes; movements are entities
/// whose identity is assigned once by the store and never reused.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> &Self::Id;
}

/// First entity in `items` with the given id.
pub fn find_by_id<'a, E: Entity>(items: &'a [E], id: &E::Id) -> Option<&'a E> {
    items.iter().find(|e| e.id() == id)
}
