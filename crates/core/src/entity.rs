//! Entity trait: identity + continuity across state changes.

/// State-stored domain object addressed by id (e.g. a material row).
pub trait Entity {
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    fn id(&self) -> &Self::Id;
}
