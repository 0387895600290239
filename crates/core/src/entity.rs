//! Entity trait: identity that survives edits.

/// A persisted record with a store-assigned identity.
///
/// Two records with the same id are the same record, even if one of them is a
/// stale copy with different field values.
pub trait Entity {
    type Id: Copy + Eq + Ord + core::hash::Hash + core::fmt::Debug;

    fn id(&self) -> Self::Id;
}
