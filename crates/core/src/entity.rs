//! Records with a stable identity.

/// A stored record addressed by a typed id.
///
/// Users and items keep their id across every update; two records with the
/// same id are the same record at different points in time.
pub trait Entity {
    type Id: Copy + Eq + core::hash::Hash + core::fmt::Debug + core::fmt::Display;

    fn id(&self) -> &Self::Id;
}
