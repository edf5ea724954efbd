//! Value object trait: equality by value, not identity.

/// Marker trait for immutable values compared by their attributes.
///
/// Money amounts, selected order options and domain event payload lines are value
/// objects: two instances with the same fields are interchangeable.
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
