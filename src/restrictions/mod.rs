//! Turn restrictions
//!
//! [`RestrictionSetter`] runs once on an unfrozen graph with turn costs enabled, before any
//! contraction hierarchy is prepared.

pub mod restriction;
pub mod setter;

pub use restriction::{GraphRestriction, RestrictionType, Via};
pub use setter::{RestrictionSetter, RestrictionStats};
