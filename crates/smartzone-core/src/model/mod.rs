// ── Resource model ──
//
// Open field mappings on both sides of a reconciliation: what the caller
// wants (`DesiredState`, partial) and what the controller has (`Resource`,
// complete).

pub mod desired;
pub mod resource;

pub use desired::{DesiredState, Field};
pub use resource::Resource;
