//! Claims: the upstream record model and the source that fetches them.

pub mod model;
pub mod source;

pub use model::Claim;
pub use source::{ClaimSource, HttpClaimSource};
