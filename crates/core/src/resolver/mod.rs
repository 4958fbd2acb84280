//! Tarball URL resolution: parsing, ref cursors, redirects and artifact lookup.

mod request;
mod service;

pub use request::*;
pub use service::{ResolvedArtifact, Resolution, ResolverService};
