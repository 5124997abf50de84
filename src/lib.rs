//! An OCI-conformant container image registry backed by the local
//! filesystem.
//!
//! Blobs live under `<root>/<name>/_blobs/<digest>`, manifests under
//! `<root>/<name>/<reference>/manifest.json`. The HTTP surface implements
//! the OCI Distribution Specification endpoints; see [`registry`] for the
//! endpoint table and [`model`] for the content-addressing primitives.

pub mod model;
pub mod registry;
