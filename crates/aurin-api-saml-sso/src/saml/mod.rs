//! SAML-facing helpers that stay on this side of the engine boundary.

pub mod attributes;

pub use attributes::{accepted_request_ids, extract_attributes};
