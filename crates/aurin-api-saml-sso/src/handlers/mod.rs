//! HTTP handlers for the SAML self-service method.

mod acs;
mod initiate;
mod metadata;

pub use acs::acs;
pub use initiate::{initiate, InitiateQuery};
pub use metadata::{metadata, MetadataQuery};
