//! SAML service-provider self-service method for aurin.
//!
//! This crate implements the reconciliation layer between inbound SAML
//! assertions and the server's in-flight self-service flows (login,
//! registration, settings). The SAML protocol work itself (signature
//! verification, XML handling, redirect binding) lives behind the
//! [`SamlEngine`](services::SamlEngine) trait; what this crate owns is
//! everything around it:
//!
//! - **Correlation**: a signed, single-use continuation cookie binds the IDP
//!   round trip to the flow that started it.
//! - **Flow dispatch**: the callback resolves the pending flow across the
//!   login, registration, and settings stores and hands the mapped claims to
//!   the owning subsystem.
//! - **Claims mapping**: assertion attributes become normalized identity
//!   claims via per-provider mapping rules.
//! - **Error rendering**: registration flows get their UI rebuilt on failure
//!   so the user can retry without restarting; other flows surface the error
//!   as-is.
//!
//! # Example
//!
//! ```rust,ignore
//! use aurin_api_saml_sso::{saml_sso_router, SamlSsoConfig, SamlSsoState};
//!
//! let state = SamlSsoState::new(config);
//! let app = Router::new()
//!     .merge(saml_sso_router())
//!     .with_state(state);
//! ```

pub mod error;
pub mod handlers;
pub mod models;
pub mod router;
pub mod saml;
pub mod services;

pub use error::{SamlSsoError, SamlSsoResult};
pub use router::{
    saml_sso_router, CsrfProvider, IdentityService, SamlSsoConfig, SamlSsoState, SchemaProvider,
    ROUTE_ACS, ROUTE_BROWSER, ROUTE_METADATA,
};
