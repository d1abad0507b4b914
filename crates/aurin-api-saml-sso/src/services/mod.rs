//! Business logic for the SAML self-service method.

pub mod claims_service;
pub mod continuity_service;
pub mod dispatch_service;
pub mod engine_service;
pub mod flow_service;

pub use claims_service::map_claims;
pub use continuity_service::{Continuation, ContinuityService, CONTINUATION_COOKIE};
pub use dispatch_service::{handle_callback, render_flow_error, CallbackFailure};
pub use engine_service::{fetch_idp_metadata, EngineBuilder, EngineManager, SamlEngine, SsoRedirect};
pub use flow_service::{
    FlowService, LoginFlowStore, RegistrationFlowStore, Session, SessionManager, SettingsFlowStore,
};
