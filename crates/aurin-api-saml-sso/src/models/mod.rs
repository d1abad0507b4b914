//! Data models for the SAML self-service strategy.

pub mod assertion;
pub mod claims;
pub mod flow;
pub mod provider_config;

pub use assertion::{AcsForm, AcsQuery, AssertionAttribute, AttributeStatement, ParsedAssertion};
pub use claims::{Attributes, IdentityClaims, IdentityTrait};
pub use flow::{
    ExecutionMode, Flow, LoginFlow, RegistrationFlow, SettingsFlow, UiContainer, UiNode,
    SAML_NODE_GROUP,
};
pub use provider_config::{
    ClaimsMapperRules, IdpInformation, ProviderConfiguration, SamlStrategyConfig,
    StrategyConfigSource, TraitRule,
};
