//! Service-provider engine adapter and its initialization lifecycle.
//!
//! The engine itself (assertion verification, XML handling, redirect binding)
//! is an external collaborator behind [`SamlEngine`]. What this module owns is
//! the lifecycle contract: engines are expensive to build (key loading and a
//! possible IDP metadata fetch over the network), so they are constructed
//! lazily, at most once per provider, with concurrent first users awaiting the
//! same construction attempt instead of racing it. A failed attempt leaves no
//! residue; the next request retries.

use std::collections::HashMap;
use std::sync::Arc;

use axum::http::HeaderMap;
use axum::response::Response;
use tokio::sync::{OnceCell, RwLock};
use tracing::{debug, info};

use crate::error::{SamlSsoError, SamlSsoResult};
use crate::models::{AcsForm, ParsedAssertion, ProviderConfiguration};

/// Redirect produced by starting an SP-initiated auth flow.
#[derive(Debug, Clone)]
pub struct SsoRedirect {
    /// Fully-formed IDP SSO URL to send the browser to.
    pub redirect_url: String,
    /// Correlation request ID the IDP will echo back in `InResponseTo`.
    pub request_id: String,
}

/// The external SAML service-provider engine.
///
/// Implementations verify signatures and handle the protocol encoding; this
/// crate only ever sees assertions that already passed verification.
#[async_trait::async_trait]
pub trait SamlEngine: Send + Sync {
    /// Verify and parse the assertion POSTed to the ACS endpoint.
    ///
    /// `accepted_request_ids` lists the correlation IDs the assertion's
    /// `InResponseTo` may carry; an empty string means unsolicited assertions
    /// are acceptable.
    async fn parse_response(
        &self,
        form: &AcsForm,
        accepted_request_ids: &[String],
    ) -> SamlSsoResult<ParsedAssertion>;

    /// Outstanding SP-initiated request IDs tracked for this browser.
    async fn tracked_request_ids(&self, headers: &HeaderMap) -> Vec<String>;

    /// Serve the SP metadata document.
    async fn serve_metadata(&self) -> SamlSsoResult<Response>;

    /// Start an SP-initiated auth flow against the IDP.
    async fn initiate(&self, return_to: Option<&str>) -> SamlSsoResult<SsoRedirect>;
}

/// Constructs engines from provider configuration.
///
/// Building may block on key loading and an IDP metadata fetch; callers must
/// go through [`EngineManager`] so that work happens at most once.
#[async_trait::async_trait]
pub trait EngineBuilder: Send + Sync {
    async fn build(&self, config: &ProviderConfiguration) -> SamlSsoResult<Arc<dyn SamlEngine>>;
}

/// Process-wide registry of constructed engines, one per provider.
pub struct EngineManager {
    builder: Arc<dyn EngineBuilder>,
    engines: RwLock<HashMap<String, Arc<OnceCell<Arc<dyn SamlEngine>>>>>,
}

impl EngineManager {
    #[must_use]
    pub fn new(builder: Arc<dyn EngineBuilder>) -> Self {
        Self {
            builder,
            engines: RwLock::new(HashMap::new()),
        }
    }

    /// Return the engine for this provider, constructing it on first use.
    ///
    /// Exactly one construction attempt is in flight per provider at a time;
    /// late-joining callers wait on that attempt and observe the same handle.
    /// If the attempt fails, the error propagates to every waiter and the slot
    /// stays empty so a later request can retry.
    pub async fn ensure_initialized(
        &self,
        config: &ProviderConfiguration,
    ) -> SamlSsoResult<Arc<dyn SamlEngine>> {
        let cell = {
            let engines = self.engines.read().await;
            engines.get(&config.id).cloned()
        };

        let cell = match cell {
            Some(cell) => cell,
            None => {
                let mut engines = self.engines.write().await;
                engines
                    .entry(config.id.clone())
                    .or_insert_with(|| Arc::new(OnceCell::new()))
                    .clone()
            }
        };

        let engine = cell
            .get_or_try_init(|| async {
                info!(provider = %config.id, "Constructing SAML service-provider engine");
                self.builder.build(config).await
            })
            .await?;

        debug!(provider = %config.id, "SAML engine ready");
        Ok(engine.clone())
    }
}

/// Fetch an IDP metadata document for engine construction.
///
/// This is the only network round trip this crate performs itself; timeouts
/// are the client's, so callers should pass a client configured with one.
pub async fn fetch_idp_metadata(client: &reqwest::Client, url: &str) -> SamlSsoResult<String> {
    let response = client.get(url).send().await?;

    if !response.status().is_success() {
        return Err(SamlSsoError::Configuration {
            message: format!(
                "IDP metadata fetch from {url} returned HTTP {}",
                response.status()
            ),
        });
    }

    Ok(response.text().await?)
}
