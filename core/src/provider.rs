//! Lazily built, memoized GraphQL client.
//!
//! [`ClientProvider::get_client`] asks the identity provider for a session
//! once, builds the transport around it and hands out the same
//! [`NotesClient`] for the rest of the provider's life. A failed attempt is
//! not cached, so the next call asks again.

use std::sync::Arc;

use notes_session::SessionProvider;
use tokio::sync::OnceCell;

use crate::client::{AuthMode, ClientError, ClientResult, NotesClient, TransportConfig};
use crate::config_loader::{AuthType, NotesConfig};

pub struct ClientProvider {
    config: NotesConfig,
    sessions: Arc<dyn SessionProvider>,
    client: OnceCell<Arc<NotesClient>>,
}

impl ClientProvider {
    pub fn new(config: NotesConfig, sessions: Arc<dyn SessionProvider>) -> Self {
        Self {
            config,
            sessions,
            client: OnceCell::new(),
        }
    }

    /// Returns the memoized client, building it on first use.
    ///
    /// Concurrent first calls share one initialization.
    pub async fn get_client(&self) -> ClientResult<Arc<NotesClient>> {
        self.client
            .get_or_try_init(|| async { self.build_client().await.map(Arc::new) })
            .await
            .cloned()
    }

    pub fn is_initialized(&self) -> bool {
        self.client.initialized()
    }

    async fn build_client(&self) -> ClientResult<NotesClient> {
        let url = reqwest::Url::parse(&self.config.graphql_endpoint).map_err(|e| {
            ClientError::InvalidConfig(format!(
                "invalid GraphQL endpoint '{}': {e}",
                self.config.graphql_endpoint
            ))
        })?;

        let auth = match self.config.authentication_type {
            AuthType::ApiKey => {
                let key = self.config.api_key.clone().ok_or_else(|| {
                    ClientError::InvalidConfig("API_KEY auth requires api_key".to_string())
                })?;
                AuthMode::ApiKey { key }
            }
            AuthType::AmazonCognitoUserPools => {
                let session = self.sessions.current_session().await?;
                AuthMode::UserPools {
                    jwt_token: session.access_token,
                }
            }
            AuthType::OpenidConnect => {
                let session = self.sessions.current_session().await?;
                AuthMode::OpenIdConnect {
                    token: session.id_token.unwrap_or(session.access_token),
                }
            }
        };

        tracing::info!(
            "Building GraphQL client for {url} ({}, {})",
            self.config.region,
            self.config.authentication_type
        );

        let transport = TransportConfig {
            url,
            region: self.config.region.clone(),
            auth,
        };
        Ok(NotesClient::new(transport, self.config.request_timeout()))
    }
}

impl std::fmt::Debug for ClientProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientProvider")
            .field("endpoint", &self.config.graphql_endpoint)
            .field("initialized", &self.is_initialized())
            .finish_non_exhaustive()
    }
}
