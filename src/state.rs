use std::sync::Arc;
use crate::config::Config;
use crate::crypto::session_token::SessionCodec;
use crate::error::Result;
use crate::repositories::user::{MemoryUserStore, PgUserStore, UserStore};

/// The application's state.
#[derive(Clone)]
pub struct AppState {
    /// The user store.
    pub users: Arc<dyn UserStore>,
    /// The session token codec.
    pub sessions: SessionCodec,
    /// The application's configuration.
    pub config: Config,
}

impl AppState {
    /// Creates a new `AppState`, connecting to the configured store.
    ///
    /// # Arguments
    ///
    /// * `config` - The application's configuration.
    ///
    /// # Returns
    ///
    /// A `Result` containing the `AppState`.
    pub async fn new(config: &Config) -> Result<Self> {
        let users: Arc<dyn UserStore> = match config.database_url.as_deref() {
            Some(url) => {
                let pool = crate::db::create_pool(url)?;
                crate::db::ensure_schema(&pool).await?;
                tracing::info!("✅ PostgreSQL pool initialized");
                Arc::new(PgUserStore::new(pool))
            }
            None => {
                tracing::warn!("⚠️ DATABASE_URL not set, using in-memory user store (data is lost on restart)");
                Arc::new(MemoryUserStore::new())
            }
        };

        Ok(Self::with_store(config, users))
    }

    /// Creates an `AppState` around an existing store.
    pub fn with_store(config: &Config, users: Arc<dyn UserStore>) -> Self {
        AppState {
            users,
            sessions: SessionCodec::new(&config.session_secret),
            config: config.clone(),
        }
    }

    /// Releases the store's resources.
    pub async fn shutdown(&self) {
        self.users.close().await;
    }
}
