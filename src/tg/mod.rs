pub mod api;
pub mod facade;
#[cfg(test)]
pub mod mock;

use anyhow::Result;
use grammers_client::Client;
use grammers_mtsender::SenderPool;
use grammers_session::storages::SqliteSession;
use std::sync::Arc;

use crate::error::TgErrorContext;

pub const API_ID: i32 = 28946714;
pub const API_HASH: &str = "8f21e6b3aa71e4b0b34f24d2fe3c9a57";

/// A connected Telegram client with its pool runner handle.
pub struct TgClient {
    pub client: Client,
    #[allow(dead_code)]
    pub session: Arc<SqliteSession>,
    pool_handle: tokio::task::JoinHandle<()>,
}

impl TgClient {
    /// Connect using the session database at `session_path`, creating it on
    /// first use. The crawler is pull-based, so the updates receiver is
    /// dropped.
    pub async fn connect(session_path: &str) -> Result<Self> {
        let session = Arc::new(SqliteSession::open(session_path).await.context_connect()?);

        let pool = SenderPool::new(Arc::clone(&session), API_ID);
        let client = Client::new(&pool);

        let SenderPool { runner, .. } = pool;

        let pool_handle = tokio::spawn(async move {
            runner.run().await;
        });

        Ok(TgClient {
            client,
            session,
            pool_handle,
        })
    }
}

impl Drop for TgClient {
    fn drop(&mut self) {
        self.client.disconnect();
        self.pool_handle.abort();
    }
}
