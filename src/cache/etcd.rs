//! etcd backed cache store.
//!
//! Expiry is delegated to etcd: each write attaches the key to a fresh lease
//! granted for the entry ttl. One client is connected lazily and shared by
//! every operation; it is dropped after a failure so the next call
//! reconnects.

use std::time::Duration;

use async_trait::async_trait;
use etcd_client::{Client, ConnectOptions, PutOptions};
use tokio::sync::Mutex;

use super::CacheStore;
use crate::{
    config::Etcd,
    core::{GatewayError, GatewayResult},
};

pub struct EtcdStore {
    config: Etcd,
    client: Mutex<Option<Client>>,
}

impl EtcdStore {
    pub fn new(config: Etcd) -> Self {
        Self {
            config,
            client: Mutex::new(None),
        }
    }

    async fn create_client(&self) -> Result<Client, etcd_client::Error> {
        let mut options = ConnectOptions::default();
        if let Some(timeout) = self.config.timeout {
            options = options.with_timeout(Duration::from_secs(timeout as u64));
        };
        if let Some(connect_timeout) = self.config.connect_timeout {
            options = options.with_connect_timeout(Duration::from_secs(connect_timeout as u64));
        };
        if let (Some(user), Some(password)) = (&self.config.user, &self.config.password) {
            options = options.with_user(user.clone(), password.clone());
        };

        Client::connect(self.config.host.clone(), Some(options)).await
    }

    /// Handle on the shared connection. Cloning a client shares its channel.
    async fn client(&self) -> GatewayResult<Client> {
        let mut guard = self.client.lock().await;
        if let Some(client) = guard.as_ref() {
            return Ok(client.clone());
        }

        log::info!("Creating new etcd client...");
        let client = self
            .create_client()
            .await
            .map_err(|e| GatewayError::Cache(format!("etcd connect failed: {e}")))?;
        *guard = Some(client.clone());
        Ok(client)
    }

    async fn reset(&self) {
        *self.client.lock().await = None;
    }

    async fn check<T>(&self, op: &str, res: Result<T, etcd_client::Error>) -> GatewayResult<T> {
        match res {
            Ok(v) => Ok(v),
            Err(e) => {
                log::error!("etcd {op} failed: {e}");
                self.reset().await;
                Err(GatewayError::Cache(format!("etcd {op} failed: {e}")))
            }
        }
    }

    fn full_key(&self, key: &str) -> String {
        format!("{}{key}", self.config.prefix)
    }
}

/// Lease ttl in whole seconds, never below one.
fn lease_ttl(ttl: Duration) -> i64 {
    ttl.as_secs().max(1) as i64
}

#[async_trait]
impl CacheStore for EtcdStore {
    async fn get(&self, key: &str) -> GatewayResult<Option<Vec<u8>>> {
        let mut client = self.client().await?;
        let res = client.get(self.full_key(key), None).await;
        let resp = self.check("get", res).await?;
        Ok(resp.kvs().first().map(|kv| kv.value().to_vec()))
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> GatewayResult<()> {
        let mut client = self.client().await?;
        let res = client.lease_grant(lease_ttl(ttl), None).await;
        let lease = self.check("lease grant", res).await?;

        let options = PutOptions::new().with_lease(lease.id());
        let res = client.put(self.full_key(key), value, Some(options)).await;
        self.check("put", res).await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> GatewayResult<()> {
        let mut client = self.client().await?;
        let res = client.delete(self.full_key(key), None).await;
        self.check("delete", res).await?;
        Ok(())
    }

    async fn ping(&self) -> GatewayResult<()> {
        let mut client = self.client().await?;
        let res = client.status().await;
        self.check("status", res).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(prefix: &str) -> EtcdStore {
        EtcdStore::new(Etcd {
            host: vec!["127.0.0.1:2379".to_string()],
            prefix: prefix.to_string(),
            timeout: Some(1),
            connect_timeout: Some(1),
            user: None,
            password: None,
        })
    }

    #[test]
    fn test_full_key() {
        assert_eq!(store("/anvil/").full_key("orders:1"), "/anvil/orders:1");
        assert_eq!(store("").full_key("2FA:a@b.c"), "2FA:a@b.c");
    }

    #[test]
    fn test_lease_ttl_rounds_up_to_one_second() {
        assert_eq!(lease_ttl(Duration::from_millis(300)), 1);
        assert_eq!(lease_ttl(Duration::from_secs(300)), 300);
    }
}
