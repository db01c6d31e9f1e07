//! In-memory client store.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use aegis_model::Client;

use crate::client::ClientStore;
use crate::error::{StorageError, StorageResult};

/// In-memory [`ClientStore`].
#[derive(Default)]
pub struct MemoryClientStore {
    clients: RwLock<HashMap<String, Client>>,
}

impl MemoryClientStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ClientStore for MemoryClientStore {
    async fn create_client(&self, client: &Client) -> StorageResult<()> {
        let mut clients = self.clients.write();
        if clients.contains_key(&client.id) {
            return Err(StorageError::duplicate("client", &client.id));
        }
        clients.insert(client.id.clone(), client.clone());
        Ok(())
    }

    async fn get_client(&self, id: &str) -> StorageResult<Client> {
        self.clients
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| StorageError::not_found("client", id))
    }

    async fn update_client(&self, client: &Client) -> StorageResult<()> {
        let mut clients = self.clients.write();
        if !clients.contains_key(&client.id) {
            return Err(StorageError::not_found("client", &client.id));
        }
        clients.insert(client.id.clone(), client.clone());
        Ok(())
    }

    async fn delete_client(&self, id: &str) -> StorageResult<()> {
        self.clients
            .write()
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| StorageError::not_found("client", id))
    }

    async fn list_clients(&self) -> StorageResult<Vec<Client>> {
        let mut clients: Vec<Client> = self.clients.read().values().cloned().collect();
        clients.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(clients)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(id: &str) -> Client {
        Client {
            id: id.to_string(),
            ..Client::default()
        }
    }

    #[tokio::test]
    async fn crud_lifecycle() {
        let store = MemoryClientStore::new();

        store.create_client(&client("a")).await.unwrap();
        assert!(store.create_client(&client("a")).await.unwrap_err().is_duplicate());

        assert_eq!(store.get_client("a").await.unwrap().id, "a");
        assert!(store.get_client("b").await.unwrap_err().is_not_found());

        let mut updated = client("a");
        updated.name = "renamed".to_string();
        store.update_client(&updated).await.unwrap();
        assert_eq!(store.get_client("a").await.unwrap().name, "renamed");

        store.create_client(&client("b")).await.unwrap();
        let all = store.list_clients().await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id, "a");

        store.delete_client("a").await.unwrap();
        assert!(store.delete_client("a").await.unwrap_err().is_not_found());
    }
}
