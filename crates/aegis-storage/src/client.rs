//! Client store provider trait.

use async_trait::async_trait;

use aegis_model::Client;

use crate::error::StorageResult;

/// Durable store for OAuth 2.0 client registrations.
///
/// The login & consent core only calls [`ClientStore::get_client`]; the
/// remaining operations back the management API and CLI.
#[async_trait]
pub trait ClientStore: Send + Sync {
    /// Creates a new client.
    ///
    /// ## Errors
    ///
    /// Returns `StorageError::Duplicate` if the client id is taken.
    async fn create_client(&self, client: &Client) -> StorageResult<()>;

    /// Loads a client by id.
    async fn get_client(&self, id: &str) -> StorageResult<Client>;

    /// Replaces an existing client.
    ///
    /// ## Errors
    ///
    /// Returns `StorageError::NotFound` if the client does not exist.
    async fn update_client(&self, client: &Client) -> StorageResult<()>;

    /// Deletes a client by id.
    async fn delete_client(&self, id: &str) -> StorageResult<()>;

    /// Lists all clients.
    async fn list_clients(&self) -> StorageResult<Vec<Client>>;
}
