//! Vault port
//!
//! The runtime owns `vault://` scheme dispatch; the wire protocol of the
//! secret server sits behind this trait.

use async_trait::async_trait;
use zeroize::Zeroizing;

/// Error produced by a vault transport
pub type VaultError = Box<dyn std::error::Error + Send + Sync>;

/// Client for a vault-like secret server
#[async_trait]
pub trait VaultClient: Send + Sync {
    /// Read one key of the secret stored at `mount/path`
    async fn read(
        &self,
        mount: &str,
        path: &str,
        key: &str,
    ) -> std::result::Result<Zeroizing<Vec<u8>>, VaultError>;

    /// Client name for diagnostics
    fn client_name(&self) -> &str;
}
