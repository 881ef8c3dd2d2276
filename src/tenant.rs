//! Tenant resolution and API key material
//!
//! Every inbound request is attributed to exactly one tenant before any
//! payload handling. Precedence: a valid API key wins, then an explicit
//! `X-Tenant-Id` header, then the built-in default tenant. Invalid
//! credentials and disabled tenants are terminal; requests never fall
//! through to a weaker identity.

use crate::error::{FarwatchError, Result};
use crate::store::TelemetryStore;
use crate::types::{Tenant, TenantStatus};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::debug;
use uuid::Uuid;

/// Tenant every unattributed request lands in
pub const DEFAULT_TENANT: &str = "default";

/// Prefix carried by every issued API key
pub const API_KEY_PREFIX: &str = "fw_";

/// Mint a raw API key: `fw_` followed by 64 hex characters
pub fn generate_api_key() -> String {
    format!(
        "{}{}{}",
        API_KEY_PREFIX,
        Uuid::new_v4().simple(),
        Uuid::new_v4().simple()
    )
}

/// SHA-256 hex digest of a raw key, the only form ever stored
pub fn hash_api_key(raw: &str) -> String {
    let digest = Sha256::digest(raw.as_bytes());
    format!("{digest:x}")
}

/// Maps request credentials to a tenant
///
/// Known tenants are cached after the first lookup; control-plane
/// changes must call [`TenantResolver::invalidate`] to take effect.
/// Unknown ids are never cached, so a tenant created later is picked up
/// on its next request.
pub struct TenantResolver {
    store: Arc<dyn TelemetryStore>,
    cache: RwLock<HashMap<String, Tenant>>,
}

impl TenantResolver {
    pub fn new(store: Arc<dyn TelemetryStore>) -> Self {
        Self {
            store,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Drop one tenant from the cache
    pub fn invalidate(&self, tenant_id: &str) {
        if let Ok(mut cache) = self.cache.write() {
            cache.remove(tenant_id);
        }
    }

    /// Drop the whole cache
    pub fn invalidate_all(&self) {
        if let Ok(mut cache) = self.cache.write() {
            cache.clear();
        }
    }

    /// Resolve request credentials to an active tenant.
    ///
    /// An API key that fails validation is an authentication error even
    /// when a tenant header is also present. A tenant header naming an
    /// unknown or disabled tenant is likewise terminal. Only absent
    /// credentials fall back to the default tenant.
    pub async fn resolve(
        &self,
        api_key: Option<&str>,
        tenant_header: Option<&str>,
    ) -> Result<Tenant> {
        if let Some(raw) = api_key.map(str::trim).filter(|k| !k.is_empty()) {
            let tenant_id = self
                .store
                .validate_api_key(raw)
                .await?
                .ok_or_else(|| FarwatchError::Auth("invalid API key".into()))?;
            debug!(tenant_id = %tenant_id, "request attributed via API key");
            return self.require_active(&tenant_id).await;
        }

        let header_id = tenant_header
            .map(|h| h.trim().to_lowercase())
            .filter(|h| !h.is_empty());

        match header_id {
            Some(tenant_id) => self.require_active(&tenant_id).await,
            None => self.require_active(DEFAULT_TENANT).await,
        }
    }

    async fn require_active(&self, tenant_id: &str) -> Result<Tenant> {
        if let Some(tenant) = self.cached(tenant_id) {
            return Self::check_status(tenant);
        }

        let tenant = self
            .store
            .get_tenant(tenant_id)
            .await?
            .ok_or_else(|| FarwatchError::TenantNotFound(tenant_id.to_string()))?;
        if let Ok(mut cache) = self.cache.write() {
            cache.insert(tenant.id.clone(), tenant.clone());
        }
        Self::check_status(tenant)
    }

    fn cached(&self, tenant_id: &str) -> Option<Tenant> {
        self.cache
            .read()
            .ok()
            .and_then(|cache| cache.get(tenant_id).cloned())
    }

    fn check_status(tenant: Tenant) -> Result<Tenant> {
        if tenant.status != TenantStatus::Active {
            return Err(FarwatchError::TenantDisabled(tenant.id));
        }
        Ok(tenant)
    }
}
