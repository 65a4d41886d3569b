//! Tenant-wide tags
//!
//! Tag operations re-fetch the tenant's tag inventory on every call
//! rather than caching it on the session; the only caching this crate
//! does is per-entity lazy detail materialization.

use serde::Deserialize;

use crate::auth::Session;
use crate::error::{RedquillError, Result, Warned};

#[derive(Debug, Deserialize)]
struct TenantTag {
    id: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct TagListing {
    #[serde(default)]
    tags: Vec<TenantTag>,
}

#[derive(Debug, Deserialize)]
struct TagDeletion {
    #[serde(default)]
    deleted: bool,
}

impl Session {
    async fn tenant_tags(&self) -> Result<Warned<Vec<TenantTag>>> {
        let path = format!("v1/tenant/{}/tag?limit=10000", self.tenant_id().await);
        let (envelope, warnings) = self.get_json(&path).await?.split();

        let listing: TagListing = serde_json::from_value(envelope).map_err(|e| {
            RedquillError::Decode(format!("tag listing isn't the expected shape: {e}"))
        })?;

        Ok(Warned::new(listing.tags, warnings))
    }

    /// List the tag names defined in this session's tenant.
    ///
    /// # Errors
    /// Returns transport/decode errors from the listing call.
    pub async fn tags(&self) -> Result<Warned<Vec<String>>> {
        let (tags, warnings) = self.tenant_tags().await?.split();
        Ok(Warned::new(tags.into_iter().map(|tag| tag.name).collect(), warnings))
    }

    /// Delete the named tags from the tenant.
    ///
    /// Tag names are resolved to ids through a fresh listing; an unknown
    /// name is a not-found error, and a deletion the platform does not
    /// acknowledge is a service error.
    ///
    /// # Errors
    /// As described above, plus transport/decode errors from either call.
    pub async fn remove_tags(&self, tags: &[String]) -> Result<Warned<()>> {
        let (known, mut warnings) = self.tenant_tags().await?.split();
        let tenant_id = self.tenant_id().await;

        for name in tags {
            let Some(tag) = known.iter().find(|candidate| &candidate.name == name) else {
                return Err(RedquillError::NotFound(format!("tag `{name}`")));
            };

            let path = format!("v1/tenant/{}/tag/{}", tenant_id, tag.id);
            let envelope = self.delete_json(&path).await?.drain_into(&mut warnings);

            let deletion: TagDeletion = serde_json::from_value(envelope).map_err(|e| {
                RedquillError::Decode(format!("tag deletion response isn't the expected shape: {e}"))
            })?;
            if !deletion.deleted {
                return Err(RedquillError::Api(format!("error deleting tag `{name}`")));
            }
        }

        Ok(Warned::new((), warnings))
    }
}
