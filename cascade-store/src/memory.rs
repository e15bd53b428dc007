//! In-memory implementation of `cascade-protocol`'s `CodeStore`.
//!
//! Uses `RwLock<HashMap<..>>` the same way `neuron-state-memory::MemoryStore`
//! implements `StateStore` — no persistence across restarts, full
//! concurrent read access, exclusive access for writes.

use crate::compression::{decode_from_storage, encode_for_storage, StoredPayload};
use async_trait::async_trait;
use cascade_protocol::metadata::{DeploymentRecord, DerivativeKind};
use cascade_protocol::store::{
    CodeStore, FallbackResult, MetadataPage, VersionList, CHUNK_SIZE_BYTES,
};
use cascade_protocol::{FunctionId, FunctionMetadata, SemVer, StoreError};
use std::collections::HashMap;
use tokio::sync::RwLock;

type CodeKey = (String, String, DerivativeKind);

#[derive(Default)]
struct LargeObject {
    total_size: usize,
    chunk_size: usize,
    chunks: Vec<Option<Vec<u8>>>,
}

#[derive(Default)]
struct Inner {
    latest: HashMap<String, FunctionMetadata>,
    versions: HashMap<(String, String), FunctionMetadata>,
    deployments: HashMap<String, Vec<DeploymentRecord>>,
    /// `None` means "not yet built"; rebuilt by `list_metadata` as a
    /// side effect per spec §4.B, matching the "manifest is a
    /// secondary index rebuilt from primary state if absent" design.
    manifest: Option<Vec<String>>,
    code: HashMap<CodeKey, StoredPayload>,
    large: HashMap<CodeKey, LargeObject>,
}

/// In-memory code/metadata store: versioning, compression, chunking,
/// fallback, and a manifest secondary index, all behind one `RwLock`.
///
/// Suitable for testing and single-process deployments. No real
/// storage transport is implied — spec §1 scopes the store's
/// *contracts*, not its transport, into this core.
pub struct InMemoryStore {
    inner: RwLock<Inner>,
}

impl InMemoryStore {
    /// Create a new, empty store.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn code_key(id: &FunctionId, version: &SemVer, derivative: DerivativeKind) -> CodeKey {
    (id.as_str().to_string(), version.to_string(), derivative)
}

#[async_trait]
impl CodeStore for InMemoryStore {
    async fn get_metadata(
        &self,
        id: &FunctionId,
        version: Option<&SemVer>,
    ) -> Result<Option<FunctionMetadata>, StoreError> {
        let inner = self.inner.read().await;
        match version {
            None => Ok(inner.latest.get(id.as_str()).cloned()),
            Some(v) => Ok(inner
                .versions
                .get(&(id.as_str().to_string(), v.to_string()))
                .cloned()),
        }
    }

    async fn put_metadata(&self, mut metadata: FunctionMetadata) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        let id = metadata.id.as_str().to_string();

        if let Some(existing) = inner.latest.get(&id) {
            metadata.created_at = existing.created_at;
        }

        let version_key = (id.clone(), metadata.version.to_string());
        inner.versions.insert(version_key, metadata.clone());
        inner.latest.insert(id.clone(), metadata.clone());

        inner
            .deployments
            .entry(id.clone())
            .or_default()
            .push(DeploymentRecord {
                version: metadata.version.clone(),
                deployed_at: metadata.updated_at,
                is_rollback: false,
            });

        if let Some(manifest) = inner.manifest.as_mut() {
            if !manifest.contains(&id) {
                manifest.push(id);
            }
        }

        Ok(())
    }

    async fn list_metadata(
        &self,
        cursor: Option<&str>,
        limit: usize,
    ) -> Result<MetadataPage, StoreError> {
        let mut inner = self.inner.write().await;
        if inner.manifest.is_none() {
            let mut ids: Vec<String> = inner.latest.keys().cloned().collect();
            ids.sort();
            inner.manifest = Some(ids);
        }
        let manifest = inner.manifest.clone().unwrap_or_default();

        let offset: usize = match cursor {
            Some(c) => c
                .parse()
                .map_err(|_| StoreError::Other("invalid cursor".into()))?,
            None => 0,
        };

        let items: Vec<FunctionMetadata> = manifest
            .iter()
            .skip(offset)
            .take(limit)
            .filter_map(|id| inner.latest.get(id).cloned())
            .collect();

        let next_offset = offset + items.len();
        let next_cursor = if next_offset < manifest.len() {
            Some(next_offset.to_string())
        } else {
            None
        };

        Ok(MetadataPage { items, next_cursor })
    }

    async fn delete_metadata(&self, id: &FunctionId) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        let key = id.as_str().to_string();
        inner.latest.remove(&key);
        inner.versions.retain(|(fid, _), _| fid != &key);
        inner.deployments.remove(&key);
        if let Some(manifest) = inner.manifest.as_mut() {
            manifest.retain(|fid| fid != &key);
        }
        Ok(())
    }

    async fn rollback(&self, id: &FunctionId, to_version: &SemVer) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        let key = id.as_str().to_string();
        let snapshot = inner
            .versions
            .get(&(key.clone(), to_version.to_string()))
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("{id}@{to_version}")))?;

        inner.latest.insert(key.clone(), snapshot);
        inner
            .deployments
            .entry(key)
            .or_default()
            .push(DeploymentRecord {
                version: to_version.clone(),
                deployed_at: now_ms(),
                is_rollback: true,
            });
        Ok(())
    }

    async fn deployment_history(
        &self,
        id: &FunctionId,
    ) -> Result<Vec<DeploymentRecord>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .deployments
            .get(id.as_str())
            .cloned()
            .unwrap_or_default())
    }

    async fn get_code(
        &self,
        id: &FunctionId,
        version: Option<&SemVer>,
        derivative: DerivativeKind,
    ) -> Result<Option<String>, StoreError> {
        let version = match version {
            Some(v) => v.clone(),
            None => match self.get_metadata(id, None).await? {
                Some(meta) => meta.version,
                None => return Ok(None),
            },
        };
        let inner = self.inner.read().await;
        match inner.code.get(&code_key(id, &version, derivative)) {
            Some(payload) => Ok(Some(decode_from_storage(payload)?)),
            None => Ok(None),
        }
    }

    async fn put_code(
        &self,
        id: &FunctionId,
        code: &str,
        version: &SemVer,
        derivative: DerivativeKind,
    ) -> Result<(), StoreError> {
        let payload = encode_for_storage(code)?;
        let mut inner = self.inner.write().await;
        inner.code.insert(code_key(id, version, derivative), payload);
        Ok(())
    }

    async fn get_with_fallback(
        &self,
        id: &FunctionId,
        version: &SemVer,
        fallbacks: &[SemVer],
    ) -> Result<Option<FallbackResult>, StoreError> {
        if let Some(code) = self.get_code(id, Some(version), DerivativeKind::Source).await? {
            return Ok(Some(FallbackResult {
                code,
                served_version: version.clone(),
                used_fallback: false,
            }));
        }
        for fallback in fallbacks {
            if let Some(code) = self.get_code(id, Some(fallback), DerivativeKind::Source).await? {
                return Ok(Some(FallbackResult {
                    code,
                    served_version: fallback.clone(),
                    used_fallback: true,
                }));
            }
        }
        Ok(None)
    }

    async fn list_versions(&self, id: &FunctionId) -> Result<VersionList, StoreError> {
        let inner = self.inner.read().await;
        let prefix = id.as_str();
        let mut versions: Vec<SemVer> = inner
            .versions
            .keys()
            .filter(|(fid, _)| fid == prefix)
            .filter_map(|(_, v)| SemVer::parse(v).ok())
            .collect();
        versions.sort();
        let latest = inner.latest.get(prefix).map(|m| m.version.clone());
        Ok(VersionList { versions, latest })
    }

    async fn put_large(
        &self,
        id: &FunctionId,
        code: &[u8],
        version: &SemVer,
        derivative: DerivativeKind,
    ) -> Result<(), StoreError> {
        let chunks: Vec<Option<Vec<u8>>> = code
            .chunks(CHUNK_SIZE_BYTES)
            .map(|c| Some(c.to_vec()))
            .collect();
        let object = LargeObject {
            total_size: code.len(),
            chunk_size: CHUNK_SIZE_BYTES,
            chunks,
        };
        let mut inner = self.inner.write().await;
        inner.large.insert(code_key(id, version, derivative), object);
        Ok(())
    }

    async fn get_large(
        &self,
        id: &FunctionId,
        version: Option<&SemVer>,
        derivative: DerivativeKind,
    ) -> Result<Option<Vec<u8>>, StoreError> {
        let version = match version {
            Some(v) => v.clone(),
            None => match self.get_metadata(id, None).await? {
                Some(meta) => meta.version,
                None => return Ok(None),
            },
        };
        let inner = self.inner.read().await;
        let Some(object) = inner.large.get(&code_key(id, &version, derivative)) else {
            return Ok(None);
        };
        let mut out = Vec::with_capacity(object.total_size);
        for chunk in &object.chunks {
            match chunk {
                Some(bytes) => out.extend_from_slice(bytes),
                None => return Ok(None),
            }
        }
        Ok(Some(out))
    }

    async fn delete_large(
        &self,
        id: &FunctionId,
        version: &SemVer,
        derivative: DerivativeKind,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        inner.large.remove(&code_key(id, version, derivative));
        Ok(())
    }
}

fn now_ms() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
