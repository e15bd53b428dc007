//! The code/metadata store protocol — component B.
//!
//! Mirrors `layer0::state`'s split between a full read/write trait and
//! a narrower reader; here the store additionally owns versioning,
//! compression, chunking, and fallback semantics assigned to it
//! (§4.B), so the trait is wider than `StateStore`.

use crate::error::StoreError;
use crate::id::FunctionId;
use crate::metadata::{DeploymentRecord, DerivativeKind, FunctionMetadata};
use crate::semver::SemVer;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A page of metadata from `listMetadata`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetadataPage {
    /// The metadata in this page, in manifest order.
    pub items: Vec<FunctionMetadata>,
    /// Opaque cursor for the next page, `None` when exhausted.
    pub next_cursor: Option<String>,
}

/// Result of `getWithFallback`, spec §4.B.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FallbackResult {
    /// The code that was served.
    pub code: String,
    /// The version that was actually served (requested or a fallback).
    pub served_version: SemVer,
    /// Whether a fallback version was used instead of the requested one.
    pub used_fallback: bool,
}

/// All versions known for a function, spec §4.B `listVersions`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionList {
    /// Every version snapshot that has been written.
    pub versions: Vec<SemVer>,
    /// The version the `latest` pointer currently resolves to.
    pub latest: Option<SemVer>,
}

/// The code/metadata store protocol, component B.
///
/// Implementations own metadata, code, and the manifest secondary
/// index; see `cascade-store` for the in-memory reference
/// implementation. The store's *transport* (what's behind `&self`) is
/// out of scope per spec §1 — only this contract is.
#[async_trait]
pub trait CodeStore: Send + Sync {
    /// Fetch metadata. `version = None` resolves the `latest` pointer.
    async fn get_metadata(
        &self,
        id: &FunctionId,
        version: Option<&SemVer>,
    ) -> Result<Option<FunctionMetadata>, StoreError>;

    /// Write metadata: preserves `createdAt`, refreshes `updatedAt`,
    /// writes a version snapshot, appends a deployment record and a
    /// manifest entry.
    async fn put_metadata(&self, metadata: FunctionMetadata) -> Result<(), StoreError>;

    /// List metadata, using the manifest if present; rebuilds it by
    /// scanning primary state otherwise (spec §4.B).
    async fn list_metadata(
        &self,
        cursor: Option<&str>,
        limit: usize,
    ) -> Result<MetadataPage, StoreError>;

    /// Remove latest, all version snapshots, deployment history, and
    /// the manifest entry for `id`.
    async fn delete_metadata(&self, id: &FunctionId) -> Result<(), StoreError>;

    /// Re-point `latest` to an existing version snapshot and append a
    /// synthetic deployment record marked as a rollback.
    async fn rollback(&self, id: &FunctionId, to_version: &SemVer) -> Result<(), StoreError>;

    /// Every deployment record for `id`, oldest first.
    async fn deployment_history(&self, id: &FunctionId) -> Result<Vec<DeploymentRecord>, StoreError>;

    /// Fetch code, transparently decompressing when a compression
    /// marker is present (or, absent a marker, when the payload sniffs
    /// as gzip-magic — the backward-compatibility path in spec §4.B).
    async fn get_code(
        &self,
        id: &FunctionId,
        version: Option<&SemVer>,
        derivative: DerivativeKind,
    ) -> Result<Option<String>, StoreError>;

    /// Store code, compressing when `code.len() >= 1024` and the
    /// compressed form is smaller; otherwise stores verbatim.
    async fn put_code(
        &self,
        id: &FunctionId,
        code: &str,
        version: &SemVer,
        derivative: DerivativeKind,
    ) -> Result<(), StoreError>;

    /// Try `version`, then each of `fallbacks` in order; reports which
    /// version was actually served.
    async fn get_with_fallback(
        &self,
        id: &FunctionId,
        version: &SemVer,
        fallbacks: &[SemVer],
    ) -> Result<Option<FallbackResult>, StoreError>;

    /// All versions plus the `latest` pointer.
    async fn list_versions(&self, id: &FunctionId) -> Result<VersionList, StoreError>;

    /// All versions, semver-ordered ascending.
    async fn list_versions_sorted(&self, id: &FunctionId) -> Result<Vec<SemVer>, StoreError> {
        let mut list = self.list_versions(id).await?.versions;
        list.sort();
        Ok(list)
    }

    /// Store a large object, chunked at 25 MiB with a metadata record
    /// of total chunks/size/chunk size (spec §4.B).
    async fn put_large(
        &self,
        id: &FunctionId,
        code: &[u8],
        version: &SemVer,
        derivative: DerivativeKind,
    ) -> Result<(), StoreError>;

    /// Fetch a large object, reassembling chunks strictly in index
    /// order; a missing chunk yields `Ok(None)` for the whole object.
    async fn get_large(
        &self,
        id: &FunctionId,
        version: Option<&SemVer>,
        derivative: DerivativeKind,
    ) -> Result<Option<Vec<u8>>, StoreError>;

    /// Delete a large object and every chunk belonging to it.
    async fn delete_large(
        &self,
        id: &FunctionId,
        version: &SemVer,
        derivative: DerivativeKind,
    ) -> Result<(), StoreError>;
}

/// The size threshold above which `putCode` attempts compression
/// (spec §4.B): payloads smaller than this are always stored verbatim.
pub const COMPRESSION_THRESHOLD_BYTES: usize = 1024;

/// Chunk size for `putLarge`/`getLarge` (spec §4.B): 25 MiB.
pub const CHUNK_SIZE_BYTES: usize = 25 * 1024 * 1024;
