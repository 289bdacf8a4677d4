//! Optional trim with re-hash and re-check.

use bytes::Bytes;
use reliquary_core::{ContentHash, ContentHasher, ContentRecord, MediaKind, TrimSpec};
use reliquary_error::ReliquaryResult;
use reliquary_interface::Transformer;
use reliquary_storage::ContentStore;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Result of [`TransformStage::apply`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformOutput {
    /// Bytes to commit and deliver
    pub bytes: Bytes,
    /// Hash of `bytes`, computed after the transform
    pub hash: ContentHash,
    /// Hash of the bytes as fetched
    pub source_hash: ContentHash,
    /// Record already on file for `source_hash`, if any
    pub source_existing: Option<ContentRecord>,
    /// Record already on file for `hash`, if any
    pub existing: Option<ContentRecord>,
    /// Whether the transformer ran and its output was kept
    pub transformed: bool,
}

impl TransformOutput {
    /// Whether the final content was already stored before this request.
    pub fn already_existed(&self) -> bool {
        self.existing.is_some()
    }
}

/// Checks the store for the fetched bytes, applies a trim spec, then checks
/// the store again for the resulting hash.
///
/// A failing transformer never fails the request: the stage logs the failure
/// and carries on with the untransformed bytes and their own hash.
#[derive(Clone)]
pub struct TransformStage {
    transformer: Option<Arc<dyn Transformer>>,
    store: Arc<dyn ContentStore>,
}

impl TransformStage {
    /// Stage over `store`, trimming with `transformer` when one is given.
    pub fn new(transformer: Option<Arc<dyn Transformer>>, store: Arc<dyn ContentStore>) -> Self {
        Self { transformer, store }
    }

    /// Trim `bytes` per `spec`, re-hash, and re-check the store.
    ///
    /// Without a spec (or with a spec that bounds nothing) the output hash is
    /// the input hash and the store is consulted once.
    ///
    /// # Errors
    ///
    /// Only the store lookup can fail; transformer failures are absorbed.
    #[instrument(skip(self, bytes), fields(size = bytes.len(), kind = %kind))]
    pub async fn apply(
        &self,
        bytes: Bytes,
        kind: MediaKind,
        extension: &str,
        spec: Option<&TrimSpec>,
    ) -> ReliquaryResult<TransformOutput> {
        let source_hash = ContentHasher::hash(&bytes);
        let source_existing = self.store.exists(&source_hash, kind).await?;

        let (final_bytes, transformed) = match (spec.filter(|s| !s.is_noop()), &self.transformer) {
            (Some(spec), Some(transformer)) => {
                match transformer.transform(&bytes, kind, extension, spec).await {
                    Ok(output) if output.is_empty() => {
                        warn!(hash = %source_hash.short(), "Transform returned no bytes, using original");
                        (bytes, false)
                    }
                    Ok(output) => (output, true),
                    Err(e) => {
                        warn!(hash = %source_hash.short(), error = %e.kind, "Transform failed, using original");
                        (bytes, false)
                    }
                }
            }
            (Some(_), None) => {
                warn!("Trim requested but no transformer configured, using original");
                (bytes, false)
            }
            (None, _) => (bytes, false),
        };

        // Never carry the pre-transform hash forward.
        let (hash, existing) = if transformed {
            let hash = ContentHasher::hash(&final_bytes);
            let existing = self.store.exists(&hash, kind).await?;
            (hash, existing)
        } else {
            (source_hash.clone(), source_existing.clone())
        };

        debug!(
            source = %source_hash.short(),
            hash = %hash.short(),
            transformed,
            source_existing = source_existing.is_some(),
            existing = existing.is_some(),
            "Transform stage complete"
        );

        Ok(TransformOutput {
            bytes: final_bytes,
            hash,
            source_hash,
            source_existing,
            existing,
            transformed,
        })
    }
}
