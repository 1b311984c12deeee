//! Durable coupon repository: an in-memory map keyed by coupon id, fully
//! rewritten to a JSON file after every mutation.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::Utc;
use couponhub_core::Coupon;
use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;

use crate::error::IngestError;
use crate::normalize::deduplicate_coupons;

/// Counts returned by [`CouponStore::save_coupons`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SaveOutcome {
    pub added: usize,
    pub updated: usize,
}

/// Sole owner of the coupon set.
///
/// Mutations hold the write lock across both the merge and the file
/// rewrite, so concurrent saves are serialized. The new state only becomes
/// visible once it has been written durably.
#[derive(Debug)]
pub struct CouponStore {
    path: PathBuf,
    coupons: RwLock<BTreeMap<String, Coupon>>,
}

impl CouponStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            coupons: RwLock::new(BTreeMap::new()),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the backing file, replacing the in-memory state. A missing file
    /// is an empty store. Returns the number of coupons loaded.
    ///
    /// # Errors
    ///
    /// - [`IngestError::Persistence`] if the directory cannot be created or
    ///   the file cannot be read.
    /// - [`IngestError::CorruptStore`] if the file is not a JSON array of
    ///   coupons.
    pub async fn initialize(&self) -> Result<usize, IngestError> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|source| self.persistence_error(source))?;
        }

        let loaded = match tokio::fs::read(&self.path).await {
            Ok(bytes) => serde_json::from_slice::<Vec<Coupon>>(&bytes).map_err(|source| {
                IngestError::CorruptStore {
                    path: self.path.display().to_string(),
                    source,
                }
            })?,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::info!(path = %self.path.display(), "store: no existing file, starting empty");
                Vec::new()
            }
            Err(source) => return Err(self.persistence_error(source)),
        };

        let map: BTreeMap<String, Coupon> = deduplicate_coupons(loaded)
            .into_iter()
            .map(|c| (c.id.clone(), c))
            .collect();
        let count = map.len();
        *self.coupons.write().await = map;

        tracing::info!(path = %self.path.display(), count, "store: loaded coupons");
        Ok(count)
    }

    /// Upserts a batch of normalized coupons and persists the whole store.
    ///
    /// A new id is inserted and counted as added. A known id keeps its
    /// `scraped_at` and has only description, expiry, terms URL, discount
    /// value, minimum order and `last_verified` overwritten.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError::Persistence`] if the rewrite fails; in that case
    /// the in-memory state is left unchanged.
    pub async fn save_coupons(&self, coupons: Vec<Coupon>) -> Result<SaveOutcome, IngestError> {
        let mut guard = self.coupons.write().await;
        let mut next = guard.clone();
        let mut outcome = SaveOutcome::default();

        for coupon in coupons {
            if let Some(existing) = next.get_mut(&coupon.id) {
                existing.description = coupon.description;
                existing.expires_at = coupon.expires_at;
                existing.terms_url = coupon.terms_url;
                existing.discount_value = coupon.discount_value;
                existing.min_order_value = coupon.min_order_value;
                existing.last_verified = coupon.last_verified;
                outcome.updated += 1;
            } else {
                next.insert(coupon.id.clone(), coupon);
                outcome.added += 1;
            }
        }

        self.persist(&next).await?;
        *guard = next;

        tracing::debug!(
            added = outcome.added,
            updated = outcome.updated,
            total = guard.len(),
            "store: saved coupons"
        );
        Ok(outcome)
    }

    pub async fn all(&self) -> Vec<Coupon> {
        self.coupons.read().await.values().cloned().collect()
    }

    /// Coupons whose vendor is exactly `vendor`.
    pub async fn by_vendor(&self, vendor: &str) -> Vec<Coupon> {
        self.coupons
            .read()
            .await
            .values()
            .filter(|c| c.vendor == vendor)
            .cloned()
            .collect()
    }

    /// Coupons with no expiry or an expiry after now.
    pub async fn active(&self) -> Vec<Coupon> {
        let now = Utc::now();
        self.coupons
            .read()
            .await
            .values()
            .filter(|c| c.is_active_at(now))
            .cloned()
            .collect()
    }

    pub async fn by_id(&self, id: &str) -> Option<Coupon> {
        self.coupons.read().await.get(id).cloned()
    }

    pub async fn total_count(&self) -> usize {
        self.coupons.read().await.len()
    }

    pub async fn active_count(&self) -> usize {
        let now = Utc::now();
        self.coupons
            .read()
            .await
            .values()
            .filter(|c| c.is_active_at(now))
            .count()
    }

    /// Removes a coupon and persists. Returns `false` (without writing) when
    /// the id is unknown.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError::Persistence`] if the rewrite fails.
    pub async fn delete(&self, id: &str) -> Result<bool, IngestError> {
        let mut guard = self.coupons.write().await;
        if !guard.contains_key(id) {
            return Ok(false);
        }
        let mut next = guard.clone();
        next.remove(id);
        self.persist(&next).await?;
        *guard = next;
        tracing::info!(id, "store: deleted coupon");
        Ok(true)
    }

    /// Empties the store and persists.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError::Persistence`] if the rewrite fails.
    pub async fn clear(&self) -> Result<(), IngestError> {
        let mut guard = self.coupons.write().await;
        let next = BTreeMap::new();
        self.persist(&next).await?;
        let removed = guard.len();
        *guard = next;
        tracing::info!(removed, "store: cleared");
        Ok(())
    }

    /// Rewrites the backing file from the current in-memory state.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError::Persistence`] if the rewrite fails.
    pub async fn flush(&self) -> Result<(), IngestError> {
        let guard = self.coupons.write().await;
        self.persist(&guard).await
    }

    /// Writes `coupons` to a sibling temp file, syncs it, then renames it over
    /// the backing file so a crash mid-write leaves the previous file intact.
    async fn persist(&self, coupons: &BTreeMap<String, Coupon>) -> Result<(), IngestError> {
        let records: Vec<&Coupon> = coupons.values().collect();
        let body = serde_json::to_vec_pretty(&records)
            .map_err(|e| self.persistence_error(std::io::Error::other(e)))?;

        let tmp = self.tmp_path();
        let write = async {
            let mut file = tokio::fs::File::create(&tmp).await?;
            file.write_all(&body).await?;
            file.sync_all().await?;
            drop(file);
            tokio::fs::rename(&tmp, &self.path).await
        };

        if let Err(source) = write.await {
            tracing::error!(path = %self.path.display(), error = %source, "store: persist failed");
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(self.persistence_error(source));
        }
        Ok(())
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(std::ffi::OsStr::to_os_string)
            .unwrap_or_else(|| "coupons.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn persistence_error(&self, source: std::io::Error) -> IngestError {
        IngestError::Persistence {
            path: self.path.display().to_string(),
            source,
        }
    }
}

#[cfg(test)]
#[path = "store_test.rs"]
mod tests;
