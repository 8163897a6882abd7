//! Admin mutations: promote, block, report, delete
//!
//! These never touch `count`. Unlike the recording path, failures are
//! returned to the caller as [`AdminError`].

use chrono::Utc;

use super::backend::{DocPath, Precondition, WriteBatch};
use super::{RemoteSuggestionStore, SuggestionRef};
use crate::error::{AdminError, StoreError};
use crate::suggestion::Suggestion;

/// Moderation fields to change; `None` leaves a field alone
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdminUpdate {
    pub is_promoted: Option<bool>,
    pub is_blocked: Option<bool>,
    /// Stored when blocking, cleared when unblocking
    pub block_reason: Option<String>,
    pub report_count: Option<u32>,
}

impl AdminUpdate {
    pub fn promote() -> Self {
        Self {
            is_promoted: Some(true),
            ..Self::default()
        }
    }

    pub fn demote() -> Self {
        Self {
            is_promoted: Some(false),
            ..Self::default()
        }
    }

    pub fn block(reason: Option<String>) -> Self {
        Self {
            is_blocked: Some(true),
            block_reason: reason,
            ..Self::default()
        }
    }

    pub fn unblock() -> Self {
        Self {
            is_blocked: Some(false),
            ..Self::default()
        }
    }

    pub fn reset_reports() -> Self {
        Self {
            report_count: Some(0),
            ..Self::default()
        }
    }

    fn apply(&self, doc: &mut Suggestion) {
        if let Some(promoted) = self.is_promoted {
            doc.is_promoted = promoted;
        }
        match self.is_blocked {
            Some(true) => {
                doc.is_blocked = true;
                doc.block_reason = self.block_reason.clone();
            }
            Some(false) => {
                doc.is_blocked = false;
                doc.block_reason = None;
            }
            None => {}
        }
        if let Some(reports) = self.report_count {
            doc.report_count = reports;
        }
    }
}

impl RemoteSuggestionStore {
    /// Apply a moderation change and stamp `moderated_at`.
    pub async fn update(
        &self,
        target: &SuggestionRef,
        update: &AdminUpdate,
    ) -> Result<Suggestion, AdminError> {
        self.mutate(target, |doc| update.apply(doc)).await
    }

    /// Count one more user report against a suggestion.
    pub async fn report(&self, target: &SuggestionRef) -> Result<Suggestion, AdminError> {
        self.mutate(target, |doc| doc.report_count = doc.report_count.saturating_add(1))
            .await
    }

    /// Physically remove a suggestion. Units under a deleted faction stay.
    pub async fn delete(&self, target: &SuggestionRef) -> Result<(), AdminError> {
        let (path, scope) = target.resolve().map_err(StoreError::from)?;

        for _ in 0..self.options.max_transaction_attempts.max(1) {
            let snapshot = self
                .timed(self.backend.get(&path))
                .await?
                .filter(|snapshot| snapshot.doc.in_scope(&scope))
                .ok_or_else(|| not_found(&path))?;

            let mut batch = WriteBatch::new();
            batch.delete(path.clone(), Precondition::Revision(snapshot.revision));
            match self.timed(self.backend.commit(batch)).await {
                Ok(()) => {
                    log::debug!("Deleted suggestion {}", path);
                    return Ok(());
                }
                Err(StoreError::Conflict) => continue,
                Err(e) => return Err(e.into()),
            }
        }

        Err(StoreError::TooManyConflicts {
            attempts: self.options.max_transaction_attempts,
        }
        .into())
    }

    async fn mutate<F>(&self, target: &SuggestionRef, change: F) -> Result<Suggestion, AdminError>
    where
        F: Fn(&mut Suggestion) + Send + Sync,
    {
        let (path, scope) = target.resolve().map_err(StoreError::from)?;

        for _ in 0..self.options.max_transaction_attempts.max(1) {
            let snapshot = self
                .timed(self.backend.get(&path))
                .await?
                .filter(|snapshot| snapshot.doc.in_scope(&scope))
                .ok_or_else(|| not_found(&path))?;

            let mut doc = snapshot.doc;
            change(&mut doc);
            doc.moderated_at = Some(Utc::now());

            let mut batch = WriteBatch::new();
            batch.put(
                path.clone(),
                doc.clone(),
                Precondition::Revision(snapshot.revision),
            );
            match self.timed(self.backend.commit(batch)).await {
                Ok(()) => return Ok(doc),
                Err(StoreError::Conflict) => continue,
                Err(e) => return Err(e.into()),
            }
        }

        Err(StoreError::TooManyConflicts {
            attempts: self.options.max_transaction_attempts,
        }
        .into())
    }
}

fn not_found(path: &DocPath) -> AdminError {
    AdminError::NotFound {
        path: path.to_string(),
    }
}
