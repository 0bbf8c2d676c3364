//! Per-user persistence of saved translations.
//!
//! [`TranslationStore`] is the seam to whatever document database holds the records. Every
//! mutation follows the same order: existence, then ownership (fail closed), then field
//! validation, then the write, which refreshes `saved_at_millis`. A rejected mutation
//! leaves the stored record untouched.

use std::collections::HashMap;
use std::future::Future;
use std::time::{SystemTime, UNIX_EPOCH};

use tokio::sync::RwLock;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::record::{NewTranslation, SavedTranslation, Section, TranslationUpdate, validate_title};
use crate::{Error, Result};

pub trait TranslationStore: Send + Sync {
    /// Validate and store a new record for `owner_id`, returning its id.
    fn create(
        &self,
        owner_id: &str,
        record: NewTranslation,
    ) -> impl Future<Output = Result<String>> + Send;

    fn get(&self, owner_id: &str, id: &str)
    -> impl Future<Output = Result<SavedTranslation>> + Send;

    /// Overwrite the fields present in `update`.
    fn update(
        &self,
        owner_id: &str,
        id: &str,
        update: TranslationUpdate,
    ) -> impl Future<Output = Result<()>> + Send;

    fn rename(
        &self,
        owner_id: &str,
        id: &str,
        title: &str,
    ) -> impl Future<Output = Result<()>> + Send;

    fn delete(&self, owner_id: &str, id: &str) -> impl Future<Output = Result<()>> + Send;

    /// Every record owned by `owner_id`, most recently saved first.
    fn list(&self, owner_id: &str) -> impl Future<Output = Result<Vec<SavedTranslation>>> + Send;
}

/// A record as held by [`MemoryStore`], with its native timestamp.
#[derive(Debug, Clone)]
struct StoredTranslation {
    owner_id: String,
    title: String,
    lyrics_text: String,
    sections: Vec<Section>,
    saved_at: SystemTime,
    /// Store-wide mutation counter, used to order records saved within the same millisecond.
    revision: u64,
}

impl StoredTranslation {
    fn to_record(&self, id: &str) -> SavedTranslation {
        SavedTranslation {
            id: id.to_owned(),
            owner_id: self.owner_id.clone(),
            title: self.title.clone(),
            lyrics_text: self.lyrics_text.clone(),
            sections: self.sections.clone(),
            saved_at_millis: to_millis(self.saved_at),
        }
    }

    fn touch(&mut self, revision: u64) {
        self.saved_at = SystemTime::now();
        self.revision = revision;
    }
}

fn to_millis(t: SystemTime) -> i64 {
    match t.duration_since(UNIX_EPOCH) {
        Ok(d) => i64::try_from(d.as_millis()).unwrap_or(i64::MAX),
        Err(err) => -i64::try_from(err.duration().as_millis()).unwrap_or(i64::MAX),
    }
}

#[derive(Debug, Default)]
struct Inner {
    records: HashMap<String, StoredTranslation>,
    revision: u64,
}

impl Inner {
    fn next_revision(&mut self) -> u64 {
        self.revision += 1;
        self.revision
    }

    /// Look up `id` for mutation by `owner_id`.
    fn owned_mut(&mut self, owner_id: &str, id: &str) -> Result<&mut StoredTranslation> {
        let stored = self
            .records
            .get_mut(id)
            .ok_or_else(|| Error::NotFound(id.to_owned()))?;

        if stored.owner_id != owner_id {
            warn!(id, "rejected access to translation owned by another user");
            return Err(Error::Unauthorized(id.to_owned()));
        }

        Ok(stored)
    }
}

/// In-process [`TranslationStore`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TranslationStore for MemoryStore {
    async fn create(&self, owner_id: &str, record: NewTranslation) -> Result<String> {
        if owner_id.is_empty() {
            return Err(Error::invalid_input("owner id must be provided"));
        }
        let record = record.validated()?;

        let mut inner = self.inner.write().await;
        let id = Uuid::new_v4().to_string();
        let revision = inner.next_revision();
        inner.records.insert(
            id.clone(),
            StoredTranslation {
                owner_id: owner_id.to_owned(),
                title: record.title,
                lyrics_text: record.lyrics_text,
                sections: record.sections,
                saved_at: SystemTime::now(),
                revision,
            },
        );

        debug!(%id, owner_id, "created translation");
        Ok(id)
    }

    async fn get(&self, owner_id: &str, id: &str) -> Result<SavedTranslation> {
        let inner = self.inner.read().await;
        let stored = inner
            .records
            .get(id)
            .ok_or_else(|| Error::NotFound(id.to_owned()))?;

        if stored.owner_id != owner_id {
            return Err(Error::Unauthorized(id.to_owned()));
        }

        Ok(stored.to_record(id))
    }

    async fn update(&self, owner_id: &str, id: &str, update: TranslationUpdate) -> Result<()> {
        let mut inner = self.inner.write().await;
        inner.owned_mut(owner_id, id)?;
        let update = update.validated()?;

        let revision = inner.next_revision();
        let stored = inner.owned_mut(owner_id, id)?;
        if let Some(title) = update.title {
            stored.title = title;
        }
        if let Some(lyrics_text) = update.lyrics_text {
            stored.lyrics_text = lyrics_text;
        }
        if let Some(sections) = update.sections {
            stored.sections = sections;
        }
        stored.touch(revision);

        debug!(id, "updated translation");
        Ok(())
    }

    async fn rename(&self, owner_id: &str, id: &str, title: &str) -> Result<()> {
        let mut inner = self.inner.write().await;
        inner.owned_mut(owner_id, id)?;
        let title = validate_title(title)?;

        let revision = inner.next_revision();
        let stored = inner.owned_mut(owner_id, id)?;
        stored.title = title;
        stored.touch(revision);

        debug!(id, "renamed translation");
        Ok(())
    }

    async fn delete(&self, owner_id: &str, id: &str) -> Result<()> {
        let mut inner = self.inner.write().await;
        inner.owned_mut(owner_id, id)?;
        inner.records.remove(id);

        debug!(id, "deleted translation");
        Ok(())
    }

    async fn list(&self, owner_id: &str) -> Result<Vec<SavedTranslation>> {
        let inner = self.inner.read().await;
        let mut owned: Vec<(&String, &StoredTranslation)> = inner
            .records
            .iter()
            .filter(|(_, stored)| stored.owner_id == owner_id)
            .collect();

        owned.sort_by(|(_, a), (_, b)| {
            b.saved_at
                .cmp(&a.saved_at)
                .then_with(|| b.revision.cmp(&a.revision))
        });

        Ok(owned
            .into_iter()
            .map(|(id, stored)| stored.to_record(id))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::MAX_TITLE_CHARS;

    fn new_record(title: &str) -> NewTranslation {
        NewTranslation {
            title: title.to_owned(),
            lyrics_text: "la la".into(),
            sections: vec![Section {
                kind: "verse".into(),
                original_text: "la la".into(),
                translation_text: "the the".into(),
                analysis_text: String::new(),
            }],
        }
    }

    #[tokio::test]
    async fn create_then_get_round_trips_fields() -> anyhow::Result<()> {
        let store = MemoryStore::new();
        let id = store.create("alice", new_record("  Song  ")).await?;

        let saved = store.get("alice", &id).await?;
        assert_eq!(saved.id, id);
        assert_eq!(saved.owner_id, "alice");
        assert_eq!(saved.title, "Song");
        assert_eq!(saved.sections.len(), 1);
        assert!(saved.saved_at_millis > 0);
        Ok(())
    }

    #[tokio::test]
    async fn long_title_is_rejected_before_write() -> anyhow::Result<()> {
        let store = MemoryStore::new();
        let err = store
            .create("alice", new_record(&"t".repeat(MAX_TITLE_CHARS + 1)))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "invalid-title");
        assert!(store.list("alice").await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn foreign_owner_cannot_mutate() -> anyhow::Result<()> {
        let store = MemoryStore::new();
        let id = store.create("alice", new_record("Mine")).await?;
        let before = store.get("alice", &id).await?;

        let err = store
            .update(
                "mallory",
                &id,
                TranslationUpdate {
                    title: Some("Stolen".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.code(), "unauthorized");
        assert_eq!(
            store.rename("mallory", &id, "x").await.unwrap_err().code(),
            "unauthorized"
        );
        assert_eq!(
            store.delete("mallory", &id).await.unwrap_err().code(),
            "unauthorized"
        );
        assert_eq!(
            store.get("mallory", &id).await.unwrap_err().code(),
            "unauthorized"
        );

        assert_eq!(store.get("alice", &id).await?, before);
        Ok(())
    }

    #[tokio::test]
    async fn missing_record_is_not_found() {
        let store = MemoryStore::new();
        assert_eq!(
            store.delete("alice", "nope").await.unwrap_err().code(),
            "not-found"
        );
        assert_eq!(
            store.rename("alice", "nope", "t").await.unwrap_err().code(),
            "not-found"
        );
    }

    #[tokio::test]
    async fn not_found_wins_over_validation() {
        let store = MemoryStore::new();
        let err = store.rename("alice", "nope", "").await.unwrap_err();
        assert_eq!(err.code(), "not-found");
    }

    #[tokio::test]
    async fn list_is_per_owner_newest_first() -> anyhow::Result<()> {
        let store = MemoryStore::new();
        let first = store.create("alice", new_record("first")).await?;
        let second = store.create("alice", new_record("second")).await?;
        store.create("bob", new_record("bob's")).await?;

        let ids: Vec<_> = store.list("alice").await?.into_iter().map(|r| r.id).collect();
        assert_eq!(ids, [second.clone(), first.clone()]);

        // Renaming refreshes the timestamp and moves the record to the front.
        store.rename("alice", &first, "first, renamed").await?;
        let listed = store.list("alice").await?;
        assert_eq!(listed[0].id, first);
        assert_eq!(listed[0].title, "first, renamed");
        Ok(())
    }

    #[tokio::test]
    async fn update_overwrites_present_fields_only() -> anyhow::Result<()> {
        let store = MemoryStore::new();
        let id = store.create("alice", new_record("Song")).await?;

        store
            .update(
                "alice",
                &id,
                TranslationUpdate {
                    lyrics_text: Some("new lyrics".into()),
                    sections: Some(Vec::new()),
                    ..Default::default()
                },
            )
            .await?;

        let saved = store.get("alice", &id).await?;
        assert_eq!(saved.title, "Song");
        assert_eq!(saved.lyrics_text, "new lyrics");
        assert!(saved.sections.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn delete_removes_record() -> anyhow::Result<()> {
        let store = MemoryStore::new();
        let id = store.create("alice", new_record("Song")).await?;
        store.delete("alice", &id).await?;
        assert_eq!(
            store.get("alice", &id).await.unwrap_err().code(),
            "not-found"
        );
        Ok(())
    }
}
