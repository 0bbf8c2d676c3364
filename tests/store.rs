use lyricist::record::MAX_TITLE_CHARS;
use lyricist::{MemoryStore, NewTranslation, Section, TranslationStore, TranslationUpdate};

fn record(title: &str) -> NewTranslation {
    NewTranslation {
        title: title.to_owned(),
        lyrics_text: "Hola\nMundo".into(),
        sections: vec![Section {
            kind: "verse".into(),
            original_text: "Hola\nMundo".into(),
            translation_text: "Hello\nWorld".into(),
            analysis_text: "A greeting.".into(),
        }],
    }
}

#[tokio::test]
async fn overlong_title_is_rejected_before_any_write() -> anyhow::Result<()> {
    let store = MemoryStore::new();

    let err = store
        .create("alice", record(&"x".repeat(MAX_TITLE_CHARS + 1)))
        .await
        .unwrap_err();

    assert_eq!(err.code(), "invalid-title");
    assert!(store.list("alice").await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn update_by_another_user_is_unauthorized_and_leaves_record_unchanged() -> anyhow::Result<()>
{
    let store = MemoryStore::new();
    let id = store.create("alice", record("Saludo")).await?;
    let before = store.get("alice", &id).await?;

    let err = store
        .update(
            "bob",
            &id,
            TranslationUpdate {
                lyrics_text: Some("overwritten".into()),
                sections: Some(Vec::new()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();

    assert_eq!(err.code(), "unauthorized");
    assert_eq!(store.get("alice", &id).await?, before);
    Ok(())
}

#[tokio::test]
async fn overwrite_save_refreshes_timestamp_and_order() -> anyhow::Result<()> {
    let store = MemoryStore::new();
    let older = store.create("alice", record("Older")).await?;
    let newer = store.create("alice", record("Newer")).await?;
    let saved_before = store.get("alice", &older).await?.saved_at_millis;

    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    store
        .update(
            "alice",
            &older,
            TranslationUpdate {
                lyrics_text: Some("Hola".into()),
                ..Default::default()
            },
        )
        .await?;

    let listed = store.list("alice").await?;
    assert_eq!(listed[0].id, older);
    assert_eq!(listed[1].id, newer);
    assert!(listed[0].saved_at_millis > saved_before);
    assert!(listed.windows(2).all(|w| w[0].saved_at_millis >= w[1].saved_at_millis));
    Ok(())
}

#[tokio::test]
async fn saved_translation_serializes_with_camel_case_fields() -> anyhow::Result<()> {
    let store = MemoryStore::new();
    let id = store.create("alice", record("Saludo")).await?;
    let json = serde_json::to_value(store.get("alice", &id).await?)?;

    assert_eq!(json["ownerId"], "alice");
    assert_eq!(json["lyricsText"], "Hola\nMundo");
    assert!(json["savedAtMillis"].is_i64());
    assert_eq!(json["sections"][0]["translation"], "Hello\nWorld");
    Ok(())
}
