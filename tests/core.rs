mod common;

#[cfg(test)]
mod tests {
    use super::common::*;
    use cookie::time::Duration as CookieDuration;
    use kv_session::codec::{self, KeyPair};
    use kv_session::serializer::{self, JsonSerializer};
    use kv_session::store::{self, Backend, KvStore, MemoryBackend, SessionStore, StoreConfig};
    use kv_session::{Error, Value};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_new_session_without_cookie() {
        let (backend, store) = memory_store(build_config()).await;

        let session = store.new_session(None, COOKIE_NAME).await.unwrap();

        assert!(session.is_new());
        assert!(session.id().is_none());
        assert!(session.values.is_empty());
        assert!(session.cookie_error().is_none());
        assert_eq!(session.name(), COOKIE_NAME);
        assert_eq!(session.options, build_cookie_options());
        assert!(backend.is_empty());
    }

    #[tokio::test]
    async fn test_save_and_load_round_trip() {
        let (backend, store) = memory_store(build_config()).await;

        let mut session = store.new_session(None, COOKIE_NAME).await.unwrap();
        session.values = create_test_values();
        let cookie = store.save(&mut session).await.unwrap();

        let id = session.id().unwrap().to_string();
        assert!(!id.is_empty());
        assert!(backend.contains_key(&format!("session:{id}")));

        assert_eq!(cookie.name(), COOKIE_NAME);
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(cookie.same_site(), Some(cookie::SameSite::Lax));
        assert_eq!(cookie.max_age(), Some(CookieDuration::seconds(3600)));

        let decoded: String = store.codec().decode(COOKIE_NAME, cookie.value()).unwrap();
        assert_eq!(decoded, id);

        let loaded = store
            .new_session(Some(cookie.value()), COOKIE_NAME)
            .await
            .unwrap();
        assert!(!loaded.is_new());
        assert_eq!(loaded.id(), Some(id.as_str()));
        assert_eq!(loaded.values, create_test_values());
    }

    #[tokio::test]
    async fn test_save_uses_max_age_as_backend_ttl() {
        let (backend, store) = memory_store(build_config()).await;

        let mut session = store.new_session(None, COOKIE_NAME).await.unwrap();
        session.insert("k", "v");
        store.save(&mut session).await.unwrap();

        let key = format!("session:{}", session.id().unwrap());
        let ttl = backend.ttl(&key).unwrap();
        assert!(ttl <= Duration::from_secs(3600));
        assert!(ttl > Duration::from_secs(3590));
    }

    #[tokio::test]
    async fn test_json_serializer_stores_plain_object() {
        let (backend, store) = memory_store(build_config().serializer(JsonSerializer)).await;

        let mut session = store.new_session(None, COOKIE_NAME).await.unwrap();
        session.insert("k", "v");
        store.save(&mut session).await.unwrap();

        let key = format!("session:{}", session.id().unwrap());
        let stored = backend.get(&key).await.unwrap();
        assert_eq!(stored, br#"{"k":"v"}"#);
    }

    #[tokio::test]
    async fn test_save_keeps_session_id() {
        let (backend, store) = memory_store(build_config()).await;

        let mut session = store.new_session(None, COOKIE_NAME).await.unwrap();
        session.insert("count", 1);
        store.save(&mut session).await.unwrap();
        let id = session.id().unwrap().to_string();

        session.insert("count", 2);
        let cookie = store.save(&mut session).await.unwrap();

        assert_eq!(session.id(), Some(id.as_str()));
        assert_eq!(backend.len(), 1);

        let loaded = store
            .new_session(Some(cookie.value()), COOKIE_NAME)
            .await
            .unwrap();
        assert_eq!(loaded.get("count"), Some(&Value::Int(2)));
    }

    #[tokio::test]
    async fn test_custom_key_prefix() {
        let (backend, store) = memory_store(build_config().key_prefix("app:")).await;

        let mut session = store.new_session(None, COOKIE_NAME).await.unwrap();
        session.insert("k", "v");
        store.save(&mut session).await.unwrap();

        let id = session.id().unwrap();
        assert!(backend.contains_key(&format!("app:{id}")));
        assert!(!backend.contains_key(&format!("session:{id}")));
    }

    #[tokio::test]
    async fn test_negative_max_age_deletes_session() {
        let (backend, store) = memory_store(build_config()).await;

        let mut session = store.new_session(None, COOKIE_NAME).await.unwrap();
        session.insert("k", "v");
        let cookie = store.save(&mut session).await.unwrap();
        let key = format!("session:{}", session.id().unwrap());
        assert!(backend.contains_key(&key));

        let mut session = store
            .new_session(Some(cookie.value()), COOKIE_NAME)
            .await
            .unwrap();
        session.options.max_age = -1;
        let cookie = store.save(&mut session).await.unwrap();

        assert!(!backend.contains_key(&key));
        assert_eq!(cookie.name(), COOKIE_NAME);
        assert_eq!(cookie.value(), "");
        assert_eq!(cookie.max_age(), Some(CookieDuration::ZERO));
    }

    #[tokio::test]
    async fn test_zero_max_age_on_new_session_writes_nothing() {
        let (backend, store) = memory_store(build_config()).await;

        let mut session = store.new_session(None, COOKIE_NAME).await.unwrap();
        session.insert("k", "v");
        session.options.max_age = 0;
        let cookie = store.save(&mut session).await.unwrap();

        assert!(backend.is_empty());
        assert!(session.id().is_none());
        assert_eq!(cookie.value(), "");
    }

    #[tokio::test]
    async fn test_payload_too_large() {
        let (backend, store) = memory_store(build_config().max_length(10)).await;

        let mut session = store.new_session(None, COOKIE_NAME).await.unwrap();
        session.insert("data", "x".repeat(50));
        let result = store.save(&mut session).await;

        match result {
            Err(Error::PayloadTooLarge { size, max }) => {
                assert!(size > 10);
                assert_eq!(max, 10);
            }
            other => panic!("expected PayloadTooLarge, got {other:?}"),
        }
        assert!(backend.is_empty());
    }

    #[tokio::test]
    async fn test_max_length_zero_is_unlimited() {
        let (backend, store) = memory_store(build_config().max_length(0)).await;

        let mut session = store.new_session(None, COOKIE_NAME).await.unwrap();
        session.insert("data", "x".repeat(64 * 1024));
        store.save(&mut session).await.unwrap();

        assert_eq!(backend.len(), 1);
    }

    #[tokio::test]
    async fn test_tampered_cookie_gives_fresh_session() {
        let (_backend, store) = memory_store(build_config()).await;

        let mut session = store.new_session(None, COOKIE_NAME).await.unwrap();
        session.insert("k", "v");
        let cookie = store.save(&mut session).await.unwrap();

        let mut tampered = cookie.value().to_string();
        let last = tampered.pop().unwrap();
        tampered.push(if last == 'A' { 'B' } else { 'A' });

        let loaded = store
            .new_session(Some(&tampered), COOKIE_NAME)
            .await
            .unwrap();
        assert!(loaded.is_new());
        assert!(loaded.id().is_none());
        assert!(loaded.values.is_empty());
        assert!(loaded.cookie_error().is_some());
    }

    #[tokio::test]
    async fn test_cookie_for_another_name_is_rejected() {
        let (_backend, store) = memory_store(build_config()).await;

        let mut session = store.new_session(None, "first").await.unwrap();
        session.insert("k", "v");
        let cookie = store.save(&mut session).await.unwrap();

        let loaded = store
            .new_session(Some(cookie.value()), "second")
            .await
            .unwrap();
        assert!(loaded.is_new());
        assert_eq!(
            loaded.cookie_error(),
            Some(&codec::Error::InvalidSignature)
        );
    }

    #[tokio::test]
    async fn test_garbage_cookie_is_malformed() {
        let (_backend, store) = memory_store(build_config()).await;

        let loaded = store
            .new_session(Some("not a token!"), COOKIE_NAME)
            .await
            .unwrap();

        assert!(loaded.is_new());
        assert!(matches!(
            loaded.cookie_error(),
            Some(codec::Error::Malformed(_))
        ));
    }

    #[tokio::test]
    async fn test_unknown_session_gives_fresh_session() {
        let (backend, store) = memory_store(build_config()).await;

        let mut session = store.new_session(None, COOKIE_NAME).await.unwrap();
        session.insert("k", "v");
        let cookie = store.save(&mut session).await.unwrap();

        let key = format!("session:{}", session.id().unwrap());
        backend.delete(&key).await.unwrap();

        let loaded = store
            .new_session(Some(cookie.value()), COOKIE_NAME)
            .await
            .unwrap();
        assert!(loaded.is_new());
        assert!(loaded.id().is_none());
        assert!(loaded.values.is_empty());
        assert!(loaded.cookie_error().is_none());
    }

    #[tokio::test]
    async fn test_expired_backend_entry_gives_fresh_session() {
        let backend = Arc::new(MemoryBackend::new());
        let store = KvStore::connect(Arc::clone(&backend), vec![hash_key()], build_config())
            .await
            .unwrap();

        let token = store.codec().encode(COOKIE_NAME, "short-lived").unwrap();
        backend
            .set("session:short-lived", b"ignored", Duration::ZERO)
            .await
            .unwrap();

        let loaded = store.new_session(Some(&token), COOKIE_NAME).await.unwrap();
        assert!(loaded.is_new());
    }

    #[tokio::test]
    async fn test_empty_session_id_is_malformed() {
        let (_backend, store) = memory_store(build_config()).await;

        let token = store.codec().encode(COOKIE_NAME, "").unwrap();
        let loaded = store.new_session(Some(&token), COOKIE_NAME).await.unwrap();

        assert!(loaded.is_new());
        assert!(matches!(
            loaded.cookie_error(),
            Some(codec::Error::Malformed(_))
        ));
    }

    #[tokio::test]
    async fn test_key_rotation_keeps_old_sessions() {
        let backend = Arc::new(MemoryBackend::new());
        let old_store = KvStore::connect(Arc::clone(&backend), vec![hash_key()], build_config())
            .await
            .unwrap();

        let mut session = old_store.new_session(None, COOKIE_NAME).await.unwrap();
        session.insert("user_id", 7);
        let old_cookie = old_store.save(&mut session).await.unwrap();

        let new_store = KvStore::connect(
            Arc::clone(&backend),
            vec![rotated_hash_key(), hash_key()],
            build_config(),
        )
        .await
        .unwrap();

        let mut loaded = new_store
            .new_session(Some(old_cookie.value()), COOKIE_NAME)
            .await
            .unwrap();
        assert!(!loaded.is_new());
        assert_eq!(loaded.get("user_id"), Some(&Value::Int(7)));

        // Re-saving signs with the newest key only.
        let new_cookie = new_store.save(&mut loaded).await.unwrap();
        let rejected = old_store
            .new_session(Some(new_cookie.value()), COOKIE_NAME)
            .await
            .unwrap();
        assert!(rejected.is_new());
        assert_eq!(
            rejected.cookie_error(),
            Some(&codec::Error::InvalidSignature)
        );
    }

    #[tokio::test]
    async fn test_encrypted_cookies() {
        let backend = Arc::new(MemoryBackend::new());
        let store = KvStore::connect(Arc::clone(&backend), vec![encrypted_key()], build_config())
            .await
            .unwrap();

        let mut session = store.new_session(None, COOKIE_NAME).await.unwrap();
        session.insert("k", "v");
        let cookie = store.save(&mut session).await.unwrap();

        let id = session.id().unwrap();
        assert!(!cookie.value().contains(id));

        let loaded = store
            .new_session(Some(cookie.value()), COOKIE_NAME)
            .await
            .unwrap();
        assert_eq!(loaded.id(), Some(id));
    }

    #[tokio::test]
    async fn test_key_generation_failure() {
        let (backend, store) = memory_store(build_config().key_gen(String::new)).await;

        let mut session = store.new_session(None, COOKIE_NAME).await.unwrap();
        session.insert("k", "v");
        let result = store.save(&mut session).await;

        assert!(matches!(result, Err(Error::KeyGeneration)));
        assert!(session.id().is_none());
        assert!(backend.is_empty());
    }

    #[tokio::test]
    async fn test_custom_key_gen() {
        let (backend, store) =
            memory_store(build_config().key_gen(|| "fixed-session-id".to_string())).await;

        let mut session = store.new_session(None, COOKIE_NAME).await.unwrap();
        store.save(&mut session).await.unwrap();

        assert_eq!(session.id(), Some("fixed-session-id"));
        assert!(backend.contains_key("session:fixed-session-id"));
    }

    #[tokio::test]
    async fn test_serializer_mismatch_fails_to_load() {
        let backend = Arc::new(MemoryBackend::new());
        let binary = KvStore::connect(Arc::clone(&backend), vec![hash_key()], build_config())
            .await
            .unwrap();
        let json = KvStore::connect(
            Arc::clone(&backend),
            vec![hash_key()],
            build_config().serializer(JsonSerializer),
        )
        .await
        .unwrap();

        let mut session = binary.new_session(None, COOKIE_NAME).await.unwrap();
        session.insert("user_id", 1);
        let cookie = binary.save(&mut session).await.unwrap();

        let result = json.new_session(Some(cookie.value()), COOKIE_NAME).await;
        assert!(matches!(
            result,
            Err(Error::Serialization(serializer::Error::Decode(_)))
        ));
    }

    #[tokio::test]
    async fn test_delete_session() {
        let (backend, store) = memory_store(build_config()).await;

        let mut session = store.new_session(None, COOKIE_NAME).await.unwrap();
        session.insert("k", "v");
        let cookie = store.save(&mut session).await.unwrap();
        assert_eq!(backend.len(), 1);

        let session = store
            .new_session(Some(cookie.value()), COOKIE_NAME)
            .await
            .unwrap();
        let removal = store.delete(&session).await.unwrap();

        assert!(backend.is_empty());
        assert_eq!(removal.name(), COOKIE_NAME);
        assert_eq!(removal.value(), "");
        assert_eq!(removal.max_age(), Some(CookieDuration::ZERO));

        let reloaded = store
            .new_session(Some(cookie.value()), COOKIE_NAME)
            .await
            .unwrap();
        assert!(reloaded.is_new());
    }

    #[tokio::test]
    async fn test_delete_unsaved_session() {
        let (backend, store) = memory_store(build_config()).await;

        let session = store.new_session(None, COOKIE_NAME).await.unwrap();
        let removal = store.delete(&session).await.unwrap();

        assert!(backend.is_empty());
        assert_eq!(removal.value(), "");
    }

    #[tokio::test]
    async fn test_session_options_are_independent() {
        let (_backend, store) = memory_store(build_config()).await;

        let mut first = store.new_session(None, COOKIE_NAME).await.unwrap();
        first.options.max_age = 60;
        first.options.path = Some("/admin".to_string());

        let second = store.new_session(None, COOKIE_NAME).await.unwrap();
        assert_eq!(second.options, build_cookie_options());
        assert_eq!(store.config().options, build_cookie_options());
    }

    #[tokio::test]
    async fn test_set_max_age_updates_options_and_codec() {
        let (_backend, mut store) = memory_store(build_config()).await;
        assert_eq!(store.codec().max_age(), 3600);

        store.set_max_age(120);

        assert_eq!(store.config().options.max_age, 120);
        assert_eq!(store.codec().max_age(), 120);

        let session = store.new_session(None, COOKIE_NAME).await.unwrap();
        assert_eq!(session.options.max_age, 120);
    }

    #[tokio::test]
    async fn test_set_options_updates_codec_max_age() {
        let (_backend, mut store) = memory_store(build_config()).await;
        assert_eq!(store.codec().max_age(), 3600);

        store.set_options(build_cookie_options().max_age(7200));
        assert_eq!(store.config().options.max_age, 7200);
        assert_eq!(store.codec().max_age(), store.config().options.max_age);

        // A non-positive max age deletes on save and leaves the age limit alone.
        store.set_options(build_cookie_options().max_age(-1));
        assert_eq!(store.config().options.max_age, -1);
        assert_eq!(store.codec().max_age(), 7200);
    }

    #[tokio::test]
    async fn test_flashes_survive_one_save() {
        let (_backend, store) = memory_store(build_config()).await;

        let mut session = store.new_session(None, COOKIE_NAME).await.unwrap();
        session.add_flash("saved", None);
        session.add_flash("welcome back", None);
        session.add_flash(3, Some("notices"));
        let cookie = store.save(&mut session).await.unwrap();

        let mut loaded = store
            .new_session(Some(cookie.value()), COOKIE_NAME)
            .await
            .unwrap();
        assert_eq!(
            loaded.flashes(None),
            vec![Value::from("saved"), Value::from("welcome back")]
        );
        assert_eq!(loaded.flashes(Some("notices")), vec![Value::Int(3)]);
        let cookie = store.save(&mut loaded).await.unwrap();

        let mut reloaded = store
            .new_session(Some(cookie.value()), COOKIE_NAME)
            .await
            .unwrap();
        assert!(reloaded.flashes(None).is_empty());
    }

    #[tokio::test]
    async fn test_backend_errors_are_surfaced() {
        let store = KvStore::connect(
            Arc::new(UnavailableBackend { reachable: true }),
            vec![hash_key()],
            build_config(),
        )
        .await
        .unwrap();

        let mut session = store.new_session(None, COOKIE_NAME).await.unwrap();
        session.insert("k", "v");
        let result = store.save(&mut session).await;
        assert!(matches!(
            result,
            Err(Error::Backend(store::Error::Backend(_)))
        ));

        let token = store.codec().encode(COOKIE_NAME, "some-id").unwrap();
        let result = store.new_session(Some(&token), COOKIE_NAME).await;
        assert!(matches!(
            result,
            Err(Error::Backend(store::Error::Backend(_)))
        ));
    }

    #[tokio::test]
    async fn test_connect_fails_for_unreachable_backend() {
        let result = KvStore::connect(
            Arc::new(UnavailableBackend::default()),
            vec![hash_key()],
            StoreConfig::default(),
        )
        .await;

        assert!(matches!(result, Err(Error::Configuration(_))));
    }

    #[tokio::test]
    async fn test_connect_fails_for_invalid_keys() {
        let no_keys = KvStore::connect(
            Arc::new(MemoryBackend::new()),
            Vec::new(),
            StoreConfig::default(),
        )
        .await;
        assert!(matches!(no_keys, Err(Error::Configuration(_))));

        let bad_block_key = KvStore::connect(
            Arc::new(MemoryBackend::new()),
            vec![KeyPair::new("hash-key").with_block_key(*b"short")],
            StoreConfig::default(),
        )
        .await;
        assert!(matches!(bad_block_key, Err(Error::Configuration(_))));
    }

    #[tokio::test]
    async fn test_close() {
        let (_backend, store) = memory_store(build_config()).await;
        store.close().await.unwrap();
    }
}
