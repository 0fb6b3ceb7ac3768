//! Integration tests for Guild-Store
//!
//! Exercises the store end to end against the in-memory backend, using its
//! call counters to check which operations reach the backend.

use chrono::{Duration, Utc};
use guild_store::database::{MemoryBackend, Row, Table};
use guild_store::{ArrayOp, FieldValue, Fields, Predicate, Store, StoreError, ValidationError};
use std::sync::Arc;
use tokio_test::{assert_err, assert_ok};

fn setup() -> (Arc<MemoryBackend>, Store) {
    let backend = Arc::new(MemoryBackend::new());
    let store = Store::new(backend.clone());
    (backend, store)
}

fn seed_user(backend: &MemoryBackend, user_id: i64, reputation: i64) {
    backend
        .seed(
            Table::Users,
            Row::new()
                .with("user_id", user_id)
                .with("reputation", reputation),
        )
        .unwrap();
}

#[tokio::test]
async fn test_add_then_get_matches_fetch() {
    let (_backend, store) = setup();

    let added = assert_ok!(
        store
            .add_user(1, Fields::new().set("bio", "hello").set("rep", 5_i64), true)
            .await
    );
    let cached = store.get_user(1).expect("add with cache=true populates the cache");
    let fetched = assert_ok!(store.fetch_user(1, false).await).expect("row exists");

    assert_eq!(cached, added);
    assert_eq!(cached, fetched);
    assert_eq!(cached.reputation, 5);
    assert_eq!(cached.bio.as_deref(), Some("hello"));

    let guild = assert_ok!(
        store
            .add_guild(9, Fields::new().set("autoroles", vec![100_i64]), true)
            .await
    );
    assert_eq!(store.get_guild(9), Some(guild.clone()));
    assert_eq!(
        store.fetch_guild(9, false).await.unwrap(),
        Some(guild.clone())
    );
    assert_eq!(guild.prefix, "!");
    assert!(guild.has_autorole(100));
}

#[tokio::test]
async fn test_add_without_cache_leaves_get_empty() {
    let (_backend, store) = setup();
    assert_ok!(store.add_user(2, Fields::new(), false).await);
    assert!(store.get_user(2).is_none());
}

#[tokio::test]
async fn test_get_never_populates_implicitly() {
    let (backend, store) = setup();
    seed_user(&backend, 3, 10);

    assert!(store.get_user(3).is_none());
    assert_eq!(backend.calls().total(), 0);

    assert_ok!(store.fetch_user(3, false).await);
    assert!(store.get_user(3).is_none());

    assert_ok!(store.fetch_user(3, true).await);
    assert_eq!(store.get_user(3).map(|u| u.reputation), Some(10));
}

#[tokio::test]
async fn test_edit_unknown_field_fails_before_any_call() {
    let (backend, store) = setup();
    let user = assert_ok!(store.add_user(4, Fields::new(), true).await);
    backend.reset_calls();

    let err = assert_err!(
        user.edit(Fields::new().set("unknown_field", 1_i64))
            .await
    );
    assert_eq!(backend.calls().total(), 0);
    assert!(backend.statements().iter().all(|sql| !sql.starts_with("UPDATE")));

    let message = err.to_string();
    assert!(message.contains("unknown_field"));
    for column in Table::Users.column_names() {
        assert!(message.contains(column), "{} missing from: {}", column, message);
    }
    match err {
        StoreError::Validation(ValidationError::UnknownColumn { column, valid, .. }) => {
            assert_eq!(column, "unknown_field");
            assert_eq!(valid.len(), Table::Users.column_names().len());
        }
        other => panic!("expected an unknown column error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_edit_wrong_type_fails_before_any_call() {
    let (backend, store) = setup();
    let user = assert_ok!(store.add_user(5, Fields::new(), true).await);
    backend.reset_calls();

    let err = assert_err!(user.edit(Fields::new().set("reputation", "lots")).await);
    assert_eq!(backend.calls().total(), 0);
    assert!(matches!(
        err,
        StoreError::Validation(ValidationError::TypeMismatch { .. })
    ));
    assert_eq!(store.get_user(5).map(|u| u.reputation), Some(0));
}

#[tokio::test]
async fn test_edit_returns_new_record_and_updates_cache() {
    let (_backend, store) = setup();
    let before = assert_ok!(store.add_user(6, Fields::new(), true).await);

    let after = assert_ok!(before.edit(Fields::new().set("rep", 7_i64)).await);
    assert_eq!(before.reputation, 0);
    assert_eq!(after.reputation, 7);
    assert_eq!(store.get_user(6).map(|u| u.reputation), Some(7));
    assert_eq!(after.get("rep").unwrap(), FieldValue::BigInt(7));
}

#[tokio::test]
async fn test_edit_of_deleted_row_is_not_found() {
    let (_backend, store) = setup();
    let user = assert_ok!(store.add_user(7, Fields::new(), true).await);
    assert_ok!(store.remove_user(7).await);

    let err = assert_err!(user.edit(Fields::new().set("bio", "gone")).await);
    assert!(matches!(err, StoreError::NotFound { .. }));
}

#[tokio::test]
async fn test_edit_where_targets_filter() {
    let (backend, store) = setup();
    seed_user(&backend, 8, 1);
    seed_user(&backend, 9, 1);
    let first = store.fetch_user(8, true).await.unwrap().unwrap();

    let other = assert_ok!(
        first
            .edit_where(Predicate::eq("user_id", 9_i64), Fields::new().set("bio", "other"))
            .await
    );
    assert_eq!(other.user_id, 9);
    assert_eq!(store.fetch_user(8, false).await.unwrap().unwrap().bio, None);
}

#[tokio::test]
async fn test_getch_fetches_once() {
    let (backend, store) = setup();
    seed_user(&backend, 10, 3);

    let first = store.getch::<guild_store::models::User>(10, true).await;
    let second = store.getch::<guild_store::models::User>(10, true).await;
    assert_eq!(first, second);
    assert!(first.is_some());
    assert_eq!(backend.calls().fetchrow, 1);
}

#[tokio::test]
async fn test_getch_without_cache_fetches_every_time() {
    let (backend, store) = setup();
    seed_user(&backend, 11, 3);

    assert!(store.getch::<guild_store::models::User>(11, false).await.is_some());
    assert!(store.getch::<guild_store::models::User>(11, false).await.is_some());
    assert_eq!(backend.calls().fetchrow, 2);
}

#[tokio::test]
async fn test_getch_downgrades_backend_failure() {
    let (backend, store) = setup();
    seed_user(&backend, 12, 3);
    backend.set_failing(true);

    assert!(store.getch::<guild_store::models::User>(12, true).await.is_none());
    assert!(!store.is_blacklisted(12).await);
    assert_eq!(assert_ok!(store.getch_dynamic(Table::Users, "12").await), None);

    // Strict paths still report the failure
    let err = assert_err!(store.fetch_user(12, true).await);
    assert!(err.is_database());
}

#[tokio::test]
async fn test_autorole_round_trip() {
    let (backend, store) = setup();
    let mut guild = assert_ok!(store.add_guild(20, Fields::new(), true).await);

    assert_ok!(guild.add_autorole(555).await);
    assert!(guild.has_autorole(555));
    assert_ok!(guild.add_autorole(555).await);
    assert_eq!(guild.autorole_ids, vec![555]);

    assert_ok!(guild.remove_autorole(555).await);
    assert!(!guild.has_autorole(555));

    let fresh = store.fetch_guild(20, false).await.unwrap().unwrap();
    assert!(fresh.autorole_ids.is_empty());
    assert_eq!(fresh, guild);
    let stored = backend.rows(Table::Guilds);
    assert_eq!(
        stored[0].get("autorole_ids"),
        Some(&FieldValue::Array(Vec::new()))
    );
}

#[tokio::test]
async fn test_badge_holders_round_trip() {
    let (_backend, store) = setup();
    let mut badge = assert_ok!(store.add_badge("early", Some("Early supporter")).await);

    assert_ok!(badge.add(1).await);
    assert_ok!(badge.add(2).await);
    assert_ok!(badge.remove(1).await);
    assert!(!badge.has(1));
    assert!(badge.has(2));

    let fresh = store.fetch_badge("early", false).await.unwrap().unwrap();
    assert_eq!(fresh.users, vec![2]);
}

#[tokio::test]
async fn test_concurrent_appends_keep_both_elements() {
    let (_backend, store) = setup();
    let guild = assert_ok!(store.add_guild(21, Fields::new(), true).await);

    let mut first = guild.clone();
    let mut second = guild.clone();
    let a = tokio::spawn(async move { first.add_autorole(1).await });
    let b = tokio::spawn(async move { second.add_autorole(2).await });
    assert_ok!(a.await.unwrap());
    assert_ok!(b.await.unwrap());

    let mut fresh = store.fetch_guild(21, false).await.unwrap().unwrap().into_model();
    fresh.autorole_ids.sort();
    assert_eq!(fresh.autorole_ids, vec![1, 2]);
}

#[tokio::test]
async fn test_mutate_array_rejects_bad_input_without_calls() {
    let (backend, store) = setup();
    let mut guild = assert_ok!(store.add_guild(22, Fields::new(), true).await);
    backend.reset_calls();

    assert_err!(guild.mutate_array("prefix", ArrayOp::Append, "?").await);
    assert_err!(guild.mutate_array("autoroles", ArrayOp::Append, "not a role").await);
    assert_err!(guild.mutate_array("nope", ArrayOp::Append, 1_i64).await);
    assert_eq!(backend.calls().total(), 0);
}

#[tokio::test]
async fn test_blacklist_scenario() {
    let (_backend, store) = setup();

    let entry = assert_ok!(store.add_blacklist(42, Some("spam")).await);
    assert!(entry.is_blacklisted());
    assert!(entry.blacklisted_until.is_none());

    let temp = assert_ok!(store.add_temp_blacklist(42, 3, None).await);
    let until = temp.blacklisted_until.expect("temporary entry has an expiry");
    let expected = Utc::now() + Duration::days(3);
    assert!((until - expected).num_seconds().abs() < 60);

    let fetched = store.fetch_blacklist(42, false).await.unwrap().unwrap();
    assert!(fetched.blacklisted);
    assert!(store.is_blacklisted(42).await);
    assert!(store.get_guild_blacklist(42).is_none());
}

#[tokio::test]
async fn test_command_toggle_scenario() {
    let (_backend, store) = setup();

    let mut toggles = assert_ok!(store.disable_command(1, "ban").await);
    assert_ok!(toggles.refresh().await);
    assert!(toggles.is_disabled("ban"));

    assert_ok!(store.enable_command(1, "ban").await);
    assert_ok!(toggles.refresh().await);
    assert!(!toggles.is_disabled("ban"));

    assert_ok!(toggles.disable("kick").await);
    assert_ok!(toggles.disable("kick").await);
    assert_eq!(toggles.disabled, vec!["kick".to_string()]);
    let fetched = store.fetch_commands(1, false).await.unwrap().unwrap();
    assert!(fetched.is_disabled("KICK"));
}

#[tokio::test]
async fn test_close_then_reconnect() {
    let (_backend, store) = setup();
    assert_ok!(store.add_user(30, Fields::new(), true).await);

    store.close().await;
    let err = assert_err!(store.fetch_user(30, false).await);
    assert!(err.is_database());
    assert!(store.get_user(30).is_some());

    assert_ok!(store.connect().await);
    assert!(store.fetch_user(30, false).await.unwrap().is_some());
}

#[tokio::test]
async fn test_chunk_populates_caches() {
    let (backend, store) = setup();
    for id in 40..43 {
        seed_user(&backend, id, id);
    }
    assert_ok!(store.add_badge("staff", None).await);
    store.caches().clear(Table::Badges);

    let rows = assert_ok!(store.chunk(&[Table::Users, Table::Badges]).await);
    assert_eq!(rows, 4);
    assert_eq!(store.cache_len(Table::Users), 3);
    assert_eq!(store.cache_len(Table::Badges), 1);
    assert_eq!(store.get_user(41).map(|u| u.reputation), Some(41));
    assert_eq!(backend.calls().fetch, 2);
}

#[tokio::test]
async fn test_remove_evicts_cache() {
    let (backend, store) = setup();
    assert_ok!(store.add_economy(50, true).await);

    let removed = assert_ok!(store.remove_economy(50).await);
    assert_eq!(removed.map(|r| r.user_id), Some(50));
    assert!(store.get_economy(50).is_none());
    assert!(backend.rows(Table::Economy).is_empty());
    assert!(store.fetch_economy(50, true).await.unwrap().is_none());
}

#[tokio::test]
async fn test_duplicate_add_is_database_error() {
    let (_backend, store) = setup();
    assert_ok!(store.add_user(60, Fields::new(), true).await);
    let err = assert_err!(store.add_user(60, Fields::new(), true).await);
    assert!(err.is_database());
}

#[tokio::test]
async fn test_dynamic_lookup_by_table_name() {
    let (backend, store) = setup();
    seed_user(&backend, 70, 2);
    let table: Table = assert_ok!("Users".parse());

    assert_eq!(assert_ok!(store.get_dynamic(table, "70")), None);
    let row = assert_ok!(store.getch_dynamic(table, "70").await).unwrap();
    assert_eq!(row.get("reputation"), Some(&FieldValue::BigInt(2)));
    assert!(assert_ok!(store.get_dynamic(table, "70")).is_some());

    assert!(matches!(
        "members".parse::<Table>(),
        Err(StoreError::UnknownTable(_))
    ));
}

#[tokio::test]
async fn test_edit_where_recaches_every_matched_row() {
    let (backend, store) = setup();
    let first = assert_ok!(store.add_guild_blacklist(1, None).await);
    assert_ok!(store.add_guild_blacklist(2, None).await);

    let edited = assert_ok!(
        first
            .edit_where(
                Predicate::eq("is_blacklisted", true),
                Fields::new().set("blacklisted", false),
            )
            .await
    );
    assert_eq!(edited.guild_id, 1);
    assert!(!edited.blacklisted);

    for guild_id in [1_i64, 2] {
        let cached = store.get_guild_blacklist(guild_id).unwrap();
        assert!(!cached.blacklisted, "guild {} still cached as blacklisted", guild_id);
    }
    assert!(backend
        .rows(Table::GuildBlacklist)
        .iter()
        .all(|row| row.get("blacklisted") == Some(&FieldValue::Bool(false))));
}

#[tokio::test]
async fn test_edit_where_resolves_filter_aliases() {
    let (backend, store) = setup();
    seed_user(&backend, 80, 1);
    seed_user(&backend, 81, 1);
    let first = store.fetch_user(80, true).await.unwrap().unwrap();

    let other = assert_ok!(
        first
            .edit_where(Predicate::eq("id", 81_i64), Fields::new().set("rep", 9_i64))
            .await
    );
    assert_eq!(other.user_id, 81);
    assert_eq!(other.reputation, 9);
    assert_eq!(store.get_user(81).map(|u| u.reputation), Some(9));
}

#[tokio::test]
async fn test_edit_rejects_primary_key() {
    let (backend, store) = setup();
    let user = assert_ok!(store.add_user(90, Fields::new(), true).await);
    backend.reset_calls();

    for column in ["user_id", "id"] {
        let err = assert_err!(user.edit(Fields::new().set(column, 91_i64)).await);
        assert!(matches!(
            err,
            StoreError::Validation(ValidationError::PrimaryKey { .. })
        ));
    }
    assert_eq!(backend.calls().total(), 0);
    assert!(store.get_user(90).is_some());
    assert!(store.fetch_user(91, false).await.unwrap().is_none());
}

#[tokio::test]
async fn test_null_filter_matches_nothing() {
    let (_backend, store) = setup();
    let entry = assert_ok!(store.add_blacklist(100, None).await);

    let err = assert_err!(
        entry
            .edit_where(
                Predicate::eq("reason", FieldValue::Null),
                Fields::new().set("reason", "late"),
            )
            .await
    );
    assert!(matches!(err, StoreError::NotFound { .. }));
    assert_eq!(store.get_blacklist(100).unwrap().reason, None);
}
