use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use kvcache_client::{
    CacheError, ClientConfig, ExpiryPolicy, ExpiryUnit, KeyTtl, KeyValueCacheClient,
};
use kvcache_engine::{ManualClock, MemoryStore};

/// Starts an in-process store on an ephemeral port, driven by a manual clock.
fn start_store() -> (KeyValueCacheClient, ManualClock) {
    let clock = ManualClock::new();
    let store = Arc::new(MemoryStore::with_clock(clock.clone()));

    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("addr").to_string();
    listener.set_nonblocking(true).expect("nonblocking");

    thread::spawn(move || {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .expect("runtime");
        runtime.block_on(async move {
            let listener = tokio::net::TcpListener::from_std(listener).expect("listener");
            let _ = kvcache_server::serve(listener, store).await;
        });
    });

    let config = ClientConfig {
        addr,
        read_timeout: Some(Duration::from_secs(2)),
        write_timeout: Some(Duration::from_secs(2)),
        connect_timeout: Some(Duration::from_secs(2)),
        ..ClientConfig::default()
    };
    let cache = KeyValueCacheClient::from_config(config, ExpiryPolicy::default()).expect("client");
    (cache, clock)
}

#[test]
fn string_round_trip_and_overwrite() {
    let (cache, _) = start_store();
    cache.ping().expect("ping");

    cache.set_string("greeting", "hello").unwrap();
    assert_eq!(cache.get_string("greeting").unwrap().as_deref(), Some("hello"));
    cache.set_string("greeting", "").unwrap();
    assert_eq!(cache.get_string("greeting").unwrap().as_deref(), Some(""));
    assert_eq!(cache.get_string("absent").unwrap(), None);
    assert_eq!(cache.ttl("greeting").unwrap(), KeyTtl::NoExpiry);
}

#[test]
fn expiring_string_disappears_after_ttl() {
    let (cache, clock) = start_store();

    cache
        .set_string_with_expiry("token", "abc", 1, ExpiryUnit::Seconds)
        .unwrap();
    assert_eq!(cache.get_string("token").unwrap().as_deref(), Some("abc"));

    clock.advance(Duration::from_millis(1100));
    assert_eq!(cache.get_string("token").unwrap(), None);
    assert_eq!(cache.ttl("token").unwrap(), KeyTtl::Missing);
}

#[test]
fn millisecond_expiry_is_honoured() {
    let (cache, clock) = start_store();

    cache
        .set_string_with_expiry("blip", "x", 250, ExpiryUnit::Milliseconds)
        .unwrap();
    clock.advance(Duration::from_millis(200));
    assert_eq!(cache.get_string("blip").unwrap().as_deref(), Some("x"));
    clock.advance(Duration::from_millis(100));
    assert_eq!(cache.get_string("blip").unwrap(), None);
}

#[test]
fn default_expiry_applies_ten_minutes() {
    let (cache, clock) = start_store();

    cache.set_string_with_default_expiry("page", "cached").unwrap();
    match cache.ttl("page").unwrap() {
        KeyTtl::ExpiresIn(left) => assert!(left <= Duration::from_secs(600) && left > Duration::from_secs(599)),
        other => panic!("unexpected ttl {:?}", other),
    }

    clock.advance(Duration::from_secs(599));
    assert!(cache.get_string("page").unwrap().is_some());
    clock.advance(Duration::from_secs(2));
    assert_eq!(cache.get_string("page").unwrap(), None);
}

#[test]
fn derived_policy_does_not_leak_into_original() {
    let (cache, clock) = start_store();
    let short = cache.with_default_expiry(ExpiryPolicy::new(5, ExpiryUnit::Seconds));

    short.set_string_with_default_expiry("short", "1").unwrap();
    cache.set_string_with_default_expiry("long", "2").unwrap();

    clock.advance(Duration::from_secs(6));
    assert_eq!(cache.get_string("short").unwrap(), None);
    assert_eq!(cache.get_string("long").unwrap().as_deref(), Some("2"));
}

#[test]
fn expire_and_delete_keys() {
    let (cache, clock) = start_store();

    cache.set_string("a", "1").unwrap();
    cache.set_string("b", "2").unwrap();
    assert!(cache.expire("a", 2, ExpiryUnit::Seconds).unwrap());
    assert!(!cache.expire("nope", 2, ExpiryUnit::Seconds).unwrap());
    clock.advance(Duration::from_secs(3));
    assert_eq!(cache.get_string("a").unwrap(), None);

    cache.list_append("c", "x").unwrap();
    assert_eq!(cache.delete_keys(&["b", "c", "missing"]).unwrap(), 2);
    assert_eq!(cache.delete_key("b").unwrap(), 0);
    assert!(cache.list_all("c").unwrap().is_empty());
}

#[test]
fn hash_operations() {
    let (cache, _) = start_store();

    let mut user = HashMap::new();
    user.insert("name", "ada");
    user.insert("lang", "en");
    cache.hash_set_all("user:1", user).unwrap();
    cache.hash_set("user:1", "lang", "fr").unwrap();

    assert_eq!(cache.hash_get("user:1", "name").unwrap().as_deref(), Some("ada"));
    assert_eq!(cache.hash_get("user:1", "lang").unwrap().as_deref(), Some("fr"));
    assert_eq!(cache.hash_get("user:1", "age").unwrap(), None);
    assert_eq!(cache.hash_get("user:2", "name").unwrap(), None);

    let fields: HashSet<String> = ["name", "lang"].iter().map(|f| f.to_string()).collect();
    assert_eq!(cache.hash_keys("user:1").unwrap(), fields);
    assert!(cache.hash_keys("user:2").unwrap().is_empty());

    assert_eq!(
        cache.hash_get_multi("user:1", &["lang", "age", "name"]).unwrap(),
        vec![Some("fr".to_string()), None, Some("ada".to_string())]
    );
    assert_eq!(
        cache.hash_get_multi("user:2", &["name"]).unwrap(),
        vec![None]
    );

    let all = cache.hash_get_all("user:1").unwrap();
    assert_eq!(all.get("name").map(String::as_str), Some("ada"));
    assert_eq!(all.len(), 2);

    assert_eq!(cache.hash_delete_fields("user:1", &["lang", "age"]).unwrap(), 1);
    assert_eq!(cache.hash_get("user:1", "lang").unwrap(), None);
    assert_eq!(cache.hash_delete_fields("user:1", &["name"]).unwrap(), 1);
    assert!(cache.hash_get_all("user:1").unwrap().is_empty());
}

#[test]
fn list_append_and_range() {
    let (cache, _) = start_store();

    assert_eq!(cache.list_append("queue", "a").unwrap(), 1);
    assert_eq!(cache.list_append("queue", "b").unwrap(), 2);
    assert_eq!(cache.list_append("queue", "c").unwrap(), 3);

    assert_eq!(cache.list_all("queue").unwrap(), vec!["a", "b", "c"]);
    assert_eq!(cache.list_range("queue", 1, 1).unwrap(), vec!["b"]);
    assert_eq!(cache.list_range("queue", -2, -1).unwrap(), vec!["b", "c"]);
    assert!(cache.list_range("queue", 5, 10).unwrap().is_empty());
    assert!(cache.list_all("nothing").unwrap().is_empty());
}

#[test]
fn list_set_at_bounds() {
    let (cache, _) = start_store();

    cache.list_append("l", "a").unwrap();
    cache.list_append("l", "b").unwrap();
    cache.list_set_at("l", 1, "z").unwrap();
    assert_eq!(cache.list_all("l").unwrap(), vec!["a", "z"]);

    assert!(matches!(cache.list_set_at("l", 2, "x"), Err(CacheError::IndexOutOfRange)));
    assert!(matches!(cache.list_set_at("missing", 0, "x"), Err(CacheError::IndexOutOfRange)));
}

#[test]
fn list_replace_first() {
    let (cache, _) = start_store();

    for value in ["a", "b", "a"] {
        cache.list_append("l", value).unwrap();
    }

    assert_eq!(cache.list_replace_first("l", "a", "x").unwrap(), Some(0));
    assert_eq!(cache.list_all("l").unwrap(), vec!["x", "b", "a"]);
    assert_eq!(cache.list_replace_first("l", "a", "y").unwrap(), Some(2));

    assert_eq!(cache.list_replace_first("l", "q", "z").unwrap(), None);
    assert_eq!(cache.list_all("l").unwrap(), vec!["x", "b", "y"]);
    assert_eq!(cache.list_replace_first("missing", "q", "z").unwrap(), None);
}

#[test]
fn list_removal_and_clear() {
    let (cache, _) = start_store();

    for value in ["a", "b", "a", "c", "a"] {
        cache.list_append("l", value).unwrap();
    }
    assert_eq!(cache.list_remove_occurrences("l", "a").unwrap(), 3);
    assert_eq!(cache.list_all("l").unwrap(), vec!["b", "c"]);
    assert_eq!(cache.list_remove_occurrences("l", "zzz").unwrap(), 0);

    for value in ["b", "b"] {
        cache.list_append("l", value).unwrap();
    }
    // b appears three times, c once.
    assert_eq!(cache.list_clear("l").unwrap(), 3);
    assert!(cache.list_all("l").unwrap().is_empty());
    assert_eq!(cache.list_clear("l").unwrap(), 0);
}

#[test]
fn key_types_do_not_collide() {
    let (cache, _) = start_store();

    cache.set_string("s", "v").unwrap();
    cache.hash_set("h", "f", "v").unwrap();
    cache.list_append("l", "v").unwrap();

    assert!(matches!(cache.get_string("h"), Err(CacheError::WrongType)));
    assert!(matches!(cache.list_append("s", "x"), Err(CacheError::WrongType)));
    assert!(matches!(cache.hash_get("l", "f"), Err(CacheError::WrongType)));

    assert_eq!(cache.get_string("s").unwrap().as_deref(), Some("v"));
    assert_eq!(cache.hash_get("h", "f").unwrap().as_deref(), Some("v"));
    assert_eq!(cache.list_all("l").unwrap(), vec!["v"]);
}

#[test]
fn deleting_a_key_leaves_prefixed_keys_alone() {
    let (cache, _) = start_store();

    cache.set_string("u:1", "alice").unwrap();
    cache.hash_set_all("u:1:meta", [("role", "admin")]).unwrap();
    cache.list_append("u:1:log", "login").unwrap();

    assert_eq!(cache.delete_key("u:1").unwrap(), 1);
    assert_eq!(cache.get_string("u:1").unwrap(), None);
    assert_eq!(cache.hash_get("u:1:meta", "role").unwrap().as_deref(), Some("admin"));
    assert_eq!(cache.list_all("u:1:log").unwrap(), vec!["login"]);
}

#[test]
fn unrepresentable_expiry_is_an_argument_error() {
    let (cache, _) = start_store();

    let err = cache
        .set_string_with_expiry("k", "v", i64::MAX as u64, ExpiryUnit::Seconds)
        .unwrap_err();
    assert!(matches!(err, CacheError::InvalidArgument(_)));

    cache.set_string("k", "v").unwrap();
    let err = cache.expire("k", i64::MAX as u64, ExpiryUnit::Seconds).unwrap_err();
    assert!(matches!(err, CacheError::InvalidArgument(_)));

    // The store keeps serving on the same connection.
    assert_eq!(cache.get_string("k").unwrap().as_deref(), Some("v"));
    assert_eq!(cache.ttl("k").unwrap(), KeyTtl::NoExpiry);
}

#[test]
fn clients_share_store_across_threads() {
    let (cache, _) = start_store();

    let workers: Vec<_> = (0..4)
        .map(|worker| {
            let cache = cache.clone();
            thread::spawn(move || {
                for item in 0..10 {
                    cache.list_append("shared", &format!("{}-{}", worker, item)).unwrap();
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    assert_eq!(cache.list_all("shared").unwrap().len(), 40);
}
