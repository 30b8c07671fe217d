//! # Key/Value Cache Client
//!
//! Purpose: Typed string, hash, and list operations over a Redis-compatible
//! store, with a default expiry policy for string writes.
//!
//! ## Design Principles
//! 1. **Thin Facade**: One operation maps to one store command wherever the
//!    store has one; nothing is cached locally.
//! 2. **Misses Are Values**: Reads of absent keys return `None` or an empty
//!    collection, never an error.
//! 3. **Reject Early**: Arguments that are wrong on their face fail before any
//!    command is sent, and operations with nothing to do send nothing.
//! 4. **Immutable Policy**: The default expiry is fixed per client value;
//!    `with_default_expiry` derives a new client sharing the same executor.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::client::{CommandExecutor, KVClient, KeyTtl};
use crate::config::ClientConfig;
use crate::error::{CacheError, CacheResult, ClientError};
use crate::expiry::{ExpiryPolicy, ExpiryUnit};
use crate::resp::{IntArg, RespValue};

/// Cache facade over a store executor.
pub struct KeyValueCacheClient<E = KVClient> {
    executor: Arc<E>,
    default_expiry: ExpiryPolicy,
}

impl<E> Clone for KeyValueCacheClient<E> {
    fn clone(&self) -> Self {
        KeyValueCacheClient {
            executor: Arc::clone(&self.executor),
            default_expiry: self.default_expiry,
        }
    }
}

impl KeyValueCacheClient<KVClient> {
    /// Connects to `addr` with default pool settings and expiry policy.
    pub fn connect(addr: impl Into<String>) -> CacheResult<Self> {
        Ok(Self::new(KVClient::connect(addr)?))
    }

    /// Builds a client from explicit transport and expiry configuration.
    pub fn from_config(config: ClientConfig, default_expiry: ExpiryPolicy) -> CacheResult<Self> {
        Ok(Self::with_executor(Arc::new(KVClient::with_config(config)?), default_expiry))
    }
}

impl<E: CommandExecutor> KeyValueCacheClient<E> {
    /// Wraps `executor` with the default ten-minute expiry policy.
    pub fn new(executor: E) -> Self {
        Self::with_executor(Arc::new(executor), ExpiryPolicy::default())
    }

    /// Wraps a shared executor with an explicit expiry policy.
    pub fn with_executor(executor: Arc<E>, default_expiry: ExpiryPolicy) -> Self {
        KeyValueCacheClient {
            executor,
            default_expiry,
        }
    }

    /// Returns the expiry applied by `set_string_with_default_expiry`.
    pub fn default_expiry(&self) -> ExpiryPolicy {
        self.default_expiry
    }

    /// Returns a client with a different default expiry.
    ///
    /// The original client is unchanged; both share the same executor.
    pub fn with_default_expiry(&self, default_expiry: ExpiryPolicy) -> Self {
        KeyValueCacheClient {
            executor: Arc::clone(&self.executor),
            default_expiry,
        }
    }

    /// Returns the underlying executor.
    pub fn executor(&self) -> &E {
        &self.executor
    }

    // ----- strings -----

    /// Stores `value` under `key` without expiry.
    pub fn set_string(&self, key: &str, value: &str) -> CacheResult<()> {
        require_name(key, "key must not be empty")?;
        expect_ok(self.run(&[b"SET", key.as_bytes(), value.as_bytes()])?)
    }

    /// Stores `value` under `key`, expiring after `ttl` of `unit`.
    ///
    /// Millisecond units are sent with `PX`, everything else with `EX`.
    pub fn set_string_with_expiry(
        &self,
        key: &str,
        value: &str,
        ttl: u64,
        unit: ExpiryUnit,
    ) -> CacheResult<()> {
        require_name(key, "key must not be empty")?;
        let (flag, amount) = expiry_argument(ttl, unit, b"PX", b"EX")?;
        let amount = IntArg::new(amount);
        expect_ok(self.run(&[b"SET", key.as_bytes(), value.as_bytes(), flag, amount.as_bytes()])?)
    }

    /// Stores `value` under `key` using the client's default expiry.
    pub fn set_string_with_default_expiry(&self, key: &str, value: &str) -> CacheResult<()> {
        let ExpiryPolicy { duration, unit } = self.default_expiry;
        self.set_string_with_expiry(key, value, duration, unit)
    }

    /// Fetches a string value; `None` when the key is absent or expired.
    pub fn get_string(&self, key: &str) -> CacheResult<Option<String>> {
        let reply = self.run(&[b"GET", key.as_bytes()])?;
        reply.into_bulk()?.map(into_string).transpose()
    }

    /// Deletes one key of any type. Returns 1 when it existed, 0 otherwise.
    pub fn delete_key(&self, key: &str) -> CacheResult<u64> {
        self.delete_keys(&[key])
    }

    /// Deletes several keys. Returns how many existed.
    ///
    /// An empty slice returns 0 without contacting the store.
    pub fn delete_keys<K: AsRef<str>>(&self, keys: &[K]) -> CacheResult<u64> {
        if keys.is_empty() {
            return Ok(0);
        }
        let mut args: Vec<&[u8]> = Vec::with_capacity(keys.len() + 1);
        args.push(b"DEL");
        args.extend(keys.iter().map(|key| key.as_ref().as_bytes()));
        expect_count(self.run(&args)?)
    }

    /// Sets an expiry on an existing key. Returns false when the key is absent.
    pub fn expire(&self, key: &str, ttl: u64, unit: ExpiryUnit) -> CacheResult<bool> {
        require_name(key, "key must not be empty")?;
        let (command, amount) = expiry_argument(ttl, unit, b"PEXPIRE", b"EXPIRE")?;
        let amount = IntArg::new(amount);
        Ok(self.run(&[command, key.as_bytes(), amount.as_bytes()])?.into_integer()? == 1)
    }

    /// Reports the remaining time to live of a key.
    pub fn ttl(&self, key: &str) -> CacheResult<KeyTtl> {
        match self.run(&[b"PTTL", key.as_bytes()])?.into_integer()? {
            -2 => Ok(KeyTtl::Missing),
            -1 => Ok(KeyTtl::NoExpiry),
            millis if millis >= 0 => Ok(KeyTtl::ExpiresIn(Duration::from_millis(millis as u64))),
            _ => Err(ClientError::UnexpectedResponse.into()),
        }
    }

    /// Checks that the store answers.
    pub fn ping(&self) -> CacheResult<()> {
        match self.run(&[b"PING"])? {
            RespValue::Simple(_) => Ok(()),
            _ => Err(ClientError::UnexpectedResponse.into()),
        }
    }

    // ----- hashes -----

    /// Upserts one field of a hash.
    pub fn hash_set(&self, hash: &str, field: &str, value: &str) -> CacheResult<()> {
        require_name(hash, "hash name must not be empty")?;
        self.run(&[b"HSET", hash.as_bytes(), field.as_bytes(), value.as_bytes()])?
            .into_integer()?;
        Ok(())
    }

    /// Upserts every field of `fields` in one command.
    ///
    /// An empty map sends nothing.
    pub fn hash_set_all<I, K, V>(&self, hash: &str, fields: I) -> CacheResult<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        require_name(hash, "hash name must not be empty")?;
        let pairs: Vec<(K, V)> = fields.into_iter().collect();
        if pairs.is_empty() {
            return Ok(());
        }

        let mut args: Vec<&[u8]> = Vec::with_capacity(2 + pairs.len() * 2);
        args.push(b"HSET");
        args.push(hash.as_bytes());
        for (field, value) in &pairs {
            args.push(field.as_ref().as_bytes());
            args.push(value.as_ref().as_bytes());
        }
        self.run(&args)?.into_integer()?;
        Ok(())
    }

    /// Fetches one hash field.
    pub fn hash_get(&self, hash: &str, field: &str) -> CacheResult<Option<String>> {
        let reply = self.run(&[b"HGET", hash.as_bytes(), field.as_bytes()])?;
        reply.into_bulk()?.map(into_string).transpose()
    }

    /// Fetches several hash fields.
    ///
    /// The result is positionally aligned to `fields`, with `None` for each
    /// missing field. An empty hash name or field list returns an empty vec
    /// without contacting the store.
    pub fn hash_get_multi<F: AsRef<str>>(
        &self,
        hash: &str,
        fields: &[F],
    ) -> CacheResult<Vec<Option<String>>> {
        if hash.is_empty() || fields.is_empty() {
            return Ok(Vec::new());
        }
        let mut args: Vec<&[u8]> = Vec::with_capacity(fields.len() + 2);
        args.push(b"HMGET");
        args.push(hash.as_bytes());
        args.extend(fields.iter().map(|field| field.as_ref().as_bytes()));

        let values = optional_strings(self.run(&args)?)?;
        if values.len() != fields.len() {
            return Err(ClientError::UnexpectedResponse.into());
        }
        Ok(values)
    }

    /// Returns the field names of a hash; empty when the hash is absent.
    pub fn hash_keys(&self, hash: &str) -> CacheResult<HashSet<String>> {
        let reply = self.run(&[b"HKEYS", hash.as_bytes()])?;
        strings(reply).map(|fields| fields.into_iter().collect())
    }

    /// Returns every field and value of a hash.
    pub fn hash_get_all(&self, hash: &str) -> CacheResult<HashMap<String, String>> {
        let flat = strings(self.run(&[b"HGETALL", hash.as_bytes()])?)?;
        if flat.len() % 2 != 0 {
            return Err(ClientError::UnexpectedResponse.into());
        }
        let mut entries = HashMap::with_capacity(flat.len() / 2);
        let mut items = flat.into_iter();
        while let (Some(field), Some(value)) = (items.next(), items.next()) {
            entries.insert(field, value);
        }
        Ok(entries)
    }

    /// Removes hash fields. Returns how many existed.
    ///
    /// An empty field list returns 0 without contacting the store.
    pub fn hash_delete_fields<F: AsRef<str>>(&self, hash: &str, fields: &[F]) -> CacheResult<u64> {
        require_name(hash, "hash name must not be empty")?;
        if fields.is_empty() {
            return Ok(0);
        }
        let mut args: Vec<&[u8]> = Vec::with_capacity(fields.len() + 2);
        args.push(b"HDEL");
        args.push(hash.as_bytes());
        args.extend(fields.iter().map(|field| field.as_ref().as_bytes()));
        expect_count(self.run(&args)?)
    }

    // ----- lists -----

    /// Appends `value` to the tail of a list. Returns the new length.
    pub fn list_append(&self, list: &str, value: &str) -> CacheResult<u64> {
        require_name(list, "list name must not be empty")?;
        expect_count(self.run(&[b"RPUSH", list.as_bytes(), value.as_bytes()])?)
    }

    /// Overwrites the element at `index`.
    ///
    /// Fails with `IndexOutOfRange` when `index` is not below the list
    /// length, including when the list does not exist.
    pub fn list_set_at(&self, list: &str, index: usize, value: &str) -> CacheResult<()> {
        require_name(list, "list name must not be empty")?;
        let index = i64::try_from(index).map_err(|_| CacheError::IndexOutOfRange)?;
        let index = IntArg::new(index);
        expect_ok(self.run(&[b"LSET", list.as_bytes(), index.as_bytes(), value.as_bytes()])?)
    }

    /// Returns elements `begin..=end`; `end = -1` reads to the tail.
    ///
    /// An absent list yields an empty vec.
    pub fn list_range(&self, list: &str, begin: i64, end: i64) -> CacheResult<Vec<String>> {
        let begin = IntArg::new(begin);
        let end = IntArg::new(end);
        strings(self.run(&[b"LRANGE", list.as_bytes(), begin.as_bytes(), end.as_bytes()])?)
    }

    /// Returns the whole list.
    pub fn list_all(&self, list: &str) -> CacheResult<Vec<String>> {
        self.list_range(list, 0, -1)
    }

    /// Replaces the first element equal to `old_value` with `new_value`.
    ///
    /// Returns the index that was replaced, or `None` when `old_value` is not
    /// in the list, in which case nothing is written. The scan covers one
    /// snapshot of the list, so it always terminates. The read and the write
    /// are separate commands: a concurrent writer can move elements between
    /// them.
    pub fn list_replace_first(
        &self,
        list: &str,
        old_value: &str,
        new_value: &str,
    ) -> CacheResult<Option<usize>> {
        require_name(list, "list name must not be empty")?;
        let items = self.list_all(list)?;
        let index = match items.iter().position(|item| item == old_value) {
            Some(index) => index,
            None => return Ok(None),
        };
        self.list_set_at(list, index, new_value)?;
        Ok(Some(index))
    }

    /// Removes every occurrence of `value`. Returns how many were removed.
    pub fn list_remove_occurrences(&self, list: &str, value: &str) -> CacheResult<u64> {
        require_name(list, "list name must not be empty")?;
        expect_count(self.run(&[b"LREM", list.as_bytes(), b"0", value.as_bytes()])?)
    }

    /// Empties a list by removing each distinct value it holds.
    ///
    /// Returns the largest number of occurrences removed for any single
    /// value, not the total number of elements removed; callers that need the
    /// total should read the length first. Elements pushed concurrently may
    /// survive.
    pub fn list_clear(&self, list: &str) -> CacheResult<u64> {
        require_name(list, "list name must not be empty")?;
        let items = self.list_all(list)?;
        let mut seen = HashSet::with_capacity(items.len());
        let mut total = 0;
        let mut max_removed = 0;
        for item in &items {
            if !seen.insert(item.as_str()) {
                continue;
            }
            let removed = self.list_remove_occurrences(list, item)?;
            total += removed;
            max_removed = max_removed.max(removed);
        }
        debug!(list, total, max_removed, "cleared list");
        Ok(max_removed)
    }

    fn run(&self, args: &[&[u8]]) -> CacheResult<RespValue> {
        if let Some(command) = args.first() {
            debug!(
                command = %String::from_utf8_lossy(command),
                key = %args.get(1).map(|key| String::from_utf8_lossy(key)).unwrap_or_default(),
                "issuing store command"
            );
        }
        match self.executor.execute(args)? {
            RespValue::Error(message) => Err(ClientError::Server { message }.into()),
            reply => Ok(reply),
        }
    }
}

fn require_name(name: &str, reason: &'static str) -> CacheResult<()> {
    if name.is_empty() {
        return Err(CacheError::InvalidArgument(reason));
    }
    Ok(())
}

/// Picks the millisecond or second flavour of an expiry argument.
///
/// Zero and overflowing expiries are rejected locally.
fn expiry_argument(
    ttl: u64,
    unit: ExpiryUnit,
    millis_flag: &'static [u8],
    secs_flag: &'static [u8],
) -> CacheResult<(&'static [u8], i64)> {
    let duration = unit
        .to_duration(ttl)
        .ok_or(CacheError::InvalidArgument("expiry is too large"))?;
    if duration.is_zero() {
        return Err(CacheError::InvalidArgument("expiry must be positive"));
    }

    let (flag, amount) = match unit {
        ExpiryUnit::Milliseconds => (millis_flag, duration.as_millis()),
        _ => (secs_flag, u128::from(duration.as_secs())),
    };
    let amount = i64::try_from(amount).map_err(|_| CacheError::InvalidArgument("expiry is too large"))?;
    Ok((flag, amount))
}

fn into_string(bytes: Vec<u8>) -> CacheResult<String> {
    String::from_utf8(bytes).map_err(|_| CacheError::InvalidUtf8)
}

fn expect_ok(reply: RespValue) -> CacheResult<()> {
    reply.into_status()?;
    Ok(())
}

fn expect_count(reply: RespValue) -> CacheResult<u64> {
    u64::try_from(reply.into_integer()?).map_err(|_| ClientError::UnexpectedResponse.into())
}

fn strings(reply: RespValue) -> CacheResult<Vec<String>> {
    reply
        .into_array()?
        .into_iter()
        .map(|item| match item.into_bulk()? {
            Some(bytes) => into_string(bytes),
            None => Err(ClientError::UnexpectedResponse.into()),
        })
        .collect()
}

fn optional_strings(reply: RespValue) -> CacheResult<Vec<Option<String>>> {
    reply
        .into_array()?
        .into_iter()
        .map(|item| item.into_bulk()?.map(into_string).transpose())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::VecDeque;

    /// Executor that records every command and replays scripted replies.
    #[derive(Default)]
    struct Recorder {
        commands: Mutex<Vec<Vec<String>>>,
        replies: Mutex<VecDeque<RespValue>>,
    }

    impl Recorder {
        fn replying(replies: Vec<RespValue>) -> Self {
            Recorder {
                commands: Mutex::new(Vec::new()),
                replies: Mutex::new(replies.into()),
            }
        }

        fn commands(&self) -> Vec<Vec<String>> {
            self.commands.lock().clone()
        }
    }

    impl CommandExecutor for Recorder {
        fn execute(&self, args: &[&[u8]]) -> Result<RespValue, ClientError> {
            self.commands.lock().push(
                args.iter()
                    .map(|arg| String::from_utf8_lossy(arg).into_owned())
                    .collect(),
            );
            self.replies
                .lock()
                .pop_front()
                .ok_or(ClientError::UnexpectedResponse)
        }
    }

    fn ok() -> RespValue {
        RespValue::Simple(b"OK".to_vec())
    }

    fn bulk(value: &str) -> RespValue {
        RespValue::Bulk(Some(value.as_bytes().to_vec()))
    }

    fn array(values: &[&str]) -> RespValue {
        RespValue::Array(values.iter().map(|value| bulk(value)).collect())
    }

    fn cmd(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|part| part.to_string()).collect()
    }

    #[test]
    fn empty_inputs_send_nothing() {
        let cache = KeyValueCacheClient::new(Recorder::default());
        let none: [&str; 0] = [];

        assert_eq!(cache.delete_keys(&none).unwrap(), 0);
        assert_eq!(cache.hash_delete_fields("h", &none).unwrap(), 0);
        assert!(cache.hash_get_multi("h", &none).unwrap().is_empty());
        assert!(cache.hash_get_multi("", &["a"]).unwrap().is_empty());
        cache.hash_set_all("h", HashMap::<String, String>::new()).unwrap();

        assert!(cache.executor().commands().is_empty());
    }

    #[test]
    fn invalid_arguments_are_rejected_locally() {
        let cache = KeyValueCacheClient::new(Recorder::default());

        assert!(matches!(cache.set_string("", "v"), Err(CacheError::InvalidArgument(_))));
        assert!(matches!(cache.hash_set("", "f", "v"), Err(CacheError::InvalidArgument(_))));
        assert!(matches!(cache.hash_delete_fields("", &["f"]), Err(CacheError::InvalidArgument(_))));
        assert!(matches!(cache.list_append("", "v"), Err(CacheError::InvalidArgument(_))));
        assert!(matches!(cache.list_set_at("", 0, "v"), Err(CacheError::InvalidArgument(_))));
        assert!(matches!(cache.list_replace_first("", "a", "b"), Err(CacheError::InvalidArgument(_))));
        assert!(matches!(cache.list_remove_occurrences("", "v"), Err(CacheError::InvalidArgument(_))));
        assert!(matches!(cache.list_clear(""), Err(CacheError::InvalidArgument(_))));
        assert!(matches!(
            cache.expire("", 1, ExpiryUnit::Seconds),
            Err(CacheError::InvalidArgument(_))
        ));
        assert!(matches!(
            cache.set_string_with_expiry("k", "v", 0, ExpiryUnit::Seconds),
            Err(CacheError::InvalidArgument(_))
        ));
        assert!(matches!(
            cache.set_string_with_expiry("k", "v", u64::MAX, ExpiryUnit::Days),
            Err(CacheError::InvalidArgument(_))
        ));

        assert!(cache.executor().commands().is_empty());
    }

    #[test]
    fn expiry_units_pick_command_flavour() {
        let cache = KeyValueCacheClient::new(Recorder::replying(vec![ok(), ok(), ok()]));
        cache.set_string_with_expiry("k", "v", 1500, ExpiryUnit::Milliseconds).unwrap();
        cache.set_string_with_expiry("k", "v", 2, ExpiryUnit::Hours).unwrap();
        cache.set_string_with_default_expiry("k", "v").unwrap();

        assert_eq!(
            cache.executor().commands(),
            vec![
                cmd(&["SET", "k", "v", "PX", "1500"]),
                cmd(&["SET", "k", "v", "EX", "7200"]),
                cmd(&["SET", "k", "v", "EX", "600"]),
            ]
        );
    }

    #[test]
    fn derived_client_keeps_original_policy() {
        let cache = KeyValueCacheClient::new(Recorder::replying(vec![ok(), ok()]));
        let short = cache.with_default_expiry(ExpiryPolicy::new(30, ExpiryUnit::Seconds));

        short.set_string_with_default_expiry("a", "1").unwrap();
        cache.set_string_with_default_expiry("b", "2").unwrap();

        assert_eq!(cache.default_expiry(), ExpiryPolicy::default());
        assert_eq!(short.default_expiry().duration, 30);
        // Both clients share one executor.
        assert_eq!(
            cache.executor().commands(),
            vec![cmd(&["SET", "a", "1", "EX", "30"]), cmd(&["SET", "b", "2", "EX", "600"])]
        );
    }

    #[test]
    fn replace_first_stops_at_list_end() {
        let cache = KeyValueCacheClient::new(Recorder::replying(vec![array(&["a", "b", "a"])]));

        assert_eq!(cache.list_replace_first("l", "x", "y").unwrap(), None);
        assert_eq!(cache.executor().commands(), vec![cmd(&["LRANGE", "l", "0", "-1"])]);
    }

    #[test]
    fn replace_first_writes_first_match_only() {
        let cache = KeyValueCacheClient::new(Recorder::replying(vec![array(&["a", "b", "b"]), ok()]));

        assert_eq!(cache.list_replace_first("l", "b", "z").unwrap(), Some(1));
        assert_eq!(
            cache.executor().commands(),
            vec![cmd(&["LRANGE", "l", "0", "-1"]), cmd(&["LSET", "l", "1", "z"])]
        );
    }

    #[test]
    fn list_clear_reports_largest_single_value_count() {
        let cache = KeyValueCacheClient::new(Recorder::replying(vec![
            array(&["a", "b", "a", "a", "c"]),
            RespValue::Integer(3),
            RespValue::Integer(1),
            RespValue::Integer(1),
        ]));

        assert_eq!(cache.list_clear("l").unwrap(), 3);
        assert_eq!(
            cache.executor().commands(),
            vec![
                cmd(&["LRANGE", "l", "0", "-1"]),
                cmd(&["LREM", "l", "0", "a"]),
                cmd(&["LREM", "l", "0", "b"]),
                cmd(&["LREM", "l", "0", "c"]),
            ]
        );
    }

    #[test]
    fn server_errors_are_classified() {
        let cache = KeyValueCacheClient::new(Recorder::replying(vec![
            RespValue::Error(b"ERR index out of range".to_vec()),
            RespValue::Error(b"WRONGTYPE Operation against a key holding the wrong kind of value".to_vec()),
        ]));

        assert!(matches!(cache.list_set_at("l", 5, "v"), Err(CacheError::IndexOutOfRange)));
        assert!(matches!(cache.get_string("l"), Err(CacheError::WrongType)));
    }

    #[test]
    fn transport_failures_surface_as_connectivity() {
        let cache = KeyValueCacheClient::new(Recorder::default());
        let err = cache.get_string("k").unwrap_err();
        assert!(err.is_connectivity());
    }

    #[test]
    fn hash_get_multi_keeps_positions() {
        let cache = KeyValueCacheClient::new(Recorder::replying(vec![RespValue::Array(vec![
            bulk("1"),
            RespValue::Bulk(None),
            bulk("3"),
        ])]));

        let values = cache.hash_get_multi("h", &["a", "b", "c"]).unwrap();
        assert_eq!(values, vec![Some("1".to_string()), None, Some("3".to_string())]);
        assert_eq!(cache.executor().commands(), vec![cmd(&["HMGET", "h", "a", "b", "c"])]);
    }

    #[test]
    fn ttl_maps_sentinels() {
        let cache = KeyValueCacheClient::new(Recorder::replying(vec![
            RespValue::Integer(-2),
            RespValue::Integer(-1),
            RespValue::Integer(1500),
        ]));

        assert_eq!(cache.ttl("k").unwrap(), KeyTtl::Missing);
        assert_eq!(cache.ttl("k").unwrap(), KeyTtl::NoExpiry);
        assert_eq!(cache.ttl("k").unwrap(), KeyTtl::ExpiresIn(Duration::from_millis(1500)));
    }

    #[test]
    fn invalid_utf8_is_reported() {
        let cache = KeyValueCacheClient::new(Recorder::replying(vec![RespValue::Bulk(Some(vec![0xff, 0xfe]))]));
        assert!(matches!(cache.get_string("k"), Err(CacheError::InvalidUtf8)));
    }
}
