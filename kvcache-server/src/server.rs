//! # TCP Server
//!
//! Accept RESP2 connections, parse commands, and dispatch them to the
//! in-memory store with minimal overhead.

use std::sync::Arc;
use std::time::Duration;

use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, warn};

use kvcache_engine::{Clock, EngineError, MemoryStore, TtlStatus};

use crate::protocol::{RespError, RespParser};

/// Accepts connections forever, serving each one on its own task.
pub async fn serve<C>(listener: TcpListener, store: Arc<MemoryStore<C>>) -> std::io::Result<()>
where
    C: Clock + 'static,
{
    loop {
        let (stream, peer) = listener.accept().await?;
        debug!(%peer, "accepted connection");
        let store = Arc::clone(&store);
        tokio::spawn(async move {
            match handle_connection(stream, store).await {
                Ok(()) => debug!(%peer, "connection closed"),
                Err(err) => warn!(%peer, error = %err, "connection failed"),
            }
        });
    }
}

/// Handles a single TCP client connection.
pub async fn handle_connection<C: Clock>(
    stream: TcpStream,
    store: Arc<MemoryStore<C>>,
) -> std::io::Result<()> {
    let mut stream = stream;
    let mut buffer = BytesMut::with_capacity(8 * 1024);
    let mut parser = RespParser::new();

    loop {
        let bytes = stream.read_buf(&mut buffer).await?;
        if bytes == 0 {
            break;
        }

        loop {
            match parser.parse(&mut buffer) {
                Ok(Some(args)) => {
                    let response = dispatch_command(&args, store.as_ref());
                    stream.write_all(&response).await?;
                }
                Ok(None) => break,
                Err(RespError::Protocol) => {
                    warn!("protocol error, closing connection");
                    stream.write_all(&resp_error("protocol error")).await?;
                    return Ok(());
                }
            }
        }
    }

    Ok(())
}

/// Executes one decoded command and returns the encoded reply.
pub fn dispatch_command<C: Clock>(args: &[Vec<u8>], store: &MemoryStore<C>) -> Vec<u8> {
    if args.is_empty() {
        return resp_error("empty command");
    }

    match args[0].to_ascii_uppercase().as_slice() {
        b"PING" => handle_ping(args),
        b"INFO" => handle_info(),
        b"GET" => handle_get(args, store),
        b"SET" => handle_set(args, store),
        b"DEL" => handle_del(args, store),
        b"EXPIRE" => handle_expire(args, store, Duration::from_secs),
        b"PEXPIRE" => handle_expire(args, store, Duration::from_millis),
        b"TTL" => handle_ttl(args, store, false),
        b"PTTL" => handle_ttl(args, store, true),
        b"HSET" => handle_hset(args, store),
        b"HGET" => handle_hget(args, store),
        b"HMGET" => handle_hmget(args, store),
        b"HKEYS" => handle_hkeys(args, store),
        b"HGETALL" => handle_hgetall(args, store),
        b"HDEL" => handle_hdel(args, store),
        b"RPUSH" => handle_rpush(args, store),
        b"LSET" => handle_lset(args, store),
        b"LRANGE" => handle_lrange(args, store),
        b"LREM" => handle_lrem(args, store),
        b"LLEN" => handle_llen(args, store),
        _ => resp_error("unknown command"),
    }
}

fn handle_ping(args: &[Vec<u8>]) -> Vec<u8> {
    match args.len() {
        1 => resp_simple("PONG"),
        2 => resp_bulk(&args[1]),
        _ => wrong_arity("ping"),
    }
}

fn handle_info() -> Vec<u8> {
    resp_bulk(b"role:master\r\nengine:kvcache-memory\r\n")
}

fn handle_get<C: Clock>(args: &[Vec<u8>], store: &MemoryStore<C>) -> Vec<u8> {
    if args.len() != 2 {
        return wrong_arity("get");
    }
    match store.get(&args[1]) {
        Ok(Some(value)) => resp_bulk(&value),
        Ok(None) => resp_null(),
        Err(err) => resp_engine_error(err),
    }
}

fn handle_set<C: Clock>(args: &[Vec<u8>], store: &MemoryStore<C>) -> Vec<u8> {
    if args.len() < 3 {
        return wrong_arity("set");
    }

    let key = args[1].clone();
    let value = args[2].clone();

    if args.len() == 3 {
        store.set(key, value);
        return resp_simple("OK");
    }

    if args.len() == 5 {
        let to_duration: fn(u64) -> Duration = if args[3].eq_ignore_ascii_case(b"EX") {
            Duration::from_secs
        } else if args[3].eq_ignore_ascii_case(b"PX") {
            Duration::from_millis
        } else {
            return resp_error("syntax error");
        };

        let amount = match parse_u64(&args[4]) {
            Ok(0) => return resp_error("invalid expire time in 'set' command"),
            Ok(amount) => amount,
            Err(resp) => return resp,
        };

        return match store.set_with_ttl(key, value, to_duration(amount)) {
            Ok(()) => resp_simple("OK"),
            Err(err) => resp_engine_error(err),
        };
    }

    resp_error("syntax error")
}

fn handle_del<C: Clock>(args: &[Vec<u8>], store: &MemoryStore<C>) -> Vec<u8> {
    if args.len() < 2 {
        return wrong_arity("del");
    }

    let removed = args[1..].iter().filter(|key| store.delete(key)).count();
    resp_integer(removed as i64)
}

fn handle_expire<C: Clock>(
    args: &[Vec<u8>],
    store: &MemoryStore<C>,
    to_duration: fn(u64) -> Duration,
) -> Vec<u8> {
    if args.len() != 3 {
        return wrong_arity("expire");
    }

    let amount = match parse_u64(&args[2]) {
        Ok(value) => value,
        Err(resp) => return resp,
    };

    if amount == 0 {
        // Redis deletes the key immediately for a non-positive timeout.
        return resp_integer(store.delete(&args[1]) as i64);
    }

    match store.expire(&args[1], to_duration(amount)) {
        Ok(updated) => resp_integer(updated as i64),
        Err(err) => resp_engine_error(err),
    }
}

fn handle_ttl<C: Clock>(args: &[Vec<u8>], store: &MemoryStore<C>, millis: bool) -> Vec<u8> {
    if args.len() != 2 {
        return wrong_arity("ttl");
    }

    match store.ttl(&args[1]) {
        TtlStatus::Missing => resp_integer(-2),
        TtlStatus::NoExpiry => resp_integer(-1),
        TtlStatus::ExpiresIn(remaining) if millis => resp_integer(remaining.as_millis() as i64),
        // Redis rounds TTL to the nearest second.
        TtlStatus::ExpiresIn(remaining) => {
            resp_integer(((remaining.as_millis() + 500) / 1000) as i64)
        }
    }
}

fn handle_hset<C: Clock>(args: &[Vec<u8>], store: &MemoryStore<C>) -> Vec<u8> {
    if args.len() < 4 || args.len() % 2 != 0 {
        return wrong_arity("hset");
    }

    let pairs = args[2..]
        .chunks(2)
        .map(|pair| (pair[0].clone(), pair[1].clone()))
        .collect();
    match store.hset(&args[1], pairs) {
        Ok(added) => resp_integer(added as i64),
        Err(err) => resp_engine_error(err),
    }
}

fn handle_hget<C: Clock>(args: &[Vec<u8>], store: &MemoryStore<C>) -> Vec<u8> {
    if args.len() != 3 {
        return wrong_arity("hget");
    }
    match store.hget(&args[1], &args[2]) {
        Ok(Some(value)) => resp_bulk(&value),
        Ok(None) => resp_null(),
        Err(err) => resp_engine_error(err),
    }
}

fn handle_hmget<C: Clock>(args: &[Vec<u8>], store: &MemoryStore<C>) -> Vec<u8> {
    if args.len() < 3 {
        return wrong_arity("hmget");
    }
    let fields: Vec<&[u8]> = args[2..].iter().map(Vec::as_slice).collect();
    match store.hmget(&args[1], &fields) {
        Ok(values) => resp_optional_array(&values),
        Err(err) => resp_engine_error(err),
    }
}

fn handle_hkeys<C: Clock>(args: &[Vec<u8>], store: &MemoryStore<C>) -> Vec<u8> {
    if args.len() != 2 {
        return wrong_arity("hkeys");
    }
    match store.hkeys(&args[1]) {
        Ok(fields) => resp_array(&fields),
        Err(err) => resp_engine_error(err),
    }
}

fn handle_hgetall<C: Clock>(args: &[Vec<u8>], store: &MemoryStore<C>) -> Vec<u8> {
    if args.len() != 2 {
        return wrong_arity("hgetall");
    }
    match store.hgetall(&args[1]) {
        Ok(pairs) => {
            let flat: Vec<Vec<u8>> = pairs
                .into_iter()
                .flat_map(|(field, value)| [field, value])
                .collect();
            resp_array(&flat)
        }
        Err(err) => resp_engine_error(err),
    }
}

fn handle_hdel<C: Clock>(args: &[Vec<u8>], store: &MemoryStore<C>) -> Vec<u8> {
    if args.len() < 3 {
        return wrong_arity("hdel");
    }
    let fields: Vec<&[u8]> = args[2..].iter().map(Vec::as_slice).collect();
    match store.hdel(&args[1], &fields) {
        Ok(removed) => resp_integer(removed as i64),
        Err(err) => resp_engine_error(err),
    }
}

fn handle_rpush<C: Clock>(args: &[Vec<u8>], store: &MemoryStore<C>) -> Vec<u8> {
    if args.len() < 3 {
        return wrong_arity("rpush");
    }
    match store.rpush(&args[1], args[2..].to_vec()) {
        Ok(len) => resp_integer(len as i64),
        Err(err) => resp_engine_error(err),
    }
}

fn handle_lset<C: Clock>(args: &[Vec<u8>], store: &MemoryStore<C>) -> Vec<u8> {
    if args.len() != 4 {
        return wrong_arity("lset");
    }
    let index = match parse_i64(&args[2]) {
        Ok(value) => value,
        Err(resp) => return resp,
    };
    match store.lset(&args[1], index, args[3].clone()) {
        Ok(()) => resp_simple("OK"),
        Err(err) => resp_engine_error(err),
    }
}

fn handle_lrange<C: Clock>(args: &[Vec<u8>], store: &MemoryStore<C>) -> Vec<u8> {
    if args.len() != 4 {
        return wrong_arity("lrange");
    }
    let (start, stop) = match (parse_i64(&args[2]), parse_i64(&args[3])) {
        (Ok(start), Ok(stop)) => (start, stop),
        (Err(resp), _) | (_, Err(resp)) => return resp,
    };
    match store.lrange(&args[1], start, stop) {
        Ok(items) => resp_array(&items),
        Err(err) => resp_engine_error(err),
    }
}

fn handle_lrem<C: Clock>(args: &[Vec<u8>], store: &MemoryStore<C>) -> Vec<u8> {
    if args.len() != 4 {
        return wrong_arity("lrem");
    }
    let count = match parse_i64(&args[2]) {
        Ok(value) => value,
        Err(resp) => return resp,
    };
    match store.lrem(&args[1], count, &args[3]) {
        Ok(removed) => resp_integer(removed as i64),
        Err(err) => resp_engine_error(err),
    }
}

fn handle_llen<C: Clock>(args: &[Vec<u8>], store: &MemoryStore<C>) -> Vec<u8> {
    if args.len() != 2 {
        return wrong_arity("llen");
    }
    match store.llen(&args[1]) {
        Ok(len) => resp_integer(len as i64),
        Err(err) => resp_engine_error(err),
    }
}

fn resp_simple(message: &str) -> Vec<u8> {
    let mut buf = Vec::with_capacity(message.len() + 3);
    buf.extend_from_slice(b"+");
    buf.extend_from_slice(message.as_bytes());
    buf.extend_from_slice(b"\r\n");
    buf
}

fn resp_error(message: &str) -> Vec<u8> {
    resp_raw_error(&format!("ERR {}", message))
}

fn resp_raw_error(message: &str) -> Vec<u8> {
    let mut buf = Vec::with_capacity(message.len() + 3);
    buf.extend_from_slice(b"-");
    buf.extend_from_slice(message.as_bytes());
    buf.extend_from_slice(b"\r\n");
    buf
}

/// Engine errors already carry the Redis error prefix.
fn resp_engine_error(err: EngineError) -> Vec<u8> {
    resp_raw_error(&err.to_string())
}

fn wrong_arity(command: &str) -> Vec<u8> {
    resp_error(&format!("wrong number of arguments for '{}' command", command))
}

fn resp_integer(value: i64) -> Vec<u8> {
    format!(":{}\r\n", value).into_bytes()
}

fn resp_bulk(data: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(data.len() + 16);
    write_bulk(&mut buf, data);
    buf
}

fn write_bulk(buf: &mut Vec<u8>, data: &[u8]) {
    buf.extend_from_slice(b"$");
    buf.extend_from_slice(data.len().to_string().as_bytes());
    buf.extend_from_slice(b"\r\n");
    buf.extend_from_slice(data);
    buf.extend_from_slice(b"\r\n");
}

fn resp_null() -> Vec<u8> {
    b"$-1\r\n".to_vec()
}

fn resp_array(items: &[Vec<u8>]) -> Vec<u8> {
    let mut buf = format!("*{}\r\n", items.len()).into_bytes();
    for item in items {
        write_bulk(&mut buf, item);
    }
    buf
}

fn resp_optional_array(items: &[Option<Vec<u8>>]) -> Vec<u8> {
    let mut buf = format!("*{}\r\n", items.len()).into_bytes();
    for item in items {
        match item {
            Some(data) => write_bulk(&mut buf, data),
            None => buf.extend_from_slice(b"$-1\r\n"),
        }
    }
    buf
}

fn parse_u64(arg: &[u8]) -> Result<u64, Vec<u8>> {
    std::str::from_utf8(arg)
        .ok()
        .and_then(|text| text.parse().ok())
        .ok_or_else(|| resp_error("value is not an integer or out of range"))
}

fn parse_i64(arg: &[u8]) -> Result<i64, Vec<u8>> {
    std::str::from_utf8(arg)
        .ok()
        .and_then(|text| text.parse().ok())
        .ok_or_else(|| resp_error("value is not an integer or out of range"))
}
