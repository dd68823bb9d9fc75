//! # Command Dispatch
//!
//! Maps parsed frames to store operations and shapes the replies. One
//! dispatch call handles exactly one request frame: stamp the counters, run
//! a small active-expiration cycle, execute the verb, and enforce the
//! memory budget after anything that can grow it.

use std::path::PathBuf;

use parking_lot::Mutex;
use tracing::warn;

use ckit_engine::{snapshot, Store};

use crate::protocol::{Frame, ReplyBuf};
use crate::stats::ServerStats;

/// Random keys checked for expiry before every command.
const ACTIVE_EXPIRE_SAMPLES: usize = 3;

/// Shared server context: the store behind its single-writer lock, the
/// snapshot path, and the INFO counters.
#[derive(Debug)]
pub struct ServerCtx {
    pub store: Mutex<Store>,
    pub snapshot_path: PathBuf,
    pub stats: ServerStats,
}

impl ServerCtx {
    pub fn new(store: Store, snapshot_path: PathBuf) -> Self {
        ServerCtx {
            store: Mutex::new(store),
            snapshot_path,
            stats: ServerStats::new(),
        }
    }
}

/// Pulls the argument vector out of a request frame. Requests are arrays of
/// bulk strings; inline commands arrive as one simple-string line and are
/// split on whitespace.
fn frame_args(frame: &Frame) -> Option<Vec<Vec<u8>>> {
    match frame {
        Frame::Array(items) => items
            .iter()
            .map(|item| match item {
                Frame::Bulk(data) => Some(data.clone()),
                Frame::Simple(data) => Some(data.clone()),
                _ => None,
            })
            .collect(),
        Frame::Simple(line) => Some(
            line.split(|b| b.is_ascii_whitespace())
                .filter(|part| !part.is_empty())
                .map(<[u8]>::to_vec)
                .collect(),
        ),
        _ => None,
    }
}

/// Executes one request frame, writing the reply into `out`.
pub fn dispatch(ctx: &ServerCtx, frame: &Frame, out: &mut ReplyBuf) {
    let Some(args) = frame_args(frame) else {
        out.write_error("ERR invalid command format");
        return;
    };
    if args.is_empty() {
        out.write_error("ERR empty command");
        return;
    }

    ctx.stats.command_processed();

    let mut store = ctx.store.lock();
    store.expire_cycle(ACTIVE_EXPIRE_SAMPLES);

    let verb = args[0].to_ascii_uppercase();
    match verb.as_slice() {
        b"PING" => cmd_ping(&args, out),
        b"ECHO" => cmd_echo(&args, out),
        b"SET" => cmd_set(&mut store, &args, out),
        b"GET" => cmd_get(&mut store, &args, out),
        b"DEL" => cmd_del(&mut store, &args, out),
        b"INCR" => cmd_incr_decr(&mut store, &args, out, true),
        b"DECR" => cmd_incr_decr(&mut store, &args, out, false),
        b"LPUSH" => cmd_push(&mut store, &args, out, true),
        b"RPUSH" => cmd_push(&mut store, &args, out, false),
        b"LPOP" => cmd_pop(&mut store, &args, out, true),
        b"RPOP" => cmd_pop(&mut store, &args, out, false),
        b"LRANGE" => cmd_lrange(&mut store, &args, out),
        b"LLEN" => cmd_llen(&mut store, &args, out),
        b"HSET" => cmd_hset(&mut store, &args, out),
        b"HGET" => cmd_hget(&mut store, &args, out),
        b"HDEL" => cmd_hdel(&mut store, &args, out),
        b"HGETALL" => cmd_hgetall(&mut store, &args, out),
        b"EXPIRE" => cmd_expire(&mut store, &args, out),
        b"TTL" => cmd_ttl(&mut store, &args, out),
        b"PERSIST" => cmd_persist(&mut store, &args, out),
        b"KEYS" => cmd_keys(&mut store, &args, out),
        b"DBSIZE" => out.write_integer(store.dbsize() as i64),
        b"FLUSHDB" => {
            store.flushdb();
            out.write_simple("OK");
        }
        b"SAVE" => cmd_save(&store, ctx, out),
        b"INFO" => cmd_info(&store, ctx, out),
        _ => out.write_error(&format!(
            "ERR unknown command '{}'",
            String::from_utf8_lossy(&args[0])
        )),
    }
}

fn arity_error(out: &mut ReplyBuf, verb: &str) {
    out.write_error(&format!(
        "ERR wrong number of arguments for '{verb}' command"
    ));
}

fn cmd_ping(args: &[Vec<u8>], out: &mut ReplyBuf) {
    match args.len() {
        1 => out.write_simple("PONG"),
        2 => out.write_bulk(&args[1]),
        _ => arity_error(out, "ping"),
    }
}

fn cmd_echo(args: &[Vec<u8>], out: &mut ReplyBuf) {
    if args.len() != 2 {
        arity_error(out, "echo");
        return;
    }
    out.write_bulk(&args[1]);
}

fn cmd_set(store: &mut Store, args: &[Vec<u8>], out: &mut ReplyBuf) {
    let seconds = match args.len() {
        3 => None,
        5 if args[3].eq_ignore_ascii_case(b"EX") => {
            match ckit_common::parse_i64(&args[4]) {
                Some(secs) => Some(secs),
                None => {
                    out.write_error("ERR value is not an integer or out of range");
                    return;
                }
            }
        }
        4 | 5 => {
            out.write_error("ERR syntax error");
            return;
        }
        _ => {
            arity_error(out, "set");
            return;
        }
    };

    store.set(&args[1], &args[2]);
    if let Some(secs) = seconds {
        store.expire(&args[1], secs);
    }
    store.enforce_maxmemory();
    out.write_simple("OK");
}

fn cmd_get(store: &mut Store, args: &[Vec<u8>], out: &mut ReplyBuf) {
    if args.len() != 2 {
        arity_error(out, "get");
        return;
    }
    match store.get(&args[1]) {
        Ok(Some(value)) => out.write_bulk(&value),
        Ok(None) => out.write_null(),
        Err(err) => out.write_error(&err.to_string()),
    }
}

fn cmd_del(store: &mut Store, args: &[Vec<u8>], out: &mut ReplyBuf) {
    if args.len() < 2 {
        arity_error(out, "del");
        return;
    }
    let removed = args[1..].iter().filter(|key| store.del(key)).count();
    out.write_integer(removed as i64);
}

fn cmd_incr_decr(store: &mut Store, args: &[Vec<u8>], out: &mut ReplyBuf, up: bool) {
    if args.len() != 2 {
        arity_error(out, if up { "incr" } else { "decr" });
        return;
    }
    let result = if up {
        store.incr(&args[1])
    } else {
        store.decr(&args[1])
    };
    match result {
        Ok(value) => {
            store.enforce_maxmemory();
            out.write_integer(value);
        }
        Err(err) => out.write_error(&err.to_string()),
    }
}

fn cmd_push(store: &mut Store, args: &[Vec<u8>], out: &mut ReplyBuf, front: bool) {
    if args.len() != 3 {
        arity_error(out, if front { "lpush" } else { "rpush" });
        return;
    }
    let result = if front {
        store.lpush(&args[1], &args[2])
    } else {
        store.rpush(&args[1], &args[2])
    };
    match result {
        Ok(len) => {
            store.enforce_maxmemory();
            out.write_integer(len as i64);
        }
        Err(err) => out.write_error(&err.to_string()),
    }
}

fn cmd_pop(store: &mut Store, args: &[Vec<u8>], out: &mut ReplyBuf, front: bool) {
    if args.len() != 2 {
        arity_error(out, if front { "lpop" } else { "rpop" });
        return;
    }
    let popped = if front {
        store.lpop(&args[1])
    } else {
        store.rpop(&args[1])
    };
    match popped {
        Some(value) => out.write_bulk(&value),
        None => out.write_null(),
    }
}

fn cmd_lrange(store: &mut Store, args: &[Vec<u8>], out: &mut ReplyBuf) {
    if args.len() != 4 {
        arity_error(out, "lrange");
        return;
    }
    let (Some(start), Some(stop)) = (
        ckit_common::parse_i64(&args[2]),
        ckit_common::parse_i64(&args[3]),
    ) else {
        out.write_error("ERR value is not an integer or out of range");
        return;
    };
    let items = store.lrange(&args[1], start, stop);
    out.write_array_header(items.len());
    for item in &items {
        out.write_bulk(item);
    }
}

fn cmd_llen(store: &mut Store, args: &[Vec<u8>], out: &mut ReplyBuf) {
    if args.len() != 2 {
        arity_error(out, "llen");
        return;
    }
    out.write_integer(store.llen(&args[1]) as i64);
}

fn cmd_hset(store: &mut Store, args: &[Vec<u8>], out: &mut ReplyBuf) {
    if args.len() != 4 {
        arity_error(out, "hset");
        return;
    }
    match store.hset(&args[1], &args[2], &args[3]) {
        Ok(is_new) => {
            store.enforce_maxmemory();
            out.write_integer(i64::from(is_new));
        }
        Err(err) => out.write_error(&err.to_string()),
    }
}

fn cmd_hget(store: &mut Store, args: &[Vec<u8>], out: &mut ReplyBuf) {
    if args.len() != 3 {
        arity_error(out, "hget");
        return;
    }
    match store.hget(&args[1], &args[2]) {
        Some(value) => out.write_bulk(&value),
        None => out.write_null(),
    }
}

fn cmd_hdel(store: &mut Store, args: &[Vec<u8>], out: &mut ReplyBuf) {
    if args.len() != 3 {
        arity_error(out, "hdel");
        return;
    }
    out.write_integer(i64::from(store.hdel(&args[1], &args[2])));
}

fn cmd_hgetall(store: &mut Store, args: &[Vec<u8>], out: &mut ReplyBuf) {
    if args.len() != 2 {
        arity_error(out, "hgetall");
        return;
    }
    let pairs = store.hgetall(&args[1]);
    out.write_array_header(pairs.len() * 2);
    for (field, value) in &pairs {
        out.write_bulk(field);
        out.write_bulk(value);
    }
}

fn cmd_expire(store: &mut Store, args: &[Vec<u8>], out: &mut ReplyBuf) {
    if args.len() != 3 {
        arity_error(out, "expire");
        return;
    }
    let Some(seconds) = ckit_common::parse_i64(&args[2]) else {
        out.write_error("ERR value is not an integer or out of range");
        return;
    };
    out.write_integer(i64::from(store.expire(&args[1], seconds)));
}

fn cmd_ttl(store: &mut Store, args: &[Vec<u8>], out: &mut ReplyBuf) {
    if args.len() != 2 {
        arity_error(out, "ttl");
        return;
    }
    out.write_integer(store.ttl(&args[1]));
}

fn cmd_persist(store: &mut Store, args: &[Vec<u8>], out: &mut ReplyBuf) {
    if args.len() != 2 {
        arity_error(out, "persist");
        return;
    }
    out.write_integer(i64::from(store.persist(&args[1])));
}

fn cmd_keys(store: &mut Store, args: &[Vec<u8>], out: &mut ReplyBuf) {
    if args.len() != 2 {
        arity_error(out, "keys");
        return;
    }
    let keys = store.keys(&args[1]);
    out.write_array_header(keys.len());
    for key in &keys {
        out.write_bulk(key);
    }
}

fn cmd_save(store: &Store, ctx: &ServerCtx, out: &mut ReplyBuf) {
    match snapshot::save(store, &ctx.snapshot_path) {
        Ok(()) => out.write_simple("OK"),
        Err(err) => {
            warn!(error = %err, "snapshot save failed");
            out.write_error("ERR snapshot save failed");
        }
    }
}

fn cmd_info(store: &Store, ctx: &ServerCtx, out: &mut ReplyBuf) {
    let snap = ctx.stats.snapshot();
    let info = format!(
        "# Server\r\n\
         cachekit_version:{}\r\n\
         uptime_in_seconds:{}\r\n\
         connected_clients:{}\r\n\
         used_memory:{}\r\n\
         total_commands_processed:{}\r\n\
         db0:keys={}\r\n",
        env!("CARGO_PKG_VERSION"),
        snap.uptime_secs,
        snap.connected_clients,
        store.used_memory(),
        snap.commands_processed,
        store.dbsize(),
    );
    out.write_bulk(info.as_bytes());
}
