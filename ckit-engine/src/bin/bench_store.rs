//! # Store Benchmark Harness
//!
//! Repeatable benchmark driver for the keyspace store, so baseline
//! throughput can be compared over time.
//!
//! ## Design Principles
//! 1. **Deterministic Workload**: A fixed RNG seed keeps runs comparable.
//! 2. **Allocation Control**: Keys and values are prebuilt so setup cost
//!    stays off the hot path.
//! 3. **Direct Calls**: The store is exercised without any protocol or
//!    locking overhead; this measures the engine alone.

use std::env;
use std::hint::black_box;
use std::time::Instant;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use ckit_engine::Store;

const DEFAULT_KEY_COUNT: usize = 1 << 16;
const DEFAULT_OP_COUNT: usize = 1_000_000;
const DEFAULT_VALUE_SIZE: usize = 128;
const BENCH_SEED: u64 = 0x5EED_CAFE;

struct BenchConfig {
    key_count: usize,
    op_count: usize,
    value_size: usize,
}

impl BenchConfig {
    fn from_args() -> Self {
        let mut args = env::args().skip(1);
        BenchConfig {
            key_count: parse_usize(args.next(), DEFAULT_KEY_COUNT),
            op_count: parse_usize(args.next(), DEFAULT_OP_COUNT),
            value_size: parse_usize(args.next(), DEFAULT_VALUE_SIZE),
        }
    }
}

fn parse_usize(value: Option<String>, fallback: usize) -> usize {
    value.and_then(|raw| raw.parse().ok()).unwrap_or(fallback)
}

fn main() {
    let config = BenchConfig::from_args();
    let mut rng = SmallRng::seed_from_u64(BENCH_SEED);

    let keys: Vec<Vec<u8>> = (0..config.key_count)
        .map(|n| format!("bench:key:{n}").into_bytes())
        .collect();
    let value = vec![0xABu8; config.value_size];

    let mut store = Store::new();

    let start = Instant::now();
    for key in &keys {
        store.set(key, &value);
    }
    let fill = start.elapsed();
    report("fill/set", config.key_count, fill);

    // 90/10 read/write mix over random keys
    let start = Instant::now();
    for _ in 0..config.op_count {
        let key = &keys[rng.gen_range(0..keys.len())];
        if rng.gen_range(0..10) == 0 {
            store.set(key, &value);
        } else {
            black_box(store.get(key).ok());
        }
    }
    let mixed = start.elapsed();
    report("mixed 90r/10w", config.op_count, mixed);

    let start = Instant::now();
    for key in &keys {
        black_box(store.del(key));
    }
    let drain = start.elapsed();
    report("drain/del", config.key_count, drain);
}

fn report(label: &str, ops: usize, elapsed: std::time::Duration) {
    let secs = elapsed.as_secs_f64().max(f64::EPSILON);
    println!(
        "{label:>14}: {ops} ops in {:.3}s ({:.0} ops/sec)",
        elapsed.as_secs_f64(),
        ops as f64 / secs
    );
}
