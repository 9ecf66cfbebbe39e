//! A small per-tag rate limiter for the error classes the engine logs repeatedly (bad parses,
//! switch-reported flow-mod errors, decode failures, `nb_cfg` regressions).
//!
//! Mirrors the shape of OVS's `VLOG_RATE_LIMIT_INIT`: a token bucket keyed by a short string tag,
//! shared process-wide via a `lazy_static` mutex, so a flapping condition logs a bounded number
//! of times per window rather than once per tick.

use lazy_static::lazy_static;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

struct Bucket {
    tokens: u32,
    last_refill: Instant,
}

const BURST: u32 = 5;
const REFILL_INTERVAL: Duration = Duration::from_secs(60);

struct Limiter {
    buckets: HashMap<String, Bucket>,
}

impl Limiter {
    fn allow(&mut self, tag: &str, now: Instant) -> bool {
        let bucket = self.buckets.entry(tag.to_string()).or_insert_with(|| Bucket {
            tokens: BURST,
            last_refill: now,
        });
        if now.duration_since(bucket.last_refill) >= REFILL_INTERVAL {
            bucket.tokens = BURST;
            bucket.last_refill = now;
        }
        if bucket.tokens == 0 {
            false
        } else {
            bucket.tokens -= 1;
            true
        }
    }
}

lazy_static! {
    static ref LIMITER: Mutex<Limiter> = Mutex::new(Limiter { buckets: HashMap::new() });
}

/// Returns `true` if a message tagged `tag` should be logged right now. Call at most once per
/// candidate log line; a `false` result means this occurrence should be dropped silently.
pub fn allow(tag: &str) -> bool {
    LIMITER.lock().unwrap().allow(tag, Instant::now())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn burst_then_throttled() {
        let tag = "test-tag-unique-1";
        for _ in 0..BURST {
            assert!(allow(tag));
        }
        assert!(!allow(tag));
    }

    #[test]
    fn distinct_tags_independent() {
        assert!(allow("test-tag-unique-2"));
        assert!(allow("test-tag-unique-3"));
    }
}
