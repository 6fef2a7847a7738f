//! # Key Generator
//!
//! Produces random alphanumeric logical keys for `insert`. Candidates are
//! checked against the table inside the insert's own write transaction, so the
//! accepted key is guaranteed free (absent or expired) at commit time.

use rand::Rng;
use rand::distr::Alphanumeric;
use sett_common::{Envelope, SettError, SettResult, encode_key};
use tracing::debug;

use crate::engine::StoreTx;
use crate::expiry::{Lookup, lookup};

/// Default generated key length; 62^16 candidates keep collisions negligible.
pub const DEFAULT_KEY_LENGTH: usize = 16;

/// Collision retries before `insert` gives up with `KeyspaceExhausted`.
pub const MAX_INSERT_ATTEMPTS: usize = 16;

/// Returns a uniformly random alphanumeric string of `length` characters.
pub fn generate(length: usize) -> String {
    rand::rng()
        .sample_iter(Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}

/// Writes `envelope` under a freshly generated key of `table`.
///
/// Uses `candidate` to propose keys so tests can force collisions.
pub(crate) fn insert_with<T, G>(
    tx: &mut T,
    table: &str,
    envelope: &Envelope,
    now_ms: u64,
    mut candidate: G,
) -> SettResult<String>
where
    T: StoreTx + ?Sized,
    G: FnMut() -> String,
{
    let encoded = envelope.encode();
    for attempt in 1..=MAX_INSERT_ATTEMPTS {
        let key = candidate();
        let physical = encode_key(table, &key);
        match lookup(&*tx, &physical, now_ms)? {
            Lookup::Live(_) => {
                debug!(table, attempt, "generated key collided; retrying");
            }
            Lookup::Missing | Lookup::Expired => {
                tx.put(&physical, &encoded)?;
                return Ok(key);
            }
        }
    }
    Err(SettError::KeyspaceExhausted {
        attempts: MAX_INSERT_ATTEMPTS,
    })
}
