use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::OnceLock;

use chrono::{DateTime, SecondsFormat, Utc};

static ID_COUNTER: AtomicU32 = AtomicU32::new(0);
static PROCESS_UNIQUE: OnceLock<[u8; 5]> = OnceLock::new();

/// 24 lowercase hex chars: 4 bytes of epoch seconds, 5 random bytes fixed for
/// this process, 3 bytes of a wrapping counter.
pub fn new_snapshot_id() -> String {
    snapshot_id_at(Utc::now())
}

pub fn snapshot_id_at(now: DateTime<Utc>) -> String {
    let seconds = now.timestamp().max(0) as u32;
    let count = ID_COUNTER.fetch_add(1, Ordering::Relaxed) & 0x00ff_ffff;
    let mut bytes = [0u8; 12];
    bytes[..4].copy_from_slice(&seconds.to_be_bytes());
    bytes[4..9].copy_from_slice(process_unique());
    bytes[9..].copy_from_slice(&count.to_be_bytes()[1..]);
    bytes.iter().map(|byte| format!("{byte:02x}")).collect()
}

fn process_unique() -> &'static [u8; 5] {
    PROCESS_UNIQUE.get_or_init(|| std::array::from_fn(|_| fastrand::u8(..)))
}

/// RFC 3339 UTC timestamp with millisecond precision, e.g. `2023-11-14T22:13:20.000Z`.
pub fn rfc3339(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn now_rfc3339() -> String {
    rfc3339(Utc::now())
}
