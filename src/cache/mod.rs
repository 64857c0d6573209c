use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

/// Monotonic time source, swappable in tests
pub trait Clock: Send + Sync {
    /// Seconds from an arbitrary fixed origin
    fn now_secs(&self) -> u64;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now_secs(&self) -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }
}

struct Entry<V> {
    value: V,
    inserted_at: u64,
}

/// Symbol-keyed cache with per-cache TTL
///
/// Used for exchange metadata that changes rarely (lot filters) so every cycle
/// does not re-fetch exchangeInfo. Interior mutability so the engine can hold
/// it behind a shared reference.
pub struct TtlCache<V> {
    entries: Mutex<HashMap<String, Entry<V>>>,
    ttl_secs: u64,
    clock: Box<dyn Clock>,
}

impl<V: Clone> TtlCache<V> {
    pub fn new(ttl: Duration) -> Self {
        Self::with_clock(ttl, Box::new(SystemClock))
    }

    pub fn with_clock(ttl: Duration, clock: Box<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl_secs: ttl.as_secs(),
            clock,
        }
    }

    pub fn get(&self, key: &str) -> Option<V> {
        let now = self.clock.now_secs();
        let mut entries = self.entries.lock().unwrap();
        match entries.get(key) {
            Some(entry) if now.saturating_sub(entry.inserted_at) < self.ttl_secs => {
                Some(entry.value.clone())
            }
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    pub fn insert(&self, key: &str, value: V) {
        let now = self.clock.now_secs();
        self.entries.lock().unwrap().insert(
            key.to_string(),
            Entry {
                value,
                inserted_at: now,
            },
        );
    }
}
