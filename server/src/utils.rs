use std::time::{Duration, SystemTime, UNIX_EPOCH};

// Get current timestamp in milliseconds
pub fn get_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_millis() as u64
}

/// Hands out game seeds taken from the wall clock.
///
/// Two starts within the same millisecond (or a clock stepping backwards)
/// still get distinct, strictly increasing seeds.
#[derive(Debug, Default)]
pub struct SeedSource {
    last: u64,
}

impl SeedSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_seed(&mut self) -> u64 {
        self.next_seed_at(get_timestamp())
    }

    fn next_seed_at(&mut self, now: u64) -> u64 {
        let seed = now.max(self.last.saturating_add(1));
        self.last = seed;
        seed
    }
}
