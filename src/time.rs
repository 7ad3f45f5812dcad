//! Clock abstraction for expiry and heartbeat timestamping.
//!
//! All wall-clock reads go through [`Clock`] so tests can advance time
//! deterministically instead of sleeping past real expiry windows.

use chrono::{DateTime, Utc};

/// Source of the current wall-clock time.
pub trait Clock: Send + Sync {
  fn now(&self) -> DateTime<Utc>;
}

/// Production clock backed by the system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
  fn now(&self) -> DateTime<Utc> {
    Utc::now()
  }
}


#[cfg(test)]
mod tests {
  use super::testing::ManualClock;
  use super::*;
  use std::time::Duration;

  #[test]
  fn system_clock_tracks_utc_now() {
    let before = Utc::now();
    let now = SystemClock.now();
    let after = Utc::now();

    assert!(before <= now);
    assert!(now <= after);
  }

  #[test]
  fn manual_clock_advances_only_on_demand() {
    let clock = ManualClock::starting_now();
    let start = clock.now();

    assert_eq!(clock.now(), start);

    clock.advance(Duration::from_secs(60));
    assert_eq!(clock.now() - start, chrono::Duration::seconds(60));
  }
}
