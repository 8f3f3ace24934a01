//! Simple wrappers to make unit mistakes hard to make, plus a [`Clock`] that
//! can be swapped for a [`ManualClock`] in tests

#![warn(unused_crate_dependencies)]

use std::{
    fmt::{Debug, Display},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

/// Intended to be similar to Duration but always clear that it is in Seconds
#[derive(
    Debug,
    Default,
    Clone,
    Copy,
    PartialEq,
    Eq,
    serde::Serialize,
    serde::Deserialize,
    PartialOrd,
    Ord,
)]
pub struct Seconds(u64);

/// Seconds since the unix epoch. Keeps on ticking if the computer is sleeping
#[derive(
    Debug,
    Default,
    Clone,
    Copy,
    PartialEq,
    Eq,
    serde::Serialize,
    serde::Deserialize,
    PartialOrd,
    Ord,
    Hash,
)]
pub struct Timestamp(u64);

impl Seconds {
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    pub const fn from_minutes(minutes: u64) -> Self {
        Self(minutes * 60)
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn saturating_sub(&self, other: Seconds) -> Seconds {
        Self(self.0.saturating_sub(other.0))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Timestamp {
    pub const fn from_secs_since_epoch(secs: u64) -> Self {
        Self(secs)
    }

    pub fn now() -> Self {
        Self(
            web_time::SystemTime::UNIX_EPOCH
                .elapsed()
                .map(|d| d.as_secs())
                .unwrap_or_default(),
        )
    }

    pub fn as_secs_since_epoch(&self) -> u64 {
        self.0
    }

    /// Returns the number of seconds since `past_time` or None if `past_time`
    /// is in the future
    pub fn seconds_since(self, past_time: Self) -> Option<Seconds> {
        self.0.checked_sub(past_time.0).map(Seconds)
    }

    /// `None` if the value does not fit in chrono's range
    pub fn as_utc_datetime(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        chrono::DateTime::from_timestamp(i64::try_from(self.0).ok()?, 0)
    }

    pub fn display_as_locale_datetime(&self) -> String {
        match self.as_utc_datetime() {
            Some(utc) => chrono::DateTime::<chrono::Local>::from(utc)
                .format("%c")
                .to_string(),
            None => format!("{} (out of range)", self.0),
        }
    }
}

impl std::ops::Add<Seconds> for Timestamp {
    type Output = Self;

    fn add(self, rhs: Seconds) -> Self::Output {
        Self(self.0.saturating_add(rhs.0))
    }
}

impl std::ops::AddAssign<Seconds> for Timestamp {
    fn add_assign(&mut self, rhs: Seconds) {
        self.0 = self.0.saturating_add(rhs.0);
    }
}

impl From<u64> for Seconds {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl From<Seconds> for Duration {
    fn from(value: Seconds) -> Self {
        Duration::from_secs(value.0)
    }
}

impl From<Duration> for Seconds {
    fn from(value: Duration) -> Self {
        Self(value.as_secs())
    }
}

impl Display for Seconds {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}s", self.0)
    }
}

impl Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

/// Source of the current time for anything that needs to measure staleness
pub trait Clock: Debug + Send + Sync + 'static {
    fn now(&self) -> Timestamp;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp::now()
    }
}

/// A clock that only moves when told to. Clones share the same time.
#[derive(Debug, Default, Clone)]
pub struct ManualClock {
    secs: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new(start: Timestamp) -> Self {
        Self {
            secs: Arc::new(AtomicU64::new(start.0)),
        }
    }

    pub fn advance(&self, by: Seconds) {
        self.secs.fetch_add(by.0, Ordering::SeqCst);
    }

    pub fn set(&self, to: Timestamp) {
        self.secs.store(to.0, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        Timestamp(self.secs.load(Ordering::SeqCst))
    }
}
