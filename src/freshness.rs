//! # Freshness Gate
//!
//! A value paired with the instant it was last updated. Reads only return
//! the value while it is younger than the validity window; after that the
//! gate behaves as if no value had ever been received.
//!
//! Gates are not synchronized. They are owned by the control loop, written
//! by the decoder that owns the PGN and read by any consumer on that loop.
//!
//! ```
//! use gps_out::freshness::Freshness;
//!
//! let mut speed: Freshness<f64> = Freshness::default();
//! assert_eq!(speed.get(), None);
//!
//! speed.update(12.5);
//! assert_eq!(speed.get(), Some(12.5));
//! ```

use std::time::{Duration, Instant};

/// Validity window shared by every decoded value
pub const FRESHNESS_WINDOW: Duration = Duration::from_secs(4);

/// Last-update timestamp plus validity window guarding a value
#[derive(Debug, Clone)]
pub struct Freshness<T> {
    value: T,
    /// `None` until the first update (infinitely stale)
    last_update: Option<Instant>,
    window: Duration,
}

impl<T: Default> Default for Freshness<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T> Freshness<T> {
    /// Creates a stale gate holding `initial` with the standard 4 s window.
    pub fn new(initial: T) -> Self {
        Self::with_window(initial, FRESHNESS_WINDOW)
    }

    /// Creates a stale gate with a custom validity window.
    pub fn with_window(initial: T, window: Duration) -> Self {
        Self {
            value: initial,
            last_update: None,
            window,
        }
    }

    /// Records `value` and stamps it with the current instant.
    pub fn update(&mut self, value: T) {
        self.update_at(value, Instant::now());
    }

    /// Records `value` as received at `at`.
    pub fn update_at(&mut self, value: T, at: Instant) {
        self.value = value;
        self.last_update = Some(at);
    }

    /// Whether the value is still inside its window.
    pub fn is_fresh(&self) -> bool {
        self.is_fresh_at(Instant::now())
    }

    /// Whether the value is inside its window as seen from `now`.
    pub fn is_fresh_at(&self, now: Instant) -> bool {
        match self.last_update {
            Some(at) => now.saturating_duration_since(at) < self.window,
            None => false,
        }
    }

    /// Time since the last update, `None` if never updated.
    pub fn age(&self) -> Option<Duration> {
        self.last_update.map(|at| at.elapsed())
    }

    /// The validity window of this gate.
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Last stored value regardless of freshness.
    ///
    /// Only the owning decoder should use this, e.g. to carry a field
    /// forward when a frame layout omits it.
    pub(crate) fn last_value(&self) -> &T {
        &self.value
    }
}

impl<T: Clone> Freshness<T> {
    /// Returns the value if fresh.
    pub fn get(&self) -> Option<T> {
        self.get_at(Instant::now())
    }

    /// Returns the value if fresh as seen from `now`.
    pub fn get_at(&self, now: Instant) -> Option<T> {
        if self.is_fresh_at(now) {
            Some(self.value.clone())
        } else {
            None
        }
    }
}

impl<T: Clone + Default> Freshness<T> {
    /// Returns the value if fresh, otherwise `T::default()`.
    pub fn get_or_default(&self) -> T {
        self.get().unwrap_or_default()
    }

    /// Returns the value if fresh as seen from `now`, otherwise `T::default()`.
    pub fn get_or_default_at(&self, now: Instant) -> T {
        self.get_at(now).unwrap_or_default()
    }
}
