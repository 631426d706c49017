//! Multiplicity intervals.
//!
//! An [`Interval`] is a set of natural numbers `{min..=max}` where `max` may be
//! unbounded. Schema cardinalities are always well formed (`min <= max`); the
//! interval algebra used during matching may also produce the empty interval.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Interval {
    pub min: u32,
    /// `None` means unbounded.
    pub max: Option<u32>,
}

impl Interval {
    pub const ZERO: Interval = Interval::exactly(0);
    pub const ONE: Interval = Interval::exactly(1);
    pub const OPT: Interval = Interval {
        min: 0,
        max: Some(1),
    };
    pub const STAR: Interval = Interval { min: 0, max: None };
    pub const PLUS: Interval = Interval { min: 1, max: None };
    /// The canonical empty interval.
    pub const EMPTY: Interval = Interval {
        min: 1,
        max: Some(0),
    };

    pub const fn new(min: u32, max: Option<u32>) -> Self {
        Self { min, max }
    }

    pub const fn exactly(n: u32) -> Self {
        Self { min: n, max: Some(n) }
    }

    pub const fn at_least(n: u32) -> Self {
        Self { min: n, max: None }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self.max, Some(max) if max < self.min)
    }

    pub fn is_unbounded(&self) -> bool {
        self.max.is_none()
    }

    pub fn contains(&self, n: u32) -> bool {
        n >= self.min && self.max.map_or(true, |max| n <= max)
    }

    /// Whether this is one of the three repetition operators kept by SORBE form.
    pub fn is_canonical(&self) -> bool {
        *self == Self::OPT || *self == Self::STAR || *self == Self::PLUS
    }

    /// Pointwise sum `{a + b | a in self, b in other}`.
    pub fn add(self, other: Interval) -> Interval {
        if self.is_empty() || other.is_empty() {
            return Self::EMPTY;
        }
        let max = match (self.max, other.max) {
            (Some(a), Some(b)) => Some(a.saturating_add(b)),
            _ => None,
        };
        Interval::new(self.min.saturating_add(other.min), max)
    }

    /// Set intersection.
    pub fn inter(self, other: Interval) -> Interval {
        if self.is_empty() || other.is_empty() {
            return Self::EMPTY;
        }
        let min = self.min.max(other.min);
        let max = match (self.max, other.max) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (Some(a), None) | (None, Some(a)) => Some(a),
            (None, None) => None,
        };
        Self::normalize(Interval::new(min, max))
    }

    /// Repetition quotient: every `k` such that some `j` in `self` satisfies
    /// `k * card.min <= j <= k * card.max`.
    ///
    /// This answers "how many repetitions of `E{card}` can produce a bag that
    /// `E` alone matches `j` times".
    pub fn div(self, card: Interval) -> Interval {
        if self.is_empty() || card.is_empty() {
            return Self::EMPTY;
        }

        // Lower bound from `k * card.max >= self.min`.
        let min = if self.min == 0 {
            0
        } else {
            match card.max {
                None => 1,
                Some(0) => return Self::EMPTY,
                Some(m) => self.min.div_ceil(m),
            }
        };

        // Upper bound from `k * card.min <= self.max`.
        let max = match (self.max, card.min) {
            (None, _) | (_, 0) => None,
            (Some(j), m) => Some(j / m),
        };

        Self::normalize(Interval::new(min, max))
    }

    fn normalize(i: Interval) -> Interval {
        if i.is_empty() {
            Self::EMPTY
        } else {
            i
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "{{}}");
        }
        match self.max {
            Some(max) => write!(f, "[{};{}]", self.min, max),
            None => write!(f, "[{};*]", self.min),
        }
    }
}
