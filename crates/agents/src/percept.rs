//! Simulated environment input.
//!
//! Agents never call a random number generator directly; they read from a
//! [`Sense`], so a run can be driven by seeded randomness or by a fixed
//! script in tests.

use std::collections::VecDeque;

use rand::{Rng, SeedableRng};
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

/// Damage severity reported by a disaster sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    Normal,
    Low,
    Medium,
    High,
    Catastrophic,
}

impl Severity {
    pub const ALL: [Severity; 5] = [
        Severity::Normal,
        Severity::Low,
        Severity::Medium,
        Severity::High,
        Severity::Catastrophic,
    ];

    /// 0 (normal) through 4 (catastrophic).
    pub fn level(self) -> u8 {
        self as u8
    }

    pub fn from_level(level: u8) -> Option<Self> {
        Self::ALL.get(usize::from(level)).copied()
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Severity::Normal => "Normal",
            Severity::Low => "Low",
            Severity::Medium => "Medium",
            Severity::High => "High",
            Severity::Catastrophic => "Catastrophic",
        };
        f.write_str(name)
    }
}

/// Produces the next reading of some part of the environment.
pub trait Sense<T>: Send {
    fn sense(&mut self) -> T;
}

impl<T, F> Sense<T> for F
where
    F: FnMut() -> T + Send,
{
    fn sense(&mut self) -> T {
        self()
    }
}

/// Replays fixed readings, then repeats `then` forever.
#[derive(Debug, Clone)]
pub struct Scripted<T> {
    readings: VecDeque<T>,
    then: T,
}

impl<T> Scripted<T> {
    pub fn new(readings: impl IntoIterator<Item = T>, then: T) -> Self {
        Self {
            readings: readings.into_iter().collect(),
            then,
        }
    }
}

impl<T: Clone + Send> Sense<T> for Scripted<T> {
    fn sense(&mut self) -> T {
        self.readings.pop_front().unwrap_or_else(|| self.then.clone())
    }
}

/// A generator for one random source.
///
/// With a seed, each `stream` gets its own reproducible sequence; without
/// one, the generator is seeded from the OS.
pub fn rng(seed: Option<u64>, stream: u64) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed ^ stream.wrapping_mul(0x9E37_79B9_7F4A_7C15)),
        None => StdRng::from_os_rng(),
    }
}

pub fn random_severity(mut rng: StdRng) -> impl Sense<Severity> {
    use rand::seq::IndexedRandom;
    move || *Severity::ALL.choose(&mut rng).unwrap_or(&Severity::Normal)
}

/// Zone numbers `1..=zones`.
pub fn random_zone(mut rng: StdRng, zones: u32) -> impl Sense<u32> {
    let zones = zones.max(1);
    move || rng.random_range(1..=zones)
}
