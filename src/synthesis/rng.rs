//! Seeded draws keyed by profile id.
//!
//! `draw(offset) = frac(sin(seed + offset) * 10000)` where `seed` is the sum of
//! the id's UTF-16 code units. The formula is kept as-is so that demo payloads
//! line up with the ones the dashboard has always shown; the price is mediocre
//! statistical quality, which is irrelevant for fixture data.

/// Deterministic draw source for a single profile id.
///
/// Holds no state beyond the seed: every call is addressed by an explicit
/// offset, so draw order never matters and the type is freely shareable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeededRng {
    seed: u64,
}

impl SeededRng {
    pub fn new(profile_id: &str) -> Self {
        Self {
            seed: seed_for(profile_id),
        }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Uniform-ish value in `[0, 1)`.
    pub fn draw(&self, offset: i64) -> f64 {
        let x = ((self.seed as f64) + (offset as f64)).sin() * 10_000.0;
        let frac = x - x.floor();
        // floor() keeps this in [0, 1) for finite x; guard the rounding edge anyway.
        if frac >= 1.0 {
            0.0
        } else {
            frac
        }
    }

    /// Integer in `[min, max]`, both inclusive. Swapped bounds are normalized.
    pub fn rand_int(&self, min: i64, max: i64, offset: i64) -> i64 {
        let (lo, hi) = if min <= max { (min, max) } else { (max, min) };
        let span = (hi - lo + 1) as f64;
        let picked = (self.draw(offset) * span).floor() as i64 + lo;
        picked.min(hi)
    }

    /// Pick one element; `None` only for an empty slice.
    pub fn pick<'a, T>(&self, values: &'a [T], offset: i64) -> Option<&'a T> {
        if values.is_empty() {
            return None;
        }
        let idx = self.rand_int(0, values.len() as i64 - 1, offset) as usize;
        values.get(idx)
    }

    /// ~50% gate used for biomarkers that are not always collected.
    pub fn coin_flip(&self, offset: i64) -> bool {
        self.rand_int(0, 60, offset) > 30
    }
}

/// Sum of UTF-16 code units, matching `charCodeAt` summation.
pub fn seed_for(profile_id: &str) -> u64 {
    profile_id.encode_utf16().map(u64::from).sum()
}
