// Staggered fade-in of occupant blocks on first load. Alpha is a pure function of
// the clock, so frames can be skipped without drifting.

use std::collections::HashMap;

use rand::Rng;

use crate::config::FadeSettings;
use crate::types::{CellCoord, EasingType, Timestamp};

#[derive(Debug, Clone, Copy, PartialEq)]
enum FadeEntry {
    /// Fades in over the configured duration once `begins_at` is reached.
    Pending { begins_at: Timestamp },
    Visible,
}

#[derive(Debug)]
pub struct PhotoFade {
    duration_us: u64,
    max_stagger_us: u64,
    entries: HashMap<CellCoord, FadeEntry>,
    /// Latest instant any entry is still fading.
    settles_at: Timestamp,
}

impl PhotoFade {
    pub fn new(settings: &FadeSettings) -> Self {
        PhotoFade {
            duration_us: settings.fade_duration_us,
            max_stagger_us: settings.max_stagger_us,
            entries: HashMap::new(),
            settles_at: Timestamp::default(),
        }
    }

    /// Start a fresh staggered fade for every cell, each with a random delay.
    pub fn seed_initial<R: Rng + ?Sized>(
        &mut self,
        cells: impl IntoIterator<Item = CellCoord>,
        now: Timestamp,
        rng: &mut R,
    ) {
        self.entries.clear();
        self.settles_at = now;
        for cell in cells {
            let delay = if self.max_stagger_us == 0 {
                0
            } else {
                rng.gen_range(0..self.max_stagger_us)
            };
            let begins_at = now.add_micros(delay);
            self.settles_at = self.settles_at.max(begins_at.add_micros(self.duration_us));
            self.entries.insert(cell, FadeEntry::Pending { begins_at });
        }
        log::debug!(
            "Seeded fade for {} occupants, settles at {}ms",
            self.entries.len(),
            self.settles_at.as_millis()
        );
    }

    /// Cells new since the last load appear at full opacity. Existing entries,
    /// including ones no longer listed, keep their state.
    pub fn refresh(&mut self, cells: impl IntoIterator<Item = CellCoord>) {
        for cell in cells {
            self.entries.entry(cell).or_insert(FadeEntry::Visible);
        }
    }

    pub fn alpha(&self, cell: CellCoord, now: Timestamp) -> f64 {
        match self.entries.get(&cell) {
            Some(FadeEntry::Pending { begins_at }) => {
                if now < *begins_at {
                    return 0.0;
                }
                if self.duration_us == 0 {
                    return 1.0;
                }
                let progress = now.micros_since(*begins_at) as f64 / self.duration_us as f64;
                EasingType::EaseOut.apply(progress)
            }
            Some(FadeEntry::Visible) | None => 1.0,
        }
    }

    pub fn is_animating(&self, now: Timestamp) -> bool {
        now < self.settles_at
            && self
                .entries
                .values()
                .any(|entry| matches!(entry, FadeEntry::Pending { .. }))
    }

    /// Retire entries whose fade has completed.
    pub fn tick(&mut self, now: Timestamp) {
        let duration = self.duration_us;
        for entry in self.entries.values_mut() {
            if let FadeEntry::Pending { begins_at } = *entry {
                if now >= begins_at.add_micros(duration) {
                    *entry = FadeEntry::Visible;
                }
            }
        }
    }
}
