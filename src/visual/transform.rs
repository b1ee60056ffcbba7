//! Pan transform between layout and screen coordinates

use eframe::egui::{Pos2, Vec2};
use std::sync::atomic::{AtomicU64, Ordering};

/// Additive pixel offset applied at draw time
///
/// Both components live in one `AtomicU64`, so the paint pass never sees an
/// x from one drag and a y from another.
#[derive(Debug, Default)]
pub struct ViewTransform {
    offset: AtomicU64,
}

fn pack(v: Vec2) -> u64 {
    (u64::from(v.x.to_bits()) << 32) | u64::from(v.y.to_bits())
}

fn unpack(bits: u64) -> Vec2 {
    Vec2::new(f32::from_bits((bits >> 32) as u32), f32::from_bits(bits as u32))
}

impl ViewTransform {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accumulate a pan delta
    pub fn move_by(&self, delta: Vec2) {
        // The closure never returns None, so the update always succeeds
        let _ = self
            .offset
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |bits| {
                Some(pack(unpack(bits) + delta))
            });
    }

    /// Pan by a pointer drag from `from` to `to`
    pub fn drag(&self, from: Pos2, to: Pos2) {
        self.move_by(to - from);
    }

    pub fn offset(&self) -> Vec2 {
        unpack(self.offset.load(Ordering::Acquire))
    }

    pub fn reset(&self) {
        self.offset.store(pack(Vec2::ZERO), Ordering::Release);
    }

    /// Layout coordinate to screen coordinate
    pub fn apply(&self, point: Pos2) -> Pos2 {
        point + self.offset()
    }
}
