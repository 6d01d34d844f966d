//! Angle to item mapping
//!
//! Segment 0 starts at 12 o'clock and segments run clockwise. The pointer is
//! fixed at the top while the wheel turns underneath it, so the pointed-at
//! position is `360 - angle`. Half a segment is added before dividing so a
//! segment's centre, not its leading edge, lines up with its index.

/// Width of one segment in degrees
pub fn segment_width(item_count: usize) -> f64 {
    360.0 / item_count as f64
}

/// Index of the item under the pointer, or `None` for an empty wheel
pub fn select(angle: f64, item_count: usize) -> Option<usize> {
    if item_count == 0 {
        return None;
    }
    let width = segment_width(item_count);
    let pointed = 360.0 - angle.rem_euclid(360.0);
    let shifted = (pointed + width / 2.0).rem_euclid(360.0);
    Some((shifted / width).floor() as usize % item_count)
}

/// Whether advancing by `velocity` to `angle` crossed a segment edge
///
/// Used to pace the audible clicks; slow wheels below `min_velocity` stay
/// silent.
pub fn crossed_segment(angle: f64, velocity: f64, item_count: usize, min_velocity: f64) -> bool {
    if velocity <= min_velocity {
        return false;
    }
    let width = segment_width(item_count.max(1));
    (angle / width).floor() != ((angle - velocity) / width).floor()
}
