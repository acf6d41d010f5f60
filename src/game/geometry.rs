//! Wrap/clamp arithmetic and circle collision tests

/// Map a value into `[min, max)` by toroidal wraparound.
///
/// Correct for inputs arbitrarily far outside the range, not just one
/// range-width away.
pub fn wrap(value: f32, min: f32, max: f32) -> f32 {
    let range = max - min;
    let mut offset = (value - min) % range;
    if offset < 0.0 {
        offset += range;
    }
    // Float rounding can land the adjusted remainder exactly on `range`
    if offset >= range {
        offset = 0.0;
    }
    min + offset
}

/// Bound a value to `[min, max]` without wraparound
pub fn clamp(value: f32, min: f32, max: f32) -> f32 {
    value.max(min).min(max)
}

/// True iff the Euclidean distance between centers is strictly less
/// than the sum of radii
pub fn circles_overlap(x1: f32, y1: f32, r1: f32, x2: f32, y2: f32, r2: f32) -> bool {
    let dx = x2 - x1;
    let dy = y2 - y1;
    let combined = r1 + r2;
    dx * dx + dy * dy < combined * combined
}
