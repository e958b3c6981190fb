// crates/clipmark-core/src/color.rs
//
// Label → display colour. Same label, same colour, every session.

use sha2::{Digest, Sha256};

/// Hue resolution: the digest is reduced modulo this before scaling to [0, 1).
const HUE_STEPS: u64 = 100_000_000;

/// Deterministic RGB colour for `label`.
///
/// The SHA-256 digest is read as a big-endian integer, reduced mod 10^8 and
/// used as a fully saturated, full-value hue. Collisions are not corrected.
///
/// ```
/// use clipmark_core::color::color_for;
/// assert_eq!(color_for("cat"), [255, 142, 0]);
/// ```
pub fn color_for(label: &str) -> [u8; 3] {
    let digest = Sha256::digest(label.as_bytes());
    let reduced = digest.iter()
        .fold(0u64, |acc, &b| (acc * 256 + b as u64) % HUE_STEPS);
    let hue = reduced as f64 / HUE_STEPS as f64;
    let (r, g, b) = hsv_to_rgb(hue, 1.0, 1.0);
    [(255.0 * r) as u8, (255.0 * g) as u8, (255.0 * b) as u8]
}

/// HSV → RGB, all components in [0, 1].
pub fn hsv_to_rgb(h: f64, s: f64, v: f64) -> (f64, f64, f64) {
    if s == 0.0 {
        return (v, v, v);
    }
    let i = (h * 6.0).floor();
    let f = h * 6.0 - i;
    let p = v * (1.0 - s);
    let q = v * (1.0 - s * f);
    let t = v * (1.0 - s * (1.0 - f));
    match (i as i64).rem_euclid(6) {
        0 => (v, t, p),
        1 => (q, v, p),
        2 => (p, v, t),
        3 => (p, q, v),
        4 => (t, p, v),
        _ => (v, p, q),
    }
}
