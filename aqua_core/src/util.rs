//! Small helpers shared across modules.

pub const SECS_PER_DAY: i64 = 86_400;

/// Ceiling division for any sign of `n`; `d` must be positive.
#[inline]
pub const fn ceil_div_i64(n: i64, d: i64) -> i64 {
    let q = n.div_euclid(d);
    if n.rem_euclid(d) == 0 { q } else { q + 1 }
}

pub fn hh_mm(hour: u8, minute: u8) -> String {
    format!("{hour:02}:{minute:02}")
}

/// Duration in milliseconds from config, never zero.
#[inline]
pub fn ms(v: u64) -> std::time::Duration {
    std::time::Duration::from_millis(v.max(1))
}
