//! Utility functions shared across the crate.

use std::path::PathBuf;

/// Get the user's config directory following XDG conventions.
///
/// Returns `$XDG_CONFIG_HOME` if set, otherwise `$HOME/.config`.
pub fn config_dir() -> Option<PathBuf> {
    std::env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".config")))
}

/// Convert a non-negative f32 extent to whole pixels, rounding up.
///
/// Negative and NaN inputs give 0.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
pub fn ceil_to_pixels(value: f32) -> u32 {
    // Precision loss on MAX is fine - we just need an upper bound
    const MAX: f32 = u32::MAX as f32;
    let ceiled = value.ceil();
    if ceiled.is_nan() || ceiled <= 0.0 {
        0
    } else if ceiled >= MAX {
        u32::MAX
    } else {
        ceiled as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ceil_to_pixels() {
        assert_eq!(ceil_to_pixels(612.0), 612);
        assert_eq!(ceil_to_pixels(612.2), 613);
        assert_eq!(ceil_to_pixels(-3.0), 0);
        assert_eq!(ceil_to_pixels(f32::NAN), 0);
        assert_eq!(ceil_to_pixels(f32::INFINITY), u32::MAX);
    }
}
