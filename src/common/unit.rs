//! Unit conversion utilities.
//!
//! WordprocessingML measures drawing extents in EMUs and paragraph indents
//! in twentieths of a point (twips).

pub const EMUS_PER_INCH: i64 = 914_400;
pub const TWIPS_PER_INCH: f64 = 1440.0;

/// Pixel density assumed for pictures that do not carry their own.
pub const DEFAULT_DPI: u32 = 96;

#[inline]
pub fn px_to_emu(px: u32, dpi: u32) -> i64 {
    ((px as f64) * EMUS_PER_INCH as f64 / dpi as f64) as i64
}

#[inline]
pub fn px_to_emu_96(px: u32) -> i64 {
    px_to_emu(px, DEFAULT_DPI)
}

/// Centimeters to twips, rounded to the nearest twip.
#[inline]
pub fn cm_to_twip(cm: f64) -> i64 {
    (cm / 2.54 * TWIPS_PER_INCH).round() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_px_to_emu() {
        assert_eq!(px_to_emu_96(96), EMUS_PER_INCH);
        assert_eq!(px_to_emu(300, 300), EMUS_PER_INCH);
    }

    #[test]
    fn test_list_indent_unit() {
        assert_eq!(cm_to_twip(0.74), 420);
        assert_eq!(cm_to_twip(2.54), 1440);
        assert_eq!(cm_to_twip(0.0), 0);
    }
}
