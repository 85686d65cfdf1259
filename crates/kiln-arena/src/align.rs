//! Offset alignment helpers.

/// Round `value` up to the next multiple of `alignment`.
///
/// `alignment` must be a non-zero power of two. The result may exceed
/// `u32::MAX` only if `value` is within `alignment` of it; callers pass
/// offsets that lie inside a range already padded for alignment.
pub fn align_up(value: u32, alignment: u32) -> u32 {
    debug_assert!(alignment.is_power_of_two());
    let mask = alignment as u64 - 1;
    ((value as u64 + mask) & !mask) as u32
}

/// Whether `alignment` is usable: non-zero and a power of two.
pub fn is_valid_alignment(alignment: u32) -> bool {
    alignment.is_power_of_two()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounds_up() {
        assert_eq!(align_up(0, 16), 0);
        assert_eq!(align_up(1, 16), 16);
        assert_eq!(align_up(16, 16), 16);
        assert_eq!(align_up(17, 4), 20);
        assert_eq!(align_up(7, 1), 7);
    }

    #[test]
    fn alignment_validity() {
        assert!(is_valid_alignment(1));
        assert!(is_valid_alignment(256));
        assert!(!is_valid_alignment(0));
        assert!(!is_valid_alignment(12));
    }
}
