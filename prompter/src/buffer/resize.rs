//! Growth policy for the shared ring buffer.

/// Largest backing length the ring will ever allocate.
///
/// Kept a few bytes under the allocator's hard limit of `isize::MAX`.
pub const MAX_BUFFER_SIZE: usize = isize::MAX as usize - 8;

/// Compute the new backing length for a ring that must accept a write.
///
/// # Arguments
///
/// * `available` - Free space in the ring right now
/// * `needed` - Size of the pending write
/// * `length` - Current backing length
///
/// The length doubles (adding `length`, `3 * length`, `7 * length`, ...) until
/// the free space covers `needed`, then is capped at [`MAX_BUFFER_SIZE`].
///
/// Returns `None` if the capped length still cannot fit the write, or if any
/// step of the computation overflows.
pub fn compute_resize(available: usize, needed: usize, length: usize) -> Option<usize> {
    debug_assert!(available < needed, "available ({available}) >= needed ({needed})");
    debug_assert!(available < length, "available ({available}) >= length ({length})");

    let mut additional: usize = 0;
    let mut shift: u32 = 1;
    while additional.checked_add(available)? < needed {
        // 2^shift - 1 accounts for the length already allocated
        let factor = 1usize.checked_shl(shift)? - 1;
        additional = length.checked_mul(factor)?;
        shift += 1;
    }

    let new_length = length.checked_add(additional)?.min(MAX_BUFFER_SIZE);

    // `available` already excludes the slot that separates full from empty,
    // so everything else in the old ring is buffered data plus that slot
    let occupied = length - available;
    match new_length.checked_sub(occupied) {
        Some(free) if free >= needed => Some(new_length),
        _ => None,
    }
}
