//! Affine `(start, stop, step)` coordinate math shared by `SlicedIndex`
//! (§4.6) and `Index::remove_rows`' stride-triple spec (§4.5). Kept as one
//! small module so the floor-division convention is defined exactly once —
//! see §9's resolved open question: every path here uses integer floor
//! division, never a floating-point fallback.

/// `length = max(0, ceil((stop - start) / step))`, sign of `step` handled
/// (S1).
pub fn slice_length(start: isize, stop: isize, step: isize) -> usize {
    if step == 0 {
        return 0;
    }
    let diff = stop - start;
    if diff == 0 || (step > 0) != (diff > 0) {
        return 0;
    }
    let (n, d) = if step > 0 { (diff, step) } else { (-diff, -step) };
    ((n + d - 1) / d).max(0) as usize
}

/// Maps a sliced-coordinate row `i` to the corresponding parent row (S2).
pub fn orig_coord(i: usize, start: isize, step: isize) -> isize { start + i as isize * step }

/// Whether parent row `r` is visible through this slice, i.e. stride-aligned
/// and within the half-open interval implied by `start`/`stop`/`sign(step)`
/// (S3).
pub fn row_in_slice(r: isize, start: isize, stop: isize, step: isize) -> bool {
    if step == 0 {
        return false;
    }
    let diff = r - start;
    if diff % step != 0 {
        return false;
    }
    if step > 0 {
        r >= start && r < stop
    } else {
        r <= start && r > stop
    }
}

/// Maps parent row `r` to its sliced coordinate, given it has already
/// passed `row_in_slice`.
pub fn sliced_coord(r: isize, start: isize, step: isize) -> usize { ((r - start) / step) as usize }

/// Materialise a stride triple into the concrete row numbers it selects,
/// ascending parent-row order for a positive step, descending for a
/// negative one (matching Python slicing iteration order).
pub fn stride_rows(start: isize, stop: isize, step: isize) -> Vec<usize> {
    let len = slice_length(start, stop, step);
    (0..len).map(|i| orig_coord(i, start, step) as usize).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positive_step_length_and_coords() {
        assert_eq!(slice_length(0, 10, 2), 5);
        assert_eq!(stride_rows(0, 10, 2), vec![0, 2, 4, 6, 8]);
    }

    #[test]
    fn negative_step_length_and_coords() {
        assert_eq!(slice_length(9, -1, -2), 5);
        assert_eq!(stride_rows(9, -1, -2), vec![9, 7, 5, 3, 1]);
    }

    #[test]
    fn empty_slice_is_well_formed() {
        assert_eq!(slice_length(5, 5, 1), 0);
        assert_eq!(slice_length(5, 3, 1), 0);
        assert!(stride_rows(5, 3, 1).is_empty());
    }

    #[test]
    fn membership_respects_alignment_and_direction() {
        assert!(row_in_slice(4, 0, 10, 2));
        assert!(!row_in_slice(5, 0, 10, 2));
        assert!(!row_in_slice(10, 0, 10, 2));
        assert!(row_in_slice(7, 9, -1, -2));
        assert!(!row_in_slice(8, 9, -1, -2));
    }
}
