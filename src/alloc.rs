//! Worst-fit contiguous allocator (C4), a pure function of a `Bitmap`
//! reference — it owns no state of its own.

use crate::bitmap::Bitmap;

/// Scans `bm` for the largest free run of at least `min_len` blocks.
/// Ties are broken by lowest start index (first one scanned wins). Returns
/// `None` if no run qualifies.
fn find_worst_fit(bm: &Bitmap, min_len: u32) -> Option<(u32, u32)> {
    let mut best: Option<(u32, u32)> = None;
    let mut cur_start = 0u32;
    let mut cur_len = 0u32;

    for i in 0..bm.total_blocks() {
        if !bm.test(i) {
            if cur_len == 0 {
                cur_start = i;
            }
            cur_len += 1;
        } else {
            if cur_len >= min_len && best.map_or(true, |(_, best_len)| cur_len > best_len) {
                best = Some((cur_start, cur_len));
            }
            cur_len = 0;
        }
    }
    if cur_len >= min_len && best.map_or(true, |(_, best_len)| cur_len > best_len) {
        best = Some((cur_start, cur_len));
    }

    best.map(|(start, len)| (start, len))
}

/// Allocates `count` contiguous blocks using the worst-fit strategy:
/// among all free runs long enough to satisfy the request, picks the
/// longest one (first found wins a tie). Sets the corresponding bitmap
/// bits and returns the first block id on success, or `None` if no run is
/// long enough — the bitmap is left unmodified on failure.
pub fn alloc(bm: &mut Bitmap, count: u32) -> Option<u32> {
    if count == 0 {
        return None;
    }
    let (start, _len) = find_worst_fit(bm, count)?;
    for i in start..start + count {
        bm.set(i, true);
    }
    Some(start)
}

/// Clears the bits for `[start, start+count)`. Does not check aliasing —
/// callers must free exactly what they allocated.
pub fn free(bm: &mut Bitmap, start: u32, count: u32) {
    for i in start..start + count {
        bm.set(i, false);
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn worst_fit_picks_largest_run() {
        // Runs of free blocks: [0..3)=3, [4..11)=7, [12..17)=5, then used.
        let mut bm = Bitmap::new(20);
        for i in 17..20 {
            bm.set(i, true);
        }
        bm.set(3, true);
        bm.set(11, true);
        // free runs: 0-2 (len 3), 4-10 (len 7), 12-16 (len 5)
        let start = alloc(&mut bm, 2).unwrap();
        assert_eq!(start, 4);
    }

    #[test]
    fn alloc_fails_when_no_run_fits() {
        let mut bm = Bitmap::new(4);
        bm.set(0, true);
        bm.set(1, true);
        bm.set(2, true);
        bm.set(3, true);
        assert_eq!(alloc(&mut bm, 1), None);
    }

    #[test]
    fn free_restores_prior_state() {
        let mut bm = Bitmap::new(16);
        let before = bm.popcount();
        let start = alloc(&mut bm, 3).unwrap();
        free(&mut bm, start, 3);
        assert_eq!(bm.popcount(), before);
    }

    #[test]
    fn tie_break_picks_lowest_start() {
        // Two free runs of equal length 3: [0..3) and [4..7).
        let mut bm = Bitmap::new(8);
        bm.set(3, true);
        bm.set(7, true);
        let start = alloc(&mut bm, 3).unwrap();
        assert_eq!(start, 0);
    }
}
