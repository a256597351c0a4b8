use super::metadata::Version;

// Iterator for placing data in encoding region of QR
//------------------------------------------------------------------------------

/// Walks every module in the standard zig-zag order: two-column strips from the right
/// edge, alternating upwards and downwards, skipping the vertical timing column.
/// Function modules are yielded too and filtered by the caller.
pub struct EncRegionIter {
    right: i32,
    vert: i32,
    j: i32,
    w: i32,
}

impl EncRegionIter {
    pub const fn new(ver: Version) -> Self {
        let w = ver.width() as i32;
        Self { right: w - 1, vert: 0, j: 0, w }
    }
}

impl Iterator for EncRegionIter {
    type Item = (i32, i32);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.right < 1 {
                return None;
            }
            if self.vert >= self.w {
                self.vert = 0;
                self.right -= 2;
                if self.right == 6 {
                    self.right = 5;
                }
                continue;
            }

            let c = self.right - self.j;
            let upward = (self.right + 1) & 2 == 0;
            let r = if upward { self.w - 1 - self.vert } else { self.vert };

            self.j += 1;
            if self.j == 2 {
                self.j = 0;
                self.vert += 1;
            }
            return Some((r, c));
        }
    }
}

#[cfg(test)]
mod iter_tests {
    use super::EncRegionIter;
    use crate::common::metadata::Version;

    #[test]
    fn test_enc_region_start() {
        let coords: Vec<_> = EncRegionIter::new(Version::new(1).unwrap()).take(6).collect();
        assert_eq!(coords, vec![(20, 20), (20, 19), (19, 20), (19, 19), (18, 20), (18, 19)]);
    }

    #[test]
    fn test_enc_region_skips_timing_column() {
        for v in [1, 7, 40] {
            let ver = Version::new(v).unwrap();
            let w = ver.width() as i32;
            let coords: Vec<_> = EncRegionIter::new(ver).collect();
            assert_eq!(coords.len() as i32, w * (w - 1));
            assert!(coords.iter().all(|&(_, c)| c != 6));
        }
    }

    #[test]
    fn test_enc_region_turns_downwards() {
        let coords: Vec<_> = EncRegionIter::new(Version::new(1).unwrap()).skip(42).take(2).collect();
        assert_eq!(coords, vec![(0, 18), (0, 17)]);
    }
}
