/// Circular sequence-number space `0..modulus`.
///
/// Plain `<` on wrapped sequence numbers is meaningless; every comparison
/// goes through [`SeqSpace::distance`], the forward distance on the ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeqSpace {
    modulus: u32,
}

impl SeqSpace {
    /// # Panics
    ///
    /// Panics if `modulus` is zero. Validated configs never produce one.
    pub fn new(modulus: u32) -> Self {
        assert!(modulus > 0, "sequence space must not be empty");
        Self { modulus }
    }

    pub fn modulus(&self) -> u32 {
        self.modulus
    }

    pub fn contains(&self, seq: u32) -> bool {
        seq < self.modulus
    }

    pub fn add(&self, seq: u32, n: u32) -> u32 {
        ((seq as u64 + n as u64) % self.modulus as u64) as u32
    }

    pub fn next(&self, seq: u32) -> u32 {
        self.add(seq, 1)
    }

    pub fn prev(&self, seq: u32) -> u32 {
        self.add(seq, self.modulus - 1)
    }

    /// Steps needed to walk forward from `from` to `to`.
    pub fn distance(&self, from: u32, to: u32) -> u32 {
        self.add(to, self.modulus - from % self.modulus)
    }

    /// True when `seq` lies in the half-open circular range `[start, start + len)`.
    pub fn in_window(&self, seq: u32, start: u32, len: u32) -> bool {
        self.distance(start, seq) < len
    }
}

#[cfg(test)]
mod tests {
    use super::SeqSpace;

    #[test]
    fn next_and_prev_wrap() {
        let space = SeqSpace::new(8);
        assert_eq!(space.next(7), 0);
        assert_eq!(space.prev(0), 7);
        assert_eq!(space.add(6, 5), 3);
    }

    #[test]
    fn distance_is_forward_on_the_ring() {
        let space = SeqSpace::new(8);
        assert_eq!(space.distance(6, 1), 3);
        assert_eq!(space.distance(1, 6), 5);
        assert_eq!(space.distance(4, 4), 0);
    }

    #[test]
    fn window_membership_across_wraparound() {
        let space = SeqSpace::new(8);
        // base 6, four outstanding: 6, 7, 0, 1
        for seq in [6, 7, 0, 1] {
            assert!(space.in_window(seq, 6, 4), "{seq} should be outstanding");
        }
        for seq in [2, 3, 4, 5] {
            assert!(!space.in_window(seq, 6, 4), "{seq} should not be outstanding");
        }
        assert!(!space.in_window(6, 6, 0));
    }

    #[test]
    fn large_modulus_does_not_overflow() {
        let space = SeqSpace::new(u32::MAX);
        assert_eq!(space.next(u32::MAX - 1), 0);
        assert_eq!(space.prev(0), u32::MAX - 1);
    }
}
