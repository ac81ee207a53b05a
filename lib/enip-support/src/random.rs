//! A tiny, explicit xorshift32 generator.
//!
//! Not a general-purpose RNG: the only thing built on top of this is the delayed-reply
//! emission window, which needs to be deterministic under a fixed seed for tests.

pub struct XorShift32 {
    state: u32,
}

impl XorShift32 {
    /// Seeds must be nonzero; xorshift never recovers from a zero state.
    pub fn new(seed: u32) -> XorShift32 {
        XorShift32 {
            state: if seed == 0 { 0x9e37_79b9 } else { seed },
        }
    }

    #[inline]
    pub fn next_u32(&mut self) -> u32 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.state = x;
        x
    }

    /// Uniform draw in `[1, max]`, matching the source's `(max * rand()) / RAND_MAX + 1`.
    pub fn uniform_delay_ms(&mut self, max_delay_ms: u32) -> u32 {
        let draw = self.next_u32();
        ((max_delay_ms as u64 * draw as u64) / (u32::MAX as u64)) as u32 + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_produces_same_sequence() {
        let mut a = XorShift32::new(12345);
        let mut b = XorShift32::new(12345);

        for _ in 0..16 {
            assert_eq!(a.next_u32(), b.next_u32());
        }
    }

    #[test]
    fn different_seeds_diverge() {
        let mut a = XorShift32::new(1);
        let mut b = XorShift32::new(2);

        assert_ne!(a.next_u32(), b.next_u32());
    }

    #[test]
    fn uniform_delay_stays_within_bounds() {
        let mut rng = XorShift32::new(0xdead_beef);

        for _ in 0..1000 {
            let delay = rng.uniform_delay_ms(1000);
            assert!(delay >= 1 && delay <= 1000, "delay {} out of range", delay);
        }
    }

    #[test]
    fn zero_seed_is_remapped_to_a_nonzero_state() {
        let mut rng = XorShift32::new(0);
        assert_ne!(rng.next_u32(), 0);
    }
}
