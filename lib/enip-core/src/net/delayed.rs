//! Fixed-capacity queue of pending UDP replies, used only by the UDP List Identity
//! service: a real device must not answer broadcast List Identity requests instantly,
//! to avoid every device on the segment replying in the same instant.

use std::net::SocketAddr;

use enip_support::random::XorShift32;

use crate::net::session::SocketId;

pub struct DelayedReply {
    pub socket: SocketId,
    pub dest: SocketAddr,
    pub frame: Vec<u8>,
    remaining_ms: i64,
}

pub struct DelayedReplyQueue {
    slots: Vec<Option<DelayedReply>>,
}

impl DelayedReplyQueue {
    pub fn new(capacity: usize) -> DelayedReplyQueue {
        DelayedReplyQueue { slots: (0..capacity).map(|_| None).collect() }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn in_flight(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    /// Computes the clamped max-delay window from the raw sender-context value, per the
    /// source's `determineDelayTime`: 0 -> 2000, 1..499 -> 500, else unchanged.
    pub fn clamp_max_delay(raw_max_delay_ms: u16) -> u16 {
        match raw_max_delay_ms {
            0 => 2000,
            1..=499 => 500,
            other => other,
        }
    }

    /// Enqueues a delayed reply, drawing a uniform delay in `[1, clamp(raw_max_delay_ms)]`
    /// from `rng`. Returns `false` (and drops the reply silently) if the queue is full.
    pub fn enqueue(
        &mut self,
        socket: SocketId,
        dest: SocketAddr,
        frame: Vec<u8>,
        raw_max_delay_ms: u16,
        rng: &mut XorShift32,
    ) -> bool {
        match self.slots.iter().position(Option::is_none) {
            Some(index) => {
                let max_delay = Self::clamp_max_delay(raw_max_delay_ms);
                let remaining_ms = rng.uniform_delay_ms(max_delay as u32) as i64;
                self.slots[index] = Some(DelayedReply { socket, dest, frame, remaining_ms });
                true
            }
            None => false,
        }
    }

    /// Decrements every pending deadline by `elapsed_ms` and drains the entries that are
    /// now due, releasing their slots.
    pub fn tick(&mut self, elapsed_ms: u32) -> Vec<DelayedReply> {
        let mut due = Vec::new();

        for slot in self.slots.iter_mut() {
            if let Some(reply) = slot {
                reply.remaining_ms -= elapsed_ms as i64;
                if reply.remaining_ms <= 0 {
                    due.push(slot.take().unwrap());
                }
            }
        }

        due
    }

    pub fn clear(&mut self) {
        for slot in self.slots.iter_mut() {
            *slot = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr() -> SocketAddr {
        "127.0.0.1:44818".parse().unwrap()
    }

    #[test]
    fn clamp_formula_matches_source() {
        assert_eq!(DelayedReplyQueue::clamp_max_delay(0), 2000);
        assert_eq!(DelayedReplyQueue::clamp_max_delay(1), 500);
        assert_eq!(DelayedReplyQueue::clamp_max_delay(499), 500);
        assert_eq!(DelayedReplyQueue::clamp_max_delay(500), 500);
        assert_eq!(DelayedReplyQueue::clamp_max_delay(1000), 1000);
    }

    #[test]
    fn enqueue_fails_silently_once_capacity_is_reached() {
        let mut queue = DelayedReplyQueue::new(1);
        let mut rng = XorShift32::new(1);

        assert!(queue.enqueue(1, addr(), vec![], 1000, &mut rng));
        assert!(!queue.enqueue(2, addr(), vec![], 1000, &mut rng));
        assert_eq!(queue.in_flight(), 1);
    }

    #[test]
    fn tick_emits_entries_whose_deadline_has_elapsed() {
        let mut queue = DelayedReplyQueue::new(2);
        let mut rng = XorShift32::new(42);

        queue.enqueue(1, addr(), vec![0xaa], 1000, &mut rng);

        let mut emitted = Vec::new();
        for _ in 0..1000 {
            emitted.extend(queue.tick(1));
            if queue.in_flight() == 0 {
                break;
            }
        }

        assert_eq!(emitted.len(), 1);
        assert_eq!(emitted[0].frame, vec![0xaa]);
        assert_eq!(queue.in_flight(), 0);
    }

    #[test]
    fn delay_always_falls_within_one_to_clamped_max() {
        let mut rng = XorShift32::new(0xc0ffee);
        let mut queue = DelayedReplyQueue::new(1);

        for raw in [0u16, 1, 250, 1000, 5000] {
            queue.clear();
            queue.enqueue(1, addr(), vec![], raw, &mut rng);

            let max = DelayedReplyQueue::clamp_max_delay(raw) as i64;
            let reply = queue.slots[0].as_ref().unwrap();
            assert!(reply.remaining_ms >= 1 && reply.remaining_ms <= max);
        }
    }
}
