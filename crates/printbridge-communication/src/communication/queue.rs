//! Bounded command ring with separate send and acknowledge cursors
//!
//! Three cursors walk the same index space modulo the capacity:
//! - `head`: next free slot (producer)
//! - `send_tail`: next command to transmit
//! - `tail`: oldest command still waiting for the printer's `ok`
//!
//! `tail <= send_tail <= head` in circular order. One slot is always left
//! empty so that a full ring can be told apart from an empty one.

use printbridge_core::QueueError;

/// Default number of slots, one of which is always kept free
pub const DEFAULT_QUEUE_CAPACITY: usize = 10;

/// Fixed-capacity command queue with two-phase consumption
#[derive(Debug, Clone)]
pub struct CommandQueue {
    slots: Vec<String>,
    head: usize,
    send_tail: usize,
    tail: usize,
}

impl Default for CommandQueue {
    fn default() -> Self {
        Self::new(DEFAULT_QUEUE_CAPACITY)
    }
}

impl CommandQueue {
    /// Create a queue with `capacity` slots (`capacity - 1` usable)
    ///
    /// Capacities below 2 are raised to 2 so the ring can hold one command.
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: vec![String::new(); capacity.max(2)],
            head: 0,
            send_tail: 0,
            tail: 0,
        }
    }

    /// Total slot count, including the one kept free
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    fn next(&self, index: usize) -> usize {
        (index + 1) % self.slots.len()
    }

    /// Store a command behind everything already queued
    pub fn push(&mut self, command: impl Into<String>) -> Result<(), QueueError> {
        let command = command.into();
        if command.is_empty() {
            return Err(QueueError::EmptyCommand);
        }

        let next_head = self.next(self.head);
        if next_head == self.tail {
            return Err(QueueError::Full {
                capacity: self.capacity(),
            });
        }

        self.slots[self.head] = command;
        self.head = next_head;
        Ok(())
    }

    /// Next command to transmit, without consuming it
    pub fn peek_send(&self) -> Option<&str> {
        if self.send_tail == self.head {
            None
        } else {
            Some(self.slots[self.send_tail].as_str())
        }
    }

    /// Mark the next command as transmitted
    ///
    /// The slot stays occupied until [`CommandQueue::pop_acknowledge`].
    pub fn pop_send(&mut self) -> Option<String> {
        if self.send_tail == self.head {
            return None;
        }

        let command = self.slots[self.send_tail].clone();
        self.send_tail = self.next(self.send_tail);
        Some(command)
    }

    /// Retire the oldest transmitted command and free its slot
    pub fn pop_acknowledge(&mut self) -> Option<String> {
        if self.tail == self.send_tail {
            return None;
        }

        let command = std::mem::take(&mut self.slots[self.tail]);
        self.tail = self.next(self.tail);
        Some(command)
    }

    /// Nothing queued and nothing in flight
    pub fn is_empty(&self) -> bool {
        self.head == self.tail
    }

    /// Nothing transmitted is waiting for an acknowledgment
    pub fn is_ack_empty(&self) -> bool {
        self.tail == self.send_tail
    }

    /// Commands queued or in flight
    pub fn len(&self) -> usize {
        (self.head + self.capacity() - self.tail) % self.capacity()
    }

    /// Commands transmitted but not yet acknowledged
    pub fn in_flight(&self) -> usize {
        (self.send_tail + self.capacity() - self.tail) % self.capacity()
    }

    /// In-flight then queued commands, oldest first
    pub fn iter(&self) -> impl Iterator<Item = &str> + '_ {
        (0..self.len()).map(move |offset| self.slots[(self.tail + offset) % self.capacity()].as_str())
    }

    /// Usable slots left; queued and in-flight commands both occupy one
    pub fn free_slots(&self) -> usize {
        self.capacity() - 1 - self.len()
    }

    /// Drop every queued and in-flight command
    pub fn clear(&mut self) {
        while self.tail != self.head {
            self.slots[self.tail].clear();
            self.tail = self.next(self.tail);
        }
        self.send_tail = self.tail;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_empty_command() {
        let mut queue = CommandQueue::default();
        assert_eq!(queue.push(""), Err(QueueError::EmptyCommand));
        assert!(queue.is_empty());
    }

    #[test]
    fn test_capacity_minus_one_usable() {
        let mut queue = CommandQueue::new(4);
        assert_eq!(queue.free_slots(), 3);
        for i in 0..3 {
            queue.push(format!("G1 X{}", i)).unwrap();
        }
        assert_eq!(queue.free_slots(), 0);
        assert_eq!(queue.push("G1 X3"), Err(QueueError::Full { capacity: 4 }));
    }

    #[test]
    fn test_iter_lists_in_flight_before_queued() {
        let mut queue = CommandQueue::new(4);
        queue.push("G28").unwrap();
        queue.push("M105").unwrap();
        queue.pop_send();
        queue.pop_acknowledge();
        queue.push("G1 X10").unwrap();
        queue.push("G1 Y10").unwrap();
        queue.pop_send();

        let commands: Vec<&str> = queue.iter().collect();
        assert_eq!(commands, vec!["M105", "G1 X10", "G1 Y10"]);
    }

    #[test]
    fn test_minimum_capacity() {
        let mut queue = CommandQueue::new(0);
        assert_eq!(queue.capacity(), 2);
        queue.push("M105").unwrap();
        assert!(queue.push("M105").is_err());
    }

    #[test]
    fn test_clear_resets_cursors_at_tail() {
        let mut queue = CommandQueue::new(4);
        queue.push("G28").unwrap();
        queue.push("M105").unwrap();
        queue.pop_send();
        queue.clear();

        assert!(queue.is_empty());
        assert!(queue.is_ack_empty());
        assert_eq!(queue.peek_send(), None);
        assert_eq!(queue.pop_acknowledge(), None);
        assert_eq!(queue.free_slots(), 3);
    }
}
