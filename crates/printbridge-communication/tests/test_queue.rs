//! Tests for the two-cursor command queue

use printbridge_communication::CommandQueue;
use printbridge_core::QueueError;
use proptest::prelude::*;
use std::collections::VecDeque;

#[test]
fn test_round_trip_order() {
    let mut queue = CommandQueue::new(10);
    for command in ["G28", "G1 X10", "M105"] {
        queue.push(command).unwrap();
    }

    let sent: Vec<String> = (0..3).filter_map(|_| queue.pop_send()).collect();
    assert_eq!(sent, vec!["G28", "G1 X10", "M105"]);
    assert!(!queue.is_ack_empty());
    assert_eq!(queue.in_flight(), 3);

    let acked: Vec<String> = (0..3).filter_map(|_| queue.pop_acknowledge()).collect();
    assert_eq!(acked, vec!["G28", "G1 X10", "M105"]);

    assert!(queue.is_empty());
    assert!(queue.is_ack_empty());
    assert_eq!(queue.free_slots(), queue.capacity() - 1);
}

#[test]
fn test_full_until_acknowledged() {
    let mut queue = CommandQueue::new(10);
    for i in 0..9 {
        queue.push(format!("G1 X{}", i)).unwrap();
    }
    assert_eq!(queue.push("G1 X9"), Err(QueueError::Full { capacity: 10 }));

    // Sending does not free a slot
    queue.pop_send();
    assert!(queue.push("G1 X9").is_err());

    assert_eq!(queue.pop_acknowledge().as_deref(), Some("G1 X0"));
    assert!(queue.push("G1 X9").is_ok());
}

#[test]
fn test_acknowledge_requires_send() {
    let mut queue = CommandQueue::new(10);
    queue.push("M105").unwrap();
    assert_eq!(queue.pop_acknowledge(), None);
    assert_eq!(queue.peek_send(), Some("M105"));
    assert_eq!(queue.pop_send().as_deref(), Some("M105"));
    assert_eq!(queue.peek_send(), None);
    assert_eq!(queue.pop_send(), None);
    assert_eq!(queue.pop_acknowledge().as_deref(), Some("M105"));
}

#[test]
fn test_wraps_around_ring() {
    let mut queue = CommandQueue::new(3);
    for round in 0..10 {
        let command = format!("G4 P{}", round);
        queue.push(command.as_str()).unwrap();
        assert_eq!(queue.pop_send(), Some(command.clone()));
        assert_eq!(queue.pop_acknowledge(), Some(command));
    }
    assert!(queue.is_empty());
}

#[derive(Debug, Clone)]
enum Op {
    Push(String),
    PopSend,
    PopAcknowledge,
    Clear,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => "[GM][0-9]{1,3}( [XYZ][0-9]{1,2})?".prop_map(Op::Push),
        1 => Just(Op::Push(String::new())),
        3 => Just(Op::PopSend),
        3 => Just(Op::PopAcknowledge),
        1 => Just(Op::Clear),
    ]
}

/// Counts-based reference: queued-unsent and sent-unacked commands
#[derive(Default)]
struct Model {
    queued: VecDeque<String>,
    in_flight: VecDeque<String>,
}

proptest! {
    #[test]
    fn prop_queue_matches_model(capacity in 2usize..12, ops in prop::collection::vec(op_strategy(), 0..200)) {
        let mut queue = CommandQueue::new(capacity);
        let mut model = Model::default();

        for op in ops {
            match op {
                Op::Push(command) => {
                    let stored = model.queued.len() + model.in_flight.len();
                    let expected = if command.is_empty() {
                        Err(QueueError::EmptyCommand)
                    } else if stored == capacity - 1 {
                        Err(QueueError::Full { capacity })
                    } else {
                        model.queued.push_back(command.clone());
                        Ok(())
                    };
                    prop_assert_eq!(queue.push(command), expected);
                }
                Op::PopSend => {
                    let expected = model.queued.pop_front();
                    if let Some(command) = &expected {
                        model.in_flight.push_back(command.clone());
                    }
                    prop_assert_eq!(queue.pop_send(), expected);
                }
                Op::PopAcknowledge => {
                    prop_assert_eq!(queue.pop_acknowledge(), model.in_flight.pop_front());
                }
                Op::Clear => {
                    model.queued.clear();
                    model.in_flight.clear();
                    queue.clear();
                }
            }

            let stored = model.queued.len() + model.in_flight.len();
            prop_assert_eq!(queue.is_empty(), stored == 0);
            prop_assert_eq!(queue.is_ack_empty(), model.in_flight.is_empty());
            prop_assert_eq!(queue.len(), stored);
            prop_assert_eq!(queue.in_flight(), model.in_flight.len());
            prop_assert_eq!(queue.free_slots(), capacity - 1 - stored);
            prop_assert_eq!(queue.peek_send(), model.queued.front().map(String::as_str));
        }
    }
}
