//! Outbound command queue for sends issued while the transport is not open.

use std::collections::VecDeque;

use crate::domain::Command;

/// FIFO of commands awaiting an open transport.
#[derive(Debug, Default)]
pub struct OutboundQueue {
    commands: VecDeque<Command>,
}

impl OutboundQueue {
    /// Creates an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a command at the tail.
    pub fn push(&mut self, command: Command) {
        self.commands.push_back(command);
    }

    /// Removes and returns the oldest command.
    pub fn pop(&mut self) -> Option<Command> {
        self.commands.pop_front()
    }

    /// Puts a command back at the head after a failed hand-off.
    pub fn requeue(&mut self, command: Command) {
        self.commands.push_front(command);
    }

    /// Number of queued commands.
    #[must_use]
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Returns `true` if nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}
