//! Size-bounded batching of queued commands
//!
//! The daemon charges a round trip per SCGI connection, so queued commands
//! are packed into as few documents as possible:
//!
//! - one remaining command is sent as a plain `methodCall`
//! - several remaining commands are packed into a `system.multicall`
//!   document, in queue order, while the complete document stays within
//!   the configured size bound
//!
//! The first fragment of each multicall batch is always taken, even when it
//! alone exceeds the bound, so a batch is never empty. Every command is
//! target-normalized exactly once, at the moment it is first rendered.
//!
//! # Examples
//!
//! ```rust
//! use rtrpc_client::{BatchBuilder, Command};
//!
//! let mut queue = vec![
//!     Command::with_args("d.name", ["H1"]),
//!     Command::with_args("d.name", ["H2"]),
//! ];
//! let batches: Vec<_> = BatchBuilder::new(&mut queue, 512 * 1024).collect();
//! assert_eq!(batches.len(), 1);
//! assert!(batches[0].multicall);
//! assert_eq!(batches[0].commands, 0..2);
//! ```

use crate::command::Command;
use rtrpc_core::codec::{self, MULTICALL_CLOSE, MULTICALL_OPEN};
use std::ops::Range;

/// One wire-ready document and the commands it carries
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    /// Serialized request document
    pub document: String,
    /// Queue positions of the commands in this batch
    pub commands: Range<usize>,
    /// Whether the document is a `system.multicall`
    pub multicall: bool,
}

impl Batch {
    /// Number of commands in this batch
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Always false; a batch carries at least one command
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

/// Walks a command queue and yields batches until it is drained
///
/// The builder lives for one request run. Its cursor only moves forward.
#[derive(Debug)]
pub struct BatchBuilder<'a> {
    queue: &'a mut [Command],
    cursor: usize,
    normalized: usize,
    max_content_size: usize,
}

impl<'a> BatchBuilder<'a> {
    /// Start batching `queue` under a document size bound in bytes
    pub fn new(queue: &'a mut [Command], max_content_size: usize) -> Self {
        Self {
            queue,
            cursor: 0,
            normalized: 0,
            max_content_size,
        }
    }

    /// Position of the next unsent command
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Whether every command has been batched
    pub fn is_drained(&self) -> bool {
        self.cursor >= self.queue.len()
    }

    fn normalize(&mut self, index: usize) -> &Command {
        if index >= self.normalized {
            self.queue[index].ensure_target_parameter();
            self.normalized = index + 1;
        }
        &self.queue[index]
    }

    fn single(&mut self) -> Batch {
        let index = self.cursor;
        let command = self.normalize(index);
        let document = codec::render_call(command.method(), command.params());
        self.cursor += 1;

        Batch {
            document,
            commands: index..index + 1,
            multicall: false,
        }
    }

    fn multicall(&mut self) -> Batch {
        let start = self.cursor;
        let mut document = String::from(MULTICALL_OPEN);

        while self.cursor < self.queue.len() {
            let index = self.cursor;
            let command = self.normalize(index);
            let fragment = codec::render_multicall_member(command.method(), command.params());

            let projected = document.len() + fragment.len() + MULTICALL_CLOSE.len();
            if index > start && projected > self.max_content_size {
                break;
            }
            document.push_str(&fragment);
            self.cursor += 1;
        }
        document.push_str(MULTICALL_CLOSE);

        Batch {
            document,
            commands: start..self.cursor,
            multicall: true,
        }
    }
}

impl Iterator for BatchBuilder<'_> {
    type Item = Batch;

    fn next(&mut self) -> Option<Batch> {
        match self.queue.len().saturating_sub(self.cursor) {
            0 => None,
            1 => Some(self.single()),
            _ => Some(self.multicall()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rtrpc_core::Param;

    fn names(count: usize) -> Vec<Command> {
        (0..count)
            .map(|i| Command::with_args("d.name", [format!("{:040X}", i)]))
            .collect()
    }

    #[test]
    fn test_empty_queue_yields_nothing() {
        let mut queue = Vec::new();
        let mut builder = BatchBuilder::new(&mut queue, 1024);
        assert!(builder.is_drained());
        assert!(builder.next().is_none());
    }

    #[test]
    fn test_single_command_is_plain_call() {
        let mut queue = vec![Command::with_args("d.start", ["ABC123"])];
        let batches: Vec<_> = BatchBuilder::new(&mut queue, 1024).collect();

        assert_eq!(batches.len(), 1);
        assert!(!batches[0].multicall);
        assert_eq!(batches[0].document, codec::render_call("d.start", &[Param::string("ABC123")]));
        assert_eq!(queue[0].params().len(), 1);
    }

    #[test]
    fn test_three_commands_in_one_multicall() {
        let mut queue = names(3);
        let batches: Vec<_> = BatchBuilder::new(&mut queue, 512 * 1024).collect();

        assert_eq!(batches.len(), 1);
        let doc = &batches[0].document;
        assert!(doc.starts_with(MULTICALL_OPEN));
        assert!(doc.ends_with(MULTICALL_CLOSE));
        assert_eq!(doc.matches("<name>methodName</name>").count(), 3);

        let first = doc.find(&format!("{:040X}", 0)).unwrap();
        let second = doc.find(&format!("{:040X}", 1)).unwrap();
        let third = doc.find(&format!("{:040X}", 2)).unwrap();
        assert!(first < second && second < third);
    }

    #[test]
    fn test_batches_respect_size_bound() {
        let mut queue = names(50);
        let bound = 1200;
        let batches: Vec<_> = BatchBuilder::new(&mut queue, bound).collect();

        assert!(batches.len() > 1);
        let mut expected_start = 0;
        for batch in &batches {
            assert_eq!(batch.commands.start, expected_start);
            expected_start = batch.commands.end;
            if batch.len() > 1 {
                assert!(batch.document.len() <= bound, "batch of {} is {} bytes", batch.len(), batch.document.len());
            }
        }
        assert_eq!(expected_start, 50);
    }

    #[test]
    fn test_oversized_first_fragment_is_still_sent() {
        let mut queue = names(3);
        let batches: Vec<_> = BatchBuilder::new(&mut queue, 10).collect();

        // two one-member multicalls, then the last command as a plain call
        assert_eq!(batches.len(), 3);
        assert!(batches[0].multicall);
        assert_eq!(batches[0].len(), 1);
        assert!(batches[1].multicall);
        assert!(!batches[2].multicall);
    }

    #[test]
    fn test_each_command_normalized_once() {
        let mut queue = vec![Command::new("d.name"), Command::new("d.name"), Command::new("t.url")];
        let _: Vec<_> = BatchBuilder::new(&mut queue, 10).collect();

        for command in &queue {
            assert_eq!(command.params().len(), 1);
            assert!(command.params()[0].is_empty_value());
        }
    }

    #[test]
    fn test_cursor_advances() {
        let mut queue = names(2);
        let mut builder = BatchBuilder::new(&mut queue, 512 * 1024);
        assert_eq!(builder.cursor(), 0);
        let batch = builder.next().unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(builder.cursor(), 2);
        assert!(builder.next().is_none());
    }
}
