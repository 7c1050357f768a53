//! The execution cursor: which instance runs now, who called it, and the
//! loops that an `EXIT` leaves.
use stplc_dsl::core::SourceSpan;

use crate::machine::InstanceId;
use crate::node::NodeId;

/// A control transfer requested by `EXIT` or `RETURN` that the enclosing
/// nodes act on as they finish.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Pending {
    #[default]
    None,
    Exit,
    Return,
}

/// The continuation of an invocation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CallFrame {
    pub return_to: InstanceId,
}

/// A loop that is executing and that `EXIT` would leave.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExitContext {
    pub instance: InstanceId,
    pub node: NodeId,
}

#[derive(Clone, Debug, Default)]
pub struct Cursor {
    current: Option<InstanceId>,
    frames: Vec<CallFrame>,
    exits: Vec<ExitContext>,
    pending: Pending,
    pause: Option<SourceSpan>,
}

impl Cursor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts at the instance with nothing in progress.
    pub fn prime(&mut self, instance: InstanceId) {
        self.clear();
        self.current = Some(instance);
    }

    pub fn clear(&mut self) {
        self.current = None;
        self.frames.clear();
        self.exits.clear();
        self.pending = Pending::None;
        self.pause = None;
    }

    pub fn current(&self) -> Option<InstanceId> {
        self.current
    }

    /// Transfers control to the invoked instance. The current instance
    /// continues when the invoked instance finishes.
    ///
    /// Sub-expressions never switch: their parent steps them directly and
    /// regains control when they finish.
    pub fn switch_current(&mut self, next: InstanceId) {
        if let Some(current) = self.current {
            self.frames.push(CallFrame { return_to: current });
        }
        self.current = Some(next);
    }

    /// Returns control to the most recent caller. Returns `None` when
    /// there is no caller.
    pub fn return_to_caller(&mut self) -> Option<InstanceId> {
        let frame = self.frames.pop()?;
        self.current = Some(frame.return_to);
        Some(frame.return_to)
    }

    /// The number of invocations in progress.
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Returns true if the instance is running or waiting for a callee.
    pub fn is_active(&self, instance: InstanceId) -> bool {
        self.current == Some(instance) || self.frames.iter().any(|f| f.return_to == instance)
    }

    pub fn push_exit_context(&mut self, instance: InstanceId, node: NodeId) {
        self.exits.push(ExitContext { instance, node });
    }

    /// Removes the innermost exit context if it is the loop. Returns true
    /// if it was removed.
    pub fn pop_exit_context(&mut self, instance: InstanceId, node: NodeId) -> bool {
        let innermost = ExitContext { instance, node };
        if self.exits.last() == Some(&innermost) {
            self.exits.pop();
            return true;
        }
        false
    }

    pub fn innermost_exit(&self) -> Option<&ExitContext> {
        self.exits.last()
    }

    pub fn pending(&self) -> Pending {
        self.pending
    }

    pub fn set_pending(&mut self, pending: Pending) {
        self.pending = pending;
    }

    pub fn clear_pending(&mut self) {
        self.pending = Pending::None;
    }

    /// Records that execution reached the start of a statement.
    pub fn pause_at(&mut self, span: SourceSpan) {
        self.pause = Some(span);
    }

    pub fn take_pause(&mut self) -> Option<SourceSpan> {
        self.pause.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn switch_current_when_invoked_then_returns_to_caller() {
        let mut cursor = Cursor::new();
        cursor.prime(InstanceId(0));
        cursor.switch_current(InstanceId(3));
        assert_eq!(cursor.depth(), 1);
        assert!(cursor.is_active(InstanceId(0)));
        assert!(cursor.is_active(InstanceId(3)));

        assert_eq!(cursor.return_to_caller(), Some(InstanceId(0)));
        assert_eq!(cursor.current(), Some(InstanceId(0)));
        assert_eq!(cursor.return_to_caller(), None);
    }

    #[test]
    fn pop_exit_context_when_not_innermost_then_kept() {
        let mut cursor = Cursor::new();
        cursor.push_exit_context(InstanceId(0), NodeId(1));
        cursor.push_exit_context(InstanceId(0), NodeId(5));
        assert!(!cursor.pop_exit_context(InstanceId(0), NodeId(1)));
        assert!(cursor.pop_exit_context(InstanceId(0), NodeId(5)));
        assert_eq!(
            cursor.innermost_exit(),
            Some(&ExitContext {
                instance: InstanceId(0),
                node: NodeId(1)
            })
        );
    }

    #[test]
    fn prime_when_state_left_over_then_cleared() {
        let mut cursor = Cursor::new();
        cursor.prime(InstanceId(0));
        cursor.switch_current(InstanceId(1));
        cursor.set_pending(Pending::Return);
        cursor.pause_at(SourceSpan::range(1, 2));

        cursor.prime(InstanceId(0));
        assert_eq!(cursor.depth(), 0);
        assert_eq!(cursor.pending(), Pending::None);
        assert!(cursor.take_pause().is_none());
    }
}
