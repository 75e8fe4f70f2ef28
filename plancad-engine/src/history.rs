//! 通用撤销/重做栈。
//!
//! 命令是纯数据，`execute`/`undo` 通过 `&self` 作用于目标状态，因此同一条命令可以被反复重做。

use std::collections::VecDeque;

/// 默认保留的历史条数。
pub const DEFAULT_HISTORY_CAPACITY: usize = 50;

/// 可逆命令。实现必须是全函数：不允许部分失败，也不依赖实时状态重新推导快照。
pub trait Command<T> {
    fn execute(&self, target: &mut T);
    fn undo(&self, target: &mut T);
    fn description(&self) -> String;
}

/// 有界 LIFO 历史：`past` 超出容量时静默丢弃最旧的命令，新命令执行时清空 `future`。
#[derive(Debug, Clone)]
pub struct CommandStack<C> {
    past: VecDeque<C>,
    future: Vec<C>,
    capacity: usize,
}

impl<C> Default for CommandStack<C> {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}

impl<C> CommandStack<C> {
    /// 容量至少为 1。
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            past: VecDeque::with_capacity(capacity),
            future: Vec::new(),
            capacity,
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// 调整容量，必要时从最旧端裁剪。
    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity.max(1);
        while self.past.len() > self.capacity {
            self.past.pop_front();
        }
    }

    /// 执行并记录命令。
    pub fn execute<T>(&mut self, command: C, target: &mut T)
    where
        C: Command<T>,
    {
        command.execute(target);
        self.record(command);
    }

    /// 记录一条已经生效的命令。
    pub fn record(&mut self, command: C) {
        self.push_past(command);
        self.future.clear();
    }

    fn push_past(&mut self, command: C) {
        while self.past.len() >= self.capacity {
            self.past.pop_front();
        }
        self.past.push_back(command);
    }

    pub fn undo<T>(&mut self, target: &mut T) -> bool
    where
        C: Command<T>,
    {
        let Some(command) = self.past.pop_back() else {
            return false;
        };
        command.undo(target);
        self.future.push(command);
        true
    }

    pub fn redo<T>(&mut self, target: &mut T) -> bool
    where
        C: Command<T>,
    {
        let Some(command) = self.future.pop() else {
            return false;
        };
        command.execute(target);
        self.push_past(command);
        true
    }

    #[inline]
    pub fn can_undo(&self) -> bool {
        !self.past.is_empty()
    }

    #[inline]
    pub fn can_redo(&self) -> bool {
        !self.future.is_empty()
    }

    #[inline]
    pub fn undo_len(&self) -> usize {
        self.past.len()
    }

    #[inline]
    pub fn redo_len(&self) -> usize {
        self.future.len()
    }

    /// 下一次撤销将要回退的命令。
    pub fn peek_undo(&self) -> Option<&C> {
        self.past.back()
    }

    pub fn peek_redo(&self) -> Option<&C> {
        self.future.last()
    }

    pub fn clear(&mut self) {
        self.past.clear();
        self.future.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 把数值加到计数器上的测试命令。
    struct Add(i64);

    impl Command<i64> for Add {
        fn execute(&self, target: &mut i64) {
            *target += self.0;
        }

        fn undo(&self, target: &mut i64) {
            *target -= self.0;
        }

        fn description(&self) -> String {
            format!("add {}", self.0)
        }
    }

    #[test]
    fn undo_and_redo_are_inverse() {
        let mut stack = CommandStack::default();
        let mut value = 0;
        for step in 1..=5 {
            stack.execute(Add(step), &mut value);
        }
        assert_eq!(value, 15);

        while stack.undo(&mut value) {}
        assert_eq!(value, 0);
        assert!(!stack.can_undo());

        while stack.redo(&mut value) {}
        assert_eq!(value, 15);
        assert!(!stack.can_redo());
    }

    #[test]
    fn history_is_bounded() {
        let mut stack = CommandStack::default();
        let mut value = 0;
        for _ in 0..60 {
            stack.execute(Add(1), &mut value);
        }
        assert_eq!(stack.undo_len(), DEFAULT_HISTORY_CAPACITY);

        while stack.undo(&mut value) {}
        // 最早的 10 条已被丢弃，无法撤销
        assert_eq!(value, 10);
    }

    #[test]
    fn new_command_clears_future() {
        let mut stack = CommandStack::new(10);
        let mut value = 0;
        stack.execute(Add(1), &mut value);
        stack.execute(Add(2), &mut value);
        assert!(stack.undo(&mut value));
        assert_eq!(stack.redo_len(), 1);

        stack.execute(Add(7), &mut value);
        assert!(!stack.can_redo());
        assert!(!stack.redo(&mut value));
        assert_eq!(value, 8);
        assert_eq!(stack.peek_undo().map(Command::<i64>::description), Some("add 7".to_string()));
    }

    #[test]
    fn empty_history_reports_false() {
        let mut stack: CommandStack<Add> = CommandStack::new(0);
        let mut value = 3;
        assert_eq!(stack.capacity(), 1);
        assert!(!stack.undo(&mut value));
        assert!(!stack.redo(&mut value));
        assert_eq!(value, 3);
    }

    #[test]
    fn shrinking_capacity_drops_oldest() {
        let mut stack = CommandStack::new(5);
        let mut value = 0;
        for step in 1..=5 {
            stack.execute(Add(step), &mut value);
        }
        stack.set_capacity(2);
        assert_eq!(stack.undo_len(), 2);
        assert!(stack.undo(&mut value));
        assert!(stack.undo(&mut value));
        assert_eq!(value, 6);
    }

    #[test]
    fn redo_after_shrinking_respects_capacity() {
        let mut stack = CommandStack::new(5);
        let mut value = 0;
        for step in 1..=4 {
            stack.execute(Add(step), &mut value);
        }
        for _ in 0..3 {
            assert!(stack.undo(&mut value));
        }
        stack.set_capacity(2);
        assert_eq!(stack.undo_len(), 1);
        assert_eq!(stack.redo_len(), 3);

        while stack.redo(&mut value) {
            assert!(stack.undo_len() <= 2);
        }
        assert_eq!(value, 10);
        assert_eq!(stack.undo_len(), 2);
        // 最旧的两条已被挤出，只能回退最近两步
        assert!(stack.undo(&mut value));
        assert!(stack.undo(&mut value));
        assert!(!stack.undo(&mut value));
        assert_eq!(value, 3);
    }
}
