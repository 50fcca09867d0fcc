/// LIFO operand stack with depth-indexed reads
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Stack {
    values: Vec<i64>,
}

impl Stack {
    pub fn new() -> Stack {
        Stack { values: vec![] }
    }

    pub fn push(&mut self, val: i64) {
        self.values.push(val);
    }

    pub fn pop(&mut self) -> Option<i64> {
        self.values.pop()
    }

    /// Reads the element `depth` places below the top, 0 being the top itself
    pub fn get(&self, depth: usize) -> Option<i64> {
        if depth >= self.values.len() {
            return None;
        }
        self.values.get(self.values.len() - 1 - depth).copied()
    }

    pub fn peek(&self) -> Option<i64> {
        self.get(0)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }

    /// Bottom to top
    pub fn as_slice(&self) -> &[i64] {
        &self.values
    }
}

#[cfg(test)]
mod tests {
    use super::Stack;

    #[test]
    fn push_pop() {
        let mut stack = Stack::new();
        assert_eq!(stack.pop(), None);
        stack.push(1);
        stack.push(2);
        assert_eq!(stack.len(), 2);
        assert_eq!(stack.pop(), Some(2));
        assert_eq!(stack.pop(), Some(1));
        assert!(stack.is_empty());
    }

    #[test]
    fn get_by_depth() {
        let mut stack = Stack::new();
        for val in [10, 20, 30] {
            stack.push(val);
        }
        assert_eq!(stack.get(0), Some(30));
        assert_eq!(stack.get(2), Some(10));
        assert_eq!(stack.get(3), None);
        assert_eq!(stack.get(usize::MAX), None);
        assert_eq!(stack.peek(), Some(30));
        assert_eq!(stack.as_slice(), &[10, 20, 30]);
    }
}
