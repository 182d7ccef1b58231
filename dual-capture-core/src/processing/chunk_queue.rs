use std::collections::VecDeque;

/// Bounded FIFO of captured byte chunks.
///
/// Wrap in `parking_lot::Mutex` for cross-thread access.
///
/// Overflow behavior: drops the oldest chunk, so a stalled consumer loses
/// stale audio rather than blocking the capture thread.
#[derive(Debug)]
pub struct ChunkQueue {
    chunks: VecDeque<Vec<u8>>,
    capacity: usize,
    dropped: u64,
}

impl ChunkQueue {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            chunks: VecDeque::with_capacity(capacity),
            capacity,
            dropped: 0,
        }
    }

    /// Append a chunk. Returns `false` if the oldest chunk had to be dropped
    /// to make room.
    pub fn push(&mut self, chunk: Vec<u8>) -> bool {
        let mut kept_all = true;
        if self.chunks.len() == self.capacity {
            self.chunks.pop_front();
            self.dropped += 1;
            kept_all = false;
        }
        self.chunks.push_back(chunk);
        kept_all
    }

    /// Remove and return every queued chunk, oldest first.
    pub fn drain(&mut self) -> Vec<Vec<u8>> {
        self.chunks.drain(..).collect()
    }

    /// Number of chunks currently queued.
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Total bytes currently queued.
    pub fn queued_bytes(&self) -> usize {
        self.chunks.iter().map(Vec::len).sum()
    }

    /// Chunks dropped on overflow since creation.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_then_drain_in_order() {
        let mut queue = ChunkQueue::new(4);
        assert!(queue.push(vec![1]));
        assert!(queue.push(vec![2, 2]));

        assert_eq!(queue.len(), 2);
        assert_eq!(queue.queued_bytes(), 3);
        assert_eq!(queue.drain(), vec![vec![1], vec![2, 2]]);
        assert!(queue.is_empty());
    }

    #[test]
    fn overflow_drops_oldest() {
        let mut queue = ChunkQueue::new(2);
        queue.push(vec![1]);
        queue.push(vec![2]);
        assert!(!queue.push(vec![3]));

        assert_eq!(queue.dropped(), 1);
        assert_eq!(queue.drain(), vec![vec![2], vec![3]]);
    }

    #[test]
    fn zero_capacity_is_clamped() {
        let mut queue = ChunkQueue::new(0);
        assert_eq!(queue.capacity(), 1);
        queue.push(vec![1]);
        queue.push(vec![2]);
        assert_eq!(queue.drain(), vec![vec![2]]);
    }

    #[test]
    fn drain_empty() {
        let mut queue = ChunkQueue::new(3);
        assert!(queue.drain().is_empty());
        assert_eq!(queue.dropped(), 0);
    }
}
