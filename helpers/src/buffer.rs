use std::collections::vec_deque::Iter;
use std::collections::VecDeque;

/// RingBuffer is a capacity-bounded FIFO buffer. Pushing into a full buffer evicts the oldest
/// element.
#[derive(Debug, Clone)]
pub struct RingBuffer<T> {
    capacity: usize,
    data: VecDeque<T>,
}

impl<T> RingBuffer<T> {
    pub fn new(capacity: usize) -> RingBuffer<T> {
        RingBuffer {
            capacity,
            data: VecDeque::with_capacity(capacity + 1),
        }
    }

    /// push appends an element and returns the evicted oldest element if the capacity was
    /// exceeded.
    pub fn push(&mut self, el: T) -> Option<T> {
        self.data.push_back(el);

        if self.data.len() > self.capacity {
            self.data.pop_front()
        } else {
            None
        }
    }

    pub fn front(&self) -> Option<&T> {
        self.data.front()
    }

    pub fn back(&self) -> Option<&T> {
        self.data.back()
    }

    pub fn iter(&self) -> Iter<'_, T> {
        self.data.iter()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl<T: Copy + Into<f64>> RingBuffer<T> {
    /// get_avg returns the mean of the buffered values (None if the buffer is empty).
    pub fn get_avg(&self) -> Option<f64> {
        if self.data.is_empty() {
            return None;
        }

        let sum: f64 = self.data.iter().map(|&x| x.into()).sum();
        Some(sum / self.data.len() as f64)
    }
}
