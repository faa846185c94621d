use std::collections::VecDeque;

/// Fixed-length speech signal. All zeros means silence.
#[derive(Debug, Clone, PartialEq)]
pub struct Speech(Vec<f32>);

impl Speech {
    pub fn silent(len: usize) -> Self {
        Self(vec![0.0; len])
    }

    pub fn from_vec(values: Vec<f32>) -> Self {
        Self(values)
    }

    pub fn is_silent(&self) -> bool {
        self.0.iter().all(|&v| v == 0.0)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }
}

/// The last `capacity` speech vectors an agent heard, oldest first.
///
/// Starts filled with silence so observations always have the same shape.
#[derive(Debug, Clone)]
pub struct ListenHistory {
    entries: VecDeque<Speech>,
    capacity: usize,
    speech_len: usize,
}

impl ListenHistory {
    pub fn new(capacity: usize, speech_len: usize) -> Self {
        let mut history = Self {
            entries: VecDeque::with_capacity(capacity + 1),
            capacity,
            speech_len,
        };
        history.clear();
        history
    }

    pub fn push(&mut self, speech: Speech) {
        self.entries.push_back(speech);
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
    }

    /// Refill with silence.
    pub fn clear(&mut self) {
        self.entries.clear();
        for _ in 0..self.capacity {
            self.entries.push_back(Speech::silent(self.speech_len));
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Speech> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
