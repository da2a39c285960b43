//! Bounded window of recently detected samples, used as retraining data.

use async_trait::async_trait;
use parking_lot::Mutex;

use sentinel_types::MetricSample;

// ── Ring Buffer ─────────────────────────────────────────────────────────

/// A bounded circular buffer. When full, the oldest item is overwritten.
#[derive(Clone, Debug)]
pub struct RingBuffer<T> {
    slots: Vec<Option<T>>,
    head: usize,
    len: usize,
}

impl<T: Clone> RingBuffer<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: vec![None; capacity.max(1)],
            head: 0,
            len: 0,
        }
    }

    pub fn push(&mut self, item: T) {
        self.slots[self.head] = Some(item);
        self.head = (self.head + 1) % self.slots.len();
        if self.len < self.slots.len() {
            self.len += 1;
        }
    }

    /// Items oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        let start = if self.len < self.slots.len() { 0 } else { self.head };
        let cap = self.slots.len();
        (0..self.len).filter_map(move |offset| self.slots[(start + offset) % cap].as_ref())
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }
}

// ── Training data source ────────────────────────────────────────────────

/// Where a periodic retrain pulls its data from.
#[async_trait]
pub trait TrainingDataSource: Send + Sync {
    async fn recent_samples(&self) -> Vec<MetricSample>;
}

/// The last `window_size` samples the engine was asked to analyze.
#[derive(Debug)]
pub struct RecentWindow {
    buffer: Mutex<RingBuffer<MetricSample>>,
}

impl RecentWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: Mutex::new(RingBuffer::new(capacity)),
        }
    }

    pub fn record(&self, batch: &[MetricSample]) {
        let mut buffer = self.buffer.lock();
        for sample in batch {
            buffer.push(sample.clone());
        }
    }

    /// Copy of the window contents, oldest first.
    pub fn snapshot(&self) -> Vec<MetricSample> {
        self.buffer.lock().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.buffer.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.lock().is_empty()
    }
}

#[async_trait]
impl TrainingDataSource for RecentWindow {
    async fn recent_samples(&self) -> Vec<MetricSample> {
        self.snapshot()
    }
}
