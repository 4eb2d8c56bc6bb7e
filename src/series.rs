use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
};

use chrono::Local;

/// One latency sample: a wall-clock label and the measured seconds.
#[derive(Debug, Clone, PartialEq)]
pub struct MeasurementPoint {
    pub label: String,
    pub seconds: f64,
}

impl MeasurementPoint {
    /// Sample taken now, labelled with the local 24-hour clock.
    pub fn now(seconds: f64) -> Self {
        Self {
            label: Local::now().format("%H:%M:%S").to_string(),
            seconds,
        }
    }
}

/// Fixed-capacity chart backing buffer. Append-only; once full, the oldest
/// point drops off the front so the buffer always holds the most recent
/// `capacity` samples in insertion order.
pub struct BoundedSeries {
    points: VecDeque<MeasurementPoint>,
    capacity: usize,
}

impl BoundedSeries {
    pub fn new(capacity: usize) -> Self {
        Self {
            points: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn append(&mut self, point: MeasurementPoint) {
        self.points.push_back(point);
        while self.points.len() > self.capacity {
            self.points.pop_front();
        }
    }

    pub fn reset(&mut self) {
        self.points.clear();
    }

    pub fn snapshot(&self) -> Vec<MeasurementPoint> {
        self.points.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Cloneable handle to a shared series. The scheduler's tick callback is the
/// only writer; the controller resets it on target change; the UI reads
/// snapshots. The lock makes each snapshot torn-read-free.
#[derive(Clone)]
pub struct SeriesHandle {
    inner: Arc<Mutex<BoundedSeries>>,
}

impl SeriesHandle {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(BoundedSeries::new(capacity))),
        }
    }

    pub fn append(&self, point: MeasurementPoint) {
        self.inner.lock().unwrap().append(point);
    }

    pub fn reset(&self) {
        self.inner.lock().unwrap().reset();
    }

    pub fn snapshot(&self) -> Vec<MeasurementPoint> {
        self.inner.lock().unwrap().snapshot()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().unwrap().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.inner.lock().unwrap().capacity()
    }
}
