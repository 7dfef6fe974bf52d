//! Records for logging training metrics.
use std::collections::HashMap;

/// Value stored in a [`Record`].
#[derive(Debug, Clone)]
pub enum RecordValue {
    /// A single floating-point value, typically a loss or a reward.
    Scalar(f32),

    /// A text value.
    String(String),
}

/// A container of key-value pairs emitted once per outer iteration.
///
/// Trainers fill one record per epoch with their losses and batch reward;
/// reporting it is best-effort and never blocks the training loop.
#[derive(Debug, Default)]
pub struct Record(HashMap<String, RecordValue>);

impl Record {
    /// Creates an empty record.
    pub fn empty() -> Self {
        Self(HashMap::new())
    }

    /// Creates a record from a slice of key-value pairs.
    pub fn from_slice<K: Into<String> + Clone>(s: &[(K, RecordValue)]) -> Self {
        Self(
            s.iter()
                .map(|(k, v)| (k.clone().into(), v.clone()))
                .collect(),
        )
    }

    /// Inserts a key-value pair.
    pub fn insert(&mut self, k: impl Into<String>, v: RecordValue) {
        self.0.insert(k.into(), v);
    }

    /// Merges two records, the entries of `other` winning on collision.
    pub fn merge(mut self, other: Record) -> Self {
        self.0.extend(other.0);
        self
    }

    /// Returns the scalar stored under `k`, if any.
    pub fn get_scalar(&self, k: &str) -> Option<f32> {
        match self.0.get(k) {
            Some(RecordValue::Scalar(v)) => Some(*v),
            _ => None,
        }
    }

    /// Returns `true` if the record holds no entries.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over the entries.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &RecordValue)> {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_and_get() {
        let mut record = Record::empty();
        record.insert("loss", RecordValue::Scalar(0.5));
        assert_eq!(record.get_scalar("loss"), Some(0.5));
        assert_eq!(record.get_scalar("missing"), None);
    }

    #[test]
    fn merge_prefers_other() {
        let a = Record::from_slice(&[("x", RecordValue::Scalar(1.0))]);
        let b = Record::from_slice(&[("x", RecordValue::Scalar(2.0))]);
        assert_eq!(a.merge(b).get_scalar("x"), Some(2.0));
    }
}
