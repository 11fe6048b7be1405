//! Per-epoch training log.

use serde::{Deserialize, Serialize};

use crate::error::{TrainingError, TrainingResult};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EpochRecord {
    pub epoch: usize,
    pub learning_rate: f64,
    pub train_loss: f32,
    pub train_accuracy: f32,
    pub val_loss: f32,
    pub val_accuracy: f32,
}

/// Append-only list of epoch records, bounded by the epoch budget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingHistory {
    capacity: usize,
    records: Vec<EpochRecord>,
}

impl TrainingHistory {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            records: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, record: EpochRecord) -> TrainingResult<()> {
        if self.records.len() >= self.capacity {
            return Err(TrainingError::HistoryFull {
                capacity: self.capacity,
            });
        }
        self.records.push(record);
        Ok(())
    }

    pub fn records(&self) -> &[EpochRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn train_loss(&self) -> Vec<f32> {
        self.records.iter().map(|r| r.train_loss).collect()
    }

    pub fn val_loss(&self) -> Vec<f32> {
        self.records.iter().map(|r| r.val_loss).collect()
    }

    pub fn train_accuracy(&self) -> Vec<f32> {
        self.records.iter().map(|r| r.train_accuracy).collect()
    }

    pub fn val_accuracy(&self) -> Vec<f32> {
        self.records.iter().map(|r| r.val_accuracy).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(epoch: usize) -> EpochRecord {
        EpochRecord {
            epoch,
            learning_rate: 0.1,
            train_loss: 1.0 / (epoch + 1) as f32,
            train_accuracy: 0.5,
            val_loss: 2.0,
            val_accuracy: 0.25,
        }
    }

    #[test]
    fn push_past_capacity_fails() {
        let mut history = TrainingHistory::with_capacity(2);
        history.push(record(0)).unwrap();
        history.push(record(1)).unwrap();
        assert!(matches!(
            history.push(record(2)),
            Err(TrainingError::HistoryFull { capacity: 2 })
        ));
        assert_eq!(history.len(), 2);
        assert_eq!(history.train_loss(), vec![1.0, 0.5]);
    }

    #[test]
    fn json_round_trip_keeps_records() {
        let mut history = TrainingHistory::with_capacity(3);
        history.push(record(0)).unwrap();
        let json = serde_json::to_string(&history).unwrap();
        let back: TrainingHistory = serde_json::from_str(&json).unwrap();
        assert_eq!(back, history);
    }
}
