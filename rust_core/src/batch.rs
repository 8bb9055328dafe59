use ndarray::{s, Array2};

/// Which partition of the data a mini-batch is drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Train,
    Validate,
}

/// Partitions a `reset_generator` call re-arms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Train,
    Validate,
    All,
}

impl Scope {
    fn covers(self, mode: Mode) -> bool {
        matches!(
            (self, mode),
            (Scope::All, _) | (Scope::Train, Mode::Train) | (Scope::Validate, Mode::Validate)
        )
    }
}

/// A resettable, mode-scoped source of mini-batches.
///
/// `get` yields mini-batches until the partition is exhausted, then returns
/// `None` exactly once and re-arms that partition so the next pass starts
/// from the beginning.
pub trait Batch {
    fn get(&mut self, mode: Mode) -> Option<Array2<f32>>;

    fn reset_generator(&mut self, scope: Scope);

    fn num_validation_samples(&self) -> usize;
}

/// In-memory `Batch`: the leading rows of a matrix form the training
/// partition, the remaining rows the validation partition.
#[derive(Debug, Clone)]
pub struct InMemoryBatch {
    train: Array2<f32>,
    validate: Array2<f32>,
    batch_size: usize,
    train_pos: usize,
    validate_pos: usize,
}

impl InMemoryBatch {
    /// Split `data` so that `train_fraction` of the rows (rounded down) go
    /// to training. `batch_size` is clamped to at least one row.
    pub fn new(data: Array2<f32>, batch_size: usize, train_fraction: f64) -> Self {
        let n = data.nrows();
        let n_train = ((n as f64) * train_fraction.clamp(0.0, 1.0)).floor() as usize;
        let train = data.slice(s![..n_train, ..]).to_owned();
        let validate = data.slice(s![n_train.., ..]).to_owned();
        Self::from_partitions(train, validate, batch_size)
    }

    pub fn from_partitions(train: Array2<f32>, validate: Array2<f32>, batch_size: usize) -> Self {
        Self {
            train,
            validate,
            batch_size: batch_size.max(1),
            train_pos: 0,
            validate_pos: 0,
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn num_train_samples(&self) -> usize {
        self.train.nrows()
    }
}

impl Batch for InMemoryBatch {
    fn get(&mut self, mode: Mode) -> Option<Array2<f32>> {
        let (data, pos) = match mode {
            Mode::Train => (&self.train, &mut self.train_pos),
            Mode::Validate => (&self.validate, &mut self.validate_pos),
        };
        if *pos >= data.nrows() {
            *pos = 0;
            return None;
        }
        let end = (*pos + self.batch_size).min(data.nrows());
        let chunk = data.slice(s![*pos..end, ..]).to_owned();
        *pos = end;
        Some(chunk)
    }

    fn reset_generator(&mut self, scope: Scope) {
        if scope.covers(Mode::Train) {
            self.train_pos = 0;
        }
        if scope.covers(Mode::Validate) {
            self.validate_pos = 0;
        }
    }

    fn num_validation_samples(&self) -> usize {
        self.validate.nrows()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array;

    fn rows(n: usize) -> Array2<f32> {
        Array::from_shape_fn((n, 3), |(i, j)| (i * 3 + j) as f32)
    }

    #[test]
    fn test_split_and_exhaustion() {
        let mut batch = InMemoryBatch::new(rows(10), 3, 0.7);
        assert_eq!(batch.num_train_samples(), 7);
        assert_eq!(batch.num_validation_samples(), 3);

        let sizes: Vec<usize> = std::iter::from_fn(|| batch.get(Mode::Train))
            .map(|b| b.nrows())
            .collect();
        assert_eq!(sizes, vec![3, 3, 1]);

        // Re-armed after signalling exhaustion.
        let first = batch.get(Mode::Train).unwrap();
        assert_eq!(first[[0, 0]], 0.0);
    }

    #[test]
    fn test_reset_scope() {
        let mut batch = InMemoryBatch::new(rows(8), 2, 0.5);
        batch.get(Mode::Train);
        batch.get(Mode::Validate);

        batch.reset_generator(Scope::Validate);
        assert_eq!(batch.get(Mode::Validate).unwrap()[[0, 0]], 12.0);
        assert_eq!(batch.get(Mode::Train).unwrap()[[0, 0]], 6.0);

        batch.reset_generator(Scope::All);
        assert_eq!(batch.get(Mode::Train).unwrap()[[0, 0]], 0.0);
        assert_eq!(batch.get(Mode::Validate).unwrap()[[0, 0]], 12.0);
    }

    #[test]
    fn test_empty_partition() {
        let mut batch = InMemoryBatch::new(rows(4), 2, 1.0);
        assert_eq!(batch.num_validation_samples(), 0);
        assert!(batch.get(Mode::Validate).is_none());
    }
}
