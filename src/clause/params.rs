use crate::types::RowValues;

/// Ordered values awaiting prepared binding.
///
/// Append-only until cleared. Compiling a clause in prepared mode pushes one value per emitted
/// placeholder; the session drains the store when it executes the next statement.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterStore {
    values: Vec<RowValues>,
}

impl ParameterStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a value and return its 1-based position.
    pub fn push(&mut self, value: RowValues) -> usize {
        self.values.push(value);
        self.values.len()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }

    #[must_use]
    pub fn as_slice(&self) -> &[RowValues] {
        &self.values
    }

    /// Read and clear in one step.
    pub fn take(&mut self) -> Vec<RowValues> {
        std::mem::take(&mut self.values)
    }
}
