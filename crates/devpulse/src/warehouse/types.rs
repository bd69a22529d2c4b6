/// A row the warehouse refused, by its position in the submitted batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowError {
    pub row_index: usize,
    pub message: String,
}

/// Outcome of one bulk load call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InsertResult {
    pub total_rows: usize,
    pub successful_rows: usize,
    pub errors: Vec<RowError>,
}

impl InsertResult {
    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    #[must_use]
    pub fn failed_rows(&self) -> usize {
        self.errors.len()
    }
}
