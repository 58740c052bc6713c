use arrow::array::{ArrayRef, StringArray};
use std::sync::Arc;

/// Nullable Utf8 column built from a field accessor.
pub(crate) fn utf8<T>(rows: &[T], field: impl Fn(&T) -> Option<&str>) -> ArrayRef {
    Arc::new(rows.iter().map(field).collect::<StringArray>())
}
