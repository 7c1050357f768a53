//! Array addressing and array initializer expansion.
use crate::error::ValueError;
use crate::value::{Repeated, Value};

/// One declared dimension of an array type, such as `1..3`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Dimension {
    pub min: i128,
    pub max: i128,
}

impl Dimension {
    pub fn new(min: i128, max: i128) -> Self {
        Self { min, max }
    }

    /// The number of entries in the dimension.
    pub fn entries(&self) -> usize {
        if self.max < self.min {
            0
        } else {
            usize::try_from(self.max - self.min + 1).unwrap_or(usize::MAX)
        }
    }
}

/// The number of elements an array with the dimensions holds.
pub fn total_entries(dimensions: &[Dimension]) -> usize {
    dimensions
        .iter()
        .fold(1usize, |acc, d| acc.saturating_mul(d.entries()))
}

/// Computes the row-major position of the element at the indexes.
///
/// Each dimension contributes `(index - min)` times the product of the
/// entries of every dimension to its right.
pub fn flat_index(dimensions: &[Dimension], indexes: &[i128]) -> Result<usize, ValueError> {
    if dimensions.len() != indexes.len() {
        return Err(ValueError::IndexCount {
            expected: dimensions.len(),
            found: indexes.len(),
        });
    }

    let mut strides = vec![1usize; dimensions.len()];
    for position in (0..dimensions.len().saturating_sub(1)).rev() {
        strides[position] = strides[position + 1].saturating_mul(dimensions[position + 1].entries());
    }

    let mut flat = 0usize;
    for ((dimension, index), stride) in dimensions.iter().zip(indexes).zip(strides) {
        if *index < dimension.min || *index > dimension.max {
            return Err(ValueError::IndexOutOfRange {
                index: *index,
                min: dimension.min,
                max: dimension.max,
            });
        }
        // Bounds were checked so the offset is non-negative and within entries.
        let offset = (*index - dimension.min) as usize;
        flat += offset * stride;
    }
    Ok(flat)
}

/// Expands an array initializer into the initial values of the elements in
/// row-major order.
///
/// A flat initializer must supply exactly as many values as the array has
/// elements. A nested initializer (every item is itself an array
/// initializer) must supply exactly the number of entries of the outermost
/// dimension and each item must match the remaining dimensions.
pub fn expand_initializer(
    dimensions: &[Dimension],
    items: &[Repeated],
) -> Result<Vec<Value>, ValueError> {
    // Counts are checked before expanding so that a large repeat count
    // fails without allocating.
    let supplied = items
        .iter()
        .try_fold(0usize, |acc, item| acc.checked_add(item.count))
        .unwrap_or(usize::MAX);

    let nested = dimensions.len() > 1
        && supplied > 0
        && items
            .iter()
            .filter(|item| item.count > 0)
            .all(|item| matches!(item.value, Value::ArrayInit(_)));

    let expected = if nested {
        dimensions[0].entries()
    } else {
        total_entries(dimensions)
    };
    if supplied != expected {
        return Err(ValueError::InitializerCount {
            expected,
            found: supplied,
        });
    }

    let mut values = Vec::with_capacity(total_entries(dimensions));
    for item in items {
        for _ in 0..item.count {
            match &item.value {
                Value::ArrayInit(inner) if nested => {
                    values.extend(expand_initializer(&dimensions[1..], inner)?);
                }
                value => values.push(value.clone()),
            }
        }
    }
    Ok(values)
}
