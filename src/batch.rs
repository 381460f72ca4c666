/**
Validation shared by every batched entry point. Batches are checked once, before any computation:
the CRF recurrences and the decoders can then index emissions and tags without further checks.
*/
use ndarray::{Array2, ArrayView2, ArrayView3};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BatchError {
    #[error("Shape mismatch for {what}: expected {expected:?}, found {found:?}")]
    ShapeMismatch {
        what: &'static str,
        expected: Vec<usize>,
        found: Vec<usize>,
    },
    #[error("The mask of item {item} is not a contiguous prefix of `true` values")]
    NonContiguousMask { item: usize },
    #[error("Item {item} has no unmasked position")]
    EmptySequence { item: usize },
    #[error("Invalid gold tag {tag} for item {item} at position {position}")]
    InvalidTag {
        item: usize,
        position: usize,
        tag: usize,
    },
}

/// Returns the true length of each row of the mask. Every row must be a non-empty prefix of `true`
/// values followed by `false` values only.
pub fn sequence_lengths(mask: ArrayView2<bool>) -> Result<Vec<usize>, BatchError> {
    mask.outer_iter()
        .enumerate()
        .map(|(item, row)| {
            let len = row.iter().take_while(|m| **m).count();
            if row.iter().skip(len).any(|m| *m) {
                return Err(BatchError::NonContiguousMask { item });
            }
            if len == 0 {
                return Err(BatchError::EmptySequence { item });
            }
            Ok(len)
        })
        .collect()
}

/// Checks that `emissions` is `(batch, max_len, num_tags)` and that `mask` is `(batch, max_len)`.
/// Returns the true length of each item.
pub(crate) fn check_emissions(
    emissions: ArrayView3<f32>,
    mask: ArrayView2<bool>,
    num_tags: usize,
) -> Result<Vec<usize>, BatchError> {
    let (batch_size, max_len, width) = emissions.dim();
    if width != num_tags {
        return Err(BatchError::ShapeMismatch {
            what: "emissions",
            expected: vec![batch_size, max_len, num_tags],
            found: vec![batch_size, max_len, width],
        });
    }
    if mask.dim() != (batch_size, max_len) {
        return Err(BatchError::ShapeMismatch {
            what: "mask",
            expected: vec![batch_size, max_len],
            found: mask.shape().to_vec(),
        });
    }
    sequence_lengths(mask)
}

/// Checks the emissions of a single, unpadded sequence.
pub(crate) fn check_sequence(emissions: ArrayView2<f32>, num_tags: usize) -> Result<(), BatchError> {
    let (len, width) = emissions.dim();
    if width != num_tags {
        return Err(BatchError::ShapeMismatch {
            what: "emissions",
            expected: vec![len, num_tags],
            found: vec![len, width],
        });
    }
    if len == 0 {
        return Err(BatchError::EmptySequence { item: 0 });
    }
    Ok(())
}

/// Checks the gold tags of the unmasked positions: they must be valid tags and never the padding
/// tag.
pub(crate) fn check_tags<'a, I>(
    item: usize,
    tags: I,
    num_tags: usize,
    pad_idx: Option<usize>,
) -> Result<(), BatchError>
where
    I: IntoIterator<Item = &'a usize>,
{
    for (position, &tag) in tags.into_iter().enumerate() {
        if tag >= num_tags || Some(tag) == pad_idx {
            return Err(BatchError::InvalidTag {
                item,
                position,
                tag,
            });
        }
    }
    Ok(())
}

/// Checks that the gold tags have the shape of the mask and that every tag inside the true length
/// of its item is valid.
pub(crate) fn check_gold(
    gold: ArrayView2<usize>,
    lengths: &[usize],
    max_len: usize,
    num_tags: usize,
    pad_idx: Option<usize>,
) -> Result<(), BatchError> {
    if gold.dim() != (lengths.len(), max_len) {
        return Err(BatchError::ShapeMismatch {
            what: "gold tags",
            expected: vec![lengths.len(), max_len],
            found: gold.shape().to_vec(),
        });
    }
    for (item, (row, &len)) in gold.outer_iter().zip(lengths).enumerate() {
        check_tags(item, row.iter().take(len), num_tags, pad_idx)?;
    }
    Ok(())
}

/// Packs ragged gold tag sequences into a `(batch, max_len)` array, padding with `pad_idx`.
pub fn pad_tag_ids(
    gold: &[Vec<usize>],
    max_len: usize,
    pad_idx: usize,
) -> Result<Array2<usize>, BatchError> {
    let mut padded = Array2::from_elem((gold.len(), max_len), pad_idx);
    for (tags, mut row) in gold.iter().zip(padded.outer_iter_mut()) {
        if tags.len() > max_len {
            return Err(BatchError::ShapeMismatch {
                what: "gold sequence",
                expected: vec![max_len],
                found: vec![tags.len()],
            });
        }
        for (slot, &tag) in row.iter_mut().zip(tags) {
            *slot = tag;
        }
    }
    Ok(padded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array3};

    #[test]
    fn test_sequence_lengths() {
        let mask = array![[true, true, false], [true, true, true], [true, false, false]];
        assert_eq!(sequence_lengths(mask.view()), Ok(vec![2, 3, 1]));
    }

    #[test]
    fn test_sequence_lengths_errors() {
        let holes = array![[true, false, true]];
        assert_eq!(
            sequence_lengths(holes.view()),
            Err(BatchError::NonContiguousMask { item: 0 })
        );
        let empty = array![[true, true], [false, false]];
        assert_eq!(
            sequence_lengths(empty.view()),
            Err(BatchError::EmptySequence { item: 1 })
        );
    }

    #[test]
    fn test_check_emissions_shapes() {
        let emissions = Array3::<f32>::zeros((2, 3, 4));
        let mask = Array2::from_elem((2, 3), true);
        assert_eq!(
            check_emissions(emissions.view(), mask.view(), 4),
            Ok(vec![3, 3])
        );
        assert!(matches!(
            check_emissions(emissions.view(), mask.view(), 5),
            Err(BatchError::ShapeMismatch {
                what: "emissions",
                ..
            })
        ));
        let short_mask = Array2::from_elem((2, 2), true);
        assert!(matches!(
            check_emissions(emissions.view(), short_mask.view(), 4),
            Err(BatchError::ShapeMismatch { what: "mask", .. })
        ));
    }

    #[test]
    fn test_check_gold() {
        let gold = array![[1, 2, 0], [3, 0, 0]];
        assert_eq!(check_gold(gold.view(), &[2, 1], 3, 4, Some(0)), Ok(()));
        assert_eq!(
            check_gold(gold.view(), &[3, 1], 3, 4, Some(0)),
            Err(BatchError::InvalidTag {
                item: 0,
                position: 2,
                tag: 0
            })
        );
        assert_eq!(
            check_gold(gold.view(), &[2, 1], 3, 3, None),
            Err(BatchError::InvalidTag {
                item: 1,
                position: 0,
                tag: 3
            })
        );
    }

    #[test]
    fn test_pad_tag_ids() {
        let padded = pad_tag_ids(&[vec![1, 2], vec![3]], 3, 0).unwrap();
        assert_eq!(padded, array![[1, 2, 0], [3, 0, 0]]);
        assert!(pad_tag_ids(&[vec![1, 2, 3, 4]], 3, 0).is_err());
    }
}
