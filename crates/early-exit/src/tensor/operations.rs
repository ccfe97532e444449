use crate::error::{Error, Result};

/// Expands a mask to the full element grid of a tensor.
///
/// The mask shape is aligned against the trailing dimensions of `target`:
/// singleton dimensions are prepended until the ranks match, then every
/// singleton dimension is repeated to the target's size.
///
/// # Parameters
///
/// * `mask_shape` - Shape of the mask, of rank at most `target.len()`
/// * `mask` - Mask values in row-major order
/// * `target` - Shape of the tensor the mask selects from
///
/// # Returns
///
/// One mask value per element of `target`, in row-major order.
///
/// # Implementation Notes
///
/// The function:
/// 1. Rejects masks whose value count disagrees with their shape, or whose
///    rank exceeds the target's
/// 2. Checks each aligned dimension is either equal or `1`
/// 3. Walks the target elements, mapping each coordinate back into the mask
///    with a stride of `0` on broadcast dimensions
pub(crate) fn broadcast_mask(
    mask_shape: &[usize],
    mask: &[bool],
    target: &[usize],
) -> Result<Vec<bool>> {
    if mask_shape.iter().product::<usize>() != mask.len() {
        return Err(Error::Shape(format!(
            "mask of shape {:?} holds {} values", mask_shape, mask.len()
        )));
    }
    if mask_shape.len() > target.len() {
        return Err(Error::Shape(format!(
            "mask of shape {:?} has higher rank than tensor of shape {:?}", mask_shape, target
        )));
    }
    let offset = target.len() - mask_shape.len();
    let mut aligned = vec![1; offset];
    aligned.extend_from_slice(mask_shape);

    for (m, t) in aligned.iter().zip(target.iter()) {
        if m != t && *m != 1 {
            return Err(Error::Shape(format!(
                "mask of shape {:?} cannot be broadcast to {:?}", mask_shape, target
            )));
        }
    }

    if aligned.as_slice() == target {
        return Ok(mask.to_vec());
    }

    // strides into the mask, zeroed on broadcast dimensions
    let mut strides = vec![0; target.len()];
    let mut acc = 1;
    for i in (0..target.len()).rev() {
        strides[i] = if aligned[i] == 1 { 0 } else { acc };
        acc *= aligned[i];
    }

    let total: usize = target.iter().product();
    let mut expanded = Vec::with_capacity(total);
    let mut coord = vec![0usize; target.len()];
    for _ in 0..total {
        let idx: usize = coord.iter().zip(strides.iter()).map(|(c, s)| c * s).sum();
        expanded.push(mask[idx]);
        // row-major increment
        for d in (0..target.len()).rev() {
            coord[d] += 1;
            if coord[d] < target[d] {
                break;
            }
            coord[d] = 0;
        }
    }
    Ok(expanded)
}

/// Splits positions `0..mask.len()` by mask value, preserving order within each side.
///
/// Returns `(keep, skip)`: positions where the mask is `false`, then where it is `true`.
pub(crate) fn partition_positions(mask: &[bool]) -> (Vec<usize>, Vec<usize>) {
    let mut keep = Vec::with_capacity(mask.len());
    let mut skip = Vec::new();
    for (i, &m) in mask.iter().enumerate() {
        if m {
            skip.push(i);
        } else {
            keep.push(i);
        }
    }
    (keep, skip)
}

/// Inverse of a permutation: `inverse[order[i]] = i`.
pub(crate) fn invert_permutation(order: &[usize]) -> Vec<usize> {
    let mut inverse = vec![0; order.len()];
    for (i, &o) in order.iter().enumerate() {
        inverse[o] = i;
    }
    inverse
}

/// Drops every dimension of size `1`
pub(crate) fn squeeze_all(shape: &[usize]) -> Vec<usize> {
    shape.iter().copied().filter(|&d| d != 1).collect()
}

/// Zero-pads a `(rows, cols)` grid of values into a larger `(to_rows, to_cols)` grid.
///
/// Used to align observations taken at different decoding steps, where batch
/// size and sequence length may differ.
pub(crate) fn pad_grid(
    values: &[f32],
    rows: usize,
    cols: usize,
    to_rows: usize,
    to_cols: usize,
) -> Vec<f32> {
    let mut padded = vec![0.0; to_rows * to_cols];
    for r in 0..rows {
        padded[r * to_cols..r * to_cols + cols].copy_from_slice(&values[r * cols..(r + 1) * cols]);
    }
    padded
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_broadcast_mask_same_shape_is_identity() {
        let mask = vec![true, false, true];
        assert_eq!(broadcast_mask(&[3], &mask, &[3]).unwrap(), mask);
    }

    #[test]
    fn test_broadcast_mask_over_leading_dims() {
        // mask (2,) against tensor (3, 2): each row repeats the mask
        let expanded = broadcast_mask(&[2], &[true, false], &[3, 2]).unwrap();
        assert_eq!(expanded, vec![true, false, true, false, true, false]);
    }

    #[test]
    fn test_broadcast_mask_inner_singleton() {
        // mask (2, 1) against (2, 3): each row takes its single value
        let expanded = broadcast_mask(&[2, 1], &[true, false], &[2, 3]).unwrap();
        assert_eq!(expanded, vec![true, true, true, false, false, false]);
    }

    #[test]
    fn test_broadcast_mask_scalar() {
        let expanded = broadcast_mask(&[], &[true], &[2, 2]).unwrap();
        assert_eq!(expanded, vec![true; 4]);
    }

    #[test]
    fn test_broadcast_mask_rejects_incompatible() {
        assert!(matches!(
            broadcast_mask(&[3], &[true, false, true], &[3, 2]),
            Err(Error::Shape(_))
        ));
        assert!(matches!(
            broadcast_mask(&[1, 2, 2], &[true; 4], &[2, 2]),
            Err(Error::Shape(_))
        ));
    }

    #[test]
    fn test_broadcast_mask_rejects_short_values() {
        assert!(matches!(
            broadcast_mask(&[2], &[true], &[3, 2]),
            Err(Error::Shape(_))
        ));
        assert!(matches!(
            broadcast_mask(&[5], &[false, true], &[5]),
            Err(Error::Shape(_))
        ));
    }

    #[test]
    fn test_partition_positions_is_stable() {
        let (keep, skip) = partition_positions(&[false, true, false, true, false]);
        assert_eq!(keep, vec![0, 2, 4]);
        assert_eq!(skip, vec![1, 3]);
    }

    #[test]
    fn test_invert_permutation() {
        assert_eq!(invert_permutation(&[0, 2, 4, 1, 3]), vec![0, 3, 1, 4, 2]);
    }

    #[test]
    fn test_squeeze_all() {
        assert_eq!(squeeze_all(&[4, 1, 1]), vec![4]);
        assert_eq!(squeeze_all(&[1, 1]), Vec::<usize>::new());
        assert_eq!(squeeze_all(&[2, 1, 3]), vec![2, 3]);
    }

    #[test]
    fn test_pad_grid() {
        let padded = pad_grid(&[1., 2., 3., 4.], 2, 2, 3, 3);
        assert_eq!(padded, vec![1., 2., 0., 3., 4., 0., 0., 0., 0.]);
    }
}
