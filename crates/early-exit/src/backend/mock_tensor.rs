use crate::backend::Backend;
use crate::error::{Error, Result};

/// Fake placement tag, so tests can observe device reconciliation
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MockDevice {
    Host,
    Accelerator(u8),
}

// A simple dense row-major tensor implementation for testing
#[derive(Clone, Debug, PartialEq)]
pub struct MockTensor {
    pub(crate) shape: Vec<usize>,
    pub(crate) data: Vec<f32>,
    pub(crate) device: MockDevice,
}

impl MockTensor {
    pub fn new(shape: Vec<usize>, data: Vec<f32>) -> Self {
        assert_eq!(shape.iter().product::<usize>(), data.len(), "shape does not match data");
        Self { shape, data, device: MockDevice::Host }
    }

    /// A tensor holding `0, 1, 2, ...` in row-major order
    pub fn arange(shape: Vec<usize>) -> Self {
        let n = shape.iter().product::<usize>();
        Self::new(shape, (0..n).map(|e| e as f32).collect())
    }

    pub fn on(mut self, device: MockDevice) -> Self {
        self.device = device;
        self
    }

    fn last_dim(&self) -> usize {
        self.shape.last().copied().unwrap_or(1)
    }

    fn map_last<F>(&self, width: usize, f: F) -> Self
    where F: Fn(&[f32]) -> Vec<f32>
    {
        let last = self.last_dim();
        let mut data = Vec::with_capacity(self.data.len() / last.max(1) * width);
        for row in self.data.chunks(last.max(1)) {
            data.extend(f(row));
        }
        let mut shape = self.shape.clone();
        if let Some(l) = shape.last_mut() {
            *l = width;
        }
        Self { shape, data, device: self.device }
    }
}

impl Backend for MockTensor {
    type Device = MockDevice;
    type Flat = MockTensor;

    fn shape(&self) -> Vec<usize> {
        self.shape.clone()
    }

    fn device(&self) -> Self::Device {
        self.device
    }

    fn to_device(&self, device: &Self::Device) -> Result<Self> {
        Ok(self.clone().on(*device))
    }

    fn cat(tensors: &[Self], dim: usize) -> Result<Self> {
        let first = tensors.first().ok_or_else(|| Error::Shape("empty cat".to_string()))?;
        if tensors.iter().any(|t| t.device != first.device) {
            return Err(Error::Backend("cat across devices".to_string()));
        }
        let mut new_shape = first.shape.clone();
        for t in tensors {
            let mut a = t.shape.clone();
            let mut b = first.shape.clone();
            if a.len() != b.len() || dim >= a.len() {
                return Err(Error::Shape(format!("cat of {:?} and {:?}", t.shape, first.shape)));
            }
            a[dim] = 0;
            b[dim] = 0;
            if a != b {
                return Err(Error::Shape(format!("cat of {:?} and {:?}", t.shape, first.shape)));
            }
        }
        new_shape[dim] = tensors.iter().map(|t| t.shape[dim]).sum();

        // outer blocks before `dim`, each contributing a contiguous chunk per tensor
        let outer: usize = first.shape[..dim].iter().product();
        let mut data = Vec::new();
        for o in 0..outer {
            for t in tensors {
                let chunk: usize = t.shape[dim..].iter().product();
                data.extend_from_slice(&t.data[o * chunk..(o + 1) * chunk]);
            }
        }
        Ok(Self { shape: new_shape, data, device: first.device })
    }

    fn index_select(&self, indices: &[usize], dim: usize) -> Result<Self> {
        if dim >= self.shape.len() {
            return Err(Error::Shape(format!("dim {} on shape {:?}", dim, self.shape)));
        }
        let outer: usize = self.shape[..dim].iter().product();
        let inner: usize = self.shape[dim + 1..].iter().product();
        let size = self.shape[dim];
        let mut data = Vec::with_capacity(outer * indices.len() * inner);
        for o in 0..outer {
            for &i in indices {
                if i >= size {
                    return Err(Error::Index(format!("{} out of range {}", i, size)));
                }
                let start = (o * size + i) * inner;
                data.extend_from_slice(&self.data[start..start + inner]);
            }
        }
        let mut shape = self.shape.clone();
        shape[dim] = indices.len();
        Ok(Self { shape, data, device: self.device })
    }

    fn reshape(&self, shape: &[usize]) -> Result<Self> {
        if shape.iter().product::<usize>() != self.data.len() {
            return Err(Error::Shape(format!("reshape {:?} to {:?}", self.shape, shape)));
        }
        Ok(Self { shape: shape.to_vec(), data: self.data.clone(), device: self.device })
    }

    fn flatten(&self) -> Result<Self::Flat> {
        self.reshape(&[self.data.len()])
    }

    fn unflatten(flat: &Self::Flat, shape: &[usize]) -> Result<Self> {
        flat.reshape(shape)
    }

    fn softmax_last(&self) -> Result<Self> {
        Ok(self.map_last(self.last_dim(), |row| {
            let max = row.iter().copied().fold(f32::NEG_INFINITY, f32::max);
            let exp: Vec<f32> = row.iter().map(|v| (v - max).exp()).collect();
            let sum: f32 = exp.iter().sum();
            exp.into_iter().map(|v| v / sum).collect()
        }))
    }

    fn top_k_last(&self, k: usize) -> Result<Self> {
        if k > self.last_dim() {
            return Err(Error::Shape(format!("top {} of {:?}", k, self.shape)));
        }
        Ok(self.map_last(k, |row| {
            let mut sorted = row.to_vec();
            sorted.sort_by(|a, b| b.total_cmp(a));
            sorted.truncate(k);
            sorted
        }))
    }

    fn mul(&self, other: &Self) -> Result<Self> {
        if self.shape != other.shape {
            return Err(Error::Shape(format!("mul of {:?} and {:?}", self.shape, other.shape)));
        }
        let data = self.data.iter().zip(other.data.iter()).map(|(a, b)| a * b).collect();
        Ok(Self { shape: self.shape.clone(), data, device: self.device })
    }

    fn sum_last_keepdim(&self) -> Result<Self> {
        Ok(self.map_last(1, |row| vec![row.iter().sum()]))
    }

    fn to_vec_f32(&self) -> Result<Vec<f32>> {
        Ok(self.data.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cat_along_inner_dim_interleaves_rows() {
        let a = MockTensor::new(vec![2, 1], vec![1., 2.]);
        let b = MockTensor::new(vec![2, 2], vec![3., 4., 5., 6.]);

        let c = MockTensor::cat(&[a, b], 1).unwrap();

        assert_eq!(c.shape, vec![2, 3]);
        assert_eq!(c.data, vec![1., 3., 4., 2., 5., 6.]);
    }

    #[test]
    fn test_index_select_inner_dim() {
        let t = MockTensor::arange(vec![2, 3]);

        let picked = t.index_select(&[2, 0], 1).unwrap();

        assert_eq!(picked.shape, vec![2, 2]);
        assert_eq!(picked.data, vec![2., 0., 5., 3.]);
    }
}
