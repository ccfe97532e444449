use super::Backend;
use crate::error::{Error, Result};
use candle_core::{DType, Tensor, D};

impl Backend for Tensor {
    type Device = candle_core::Device;
    type Flat = Tensor;

    fn shape(&self) -> Vec<usize> {
        self.dims().to_vec()
    }

    fn device(&self) -> Self::Device {
        Tensor::device(self).clone()
    }

    fn to_device(&self, device: &Self::Device) -> Result<Self> {
        Ok(Tensor::to_device(self, device)?)
    }

    fn cat(tensors: &[Self], dim: usize) -> Result<Self> {
        if tensors.is_empty() {
            return Err(Error::Shape("cannot concatenate an empty tensor list".to_string()));
        }
        Ok(Tensor::cat(tensors, dim)?)
    }

    fn index_select(&self, indices: &[usize], dim: usize) -> Result<Self> {
        let ids = indices.iter().map(|&i| i as u32).collect::<Vec<_>>();
        let ids = Tensor::from_vec(ids, indices.len(), Tensor::device(self))?;
        Ok(Tensor::index_select(self, &ids, dim)?)
    }

    fn reshape(&self, shape: &[usize]) -> Result<Self> {
        Ok(Tensor::reshape(self, shape.to_vec())?)
    }

    fn flatten(&self) -> Result<Self::Flat> {
        Ok(self.flatten_all()?)
    }

    fn unflatten(flat: &Self::Flat, shape: &[usize]) -> Result<Self> {
        Ok(Tensor::reshape(flat, shape.to_vec())?)
    }

    fn softmax_last(&self) -> Result<Self> {
        Ok(candle_nn::ops::softmax(self, D::Minus1)?)
    }

    fn top_k_last(&self, k: usize) -> Result<Self> {
        let last = self.dims().last().copied().unwrap_or(0);
        if k > last {
            return Err(Error::Shape(format!(
                "top {} requested from a last dimension of size {}", k, last
            )));
        }
        match k {
            0 => Ok(self.narrow(D::Minus1, 0, 0)?),
            1 => Ok(self.max_keepdim(D::Minus1)?),
            2 => top_two_last(self),
            // sorts the whole row; candle's gpu sort caps the row at one block of threads
            _ => {
                let (sorted, _) = self.contiguous()?.sort_last_dim(false)?;
                Ok(sorted.narrow(D::Minus1, 0, k)?)
            }
        }
    }

    fn mul(&self, other: &Self) -> Result<Self> {
        Ok(Tensor::mul(self, other)?)
    }

    fn sum_last_keepdim(&self) -> Result<Self> {
        Ok(self.sum_keepdim(D::Minus1)?)
    }

    fn to_vec_f32(&self) -> Result<Vec<f32>> {
        Ok(self.flatten_all()?.to_dtype(DType::F32)?.to_vec1::<f32>()?)
    }
}

/// Largest and second largest values along the last dimension.
///
/// Built from reductions only, so it accepts rows of any width on any device.
/// The first argmax is replaced by the row minimum before the second
/// reduction, which keeps ties: `[3, 3, 1]` yields `[3, 3]`.
fn top_two_last(t: &Tensor) -> Result<Tensor> {
    let dims = t.dims();
    let last = dims.last().copied().unwrap_or(0);
    let top = t.max_keepdim(D::Minus1)?;

    let columns = Tensor::arange(0u32, last as u32, t.device())?.broadcast_as(dims)?;
    let is_top = columns.eq(&t.argmax_keepdim(D::Minus1)?.broadcast_as(dims)?)?;
    let floor = t.min_keepdim(D::Minus1)?.broadcast_as(dims)?;
    let second = is_top.where_cond(&floor, t)?.max_keepdim(D::Minus1)?;

    Ok(Tensor::cat(&[&top, &second], D::Minus1)?)
}
