//! The burn implementation for backend provision.
//! Since burn Tensor are constrained with const generics, we must macro apply the
//! core operations for each supported rank
use super::Backend;
use crate::error::{Error, Result};
use burn::prelude::{Tensor, Backend as BurnBackend};
use burn::tensor::{Int, TensorData};
use burn::tensor::activation::softmax;

fn dims_array<const D: usize>(shape: &[usize]) -> Result<[usize; D]> {
    shape.try_into().map_err(|_| {
        Error::Shape(format!("shape {:?} does not have rank {}", shape, D))
    })
}

fn to_host<B: BurnBackend, const D: usize>(tensor: &Tensor<B, D>) -> Result<Vec<f32>> {
    tensor.clone()
        .into_data()
        .convert::<f32>()
        .to_vec::<f32>()
        .map_err(|e| Error::Backend(format!("{:?}", e)))
}

macro_rules! impl_core_tensor_ops {
    ($d:literal) => {
        impl <B> Backend for Tensor<B, $d>
        where B: BurnBackend {
            type Device = B::Device;
            type Flat = Tensor<B, 1>;

            fn shape(&self) -> Vec<usize> {
                self.dims().to_vec()
            }

            fn device(&self) -> Self::Device {
                Tensor::device(self)
            }

            fn to_device(&self, device: &Self::Device) -> Result<Self> {
                Ok(self.clone().to_device(device))
            }

            fn cat(tensors: &[Self], dim: usize) -> Result<Self> {
                if tensors.is_empty() || dim >= $d {
                    return Err(Error::Shape(format!("cannot concatenate {} tensors along {}", tensors.len(), dim)));
                }
                let owned: Vec<_> = tensors.iter().map(|e| e.clone()).collect();
                Ok(Tensor::cat(owned, dim))
            }

            fn index_select(&self, indices: &[usize], dim: usize) -> Result<Self> {
                let ids: Vec<i64> = indices.iter().map(|&i| i as i64).collect();
                let ids = Tensor::<B, 1, Int>::from_data(
                    TensorData::new(ids, [indices.len()]),
                    &Tensor::device(self),
                );
                Ok(self.clone().select(dim, ids))
            }

            fn reshape(&self, shape: &[usize]) -> Result<Self> {
                let dims = dims_array::<$d>(shape)?;
                Ok(self.clone().reshape(dims))
            }

            fn flatten(&self) -> Result<Self::Flat> {
                let n = self.dims().iter().product::<usize>();
                Ok(self.clone().reshape([n]))
            }

            fn unflatten(flat: &Self::Flat, shape: &[usize]) -> Result<Self> {
                let dims = dims_array::<$d>(shape)?;
                Ok(flat.clone().reshape(dims))
            }

            fn softmax_last(&self) -> Result<Self> {
                Ok(softmax(self.clone(), $d - 1))
            }

            fn top_k_last(&self, k: usize) -> Result<Self> {
                if k > self.dims()[$d - 1] {
                    return Err(Error::Shape(format!("top {} of {:?}", k, self.dims())));
                }
                Ok(self.clone().topk(k, $d - 1))
            }

            fn mul(&self, other: &Self) -> Result<Self> {
                if self.dims() != other.dims() {
                    return Err(Error::Shape(format!("mul of {:?} and {:?}", self.dims(), other.dims())));
                }
                Ok(self.clone().mul(other.clone()))
            }

            fn sum_last_keepdim(&self) -> Result<Self> {
                Ok(self.clone().sum_dim($d - 1))
            }

            fn to_vec_f32(&self) -> Result<Vec<f32>> {
                to_host(self)
            }
        }
    }
}

impl_core_tensor_ops!(1);
impl_core_tensor_ops!(2);
impl_core_tensor_ops!(3);
impl_core_tensor_ops!(4);
