use crate::graph::{EOp, Node};
use crate::recorder::Recorder;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

static NEXT_ID: AtomicUsize = AtomicUsize::new(0);

fn next_id() -> usize {
    NEXT_ID.fetch_add(1, Ordering::Relaxed)
}

/// Dense row-major `f64` tensor that can take part in a recorded computation.
///
/// Every tensor carries a process-unique `id`; recorded ops refer to their
/// inputs and outputs by id, and the storage map passed alongside each op is
/// keyed by the same ids.
#[derive(Clone, Debug)]
pub struct Tensor {
    pub id: usize,
    pub data: Vec<f64>,
    pub shape: Vec<usize>,
    pub requires_grad: bool,
    pub grad: Option<Vec<f64>>,
}

impl Tensor {
    pub fn from_vec(shape: Vec<usize>, data: Vec<f64>) -> Self {
        assert_eq!(shape.iter().product::<usize>(), data.len());
        Self {
            id: next_id(),
            data,
            shape,
            requires_grad: false,
            grad: None,
        }
    }

    pub fn zeros(shape: Vec<usize>) -> Self {
        let len = shape.iter().product();
        Self::from_vec(shape, vec![0.0; len])
    }

    pub fn scalar(value: f64) -> Self {
        Self::from_vec(vec![1], vec![value])
    }

    /// Marks the tensor as a leaf whose gradient should be kept after backward.
    #[must_use]
    pub fn with_grad(mut self) -> Self {
        self.requires_grad = true;
        self
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn data(&self) -> &[f64] {
        &self.data
    }

    fn emit(
        &self,
        op: EOp,
        other: Option<&Tensor>,
        out: Tensor,
        recorder: &mut impl Recorder,
        tensors: &mut HashMap<usize, Tensor>,
    ) -> Tensor {
        tensors.entry(self.id).or_insert_with(|| self.clone());
        let b = match other {
            Some(t) => {
                tensors.entry(t.id).or_insert_with(|| t.clone());
                t.id
            }
            None => self.id,
        };
        recorder.record(Node {
            op,
            a: self.id,
            b,
            out: out.id,
        });
        tensors.insert(out.id, out.clone());
        out
    }

    fn zip_with(&self, other: &Tensor, f: impl Fn(f64, f64) -> f64) -> Tensor {
        assert_eq!(self.len(), other.len(), "element-wise op on mismatched lengths");
        let data = self
            .data
            .iter()
            .zip(&other.data)
            .map(|(&x, &y)| f(x, y))
            .collect();
        Tensor::from_vec(self.shape.clone(), data)
    }

    fn map(&self, f: impl Fn(f64) -> f64) -> Tensor {
        Tensor::from_vec(self.shape.clone(), self.data.iter().map(|&x| f(x)).collect())
    }

    pub fn add(
        &self,
        other: &Tensor,
        recorder: &mut impl Recorder,
        tensors: &mut HashMap<usize, Tensor>,
    ) -> Tensor {
        let out = self.zip_with(other, |x, y| x + y);
        self.emit(EOp::Add, Some(other), out, recorder, tensors)
    }

    pub fn sub(
        &self,
        other: &Tensor,
        recorder: &mut impl Recorder,
        tensors: &mut HashMap<usize, Tensor>,
    ) -> Tensor {
        let out = self.zip_with(other, |x, y| x - y);
        self.emit(EOp::Sub, Some(other), out, recorder, tensors)
    }

    pub fn mul(
        &self,
        other: &Tensor,
        recorder: &mut impl Recorder,
        tensors: &mut HashMap<usize, Tensor>,
    ) -> Tensor {
        let out = self.zip_with(other, |x, y| x * y);
        self.emit(EOp::Mul, Some(other), out, recorder, tensors)
    }

    pub fn mul_scalar(
        &self,
        scalar: f64,
        recorder: &mut impl Recorder,
        tensors: &mut HashMap<usize, Tensor>,
    ) -> Tensor {
        let s = Tensor::scalar(scalar);
        let out = self.map(|x| x * scalar);
        self.emit(EOp::MulScalar, Some(&s), out, recorder, tensors)
    }

    pub fn pow(
        &self,
        exponent: f64,
        recorder: &mut impl Recorder,
        tensors: &mut HashMap<usize, Tensor>,
    ) -> Tensor {
        let e = Tensor::scalar(exponent);
        let out = self.map(|x| x.powf(exponent));
        self.emit(EOp::Pow, Some(&e), out, recorder, tensors)
    }

    pub fn tanh(&self, recorder: &mut impl Recorder, tensors: &mut HashMap<usize, Tensor>) -> Tensor {
        let out = self.map(f64::tanh);
        self.emit(EOp::Tanh, None, out, recorder, tensors)
    }

    /// `self` is a weight matrix `[out, in]`, `x` a batch `[n, in]`; the
    /// result is `[n, out]`.
    pub fn matmul(
        &self,
        x: &Tensor,
        recorder: &mut impl Recorder,
        tensors: &mut HashMap<usize, Tensor>,
    ) -> Tensor {
        let out_dim = self.shape[0];
        let in_dim = self.shape[1];
        assert_eq!(x.len() % in_dim, 0, "matmul input width does not match weights");
        let batch = x.len() / in_dim;
        let mut y = vec![0.0; batch * out_dim];
        for k in 0..batch {
            let row = &x.data[k * in_dim..(k + 1) * in_dim];
            for i in 0..out_dim {
                let w = &self.data[i * in_dim..(i + 1) * in_dim];
                y[k * out_dim + i] = w.iter().zip(row).map(|(a, b)| a * b).sum();
            }
        }
        let out = Tensor::from_vec(vec![batch, out_dim], y);
        self.emit(EOp::MatMul, Some(x), out, recorder, tensors)
    }

    /// Adds the row vector `b` (`[d]`) to every row of `self` (`[n, d]`).
    pub fn add_broadcast(
        &self,
        b: &Tensor,
        recorder: &mut impl Recorder,
        tensors: &mut HashMap<usize, Tensor>,
    ) -> Tensor {
        let dim = b.len();
        assert_eq!(self.len() % dim, 0, "broadcast width mismatch");
        let data = self
            .data
            .iter()
            .enumerate()
            .map(|(i, &v)| v + b.data[i % dim])
            .collect();
        let out = Tensor::from_vec(self.shape.clone(), data);
        self.emit(EOp::AddBroadcast, Some(b), out, recorder, tensors)
    }

    pub fn reduce_sum(&self, recorder: &mut impl Recorder, tensors: &mut HashMap<usize, Tensor>) -> Tensor {
        let out = Tensor::scalar(self.data.iter().sum());
        self.emit(EOp::ReduceSum, None, out, recorder, tensors)
    }

    pub fn reduce_mean(&self, recorder: &mut impl Recorder, tensors: &mut HashMap<usize, Tensor>) -> Tensor {
        let n = self.len().max(1) as f64;
        let out = Tensor::scalar(self.data.iter().sum::<f64>() / n);
        self.emit(EOp::ReduceMean, None, out, recorder, tensors)
    }
}
