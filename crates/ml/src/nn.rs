use crate::graph::Graph;
use crate::recorder::Recorder;
use crate::tensor::Tensor;
use std::collections::HashMap;

/// A fully connected neural network layer.
#[derive(Clone, Debug)]
pub struct Dense {
    /// The weight matrix for the layer, `[out_dim, in_dim]`.
    pub w: Tensor,
    /// The bias vector for the layer.
    pub b: Tensor,
    pub in_dim: usize,
    pub out_dim: usize,
}

impl Dense {
    /// Creates a new `Dense` layer with the given weights and biases.
    pub fn new(weights: Vec<f64>, bias: Vec<f64>, in_d: usize, out_d: usize) -> Self {
        assert_eq!(weights.len(), in_d * out_d);
        assert_eq!(bias.len(), out_d);
        Self {
            w: Tensor::from_vec(vec![out_d, in_d], weights).with_grad(),
            b: Tensor::from_vec(vec![out_d], bias).with_grad(),
            in_dim: in_d,
            out_dim: out_d,
        }
    }

    /// Glorot-uniform weights drawn from `rng`, zero bias.
    pub fn random(in_d: usize, out_d: usize, rng: &mut fastrand::Rng) -> Self {
        let limit = (6.0 / (in_d + out_d) as f64).sqrt();
        let weights = (0..in_d * out_d)
            .map(|_| rng.f64() * 2.0 * limit - limit)
            .collect();
        Self::new(weights, vec![0.0; out_d], in_d, out_d)
    }

    pub fn zeros(in_d: usize, out_d: usize) -> Self {
        Self::new(vec![0.0; in_d * out_d], vec![0.0; out_d], in_d, out_d)
    }

    /// Performs the forward pass through the layer.
    pub fn forward(
        &self,
        x: &Tensor,
        recorder: &mut impl Recorder,
        tensors: &mut HashMap<usize, Tensor>,
    ) -> Tensor {
        let wx = self.w.matmul(x, recorder, tensors);
        wx.add_broadcast(&self.b, recorder, tensors)
    }
}

/// Stack of dense layers with `tanh` between them and a linear output.
#[derive(Clone, Debug)]
pub struct Mlp {
    layers: Vec<Dense>,
}

impl Mlp {
    /// Builds a network with the given layer widths (`sizes[0]` is the input
    /// width, the last entry the output width).
    ///
    /// Hidden layers are Glorot-initialized; the output layer starts at zero
    /// so the untrained network is the constant `0`.
    pub fn new(sizes: &[usize], rng: &mut fastrand::Rng) -> Self {
        assert!(sizes.len() >= 2, "an Mlp needs an input and an output width");
        let last = sizes.len() - 2;
        let layers = sizes
            .windows(2)
            .enumerate()
            .map(|(i, w)| {
                if i == last {
                    Dense::zeros(w[0], w[1])
                } else {
                    Dense::random(w[0], w[1], rng)
                }
            })
            .collect();
        Self { layers }
    }

    pub fn in_dim(&self) -> usize {
        self.layers[0].in_dim
    }

    pub fn out_dim(&self) -> usize {
        self.layers[self.layers.len() - 1].out_dim
    }

    pub fn forward(
        &self,
        x: &Tensor,
        recorder: &mut impl Recorder,
        tensors: &mut HashMap<usize, Tensor>,
    ) -> Tensor {
        let last = self.layers.len() - 1;
        let mut out = x.clone();
        for (i, layer) in self.layers.iter().enumerate() {
            out = layer.forward(&out, recorder, tensors);
            if i != last {
                out = out.tanh(recorder, tensors);
            }
        }
        out
    }

    /// Forward pass with a throwaway recorder.
    pub fn predict(&self, x: &Tensor) -> Tensor {
        let mut tensors = HashMap::new();
        self.forward(x, &mut Graph::new(), &mut tensors)
    }

    pub fn params(&self) -> Vec<&Tensor> {
        self.layers.iter().flat_map(|l| [&l.w, &l.b]).collect()
    }

    pub fn params_mut(&mut self) -> Vec<&mut Tensor> {
        self.layers
            .iter_mut()
            .flat_map(|l| [&mut l.w, &mut l.b])
            .collect()
    }
}
