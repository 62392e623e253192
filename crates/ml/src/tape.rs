use crate::graph::{EOp, Node};
use crate::recorder::Recorder;
use crate::Tensor;
use anyhow::{anyhow, Result};
use std::collections::HashMap;

/// A tape that records operations for automatic differentiation.
#[derive(Default)]
pub struct Tape {
    nodes: Vec<Node>,
}

impl Recorder for Tape {
    fn record(&mut self, node: Node) {
        self.nodes.push(node);
    }

    fn nodes(&self) -> &[Node] {
        &self.nodes
    }
}

fn fetch(tensors: &HashMap<usize, Tensor>, id: usize) -> Result<&Tensor> {
    tensors
        .get(&id)
        .ok_or_else(|| anyhow!("tensor {id} is missing from the tape storage"))
}

fn accumulate<'a>(
    grads: &'a mut HashMap<usize, Vec<f64>>,
    id: usize,
    len: usize,
) -> &'a mut Vec<f64> {
    grads.entry(id).or_insert_with(|| vec![0.0; len])
}

impl Tape {
    /// Creates a new, empty tape.
    pub fn new() -> Self {
        Self { nodes: Vec::new() }
    }

    /// Computes the gradients of the recorded tensors with respect to `loss`.
    ///
    /// The gradients are computed by traversing the recorded operations in
    /// reverse order. Only tensors marked with `requires_grad` receive their
    /// gradient in `tensors`.
    ///
    /// # Errors
    ///
    /// Fails when a recorded tensor id is absent from `tensors`.
    pub fn backward(&self, loss: &Tensor, tensors: &mut HashMap<usize, Tensor>) -> Result<()> {
        let mut grads: HashMap<usize, Vec<f64>> = HashMap::new();
        grads.insert(loss.id, vec![1.0; loss.len()]);

        for node in self.nodes.iter().rev() {
            let Some(out_grad) = grads.get(&node.out).cloned() else {
                continue;
            };
            let a = fetch(tensors, node.a)?;
            let b = fetch(tensors, node.b)?;

            match node.op {
                EOp::Add => {
                    for (g, og) in accumulate(&mut grads, node.a, a.len()).iter_mut().zip(&out_grad) {
                        *g += og;
                    }
                    for (g, og) in accumulate(&mut grads, node.b, b.len()).iter_mut().zip(&out_grad) {
                        *g += og;
                    }
                }
                EOp::Sub => {
                    for (g, og) in accumulate(&mut grads, node.a, a.len()).iter_mut().zip(&out_grad) {
                        *g += og;
                    }
                    for (g, og) in accumulate(&mut grads, node.b, b.len()).iter_mut().zip(&out_grad) {
                        *g -= og;
                    }
                }
                EOp::Mul => {
                    let a_grad = accumulate(&mut grads, node.a, a.len());
                    for (g, (d, og)) in a_grad.iter_mut().zip(b.data.iter().zip(&out_grad)) {
                        *g += d * og;
                    }
                    let b_grad = accumulate(&mut grads, node.b, b.len());
                    for (g, (d, og)) in b_grad.iter_mut().zip(a.data.iter().zip(&out_grad)) {
                        *g += d * og;
                    }
                }
                EOp::MulScalar => {
                    let scalar = b.data[0];
                    for (g, og) in accumulate(&mut grads, node.a, a.len()).iter_mut().zip(&out_grad) {
                        *g += scalar * og;
                    }
                }
                EOp::Pow => {
                    let exp = b.data[0];
                    let a_grad = accumulate(&mut grads, node.a, a.len());
                    for (g, (d, og)) in a_grad.iter_mut().zip(a.data.iter().zip(&out_grad)) {
                        *g += exp * d.powf(exp - 1.0) * og;
                    }
                }
                EOp::Tanh => {
                    let out = fetch(tensors, node.out)?;
                    let a_grad = accumulate(&mut grads, node.a, a.len());
                    for (g, (d, og)) in a_grad.iter_mut().zip(out.data.iter().zip(&out_grad)) {
                        *g += (1.0 - d.powi(2)) * og;
                    }
                }
                EOp::MatMul => {
                    let out_dim = a.shape[0];
                    let in_dim = a.shape[1];
                    let batch = b.len() / in_dim;
                    {
                        let w_grad = accumulate(&mut grads, node.a, a.len());
                        for k in 0..batch {
                            for i in 0..out_dim {
                                let og = out_grad[k * out_dim + i];
                                for j in 0..in_dim {
                                    w_grad[i * in_dim + j] += og * b.data[k * in_dim + j];
                                }
                            }
                        }
                    }
                    {
                        let x_grad = accumulate(&mut grads, node.b, b.len());
                        for k in 0..batch {
                            for i in 0..out_dim {
                                let og = out_grad[k * out_dim + i];
                                for j in 0..in_dim {
                                    x_grad[k * in_dim + j] += og * a.data[i * in_dim + j];
                                }
                            }
                        }
                    }
                }
                EOp::AddBroadcast => {
                    for (g, og) in accumulate(&mut grads, node.a, a.len()).iter_mut().zip(&out_grad) {
                        *g += og;
                    }
                    let dim = b.len();
                    let b_grad = accumulate(&mut grads, node.b, dim);
                    for (i, og) in out_grad.iter().enumerate() {
                        b_grad[i % dim] += og;
                    }
                }
                EOp::ReduceSum => {
                    for g in accumulate(&mut grads, node.a, a.len()).iter_mut() {
                        *g += out_grad[0];
                    }
                }
                EOp::ReduceMean => {
                    let n = a.len().max(1) as f64;
                    for g in accumulate(&mut grads, node.a, a.len()).iter_mut() {
                        *g += out_grad[0] / n;
                    }
                }
            }
        }

        for (id, grad) in grads {
            if let Some(tensor) = tensors.get_mut(&id) {
                if tensor.requires_grad {
                    tensor.grad = Some(grad);
                }
            }
        }

        Ok(())
    }
}

/// Copies the gradients computed by [`Tape::backward`] from the tape storage
/// onto the caller's parameter tensors.
pub fn collect_grads(tensors: &HashMap<usize, Tensor>, params: &mut [&mut Tensor]) {
    for p in params.iter_mut() {
        p.grad = tensors.get(&p.id).and_then(|t| t.grad.clone());
    }
}
