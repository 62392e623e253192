//! # ml
//!
//! A deliberately small reverse-mode automatic differentiation engine.
//!
//! Tensors are plain row-major `f64` buffers. Every op takes a [`Recorder`]
//! and a storage map keyed by tensor id: the op computes its output eagerly,
//! stores inputs and output in the map, and records a [`graph::Node`]. A
//! [`Tape`] replays those nodes backwards to produce gradients for the leaves
//! marked with [`Tensor::with_grad`]; a [`Graph`] just collects them and is
//! used for inference passes.
//!
//! On top of the tape the crate offers [`Dense`]/[`Mlp`] layers and the
//! [`Adam`] optimizer, which is everything the reward canonicalization
//! solvers need to fit a parametric potential.
//!
//! ```rust
//! use ml::{Mlp, Tape, Tensor, collect_grads};
//! use std::collections::HashMap;
//!
//! let mut rng = fastrand::Rng::with_seed(7);
//! let mut net = Mlp::new(&[2, 1], &mut rng);
//! let x = Tensor::from_vec(vec![1, 2], vec![0.5, -0.5]);
//!
//! let mut tape = Tape::new();
//! let mut tensors = HashMap::new();
//! let y = net.forward(&x, &mut tape, &mut tensors);
//! let loss = y.reduce_sum(&mut tape, &mut tensors);
//! tape.backward(&loss, &mut tensors).unwrap();
//! collect_grads(&tensors, &mut net.params_mut());
//! assert!(net.params().iter().all(|p| p.grad.is_some()));
//! ```

pub mod graph;
pub mod nn;
pub mod optim;
pub mod recorder;
pub mod tape;
pub mod tensor;

pub use graph::Graph;
pub use nn::{Dense, Mlp};
pub use optim::Adam;
pub use recorder::Recorder;
pub use tape::{collect_grads, Tape};
pub use tensor::Tensor;
