use crate::recorder::Recorder;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EOp {
    Add,
    Sub,
    Mul,
    MulScalar,
    Pow,
    MatMul,
    AddBroadcast,
    Tanh,
    ReduceSum,
    ReduceMean,
}

/// One recorded operation. `b` equals `a` for unary ops.
#[derive(Clone, Debug)]
pub struct Node {
    pub op: EOp,
    pub a: usize,
    pub b: usize,
    pub out: usize,
}

/// A recorder that only keeps the op list. Used for inference passes where no
/// gradient is needed.
#[derive(Default)]
pub struct Graph {
    nodes: Vec<Node>,
}

impl Recorder for Graph {
    fn record(&mut self, node: Node) {
        self.nodes.push(node);
    }

    fn nodes(&self) -> &[Node] {
        &self.nodes
    }
}

impl Graph {
    pub fn new() -> Self {
        Self { nodes: Vec::new() }
    }
}
