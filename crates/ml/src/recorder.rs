use crate::graph::Node;

/// Sink for the operations executed by tensor ops.
pub trait Recorder {
    fn record(&mut self, node: Node);
    fn nodes(&self) -> &[Node];
}
