//! Run-identity pass applied after all inputs are bound

use rand::Rng;
use serde_json::Value;
use workflow_graph::constants::{is_seed_like, is_seed_sentinel, is_sink_class, nodes};
use workflow_graph::WorkflowGraph;

/// Stamp sink nodes with `prefix` and roll every sentinel seed
pub(crate) fn finish_graph(graph: &mut WorkflowGraph, prefix: &str) {
    let mut rng = rand::thread_rng();
    for mut node in graph.nodes_mut() {
        let is_sink = is_sink_class(node.class_type());
        let id = node.id().to_string();
        let Some(inputs) = node.inputs_mut() else {
            continue;
        };

        if is_sink {
            inputs.insert(
                nodes::FILENAME_PREFIX_INPUT.to_string(),
                Value::String(prefix.to_string()),
            );
            continue;
        }

        for (name, value) in inputs.iter_mut() {
            if is_seed_like(name) && is_seed_sentinel(value) {
                let seed = rng.gen_range(0..nodes::SEED_UPPER_BOUND);
                log::debug!("Node {}: randomized {} to {}", id, name, seed);
                *value = Value::from(seed);
            }
        }
    }
}
