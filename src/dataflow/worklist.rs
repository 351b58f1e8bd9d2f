use std::collections::{BTreeMap, BTreeSet, VecDeque};

use anyhow::Result;

use crate::ir::{FlowRule, MethodBody, Node, NodeId};

/// Value lattice tracked per node.
pub(crate) trait AbstractValue: Copy + Eq {
    fn least_upper_bound(self, other: Self) -> Self;
}

/// Store lattice threaded through the graph.
pub(crate) trait AbstractStore: Clone + Eq {
    fn least_upper_bound(&self, other: &Self) -> Self;
}

/// Stores flowing into a node: one per branch outcome of the preceding condition.
///
/// A missing side has not been reached yet. A regular input carries the same
/// store on both sides.
#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) struct TransferInput<S> {
    then_store: Option<S>,
    else_store: Option<S>,
}

impl<S: AbstractStore> TransferInput<S> {
    pub(crate) fn unreached() -> Self {
        Self {
            then_store: None,
            else_store: None,
        }
    }

    pub(crate) fn regular(store: S) -> Self {
        Self {
            then_store: Some(store.clone()),
            else_store: Some(store),
        }
    }

    pub(crate) fn conditional(then_store: S, else_store: S) -> Self {
        Self {
            then_store: Some(then_store),
            else_store: Some(else_store),
        }
    }

    pub(crate) fn is_reached(&self) -> bool {
        self.then_store.is_some() || self.else_store.is_some()
    }

    pub(crate) fn then_store(&self) -> Option<&S> {
        self.then_store.as_ref()
    }

    pub(crate) fn else_store(&self) -> Option<&S> {
        self.else_store.as_ref()
    }

    /// Merge of both sides, as seen by a node that does not care about the branch.
    pub(crate) fn regular_store(&self) -> Option<S> {
        join_optional(self.then_store.as_ref(), self.else_store.as_ref())
    }

    /// Rewrite each reached side independently.
    pub(crate) fn map_sides(&self, on_then: impl Fn(&S) -> S, on_else: impl Fn(&S) -> S) -> Self {
        Self {
            then_store: self.then_store.as_ref().map(on_then),
            else_store: self.else_store.as_ref().map(on_else),
        }
    }

    pub(crate) fn swapped(&self) -> Self {
        Self {
            then_store: self.else_store.clone(),
            else_store: self.then_store.clone(),
        }
    }

    fn route(&self, rule: FlowRule) -> Self {
        match rule {
            FlowRule::EachToEach => self.clone(),
            FlowRule::ThenToBoth => Self {
                then_store: self.then_store.clone(),
                else_store: self.then_store.clone(),
            },
            FlowRule::ElseToBoth => Self {
                then_store: self.else_store.clone(),
                else_store: self.else_store.clone(),
            },
            FlowRule::ThenToThen => Self {
                then_store: self.then_store.clone(),
                else_store: None,
            },
            FlowRule::ElseToElse => Self {
                then_store: None,
                else_store: self.else_store.clone(),
            },
        }
    }

    fn merge(&self, other: &Self) -> Self {
        Self {
            then_store: join_optional(self.then_store.as_ref(), other.then_store.as_ref()),
            else_store: join_optional(self.else_store.as_ref(), other.else_store.as_ref()),
        }
    }
}

fn join_optional<S: AbstractStore>(left: Option<&S>, right: Option<&S>) -> Option<S> {
    match (left, right) {
        (Some(left), Some(right)) => Some(left.least_upper_bound(right)),
        (Some(store), None) | (None, Some(store)) => Some(store.clone()),
        (None, None) => None,
    }
}

/// Outcome of transferring one node.
pub(crate) struct NodeOutcome<V, S> {
    pub(crate) value: V,
    pub(crate) stores: TransferInput<S>,
}

/// Latest value computed for each reached node.
#[derive(Clone, Debug)]
pub(crate) struct NodeValues<V> {
    values: BTreeMap<NodeId, V>,
}

impl<V> Default for NodeValues<V> {
    fn default() -> Self {
        Self {
            values: BTreeMap::new(),
        }
    }
}

impl<V: AbstractValue> NodeValues<V> {
    pub(crate) fn get(&self, node: NodeId) -> Option<V> {
        self.values.get(&node).copied()
    }

    fn record(&mut self, node: NodeId, value: V) -> bool {
        self.values.insert(node, value) != Some(value)
    }

    pub(crate) fn len(&self) -> usize {
        self.values.len()
    }
}

/// Domain callbacks required by the fixed-point driver.
pub(crate) trait TransferFunction {
    type Value: AbstractValue;
    type Store: AbstractStore;

    fn initial_store(&self, body: &MethodBody) -> Self::Store;

    fn transfer(
        &self,
        body: &MethodBody,
        node: &Node,
        input: &TransferInput<Self::Store>,
        values: &NodeValues<Self::Value>,
    ) -> NodeOutcome<Self::Value, Self::Store>;
}

/// Fixed-point result for one body.
#[derive(Clone, Debug)]
pub(crate) struct DataflowResult<V> {
    pub(crate) values: NodeValues<V>,
    pub(crate) block_visits: usize,
}

/// Deterministic forward worklist iteration to a fixed point.
pub(crate) fn analyze_body<T>(body: &MethodBody, transfer: &T) -> Result<DataflowResult<T::Value>>
where
    T: TransferFunction,
{
    validate_graph(body)?;

    let mut inputs = vec![TransferInput::<T::Store>::unreached(); body.blocks.len()];
    inputs[0] = TransferInput::regular(transfer.initial_store(body));
    let mut values = NodeValues::default();
    let mut queue = VecDeque::from([0]);
    let mut queued = BTreeSet::from([0]);
    let mut block_visits = 0;

    while let Some(block_id) = queue.pop_front() {
        queued.remove(&block_id);
        if !inputs[block_id].is_reached() {
            continue;
        }
        block_visits += 1;

        let block = &body.blocks[block_id];
        let mut current = inputs[block_id].clone();
        let mut values_changed = false;
        for &node_id in &block.nodes {
            let node = &body.nodes[node_id];
            let outcome = transfer.transfer(body, node, &current, &values);
            values_changed |= values.record(node_id, outcome.value);
            current = outcome.stores;
        }

        for edge in &block.successors {
            let contribution = current.route(edge.rule);
            if !contribution.is_reached() {
                continue;
            }
            let merged = inputs[edge.target].merge(&contribution);
            let input_changed = merged != inputs[edge.target];
            if input_changed {
                inputs[edge.target] = merged;
            }
            if (input_changed || values_changed) && queued.insert(edge.target) {
                queue.push_back(edge.target);
            }
        }
    }

    Ok(DataflowResult {
        values,
        block_visits,
    })
}

fn validate_graph(body: &MethodBody) -> Result<()> {
    if body.blocks.is_empty() {
        anyhow::bail!("body {} has no blocks", body.name);
    }
    for (block_id, block) in body.blocks.iter().enumerate() {
        if let Some(node) = block.nodes.iter().find(|node| **node >= body.nodes.len()) {
            anyhow::bail!(
                "block {block_id} of {} references unknown node {node}",
                body.name
            );
        }
        if let Some(edge) = block
            .successors
            .iter()
            .find(|edge| edge.target >= body.blocks.len())
        {
            anyhow::bail!(
                "block {block_id} of {} jumps to unknown block {}",
                body.name,
                edge.target
            );
        }
    }
    Ok(())
}
