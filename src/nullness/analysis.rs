use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use tracing::debug;

use crate::dataflow::worklist::{DataflowResult, analyze_body};
use crate::ir::{MethodBody, TreeId};
use crate::nullness::annotations::{CodeOnly, NullnessPolicy, TrustAnnotations};
use crate::nullness::transfer::NullnessTransfer;
use crate::nullness::value::Nullness;

/// Expression to query: the enclosing body's name and the expression's tree id.
#[derive(Clone, Copy, Debug)]
pub(crate) struct ExpressionPosition<'a> {
    pub(crate) body: &'a str,
    pub(crate) tree: TreeId,
}

/// Entry point for nullness queries.
///
/// Results are memoized per body name for the lifetime of the value, so one
/// instance should cover bodies with distinct names (one analysis unit).
pub(crate) struct NullnessAnalysis {
    policy: Box<dyn NullnessPolicy>,
    results: Mutex<BTreeMap<String, Arc<DataflowResult<Nullness>>>>,
}

impl NullnessAnalysis {
    /// Believes code and library tables, never annotations.
    pub(crate) fn standard() -> Self {
        Self::with_policy(Box::new(CodeOnly))
    }

    /// Also believes nullness annotations on parameters, fields, and returns.
    pub(crate) fn trusting() -> Self {
        Self::with_policy(Box::new(TrustAnnotations))
    }

    pub(crate) fn with_policy(policy: Box<dyn NullnessPolicy>) -> Self {
        Self {
            policy,
            results: Mutex::new(BTreeMap::new()),
        }
    }

    /// Fixed-point values for every reached node of `body`.
    pub(crate) fn analyze(&self, body: &MethodBody) -> Result<Arc<DataflowResult<Nullness>>> {
        if let Some(result) = self.lock_results()?.get(&body.name) {
            return Ok(Arc::clone(result));
        }
        let transfer = NullnessTransfer::new(self.policy.as_ref());
        let result = analyze_body(body, &transfer)
            .with_context(|| format!("nullness analysis of {}", body.name))?;
        debug!(
            body = %body.name,
            block_visits = result.block_visits,
            reached_nodes = result.values.len(),
            "nullness fixed point"
        );
        let mut results = self.lock_results()?;
        let entry = results
            .entry(body.name.clone())
            .or_insert_with(|| Arc::new(result));
        Ok(Arc::clone(entry))
    }

    /// Nullness of the expression at `position`, looked up among `bodies`.
    ///
    /// The value joins every node produced for the expression; an expression
    /// whose nodes are never reached is `Bottom`.
    pub(crate) fn get_nullness(
        &self,
        position: &ExpressionPosition<'_>,
        bodies: &[MethodBody],
    ) -> Result<Nullness> {
        let Some(body) = bodies.iter().find(|body| body.name == position.body) else {
            anyhow::bail!("no body named {} in scope", position.body);
        };
        let nodes = body.nodes_for_tree(position.tree);
        if nodes.is_empty() {
            anyhow::bail!("tree {} is not part of {}", position.tree, body.name);
        }
        let result = self.analyze(body)?;
        Ok(nodes
            .into_iter()
            .filter_map(|node| result.values.get(node))
            .fold(Nullness::Bottom, Nullness::least_upper_bound))
    }

    fn lock_results(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, BTreeMap<String, Arc<DataflowResult<Nullness>>>>> {
        self.results
            .lock()
            .map_err(|_| anyhow::anyhow!("nullness result cache poisoned"))
    }
}
