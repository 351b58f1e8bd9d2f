use std::collections::BTreeSet;

use anyhow::Result;
use serde_sarif::sarif::Result as SarifResult;
use tracing::warn;

use crate::engine::{AnalysisContext, unit_span_attributes};
use crate::ir::{AnalysisUnit, MethodBody, NodeId, NodeKind};
use crate::nullness::analysis::{ExpressionPosition, NullnessAnalysis};
use crate::nullness::value::Nullness;
use crate::rules::{Rule, RuleMetadata, unit_result};

/// Rule that reports dereferences of values the nullness analysis proves null.
#[derive(Default)]
pub(crate) struct NullDereferenceRule;

crate::register_rule!(NullDereferenceRule);

impl Rule for NullDereferenceRule {
    fn metadata(&self) -> RuleMetadata {
        RuleMetadata {
            id: "NULL_DEREFERENCE",
            name: "Null dereference",
            description: "Field read or method call on a value that is always null",
        }
    }

    fn run(&self, context: &AnalysisContext) -> Result<Vec<SarifResult>> {
        let mut results = Vec::new();
        for unit in &context.units {
            let unit_results = context.with_span(
                "scan.unit",
                &unit_span_attributes(unit),
                || -> Result<Vec<SarifResult>> {
                    let analysis = NullnessAnalysis::standard();
                    let mut unit_results = Vec::new();
                    for body in &unit.bodies {
                        if let Err(error) = analysis.analyze(body) {
                            warn!(body = %body.name, "skipping body: {error:#}");
                            continue;
                        }
                        unit_results.extend(check_body(unit, body, &analysis)?);
                    }
                    Ok(unit_results)
                },
            )?;
            results.extend(unit_results);
        }
        Ok(results)
    }
}

fn check_body(
    unit: &AnalysisUnit,
    body: &MethodBody,
    analysis: &NullnessAnalysis,
) -> Result<Vec<SarifResult>> {
    let bodies = std::slice::from_ref(body);
    let mut reported = BTreeSet::new();
    let mut results = Vec::new();
    for node in &body.nodes {
        let (receiver, action) = match &node.kind {
            NodeKind::MethodInvocation {
                receiver: Some(receiver),
                method: Some(method),
                ..
            } => (*receiver, format!("calling {}.{}()", method.owner, method.name)),
            NodeKind::FieldAccess {
                receiver: Some(receiver),
                field: Some(field),
            } => (*receiver, format!("reading {}.{}", field.owner, field.name)),
            _ => continue,
        };
        let Some(tree) = body.node(receiver).and_then(|receiver| receiver.tree) else {
            continue;
        };
        if !reported.insert(tree) {
            continue;
        }
        let position = ExpressionPosition {
            body: &body.name,
            tree,
        };
        if analysis.get_nullness(&position, bodies)? != Nullness::Null {
            continue;
        }
        results.push(unit_result(
            unit,
            Some(&body.name),
            node.line.or(body.line),
            format!(
                "Null dereference: {} is always null when {action} in {}",
                describe(body, receiver),
                body.name
            ),
        ));
    }
    Ok(results)
}

fn describe(body: &MethodBody, node: NodeId) -> String {
    match body.node(node).map(|node| &node.kind) {
        Some(NodeKind::LocalVariable { variable }) => body
            .variable(*variable)
            .map(|variable| format!("'{}'", variable.name))
            .unwrap_or_else(|| "the receiver".to_string()),
        Some(NodeKind::NullLiteral) => "the null literal".to_string(),
        _ => "the receiver".to_string(),
    }
}
