use anyhow::Result;
use serde_sarif::sarif::Result as SarifResult;
use tracing::warn;

use crate::engine::{AnalysisContext, unit_span_attributes};
use crate::ir::{AnalysisUnit, MethodBody, NodeId, NodeKind};
use crate::nullness::analysis::{ExpressionPosition, NullnessAnalysis};
use crate::nullness::value::Nullness;
use crate::rules::{Rule, RuleMetadata, unit_result};

/// Rule that reports `== null` and `!= null` checks on values known to be non-null.
///
/// Nullness annotations are trusted here, so a check on an `@NonNull`
/// parameter counts as redundant.
#[derive(Default)]
pub(crate) struct RedundantNullCheckRule;

crate::register_rule!(RedundantNullCheckRule);

impl Rule for RedundantNullCheckRule {
    fn metadata(&self) -> RuleMetadata {
        RuleMetadata {
            id: "REDUNDANT_NULL_CHECK",
            name: "Redundant null check",
            description: "Comparison against null of a value that is never null",
        }
    }

    fn run(&self, context: &AnalysisContext) -> Result<Vec<SarifResult>> {
        let mut results = Vec::new();
        for unit in &context.units {
            let unit_results = context.with_span(
                "scan.unit",
                &unit_span_attributes(unit),
                || -> Result<Vec<SarifResult>> {
                    let analysis = NullnessAnalysis::trusting();
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
    let mut results = Vec::new();
    for node in &body.nodes {
        let (NodeKind::EqualTo { left, right } | NodeKind::NotEqual { left, right }) = &node.kind
        else {
            continue;
        };
        let operand = match (is_null_literal(body, *left), is_null_literal(body, *right)) {
            (false, true) => *left,
            (true, false) => *right,
            _ => continue,
        };
        let Some(tree) = body.node(operand).and_then(|operand| operand.tree) else {
            continue;
        };
        let position = ExpressionPosition {
            body: &body.name,
            tree,
        };
        if analysis.get_nullness(&position, bodies)? != Nullness::NonNull {
            continue;
        }
        results.push(unit_result(
            unit,
            Some(&body.name),
            node.line.or(body.line),
            format!(
                "Redundant null check: {} is never null in {}",
                describe(body, operand),
                body.name
            ),
        ));
    }
    Ok(results)
}

fn is_null_literal(body: &MethodBody, node: NodeId) -> bool {
    matches!(body.node(node).map(|node| &node.kind), Some(NodeKind::NullLiteral))
}

fn describe(body: &MethodBody, node: NodeId) -> String {
    match body.node(node).map(|node| &node.kind) {
        Some(NodeKind::LocalVariable { variable }) => body
            .variable(*variable)
            .map(|variable| format!("'{}'", variable.name))
            .unwrap_or_else(|| "the value".to_string()),
        Some(NodeKind::MethodInvocation {
            method: Some(method),
            ..
        }) => format!("the result of {}.{}()", method.owner, method.name),
        _ => "the value".to_string(),
    }
}
