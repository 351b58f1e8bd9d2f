use std::sync::Arc;

use anyhow::Result;
use opentelemetry::KeyValue;
use rayon::prelude::*;
use serde_sarif::sarif::{MultiformatMessageString, ReportingDescriptor, Result as SarifResult};
use tracing::debug;

use crate::ir::AnalysisUnit;
use crate::rules::{Rule, RuleMetadata, all_rules};
use crate::telemetry::{Telemetry, add_current_span_event, with_span};
use crate::types::ClassHierarchy;

/// Inputs shared by analysis rules.
pub(crate) struct AnalysisContext {
    pub(crate) units: Vec<AnalysisUnit>,
    pub(crate) oracle: ClassHierarchy,
    telemetry: Option<Arc<Telemetry>>,
}

/// Analysis engine that executes registered rules.
pub(crate) struct Engine {
    rules: Vec<Box<dyn Rule + Sync>>,
}

impl Engine {
    pub(crate) fn new() -> Self {
        let mut rules = all_rules();
        rules.sort_by(|a, b| a.metadata().id.cmp(b.metadata().id));
        Self { rules }
    }

    pub(crate) fn analyze(&self, context: &AnalysisContext) -> Result<EngineOutput> {
        let per_rule = self
            .rules
            .par_iter()
            .map(|rule| -> Result<(ReportingDescriptor, Vec<SarifResult>)> {
                let metadata = rule.metadata();
                let rule_span_attributes = [KeyValue::new("dataflint.rule_id", metadata.id)];
                let mut rule_results = context.with_span(
                    &format!("rule:{}", metadata.id),
                    &rule_span_attributes,
                    || -> Result<Vec<SarifResult>> {
                        let results = rule.run(context)?;
                        add_current_span_event(
                            "dataflint.rule.finished",
                            &[KeyValue::new("dataflint.result_count", results.len() as i64)],
                        );
                        Ok(results)
                    },
                )?;
                for result in &mut rule_results {
                    if result.rule_id.is_none() {
                        result.rule_id = Some(metadata.id.to_string());
                    }
                }
                debug!(rule = metadata.id, results = rule_results.len(), "rule finished");
                Ok((rule_descriptor(&metadata), rule_results))
            })
            .collect::<Result<Vec<_>>>()?;

        let mut rules = Vec::with_capacity(per_rule.len());
        let mut results = Vec::new();
        for (descriptor, rule_results) in per_rule {
            rules.push(descriptor);
            results.extend(rule_results);
        }

        results.sort_by(|left, right| {
            let left_id = left.rule_id.as_deref().unwrap_or("");
            let right_id = right.rule_id.as_deref().unwrap_or("");
            let left_msg = left.message.text.as_deref().unwrap_or("");
            let right_msg = right.message.text.as_deref().unwrap_or("");
            left_id.cmp(right_id).then(left_msg.cmp(right_msg))
        });

        Ok(EngineOutput { rules, results })
    }
}

/// Aggregated SARIF payload from rule execution.
pub(crate) struct EngineOutput {
    pub(crate) rules: Vec<ReportingDescriptor>,
    pub(crate) results: Vec<SarifResult>,
}

/// Shares the units with the rules and builds the type oracle from their classes.
pub(crate) fn build_context(
    units: Vec<AnalysisUnit>,
    telemetry: Option<Arc<Telemetry>>,
) -> AnalysisContext {
    let oracle = with_span(
        telemetry.as_deref(),
        "class_hierarchy",
        &[KeyValue::new("dataflint.phase", "class_hierarchy")],
        || {
            let mut oracle = ClassHierarchy::with_builtins();
            oracle.extend(units.iter().flat_map(|unit| unit.classes.iter()));
            oracle
        },
    );
    debug!(
        units = units.len(),
        classes = oracle.class_count(),
        "analysis context ready"
    );
    AnalysisContext {
        units,
        oracle,
        telemetry,
    }
}

fn rule_descriptor(metadata: &RuleMetadata) -> ReportingDescriptor {
    ReportingDescriptor::builder()
        .id(metadata.id)
        .name(metadata.name)
        .short_description(
            MultiformatMessageString::builder()
                .text(metadata.description)
                .build(),
        )
        .build()
}

impl AnalysisContext {
    pub(crate) fn telemetry(&self) -> Option<&Telemetry> {
        self.telemetry.as_deref()
    }

    pub(crate) fn with_span<T, F>(&self, name: &str, attributes: &[KeyValue], f: F) -> T
    where
        F: FnOnce() -> T,
    {
        with_span(self.telemetry(), name, attributes, f)
    }
}

/// Span attributes identifying a unit.
pub(crate) fn unit_span_attributes(unit: &AnalysisUnit) -> [KeyValue; 1] {
    [KeyValue::new("dataflint.source_file", unit.source_file.clone())]
}
