use anyhow::Result;
use rayon::prelude::*;
use serde_sarif::sarif::Result as SarifResult;
use tracing::warn;

use crate::engine::{AnalysisContext, unit_span_attributes};
use crate::formatstring::validation::validate;
use crate::rules::{Rule, RuleMetadata, unit_result};

/// Rule that checks constant format strings against their arguments.
#[derive(Default)]
pub(crate) struct FormatStringRule;

crate::register_rule!(FormatStringRule);

impl Rule for FormatStringRule {
    fn metadata(&self) -> RuleMetadata {
        RuleMetadata {
            id: "FORMAT_STRING",
            name: "Invalid format string",
            description: "Format string would throw or ignore arguments when formatted",
        }
    }

    fn run(&self, context: &AnalysisContext) -> Result<Vec<SarifResult>> {
        let mut results = Vec::new();
        for unit in &context.units {
            let unit_results = context.with_span("scan.unit", &unit_span_attributes(unit), || {
                unit.format_calls
                    .par_iter()
                    .filter(|call| !call.strict)
                    .filter_map(|call| {
                        match validate(call.method.as_ref(), &call.arguments, &context.oracle) {
                            Ok(found) => found.map(|found| {
                                unit_result(unit, call.enclosing.as_deref(), call.line, found.message())
                            }),
                            Err(error) => {
                                warn!(
                                    source_file = %unit.source_file,
                                    line = ?call.line,
                                    "skipping format call: {error:#}"
                                );
                                None
                            }
                        }
                    })
                    .collect::<Vec<_>>()
            });
            results.extend(unit_results);
        }
        Ok(results)
    }
}
