use anyhow::Result;
use rayon::prelude::*;
use serde_sarif::sarif::Result as SarifResult;
use tracing::warn;

use crate::engine::{AnalysisContext, unit_span_attributes};
use crate::formatstring::strict::{check_declaration, validate};
use crate::ir::AnalysisUnit;
use crate::rules::{Rule, RuleMetadata, unit_result};

/// Rule that validates calls to `@FormatMethod` methods, including forwarded format strings,
/// and the `@FormatMethod`/`@FormatString` headers of declared methods.
#[derive(Default)]
pub(crate) struct FormatStringAnnotationRule;

crate::register_rule!(FormatStringAnnotationRule);

impl Rule for FormatStringAnnotationRule {
    fn metadata(&self) -> RuleMetadata {
        RuleMetadata {
            id: "FORMAT_STRING_ANNOTATION",
            name: "Invalid @FormatMethod call",
            description: "Format strings passed to @FormatMethod methods must be provably valid",
        }
    }

    fn run(&self, context: &AnalysisContext) -> Result<Vec<SarifResult>> {
        let mut results = Vec::new();
        for unit in &context.units {
            let unit_results = context.with_span("scan.unit", &unit_span_attributes(unit), || {
                unit.format_calls
                    .par_iter()
                    .filter(|call| call.strict)
                    .filter_map(|call| {
                        let validated = validate(
                            call.method.as_ref(),
                            &call.arguments,
                            &call.scope,
                            &context.oracle,
                        );
                        match validated {
                            Ok(found) => found.map(|found| {
                                unit_result(unit, call.enclosing.as_deref(), call.line, found.message())
                            }),
                            Err(error) => {
                                warn!(
                                    source_file = %unit.source_file,
                                    line = ?call.line,
                                    "skipping @FormatMethod call: {error:#}"
                                );
                                None
                            }
                        }
                    })
                    .chain(declaration_results(unit, context))
                    .collect::<Vec<_>>()
            });
            results.extend(unit_results);
        }
        Ok(results)
    }
}

fn declaration_results<'a>(
    unit: &'a AnalysisUnit,
    context: &'a AnalysisContext,
) -> impl ParallelIterator<Item = SarifResult> + 'a {
    unit.methods.par_iter().filter_map(move |declaration| {
        let name = declaration.qualified_name();
        match check_declaration(&declaration.method, &context.oracle) {
            Ok(found) => found
                .map(|found| unit_result(unit, Some(&name), declaration.line, found.message())),
            Err(error) => {
                warn!(method = %name, "skipping @FormatMethod declaration: {error:#}");
                None
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use crate::ir::{FormatCall, LocalDeclaration, MethodDeclaration};
    use crate::test_harness::{
        STRING_DESCRIPTOR, analyze_units, format_call, format_method, local_symbol, rule_messages,
        string_literal, typed, unit, variable,
    };

    fn strict_call(arguments: Vec<crate::ir::Expr>, scope: Vec<LocalDeclaration>) -> FormatCall {
        let mut call = format_call(
            Some(format_method("(Ljava/lang/String;[Ljava/lang/Object;)V", &[&[], &[]])),
            arguments,
        );
        call.strict = true;
        call.scope = scope;
        call
    }

    fn messages(calls: Vec<FormatCall>) -> Vec<String> {
        let output = analyze_units(vec![unit(Vec::new(), calls)]).expect("run analysis");
        rule_messages(&output, "FORMAT_STRING_ANNOTATION")
    }

    #[test]
    fn format_string_annotation_rejects_mutable_locals() {
        let format = variable(local_symbol(1, "pattern", false), STRING_DESCRIPTOR);
        let scope = vec![LocalDeclaration {
            variable: 1,
            initializer: Some(string_literal("%s")),
            source: "String pattern = \"%s\";".to_string(),
        }];
        assert_eq!(
            messages(vec![strict_call(vec![format, string_literal("a")], scope)]),
            vec!["All variables passed as @FormatString must be final or effectively final"]
        );
    }

    #[test]
    fn format_string_annotation_validates_constant_locals_and_literals() {
        let format = variable(local_symbol(1, "pattern", true), STRING_DESCRIPTOR);
        let scope = vec![LocalDeclaration {
            variable: 1,
            initializer: Some(string_literal("%d")),
            source: "final String pattern = \"%d\";".to_string(),
        }];
        let calls = vec![
            strict_call(vec![format.clone(), typed("I", "count")], scope.clone()),
            strict_call(vec![format, string_literal("a")], scope),
            strict_call(vec![string_literal("%s %s"), string_literal("a")], Vec::new()),
        ];
        assert_eq!(
            messages(calls),
            vec![
                "illegal format conversion: 'java.lang.String' cannot be formatted using '%d'",
                "missing argument for format specifier '%s'",
            ]
        );
    }

    #[test]
    fn format_string_annotation_skips_unresolvable_locals() {
        let format = variable(local_symbol(9, "pattern", true), STRING_DESCRIPTOR);
        assert!(messages(vec![strict_call(vec![format], Vec::new())]).is_empty());
    }

    #[test]
    fn format_string_annotation_checks_declared_headers() {
        let declare = |descriptor: &str, annotations: &[&[&str]], line: u32| MethodDeclaration {
            method: format_method(descriptor, annotations),
            line: Some(line),
        };
        let mut checked = unit(Vec::new(), Vec::new());
        checked.methods = vec![
            declare("(Ljava/lang/String;[Ljava/lang/Object;)V", &[&[], &[]], 3),
            declare(
                "(Ljava/lang/String;Ljava/lang/String;)V",
                &[&["FormatString"], &["FormatString"]],
                4,
            ),
            declare("(Ljava/lang/Object;)V", &[&[]], 5),
        ];

        let output = analyze_units(vec![checked]).expect("run analysis");
        assert_eq!(
            rule_messages(&output, "FORMAT_STRING_ANNOTATION"),
            vec![
                "A method cannot have more than one @FormatString parameter.",
                "An @FormatMethod must contain at least one String parameter.",
            ]
        );
    }
}
