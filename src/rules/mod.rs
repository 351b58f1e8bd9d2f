use anyhow::Result;
use serde_sarif::sarif::{
    ArtifactLocation, Location, LogicalLocation, Message, PhysicalLocation, Region,
    Result as SarifResult,
};

use crate::engine::AnalysisContext;
use crate::ir::AnalysisUnit;

// Rule modules are generated by build.rs from the directories under src/rules.
include!(concat!(env!("OUT_DIR"), "/rule_modules.rs"));

/// Metadata describing an analysis rule.
#[derive(Clone, Debug)]
pub(crate) struct RuleMetadata {
    pub(crate) id: &'static str,
    pub(crate) name: &'static str,
    pub(crate) description: &'static str,
}

/// Rule interface for analysis execution.
pub(crate) trait Rule {
    fn metadata(&self) -> RuleMetadata;
    fn run(&self, context: &AnalysisContext) -> Result<Vec<SarifResult>>;
}

/// Wrapper struct for rule factory functions to enable inventory collection.
pub(crate) struct RuleFactory(pub fn() -> Box<dyn Rule + Sync>);

inventory::collect!(RuleFactory);

/// Macro to register a rule implementation.
///
/// Usage: `register_rule!(RuleName);`
/// This macro creates a factory function and registers it with inventory.
#[macro_export]
macro_rules! register_rule {
    ($rule_type:ty) => {
        inventory::submit! {
            $crate::rules::RuleFactory(|| Box::new(<$rule_type>::default()))
        }
    };
}

/// Returns all registered rules as boxed trait objects.
pub(crate) fn all_rules() -> Vec<Box<dyn Rule + Sync>> {
    inventory::iter::<RuleFactory>
        .into_iter()
        .map(|factory| (factory.0)())
        .collect()
}

/// Location inside a unit's source file, optionally naming the enclosing body.
pub(crate) fn unit_location(
    unit: &AnalysisUnit,
    enclosing: Option<&str>,
    line: Option<u32>,
) -> Location {
    let artifact_location = ArtifactLocation::builder()
        .uri(unit.source_file.clone())
        .build();
    let physical = match line {
        Some(line) => PhysicalLocation::builder()
            .artifact_location(artifact_location)
            .region(Region::builder().start_line(i64::from(line)).build())
            .build(),
        None => PhysicalLocation::builder()
            .artifact_location(artifact_location)
            .build(),
    };
    match enclosing {
        Some(name) => Location::builder()
            .logical_locations(vec![body_logical_location(name)])
            .physical_location(physical)
            .build(),
        None => Location::builder().physical_location(physical).build(),
    }
}

pub(crate) fn body_logical_location(name: &str) -> LogicalLocation {
    LogicalLocation::builder()
        .name(name.to_string())
        .kind("function")
        .build()
}

pub(crate) fn result_message(text: impl Into<String>) -> Message {
    Message::builder().text(text.into()).build()
}

/// Builds one SARIF result at a unit location.
pub(crate) fn unit_result(
    unit: &AnalysisUnit,
    enclosing: Option<&str>,
    line: Option<u32>,
    text: impl Into<String>,
) -> SarifResult {
    SarifResult::builder()
        .message(result_message(text))
        .locations(vec![unit_location(unit, enclosing, line)])
        .build()
}
