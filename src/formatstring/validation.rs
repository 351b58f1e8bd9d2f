use anyhow::Result;
use tracing::warn;

use crate::descriptor::JavaType;
use crate::formatstring::formatter::{FormatError, check_format};
use crate::formatstring::sample::{SampleValue, sample_for_expression};
use crate::ir::{Constant, Expr, ExprKind, MethodRef};
use crate::types::{OBJECT, TypeOracle};

const MOCKITO_MATCHER_OWNERS: &[&str] = &[
    "org.mockito.ArgumentMatchers",
    "org.mockito.Matchers",
    "org.mockito.Mockito",
];

/// Diagnostic produced for an invalid format call.
#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) struct ValidationResult {
    message: String,
}

impl ValidationResult {
    pub(crate) fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub(crate) fn message(&self) -> &str {
        &self.message
    }
}

/// Validates a format call whose first argument is the format string.
///
/// Returns `Ok(None)` when the call is valid or cannot be checked statically.
/// `method` is the callee when known; it only matters for the varargs check.
pub(crate) fn validate(
    method: Option<&MethodRef>,
    arguments: &[Expr],
    oracle: &dyn TypeOracle,
) -> Result<Option<ValidationResult>> {
    let Some((format, rest)) = arguments.split_first() else {
        anyhow::bail!("format validation needs the format string argument");
    };
    if is_mockito_matcher(format) {
        return Ok(None);
    }
    let Some(candidates) = constant_values(format) else {
        return Ok(None);
    };
    if let [single] = rest
        && method.is_none_or(|method| method.is_varargs)
        && is_object_array(single, oracle)
    {
        return Ok(None);
    }

    let samples: Vec<SampleValue> = rest
        .iter()
        .map(|argument| {
            sample_for_expression(argument, oracle).unwrap_or_else(|error| {
                warn!(argument = %argument.source, "no sample for format argument: {error:#}");
                SampleValue::Null
            })
        })
        .collect();
    Ok(candidates
        .iter()
        .find_map(|candidate| validate_candidate(candidate, &samples)))
}

fn validate_candidate(format: &str, samples: &[SampleValue]) -> Option<ValidationResult> {
    if let Err(error) = check_format(format, samples) {
        return Some(ValidationResult::new(error_message(&error)));
    }
    let used = minimal_argument_count(format, samples);
    (used < samples.len()).then(|| {
        ValidationResult::new(format!(
            "extra format arguments: used {used}, provided {}",
            samples.len()
        ))
    })
}

/// Smallest prefix of `samples` that still formats. Assumes all of them do.
fn minimal_argument_count(format: &str, samples: &[SampleValue]) -> usize {
    let (mut low, mut high) = (0, samples.len());
    while low < high {
        let middle = low + (high - low) / 2;
        if check_format(format, &samples[..middle]).is_ok() {
            high = middle;
        } else {
            low = middle + 1;
        }
    }
    low
}

pub(crate) fn error_message(error: &FormatError) -> String {
    match error {
        FormatError::DuplicateFlags { flags } => format!("duplicate format flags: {flags}"),
        FormatError::FlagsConversionMismatch { conversion, flags } => format!(
            "format specifier '%{conversion}' is not compatible with the given flag(s): {flags}"
        ),
        FormatError::IllegalCodePoint { code_point } => {
            format!("invalid Unicode code point: {:x}", *code_point as u32)
        }
        FormatError::IllegalConversion {
            conversion,
            argument_class,
        } => format!(
            "illegal format conversion: '{argument_class}' cannot be formatted using '%{conversion}'"
        ),
        FormatError::IllegalFlags { flags } => format!("illegal format flags: {flags}"),
        FormatError::IllegalPrecision { precision } => {
            format!("illegal format precision: {precision}")
        }
        FormatError::IllegalWidth { width } => format!("illegal format width: {width}"),
        FormatError::MissingArgument { specifier } => {
            format!("missing argument for format specifier '{specifier}'")
        }
        FormatError::MissingWidth { specifier } => format!("missing format width: {specifier}"),
        FormatError::UnknownConversion { conversion } if conversion == "l" => {
            "%l is not a valid format specifier; use %d for all integral types and %f for all floating point types".to_string()
        }
        FormatError::UnknownConversion { conversion } => {
            format!("unknown format conversion: '{conversion}'")
        }
        FormatError::UnknownFlags { flags } => format!("unknown format flag(s): {flags}"),
        FormatError::Other { message } => message.clone(),
    }
}

/// Placeholder matchers from Mockito stubbing, never real format strings.
pub(crate) fn is_mockito_matcher(format: &Expr) -> bool {
    matches!(
        &format.kind,
        ExprKind::MethodCall { method }
            if method.is_static && MOCKITO_MATCHER_OWNERS.contains(&method.owner.as_str())
    )
}

fn is_object_array(argument: &Expr, oracle: &dyn TypeOracle) -> bool {
    matches!(
        &argument.ty,
        Some(JavaType::Array(element)) if oracle.is_same_type(&element.erasure(), &JavaType::object(OBJECT))
    )
}

/// Candidate format strings: both arms of a conditional, else the constant itself.
pub(crate) fn constant_values(expr: &Expr) -> Option<Vec<String>> {
    if let ExprKind::Conditional {
        then_expr,
        else_expr,
    } = &expr.kind
    {
        let mut values = constant_values(then_expr)?;
        values.extend(constant_values(else_expr)?);
        return Some(values);
    }
    expr.constant
        .as_ref()
        .and_then(Constant::as_str)
        .map(|value| vec![value.to_string()])
}
