use anyhow::{Context, Result};

use crate::descriptor::JavaType;
use crate::formatstring::validation::{self, ValidationResult};
use crate::ir::{Constant, Expr, ExprKind, LocalDeclaration, MethodRef, SymbolKind, VariableSymbol};
use crate::types::{STRING, TypeOracle, has_annotation};

const FORMAT_METHOD: &str = "FormatMethod";
const FORMAT_STRING: &str = "FormatString";

/// Validates a call to an `@FormatMethod` whose format string need not be a literal.
///
/// A non-constant format string is accepted only when it can be traced to a
/// constant local or to the `@FormatString` parameter of the enclosing method.
pub(crate) fn validate(
    method: Option<&MethodRef>,
    arguments: &[Expr],
    scope: &[LocalDeclaration],
    oracle: &dyn TypeOracle,
) -> Result<Option<ValidationResult>> {
    let Some((format, rest)) = arguments.split_first() else {
        anyhow::bail!("format validation needs the format string argument");
    };
    if validation::is_mockito_matcher(format) {
        return Ok(None);
    }
    if format.constant.is_some() {
        return validation::validate(method, arguments, oracle);
    }

    let ExprKind::Variable(symbol) = &format.kind else {
        return Ok(Some(ValidationResult::new(format!(
            "Format strings must be either literals or variables. Other expressions are not valid.\nInvalid format string: {}",
            format.source
        ))));
    };
    if !symbol.is_final && !symbol.is_effectively_final {
        return Ok(Some(ValidationResult::new(
            "All variables passed as @FormatString must be final or effectively final",
        )));
    }

    match symbol.kind {
        SymbolKind::Parameter => validate_parameter(symbol, format, rest, oracle),
        SymbolKind::Local => {
            let Some(declaration) = scope
                .iter()
                .find(|declaration| declaration.variable == symbol.id)
            else {
                anyhow::bail!(
                    "Could not find the Tree where local variable {} is declared. This should be impossible.",
                    symbol.name
                );
            };
            validate_local(declaration, rest, oracle)
        }
        SymbolKind::Field | SymbolKind::Other => Ok(Some(ValidationResult::new(format!(
            "Variables used as format strings that are not local variables must be compile time constants.\n{} is neither a local variable nor a compile time constant.",
            format.source
        )))),
    }
}

fn validate_local(
    declaration: &LocalDeclaration,
    rest: &[Expr],
    oracle: &dyn TypeOracle,
) -> Result<Option<ValidationResult>> {
    let Some(initializer) = &declaration.initializer else {
        return Ok(Some(ValidationResult::new(format!(
            "Variables used as format strings must be initialized when they are declared.\nInvalid declaration: {}",
            declaration.source
        ))));
    };
    if initializer.constant.as_ref().and_then(Constant::as_str).is_none() {
        return Ok(Some(ValidationResult::new(format!(
            "Local format string variables must only be assigned to compile time constant values. Invalid format string assignment: {}",
            declaration.source
        ))));
    }
    let arguments: Vec<Expr> = std::iter::once(initializer.clone())
        .chain(rest.iter().cloned())
        .collect();
    validation::validate(None, &arguments, oracle)
}

fn validate_parameter(
    symbol: &VariableSymbol,
    format: &Expr,
    rest: &[Expr],
    oracle: &dyn TypeOracle,
) -> Result<Option<ValidationResult>> {
    let not_recognized = || {
        Ok(Some(ValidationResult::new(format!(
            "Format strings must be compile time constants or parameters annotated @FormatString: {}",
            format.source
        ))))
    };
    let (Some(owner), Some(index)) = (&symbol.owner, symbol.parameter_index) else {
        return not_recognized();
    };
    let signature = owner
        .method_type()
        .with_context(|| format!("parse descriptor of {}.{}", owner.owner, owner.name))?;
    if !is_format_string_parameter(owner, &signature.parameters, index, oracle) {
        return not_recognized();
    }

    let expected = &signature.parameters[index + 1..];
    if rest.len() != expected.len() {
        return Ok(Some(ValidationResult::new(format!(
            "The number of format arguments passed with an @FormatString must match the number of format arguments in the @FormatMethod header where the format string was declared.\n\tFormat args passed: {}\n\tFormat args expected: {}",
            rest.len(),
            expected.len()
        ))));
    }
    let passed: Vec<Option<JavaType>> = rest
        .iter()
        .map(|argument| argument.ty.as_ref().map(JavaType::erasure))
        .collect();
    let expected: Vec<Option<JavaType>> = expected.iter().map(|ty| Some(ty.erasure())).collect();
    let matches = passed.iter().zip(&expected).all(|pair| match pair {
        (Some(passed), Some(expected)) => oracle.is_same_type(passed, expected),
        _ => false,
    });
    if matches {
        return Ok(None);
    }
    Ok(Some(ValidationResult::new(format!(
        "The format argument types passed with an @FormatString must match the types of the format arguments in the @FormatMethod header where the format string was declared.\n\tFormat arg types passed: [{}]\n\tFormat arg types expected: [{}]",
        render_types(&passed),
        render_types(&expected)
    ))))
}

fn render_types(types: &[Option<JavaType>]) -> String {
    types
        .iter()
        .map(|ty| ty.as_ref().map_or_else(|| "<unknown>".to_string(), ToString::to_string))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Checks the header of a declared method against the `@FormatMethod` and
/// `@FormatString` contract. Parameters are visited in order and the first
/// violation wins.
pub(crate) fn check_declaration(
    method: &MethodRef,
    oracle: &dyn TypeOracle,
) -> Result<Option<ValidationResult>> {
    let signature = method
        .method_type()
        .with_context(|| format!("parse descriptor of {}.{}", method.owner, method.name))?;
    let string = JavaType::object(STRING);
    let is_format_method = has_annotation(&method.annotations, FORMAT_METHOD);
    let mut found_format_string = false;
    let mut found_string = false;
    for (index, ty) in signature.parameters.iter().enumerate() {
        let is_string = oracle.is_same_type(&ty.erasure(), &string);
        found_string |= is_string;
        if !has_annotation(method.parameter_annotations(index), FORMAT_STRING) {
            continue;
        }
        if !is_format_method {
            return Ok(Some(ValidationResult::new(format!(
                "A parameter can only be annotated @FormatString in a method annotated @FormatMethod: {}",
                render_parameter(method, index, ty)
            ))));
        }
        if !is_string {
            return Ok(Some(ValidationResult::new(
                "Only strings can be annotated @FormatString.",
            )));
        }
        if found_format_string {
            return Ok(Some(ValidationResult::new(
                "A method cannot have more than one @FormatString parameter.",
            )));
        }
        found_format_string = true;
    }
    if is_format_method && !found_string {
        return Ok(Some(ValidationResult::new(
            "An @FormatMethod must contain at least one String parameter.",
        )));
    }
    Ok(None)
}

fn render_parameter(method: &MethodRef, index: usize, ty: &JavaType) -> String {
    let rendered = format!("@FormatString {ty}");
    match method.parameters.get(index) {
        Some(parameter) if !parameter.name.is_empty() => format!("{rendered} {}", parameter.name),
        _ => rendered,
    }
}

/// Explicitly annotated, or the first `String` parameter of an `@FormatMethod`
/// when no parameter is annotated.
fn is_format_string_parameter(
    owner: &MethodRef,
    parameters: &[JavaType],
    index: usize,
    oracle: &dyn TypeOracle,
) -> bool {
    let string = JavaType::object(STRING);
    let is_string = |position: usize| {
        parameters
            .get(position)
            .is_some_and(|ty| oracle.is_same_type(&ty.erasure(), &string))
    };
    if !is_string(index) || !has_annotation(&owner.annotations, FORMAT_METHOD) {
        return false;
    }
    if has_annotation(owner.parameter_annotations(index), FORMAT_STRING) {
        return true;
    }
    let any_annotated = (0..parameters.len())
        .any(|position| has_annotation(owner.parameter_annotations(position), FORMAT_STRING));
    !any_annotated && (0..parameters.len()).find(|position| is_string(*position)) == Some(index)
}
