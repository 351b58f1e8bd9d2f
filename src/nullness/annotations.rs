use crate::ir::{FieldRef, MethodRef, VariableInfo, VariableKind};
use crate::nullness::value::Nullness;
use crate::types::annotation_simple_name;

const NULLABLE_ANNOTATIONS: &[&str] = &[
    "Nullable",
    "NullableDecl",
    "RecentlyNullable",
    "CheckForNull",
    "PolyNull",
    "MonotonicNonNull",
];

const NON_NULL_ANNOTATIONS: &[&str] = &[
    "NonNull",
    "NonNullDecl",
    "Nonnull",
    "NotNull",
    "RecentlyNonNull",
];

fn annotation_nullness(annotation: &str) -> Option<Nullness> {
    let name = annotation_simple_name(annotation);
    if NULLABLE_ANNOTATIONS.contains(&name) {
        Some(Nullness::Nullable)
    } else if NON_NULL_ANNOTATIONS.contains(&name) {
        Some(Nullness::NonNull)
    } else {
        None
    }
}

/// Nullness declared by a set of annotations, `None` when none is relevant.
///
/// Conflicting annotations meet, so `@Nullable @NonNull` reads as non-null.
pub(crate) fn from_annotations<'a>(
    annotations: impl IntoIterator<Item = &'a String>,
) -> Option<Nullness> {
    annotations
        .into_iter()
        .filter_map(|annotation| annotation_nullness(annotation))
        .reduce(Nullness::greatest_lower_bound)
}

/// What the transfer function may learn from declarations instead of code.
pub(crate) trait NullnessPolicy: Send + Sync {
    /// Declared nullness of a method's return value.
    fn method_return(&self, _method: &MethodRef) -> Option<Nullness> {
        None
    }

    fn field(&self, _field: &FieldRef) -> Option<Nullness> {
        None
    }

    /// Nullness a variable has on entry to the body.
    fn parameter(&self, _variable: &VariableInfo) -> Option<Nullness> {
        None
    }

    /// Extra methods known never to return null.
    fn returns_non_null(&self, _method: &MethodRef) -> bool {
        false
    }
}

/// Believes only the code and the built-in library tables.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct CodeOnly;

impl NullnessPolicy for CodeOnly {}

/// Additionally believes nullness annotations on methods, fields, and parameters.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct TrustAnnotations;

impl NullnessPolicy for TrustAnnotations {
    fn method_return(&self, method: &MethodRef) -> Option<Nullness> {
        from_annotations(&method.annotations)
    }

    fn field(&self, field: &FieldRef) -> Option<Nullness> {
        from_annotations(&field.annotations)
    }

    fn parameter(&self, variable: &VariableInfo) -> Option<Nullness> {
        if variable.kind != VariableKind::Parameter {
            return None;
        }
        from_annotations(&variable.annotations)
    }
}
