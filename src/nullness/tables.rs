//! Curated facts about well-known library members.
//!
//! Argument indexes may be negative, counting from the end of the argument list.

/// Calls that throw unless the argument at the index is non-null.
const REQUIRED_NON_NULL_PARAMETERS: &[(&str, &str, i32)] = &[
    ("java.util.Objects", "requireNonNull", 0),
    ("com.google.common.base.Preconditions", "checkNotNull", 0),
    ("com.google.common.base.Verify", "verifyNotNull", 0),
    ("junit.framework.Assert", "assertNotNull", -1),
    ("org.junit.Assert", "assertNotNull", -1),
];

/// Predicates returning true whenever the argument is null.
const NULL_IMPLIES_TRUE_PARAMETERS: &[(&str, &str, i32)] = &[
    ("com.google.common.base.Strings", "isNullOrEmpty", 0),
    ("android.text.TextUtils", "isEmpty", 0),
];

/// Predicates returning true exactly when the argument is non-null.
const NONNULL_IFF_TRUE_PARAMETERS: &[(&str, &str, i32)] = &[("java.util.Objects", "nonNull", 0)];

/// Predicates returning true exactly when the argument is null.
const NULL_IFF_TRUE_PARAMETERS: &[(&str, &str, i32)] = &[("java.util.Objects", "isNull", 0)];

/// Classes whose static final fields are all non-null constants.
const CLASSES_WITH_NON_NULL_CONSTANTS: &[&str] = &[
    "java.math.BigInteger",
    "java.math.BigDecimal",
    "com.google.common.primitives.UnsignedInteger",
    "com.google.common.primitives.UnsignedLong",
    "java.nio.charset.StandardCharsets",
];

/// Classes none of whose methods return null.
const CLASSES_WITH_NON_NULLABLE_RETURNS: &[&str] = &[
    "com.google.common.base.Optional",
    "com.google.common.base.Preconditions",
    "com.google.common.base.Verify",
    "java.lang.String",
    "java.math.BigInteger",
    "java.math.BigDecimal",
    "com.google.common.primitives.UnsignedInteger",
    "com.google.common.primitives.UnsignedLong",
    "java.util.Objects",
];

const CLASSES_WITH_NON_NULLABLE_VALUE_OF_METHODS: &[&str] = &[
    "java.lang.Boolean",
    "java.lang.Byte",
    "java.lang.Character",
    "java.lang.Double",
    "java.lang.Enum",
    "java.lang.Float",
    "java.lang.Integer",
    "java.lang.Long",
    "java.lang.Short",
    "java.lang.String",
];

const METHODS_WITH_NON_NULLABLE_RETURNS: &[(&str, &str)] = &[
    ("com.google.common.io.Files", "toString"),
    ("java.lang.Class", "getName"),
    ("java.lang.Class", "getSimpleName"),
    ("java.lang.Class", "forName"),
    ("java.nio.charset.Charset", "forName"),
];

fn indexes<'a>(
    table: &'a [(&'a str, &'a str, i32)],
    owner: &'a str,
    name: &'a str,
) -> impl Iterator<Item = i32> + 'a {
    table
        .iter()
        .filter(move |(class, method, _)| *class == owner && *method == name)
        .map(|(_, _, index)| *index)
}

pub(crate) fn required_non_null_parameters<'a>(
    owner: &'a str,
    name: &'a str,
) -> impl Iterator<Item = i32> + 'a {
    indexes(REQUIRED_NON_NULL_PARAMETERS, owner, name)
}

pub(crate) fn null_implies_true_parameters<'a>(
    owner: &'a str,
    name: &'a str,
) -> impl Iterator<Item = i32> + 'a {
    indexes(NULL_IMPLIES_TRUE_PARAMETERS, owner, name)
}

pub(crate) fn nonnull_iff_true_parameters<'a>(
    owner: &'a str,
    name: &'a str,
) -> impl Iterator<Item = i32> + 'a {
    indexes(NONNULL_IFF_TRUE_PARAMETERS, owner, name)
}

pub(crate) fn null_iff_true_parameters<'a>(
    owner: &'a str,
    name: &'a str,
) -> impl Iterator<Item = i32> + 'a {
    indexes(NULL_IFF_TRUE_PARAMETERS, owner, name)
}

pub(crate) fn has_non_null_constants(owner: &str) -> bool {
    CLASSES_WITH_NON_NULL_CONSTANTS.contains(&owner)
}

pub(crate) fn is_known_non_null_return(owner: &str, name: &str) -> bool {
    (name == "valueOf" && CLASSES_WITH_NON_NULLABLE_VALUE_OF_METHODS.contains(&owner))
        || CLASSES_WITH_NON_NULLABLE_RETURNS.contains(&owner)
        || METHODS_WITH_NON_NULLABLE_RETURNS.contains(&(owner, name))
}

/// Resolve a possibly negative argument index against the argument count.
pub(crate) fn resolve_index(index: i32, argument_count: usize) -> Option<usize> {
    if index >= 0 {
        let index = index as usize;
        return (index < argument_count).then_some(index);
    }
    argument_count.checked_sub(index.unsigned_abs() as usize)
}
