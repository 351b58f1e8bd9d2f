use std::collections::{BTreeMap, BTreeSet, VecDeque};

use crate::descriptor::{JavaType, PrimitiveKind};
use crate::ir::ClassInfo;

pub(crate) const OBJECT: &str = "java.lang.Object";
pub(crate) const STRING: &str = "java.lang.String";

/// Type queries the engines need from the host's symbol table.
pub(crate) trait TypeOracle {
    fn is_same_type(&self, left: &JavaType, right: &JavaType) -> bool;
    fn is_subtype(&self, sub: &JavaType, sup: &JavaType) -> bool;

    /// Unboxed primitive for a wrapper class, otherwise the type itself.
    fn unboxed_or_self(&self, ty: &JavaType) -> JavaType {
        ty.class_name()
            .and_then(PrimitiveKind::from_boxed_class)
            .map(JavaType::Primitive)
            .unwrap_or_else(|| ty.clone())
    }
}

/// JDK types the engines reason about, with their direct supertypes.
const BUILTIN_CLASSES: &[(&str, &[&str])] = &[
    ("java.lang.Object", &[]),
    ("java.lang.CharSequence", &[]),
    ("java.lang.Comparable", &[]),
    ("java.lang.Cloneable", &[]),
    ("java.io.Serializable", &[]),
    ("java.util.Formattable", &[]),
    (
        "java.lang.String",
        &["java.lang.CharSequence", "java.lang.Comparable", "java.io.Serializable"],
    ),
    ("java.lang.Number", &["java.io.Serializable"]),
    ("java.lang.Boolean", &["java.lang.Comparable", "java.io.Serializable"]),
    ("java.lang.Character", &["java.lang.Comparable", "java.io.Serializable"]),
    ("java.lang.Byte", &["java.lang.Number", "java.lang.Comparable"]),
    ("java.lang.Short", &["java.lang.Number", "java.lang.Comparable"]),
    ("java.lang.Integer", &["java.lang.Number", "java.lang.Comparable"]),
    ("java.lang.Long", &["java.lang.Number", "java.lang.Comparable"]),
    ("java.lang.Float", &["java.lang.Number", "java.lang.Comparable"]),
    ("java.lang.Double", &["java.lang.Number", "java.lang.Comparable"]),
    ("java.math.BigDecimal", &["java.lang.Number", "java.lang.Comparable"]),
    ("java.math.BigInteger", &["java.lang.Number", "java.lang.Comparable"]),
    ("java.util.concurrent.atomic.AtomicInteger", &["java.lang.Number"]),
    ("java.util.concurrent.atomic.AtomicLong", &["java.lang.Number"]),
    ("java.lang.Enum", &["java.lang.Comparable", "java.io.Serializable"]),
    (
        "java.util.Date",
        &["java.io.Serializable", "java.lang.Cloneable", "java.lang.Comparable"],
    ),
    ("java.sql.Date", &["java.util.Date"]),
    ("java.sql.Time", &["java.util.Date"]),
    ("java.sql.Timestamp", &["java.util.Date"]),
    (
        "java.util.Calendar",
        &["java.io.Serializable", "java.lang.Cloneable", "java.lang.Comparable"],
    ),
    ("java.util.GregorianCalendar", &["java.util.Calendar"]),
    ("java.time.temporal.TemporalAccessor", &[]),
    ("java.time.temporal.TemporalAdjuster", &[]),
    (
        "java.time.temporal.Temporal",
        &["java.time.temporal.TemporalAccessor"],
    ),
    (
        "java.time.chrono.ChronoLocalDateTime",
        &["java.time.temporal.Temporal", "java.time.temporal.TemporalAdjuster"],
    ),
    (
        "java.time.chrono.ChronoLocalDate",
        &["java.time.temporal.Temporal", "java.time.temporal.TemporalAdjuster"],
    ),
    (
        "java.time.chrono.ChronoZonedDateTime",
        &["java.time.temporal.Temporal"],
    ),
    ("java.time.LocalDateTime", &["java.time.chrono.ChronoLocalDateTime"]),
    ("java.time.LocalDate", &["java.time.chrono.ChronoLocalDate"]),
    ("java.time.ZonedDateTime", &["java.time.chrono.ChronoZonedDateTime"]),
    (
        "java.time.LocalTime",
        &["java.time.temporal.Temporal", "java.time.temporal.TemporalAdjuster"],
    ),
    (
        "java.time.Instant",
        &["java.time.temporal.Temporal", "java.time.temporal.TemporalAdjuster"],
    ),
    (
        "java.time.OffsetDateTime",
        &["java.time.temporal.Temporal", "java.time.temporal.TemporalAdjuster"],
    ),
    (
        "java.time.OffsetTime",
        &["java.time.temporal.Temporal", "java.time.temporal.TemporalAdjuster"],
    ),
    (
        "java.time.Year",
        &["java.time.temporal.Temporal", "java.time.temporal.TemporalAdjuster"],
    ),
    (
        "java.time.YearMonth",
        &["java.time.temporal.Temporal", "java.time.temporal.TemporalAdjuster"],
    ),
    (
        "java.time.MonthDay",
        &["java.time.temporal.TemporalAccessor", "java.time.temporal.TemporalAdjuster"],
    ),
    (
        "java.time.DayOfWeek",
        &["java.lang.Enum", "java.time.temporal.TemporalAccessor"],
    ),
    (
        "java.time.Month",
        &["java.lang.Enum", "java.time.temporal.TemporalAccessor"],
    ),
];

/// Class hierarchy built from JDK builtins plus the classes of the analyzed units.
#[derive(Clone, Debug)]
pub(crate) struct ClassHierarchy {
    supertypes: BTreeMap<String, Vec<String>>,
}

impl ClassHierarchy {
    pub(crate) fn with_builtins() -> Self {
        let supertypes = BUILTIN_CLASSES
            .iter()
            .map(|(name, supers)| {
                (
                    name.to_string(),
                    supers.iter().map(|value| value.to_string()).collect(),
                )
            })
            .collect();
        Self { supertypes }
    }

    pub(crate) fn extend<'a>(&mut self, classes: impl IntoIterator<Item = &'a ClassInfo>) {
        for class in classes {
            let entry = self.supertypes.entry(class.name.clone()).or_default();
            for parent in class.super_name.iter().chain(class.interfaces.iter()) {
                if !entry.contains(parent) {
                    entry.push(parent.clone());
                }
            }
        }
    }

    pub(crate) fn class_count(&self) -> usize {
        self.supertypes.len()
    }

    /// Whether `sub` names `sup` or transitively extends/implements it.
    pub(crate) fn is_subclass(&self, sub: &str, sup: &str) -> bool {
        if sub == sup || sup == OBJECT {
            return true;
        }
        let mut queue = VecDeque::from([sub]);
        let mut seen = BTreeSet::new();
        while let Some(current) = queue.pop_front() {
            if !seen.insert(current) {
                continue;
            }
            let Some(parents) = self.supertypes.get(current) else {
                continue;
            };
            for parent in parents {
                if parent == sup {
                    return true;
                }
                queue.push_back(parent.as_str());
            }
        }
        false
    }
}

impl TypeOracle for ClassHierarchy {
    fn is_same_type(&self, left: &JavaType, right: &JavaType) -> bool {
        left == right
    }

    fn is_subtype(&self, sub: &JavaType, sup: &JavaType) -> bool {
        match (sub, sup) {
            (JavaType::Null, sup) => sup.is_reference(),
            (JavaType::Primitive(sub), JavaType::Primitive(sup)) => primitive_widens(*sub, *sup),
            (JavaType::Array(_), JavaType::Class { name, .. }) => matches!(
                name.as_str(),
                OBJECT | "java.lang.Cloneable" | "java.io.Serializable"
            ),
            (JavaType::Array(sub), JavaType::Array(sup)) => {
                if sub.is_primitive() || sup.is_primitive() {
                    sub == sup
                } else {
                    self.is_subtype(sub, sup)
                }
            }
            (JavaType::Class { name: sub, .. }, JavaType::Class { name: sup, .. }) => {
                self.is_subclass(sub, sup)
            }
            _ => false,
        }
    }
}

fn primitive_widens(sub: PrimitiveKind, sup: PrimitiveKind) -> bool {
    use PrimitiveKind::*;
    if sub == sup {
        return true;
    }
    match sub {
        Byte => matches!(sup, Short | Int | Long | Float | Double),
        Short | Char => matches!(sup, Int | Long | Float | Double),
        Int => matches!(sup, Long | Float | Double),
        Long => matches!(sup, Float | Double),
        Float => matches!(sup, Double),
        Boolean | Double => false,
    }
}

/// Simple name of an annotation, tolerating `@`, package, and nesting prefixes.
pub(crate) fn annotation_simple_name(annotation: &str) -> &str {
    let trimmed = annotation.trim_start_matches('@');
    trimmed
        .rsplit(|c: char| matches!(c, '.' | '$' | '/'))
        .next()
        .unwrap_or(trimmed)
        .trim_end_matches(';')
}

pub(crate) fn has_annotation(annotations: &[String], simple_name: &str) -> bool {
    annotations
        .iter()
        .any(|annotation| annotation_simple_name(annotation) == simple_name)
}
