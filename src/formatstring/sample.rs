use anyhow::Result;

use crate::descriptor::{JavaType, PrimitiveKind};
use crate::ir::{Constant, Expr};
use crate::types::{OBJECT, STRING, TypeOracle};

const LAZY_ARG: &str = "com.google.common.flogger.LazyArg";

/// Representative runtime value of a format argument.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum SampleValue {
    Null,
    Boolean(bool),
    Byte(i8),
    Short(i16),
    Int(i32),
    Long(i64),
    Char(char),
    Float(f32),
    Double(f64),
    String(String),
    BigDecimal,
    BigInteger,
    Date,
    Calendar,
    LocalDateTime,
    /// Any other reference, known only by its runtime class.
    Object { class_name: String },
}

impl SampleValue {
    /// Runtime class the platform would name in a conversion error.
    pub(crate) fn class_name(&self) -> &str {
        match self {
            SampleValue::Null => "null",
            SampleValue::Boolean(_) => "java.lang.Boolean",
            SampleValue::Byte(_) => "java.lang.Byte",
            SampleValue::Short(_) => "java.lang.Short",
            SampleValue::Int(_) => "java.lang.Integer",
            SampleValue::Long(_) => "java.lang.Long",
            SampleValue::Char(_) => "java.lang.Character",
            SampleValue::Float(_) => "java.lang.Float",
            SampleValue::Double(_) => "java.lang.Double",
            SampleValue::String(_) => STRING,
            SampleValue::BigDecimal => "java.math.BigDecimal",
            SampleValue::BigInteger => "java.math.BigInteger",
            SampleValue::Date => "java.util.Date",
            SampleValue::Calendar => "java.util.GregorianCalendar",
            SampleValue::LocalDateTime => "java.time.LocalDateTime",
            SampleValue::Object { class_name } => class_name,
        }
    }

    fn object(class_name: &str) -> Self {
        SampleValue::Object {
            class_name: class_name.to_string(),
        }
    }
}

impl From<&Constant> for SampleValue {
    fn from(constant: &Constant) -> Self {
        match constant {
            Constant::Boolean(value) => SampleValue::Boolean(*value),
            Constant::Byte(value) => SampleValue::Byte(*value),
            Constant::Short(value) => SampleValue::Short(*value),
            Constant::Int(value) => SampleValue::Int(*value),
            Constant::Long(value) => SampleValue::Long(*value),
            Constant::Char(value) => SampleValue::Char(*value),
            Constant::Float(value) => SampleValue::Float(*value),
            Constant::Double(value) => SampleValue::Double(*value),
            Constant::String(value) => SampleValue::String(value.clone()),
        }
    }
}

fn primitive_sample(kind: PrimitiveKind) -> SampleValue {
    match kind {
        PrimitiveKind::Boolean => SampleValue::Boolean(false),
        PrimitiveKind::Byte => SampleValue::Byte(1),
        PrimitiveKind::Short => SampleValue::Short(2),
        PrimitiveKind::Int => SampleValue::Int(3),
        PrimitiveKind::Long => SampleValue::Long(4),
        PrimitiveKind::Char => SampleValue::Char('c'),
        PrimitiveKind::Float => SampleValue::Float(5.0),
        PrimitiveKind::Double => SampleValue::Double(6.0),
    }
}

/// Reference categories recognized by subtyping, checked in order.
const SUBTYPE_CATEGORIES: &[&str] = &[
    STRING,
    "java.math.BigDecimal",
    "java.math.BigInteger",
    "java.util.Date",
    "java.util.Calendar",
    "java.time.temporal.TemporalAccessor",
];

fn category_sample(category: &str) -> SampleValue {
    match category {
        STRING => SampleValue::String("string".to_string()),
        "java.math.BigDecimal" => SampleValue::BigDecimal,
        "java.math.BigInteger" => SampleValue::BigInteger,
        "java.util.Date" => SampleValue::Date,
        "java.util.Calendar" => SampleValue::Calendar,
        _ => SampleValue::LocalDateTime,
    }
}

/// Sample for an argument: its constant value if it has one, else one for its type.
pub(crate) fn sample_for_expression(expr: &Expr, oracle: &dyn TypeOracle) -> Result<SampleValue> {
    match &expr.constant {
        Some(constant) => Ok(SampleValue::from(constant)),
        None => sample_for(expr.ty.as_ref(), oracle),
    }
}

/// Sample value for a static type. An absent type or the null type gives `Null`.
pub(crate) fn sample_for(ty: Option<&JavaType>, oracle: &dyn TypeOracle) -> Result<SampleValue> {
    let Some(ty) = ty else {
        return Ok(SampleValue::Null);
    };
    if matches!(ty, JavaType::Null | JavaType::Void) {
        return Ok(SampleValue::Null);
    }
    if ty.class_name() == Some(LAZY_ARG) {
        let Some(argument) = ty.type_arguments().first() else {
            anyhow::bail!("{LAZY_ARG} used without a type argument");
        };
        return sample_for(Some(argument), oracle);
    }

    let erased = ty.erasure();
    if let JavaType::Primitive(kind) = oracle.unboxed_or_self(&erased) {
        return Ok(primitive_sample(kind));
    }
    if let Some(category) = SUBTYPE_CATEGORIES
        .iter()
        .find(|category| oracle.is_subtype(&erased, &JavaType::object(category)))
    {
        return Ok(category_sample(category));
    }
    Ok(SampleValue::object(OBJECT))
}
