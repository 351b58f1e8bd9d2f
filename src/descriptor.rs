use std::fmt;
use std::str::FromStr;

use anyhow::{Context, Result};
use jdescriptor::{MethodDescriptor, TypeDescriptor};
use serde::Deserialize;

/// Primitive kinds of the JVM type system.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub(crate) enum PrimitiveKind {
    Boolean,
    Byte,
    Short,
    Int,
    Long,
    Char,
    Float,
    Double,
}

const BOXES: [(PrimitiveKind, &str); 8] = [
    (PrimitiveKind::Boolean, "java.lang.Boolean"),
    (PrimitiveKind::Byte, "java.lang.Byte"),
    (PrimitiveKind::Short, "java.lang.Short"),
    (PrimitiveKind::Int, "java.lang.Integer"),
    (PrimitiveKind::Long, "java.lang.Long"),
    (PrimitiveKind::Char, "java.lang.Character"),
    (PrimitiveKind::Float, "java.lang.Float"),
    (PrimitiveKind::Double, "java.lang.Double"),
];

impl PrimitiveKind {
    pub(crate) fn keyword(self) -> &'static str {
        match self {
            PrimitiveKind::Boolean => "boolean",
            PrimitiveKind::Byte => "byte",
            PrimitiveKind::Short => "short",
            PrimitiveKind::Int => "int",
            PrimitiveKind::Long => "long",
            PrimitiveKind::Char => "char",
            PrimitiveKind::Float => "float",
            PrimitiveKind::Double => "double",
        }
    }

    pub(crate) fn from_boxed_class(name: &str) -> Option<Self> {
        BOXES
            .iter()
            .find(|(_, boxed)| *boxed == name)
            .map(|(kind, _)| *kind)
    }
}

/// Static type of an expression, variable, or member.
///
/// Class names are dotted binary names (`java.util.Map$Entry`). Parameterized
/// types keep their arguments; everything else about generics is erased.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Deserialize)]
#[serde(try_from = "TypeRepr")]
pub(crate) enum JavaType {
    Primitive(PrimitiveKind),
    Class { name: String, arguments: Vec<JavaType> },
    Array(Box<JavaType>),
    Null,
    Void,
}

/// Serialized forms accepted for a type: a bare descriptor or a parameterized one.
#[derive(Deserialize)]
#[serde(untagged)]
enum TypeRepr {
    Descriptor(String),
    Parameterized {
        descriptor: String,
        #[serde(default)]
        arguments: Vec<JavaType>,
    },
}

impl TryFrom<TypeRepr> for JavaType {
    type Error = anyhow::Error;

    fn try_from(repr: TypeRepr) -> Result<Self> {
        match repr {
            TypeRepr::Descriptor(descriptor) => JavaType::parse(&descriptor),
            TypeRepr::Parameterized {
                descriptor,
                arguments,
            } => match JavaType::parse(&descriptor)? {
                JavaType::Class { name, .. } => Ok(JavaType::Class { name, arguments }),
                other => anyhow::bail!("type arguments on non-class type {other}"),
            },
        }
    }
}

impl JavaType {
    /// Parse a JVM field descriptor, or `null` for the null type.
    pub(crate) fn parse(descriptor: &str) -> Result<Self> {
        if descriptor == "null" {
            return Ok(JavaType::Null);
        }
        let parsed = TypeDescriptor::from_str(descriptor)
            .with_context(|| format!("parse type descriptor {descriptor}"))?;
        Ok(Self::from_descriptor(&parsed))
    }

    fn from_descriptor(descriptor: &TypeDescriptor) -> Self {
        match descriptor {
            TypeDescriptor::Boolean => JavaType::Primitive(PrimitiveKind::Boolean),
            TypeDescriptor::Byte => JavaType::Primitive(PrimitiveKind::Byte),
            TypeDescriptor::Short => JavaType::Primitive(PrimitiveKind::Short),
            TypeDescriptor::Integer => JavaType::Primitive(PrimitiveKind::Int),
            TypeDescriptor::Long => JavaType::Primitive(PrimitiveKind::Long),
            TypeDescriptor::Char => JavaType::Primitive(PrimitiveKind::Char),
            TypeDescriptor::Float => JavaType::Primitive(PrimitiveKind::Float),
            TypeDescriptor::Double => JavaType::Primitive(PrimitiveKind::Double),
            TypeDescriptor::Void => JavaType::Void,
            TypeDescriptor::Object(name) => JavaType::object(&name.replace('/', ".")),
            TypeDescriptor::Array(element, dimensions) => {
                let mut ty = Self::from_descriptor(element);
                for _ in 0..*dimensions {
                    ty = JavaType::Array(Box::new(ty));
                }
                ty
            }
        }
    }

    pub(crate) fn object(name: &str) -> Self {
        JavaType::Class {
            name: name.to_string(),
            arguments: Vec::new(),
        }
    }

    pub(crate) fn is_primitive(&self) -> bool {
        matches!(self, JavaType::Primitive(_))
    }

    pub(crate) fn is_boolean(&self) -> bool {
        matches!(self, JavaType::Primitive(PrimitiveKind::Boolean))
    }

    pub(crate) fn is_reference(&self) -> bool {
        matches!(
            self,
            JavaType::Class { .. } | JavaType::Array(_) | JavaType::Null
        )
    }

    pub(crate) fn class_name(&self) -> Option<&str> {
        match self {
            JavaType::Class { name, .. } => Some(name),
            _ => None,
        }
    }

    pub(crate) fn type_arguments(&self) -> &[JavaType] {
        match self {
            JavaType::Class { arguments, .. } => arguments,
            _ => &[],
        }
    }

    pub(crate) fn erasure(&self) -> JavaType {
        match self {
            JavaType::Class { name, .. } => JavaType::object(name),
            JavaType::Array(element) => JavaType::Array(Box::new(element.erasure())),
            other => other.clone(),
        }
    }
}

impl fmt::Display for JavaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JavaType::Primitive(kind) => f.write_str(kind.keyword()),
            JavaType::Class { name, arguments } => {
                f.write_str(name)?;
                if !arguments.is_empty() {
                    let rendered: Vec<String> = arguments.iter().map(ToString::to_string).collect();
                    write!(f, "<{}>", rendered.join(","))?;
                }
                Ok(())
            }
            JavaType::Array(element) => write!(f, "{element}[]"),
            JavaType::Null => f.write_str("<nulltype>"),
            JavaType::Void => f.write_str("void"),
        }
    }
}

/// Parameter and return types of a JVM method descriptor.
pub(crate) struct MethodType {
    pub(crate) parameters: Vec<JavaType>,
    pub(crate) return_type: JavaType,
}

pub(crate) fn method_type(descriptor: &str) -> Result<MethodType> {
    let descriptor =
        MethodDescriptor::from_str(descriptor).context("parse method descriptor")?;
    let parameters = descriptor
        .parameter_types()
        .iter()
        .map(JavaType::from_descriptor)
        .collect();
    let return_type = JavaType::from_descriptor(descriptor.return_type());
    Ok(MethodType {
        parameters,
        return_type,
    })
}
