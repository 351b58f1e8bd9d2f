use anyhow::Result;
use serde::Deserialize;

use crate::descriptor::{JavaType, MethodType, method_type};

pub(crate) type VarId = usize;
pub(crate) type NodeId = usize;
pub(crate) type BlockId = usize;
pub(crate) type TreeId = u32;

/// Everything a front end extracted from one source file.
#[derive(Clone, Debug, Default, Deserialize)]
pub(crate) struct AnalysisUnit {
    pub(crate) source_file: String,
    #[serde(default)]
    pub(crate) classes: Vec<ClassInfo>,
    #[serde(default)]
    pub(crate) bodies: Vec<MethodBody>,
    #[serde(default)]
    pub(crate) format_calls: Vec<FormatCall>,
    /// Methods declared in the source file, checked for format annotations.
    #[serde(default)]
    pub(crate) methods: Vec<MethodDeclaration>,
}

/// Class hierarchy entry.
#[derive(Clone, Debug, Deserialize)]
pub(crate) struct ClassInfo {
    pub(crate) name: String,
    #[serde(default)]
    pub(crate) super_name: Option<String>,
    #[serde(default)]
    pub(crate) interfaces: Vec<String>,
}

/// Compile-time constant value of an expression or variable.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum Constant {
    Boolean(bool),
    Byte(i8),
    Short(i16),
    Int(i32),
    Long(i64),
    Char(char),
    Float(f32),
    Double(f64),
    String(String),
}

impl Constant {
    pub(crate) fn as_str(&self) -> Option<&str> {
        match self {
            Constant::String(value) => Some(value),
            _ => None,
        }
    }
}

/// Resolved method symbol.
#[derive(Clone, Debug, Deserialize)]
pub(crate) struct MethodRef {
    pub(crate) owner: String,
    pub(crate) name: String,
    pub(crate) descriptor: String,
    #[serde(default)]
    pub(crate) is_static: bool,
    #[serde(default)]
    pub(crate) is_varargs: bool,
    #[serde(default)]
    pub(crate) annotations: Vec<String>,
    #[serde(default)]
    pub(crate) parameters: Vec<ParameterInfo>,
}

impl MethodRef {
    pub(crate) fn method_type(&self) -> Result<MethodType> {
        method_type(&self.descriptor)
    }

    pub(crate) fn parameter_annotations(&self, index: usize) -> &[String] {
        self.parameters
            .get(index)
            .map(|parameter| parameter.annotations.as_slice())
            .unwrap_or(&[])
    }
}

/// Method declared in a unit's source file.
#[derive(Clone, Debug, Deserialize)]
pub(crate) struct MethodDeclaration {
    pub(crate) method: MethodRef,
    #[serde(default)]
    pub(crate) line: Option<u32>,
}

impl MethodDeclaration {
    /// `owner.name(descriptor)`, the same form as body names.
    pub(crate) fn qualified_name(&self) -> String {
        format!("{}.{}{}", self.method.owner, self.method.name, self.method.descriptor)
    }
}

/// Declared parameter metadata not carried by the descriptor.
#[derive(Clone, Debug, Default, Deserialize)]
pub(crate) struct ParameterInfo {
    #[serde(default)]
    pub(crate) name: String,
    #[serde(default)]
    pub(crate) annotations: Vec<String>,
}

/// Resolved field symbol.
#[derive(Clone, Debug, Deserialize)]
pub(crate) struct FieldRef {
    pub(crate) owner: String,
    pub(crate) name: String,
    #[serde(rename = "type")]
    pub(crate) ty: JavaType,
    #[serde(default)]
    pub(crate) is_static: bool,
    #[serde(default)]
    pub(crate) is_final: bool,
    #[serde(default)]
    pub(crate) is_enum_constant: bool,
    #[serde(default)]
    pub(crate) constant: Option<Constant>,
    #[serde(default)]
    pub(crate) annotations: Vec<String>,
}

/// Kind of a variable declared inside a body.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum VariableKind {
    #[default]
    Local,
    Parameter,
    CatchParameter,
    Resource,
}

/// Variable declared in a body; its index is its identity.
#[derive(Clone, Debug, Deserialize)]
pub(crate) struct VariableInfo {
    pub(crate) name: String,
    #[serde(rename = "type")]
    pub(crate) ty: JavaType,
    #[serde(default)]
    pub(crate) kind: VariableKind,
    #[serde(default)]
    pub(crate) constant: Option<Constant>,
    #[serde(default)]
    pub(crate) annotations: Vec<String>,
}

/// Method, constructor, initializer, or lambda body with its control-flow graph.
#[derive(Clone, Debug, Deserialize)]
pub(crate) struct MethodBody {
    pub(crate) name: String,
    #[serde(default)]
    pub(crate) line: Option<u32>,
    #[serde(default)]
    pub(crate) variables: Vec<VariableInfo>,
    pub(crate) nodes: Vec<Node>,
    pub(crate) blocks: Vec<Block>,
}

impl MethodBody {
    pub(crate) fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub(crate) fn variable(&self, id: VarId) -> Option<&VariableInfo> {
        self.variables.get(id)
    }

    pub(crate) fn nodes_for_tree(&self, tree: TreeId) -> Vec<NodeId> {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, node)| node.tree == Some(tree))
            .map(|(id, _)| id)
            .collect()
    }
}

/// One evaluation step of a body.
#[derive(Clone, Debug, Deserialize)]
pub(crate) struct Node {
    pub(crate) kind: NodeKind,
    #[serde(rename = "type", default)]
    pub(crate) ty: Option<JavaType>,
    #[serde(default)]
    pub(crate) tree: Option<TreeId>,
    #[serde(default)]
    pub(crate) line: Option<u32>,
}

impl Node {
    pub(crate) fn has_primitive_type(&self) -> bool {
        self.ty.as_ref().is_some_and(JavaType::is_primitive)
    }
}

/// Closed set of control-flow-graph node kinds.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum NodeKind {
    NullLiteral,
    ValueLiteral,
    This,
    ClassName,
    LocalVariable {
        variable: VarId,
    },
    VariableDeclaration {
        variable: VarId,
    },
    Assignment {
        target: NodeId,
        expression: NodeId,
    },
    FieldAccess {
        #[serde(default)]
        receiver: Option<NodeId>,
        #[serde(default)]
        field: Option<FieldRef>,
    },
    ArrayAccess {
        array: NodeId,
    },
    MethodInvocation {
        #[serde(default)]
        receiver: Option<NodeId>,
        #[serde(default)]
        arguments: Vec<NodeId>,
        #[serde(default)]
        method: Option<MethodRef>,
    },
    ObjectCreation,
    ArrayCreation,
    ClassDeclaration,
    FunctionalInterface,
    TypeCast {
        operand: NodeId,
        #[serde(default)]
        annotations: Vec<String>,
    },
    InstanceOf {
        operand: NodeId,
    },
    StringConcatenate,
    StringConversion,
    NumericalOperation,
    BitwiseOperation,
    NumericalComparison,
    NarrowingConversion,
    WideningConversion,
    EqualTo {
        left: NodeId,
        right: NodeId,
    },
    NotEqual {
        left: NodeId,
        right: NodeId,
    },
    ConditionalAnd,
    ConditionalOr,
    ConditionalNot,
    Ternary {
        then_operand: NodeId,
        else_operand: NodeId,
    },
    Synchronized,
    Throw,
    Case,
    Return,
    Marker,
}

/// Straight-line run of nodes with its outgoing edges.
#[derive(Clone, Debug, Default, Deserialize)]
pub(crate) struct Block {
    #[serde(default)]
    pub(crate) nodes: Vec<NodeId>,
    #[serde(default)]
    pub(crate) successors: Vec<Edge>,
}

#[derive(Clone, Debug, Deserialize)]
pub(crate) struct Edge {
    pub(crate) target: BlockId,
    #[serde(default)]
    pub(crate) rule: FlowRule,
}

/// Which of the source block's stores flow into which stores of the target.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum FlowRule {
    #[default]
    EachToEach,
    ThenToBoth,
    ElseToBoth,
    ThenToThen,
    ElseToElse,
}

/// Candidate call site for format-string validation.
///
/// `arguments` starts at the format-string argument; leading arguments such
/// as a `Locale` are already dropped by the front end.
#[derive(Clone, Debug, Deserialize)]
pub(crate) struct FormatCall {
    #[serde(default)]
    pub(crate) method: Option<MethodRef>,
    pub(crate) arguments: Vec<Expr>,
    #[serde(default)]
    pub(crate) strict: bool,
    #[serde(default)]
    pub(crate) scope: Vec<LocalDeclaration>,
    #[serde(default)]
    pub(crate) enclosing: Option<String>,
    #[serde(default)]
    pub(crate) line: Option<u32>,
}

/// Local variable declaration visible from a call site.
#[derive(Clone, Debug, Deserialize)]
pub(crate) struct LocalDeclaration {
    pub(crate) variable: u32,
    #[serde(default)]
    pub(crate) initializer: Option<Expr>,
    #[serde(default)]
    pub(crate) source: String,
}

/// Argument expression as seen by the format engines.
#[derive(Clone, Debug, Default, Deserialize)]
pub(crate) struct Expr {
    #[serde(default)]
    pub(crate) kind: ExprKind,
    #[serde(rename = "type", default)]
    pub(crate) ty: Option<JavaType>,
    #[serde(default)]
    pub(crate) constant: Option<Constant>,
    #[serde(default)]
    pub(crate) source: String,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum ExprKind {
    Literal,
    Conditional {
        then_expr: Box<Expr>,
        else_expr: Box<Expr>,
    },
    Variable(VariableSymbol),
    MethodCall {
        method: MethodRef,
    },
    #[default]
    Other,
}

/// Variable referenced by an expression.
#[derive(Clone, Debug, Deserialize)]
pub(crate) struct VariableSymbol {
    pub(crate) id: u32,
    pub(crate) name: String,
    pub(crate) kind: SymbolKind,
    #[serde(default)]
    pub(crate) is_final: bool,
    #[serde(default)]
    pub(crate) is_effectively_final: bool,
    #[serde(default)]
    pub(crate) owner: Option<MethodRef>,
    #[serde(default)]
    pub(crate) parameter_index: Option<usize>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum SymbolKind {
    Local,
    Parameter,
    Field,
    Other,
}
