use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tempfile::TempDir;

use crate::descriptor::JavaType;
use crate::engine::{Engine, EngineOutput, build_context};
use crate::input::load_inputs;
use crate::ir::{
    AnalysisUnit, Block, BlockId, Constant, Edge, Expr, ExprKind, FieldRef, FlowRule,
    FormatCall, MethodBody, MethodRef, Node, NodeId, NodeKind, ParameterInfo, SymbolKind,
    TreeId, VarId, VariableInfo, VariableKind, VariableSymbol,
};

pub(crate) const STRING_DESCRIPTOR: &str = "Ljava/lang/String;";
pub(crate) const OBJECT_DESCRIPTOR: &str = "Ljava/lang/Object;";

pub(crate) fn java_type(descriptor: &str) -> JavaType {
    JavaType::parse(descriptor).expect("valid descriptor in test")
}

/// Builds a body block by block. Nodes land in the current block and get
/// their own node id as tree id unless overridden.
pub(crate) struct BodyBuilder {
    body: MethodBody,
    current: BlockId,
}

impl BodyBuilder {
    pub(crate) fn new(name: &str) -> Self {
        Self {
            body: MethodBody {
                name: name.to_string(),
                line: None,
                variables: Vec::new(),
                nodes: Vec::new(),
                blocks: vec![Block::default()],
            },
            current: 0,
        }
    }

    pub(crate) fn declare(&mut self, variable: VariableInfo) -> VarId {
        self.body.variables.push(variable);
        self.body.variables.len() - 1
    }

    pub(crate) fn local_variable(&mut self, name: &str, descriptor: &str) -> VarId {
        self.declare(variable_info(name, descriptor, VariableKind::Local, &[]))
    }

    pub(crate) fn parameter(&mut self, name: &str, descriptor: &str, annotations: &[&str]) -> VarId {
        self.declare(variable_info(
            name,
            descriptor,
            VariableKind::Parameter,
            annotations,
        ))
    }

    pub(crate) fn node(&mut self, kind: NodeKind, ty: Option<JavaType>) -> NodeId {
        let id = self.body.nodes.len();
        self.body.nodes.push(Node {
            kind,
            ty,
            tree: Some(id as TreeId),
            line: None,
        });
        self.body.blocks[self.current].nodes.push(id);
        id
    }

    pub(crate) fn set_tree(&mut self, node: NodeId, tree: TreeId) {
        self.body.nodes[node].tree = Some(tree);
    }

    pub(crate) fn set_line(&mut self, node: NodeId, line: u32) {
        self.body.nodes[node].line = Some(line);
    }

    /// Opens a new block and makes it current.
    pub(crate) fn block(&mut self) -> BlockId {
        self.body.blocks.push(Block::default());
        self.current = self.body.blocks.len() - 1;
        self.current
    }

    pub(crate) fn switch_to(&mut self, block: BlockId) {
        self.current = block;
    }

    pub(crate) fn edge(&mut self, from: BlockId, to: BlockId, rule: FlowRule) {
        self.body.blocks[from]
            .successors
            .push(Edge { target: to, rule });
    }

    /// Wires `from` as a two-way branch and returns the (then, else) blocks.
    pub(crate) fn branch(&mut self, from: BlockId) -> (BlockId, BlockId) {
        let then_block = self.block();
        let else_block = self.block();
        self.edge(from, then_block, FlowRule::ThenToBoth);
        self.edge(from, else_block, FlowRule::ElseToBoth);
        self.switch_to(then_block);
        (then_block, else_block)
    }

    /// Joins the given blocks into a fresh current block.
    pub(crate) fn join(&mut self, from: &[BlockId]) -> BlockId {
        let target = self.block();
        for block in from {
            self.edge(*block, target, FlowRule::EachToEach);
        }
        target
    }

    pub(crate) fn null_literal(&mut self) -> NodeId {
        self.node(NodeKind::NullLiteral, Some(JavaType::Null))
    }

    pub(crate) fn string_literal(&mut self) -> NodeId {
        self.node(NodeKind::ValueLiteral, Some(java_type(STRING_DESCRIPTOR)))
    }

    pub(crate) fn this(&mut self) -> NodeId {
        self.node(NodeKind::This, Some(java_type("Lcom/example/ClassA;")))
    }

    pub(crate) fn read(&mut self, variable: VarId) -> NodeId {
        let ty = self.body.variables[variable].ty.clone();
        self.node(NodeKind::LocalVariable { variable }, Some(ty))
    }

    pub(crate) fn assign(&mut self, target: NodeId, expression: NodeId) -> NodeId {
        let ty = self.body.nodes[target].ty.clone();
        self.node(NodeKind::Assignment { target, expression }, ty)
    }

    /// `variable = <node>` as a fresh target read plus the assignment.
    pub(crate) fn store(&mut self, variable: VarId, expression: NodeId) -> NodeId {
        let target = self.read(variable);
        self.assign(target, expression)
    }

    pub(crate) fn equal_to(&mut self, left: NodeId, right: NodeId) -> NodeId {
        self.node(NodeKind::EqualTo { left, right }, Some(java_type("Z")))
    }

    pub(crate) fn not_equal(&mut self, left: NodeId, right: NodeId) -> NodeId {
        self.node(NodeKind::NotEqual { left, right }, Some(java_type("Z")))
    }

    pub(crate) fn invoke(
        &mut self,
        receiver: Option<NodeId>,
        method: MethodRef,
        arguments: Vec<NodeId>,
    ) -> NodeId {
        let ty = method
            .method_type()
            .expect("valid method descriptor in test")
            .return_type;
        self.node(
            NodeKind::MethodInvocation {
                receiver,
                arguments,
                method: Some(method),
            },
            Some(ty),
        )
    }

    pub(crate) fn field_access(&mut self, receiver: Option<NodeId>, field: FieldRef) -> NodeId {
        let ty = field.ty.clone();
        self.node(
            NodeKind::FieldAccess {
                receiver,
                field: Some(field),
            },
            Some(ty),
        )
    }

    pub(crate) fn build(self) -> MethodBody {
        self.body
    }
}

pub(crate) fn variable_info(
    name: &str,
    descriptor: &str,
    kind: VariableKind,
    annotations: &[&str],
) -> VariableInfo {
    VariableInfo {
        name: name.to_string(),
        ty: java_type(descriptor),
        kind,
        constant: None,
        annotations: strings(annotations),
    }
}

pub(crate) fn instance_method(owner: &str, name: &str, descriptor: &str) -> MethodRef {
    MethodRef {
        owner: owner.to_string(),
        name: name.to_string(),
        descriptor: descriptor.to_string(),
        is_static: false,
        is_varargs: false,
        annotations: Vec::new(),
        parameters: Vec::new(),
    }
}

pub(crate) fn static_method(owner: &str, name: &str, descriptor: &str) -> MethodRef {
    MethodRef {
        is_static: true,
        ..instance_method(owner, name, descriptor)
    }
}

/// `@FormatMethod` static method whose parameters carry the given annotations.
pub(crate) fn format_method(descriptor: &str, parameter_annotations: &[&[&str]]) -> MethodRef {
    MethodRef {
        annotations: strings(&["com.google.errorprone.annotations.FormatMethod"]),
        parameters: parameter_annotations
            .iter()
            .enumerate()
            .map(|(index, annotations)| ParameterInfo {
                name: format!("arg{index}"),
                annotations: strings(annotations),
            })
            .collect(),
        is_varargs: true,
        ..static_method("com.example.ClassA", "log", descriptor)
    }
}

pub(crate) fn instance_field(owner: &str, name: &str, descriptor: &str) -> FieldRef {
    FieldRef {
        owner: owner.to_string(),
        name: name.to_string(),
        ty: java_type(descriptor),
        is_static: false,
        is_final: false,
        is_enum_constant: false,
        constant: None,
        annotations: Vec::new(),
    }
}

pub(crate) fn string_literal(value: &str) -> Expr {
    Expr {
        kind: ExprKind::Literal,
        ty: Some(java_type(STRING_DESCRIPTOR)),
        constant: Some(Constant::String(value.to_string())),
        source: format!("{value:?}"),
    }
}

pub(crate) fn constant(descriptor: &str, value: Constant, source: &str) -> Expr {
    Expr {
        kind: ExprKind::Literal,
        ty: Some(java_type(descriptor)),
        constant: Some(value),
        source: source.to_string(),
    }
}

/// Non-constant expression of the given type.
pub(crate) fn typed(descriptor: &str, source: &str) -> Expr {
    Expr {
        kind: ExprKind::Other,
        ty: Some(java_type(descriptor)),
        constant: None,
        source: source.to_string(),
    }
}

pub(crate) fn local_symbol(id: u32, name: &str, effectively_final: bool) -> VariableSymbol {
    VariableSymbol {
        id,
        name: name.to_string(),
        kind: SymbolKind::Local,
        is_final: false,
        is_effectively_final: effectively_final,
        owner: None,
        parameter_index: None,
    }
}

pub(crate) fn variable(symbol: VariableSymbol, descriptor: &str) -> Expr {
    Expr {
        source: symbol.name.clone(),
        kind: ExprKind::Variable(symbol),
        ty: Some(java_type(descriptor)),
        constant: None,
    }
}

pub(crate) fn format_call(method: Option<MethodRef>, arguments: Vec<Expr>) -> FormatCall {
    FormatCall {
        method,
        arguments,
        strict: false,
        scope: Vec::new(),
        enclosing: Some("com.example.ClassA.methodX()V".to_string()),
        line: Some(10),
    }
}

pub(crate) fn unit(bodies: Vec<MethodBody>, format_calls: Vec<FormatCall>) -> AnalysisUnit {
    AnalysisUnit {
        source_file: "src/main/java/com/example/ClassA.java".to_string(),
        classes: Vec::new(),
        bodies,
        format_calls,
        methods: Vec::new(),
    }
}

pub(crate) fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}

/// Runs every registered rule over in-memory units.
pub(crate) fn analyze_units(units: Vec<AnalysisUnit>) -> Result<EngineOutput> {
    let context = build_context(units, None);
    Engine::new().analyze(&context).context("run analysis")
}

pub(crate) fn rule_messages(output: &EngineOutput, rule_id: &str) -> Vec<String> {
    output
        .results
        .iter()
        .filter(|result| result.rule_id.as_deref() == Some(rule_id))
        .filter_map(|result| result.message.text.clone())
        .collect()
}

/// Unit JSON files written to a temporary directory.
pub(crate) struct UnitFixture {
    temp_dir: TempDir,
}

impl UnitFixture {
    pub(crate) fn new() -> Result<Self> {
        let temp_dir = tempfile::tempdir().context("create temp dir")?;
        Ok(Self { temp_dir })
    }

    pub(crate) fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    pub(crate) fn write(&self, relative: &str, contents: &str) -> Result<()> {
        let path = self.temp_dir.path().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("create fixture parent dir")?;
        }
        fs::write(&path, contents).with_context(|| format!("write {}", path.display()))
    }

    pub(crate) fn analyze(&self) -> Result<EngineOutput> {
        let inputs = load_inputs(self.root()).context("load fixture units")?;
        let context = build_context(inputs.units, None);
        Engine::new().analyze(&context).context("run analysis")
    }
}
