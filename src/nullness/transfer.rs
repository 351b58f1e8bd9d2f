use tracing::debug;

use crate::dataflow::worklist::{NodeOutcome, NodeValues, TransferFunction, TransferInput};
use crate::descriptor::MethodType;
use crate::ir::{FieldRef, MethodBody, MethodRef, Node, NodeId, NodeKind, VarId, VariableKind};
use crate::nullness::annotations::{NullnessPolicy, from_annotations};
use crate::nullness::store::{AccessPath, NullnessStore, Updates};
use crate::nullness::tables;
use crate::nullness::value::Nullness;

/// How a node rewrites the stores flowing through it.
enum StoreUpdates {
    /// Applied to the merged incoming store.
    Regular(Updates),
    /// Applied to each incoming side; `both_updates` lands on both.
    Conditional {
        then_updates: Updates,
        else_updates: Updates,
        both_updates: Updates,
    },
    PassThrough,
    Swap,
}

struct Transfer {
    value: Nullness,
    updates: StoreUpdates,
}

impl Transfer {
    fn value(value: Nullness) -> Self {
        Self::regular(value, Updates::default())
    }

    fn regular(value: Nullness, updates: Updates) -> Self {
        Self {
            value,
            updates: StoreUpdates::Regular(updates),
        }
    }

    fn conditional(value: Nullness, then_updates: Updates, else_updates: Updates) -> Self {
        Self {
            value,
            updates: StoreUpdates::Conditional {
                then_updates,
                else_updates,
                both_updates: Updates::default(),
            },
        }
    }
}

/// Nullness transfer function over body nodes.
pub(crate) struct NullnessTransfer<'a> {
    policy: &'a dyn NullnessPolicy,
}

impl<'a> NullnessTransfer<'a> {
    pub(crate) fn new(policy: &'a dyn NullnessPolicy) -> Self {
        Self { policy }
    }

    fn visit(
        &self,
        body: &MethodBody,
        node: &Node,
        store: &NullnessStore,
        values: &NodeValues<Nullness>,
    ) -> Transfer {
        match &node.kind {
            NodeKind::NullLiteral => Transfer::value(Nullness::Null),
            NodeKind::ValueLiteral
            | NodeKind::This
            | NodeKind::StringConcatenate
            | NodeKind::StringConversion
            | NodeKind::NumericalOperation
            | NodeKind::BitwiseOperation
            | NodeKind::NumericalComparison
            | NodeKind::NarrowingConversion
            | NodeKind::WideningConversion
            | NodeKind::ObjectCreation
            | NodeKind::ArrayCreation
            | NodeKind::ClassDeclaration
            | NodeKind::FunctionalInterface => Transfer::value(Nullness::NonNull),
            NodeKind::LocalVariable { variable } => {
                Transfer::value(self.local_nullness(body, node, *variable, store))
            }
            NodeKind::VariableDeclaration { variable } => {
                let mut updates = Updates::default();
                if body
                    .variable(*variable)
                    .is_some_and(|info| info.kind == VariableKind::CatchParameter)
                {
                    updates.set(AccessPath::local(*variable), Nullness::NonNull);
                }
                Transfer::regular(Nullness::Nullable, updates)
            }
            NodeKind::Assignment { target, expression } => {
                self.visit_assignment(body, *target, *expression, values)
            }
            NodeKind::FieldAccess { receiver, field } => {
                let mut updates = Updates::default();
                let is_static = field.as_ref().is_some_and(|field| field.is_static);
                if !is_static {
                    if let Some(receiver) = receiver {
                        set_non_null_if_trackable(body, &mut updates, *receiver);
                    }
                }
                let path = node_access_path(body, node);
                let value = self.field_nullness(body, field.as_ref(), path, store);
                Transfer::regular(value, updates)
            }
            NodeKind::ArrayAccess { array } => {
                let mut updates = Updates::default();
                set_non_null_if_trackable(body, &mut updates, *array);
                let value = if node.has_primitive_type() {
                    Nullness::NonNull
                } else {
                    Nullness::Nullable
                };
                Transfer::regular(value, updates)
            }
            NodeKind::MethodInvocation {
                receiver,
                arguments,
                method,
            } => self.visit_method_invocation(body, *receiver, arguments, method.as_ref()),
            NodeKind::TypeCast {
                operand,
                annotations,
            } => {
                let value = from_annotations(annotations).unwrap_or_else(|| {
                    if node.has_primitive_type() {
                        Nullness::NonNull
                    } else {
                        operand_value(values, *operand)
                    }
                });
                Transfer::value(value)
            }
            NodeKind::InstanceOf { operand } => {
                let mut then_updates = Updates::default();
                set_non_null_if_trackable(body, &mut then_updates, *operand);
                Transfer::conditional(Nullness::NonNull, then_updates, Updates::default())
            }
            NodeKind::EqualTo { left, right } => {
                visit_equality(body, true, *left, *right, values)
            }
            NodeKind::NotEqual { left, right } => {
                visit_equality(body, false, *left, *right, values)
            }
            NodeKind::ConditionalAnd | NodeKind::ConditionalOr => Transfer {
                value: Nullness::NonNull,
                updates: StoreUpdates::PassThrough,
            },
            NodeKind::ConditionalNot => Transfer {
                value: Nullness::NonNull,
                updates: StoreUpdates::Swap,
            },
            NodeKind::Ternary {
                then_operand,
                else_operand,
            } => {
                // An arm without a value was never reached and contributes nothing.
                let then_value = values.get(*then_operand).unwrap_or(Nullness::Bottom);
                let else_value = values.get(*else_operand).unwrap_or(Nullness::Bottom);
                Transfer::value(then_value.least_upper_bound(else_value))
            }
            NodeKind::ClassName
            | NodeKind::Synchronized
            | NodeKind::Throw
            | NodeKind::Case
            | NodeKind::Return
            | NodeKind::Marker => Transfer::value(Nullness::Nullable),
        }
    }

    fn local_nullness(
        &self,
        body: &MethodBody,
        node: &Node,
        variable: VarId,
        store: &NullnessStore,
    ) -> Nullness {
        let Some(info) = body.variable(variable) else {
            debug!("{}: unknown variable {variable}", body.name);
            return Nullness::Nullable;
        };
        if node.has_primitive_type() || info.ty.is_primitive() || info.constant.is_some() {
            return Nullness::NonNull;
        }
        store
            .get(&AccessPath::local(variable))
            .unwrap_or(Nullness::Nullable)
    }

    fn visit_assignment(
        &self,
        body: &MethodBody,
        target: NodeId,
        expression: NodeId,
        values: &NodeValues<Nullness>,
    ) -> Transfer {
        let value = operand_value(values, expression);
        let mut updates = Updates::default();
        match body.node(target).map(|node| &node.kind) {
            Some(NodeKind::LocalVariable { variable })
            | Some(NodeKind::VariableDeclaration { variable }) => {
                updates.set(AccessPath::local(*variable), value);
            }
            Some(NodeKind::ArrayAccess { array }) => {
                set_non_null_if_trackable(body, &mut updates, *array);
            }
            Some(NodeKind::FieldAccess { receiver, field }) => {
                let is_static = field.as_ref().is_some_and(|field| field.is_static);
                if !is_static {
                    if let Some(receiver) = receiver {
                        set_non_null_if_trackable(body, &mut updates, *receiver);
                    }
                }
                // Field cells are assumed not to alias other tracked paths.
                if let Some(path) = access_path(body, target) {
                    updates.set(path, value);
                }
            }
            _ => {}
        }
        Transfer::regular(value, updates)
    }

    fn field_nullness(
        &self,
        body: &MethodBody,
        field: Option<&FieldRef>,
        path: Option<AccessPath>,
        store: &NullnessStore,
    ) -> Nullness {
        let Some(field) = field else {
            debug!("{}: unresolved field access", body.name);
            return Nullness::Nullable;
        };
        if field.name == "class"
            || field.is_enum_constant
            || field.ty.is_primitive()
            || field.constant.is_some()
        {
            return Nullness::NonNull;
        }
        if field.is_static && field.is_final && tables::has_non_null_constants(&field.owner) {
            return Nullness::NonNull;
        }
        if let Some(value) = path
            .and_then(|path| store.get(&path))
            .filter(|value| *value != Nullness::Bottom)
        {
            return value;
        }
        self.policy.field(field).unwrap_or(Nullness::Nullable)
    }

    fn visit_method_invocation(
        &self,
        body: &MethodBody,
        receiver: Option<NodeId>,
        arguments: &[NodeId],
        method: Option<&MethodRef>,
    ) -> Transfer {
        let mut then_updates = Updates::default();
        let mut else_updates = Updates::default();
        let mut both_updates = Updates::default();

        let Some(method) = method else {
            debug!("{}: unresolved method invocation", body.name);
            return Transfer::regular(Nullness::Nullable, both_updates);
        };
        let signature = match method.method_type() {
            Ok(signature) => Some(signature),
            Err(error) => {
                debug!(
                    "{}: {}.{}: {error:#}",
                    body.name, method.owner, method.name
                );
                None
            }
        };

        if !method.is_static {
            if let Some(receiver) = receiver {
                set_non_null_if_trackable(body, &mut both_updates, receiver);
            }
        }

        let owner = method.owner.as_str();
        let name = method.name.as_str();
        for variable in locals_at(
            body,
            arguments,
            tables::required_non_null_parameters(owner, name),
        ) {
            both_updates.set(AccessPath::local(variable), Nullness::NonNull);
        }
        for variable in locals_at(
            body,
            arguments,
            tables::null_implies_true_parameters(owner, name),
        ) {
            else_updates.set(AccessPath::local(variable), Nullness::NonNull);
        }
        for variable in locals_at(
            body,
            arguments,
            tables::nonnull_iff_true_parameters(owner, name),
        ) {
            then_updates.set(AccessPath::local(variable), Nullness::NonNull);
            else_updates.set(AccessPath::local(variable), Nullness::Null);
        }
        for variable in locals_at(body, arguments, tables::null_iff_true_parameters(owner, name)) {
            then_updates.set(AccessPath::local(variable), Nullness::Null);
            else_updates.set(AccessPath::local(variable), Nullness::NonNull);
        }
        if name == "equals" && arguments.len() == 1 {
            if let Some(variable) = local_argument(body, arguments[0]) {
                then_updates.set(AccessPath::local(variable), Nullness::NonNull);
            }
        }

        let value = self.return_nullness(method, signature.as_ref());
        if signature
            .as_ref()
            .is_some_and(|signature| signature.return_type.is_boolean())
        {
            Transfer {
                value,
                updates: StoreUpdates::Conditional {
                    then_updates,
                    else_updates,
                    both_updates,
                },
            }
        } else {
            Transfer::regular(value, both_updates)
        }
    }

    fn return_nullness(&self, method: &MethodRef, signature: Option<&MethodType>) -> Nullness {
        if let Some(declared) = self.policy.method_return(method) {
            return declared;
        }
        let primitive = signature.is_some_and(|signature| signature.return_type.is_primitive());
        if primitive
            || tables::is_known_non_null_return(&method.owner, &method.name)
            || self.policy.returns_non_null(method)
        {
            Nullness::NonNull
        } else {
            Nullness::Nullable
        }
    }
}

impl TransferFunction for NullnessTransfer<'_> {
    type Value = Nullness;
    type Store = NullnessStore;

    fn initial_store(&self, body: &MethodBody) -> NullnessStore {
        let mut updates = Updates::default();
        for (id, variable) in body.variables.iter().enumerate() {
            if let Some(value) = self.policy.parameter(variable) {
                updates.set(AccessPath::local(id), value);
            }
        }
        let store = NullnessStore::empty().with_updates(&updates);
        if store.len() > 0 {
            debug!("{}: seeded {} declared parameters", body.name, store.len());
        }
        store
    }

    fn transfer(
        &self,
        body: &MethodBody,
        node: &Node,
        input: &TransferInput<NullnessStore>,
        values: &NodeValues<Nullness>,
    ) -> NodeOutcome<Nullness, NullnessStore> {
        let store = input.regular_store().unwrap_or_default();
        let Transfer { value, updates } = self.visit(body, node, &store, values);
        let stores = match updates {
            StoreUpdates::Regular(updates) => TransferInput::regular(store.with_updates(&updates)),
            StoreUpdates::Conditional {
                then_updates,
                else_updates,
                both_updates,
            } => input.map_sides(
                |then_store| {
                    then_store
                        .with_updates(&then_updates)
                        .with_updates(&both_updates)
                },
                |else_store| {
                    else_store
                        .with_updates(&else_updates)
                        .with_updates(&both_updates)
                },
            ),
            StoreUpdates::PassThrough => input.clone(),
            StoreUpdates::Swap => input.swapped(),
        };
        NodeOutcome { value, stores }
    }
}

/// Refines the operands of `==` (`equal_to`) or `!=`.
fn visit_equality(
    body: &MethodBody,
    equal_to: bool,
    left: NodeId,
    right: NodeId,
    values: &NodeValues<Nullness>,
) -> Transfer {
    let left_value = operand_value(values, left);
    let right_value = operand_value(values, right);
    let equal_value = left_value.greatest_lower_bound(right_value);
    let mut equal_updates = Updates::default();
    let mut not_equal_updates = Updates::default();

    if let Some(path) = access_path(body, left) {
        equal_updates.set(path.clone(), equal_value);
        not_equal_updates.set(
            path,
            left_value.greatest_lower_bound(right_value.deduced_value_when_not_equal()),
        );
    }
    if let Some(path) = access_path(body, right) {
        equal_updates.set(path.clone(), equal_value);
        not_equal_updates.set(
            path,
            right_value.greatest_lower_bound(left_value.deduced_value_when_not_equal()),
        );
    }

    if equal_to {
        Transfer::conditional(Nullness::NonNull, equal_updates, not_equal_updates)
    } else {
        Transfer::conditional(Nullness::NonNull, not_equal_updates, equal_updates)
    }
}

fn operand_value(values: &NodeValues<Nullness>, node: NodeId) -> Nullness {
    values.get(node).unwrap_or(Nullness::Nullable)
}

fn access_path(body: &MethodBody, node: NodeId) -> Option<AccessPath> {
    node_access_path(body, body.node(node)?)
}

/// Store key for a local, a declaration, or an instance field chain rooted at
/// `this` or a local. A field access without a receiver reads through `this`.
fn node_access_path(body: &MethodBody, node: &Node) -> Option<AccessPath> {
    match &node.kind {
        NodeKind::LocalVariable { variable } | NodeKind::VariableDeclaration { variable } => {
            Some(AccessPath::local(*variable))
        }
        NodeKind::FieldAccess {
            receiver,
            field: Some(field),
        } if !field.is_static => {
            let base = match receiver {
                None => AccessPath::this(),
                Some(receiver) => match body.node(*receiver).map(|node| &node.kind) {
                    Some(NodeKind::This) => AccessPath::this(),
                    _ => access_path(body, *receiver)?,
                },
            };
            Some(base.with_field(&field.name))
        }
        _ => None,
    }
}

fn set_non_null_if_trackable(body: &MethodBody, updates: &mut Updates, node: NodeId) {
    if let Some(path) = access_path(body, node) {
        updates.set(path, Nullness::NonNull);
    }
}

fn local_argument(body: &MethodBody, node: NodeId) -> Option<VarId> {
    match body.node(node).map(|node| &node.kind) {
        Some(NodeKind::LocalVariable { variable }) => Some(*variable),
        _ => None,
    }
}

/// Local variables passed at the given (possibly negative) argument indexes.
fn locals_at(
    body: &MethodBody,
    arguments: &[NodeId],
    indexes: impl Iterator<Item = i32>,
) -> Vec<VarId> {
    indexes
        .filter_map(|index| tables::resolve_index(index, arguments.len()))
        .filter_map(|index| local_argument(body, arguments[index]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataflow::worklist::{DataflowResult, analyze_body};
    use crate::ir::FlowRule;
    use crate::nullness::annotations::{CodeOnly, TrustAnnotations};
    use crate::test_harness::{
        BodyBuilder, OBJECT_DESCRIPTOR, STRING_DESCRIPTOR, instance_field, instance_method,
        java_type, static_method, variable_info,
    };

    fn run(body: &MethodBody) -> DataflowResult<Nullness> {
        analyze_body(body, &NullnessTransfer::new(&CodeOnly)).expect("analyze body")
    }

    fn run_trusting(body: &MethodBody) -> DataflowResult<Nullness> {
        analyze_body(body, &NullnessTransfer::new(&TrustAnnotations)).expect("analyze body")
    }

    fn value(result: &DataflowResult<Nullness>, node: NodeId) -> Option<Nullness> {
        result.values.get(node)
    }

    /// `if (<condition built by f>) { read s } else { read s }`, returning both reads.
    fn branch_reads(
        builder: &mut BodyBuilder,
        variable: VarId,
        condition_block: usize,
    ) -> (NodeId, NodeId) {
        // `branch` leaves the then block current.
        let (_, else_block) = builder.branch(condition_block);
        let then_read = builder.read(variable);
        builder.switch_to(else_block);
        let else_read = builder.read(variable);
        (then_read, else_read)
    }

    #[test]
    fn literals_and_operations() {
        let mut builder = BodyBuilder::new("m");
        let null = builder.null_literal();
        let literal = builder.string_literal();
        let this = builder.this();
        let sum = builder.node(NodeKind::NumericalOperation, Some(java_type("I")));
        let concat = builder.node(NodeKind::StringConcatenate, Some(java_type(STRING_DESCRIPTOR)));
        let created = builder.node(NodeKind::ObjectCreation, Some(java_type(OBJECT_DESCRIPTOR)));
        let lambda = builder.node(NodeKind::FunctionalInterface, Some(java_type("Ljava/lang/Runnable;")));
        let result = run(&builder.build());

        assert_eq!(value(&result, null), Some(Nullness::Null));
        for node in [literal, this, sum, concat, created, lambda] {
            assert_eq!(value(&result, node), Some(Nullness::NonNull));
        }
    }

    #[test]
    fn comparison_with_null_refines_both_branches() {
        for null_on_left in [false, true] {
            let mut builder = BodyBuilder::new("m");
            let s = builder.parameter("s", STRING_DESCRIPTOR, &[]);
            let read = builder.read(s);
            let null = builder.null_literal();
            if null_on_left {
                builder.equal_to(null, read);
            } else {
                builder.equal_to(read, null);
            }
            let (then_read, else_read) = branch_reads(&mut builder, s, 0);
            let result = run(&builder.build());

            assert_eq!(value(&result, read), Some(Nullness::Nullable));
            assert_eq!(value(&result, then_read), Some(Nullness::Null));
            assert_eq!(value(&result, else_read), Some(Nullness::NonNull));
        }
    }

    #[test]
    fn not_equal_swaps_the_refinements() {
        let mut builder = BodyBuilder::new("m");
        let s = builder.parameter("s", STRING_DESCRIPTOR, &[]);
        let read = builder.read(s);
        let null = builder.null_literal();
        builder.not_equal(read, null);
        let (then_read, else_read) = branch_reads(&mut builder, s, 0);
        let result = run(&builder.build());

        assert_eq!(value(&result, then_read), Some(Nullness::NonNull));
        assert_eq!(value(&result, else_read), Some(Nullness::Null));
    }

    #[test]
    fn contradictory_branch_is_bottom() {
        // s = null; if (s != null) { s } else { s }
        let mut builder = BodyBuilder::new("m");
        let s = builder.local_variable("s", STRING_DESCRIPTOR);
        let null = builder.null_literal();
        builder.store(s, null);
        let read = builder.read(s);
        let other_null = builder.null_literal();
        builder.not_equal(read, other_null);
        let (then_read, else_read) = branch_reads(&mut builder, s, 0);
        let result = run(&builder.build());

        assert_eq!(value(&result, read), Some(Nullness::Null));
        assert_eq!(value(&result, then_read), Some(Nullness::Bottom));
        assert_eq!(value(&result, else_read), Some(Nullness::Null));
    }

    #[test]
    fn comparing_two_nullable_locals_learns_nothing() {
        let mut builder = BodyBuilder::new("m");
        let a = builder.parameter("a", STRING_DESCRIPTOR, &[]);
        let b = builder.parameter("b", STRING_DESCRIPTOR, &[]);
        let left = builder.read(a);
        let right = builder.read(b);
        builder.not_equal(left, right);
        let (then_read, else_read) = branch_reads(&mut builder, a, 0);
        let result = run(&builder.build());

        assert_eq!(value(&result, then_read), Some(Nullness::Nullable));
        assert_eq!(value(&result, else_read), Some(Nullness::Nullable));
    }

    #[test]
    fn join_takes_the_least_upper_bound() {
        for (else_is_null, expected) in [(true, Nullness::Nullable), (false, Nullness::NonNull)] {
            let mut builder = BodyBuilder::new("m");
            let flag = builder.parameter("flag", "Z", &[]);
            let s = builder.local_variable("s", STRING_DESCRIPTOR);
            builder.read(flag);
            let (then_block, else_block) = builder.branch(0);
            let literal = builder.string_literal();
            builder.store(s, literal);
            builder.switch_to(else_block);
            let other = if else_is_null {
                builder.null_literal()
            } else {
                builder.string_literal()
            };
            builder.store(s, other);
            builder.join(&[then_block, else_block]);
            let read = builder.read(s);
            let result = run(&builder.build());

            assert_eq!(value(&result, read), Some(expected));
        }
    }

    #[test]
    fn loop_reaches_a_fixed_point() {
        // s = null; while (flag) { s = "a"; } s
        let mut builder = BodyBuilder::new("m");
        let flag = builder.parameter("flag", "Z", &[]);
        let s = builder.local_variable("s", STRING_DESCRIPTOR);
        let null = builder.null_literal();
        builder.store(s, null);
        let head = builder.block();
        builder.edge(0, head, FlowRule::EachToEach);
        let head_read = builder.read(s);
        builder.read(flag);
        let (loop_body, exit) = builder.branch(head);
        let literal = builder.string_literal();
        builder.store(s, literal);
        builder.edge(loop_body, head, FlowRule::EachToEach);
        builder.switch_to(exit);
        let after = builder.read(s);
        let result = run(&builder.build());

        assert_eq!(value(&result, head_read), Some(Nullness::Nullable));
        assert_eq!(value(&result, after), Some(Nullness::Nullable));
    }

    #[test]
    fn primitive_locals_and_constants_are_non_null() {
        let mut builder = BodyBuilder::new("m");
        let count = builder.local_variable("count", "I");
        let mut constant = variable_info("NAME", STRING_DESCRIPTOR, VariableKind::Local, &[]);
        constant.constant = Some(crate::ir::Constant::String("x".to_string()));
        let name = builder.declare(constant);
        let count_read = builder.read(count);
        let name_read = builder.read(name);
        let result = run(&builder.build());

        assert_eq!(value(&result, count_read), Some(Nullness::NonNull));
        assert_eq!(value(&result, name_read), Some(Nullness::NonNull));
    }

    #[test]
    fn catch_parameters_are_non_null() {
        let mut builder = BodyBuilder::new("m");
        let error = builder.declare(variable_info(
            "e",
            "Ljava/lang/Exception;",
            VariableKind::CatchParameter,
            &[],
        ));
        builder.node(NodeKind::VariableDeclaration { variable: error }, None);
        let read = builder.read(error);
        let result = run(&builder.build());

        assert_eq!(value(&result, read), Some(Nullness::NonNull));
    }

    #[test]
    fn dereferences_refine_receivers() {
        let mut builder = BodyBuilder::new("m");
        let s = builder.parameter("s", STRING_DESCRIPTOR, &[]);
        let holder = builder.parameter("holder", "Lcom/example/Holder;", &[]);
        let receiver = builder.read(s);
        builder.invoke(
            Some(receiver),
            instance_method("java.lang.String", "length", "()I"),
            Vec::new(),
        );
        let holder_read = builder.read(holder);
        builder.field_access(
            Some(holder_read),
            instance_field("com.example.Holder", "count", "I"),
        );
        let after_call = builder.read(s);
        let after_field = builder.read(holder);
        let result = run(&builder.build());

        assert_eq!(value(&result, receiver), Some(Nullness::Nullable));
        assert_eq!(value(&result, after_call), Some(Nullness::NonNull));
        assert_eq!(value(&result, after_field), Some(Nullness::NonNull));
    }

    #[test]
    fn field_paths_remember_assigned_values() {
        let mut builder = BodyBuilder::new("m");
        let field = instance_field("com.example.ClassA", "name", STRING_DESCRIPTOR);
        let before = builder.field_access(None, field.clone());
        let this = builder.this();
        let target = builder.field_access(Some(this), field.clone());
        let literal = builder.string_literal();
        builder.assign(target, literal);
        let this_again = builder.this();
        let after = builder.field_access(Some(this_again), field);
        let result = run(&builder.build());

        assert_eq!(value(&result, before), Some(Nullness::Nullable));
        assert_eq!(value(&result, after), Some(Nullness::NonNull));
    }

    #[test]
    fn known_constant_fields_are_non_null() {
        let mut builder = BodyBuilder::new("m");
        let mut charset = instance_field(
            "java.nio.charset.StandardCharsets",
            "UTF_8",
            "Ljava/nio/charset/Charset;",
        );
        charset.is_static = true;
        charset.is_final = true;
        let mut other = charset.clone();
        other.owner = "com.example.Config".to_string();
        let known = builder.field_access(None, charset);
        let unknown = builder.field_access(None, other);
        let unresolved = builder.node(
            NodeKind::FieldAccess {
                receiver: None,
                field: None,
            },
            Some(java_type(OBJECT_DESCRIPTOR)),
        );
        let result = run(&builder.build());

        assert_eq!(value(&result, known), Some(Nullness::NonNull));
        assert_eq!(value(&result, unknown), Some(Nullness::Nullable));
        assert_eq!(value(&result, unresolved), Some(Nullness::Nullable));
    }

    #[test]
    fn require_non_null_refines_its_argument() {
        let mut builder = BodyBuilder::new("m");
        let s = builder.parameter("s", STRING_DESCRIPTOR, &[]);
        let argument = builder.read(s);
        builder.invoke(
            None,
            static_method(
                "java.util.Objects",
                "requireNonNull",
                "(Ljava/lang/Object;)Ljava/lang/Object;",
            ),
            vec![argument],
        );
        let after = builder.read(s);
        let result = run(&builder.build());

        assert_eq!(value(&result, after), Some(Nullness::NonNull));
    }

    #[test]
    fn check_not_null_refines_only_its_first_argument() {
        let mut builder = BodyBuilder::new("m");
        let s = builder.parameter("s", STRING_DESCRIPTOR, &[]);
        let argument = builder.read(s);
        builder.invoke(
            None,
            static_method(
                "com.google.common.base.Preconditions",
                "checkNotNull",
                "(Ljava/lang/Object;)Ljava/lang/Object;",
            ),
            vec![argument],
        );
        let after = builder.read(s);
        let result = run(&builder.build());
        assert_eq!(value(&result, after), Some(Nullness::NonNull));

        // checkNotNull(reference, errorMessageTemplate, errorMessageArgs...)
        let mut builder = BodyBuilder::new("m");
        let s = builder.parameter("s", STRING_DESCRIPTOR, &[]);
        let template = builder.parameter("template", STRING_DESCRIPTOR, &[]);
        let detail = builder.parameter("detail", OBJECT_DESCRIPTOR, &[]);
        let arguments = vec![builder.read(s), builder.read(template), builder.read(detail)];
        builder.invoke(
            None,
            static_method(
                "com.google.common.base.Preconditions",
                "checkNotNull",
                "(Ljava/lang/Object;Ljava/lang/String;[Ljava/lang/Object;)Ljava/lang/Object;",
            ),
            arguments,
        );
        let s_after = builder.read(s);
        let template_after = builder.read(template);
        let detail_after = builder.read(detail);
        let result = run(&builder.build());

        assert_eq!(value(&result, s_after), Some(Nullness::NonNull));
        assert_eq!(value(&result, template_after), Some(Nullness::Nullable));
        assert_eq!(value(&result, detail_after), Some(Nullness::Nullable));
    }

    #[test]
    fn assert_not_null_uses_the_last_argument() {
        let mut builder = BodyBuilder::new("m");
        let message = builder.parameter("message", STRING_DESCRIPTOR, &[]);
        let s = builder.parameter("s", OBJECT_DESCRIPTOR, &[]);
        let first = builder.read(message);
        let last = builder.read(s);
        builder.invoke(
            None,
            static_method(
                "org.junit.Assert",
                "assertNotNull",
                "(Ljava/lang/String;Ljava/lang/Object;)V",
            ),
            vec![first, last],
        );
        let message_after = builder.read(message);
        let s_after = builder.read(s);
        let result = run(&builder.build());

        assert_eq!(value(&result, message_after), Some(Nullness::Nullable));
        assert_eq!(value(&result, s_after), Some(Nullness::NonNull));
    }

    #[test]
    fn boolean_predicates_refine_branches() {
        let cases = [
            ("com.google.common.base.Strings", "isNullOrEmpty", Nullness::Nullable, Nullness::NonNull),
            ("java.util.Objects", "isNull", Nullness::Null, Nullness::NonNull),
            ("java.util.Objects", "nonNull", Nullness::NonNull, Nullness::Null),
        ];
        for (owner, name, expected_then, expected_else) in cases {
            let mut builder = BodyBuilder::new("m");
            let s = builder.parameter("s", STRING_DESCRIPTOR, &[]);
            let argument = builder.read(s);
            let call = builder.invoke(
                None,
                static_method(owner, name, "(Ljava/lang/Object;)Z"),
                vec![argument],
            );
            let (then_read, else_read) = branch_reads(&mut builder, s, 0);
            let result = run(&builder.build());

            assert_eq!(value(&result, call), Some(Nullness::NonNull), "{name}");
            assert_eq!(value(&result, then_read), Some(expected_then), "{name}");
            assert_eq!(value(&result, else_read), Some(expected_else), "{name}");
        }
    }

    #[test]
    fn equals_refines_its_argument_when_true() {
        let mut builder = BodyBuilder::new("m");
        let s = builder.parameter("s", STRING_DESCRIPTOR, &[]);
        let receiver = builder.string_literal();
        let argument = builder.read(s);
        builder.invoke(
            Some(receiver),
            instance_method("java.lang.String", "equals", "(Ljava/lang/Object;)Z"),
            vec![argument],
        );
        let (then_read, else_read) = branch_reads(&mut builder, s, 0);
        let result = run(&builder.build());

        assert_eq!(value(&result, then_read), Some(Nullness::NonNull));
        assert_eq!(value(&result, else_read), Some(Nullness::Nullable));
    }

    #[test]
    fn return_values_follow_the_library_tables() {
        let mut builder = BodyBuilder::new("m");
        let boxed = builder.invoke(
            None,
            static_method("java.lang.Integer", "valueOf", "(I)Ljava/lang/Integer;"),
            Vec::new(),
        );
        let receiver = builder.string_literal();
        let trimmed = builder.invoke(
            Some(receiver),
            instance_method("java.lang.String", "trim", "()Ljava/lang/String;"),
            Vec::new(),
        );
        let unknown = builder.invoke(
            None,
            static_method("com.example.Lookup", "find", "()Ljava/lang/Object;"),
            Vec::new(),
        );
        let unresolved = builder.node(
            NodeKind::MethodInvocation {
                receiver: None,
                arguments: Vec::new(),
                method: None,
            },
            Some(java_type(OBJECT_DESCRIPTOR)),
        );
        let result = run(&builder.build());

        assert_eq!(value(&result, boxed), Some(Nullness::NonNull));
        assert_eq!(value(&result, trimmed), Some(Nullness::NonNull));
        assert_eq!(value(&result, unknown), Some(Nullness::Nullable));
        assert_eq!(value(&result, unresolved), Some(Nullness::Nullable));
    }

    #[test]
    fn instanceof_refines_the_then_branch() {
        let mut builder = BodyBuilder::new("m");
        let o = builder.parameter("o", OBJECT_DESCRIPTOR, &[]);
        let operand = builder.read(o);
        builder.node(NodeKind::InstanceOf { operand }, Some(java_type("Z")));
        let (then_read, else_read) = branch_reads(&mut builder, o, 0);
        let result = run(&builder.build());

        assert_eq!(value(&result, then_read), Some(Nullness::NonNull));
        assert_eq!(value(&result, else_read), Some(Nullness::Nullable));
    }

    #[test]
    fn negation_swaps_branch_stores() {
        let mut builder = BodyBuilder::new("m");
        let s = builder.parameter("s", STRING_DESCRIPTOR, &[]);
        let read = builder.read(s);
        let null = builder.null_literal();
        builder.equal_to(read, null);
        builder.node(NodeKind::ConditionalNot, Some(java_type("Z")));
        let (then_read, else_read) = branch_reads(&mut builder, s, 0);
        let result = run(&builder.build());

        assert_eq!(value(&result, then_read), Some(Nullness::NonNull));
        assert_eq!(value(&result, else_read), Some(Nullness::Null));
    }

    #[test]
    fn casts_and_ternaries() {
        let mut builder = BodyBuilder::new("m");
        let null = builder.null_literal();
        let literal = builder.string_literal();
        let plain_cast = builder.node(
            NodeKind::TypeCast {
                operand: null,
                annotations: Vec::new(),
            },
            Some(java_type(STRING_DESCRIPTOR)),
        );
        let annotated_cast = builder.node(
            NodeKind::TypeCast {
                operand: null,
                annotations: vec!["org.jspecify.annotations.NonNull".to_string()],
            },
            Some(java_type(STRING_DESCRIPTOR)),
        );
        let primitive_cast = builder.node(
            NodeKind::TypeCast {
                operand: null,
                annotations: Vec::new(),
            },
            Some(java_type("I")),
        );
        let ternary = builder.node(
            NodeKind::Ternary {
                then_operand: null,
                else_operand: literal,
            },
            Some(java_type(STRING_DESCRIPTOR)),
        );
        let result = run(&builder.build());

        assert_eq!(value(&result, plain_cast), Some(Nullness::Null));
        assert_eq!(value(&result, annotated_cast), Some(Nullness::NonNull));
        assert_eq!(value(&result, primitive_cast), Some(Nullness::NonNull));
        assert_eq!(value(&result, ternary), Some(Nullness::Nullable));
    }

    #[test]
    fn array_access_refines_the_array() {
        let mut builder = BodyBuilder::new("m");
        let values = builder.parameter("values", "[Ljava/lang/String;", &[]);
        let counts = builder.parameter("counts", "[I", &[]);
        let array = builder.read(values);
        let element = builder.node(NodeKind::ArrayAccess { array }, Some(java_type(STRING_DESCRIPTOR)));
        let count_array = builder.read(counts);
        let count = builder.node(NodeKind::ArrayAccess { array: count_array }, Some(java_type("I")));
        let after = builder.read(values);
        let result = run(&builder.build());

        assert_eq!(value(&result, element), Some(Nullness::Nullable));
        assert_eq!(value(&result, count), Some(Nullness::NonNull));
        assert_eq!(value(&result, after), Some(Nullness::NonNull));
    }

    #[test]
    fn trusting_policy_believes_annotations() {
        let mut builder = BodyBuilder::new("m");
        let nullable = builder.parameter("a", STRING_DESCRIPTOR, &["javax.annotation.Nullable"]);
        let non_null = builder.parameter("b", STRING_DESCRIPTOR, &["javax.annotation.Nonnull"]);
        let a = builder.read(nullable);
        let b = builder.read(non_null);
        let mut method = static_method("com.example.Lookup", "find", "()Ljava/lang/Object;");
        method.annotations = vec!["org.jspecify.annotations.NonNull".to_string()];
        let call = builder.invoke(None, method, Vec::new());
        let body = builder.build();

        let trusting = run_trusting(&body);
        assert_eq!(value(&trusting, a), Some(Nullness::Nullable));
        assert_eq!(value(&trusting, b), Some(Nullness::NonNull));
        assert_eq!(value(&trusting, call), Some(Nullness::NonNull));

        let standard = run(&body);
        assert_eq!(value(&standard, b), Some(Nullness::Nullable));
        assert_eq!(value(&standard, call), Some(Nullness::Nullable));
    }
}
