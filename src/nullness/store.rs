use std::collections::BTreeMap;

use crate::dataflow::worklist::AbstractStore;
use crate::ir::VarId;
use crate::nullness::value::Nullness;

/// Base of an access path.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub(crate) enum PathRoot {
    Local(VarId),
    This,
}

/// A local variable, or `this`/a local followed by a chain of instance fields.
///
/// Keyed by declaration identity, so every read of one variable shares one slot.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub(crate) struct AccessPath {
    root: PathRoot,
    fields: Vec<String>,
}

impl AccessPath {
    pub(crate) fn local(variable: VarId) -> Self {
        Self {
            root: PathRoot::Local(variable),
            fields: Vec::new(),
        }
    }

    pub(crate) fn this() -> Self {
        Self {
            root: PathRoot::This,
            fields: Vec::new(),
        }
    }

    pub(crate) fn with_field(mut self, field: &str) -> Self {
        self.fields.push(field.to_string());
        self
    }
}

/// Batch of store assignments; later entries override earlier ones.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub(crate) struct Updates(Vec<(AccessPath, Nullness)>);

impl Updates {
    pub(crate) fn set(&mut self, path: AccessPath, value: Nullness) {
        self.0.push((path, value));
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Immutable map from access path to nullness.
#[derive(Clone, Debug, Default, Eq, PartialEq, Hash)]
pub(crate) struct NullnessStore {
    values: BTreeMap<AccessPath, Nullness>,
}

impl NullnessStore {
    pub(crate) fn empty() -> Self {
        Self::default()
    }

    /// Recorded value; `None` means unconstrained.
    pub(crate) fn get(&self, path: &AccessPath) -> Option<Nullness> {
        self.values.get(path).copied()
    }

    pub(crate) fn with_updates(&self, updates: &Updates) -> Self {
        if updates.is_empty() {
            return self.clone();
        }
        let mut values = self.values.clone();
        for (path, value) in &updates.0 {
            values.insert(path.clone(), *value);
        }
        Self { values }
    }

    pub(crate) fn len(&self) -> usize {
        self.values.len()
    }
}

impl AbstractStore for NullnessStore {
    fn least_upper_bound(&self, other: &Self) -> Self {
        let values = self
            .values
            .iter()
            .filter_map(|(path, left)| {
                other
                    .values
                    .get(path)
                    .map(|right| (path.clone(), left.least_upper_bound(*right)))
            })
            .collect();
        Self { values }
    }
}
