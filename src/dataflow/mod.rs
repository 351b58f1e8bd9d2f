pub(crate) mod worklist;
