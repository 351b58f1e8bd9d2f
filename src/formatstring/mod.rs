pub(crate) mod formatter;
pub(crate) mod sample;
pub(crate) mod strict;
pub(crate) mod validation;
