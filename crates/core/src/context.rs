use crate::models::RetrievedUnit;

pub const UNIT_SEPARATOR: &str = "\n\n---\n\n";

/// Joins retrieved unit text in the order given. Nothing is re-ranked or cut.
pub fn assemble(units: &[RetrievedUnit]) -> String {
    units
        .iter()
        .map(|retrieved| retrieved.unit.text.as_str())
        .collect::<Vec<_>>()
        .join(UNIT_SEPARATOR)
}

/// Splits an assembled context back into its units.
pub fn split_context(context: &str) -> Vec<&str> {
    if context.is_empty() {
        return Vec::new();
    }
    context.split(UNIT_SEPARATOR).collect()
}
