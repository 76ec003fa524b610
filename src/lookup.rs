//! Dynamic symbol lookup collaborator.

/// Resolves native entry points by name.
///
/// Returns the entry point's address, or 0 if the symbol is unknown.
pub trait DynamicLookup: Send + Sync {
    fn resolve(&self, name: &str) -> usize;
}
