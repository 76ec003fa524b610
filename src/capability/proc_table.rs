use std::collections::HashMap;

use crate::lookup::DynamicLookup;
use crate::platform::PlatformKind;

/// Resolved entry point addresses, keyed by portable name.
///
/// Unresolved names are kept with address 0 so a lookup can tell "absent"
/// from "never asked".
#[derive(Debug, Clone, Default)]
pub struct ProcAddressTable {
    entries: HashMap<String, usize>,
}

impl ProcAddressTable {
    /// Resolve every name through `lookup`, applying the platform's
    /// function-name aliasing first.
    pub fn resolve<'a, I>(names: I, kind: PlatformKind, lookup: &dyn DynamicLookup) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let entries = names
            .into_iter()
            .map(|name| {
                let address = lookup.resolve(kind.map_function_name(name));
                (name.to_string(), address)
            })
            .collect();
        Self { entries }
    }

    /// Address of `name`, 0 if unresolved or not part of this table.
    pub fn address(&self, name: &str) -> usize {
        self.entries.get(name).copied().unwrap_or(0)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.address(name) != 0
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn resolved_count(&self) -> usize {
        self.entries.values().filter(|&&addr| addr != 0).count()
    }
}
