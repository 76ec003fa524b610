//! Extension function name normalization and decoration permutations.
//!
//! Extension entry points are exported under decorated names (`glFooARB`,
//! `glFooEXT`, ...). A last-resort lookup strips any decoration and then tries
//! the bare name followed by every known suffix.

/// Suffixes of ratified extensions, stripped first.
const ARB_SUFFIXES: [&str; 3] = ["ARB", "OES", "KHR"];

/// Vendor suffixes.
const VENDOR_SUFFIXES: [&str; 19] = [
    "3DFX", "AMD", "ANGLE", "APPLE", "ARM", "ATI", "EXT", "HP", "IBM", "IMG", "INTEL", "MESAX",
    "MESA", "NV", "SGIS", "SGIX", "SGI", "SUN", "WIN",
];

fn strip_suffix<'a>(name: &'a str, suffixes: &[&str]) -> &'a str {
    for suffix in suffixes {
        if let Some(base) = name.strip_suffix(suffix) {
            // keep at least the "gl" prefix plus one character
            if base.len() > 2 {
                return base;
            }
        }
    }
    name
}

/// Strip one ARB-family suffix, then one vendor suffix.
pub fn normalize(name: &str) -> &str {
    strip_suffix(strip_suffix(name, &ARB_SUFFIXES), &VENDOR_SUFFIXES)
}

/// Number of permutations of a normalized base name.
pub const fn permutation_count() -> usize {
    1 + ARB_SUFFIXES.len() + VENDOR_SUFFIXES.len()
}

/// The `index`-th decorated variant of `base`.
///
/// Index 0 is the bare name, then one per ARB-family suffix, then one per
/// vendor suffix.
pub fn permutation(base: &str, index: usize) -> Option<String> {
    if index == 0 {
        return Some(base.to_string());
    }
    ARB_SUFFIXES
        .iter()
        .chain(VENDOR_SUFFIXES.iter())
        .nth(index - 1)
        .map(|suffix| format!("{base}{suffix}"))
}

/// All decorated variants of `name`, bare name first.
pub fn permutations(name: &str) -> impl Iterator<Item = String> + '_ {
    let base = normalize(name);
    (0..permutation_count()).filter_map(move |i| permutation(base, i))
}
