//! Identifier case helpers

/// Lower-case the first character: `LoadFail` to `loadFail`
#[must_use]
pub fn lower_first(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Factory name for a case label or class reference
///
/// Takes the segment after the last `.`, so both `XActionTypes.LoadFail`
/// and `LoadFail` become `loadFail`.
#[must_use]
pub fn factory_name(label: &str) -> String {
    lower_first(label.rsplit('.').next().unwrap_or(label).trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lowers_first_char_only() {
        assert_eq!(lower_first("LoadFail"), "loadFail");
        assert_eq!(lower_first("SetGTMToken"), "setGTMToken");
        assert_eq!(lower_first("load"), "load");
        assert_eq!(lower_first(""), "");
    }

    #[test]
    fn factory_names_from_labels() {
        assert_eq!(factory_name("ProductsActionTypes.LoadProduct"), "loadProduct");
        assert_eq!(factory_name("LoadProduct"), "loadProduct");
        assert_eq!(factory_name(" Ns.Deep.Thing "), "thing");
    }
}
