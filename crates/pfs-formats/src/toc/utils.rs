//! Path helpers shared by lookup and building

/// Split a file name into the name and extension pool strings
///
/// The extension is everything after the last dot. Names without a dot, or
/// whose dot is leading or trailing, have an empty extension and keep the
/// whole component as the name, so [`join_component`] restores the input.
pub(crate) fn split_component(component: &str) -> (&str, &str) {
    match component.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => (stem, ext),
        _ => (component, ""),
    }
}

/// Rebuild a file name from its pool strings
pub(crate) fn join_component(name: &str, extension: &str) -> String {
    if extension.is_empty() {
        name.to_string()
    } else {
        format!("{name}.{extension}")
    }
}

/// Split a path into non-empty components
pub(crate) fn path_components(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_component() {
        assert_eq!(split_component("bgm.ogg"), ("bgm", "ogg"));
        assert_eq!(split_component("a.tar.gz"), ("a.tar", "gz"));
        assert_eq!(split_component("README"), ("README", ""));
        assert_eq!(split_component(".hidden"), (".hidden", ""));
        assert_eq!(split_component("trailing."), ("trailing.", ""));
    }

    #[test]
    fn test_join_restores_component() {
        for component in ["bgm.ogg", "a.tar.gz", "README", ".hidden", "trailing."] {
            let (name, ext) = split_component(component);
            assert_eq!(join_component(name, ext), component);
        }
    }

    #[test]
    fn test_path_components_skip_empty() {
        assert_eq!(path_components("/data//sound/bgm.ogg"), ["data", "sound", "bgm.ogg"]);
        assert!(path_components("///").is_empty());
    }
}
