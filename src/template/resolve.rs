//! Template and layout lookup inside the templates directory.

use std::path::{Component, Path, PathBuf};

pub const TEMPLATE_EXTENSION: &str = "hbs";

/// Join `reference` onto `root` without leaving it.
///
/// `..` may climb back up inside the reference but never above `root`;
/// absolute references are rejected. Purely lexical.
pub fn sandboxed(root: &Path, reference: &str) -> Option<PathBuf> {
    let mut rel = PathBuf::new();
    for component in Path::new(reference).components() {
        match component {
            Component::Normal(part) => rel.push(part),
            Component::CurDir => {}
            Component::ParentDir => {
                if !rel.pop() {
                    return None;
                }
            }
            Component::RootDir | Component::Prefix(_) => return None,
        }
    }

    if rel.as_os_str().is_empty() {
        return None;
    }
    if rel.extension().is_none() {
        rel.set_extension(TEMPLATE_EXTENSION);
    }
    Some(root.join(rel))
}
