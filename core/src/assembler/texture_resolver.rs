//! Resolves the bare texture filenames recorded on an imported material
//! against an asset root, the way MSFS scenery addons lay textures out:
//! by case-insensitive recursive filename search, ties broken by
//! longest common path-prefix with the BGL file that referenced them.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};

use walkdir::WalkDir;

/// A filename-indexed snapshot of an asset root, built once per
/// conversion run and reused for every texture lookup.
pub struct TextureIndex {
    by_lower_name: HashMap<String, Vec<PathBuf>>,
}

impl TextureIndex {
    /// Walks `asset_root` recursively, indexing every regular file by
    /// its lowercased file name.
    #[must_use]
    pub fn build(asset_root: &Path) -> Self {
        let mut by_lower_name: HashMap<String, Vec<PathBuf>> = HashMap::new();
        for entry in WalkDir::new(asset_root).into_iter().filter_map(Result::ok) {
            if !entry.file_type().is_file() {
                continue;
            }
            let Some(name) = entry.file_name().to_str() else { continue };
            by_lower_name.entry(name.to_lowercase()).or_default().push(entry.into_path());
        }
        Self { by_lower_name }
    }

    /// Resolves `raw_uri` (a bare filename, possibly carrying a
    /// relative directory prefix from the glTF image URI) against this
    /// index. When multiple files share the name, the candidate whose
    /// path shares the longest component-wise prefix with
    /// `source_bgl_path` wins.
    #[must_use]
    pub fn resolve(&self, raw_uri: &str, source_bgl_path: &Path) -> Option<PathBuf> {
        let file_name = Path::new(raw_uri).file_name()?.to_str()?.to_lowercase();
        let candidates = self.by_lower_name.get(&file_name)?;
        if candidates.len() == 1 {
            return Some(candidates[0].clone());
        }

        let source_components: Vec<Component<'_>> = source_bgl_path.components().collect();
        candidates
            .iter()
            .max_by_key(|candidate| common_prefix_len(&source_components, candidate))
            .cloned()
    }
}

fn common_prefix_len(source_components: &[Component<'_>], candidate: &Path) -> usize {
    candidate
        .components()
        .zip(source_components.iter())
        .take_while(|(a, b)| a == *b)
        .count()
}
