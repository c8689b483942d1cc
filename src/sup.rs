use crate::Map;
use anyhow::bail;
use std::path::Path;

/// $key = value; used to resolve file paths
pub type Manifest = Map<String, String>;

/// component name -> directory or file
pub type Components = Map<String, String>;

/// Substitute manifest markers in `val` and anchor relative paths at `base`.
///
/// Without a base, relative paths are left as they are.
pub fn resolve_manifest(val: &mut String, manifest: &Manifest, base: Option<&Path>) -> anyhow::Result<()> {
    // Strip out {} to reduce ${key} to $key
    *val = val.replace(['{', '}'], "");
    // Longest keys first, so $BASE_DIR is not eaten by $BASE
    let mut keys = manifest.iter().collect::<Vec<_>>();
    keys.sort_by_key(|(k, _)| std::cmp::Reverse(k.len()));
    let mut rounds = 0;
    'a: loop {
        for (k, v) in &keys {
            if val.contains(k.as_str()) {
                *val = val.replace(k.as_str(), v);
                rounds += 1;
                if rounds > manifest.len() * 8 {
                    bail!("Manifest does not terminate on {val}");
                }
                continue 'a;
            }
        }
        if val.contains('$') {
            bail!("Unresolved marker: {val}; manifest={manifest:?}");
        }
        break;
    }
    if let Some(base) = base {
        if let Some(rest) = val.strip_prefix("./") {
            *val = base.join(rest).display().to_string();
        } else if !Path::new(val.as_str()).is_absolute() {
            *val = base.join(&*val).display().to_string();
        }
    }
    Ok(())
}
