//! Snapshot merging for review runs
//!
//! A review never touches the caller's working tree: the base tree is
//! copied into a private temporary directory and the incoming patch is
//! applied there with `git apply`. The returned snapshot owns the
//! directory, so cleanup happens on every exit path.

use crate::connector::SnapshotTree;
use crate::error::{AuditError, Result};
use std::fs;
use std::path::Path;
use std::process::Command;
use tracing::debug;

/// Copy `base_tree` into a fresh temp directory and apply `patch` there.
pub fn merge_snapshot(base_tree: &Path, patch: &str) -> Result<SnapshotTree> {
    let tempdir = tempfile::TempDir::with_prefix("repopulse-review-")
        .map_err(|e| AuditError::Analysis(format!("review workspace: {e}")))?;

    copy_tree(base_tree, tempdir.path())?;

    let patch_file = tempdir.path().join(".repopulse-incoming.patch");
    fs::write(&patch_file, patch)
        .map_err(|e| AuditError::Analysis(format!("writing patch: {e}")))?;

    let output = Command::new("git")
        .arg("apply")
        .arg("--whitespace=nowarn")
        .arg(&patch_file)
        .current_dir(tempdir.path())
        .output()
        .map_err(|e| AuditError::Analysis(format!("running git apply: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(AuditError::Analysis(format!(
            "patch does not apply: {}",
            stderr.trim()
        )));
    }
    fs::remove_file(&patch_file)
        .map_err(|e| AuditError::Analysis(format!("removing patch file: {e}")))?;

    debug!("merged patch into {}", tempdir.path().display());
    let path = tempdir.path().to_path_buf();
    Ok(SnapshotTree::new(path, Some(tempdir)))
}

/// Recursive copy, skipping the VCS directory
fn copy_tree(src: &Path, dst: &Path) -> Result<()> {
    let entries = fs::read_dir(src)
        .map_err(|e| AuditError::Analysis(format!("reading {}: {e}", src.display())))?;
    for entry in entries {
        let entry = entry.map_err(|e| AuditError::Analysis(format!("reading dir entry: {e}")))?;
        let name = entry.file_name();
        if name == ".git" {
            continue;
        }
        let src_path = entry.path();
        let dst_path = dst.join(&name);
        let file_type = entry
            .file_type()
            .map_err(|e| AuditError::Analysis(format!("stat {}: {e}", src_path.display())))?;
        if file_type.is_dir() {
            fs::create_dir(&dst_path)
                .map_err(|e| AuditError::Analysis(format!("creating {}: {e}", dst_path.display())))?;
            copy_tree(&src_path, &dst_path)?;
        } else if file_type.is_file() {
            fs::copy(&src_path, &dst_path)
                .map_err(|e| AuditError::Analysis(format!("copying {}: {e}", src_path.display())))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const PATCH: &str = "\
--- a/app.py
+++ b/app.py
@@ -1,2 +1,3 @@
 def main():
     pass
+# reviewed
";

    fn base_tree() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("app.py"), "def main():\n    pass\n").unwrap();
        fs::create_dir(dir.path().join(".git")).unwrap();
        fs::write(dir.path().join(".git").join("HEAD"), "ref: x\n").unwrap();
        dir
    }

    #[test]
    fn test_merge_applies_patch_to_copy() {
        let base = base_tree();
        let merged = merge_snapshot(base.path(), PATCH).unwrap();

        let merged_content = fs::read_to_string(merged.path().join("app.py")).unwrap();
        assert!(merged_content.contains("# reviewed"));
        // Base tree is untouched
        let base_content = fs::read_to_string(base.path().join("app.py")).unwrap();
        assert!(!base_content.contains("# reviewed"));
        // VCS directory is not copied
        assert!(!merged.path().join(".git").exists());
    }

    #[test]
    fn test_merge_rejects_bad_patch() {
        let base = base_tree();
        let bad = "--- a/missing.py\n+++ b/missing.py\n@@ -1 +1 @@\n-x\n+y\n";
        let err = merge_snapshot(base.path(), bad).unwrap_err();
        assert!(matches!(err, AuditError::Analysis(_)));
    }

    #[test]
    fn test_snapshot_cleans_up_on_drop() {
        let base = base_tree();
        let merged = merge_snapshot(base.path(), PATCH).unwrap();
        let path = merged.path().to_path_buf();
        assert!(path.exists());
        drop(merged);
        assert!(!path.exists());
    }
}
