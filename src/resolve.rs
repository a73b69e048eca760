//! 実行ファイルのパス解決。
//!
//! - `/` を含むコマンド: そのパスをそのまま検査（検索なし）
//! - それ以外: `$PATH` の各ディレクトリを先頭から順に検索し、最初に見つかった実行可能ファイルを返す
//!
//! 実行可能判定は「通常ファイルで、いずれかの実行ビットが立っている」。
//! 解決時点の判定であり、exec 時点での実行可能性は保証しない。

use std::env;
use std::ffi::OsStr;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// パス解決の失敗。
#[derive(Debug, PartialEq, Error)]
pub enum ResolveError {
    /// `$PATH` 上に見つからない、`$PATH` 未設定、または明示パスが存在しない。
    #[error("{0}: command not found")]
    NotFound(String),
    /// 明示パスは存在するが実行できない（ディレクトリ、実行ビットなし）。
    #[error("{0}: permission denied")]
    NotExecutable(String),
}

impl ResolveError {
    /// エラーに対応する終了ステータス。127 = not found, 126 = not executable。
    pub fn exit_status(&self) -> i32 {
        match self {
            Self::NotFound(_) => 127,
            Self::NotExecutable(_) => 126,
        }
    }
}

/// 現在の `$PATH` でコマンドを解決する。
pub fn resolve(command: &str) -> Result<PathBuf, ResolveError> {
    let path = env::var_os("PATH");
    resolve_in(command, path.as_deref())
}

/// 指定した PATH 文字列でコマンドを解決する。`path` が `None` なら検索は常に失敗する。
pub fn resolve_in(command: &str, path: Option<&OsStr>) -> Result<PathBuf, ResolveError> {
    if command.contains('/') {
        let candidate = Path::new(command);
        if is_executable(candidate) {
            return Ok(candidate.to_path_buf());
        }
        return Err(if candidate.exists() {
            ResolveError::NotExecutable(command.to_string())
        } else {
            ResolveError::NotFound(command.to_string())
        });
    }

    let path = path.ok_or_else(|| ResolveError::NotFound(command.to_string()))?;
    env::split_paths(path)
        .filter(|dir| !dir.as_os_str().is_empty())
        .map(|dir| dir.join(command))
        .find(|candidate| is_executable(candidate))
        .ok_or_else(|| ResolveError::NotFound(command.to_string()))
}

/// 通常ファイルで実行ビットが立っているか。シンボリックリンクは辿る。
fn is_executable(path: &Path) -> bool {
    if let Ok(meta) = path.metadata() {
        if meta.is_file() {
            return meta.permissions().mode() & 0o111 != 0;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    /// テスト用ディレクトリを作り、指定モードのファイルを置く。
    fn scratch_dir(name: &str) -> PathBuf {
        let dir = env::temp_dir().join(format!("pash_resolve_{}_{}", name, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn touch(path: &Path, mode: u32) {
        fs::write(path, "#!/bin/sh\n").unwrap();
        fs::set_permissions(path, fs::Permissions::from_mode(mode)).unwrap();
    }

    #[test]
    fn explicit_path() {
        assert_eq!(resolve("/bin/sh"), Ok(PathBuf::from("/bin/sh")));
    }

    #[test]
    fn explicit_missing() {
        assert_eq!(
            resolve("/no/such/pash_cmd"),
            Err(ResolveError::NotFound("/no/such/pash_cmd".to_string()))
        );
    }

    #[test]
    fn explicit_directory_not_executable() {
        let err = resolve_in("/tmp/", None).unwrap_err();
        assert_eq!(err, ResolveError::NotExecutable("/tmp/".to_string()));
        assert_eq!(err.exit_status(), 126);
    }

    #[test]
    fn search_first_match_wins() {
        let a = scratch_dir("first_a");
        let b = scratch_dir("first_b");
        touch(&a.join("tool"), 0o755);
        touch(&b.join("tool"), 0o755);
        let path = env::join_paths([&a, &b]).unwrap();
        assert_eq!(resolve_in("tool", Some(path.as_os_str())), Ok(a.join("tool")));
        let _ = fs::remove_dir_all(&a);
        let _ = fs::remove_dir_all(&b);
    }

    #[test]
    fn search_skips_non_executable() {
        let a = scratch_dir("noexec_a");
        let b = scratch_dir("noexec_b");
        touch(&a.join("tool"), 0o644);
        touch(&b.join("tool"), 0o700);
        let path = env::join_paths([&a, &b]).unwrap();
        assert_eq!(resolve_in("tool", Some(path.as_os_str())), Ok(b.join("tool")));
        let _ = fs::remove_dir_all(&a);
        let _ = fs::remove_dir_all(&b);
    }

    #[test]
    fn search_not_found() {
        let err = resolve("pash_surely_missing_command").unwrap_err();
        assert_eq!(err.to_string(), "pash_surely_missing_command: command not found");
        assert_eq!(err.exit_status(), 127);
    }

    #[test]
    fn missing_path_variable() {
        assert_eq!(
            resolve_in("sh", None),
            Err(ResolveError::NotFound("sh".to_string()))
        );
    }

    #[test]
    fn empty_path_entries_ignored() {
        let path = OsStr::new("::/bin");
        assert_eq!(resolve_in("sh", Some(path)), Ok(PathBuf::from("/bin/sh")));
    }
}
