//! `posix_spawn()` の安全な Rust ラッパー。
//!
//! 外部コマンドは fork+exec ではなく `posix_spawn` で起動する。
//! パス解決は呼び出し側（[`resolve`](crate::resolve)）で済ませ、解決済みパスを実行イメージに、
//! ユーザが入力したコマンド名を `argv[0]` に渡す。
//!
//! ## 構成
//!
//! | 型 | 役割 |
//! |-----|------|
//! | [`SpawnAttr`] | `posix_spawnattr_t` の RAII ラッパー（シグナル設定） |
//! | [`FileActions`] | 子側での dup2 / close の列 |
//! | [`CStringVec`] | argv 用の NULL 終端ポインタ配列 |
//! | [`spawn`] | 上記を組み合わせて `posix_spawn` を呼ぶ公開関数 |

use std::env;
use std::ffi::CString;
use std::fmt;
use std::io;
use std::os::unix::ffi::{OsStrExt, OsStringExt};
use std::os::unix::io::RawFd;
use std::path::Path;

/// `posix_spawn` の失敗を表すエラー。
///
/// glibc / macOS の `posix_spawn` は子側の exec 失敗も errno として親に返すため、
/// プロセス生成の失敗（`EAGAIN` 等）と exec の失敗（`ENOEXEC` 等）の両方をここで表す。
#[derive(Debug)]
pub struct SpawnError {
    /// errno 値。
    pub errno: i32,
    /// ユーザが入力したコマンド名。
    pub command: String,
}

impl fmt::Display for SpawnError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.errno {
            libc::ENOENT => write!(f, "{}: command not found", self.command),
            libc::EACCES => write!(f, "{}: permission denied", self.command),
            libc::ENOEXEC => write!(f, "{}: exec format error", self.command),
            errno => write!(
                f,
                "{}: spawn failed: {}",
                self.command,
                io::Error::from_raw_os_error(errno)
            ),
        }
    }
}

impl std::error::Error for SpawnError {}

impl SpawnError {
    /// 終了ステータスへの対応。
    /// 127 = command not found, 126 = permission denied / exec format error, 1 = その他。
    pub fn exit_status(&self) -> i32 {
        match self.errno {
            libc::ENOENT => 127,
            libc::EACCES | libc::ENOEXEC => 126,
            _ => 1,
        }
    }
}

// ── SpawnAttr ─────────────────────────────────────────────────────

/// `posix_spawnattr_t` を所有し、drop 時に destroy する。
struct SpawnAttr {
    inner: libc::posix_spawnattr_t,
}

impl SpawnAttr {
    fn new() -> Self {
        unsafe {
            let mut attr: libc::posix_spawnattr_t = std::mem::zeroed();
            libc::posix_spawnattr_init(&mut attr);
            Self { inner: attr }
        }
    }

    /// 子で SIGPIPE を SIG_DFL に戻す。
    ///
    /// Rust ランタイムは起動時に SIGPIPE を無視に設定し、無視設定は exec を越えて継承される。
    /// 無視されたままだと、パイプラインの読み手が先に終了しても書き手が止まらない。
    fn set_sigdefault(&mut self) {
        unsafe {
            let mut flags: libc::c_short = 0;
            libc::posix_spawnattr_getflags(&self.inner, &mut flags);
            flags |= libc::POSIX_SPAWN_SETSIGDEF as libc::c_short;
            libc::posix_spawnattr_setflags(&mut self.inner, flags);

            let mut sigset: libc::sigset_t = std::mem::zeroed();
            libc::sigemptyset(&mut sigset);
            libc::sigaddset(&mut sigset, libc::SIGPIPE);
            libc::posix_spawnattr_setsigdefault(&mut self.inner, &sigset);
        }
    }

    fn as_ptr(&self) -> *const libc::posix_spawnattr_t {
        &self.inner
    }
}

impl Drop for SpawnAttr {
    fn drop(&mut self) {
        unsafe {
            libc::posix_spawnattr_destroy(&mut self.inner);
        }
    }
}

// ── FileActions ───────────────────────────────────────────────────

/// `posix_spawn_file_actions_t` を所有し、drop 時に destroy する。
struct FileActions {
    inner: libc::posix_spawn_file_actions_t,
}

impl FileActions {
    fn new() -> Self {
        unsafe {
            let mut actions: libc::posix_spawn_file_actions_t = std::mem::zeroed();
            libc::posix_spawn_file_actions_init(&mut actions);
            Self { inner: actions }
        }
    }

    /// 子側で `fd` を `newfd` に複製する。
    fn add_dup2(&mut self, fd: RawFd, newfd: RawFd) {
        unsafe {
            libc::posix_spawn_file_actions_adddup2(&mut self.inner, fd, newfd);
        }
    }

    /// 子側で `fd` を閉じる。
    fn add_close(&mut self, fd: RawFd) {
        unsafe {
            libc::posix_spawn_file_actions_addclose(&mut self.inner, fd);
        }
    }

    fn as_ptr(&self) -> *const libc::posix_spawn_file_actions_t {
        &self.inner
    }
}

impl Drop for FileActions {
    fn drop(&mut self) {
        unsafe {
            libc::posix_spawn_file_actions_destroy(&mut self.inner);
        }
    }
}

// ── CStringVec ────────────────────────────────────────────────────

/// argv / envp 用の CString ベクタ。NULL 終端のポインタ配列を構築する。
struct CStringVec {
    _strings: Vec<CString>,
    ptrs: Vec<*mut libc::c_char>,
}

impl CStringVec {
    /// 引数リストから構築する。NUL バイトを含む引数があれば `None`。
    fn from_args(args: &[String]) -> Option<Self> {
        let strings = args
            .iter()
            .map(|s| CString::new(s.as_str()).ok())
            .collect::<Option<Vec<CString>>>()?;
        Some(Self::from_strings(strings))
    }

    /// 現在の環境から `NAME=value` の列を作る。NUL を含むエントリは渡さない。
    ///
    /// `std::env::vars_os` 経由で読むため、同時に走る `set_var` とは std のロックで排他される。
    fn from_env() -> Self {
        let strings = env::vars_os()
            .filter_map(|(name, value)| {
                let mut entry = name.into_vec();
                entry.push(b'=');
                entry.extend_from_slice(value.as_bytes());
                CString::new(entry).ok()
            })
            .collect();
        Self::from_strings(strings)
    }

    fn from_strings(strings: Vec<CString>) -> Self {
        let mut ptrs: Vec<*mut libc::c_char> = strings
            .iter()
            .map(|s| s.as_ptr() as *mut libc::c_char)
            .collect();
        ptrs.push(std::ptr::null_mut()); // NULL 終端
        Self {
            _strings: strings,
            ptrs,
        }
    }

    fn as_ptr(&self) -> *const *mut libc::c_char {
        self.ptrs.as_ptr()
    }
}

/// `posix_spawn` で子プロセスを起動する。成功時は子 PID を返す。
///
/// - `program`: 解決済みの実行ファイルパス
/// - `args`: `args[0]` はユーザが入力したコマンド名（解決前）
/// - `stdin_fd` / `stdout_fd`: 子の 0 / 1 番に付け替える fd。`None` ならシェルのものを継承
/// - `fds_to_close`: 子で閉じる fd（使わないパイプ端）
///
/// 渡した fd は親側では閉じない。所有者（パイプ・リダイレクト計画）が drop で閉じる。
pub fn spawn(
    program: &Path,
    args: &[String],
    stdin_fd: Option<RawFd>,
    stdout_fd: Option<RawFd>,
    fds_to_close: &[RawFd],
) -> Result<libc::pid_t, SpawnError> {
    let command = args.first().cloned().unwrap_or_default();
    let invalid = || SpawnError {
        errno: libc::EINVAL,
        command: command.clone(),
    };

    let path = CString::new(program.as_os_str().as_bytes()).map_err(|_| invalid())?;
    let argv = CStringVec::from_args(args).ok_or_else(invalid)?;

    let mut attr = SpawnAttr::new();
    attr.set_sigdefault();

    // ファイルアクション: fd の付け替え + クローズ
    let mut actions = FileActions::new();

    if let Some(fd) = stdin_fd {
        actions.add_dup2(fd, libc::STDIN_FILENO);
        if fd != libc::STDIN_FILENO {
            actions.add_close(fd);
        }
    }
    if let Some(fd) = stdout_fd {
        actions.add_dup2(fd, libc::STDOUT_FILENO);
        if fd != libc::STDOUT_FILENO {
            actions.add_close(fd);
        }
    }

    // stdin/stdout に付け替えた fd は上で close 済み
    let bound = [stdin_fd, stdout_fd];
    for &fd in fds_to_close.iter().filter(|&&fd| !bound.contains(&Some(fd))) {
        actions.add_close(fd);
    }

    let envp = CStringVec::from_env();

    let mut pid: libc::pid_t = 0;

    let ret = unsafe {
        libc::posix_spawn(
            &mut pid,
            path.as_ptr(),
            actions.as_ptr(),
            attr.as_ptr(),
            argv.as_ptr(),
            envp.as_ptr(),
        )
    };

    if ret != 0 {
        return Err(SpawnError {
            errno: ret,
            command,
        });
    }

    tracing::debug!(pid, program = %program.display(), ?stdin_fd, ?stdout_fd, "spawned");
    Ok(pid)
}
