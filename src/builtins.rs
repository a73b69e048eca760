//! ビルトインコマンドの実装。
//!
//! ビルトインは spawn を経由せずプロセス内で直接実行される。
//! パイプラインやバックグラウンド指定の中では使われず、単独のフォアグラウンドコマンドのときだけ有効。
//! 通常出力は呼び出し側が渡す `out`（`>` があればそのファイル）に書き、
//! 失敗は [`BuiltinError`] として返して executor が `pash: ...` を報告する。

use std::env;
use std::io::{self, Write};
use std::path::PathBuf;

use thiserror::Error;

use crate::job::JobState;
use crate::shell::Shell;

/// ビルトインの失敗。
#[derive(Debug, Error)]
pub enum BuiltinError {
    #[error("exit: {0}: numeric argument required")]
    ExitArgument(String),
    #[error("cd: HOME not set")]
    HomeNotSet,
    #[error("cd: {}: {source}", dir.display())]
    ChangeDir {
        dir: PathBuf,
        #[source]
        source: io::Error,
    },
    /// 出力先への書き込み失敗。
    #[error("{name}: write error: {source}")]
    Output {
        name: &'static str,
        #[source]
        source: io::Error,
    },
}

impl BuiltinError {
    /// `exit` の引数エラーは 2、それ以外は 1。
    pub fn exit_status(&self) -> i32 {
        match self {
            Self::ExitArgument(_) => 2,
            _ => 1,
        }
    }
}

/// ビルトイン名か判定する。
pub fn is_builtin(name: &str) -> bool {
    matches!(name, "exit" | "cd" | "jobs")
}

/// ビルトインコマンドの実行を試みる。
///
/// 該当するビルトインがなければ `None`（外部コマンドとして実行すべき）。
pub fn try_exec(
    shell: &mut Shell,
    args: &[&str],
    out: &mut dyn Write,
) -> Option<Result<i32, BuiltinError>> {
    let (&name, rest) = args.split_first()?;
    let result = match name {
        "exit" => exit(shell, rest.first().copied()),
        "cd" => cd(rest.first().copied()),
        "jobs" => jobs(shell, out),
        _ => return None,
    };
    Some(result)
}

/// `exit [N]`: 終了フラグを立てる。N 省略時は直前のステータスを使う。
///
/// 引数が数値でなくてもシェルは終了する（ステータス 2）。
fn exit(shell: &mut Shell, code: Option<&str>) -> Result<i32, BuiltinError> {
    shell.should_exit = true;
    match code {
        None => Ok(shell.last_status),
        Some(arg) => arg
            .parse()
            .map_err(|_| BuiltinError::ExitArgument(arg.to_string())),
    }
}

/// `cd [dir]`: 引数省略時は `$HOME`。
fn cd(dir: Option<&str>) -> Result<i32, BuiltinError> {
    let dir = match dir {
        Some(d) => PathBuf::from(d),
        None => env::var_os("HOME")
            .map(PathBuf::from)
            .ok_or(BuiltinError::HomeNotSet)?,
    };
    env::set_current_dir(&dir).map_err(|source| BuiltinError::ChangeDir { dir, source })?;
    Ok(0)
}

/// `jobs`: 追跡中のジョブを `[N] running command` 形式で一覧表示する。
fn jobs(shell: &Shell, out: &mut dyn Write) -> Result<i32, BuiltinError> {
    for job in shell.jobs.iter() {
        let state = match job.state {
            JobState::Running => "running",
            JobState::Completed(_) => "done",
        };
        writeln!(out, "[{}] {} {}", job.id, state, job.command)
            .map_err(|source| BuiltinError::Output { name: "jobs", source })?;
    }
    Ok(0)
}
