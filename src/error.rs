//! executor が扱うエラーの集約型。
//!
//! 各モジュールのエラー（パス解決、リダイレクト、構文、spawn、ジョブ登録、ビルトイン）を 1 つにまとめ、
//! 終了ステータスへの対応付けを提供する。どのエラーもシェル本体を終了させない。

use std::io;

use thiserror::Error;

use crate::builtins::BuiltinError;
use crate::job::JobError;
use crate::parser::ParseError;
use crate::redirect::RedirectError;
use crate::resolve::ResolveError;
use crate::spawn::SpawnError;

#[derive(Debug, Error)]
pub enum ShellError {
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    #[error(transparent)]
    Redirect(#[from] RedirectError),
    #[error(transparent)]
    Syntax(#[from] ParseError),
    #[error(transparent)]
    Spawn(#[from] SpawnError),
    #[error(transparent)]
    Job(#[from] JobError),
    #[error(transparent)]
    Builtin(#[from] BuiltinError),
    /// パイプ作成の失敗（fd 枯渇など）。
    #[error("pipe: {0}")]
    Pipe(#[source] io::Error),
}

impl ShellError {
    /// エラーに対応する終了ステータス。
    pub fn exit_status(&self) -> i32 {
        match self {
            Self::Resolve(e) => e.exit_status(),
            Self::Spawn(e) => e.exit_status(),
            Self::Builtin(e) => e.exit_status(),
            Self::Syntax(_) => 2,
            Self::Redirect(_) | Self::Pipe(_) => 1,
            // ジョブ自体は起動済みなので成功扱い
            Self::Job(_) => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        let e: ShellError = ResolveError::NotFound("x".into()).into();
        assert_eq!(e.exit_status(), 127);
        assert_eq!(e.to_string(), "x: command not found");
        let e: ShellError = ParseError::EmptyPipelineSegment.into();
        assert_eq!(e.exit_status(), 2);
        let e: ShellError = RedirectError::MissingTarget(">".into()).into();
        assert_eq!(e.exit_status(), 1);
    }

    #[test]
    fn pipe_error_message() {
        let e = ShellError::Pipe(io::Error::from_raw_os_error(libc::EMFILE));
        assert!(e.to_string().starts_with("pipe: "));
    }
}
