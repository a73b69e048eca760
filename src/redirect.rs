//! リダイレクト計画: トークン列から `<` / `>` を取り除き、対象ファイルを開く。
//!
//! 開いたファイルは [`RedirectPlan`] が所有し、drop で close される。
//! spawn 後に親側で plan を drop すれば、成功・失敗どちらの経路でも fd は残らない。
//! `std::fs` のファイルは close-on-exec 付きで開かれるため、無関係な子プロセスには継承されない。

use std::fs::File;
use std::io;
use std::os::unix::io::{AsRawFd, RawFd};

use thiserror::Error;

/// 出力リダイレクト（切り詰め書き込み）。
pub const OUTPUT: &str = ">";
/// 入力リダイレクト。
pub const INPUT: &str = "<";

/// リダイレクトの失敗。どちらの場合もプロセスは起動しない。
#[derive(Debug, Error)]
pub enum RedirectError {
    /// リダイレクト演算子が行末にあり、ファイル名がない。
    #[error("syntax error: `{0}' needs a file name")]
    MissingTarget(String),
    /// 対象ファイルを開けない。
    #[error("{path}: {source}")]
    Open {
        path: String,
        #[source]
        source: io::Error,
    },
}

/// 1 コマンド分のリダイレクト計画。
#[derive(Debug, Default)]
pub struct RedirectPlan {
    /// リダイレクト演算子とファイル名を除いた引数列。
    pub args: Vec<String>,
    /// stdin に接続するファイル。
    pub stdin: Option<File>,
    /// stdout に接続するファイル。
    pub stdout: Option<File>,
}

impl RedirectPlan {
    /// stdin に接続する raw fd。
    pub fn stdin_fd(&self) -> Option<RawFd> {
        self.stdin.as_ref().map(AsRawFd::as_raw_fd)
    }

    /// stdout に接続する raw fd。
    pub fn stdout_fd(&self) -> Option<RawFd> {
        self.stdout.as_ref().map(AsRawFd::as_raw_fd)
    }
}

/// トークン列を左から走査してリダイレクトを計画する。
///
/// 同じ向きのリダイレクトが複数あれば最後の指定が有効（前のファイルはその場で close）。
/// 途中でオープンに失敗すると、それまでに開いたファイルも drop で閉じられる。
pub fn plan(tokens: &[String]) -> Result<RedirectPlan, RedirectError> {
    let mut plan = RedirectPlan::default();
    let mut iter = tokens.iter();

    while let Some(token) = iter.next() {
        match token.as_str() {
            OUTPUT => {
                let target = iter
                    .next()
                    .ok_or_else(|| RedirectError::MissingTarget(OUTPUT.to_string()))?;
                plan.stdout = Some(open(target, |p| File::create(p))?);
            }
            INPUT => {
                let target = iter
                    .next()
                    .ok_or_else(|| RedirectError::MissingTarget(INPUT.to_string()))?;
                plan.stdin = Some(open(target, |p| File::open(p))?);
            }
            _ => plan.args.push(token.clone()),
        }
    }

    Ok(plan)
}

/// リダイレクト演算子とそのファイル名を飛ばした最初のトークン（コマンド名）を返す。
///
/// ファイルを開かずに判定するため、パス解決をリダイレクトより先に行える。
pub fn command_name(tokens: &[String]) -> Option<&str> {
    let mut iter = tokens.iter();
    while let Some(token) = iter.next() {
        match token.as_str() {
            OUTPUT | INPUT => {
                iter.next();
            }
            name => return Some(name),
        }
    }
    None
}

fn open<F>(path: &str, f: F) -> Result<File, RedirectError>
where
    F: FnOnce(&str) -> io::Result<File>,
{
    f(path).map_err(|source| RedirectError::Open {
        path: path.to_string(),
        source,
    })
}
