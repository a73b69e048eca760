//! 起動時設定: コマンドライン引数（`argh`）と環境変数。
//!
//! | 設定 | 由来 | 既定値 |
//! |------|------|--------|
//! | `-c <command>` | 引数 | なし（対話モード） |
//! | `--max-jobs <n>` | 引数 | [`JobTable::DEFAULT_CAPACITY`] |
//! | `--no-rc` | 引数 | `~/.pashrc` を読む |
//! | ログフィルタ | `$PASH_LOG` | 出力なし |

use std::path::PathBuf;

use argh::FromArgs;
use tracing_subscriber::EnvFilter;

use crate::job::JobTable;

/// ログフィルタを指定する環境変数（`tracing_subscriber::EnvFilter` の書式）。
pub const LOG_ENV: &str = "PASH_LOG";

/// rc ファイル名（`$HOME` 直下）。
const RC_FILE: &str = ".pashrc";

#[derive(FromArgs, Debug, PartialEq)]
/// pash: a small interactive command interpreter.
pub struct Config {
    /// run a single command line and exit with its status
    #[argh(option, short = 'c')]
    pub command: Option<String>,

    /// maximum number of background jobs tracked at once
    #[argh(option, default = "JobTable::DEFAULT_CAPACITY")]
    pub max_jobs: usize,

    /// do not read ~/.pashrc at startup
    #[argh(switch)]
    pub no_rc: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            command: None,
            max_jobs: JobTable::DEFAULT_CAPACITY,
            no_rc: false,
        }
    }
}

impl Config {
    /// 起動時に読む rc ファイルのパス。`--no-rc` 指定時や `$HOME` 未設定時は `None`。
    pub fn rc_path(&self) -> Option<PathBuf> {
        if self.no_rc {
            return None;
        }
        let home = std::env::var_os("HOME")?;
        Some(PathBuf::from(home).join(RC_FILE))
    }
}

/// `$PASH_LOG` に従って stderr 向けの tracing subscriber を設定する。
///
/// 未設定ならフィルタは `off` になり、ユーザ向けのエラー表示（`eprintln!`）だけが出る。
pub fn init_logging() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("off"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Config, argh::EarlyExit> {
        Config::from_args(&["pash"], args)
    }

    #[test]
    fn defaults() {
        assert_eq!(parse(&[]).unwrap(), Config::default());
    }

    #[test]
    fn command_flag() {
        let c = parse(&["-c", "echo hi"]).unwrap();
        assert_eq!(c.command.as_deref(), Some("echo hi"));
    }

    #[test]
    fn max_jobs_flag() {
        assert_eq!(parse(&["--max-jobs", "3"]).unwrap().max_jobs, 3);
    }

    #[test]
    fn bad_max_jobs() {
        assert!(parse(&["--max-jobs", "many"]).is_err());
    }

    #[test]
    fn no_rc_disables_rc_path() {
        assert_eq!(parse(&["--no-rc"]).unwrap().rc_path(), None);
    }

    #[test]
    fn rc_path_under_home() {
        let _guard = crate::test_env::lock();
        let home = std::env::var("HOME").unwrap();
        assert_eq!(
            Config::default().rc_path(),
            Some(PathBuf::from(home).join(".pashrc"))
        );
    }
}
