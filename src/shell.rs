//! シェルのグローバル状態を保持するモジュール。
//!
//! 環境変数は `std::env` を直接使用し、子プロセスへの自動継承を活用する。
//! ジョブテーブル（[`JobTable`]）は起動時に容量を決めて生成し、REPL ループ終了まで保持する。

use crate::config::Config;
use crate::job::JobTable;

/// シェルの実行状態。REPL ループ全体で共有される。
#[derive(Debug)]
pub struct Shell {
    /// 直前のコマンドの終了ステータス。プロンプト表示と `exit` のデフォルト値に使う。
    pub last_status: i32,
    /// `exit` ビルトインで true にセットされ、REPL ループを終了させる。
    pub should_exit: bool,
    /// バックグラウンドジョブテーブル。
    pub jobs: JobTable,
}

impl Default for Shell {
    fn default() -> Self {
        Self::new()
    }
}

impl Shell {
    pub fn new() -> Self {
        Self::with_config(&Config::default())
    }

    pub fn with_config(config: &Config) -> Self {
        Self {
            last_status: 0,
            should_exit: false,
            jobs: JobTable::with_capacity(config.max_jobs),
        }
    }

    /// 完了したバックグラウンドジョブを回収し、`[N] + done command` を出力する。
    ///
    /// プロンプト表示前に毎回呼ばれる。
    pub fn notify_jobs(&mut self) {
        for done in self.jobs.poll() {
            tracing::debug!(id = done.id, pid = done.pid, status = ?done.status, "job finished");
            println!("{}", done);
        }
    }
}
