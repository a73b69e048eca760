//! pash ライブラリ: ベンチマーク・テスト用にモジュールを公開する。
//!
//! バイナリ本体は `main.rs` の REPL ループ。
//! この `lib.rs` は `benches/bench_main.rs` 等の外部クレートから
//! 展開・パス解決・spawn・実行機能に直接アクセスするために存在する。
//!
//! ## モジュール構成
//!
//! | モジュール | 役割 |
//! |-----------|------|
//! | [`parser`] | 空白区切りトークナイザ、末尾 `&` の除去、`\|` によるセグメント分割 |
//! | [`expand`] | トークン単位の `$VAR` 展開と `~` / `~/path` 展開 |
//! | [`resolve`] | `/` を含むパスの検査、`$PATH` の先頭から順の検索 |
//! | [`redirect`] | `<` / `>` の除去と対象ファイルのオープン（fd は所有値で管理） |
//! | [`executor`] | 単一コマンド・パイプラインの実行、fd の配線、バックグラウンド登録 |
//! | [`job`] | バックグラウンドジョブテーブル（容量制限、非ブロッキング完了検出、1 回限りの通知） |
//! | [`spawn`] | `posix_spawn` ラッパー（fd 付け替え、SIGPIPE のリセット） |
//! | [`builtins`] | ビルトイン（`exit`, `cd`, `jobs`） |
//! | [`shell`] | シェルのグローバル状態（終了ステータス、ジョブテーブル） |
//! | [`config`] | コマンドライン引数（`-c`, `--max-jobs`, `--no-rc`）と `$PASH_LOG` |
//! | [`error`] | エラーの集約と終了ステータスへの対応付け |

pub mod builtins;
pub mod config;
pub mod error;
pub mod executor;
pub mod expand;
pub mod job;
pub mod parser;
pub mod redirect;
pub mod resolve;
pub mod shell;
pub mod spawn;

/// `$HOME` など共有の環境変数を書き換えるテストを直列化する。
#[cfg(test)]
pub(crate) mod test_env {
    use std::sync::{Mutex, MutexGuard};

    static LOCK: Mutex<()> = Mutex::new(());

    pub(crate) fn lock() -> MutexGuard<'static, ()> {
        LOCK.lock().unwrap_or_else(|e| e.into_inner())
    }
}
