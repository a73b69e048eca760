//! pash: 小さな対話型コマンドインタプリタ
//!
//! REPLループ: ジョブ完了通知 → プロンプト表示 → 1 行読み取り → 展開・実行 → ループ
//!
//! ## モジュール構成
//!
//! | モジュール | 役割 |
//! |-----------|------|
//! | [`parser`](pash::parser) | 空白区切りトークナイザ、`&` / `\|` の識別 |
//! | [`expand`](pash::expand) | `$VAR` 展開、`~` 展開 |
//! | [`resolve`](pash::resolve) | `$PATH` 検索によるパス解決 |
//! | [`redirect`](pash::redirect) | `<` / `>` の計画とファイルオープン |
//! | [`executor`](pash::executor) | 単一コマンド・パイプラインの実行、バックグラウンド登録 |
//! | [`job`](pash::job) | バックグラウンドジョブテーブルと非ブロッキング完了検出 |
//! | [`spawn`](pash::spawn) | `posix_spawn` ラッパー |
//! | [`builtins`](pash::builtins) | ビルトイン（`exit`, `cd`, `jobs`） |
//! | [`shell`](pash::shell) | シェルのグローバル状態 |
//! | [`config`](pash::config) | コマンドライン引数とログ設定 |

use std::io::{self, BufRead, Write};

use pash::config::{self, Config};
use pash::executor;
use pash::shell::Shell;

/// `~/.pashrc` を読み込んで各行を実行する。ファイルが存在しなければサイレントスキップ。
fn load_rc(shell: &mut Shell, config: &Config) {
    let Some(rc_path) = config.rc_path() else {
        return;
    };
    let content = match std::fs::read_to_string(&rc_path) {
        Ok(c) => c,
        Err(_) => return, // ファイルなし → サイレントスキップ
    };
    for line in content.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        shell.last_status = executor::execute(shell, trimmed);
        if shell.should_exit {
            break;
        }
    }
}

/// プロンプト文字列。終了ステータスが非ゼロなら接頭辞に付ける。
fn prompt(last_status: i32) -> String {
    if last_status == 0 {
        "pash$ ".to_string()
    } else {
        format!("[{}] pash$ ", last_status)
    }
}

fn repl(shell: &mut Shell) {
    let stdin = io::stdin();
    let mut input = stdin.lock();
    let mut line = String::new();

    loop {
        // プロンプト前にバックグラウンドジョブの完了を通知
        shell.notify_jobs();

        print!("{}", prompt(shell.last_status));
        let _ = io::stdout().flush();

        line.clear();
        match input.read_line(&mut line) {
            Ok(0) => {
                // EOF (Ctrl+D): 改行を出力して正常終了
                println!();
                break;
            }
            Ok(_) => {
                if !line.trim().is_empty() {
                    shell.last_status = executor::execute(shell, &line);
                }
            }
            Err(e) => {
                eprintln!("pash: read error: {}", e);
                break;
            }
        }

        if shell.should_exit {
            break;
        }
    }
}

fn main() {
    let config: Config = argh::from_env();
    config::init_logging();

    let mut shell = Shell::with_config(&config);
    tracing::debug!(?config, "starting");

    if let Some(command) = config.command.as_deref() {
        let status = executor::execute(&mut shell, command);
        std::process::exit(status);
    }

    load_rc(&mut shell, &config);
    if !shell.should_exit {
        repl(&mut shell);
    }

    std::process::exit(shell.last_status);
}
