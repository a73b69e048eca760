//! コマンド実行: 展開、ビルトイン判定、リダイレクト適用、パイプライン接続、バックグラウンド登録。
//!
//! - [`execute`]: 入力 1 行を展開 → `&` 判定 → `|` 判定 → 各 executor へ振り分け
//! - 単一ビルトイン（非 background、非パイプライン）: spawn なしで実行
//! - [`execute_command`]: 単一の外部コマンド
//!   - パス解決 → リダイレクト計画 → `posix_spawn` → foreground なら `waitpid`、background ならジョブ登録
//! - [`execute_pipeline`]: `|` で区切られた N 段のコマンド
//!   - 全ステージを解決し、起動するステージのリダイレクトを先に計画してから
//!     N-1 本のパイプ（close-on-exec）を作って順に spawn
//!   - 親側は spawn 後にすべてのパイプ fd を drop で閉じる
//!   - background なら最終ステージの PID をジョブとして登録し、他のステージは回収リストへ
//!
//! エラーはすべて `pash: ...` として stderr に報告し、終了ステータスに変換する。REPL ループは止めない。

use std::io;
use std::os::unix::io::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::path::PathBuf;

use libc::pid_t;

use crate::builtins;
use crate::error::ShellError;
use crate::expand;
use crate::job;
use crate::parser::{self, ParseError};
use crate::redirect::{self, RedirectPlan};
use crate::resolve;
use crate::shell::Shell;
use crate::spawn;

/// 入力 1 行を実行し、終了ステータスを返す。
///
/// 空行や `&` だけの行は何もしない（ステータス 0）。
pub fn execute(shell: &mut Shell, line: &str) -> i32 {
    let tokens = expand::expand(&parser::tokenize(line));
    let (tokens, background) = parser::strip_background(tokens);
    if tokens.is_empty() {
        return 0;
    }
    tracing::debug!(?tokens, background, "dispatch");

    let pipes = parser::pipe_count(&tokens);
    if pipes > 0 {
        return execute_pipeline(shell, &tokens, pipes + 1, background);
    }

    if !background {
        if let Some(name) = redirect::command_name(&tokens) {
            if builtins::is_builtin(name) {
                return report(run_builtin(shell, &tokens));
            }
        }
    }

    execute_command(shell, &tokens, background)
}

/// 単一の外部コマンドを実行する。
pub fn execute_command(shell: &mut Shell, tokens: &[String], background: bool) -> i32 {
    report(run_command(shell, tokens, background))
}

/// `stage_count` 段のパイプラインを実行する。`stage_count < 2` や空トークン列は何もしない。
pub fn execute_pipeline(
    shell: &mut Shell,
    tokens: &[String],
    stage_count: usize,
    background: bool,
) -> i32 {
    report(run_pipeline(shell, tokens, stage_count, background))
}

/// エラーを stderr に報告し、終了ステータスに変換する。
fn report(result: Result<i32, ShellError>) -> i32 {
    match result {
        Ok(status) => status,
        Err(e) => {
            eprintln!("pash: {}", e);
            e.exit_status()
        }
    }
}

// ── ビルトイン ──────────────────────────────────────────────────────

/// 単一ビルトインを spawn なしで実行する。`>` があればその出力先に書く。
fn run_builtin(shell: &mut Shell, tokens: &[String]) -> Result<i32, ShellError> {
    let mut plan = redirect::plan(tokens)?;
    let args: Vec<&str> = plan.args.iter().map(String::as_str).collect();
    let status = match plan.stdout.as_mut() {
        Some(file) => builtins::try_exec(shell, &args, file),
        None => builtins::try_exec(shell, &args, &mut io::stdout()),
    };
    Ok(status.transpose()?.unwrap_or(0))
}

// ── 単一コマンド ────────────────────────────────────────────────────

fn run_command(shell: &mut Shell, tokens: &[String], background: bool) -> Result<i32, ShellError> {
    let Some(name) = redirect::command_name(tokens) else {
        // コマンドなし（`> file` だけ）: ファイルの作成・切り詰めだけ行う
        redirect::plan(tokens)?;
        return Ok(0);
    };

    // パス解決を先に行い、見つからなければファイルを開かない
    let program = resolve::resolve(name)?;
    let plan = redirect::plan(tokens)?;

    let pid = spawn::spawn(&program, &plan.args, plan.stdin_fd(), plan.stdout_fd(), &[])?;
    // 子に継承させた後、親側の fd を閉じる
    drop(plan);

    if background {
        register_background(shell, pid, tokens)?;
        Ok(0)
    } else {
        Ok(job::wait_for(pid).code())
    }
}

/// ジョブテーブルに登録し、`[N] pid` を出力する。
fn register_background(shell: &mut Shell, pid: pid_t, tokens: &[String]) -> Result<usize, ShellError> {
    let id = shell.jobs.register(pid, parser::display_command(tokens))?;
    println!("[{}] {}", id, pid);
    Ok(id)
}

// ── パイプライン ────────────────────────────────────────────────────

/// パイプ 1 本。両端とも close-on-exec で作られ、drop で閉じる。
struct Pipe {
    read: OwnedFd,
    write: OwnedFd,
}

impl Pipe {
    #[cfg(any(target_os = "linux", target_os = "android"))]
    fn new() -> io::Result<Self> {
        let mut fds: [RawFd; 2] = [-1; 2];
        if unsafe { libc::pipe2(fds.as_mut_ptr(), libc::O_CLOEXEC) } != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(unsafe { Self::from_raw(fds) })
    }

    #[cfg(not(any(target_os = "linux", target_os = "android")))]
    fn new() -> io::Result<Self> {
        let mut fds: [RawFd; 2] = [-1; 2];
        if unsafe { libc::pipe(fds.as_mut_ptr()) } != 0 {
            return Err(io::Error::last_os_error());
        }
        let pipe = unsafe { Self::from_raw(fds) };
        for fd in [fds[0], fds[1]] {
            if unsafe { libc::fcntl(fd, libc::F_SETFD, libc::FD_CLOEXEC) } != 0 {
                return Err(io::Error::last_os_error());
            }
        }
        Ok(pipe)
    }

    /// # Safety
    /// `fds` は `pipe(2)` が返した、他に所有者のいない fd であること。
    unsafe fn from_raw(fds: [RawFd; 2]) -> Self {
        Self {
            read: OwnedFd::from_raw_fd(fds[0]),
            write: OwnedFd::from_raw_fd(fds[1]),
        }
    }
}

/// spawn 前に準備したステージ。`program` が `Err` なら解決に失敗しており起動しない（値は終了ステータス）。
struct Stage {
    program: Result<PathBuf, i32>,
    plan: RedirectPlan,
}

/// ステージの起動結果。
#[derive(Debug, Clone, Copy)]
enum Outcome {
    Spawned(pid_t),
    /// 起動しなかった（解決失敗・spawn 失敗）。値はそのステージの終了ステータス。
    Failed(i32),
}

fn run_pipeline(
    shell: &mut Shell,
    tokens: &[String],
    stage_count: usize,
    background: bool,
) -> Result<i32, ShellError> {
    if stage_count < 2 || tokens.is_empty() {
        return Ok(0);
    }
    let segments = parser::split_pipeline(tokens)?;
    debug_assert_eq!(segments.len(), stage_count);

    // 1. 各ステージのコマンド名。リダイレクトだけのセグメントは構文エラー
    let names = segments
        .iter()
        .map(|segment| redirect::command_name(segment).ok_or(ParseError::EmptyPipelineSegment))
        .collect::<Result<Vec<&str>, _>>()?;

    // 2. パス解決をリダイレクトより先に行う。見つからないステージは報告し、ファイルも開かない
    let programs = names.iter().map(|name| {
        resolve::resolve(name).map_err(|e| {
            eprintln!("pash: {}", e);
            e.exit_status()
        })
    });

    // 3. 起動するステージのリダイレクトを計画する。1 つでも失敗したら何も起動しない
    let mut stages = Vec::with_capacity(segments.len());
    for (segment, program) in segments.iter().zip(programs) {
        let plan = match program {
            Ok(_) => redirect::plan(segment)?,
            Err(_) => RedirectPlan::default(),
        };
        stages.push(Stage { program, plan });
    }

    // 4. N-1 本のパイプを先に作る。途中で失敗したら作成済みのパイプは drop で閉じる
    let pipes = (1..stages.len())
        .map(|_| Pipe::new())
        .collect::<io::Result<Vec<Pipe>>>()
        .map_err(ShellError::Pipe)?;
    let pipe_fds: Vec<RawFd> = pipes
        .iter()
        .flat_map(|p| [p.read.as_raw_fd(), p.write.as_raw_fd()])
        .collect();

    // 5. 左から順に spawn。リダイレクトがあればパイプより優先する
    let last = stages.len() - 1;
    let mut outcomes = Vec::with_capacity(stages.len());
    for (k, stage) in stages.iter().enumerate() {
        let program = match &stage.program {
            Ok(path) => path,
            Err(code) => {
                outcomes.push(Outcome::Failed(*code));
                continue;
            }
        };

        let stdin_fd = stage
            .plan
            .stdin_fd()
            .or_else(|| (k > 0).then(|| pipes[k - 1].read.as_raw_fd()));
        let stdout_fd = stage
            .plan
            .stdout_fd()
            .or_else(|| (k < last).then(|| pipes[k].write.as_raw_fd()));

        // 子プロセスで close すべき fd: stdin/stdout に使わないパイプの両端すべて
        let to_close: Vec<RawFd> = pipe_fds
            .iter()
            .copied()
            .filter(|&fd| Some(fd) != stdin_fd && Some(fd) != stdout_fd)
            .collect();

        match spawn::spawn(program, &stage.plan.args, stdin_fd, stdout_fd, &to_close) {
            Ok(pid) => outcomes.push(Outcome::Spawned(pid)),
            Err(e) => {
                eprintln!("pash: {}", e);
                outcomes.push(Outcome::Failed(e.exit_status()));
            }
        }
    }

    // 6. 親側のパイプ fd とリダイレクト fd をすべて閉じる
    drop(pipes);
    drop(stages);

    if background {
        return background_pipeline(shell, &outcomes, tokens);
    }

    // 7. foreground: 起動した全ステージを待ち、最終ステージのステータスを返す
    let mut status = 0;
    for outcome in &outcomes {
        status = match *outcome {
            Outcome::Spawned(pid) => job::wait_for(pid).code(),
            Outcome::Failed(code) => code,
        };
    }
    Ok(status)
}

/// バックグラウンドパイプライン: 最終ステージだけをジョブとして登録し、他は回収リストに入れる。
fn background_pipeline(
    shell: &mut Shell,
    outcomes: &[Outcome],
    tokens: &[String],
) -> Result<i32, ShellError> {
    let Some((last, rest)) = outcomes.split_last() else {
        return Ok(0);
    };
    for outcome in rest {
        if let Outcome::Spawned(pid) = *outcome {
            shell.jobs.adopt(pid);
        }
    }
    match *last {
        Outcome::Spawned(pid) => {
            register_background(shell, pid, tokens)?;
            Ok(0)
        }
        Outcome::Failed(code) => Ok(code),
    }
}
