//! バックグラウンドジョブテーブルと待機ヘルパー。
//!
//! フォアグラウンド待機 ([`wait_for`])、バックグラウンドジョブの登録 ([`JobTable::register`])、
//! 非ブロッキングの完了検出 ([`JobTable::poll`]) を提供する。
//!
//! ## ジョブの状態遷移
//!
//! ```text
//! register ──▶ Running ──(poll で終了を検出)──▶ Completed ──(poll の戻り値で 1 回だけ通知)──▶ 回収
//! ```
//!
//! `waitpid` は常に特定の PID を指定して呼ぶ（`-1` は使わない）。
//! 追跡対象外の子プロセス（テーブル満杯時のジョブ、パイプライン先頭側のステージ）は
//! [`JobTable::adopt`] で回収リストに入れ、`poll` のついでに reap する。

use std::fmt;
use std::io;

use libc::pid_t;
use thiserror::Error;

// ── 終了ステータス ───────────────────────────────────────────────────

/// 子プロセスの終了状態。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    /// `exit(code)` で正常終了。
    Exited(i32),
    /// シグナルで終了。
    Signaled(i32),
    /// 既に回収済みなどで状態を取得できなかった（`ECHILD`）。
    Unknown,
}

impl ExitStatus {
    /// シェルの終了ステータスに変換する。シグナル終了は 128 + シグナル番号。
    pub fn code(self) -> i32 {
        match self {
            Self::Exited(code) => code,
            Self::Signaled(sig) => 128 + sig,
            Self::Unknown => 1,
        }
    }
}

/// `waitpid` が返した raw status を解釈する。停止・再開は終了扱いしない。
pub fn decode(raw_status: i32) -> Option<ExitStatus> {
    if libc::WIFEXITED(raw_status) {
        Some(ExitStatus::Exited(libc::WEXITSTATUS(raw_status)))
    } else if libc::WIFSIGNALED(raw_status) {
        Some(ExitStatus::Signaled(libc::WTERMSIG(raw_status)))
    } else {
        None
    }
}

/// `waitpid(pid, WNOHANG)` の結果から完了を判定する。
///
/// - `ret == 0`: 実行中
/// - `ret > 0`: 終了していれば `Some`
/// - `ret < 0` かつ `ECHILD`: もう子ではない → 状態不明のまま完了扱い
/// - それ以外のエラー（`EINTR` 等）: 次回の poll で再試行
pub fn classify(ret: pid_t, raw_status: i32, errno: i32) -> Option<ExitStatus> {
    match ret {
        0 => None,
        r if r > 0 => decode(raw_status),
        _ if errno == libc::ECHILD => Some(ExitStatus::Unknown),
        _ => None,
    }
}

/// 非ブロッキングで 1 プロセスの終了を確認する。
fn try_wait(pid: pid_t) -> Option<ExitStatus> {
    let mut raw_status: i32 = 0;
    let ret = unsafe { libc::waitpid(pid, &mut raw_status, libc::WNOHANG) };
    let errno = if ret < 0 {
        io::Error::last_os_error().raw_os_error().unwrap_or(0)
    } else {
        0
    };
    classify(ret, raw_status, errno)
}

/// 指定プロセスが終了（正常終了またはシグナル終了）するまでブロックする。
///
/// `EINTR` は再試行する。それ以外の失敗は警告を出して [`ExitStatus::Unknown`] を返す。
pub fn wait_for(pid: pid_t) -> ExitStatus {
    loop {
        let mut raw_status: i32 = 0;
        let ret = unsafe { libc::waitpid(pid, &mut raw_status, 0) };
        if ret == pid {
            match decode(raw_status) {
                Some(status) => return status,
                None => continue,
            }
        }
        let err = io::Error::last_os_error();
        if err.raw_os_error() == Some(libc::EINTR) {
            continue;
        }
        tracing::warn!(pid, %err, "waitpid failed");
        return ExitStatus::Unknown;
    }
}

// ── データ構造 ───────────────────────────────────────────────────────

/// ジョブの状態。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Running,
    Completed(ExitStatus),
}

/// バックグラウンドジョブ。
#[derive(Debug)]
pub struct Job {
    /// `[N]` 形式で表示されるジョブ番号。最小未使用 ID が割り当てられる。
    pub id: usize,
    /// 追跡対象のプロセス ID（パイプラインなら最終ステージ）。
    pub pid: pid_t,
    /// 表示用コマンド文字列（`&` を除いたトークンを空白で連結したもの）。
    pub command: String,
    pub state: JobState,
}

/// 完了が検出されたジョブ。[`JobTable::poll`] が 1 度だけ返す。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedJob {
    pub id: usize,
    pub pid: pid_t,
    pub command: String,
    pub status: ExitStatus,
}

impl fmt::Display for CompletedJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] + done {}", self.id, self.command)
    }
}

/// ジョブ登録の失敗。
#[derive(Debug, PartialEq, Error)]
pub enum JobError {
    /// テーブルが満杯。プロセスは実行を続けるが完了は通知されない。
    #[error("too many background jobs (limit {capacity}); pid {pid} will not be tracked")]
    TableFull { capacity: usize, pid: pid_t },
}

// ── JobTable ─────────────────────────────────────────────────────────

/// ジョブテーブル。
///
/// [`Shell`](crate::shell::Shell) が所有し、REPL ループと executor から単一スレッドでアクセスされる。
#[derive(Debug)]
pub struct JobTable {
    jobs: Vec<Job>,
    capacity: usize,
    /// ジョブとしては追跡しないが、ゾンビにしないため回収する PID。
    strays: Vec<pid_t>,
}

impl Default for JobTable {
    fn default() -> Self {
        Self::new()
    }
}

impl JobTable {
    /// 同時に追跡できるジョブ数の既定値。
    pub const DEFAULT_CAPACITY: usize = 10;

    pub fn new() -> Self {
        Self::with_capacity(Self::DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            jobs: Vec::new(),
            capacity,
            strays: Vec::new(),
        }
    }

    /// ジョブを登録し、割り当てた番号を返す。最小未使用 ID を再利用する。
    ///
    /// 満杯なら [`JobError::TableFull`] を返し、PID は回収リストへ回す。既存ジョブには触れない。
    pub fn register(&mut self, pid: pid_t, command: String) -> Result<usize, JobError> {
        if self.jobs.len() >= self.capacity {
            self.adopt(pid);
            return Err(JobError::TableFull {
                capacity: self.capacity,
                pid,
            });
        }

        // 最小未使用 ID を探す
        let mut id = 1;
        while self.jobs.iter().any(|j| j.id == id) {
            id += 1;
        }

        tracing::debug!(id, pid, %command, "job registered");
        self.jobs.push(Job {
            id,
            pid,
            command,
            state: JobState::Running,
        });
        Ok(id)
    }

    /// 追跡しない子プロセスを回収リストに入れる。
    pub fn adopt(&mut self, pid: pid_t) {
        self.strays.push(pid);
    }

    /// 全ジョブの終了を非ブロッキングで確認し、新たに完了したジョブを返す。
    ///
    /// 返したジョブはテーブルから取り除かれるため、同じジョブが 2 度返ることはない。
    /// REPL ループはプロンプト表示前に毎回呼ぶ。
    pub fn poll(&mut self) -> Vec<CompletedJob> {
        self.strays.retain(|&pid| {
            let reaped = try_wait(pid).is_some();
            if reaped {
                tracing::debug!(pid, "reaped untracked child");
            }
            !reaped
        });

        for job in &mut self.jobs {
            if job.state == JobState::Running {
                if let Some(status) = try_wait(job.pid) {
                    job.state = JobState::Completed(status);
                }
            }
        }

        let (done, running): (Vec<Job>, Vec<Job>) = self
            .jobs
            .drain(..)
            .partition(|j| matches!(j.state, JobState::Completed(_)));
        self.jobs = running;

        done.into_iter()
            .filter_map(|job| match job.state {
                JobState::Completed(status) => Some(CompletedJob {
                    id: job.id,
                    pid: job.pid,
                    command: job.command,
                    status,
                }),
                JobState::Running => None,
            })
            .collect()
    }

    /// ID でジョブを検索する。
    pub fn get(&self, id: usize) -> Option<&Job> {
        self.jobs.iter().find(|j| j.id == id)
    }

    /// 追跡中の全ジョブ。
    pub fn iter(&self) -> impl Iterator<Item = &Job> {
        self.jobs.iter()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// 回収待ちの追跡外 PID 数。
    pub fn stray_count(&self) -> usize {
        self.strays.len()
    }
}
