//! ジョブテーブルとジョブ制御ヘルパー。
//!
//! バックグラウンド起動 ([`JobTable::start_background`])、一覧 ([`JobTable::list`])、
//! フォアグラウンド化 ([`JobTable::bring_to_foreground`])、強制終了 ([`JobTable::terminate_job`])
//! を提供する。テーブルを変更するのはメインスレッドだけで、シグナルハンドラは触れない。
//!
//! ## 状態遷移
//!
//! ```text
//! start_background ─→ Running ─bring_to_foreground─→ Foreground ─(終了)─→ 削除
//!                        └──────terminate_job──────→ Terminated ─→ 削除
//! ```
//!
//! フォアグラウンド化したジョブは終了まで待つだけで、Running に戻る経路はない。
//! バックグラウンドジョブの終了は通知しないので、一覧や操作を行うまでエントリは残る。
//!
//! ジョブ番号はテーブル内の位置（1 始まり）。操作 API は 0 始まりの位置を受け取る。

use std::fmt;
use std::io;
use std::os::unix::process::CommandExt;
use std::process::{Child, Command, Stdio};

use libc::pid_t;

use crate::error::ShellError;
use crate::launcher::{self, Invocation, SearchPath};
use crate::signals;

// ── データ構造 ───────────────────────────────────────────────────────

/// ジョブの状態。
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum JobState {
    /// バックグラウンドで実行中（最後に確認した時点で）。
    Running,
    /// フォアグラウンド化され、シェルが終了を待っている。
    Foreground,
    /// シグナルを送って終了を確認した。直後にテーブルから削除される。
    Terminated,
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(match self {
            Self::Running => "Running",
            Self::Foreground => "Foreground",
            Self::Terminated => "Terminated",
        })
    }
}

/// バックグラウンドで起動した子プロセス。
pub struct Job {
    child: Child,
    /// 表示用コマンド文字列（マーカー `&` を除いたもの）。
    command: String,
    state: JobState,
}

impl Job {
    pub fn pid(&self) -> pid_t {
        self.child.id() as pid_t
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    pub fn command(&self) -> &str {
        &self.command
    }
}

/// [`JobTable::list`] が返す 1 行分の情報。
#[derive(Debug, Clone, PartialEq)]
pub struct JobInfo {
    /// 1 始まりの表示番号。
    pub index: usize,
    pub pid: pid_t,
    pub state: JobState,
    pub command: String,
}

impl fmt::Display for JobInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]  {:<10} {:>7}  {}", self.index, self.state, self.pid, self.command)
    }
}

/// フォアグラウンド化の際に端末を受け渡すための情報。
#[derive(Debug, Clone, Copy)]
pub struct TerminalControl {
    /// 端末の fd（通常 `STDIN_FILENO`）。
    pub fd: i32,
    /// シェル自身のプロセスグループ。
    pub shell_pgid: pid_t,
}

// ── JobTable ─────────────────────────────────────────────────────────

/// ジョブテーブル。作成順に並び、位置がそのままジョブ番号になる。
///
/// [`Shell`](crate::shell::Shell) が所有する。
pub struct JobTable {
    jobs: Vec<Job>,
    /// `Some` なら、フォアグラウンド化したジョブに端末を渡す。
    terminal: Option<TerminalControl>,
}

impl JobTable {
    /// 端末を受け渡さないジョブテーブル。
    pub fn new() -> Self {
        Self {
            jobs: Vec::new(),
            terminal: None,
        }
    }

    /// フォアグラウンド化の際に `terminal` を受け渡すジョブテーブル。
    pub fn with_terminal(terminal: TerminalControl) -> Self {
        Self {
            jobs: Vec::new(),
            terminal: Some(terminal),
        }
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// 0 始まりの位置でジョブを参照する。
    pub fn get(&self, index: usize) -> Option<&Job> {
        self.jobs.get(index)
    }

    /// コマンドをブロックせずに起動し、Running のジョブとして末尾に追加する。
    ///
    /// 子は独立したプロセスグループに置くので、端末からの SIGINT は届かない。
    /// stdin は `/dev/null` に繋ぐ。戻り値は 1 始まりのジョブ番号。
    pub fn start_background(&mut self, search_path: &SearchPath, args: &[String]) -> Result<usize, ShellError> {
        let inv = Invocation::resolve(search_path, args)?;
        let mut cmd = Command::new(&inv.path);
        if let Some((arg0, rest)) = inv.args.split_first() {
            cmd.arg0(arg0).args(rest);
        }
        cmd.stdin(Stdio::null()).process_group(0);
        unsafe {
            cmd.pre_exec(|| {
                signals::reset_for_child();
                Ok(())
            });
        }
        let child = cmd.spawn().map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => ShellError::ExecFailed(inv.name().to_string()),
            _ => ShellError::Os {
                context: inv.name().to_string(),
                source: e,
            },
        })?;

        self.jobs.push(Job {
            child,
            command: inv.args.join(" "),
            state: JobState::Running,
        });
        let index = self.len();
        log::debug!("job [{}] started: pid {}", index, self.jobs[index - 1].pid());
        Ok(index)
    }

    /// 作成順のジョブ一覧。状態の再確認は行わない。
    pub fn list(&self) -> Vec<JobInfo> {
        self.jobs
            .iter()
            .enumerate()
            .map(|(i, job)| JobInfo {
                index: i + 1,
                pid: job.pid(),
                state: job.state(),
                command: job.command().to_string(),
            })
            .collect()
    }

    /// `index`（0 始まり）のジョブをフォアグラウンド化し、終了までブロックする。
    ///
    /// 終了後はテーブルから削除し、終了ステータスを返す。
    /// 番号が不正なら [`ShellError::NoSuchJob`] で、テーブルは変更しない。
    pub fn bring_to_foreground(&mut self, index: usize) -> Result<i32, ShellError> {
        let job = self
            .jobs
            .get_mut(index)
            .ok_or(ShellError::NoSuchJob(index + 1))?;
        job.state = JobState::Foreground;
        let pid = job.pid();
        log::debug!("job [{}] (pid {}) brought to foreground", index + 1, pid);

        if let Some(term) = self.terminal {
            give_terminal_to(term.fd, pid);
        }
        let waited = job.child.wait();
        if let Some(term) = self.terminal {
            take_terminal_back(term.fd, term.shell_pgid);
        }

        self.jobs.remove(index);
        let status = waited.map_err(ShellError::os("wait"))?;
        Ok(launcher::exit_code(status))
    }

    /// `index`（0 始まり）のジョブに SIGKILL を送り、回収してからテーブルから削除する。
    ///
    /// 番号が不正なら [`ShellError::NoSuchJob`]。
    pub fn terminate_job(&mut self, index: usize) -> Result<(), ShellError> {
        let job = self
            .jobs
            .get_mut(index)
            .ok_or(ShellError::NoSuchJob(index + 1))?;

        match job.child.kill() {
            Ok(()) => {}
            // 既に終了している
            Err(e) if e.kind() == io::ErrorKind::InvalidInput => {}
            Err(e) => return Err(ShellError::os("kill")(e)),
        }
        job.child.wait().map_err(ShellError::os("wait"))?;
        job.state = JobState::Terminated;
        log::debug!("job [{}] (pid {}) terminated", index + 1, job.pid());

        self.jobs.remove(index);
        Ok(())
    }
}

impl Default for JobTable {
    fn default() -> Self {
        Self::new()
    }
}

// ── ターミナル制御ヘルパー ───────────────────────────────────────────

/// `tcsetpgrp` でターミナルのフォアグラウンドプロセスグループを `pgid` に設定する。
pub fn give_terminal_to(terminal_fd: i32, pgid: pid_t) {
    unsafe {
        libc::tcsetpgrp(terminal_fd, pgid);
    }
}

/// `tcsetpgrp` でターミナルのフォアグラウンドプロセスグループをシェルに戻す。
///
/// この時点のシェルはバックグラウンドなので、SIGTTOU を無視している必要がある。
pub fn take_terminal_back(terminal_fd: i32, shell_pgid: pid_t) {
    unsafe {
        libc::tcsetpgrp(terminal_fd, shell_pgid);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    fn search_path() -> SearchPath {
        SearchPath::parse(crate::config::DEFAULT_PATH)
    }

    fn args(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    fn alive(pid: pid_t) -> bool {
        unsafe { libc::kill(pid, 0) == 0 }
    }

    #[test]
    fn background_start_list_and_terminate() {
        let mut jobs = JobTable::new();
        let started = Instant::now();
        let index = jobs.start_background(&search_path(), &args(&["sleep", "5"])).unwrap();
        assert!(started.elapsed() < Duration::from_secs(4));
        assert_eq!(index, 1);

        let listed = jobs.list();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].index, 1);
        assert_eq!(listed[0].state, JobState::Running);
        assert_eq!(listed[0].command, "sleep 5");
        let pid = listed[0].pid;
        assert!(alive(pid));

        jobs.terminate_job(0).unwrap();
        assert!(jobs.is_empty());
        assert!(!alive(pid));
    }

    #[test]
    fn background_job_has_own_process_group() {
        let mut jobs = JobTable::new();
        jobs.start_background(&search_path(), &args(&["sleep", "5"])).unwrap();
        let pid = jobs.get(0).unwrap().pid();
        assert_eq!(unsafe { libc::getpgid(pid) }, pid);
        jobs.terminate_job(0).unwrap();
    }

    #[test]
    fn foreground_invalid_index_leaves_table_untouched() {
        let mut jobs = JobTable::new();
        jobs.start_background(&search_path(), &args(&["sleep", "5"])).unwrap();

        let err = jobs.bring_to_foreground(3).unwrap_err();
        assert!(matches!(err, ShellError::NoSuchJob(4)));
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs.get(0).unwrap().state(), JobState::Running);

        jobs.terminate_job(0).unwrap();
    }

    #[test]
    fn terminate_invalid_index() {
        let mut jobs = JobTable::new();
        assert!(matches!(jobs.terminate_job(0), Err(ShellError::NoSuchJob(1))));
    }

    #[test]
    fn foreground_waits_and_removes() {
        let mut jobs = JobTable::new();
        jobs.start_background(&search_path(), &args(&["sh", "-c", "sleep 0.2; exit 3"]))
            .unwrap();
        assert_eq!(jobs.bring_to_foreground(0).unwrap(), 3);
        assert!(jobs.is_empty());
    }

    #[test]
    fn finished_job_stays_listed_until_touched() {
        let mut jobs = JobTable::new();
        jobs.start_background(&search_path(), &args(&["true"])).unwrap();
        std::thread::sleep(Duration::from_millis(200));

        let listed = jobs.list();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].state, JobState::Running);

        // 終了済みでも terminate はエラーにならず、回収して削除する
        jobs.terminate_job(0).unwrap();
        assert!(jobs.is_empty());
    }

    #[test]
    fn indices_follow_position() {
        let mut jobs = JobTable::new();
        let sp = search_path();
        assert_eq!(jobs.start_background(&sp, &args(&["sleep", "5"])).unwrap(), 1);
        assert_eq!(jobs.start_background(&sp, &args(&["sleep", "6"])).unwrap(), 2);

        jobs.terminate_job(0).unwrap();
        let listed = jobs.list();
        assert_eq!(listed[0].index, 1);
        assert_eq!(listed[0].command, "sleep 6");

        jobs.terminate_job(0).unwrap();
    }

    #[test]
    fn unknown_command_is_not_registered() {
        let mut jobs = JobTable::new();
        let err = jobs
            .start_background(&search_path(), &args(&["definitely-not-a-binary-xyz"]))
            .unwrap_err();
        assert!(matches!(err, ShellError::CommandNotFound(_)));
        assert!(jobs.is_empty());
    }

    #[test]
    fn job_info_display() {
        let info = JobInfo {
            index: 2,
            pid: 4242,
            state: JobState::Running,
            command: "sleep 5".to_string(),
        };
        assert_eq!(info.to_string(), "[2]  Running       4242  sleep 5");
    }
}
