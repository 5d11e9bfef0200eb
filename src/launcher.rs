//! 外部コマンドの解決と起動。
//!
//! - [`SearchPath`]: 起動時に `$PATH` から作る不変のディレクトリ列。[`SearchPath::resolve`] で
//!   先頭から順に探し、最初に見つかった実行ファイルを返す。
//! - 起動は 2 段構え（[`run`]）:
//!   1. [`Managed`]: ワーカースレッド上で `std::process::Command` を spawn + wait する。
//!      呼び出し側はワーカーの終了を待つので、後続コマンドと重なることはない。
//!   2. [`Direct`]: 1 が失敗したときだけ、[`spawn`](crate::spawn) の `posix_spawn`
//!      （fork + exec 相当）で直接起動し、`waitpid` で同期的に回収する。
//!
//! 成功時にフォールバックを試すことはない。

use std::io;
use std::os::unix::fs::PermissionsExt;
use std::os::unix::process::{CommandExt, ExitStatusExt};
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};
use std::thread;

use crate::error::ShellError;
use crate::signals;
use crate::spawn;

// ── SearchPath ────────────────────────────────────────────────────

/// コロン区切りの検索パス。セッション中は変更しない。
#[derive(Debug, Clone, PartialEq)]
pub struct SearchPath {
    dirs: Vec<PathBuf>,
}

impl SearchPath {
    /// `"/usr/bin:/bin"` 形式の文字列から作る。空要素は読み飛ばす。
    pub fn parse(value: &str) -> Self {
        Self {
            dirs: value
                .split(':')
                .filter(|d| !d.is_empty())
                .map(PathBuf::from)
                .collect(),
        }
    }

    pub fn dirs(&self) -> &[PathBuf] {
        &self.dirs
    }

    /// コマンド名を実行ファイルのパスに解決する。
    ///
    /// `/` を含む名前は検索せず、そのパスが実行ファイルならそれを返す。
    /// 見つからなければ [`ShellError::CommandNotFound`]。
    pub fn resolve(&self, name: &str) -> Result<PathBuf, ShellError> {
        if name.contains('/') {
            let path = PathBuf::from(name);
            return if is_executable(&path) {
                Ok(path)
            } else {
                Err(ShellError::CommandNotFound(name.to_string()))
            };
        }
        self.dirs()
            .iter()
            .map(|dir| dir.join(name))
            .find(|candidate| is_executable(candidate))
            .ok_or_else(|| ShellError::CommandNotFound(name.to_string()))
    }
}

/// 通常ファイルで、いずれかの実行ビットが立っているか。
fn is_executable(path: &Path) -> bool {
    match path.metadata() {
        Ok(meta) => meta.is_file() && meta.permissions().mode() & 0o111 != 0,
        Err(_) => false,
    }
}

// ── 起動戦略 ──────────────────────────────────────────────────────

/// 解決済みの起動要求。`args[0]` はユーザーが入力したコマンド名。
#[derive(Debug, Clone)]
pub struct Invocation {
    pub path: PathBuf,
    pub args: Vec<String>,
}

impl Invocation {
    /// `args[0]` を `search_path` で解決して起動要求を作る。
    pub fn resolve(search_path: &SearchPath, args: &[String]) -> Result<Self, ShellError> {
        let name = args
            .first()
            .ok_or_else(|| ShellError::Usage("<command> [args...]".to_string()))?;
        Ok(Self {
            path: search_path.resolve(name)?,
            args: args.to_vec(),
        })
    }

    pub fn name(&self) -> &str {
        self.args.first().map(String::as_str).unwrap_or("")
    }
}

/// コマンドを起動して終了まで待ち、終了ステータスを返す起動戦略。
///
/// 終了ステータスは通常終了なら終了コード、シグナル終了なら `128 + シグナル番号`。
pub trait Launch {
    fn launch(&self, inv: &Invocation) -> Result<i32, ShellError>;
}

/// ワーカースレッドで `std::process::Command` を起動・待機する。環境変数は継承する。
pub struct Managed;

impl Launch for Managed {
    fn launch(&self, inv: &Invocation) -> Result<i32, ShellError> {
        let path = inv.path.clone();
        let args = inv.args.clone();
        let worker = thread::Builder::new()
            .name("launch".to_string())
            .spawn(move || -> io::Result<ExitStatus> {
                let mut cmd = Command::new(&path);
                if let Some((arg0, rest)) = args.split_first() {
                    cmd.arg0(arg0).args(rest);
                }
                unsafe {
                    cmd.pre_exec(|| {
                        signals::reset_for_child();
                        Ok(())
                    });
                }
                cmd.spawn()?.wait()
            })
            .map_err(ShellError::os("launch worker"))?;

        let status = worker
            .join()
            .map_err(|_| ShellError::Os {
                context: "launch worker".to_string(),
                source: io::Error::other("worker panicked"),
            })?
            .map_err(ShellError::os(inv.name()))?;
        Ok(exit_code(status))
    }
}

/// `posix_spawn` で直接起動し、`waitpid` で回収する。
pub struct Direct;

impl Launch for Direct {
    fn launch(&self, inv: &Invocation) -> Result<i32, ShellError> {
        let pid = spawn::spawn(&inv.path, &inv.args).map_err(|e| {
            log::debug!("posix_spawn failed: {}", e);
            if e.errno == libc::ENOENT {
                ShellError::ExecFailed(inv.name().to_string())
            } else {
                ShellError::Os {
                    context: inv.name().to_string(),
                    source: io::Error::from_raw_os_error(e.errno),
                }
            }
        })?;
        spawn::wait(pid)
    }
}

/// `primary` で起動し、失敗したときだけ `fallback` で起動し直す。
pub fn run_with(primary: &dyn Launch, fallback: &dyn Launch, inv: &Invocation) -> Result<i32, ShellError> {
    match primary.launch(inv) {
        Ok(status) => Ok(status),
        Err(e) => {
            log::debug!("managed launch of {} failed ({}), falling back to direct spawn", inv.name(), e);
            fallback.launch(inv)
        }
    }
}

/// [`Managed`] → [`Direct`] の順で起動する。
pub fn run(inv: &Invocation) -> Result<i32, ShellError> {
    run_with(&Managed, &Direct, inv)
}

/// [`ExitStatus`] をシェルの終了ステータスに変換する。
pub fn exit_code(status: ExitStatus) -> i32 {
    match (status.code(), status.signal()) {
        (Some(code), _) => code,
        (None, Some(sig)) => 128 + sig,
        (None, None) => 1,
    }
}
