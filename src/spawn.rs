//! `posix_spawn()` の安全な Rust ラッパー。
//!
//! [`launcher::Direct`](crate::launcher::Direct) の低レベル起動経路で使う。
//! fork + exec を 1 回の呼び出しで行い、exec の失敗（`ENOENT` 等）も戻り値で受け取れる。
//!
//! ## 構成
//!
//! | 型 | 役割 |
//! |-----|------|
//! | [`SpawnAttr`] | `posix_spawnattr_t` の RAII ラッパー（シグナル設定） |
//! | [`CStringVec`] | argv 用の NULL 終端ポインタ配列 |
//! | [`spawn`] | 上記を組み合わせて `posix_spawn` を呼ぶ公開関数 |
//! | [`wait`] | `waitpid` で子を回収し、終了ステータスに変換する |

use std::ffi::CString;
use std::fmt;
use std::io;
use std::os::unix::ffi::OsStrExt;
use std::path::Path;

use crate::error::ShellError;

// ── エラー型 ──────────────────────────────────────────────────────

/// `posix_spawn` の失敗を表すエラー。
#[derive(Debug)]
pub struct SpawnError {
    /// errno 値。
    pub errno: i32,
    /// コマンド名（エラーメッセージ用）。
    pub command: String,
}

impl fmt::Display for SpawnError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self.errno {
            libc::ENOENT => "no such file or directory",
            libc::EACCES => "permission denied",
            _ => "spawn failed",
        };
        write!(f, "{}: {}", self.command, msg)
    }
}

// ── SpawnAttr ─────────────────────────────────────────────────────

/// `posix_spawnattr_t` の RAII ラッパー。Drop で自動 destroy。
struct SpawnAttr {
    inner: libc::posix_spawnattr_t,
}

impl SpawnAttr {
    fn new() -> Self {
        unsafe {
            let mut attr: libc::posix_spawnattr_t = std::mem::zeroed();
            libc::posix_spawnattr_init(&mut attr);
            Self { inner: attr }
        }
    }

    /// シグナルをデフォルトにリセットする。
    ///
    /// `POSIX_SPAWN_SETSIGDEF` で、シェルがハンドラを設定・無視している SIGINT と SIGTTOU を
    /// 子プロセスで `SIG_DFL` に戻す。
    fn set_sigdefault(&mut self) {
        unsafe {
            let mut flags: libc::c_short = 0;
            libc::posix_spawnattr_getflags(&self.inner, &mut flags);
            flags |= libc::POSIX_SPAWN_SETSIGDEF as libc::c_short;
            libc::posix_spawnattr_setflags(&mut self.inner, flags);

            let mut sigset: libc::sigset_t = std::mem::zeroed();
            libc::sigemptyset(&mut sigset);
            libc::sigaddset(&mut sigset, libc::SIGINT);
            libc::sigaddset(&mut sigset, libc::SIGTTOU);
            libc::posix_spawnattr_setsigdefault(&mut self.inner, &sigset);
        }
    }

    fn as_ptr(&self) -> *const libc::posix_spawnattr_t {
        &self.inner
    }
}

impl Drop for SpawnAttr {
    fn drop(&mut self) {
        unsafe {
            libc::posix_spawnattr_destroy(&mut self.inner);
        }
    }
}

// ── CStringVec ────────────────────────────────────────────────────

/// argv 用の CString ベクタ。NULL 終端のポインタ配列を構築する。
struct CStringVec {
    _strings: Vec<CString>,
    ptrs: Vec<*mut libc::c_char>,
}

impl CStringVec {
    /// 引数に NUL バイトが含まれていれば `None`。
    fn from_args(args: &[String]) -> Option<Self> {
        let strings = args
            .iter()
            .map(|s| CString::new(s.as_bytes()).ok())
            .collect::<Option<Vec<CString>>>()?;
        let mut ptrs: Vec<*mut libc::c_char> = strings
            .iter()
            .map(|s| s.as_ptr() as *mut libc::c_char)
            .collect();
        ptrs.push(std::ptr::null_mut());
        Some(Self {
            _strings: strings,
            ptrs,
        })
    }

    fn as_ptr(&self) -> *const *mut libc::c_char {
        self.ptrs.as_ptr()
    }
}

// ── spawn / wait ──────────────────────────────────────────────────

/// `posix_spawn` で `path` を起動する。成功時は子 PID を返す。
///
/// `args[0]` は子の argv[0] になる。環境変数はシェルの `environ` をそのまま渡す。
pub fn spawn(path: &Path, args: &[String]) -> Result<libc::pid_t, SpawnError> {
    let command = args.first().cloned().unwrap_or_default();
    let invalid = |errno| SpawnError {
        errno,
        command: command.clone(),
    };

    let c_path = CString::new(path.as_os_str().as_bytes()).map_err(|_| invalid(libc::EINVAL))?;
    let argv = CStringVec::from_args(args).ok_or_else(|| invalid(libc::EINVAL))?;

    let mut attr = SpawnAttr::new();
    attr.set_sigdefault();

    extern "C" {
        static environ: *const *mut libc::c_char;
    }

    let mut pid: libc::pid_t = 0;
    let ret = unsafe {
        libc::posix_spawn(
            &mut pid,
            c_path.as_ptr(),
            std::ptr::null(),
            attr.as_ptr(),
            argv.as_ptr(),
            environ as *const *mut libc::c_char,
        )
    };

    if ret != 0 {
        return Err(invalid(ret));
    }
    log::debug!("posix_spawn {} -> pid {}", path.display(), pid);
    Ok(pid)
}

/// `pid` が終了するまで `waitpid` でブロックし、終了ステータスを返す。
///
/// `EINTR` は再試行する。シグナル終了は `128 + シグナル番号`。
pub fn wait(pid: libc::pid_t) -> Result<i32, ShellError> {
    let mut raw_status: i32 = 0;
    loop {
        let ret = unsafe { libc::waitpid(pid, &mut raw_status, 0) };
        if ret == pid {
            break;
        }
        let err = io::Error::last_os_error();
        if err.kind() != io::ErrorKind::Interrupted {
            return Err(ShellError::Os {
                context: "waitpid".to_string(),
                source: err,
            });
        }
    }

    if libc::WIFEXITED(raw_status) {
        Ok(libc::WEXITSTATUS(raw_status))
    } else if libc::WIFSIGNALED(raw_status) {
        Ok(128 + libc::WTERMSIG(raw_status))
    } else {
        Ok(1)
    }
}
