//! 割り込みフラグとシグナルハンドラの設定。
//!
//! ## 単一書き込み者ルール
//!
//! - [`INTERRUPTED`] に書き込むのはシグナルハンドラ（`true` のみ）とメインループ（クリアのみ）。
//! - ハンドラはフラグ 1 語の書き込み以外に何もしない。ジョブテーブル、履歴、端末モードには触れない。
//! - ハンドラは `SA_RESTART` なしで登録する。行エディタの `read(2)` が `EINTR` で戻り、
//!   入力待ち中でもメインループがフラグを観測できる。

use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::ShellError;

/// SIGINT を受けたら `true` になる。`sig_atomic_t` 相当のロックフリーな 1 語。
static INTERRUPTED: AtomicBool = AtomicBool::new(false);

extern "C" fn on_interrupt(_sig: libc::c_int) {
    INTERRUPTED.store(true, Ordering::SeqCst);
}

/// SIGINT ハンドラを登録し、SIGTTOU を無視する。
///
/// SIGTTOU を無視するのは、フォアグラウンド化したジョブから `tcsetpgrp` で
/// 端末を取り戻すときにシェル自身が停止しないようにするため。
pub fn install() -> Result<(), ShellError> {
    unsafe {
        let mut action: libc::sigaction = std::mem::zeroed();
        action.sa_sigaction = on_interrupt as extern "C" fn(libc::c_int) as libc::sighandler_t;
        action.sa_flags = 0;
        libc::sigemptyset(&mut action.sa_mask);
        if libc::sigaction(libc::SIGINT, &action, std::ptr::null_mut()) != 0 {
            return Err(ShellError::last_os("sigaction(SIGINT)"));
        }
        libc::signal(libc::SIGTTOU, libc::SIG_IGN);
    }
    log::debug!("SIGINT handler installed");
    Ok(())
}

/// 子プロセス側で、シェルが変更したシグナル設定をデフォルトに戻す。
///
/// `fork` 後 `exec` 前に呼ばれるため async-signal-safe な呼び出しだけを使う。
pub fn reset_for_child() {
    unsafe {
        libc::signal(libc::SIGINT, libc::SIG_DFL);
        libc::signal(libc::SIGTTOU, libc::SIG_DFL);
    }
}

/// フラグが立っているか（クリアしない）。
pub fn interrupt_pending() -> bool {
    INTERRUPTED.load(Ordering::SeqCst)
}

/// フラグを読み取ってクリアする。メインループからのみ呼ぶ。
pub fn take_interrupt() -> bool {
    INTERRUPTED.swap(false, Ordering::SeqCst)
}

/// フラグを触るテスト同士を直列化するロック。
#[cfg(test)]
pub(crate) static FLAG_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raised_sigint_sets_flag_once() {
        let _guard = FLAG_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        install().unwrap();
        take_interrupt();

        unsafe {
            libc::raise(libc::SIGINT);
        }
        assert!(interrupt_pending());
        assert!(take_interrupt());
        assert!(!take_interrupt());
    }
}
