//! シェルのセッション状態を保持するモジュール。
//!
//! 設定（[`Config`]、検索パスを含む）、ジョブテーブル（[`JobTable`]）、直前の終了ステータスを持つ。
//! 履歴は行エディタが単独で所有するのでここには置かない。割り込みフラグは
//! [`signals`](crate::signals) のプロセス全体の静的変数。

use crate::config::Config;
use crate::job::{JobTable, TerminalControl};
use crate::launcher::SearchPath;

/// シェルの実行状態。メインループ全体で共有される。変更するのはメインスレッドだけ。
pub struct Shell {
    /// 起動時に確定した設定。
    pub config: Config,
    /// ジョブテーブル。バックグラウンドジョブを管理する。
    pub jobs: JobTable,
    /// 直前のコマンドの終了ステータス。
    pub last_status: i32,
}

impl Shell {
    /// 端末を受け渡さないシェル状態を作る。
    pub fn new(config: Config) -> Self {
        Self {
            config,
            jobs: JobTable::new(),
            last_status: 0,
        }
    }

    /// stdin が端末なら、フォアグラウンド化したジョブに端末を受け渡すシェル状態を作る。
    pub fn interactive(config: Config) -> Self {
        let mut shell = Self::new(config);
        if unsafe { libc::isatty(libc::STDIN_FILENO) } == 1 {
            let shell_pgid = unsafe { libc::getpgrp() };
            shell.jobs = JobTable::with_terminal(TerminalControl {
                fd: libc::STDIN_FILENO,
                shell_pgid,
            });
        }
        shell
    }

    pub fn search_path(&self) -> &SearchPath {
        &self.config.search_path
    }
}
