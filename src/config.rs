//! 起動時に環境変数から確定する設定。
//!
//! | 変数 | 用途 | 未設定時 |
//! |------|------|----------|
//! | `HOME` | プロンプトの `~` 短縮、`cd` の既定値、履歴/rc の配置先 | `/tmp` |
//! | `USER` / `LOGNAME` | プロンプトのユーザー名 | `user` |
//! | `PATH` | コマンド検索パス（セッション中は不変） | [`DEFAULT_PATH`] |
//! | `TSH_HISTFILE` | 履歴ファイルのパス | `$HOME/.tsh_history` |
//!
//! rc ファイルは `$HOME/.tshrc` 固定。

use std::path::PathBuf;

use crate::launcher::SearchPath;

/// `PATH` が未設定のときに使う検索パス。
pub const DEFAULT_PATH: &str = "/usr/local/bin:/usr/bin:/bin";

/// シェルセッションの設定。起動時に一度だけ構築され、以後変更されない。
#[derive(Debug, Clone)]
pub struct Config {
    pub home: PathBuf,
    pub user: String,
    pub search_path: SearchPath,
    pub history_path: PathBuf,
    pub rc_path: PathBuf,
}

impl Config {
    /// プロセス環境から設定を読み込む。
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 任意の変数ルックアップから設定を構築する。空文字列は未設定として扱う。
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.is_empty());

        let home = PathBuf::from(var("HOME").unwrap_or_else(|| "/tmp".to_string()));
        let user = var("USER")
            .or_else(|| var("LOGNAME"))
            .unwrap_or_else(|| "user".to_string());
        let search_path = SearchPath::parse(&var("PATH").unwrap_or_else(|| DEFAULT_PATH.to_string()));
        let history_path = var("TSH_HISTFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|| home.join(".tsh_history"));
        let rc_path = home.join(".tshrc");

        Self {
            home,
            user,
            search_path,
            history_path,
            rc_path,
        }
    }
}
