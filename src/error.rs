//! シェル全体で共有するエラー型。
//!
//! どのエラーもメインループを終了させない。ループは `tsh: <メッセージ>` を stderr に
//! 出力して次のプロンプトに進む。唯一の例外は起動時の端末設定失敗（[`ShellError::Terminal`]）。

use std::io;

use thiserror::Error;

/// ビルトイン・ジョブ制御・プロセス起動で発生するエラー。
#[derive(Debug, Error)]
pub enum ShellError {
    /// ビルトインへの引数が不正。引数は usage 文字列。
    #[error("usage: {0}")]
    Usage(String),
    /// 存在しないジョブ番号（1 始まりの表示番号）。
    #[error("{0}: no such job")]
    NoSuchJob(usize),
    /// `$PATH` のどのディレクトリにも実行ファイルが見つからない。
    #[error("{0}: command not found")]
    CommandNotFound(String),
    /// exec 段階でファイルが見つからない。
    #[error("{0}: no such file or directory")]
    ExecFailed(String),
    /// spawn / fork / wait などのプリミティブ失敗。
    #[error("{context}: {source}")]
    Os {
        context: String,
        #[source]
        source: io::Error,
    },
    /// 端末の raw モード設定に失敗した。
    #[error("terminal: {0}")]
    Terminal(#[source] io::Error),
}

impl ShellError {
    /// `io::Error` に文脈を付けて [`ShellError::Os`] を作る。`map_err` 用。
    pub fn os(context: impl Into<String>) -> impl FnOnce(io::Error) -> Self {
        let context = context.into();
        move |source| Self::Os { context, source }
    }

    /// 直前の errno から [`ShellError::Os`] を作る。
    pub fn last_os(context: impl Into<String>) -> Self {
        Self::Os {
            context: context.into(),
            source: io::Error::last_os_error(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages() {
        assert_eq!(ShellError::NoSuchJob(3).to_string(), "3: no such job");
        assert_eq!(
            ShellError::CommandNotFound("nope".into()).to_string(),
            "nope: command not found"
        );
        assert_eq!(
            ShellError::Usage("bf <job>".into()).to_string(),
            "usage: bf <job>"
        );
    }

    #[test]
    fn os_keeps_context_and_source() {
        let err = ShellError::os("waitpid")(io::Error::from_raw_os_error(libc::ECHILD));
        let msg = err.to_string();
        assert!(msg.starts_with("waitpid: "), "{msg}");
        assert!(std::error::Error::source(&err).is_some());
    }
}
