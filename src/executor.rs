//! 入力行のディスパッチ。
//!
//! [`parser::parse`] で分類した結果に応じて振り分ける:
//!
//! - [`Line::Pipe`] → [`pipe::run`]（`cmd | find x`）
//! - [`Line::Background`] → [`JobTable::start_background`](crate::job::JobTable::start_background)
//! - [`Line::Command`] → ビルトイン表に一致すればシェル内で実行、
//!   それ以外は外部コマンドとして [`launcher::run`] でフォアグラウンド実行
//!
//! エラーはすべて呼び出し元に返す。表示してループを続けるのは main.rs の役目。

use std::io::Write;

use crate::builtins;
use crate::error::ShellError;
use crate::launcher::{self, Invocation};
use crate::parser::{self, Line};
use crate::pipe;
use crate::shell::Shell;

/// 1 行を解析して実行する。ビルトインとフィルタの出力は `out` に書く。
pub fn execute(shell: &mut Shell, line: &str, out: &mut dyn Write) -> Result<(), ShellError> {
    let Some(parsed) = parser::parse(line)? else {
        return Ok(());
    };

    match parsed {
        Line::Pipe { command, filter } => {
            let count = pipe::run(shell.search_path(), &command, &filter, out)?;
            log::debug!("find: {} matching lines", count);
            Ok(())
        }
        Line::Background(args) => {
            let search_path = shell.search_path().clone();
            let index = shell.jobs.start_background(&search_path, &args)?;
            if let Some(job) = shell.jobs.get(index - 1) {
                eprintln!("[{}] {}", index, job.pid());
            }
            Ok(())
        }
        Line::Command(args) => run_command(shell, &args, out),
    }
}

/// フォアグラウンドのコマンドを実行する。ビルトインが優先。
fn run_command(shell: &mut Shell, args: &[String], out: &mut dyn Write) -> Result<(), ShellError> {
    if let Some(handler) = builtins::lookup(&args[0]) {
        return handler(shell, args, out);
    }

    let inv = Invocation::resolve(shell.search_path(), args)?;
    let status = launcher::run(&inv)?;
    log::debug!("{} exited with status {}", inv.name(), status);
    shell.last_status = status;
    Ok(())
}
