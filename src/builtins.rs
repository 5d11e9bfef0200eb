//! ビルトインコマンドの実装。
//!
//! ビルトインはプロセスを起動せずシェル内で直接実行される。
//! [`BUILTINS`] は名前 → ハンドラの固定表で、先頭トークンの完全一致で引く。
//! ビルトインを足すときは表に 1 行追加するだけでよい。
//!
//! `history` は行エディタが履歴を所有しているため main.rs で特別扱いする。

use std::env;
use std::io::Write;
use std::path::PathBuf;

use crate::error::ShellError;
use crate::shell::Shell;

/// ビルトインのハンドラ。`args[0]` はコマンド名。
pub type Handler = fn(&mut Shell, &[String], &mut dyn Write) -> Result<(), ShellError>;

/// 名前 → ハンドラの表。
pub const BUILTINS: &[(&str, Handler)] = &[
    ("cd", builtin_cd),
    ("jobs", builtin_jobs),
    ("bf", builtin_bf),
    ("killjob", builtin_killjob),
];

/// 名前に一致するビルトインを探す。
pub fn lookup(name: &str) -> Option<Handler> {
    BUILTINS
        .iter()
        .find(|(builtin, _)| *builtin == name)
        .map(|&(_, handler)| handler)
}

/// `cd [dir]`: カレントディレクトリを変更する。引数省略時はホームへ。`~` で始まればホームに展開。
fn builtin_cd(shell: &mut Shell, args: &[String], _out: &mut dyn Write) -> Result<(), ShellError> {
    let home = &shell.config.home;
    let target: PathBuf = match args.get(1).map(String::as_str) {
        None | Some("~") => home.clone(),
        Some(dir) => match dir.strip_prefix("~/") {
            Some(rest) => home.join(rest),
            None => PathBuf::from(dir),
        },
    };
    env::set_current_dir(&target).map_err(ShellError::os(format!("cd: {}", target.display())))
}

/// `jobs`: ジョブ一覧を作成順に表示する。
fn builtin_jobs(shell: &mut Shell, _args: &[String], out: &mut dyn Write) -> Result<(), ShellError> {
    for info in shell.jobs.list() {
        writeln!(out, "{}", info).map_err(ShellError::os("jobs"))?;
    }
    Ok(())
}

/// `bf <n>`: ジョブ n をフォアグラウンド化し、終了まで待つ。
fn builtin_bf(shell: &mut Shell, args: &[String], _out: &mut dyn Write) -> Result<(), ShellError> {
    let index = job_index(args, "bf <job number>")?;
    shell.last_status = shell.jobs.bring_to_foreground(index)?;
    Ok(())
}

/// `killjob <n>`: ジョブ n を終了させてテーブルから外す。
fn builtin_killjob(shell: &mut Shell, args: &[String], _out: &mut dyn Write) -> Result<(), ShellError> {
    let index = job_index(args, "killjob <job number>")?;
    shell.jobs.terminate_job(index)
}

/// `args[1]` の 1 始まりのジョブ番号を 0 始まりの位置に変換する。
///
/// 引数がない・数値でない → [`ShellError::Usage`]、`0` → [`ShellError::NoSuchJob`]。
fn job_index(args: &[String], usage: &str) -> Result<usize, ShellError> {
    let arg = args
        .get(1)
        .ok_or_else(|| ShellError::Usage(usage.to_string()))?;
    let number: usize = arg
        .parse()
        .map_err(|_| ShellError::Usage(usage.to_string()))?;
    number.checked_sub(1).ok_or(ShellError::NoSuchJob(number))
}
