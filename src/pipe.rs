//! 2 段テキストフィルタ: `<command> | find <needle>`。
//!
//! 一般的な N 段パイプラインではない。1 段目のコマンドを実行して stdout を文字列として
//! 取り込み、2 段目のキーワードが `find` なら取り込んだ出力から `needle` を含む行を探して表示する。
//!
//! `|` の左がコマンドと引数、右がキーワードと検索語のちょうど 2 トークン。
//! 左が空、右の形が違う、またはキーワードが `find` 以外なら、何も実行せずに usage エラー。

use std::io::{self, Write};
use std::os::unix::process::CommandExt;
use std::process::{Command, Stdio};

use crate::error::ShellError;
use crate::launcher::{Invocation, SearchPath};
use crate::signals;

/// 検索キーワード。
pub const FIND: &str = "find";

const USAGE: &str = "<command> | find <letter or string to find>";

/// 検証済みのフィルタ付きコマンド。
#[derive(Debug, PartialEq)]
pub struct PipeCommand {
    /// 1 段目のコマンドと引数。
    pub command: Vec<String>,
    /// 検索語。
    pub needle: String,
}

impl PipeCommand {
    /// `|` の左右のトークン列から作る。`ls -a | find rc` なら `(["ls", "-a"], ["find", "rc"])`。
    pub fn from_parts(command: &[String], filter: &[String]) -> Result<Self, ShellError> {
        let usage = || ShellError::Usage(USAGE.to_string());
        if command.is_empty() {
            return Err(usage());
        }
        match filter {
            [keyword, needle] if keyword == FIND => Ok(Self {
                command: command.to_vec(),
                needle: needle.clone(),
            }),
            _ => Err(usage()),
        }
    }
}

/// `output` のうち `needle` を含む行を出現順に返す。`needle` が空なら何も返さない。
pub fn search_all<'a>(output: &'a str, needle: &str) -> Vec<&'a str> {
    if needle.is_empty() {
        return Vec::new();
    }
    output.lines().filter(|line| line.contains(needle)).collect()
}

/// コマンドを実行して stdout を取り込む。stderr は端末にそのまま流す。
pub fn capture(search_path: &SearchPath, args: &[String]) -> Result<String, ShellError> {
    let inv = Invocation::resolve(search_path, args)?;
    let mut cmd = Command::new(&inv.path);
    if let Some((arg0, rest)) = inv.args.split_first() {
        cmd.arg0(arg0).args(rest);
    }
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit());
    unsafe {
        cmd.pre_exec(|| {
            signals::reset_for_child();
            Ok(())
        });
    }
    let output = cmd.output().map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => ShellError::ExecFailed(inv.name().to_string()),
        _ => ShellError::Os {
            context: inv.name().to_string(),
            source: e,
        },
    })?;
    if !output.status.success() {
        log::debug!("{} exited with {}", inv.name(), output.status);
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// フィルタ付きコマンドを実行し、一致した行を `out` に書き出す。戻り値は一致した行数。
pub fn run<W: Write + ?Sized>(
    search_path: &SearchPath,
    command: &[String],
    filter: &[String],
    out: &mut W,
) -> Result<usize, ShellError> {
    let pipe = PipeCommand::from_parts(command, filter)?;
    let output = capture(search_path, &pipe.command)?;
    let matches = search_all(&output, &pipe.needle);
    for line in &matches {
        writeln!(out, "{}", line).map_err(ShellError::os("write"))?;
    }
    Ok(matches.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn tokens(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    fn search_path() -> SearchPath {
        SearchPath::parse(crate::config::DEFAULT_PATH)
    }

    #[test]
    fn accepts_command_with_arguments() {
        assert_eq!(
            PipeCommand::from_parts(&tokens(&["ls"]), &tokens(&["find", "a"])).unwrap(),
            PipeCommand {
                command: tokens(&["ls"]),
                needle: "a".to_string()
            }
        );
        assert_eq!(
            PipeCommand::from_parts(&tokens(&["ls", "-a"]), &tokens(&["find", "rc"]))
                .unwrap()
                .command,
            tokens(&["ls", "-a"])
        );
    }

    #[test]
    fn rejects_other_keyword_and_malformed_sides() {
        let usage = |command: &[&str], filter: &[&str]| {
            matches!(
                PipeCommand::from_parts(&tokens(command), &tokens(filter)),
                Err(ShellError::Usage(_))
            )
        };
        assert!(usage(&["ls"], &["grep", "a"]));
        assert!(usage(&["ls"], &["find"]));
        assert!(usage(&["ls"], &["find", "a", "b"]));
        assert!(usage(&[], &["find", "a"]));
    }

    #[test]
    fn search_all_keeps_matching_lines_in_order() {
        assert_eq!(
            search_all("banana\ncherry\napple\nmango\n", "an"),
            vec!["banana", "mango"]
        );
        assert_eq!(search_all("あaい\nう", "a"), vec!["あaい"]);
        assert!(search_all("abc", "").is_empty());
    }

    #[test]
    fn ls_filtered_by_letter() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["apple", "berry", "banana", "kiwi"] {
            fs::write(dir.path().join(name), "").unwrap();
        }
        let dir_arg = dir.path().display().to_string();

        let mut out = Vec::new();
        let count = run(&search_path(), &tokens(&["ls", &dir_arg]), &tokens(&["find", "a"]), &mut out).unwrap();
        assert_eq!(count, 2);
        assert_eq!(String::from_utf8(out).unwrap(), "apple\nbanana\n");
    }

    #[test]
    fn unsupported_keyword_runs_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("touched");
        let marker_arg = marker.display().to_string();

        let mut out = Vec::new();
        let err = run(&search_path(), &tokens(&["touch", &marker_arg]), &tokens(&["grep", "a"]), &mut out)
            .unwrap_err();
        assert!(matches!(err, ShellError::Usage(_)));
        assert!(out.is_empty());
        assert!(!marker.exists());
    }

    #[test]
    fn unknown_command_is_reported() {
        let mut out = Vec::new();
        let err = run(
            &search_path(),
            &tokens(&["definitely-not-a-binary-xyz"]),
            &tokens(&["find", "a"]),
            &mut out,
        )
        .unwrap_err();
        assert!(matches!(err, ShellError::CommandNotFound(_)));
    }
}
