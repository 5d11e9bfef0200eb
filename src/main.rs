//! tsh: ジョブ制御付きの小さな対話シェル
//!
//! REPLループ: プロンプト表示 → 行エディタで入力読み取り → 解析 → 実行 → ループ
//!
//! ## モジュール構成
//!
//! | モジュール | 役割 |
//! |-----------|------|
//! | [`editor`] | 行エディタ（raw モード、キー入力、バッファ操作、表示更新、プロンプト） |
//! | [`history`] | コマンド履歴（ファイル永続化、↑↓ ナビゲーション、編集中の行の退避） |
//! | [`parser`] | トークン化、ダブルクォート結合、行の分類（コマンド / バックグラウンド / フィルタ） |
//! | [`executor`] | ディスパッチ（ビルトイン、フィルタ、バックグラウンド、フォアグラウンド） |
//! | [`builtins`] | ビルトイン（`cd`, `jobs`, `bf`, `killjob`） |
//! | [`launcher`] | コマンド解決と 2 段構えの起動（スレッド経由 → `posix_spawn` フォールバック） |
//! | [`spawn`] | `posix_spawn` / `waitpid` ラッパー |
//! | [`job`] | ジョブテーブル（バックグラウンド起動、一覧、フォアグラウンド化、終了） |
//! | [`pipe`] | `cmd \| find x` の 2 段フィルタ |
//! | [`signals`] | SIGINT フラグとハンドラ設定 |
//! | [`shell`] | セッション状態（設定、ジョブテーブル、終了ステータス） |
//! | [`config`] | 環境変数から確定する設定 |
//! | [`error`] | エラー型 |

mod builtins;
mod config;
mod editor;
mod error;
mod executor;
mod history;
mod job;
mod launcher;
mod parser;
mod pipe;
mod shell;
mod signals;
mod spawn;

use std::io::{self, Write};

use config::Config;
use editor::{LineEditor, EOF_LINE};
use error::ShellError;
use shell::Shell;

/// `~/.tshrc` を読み込んで各行を実行する。ファイルが存在しなければサイレントスキップ。
fn load_rc(shell: &mut Shell) {
    let rc_path = shell.config.rc_path.clone();
    let content = match std::fs::read_to_string(&rc_path) {
        Ok(c) => c,
        Err(_) => return, // ファイルなし → サイレントスキップ
    };
    log::debug!("loading {}", rc_path.display());

    let stdout = io::stdout();
    let stderr = io::stderr();
    run_rc(
        shell,
        &rc_path.display().to_string(),
        &content,
        &mut stdout.lock(),
        &mut stderr.lock(),
    );
}

/// rc ファイルの内容を 1 行ずつ実行する。空行と `#` 行は読み飛ばす。
/// エラーは `err` に `tsh: <file>:<行>: <メッセージ>` で報告し、次の行に進む。
fn run_rc(shell: &mut Shell, origin: &str, content: &str, out: &mut dyn Write, err: &mut dyn Write) {
    for (i, line) in content.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let result = match rc_only_interactive(trimmed) {
            Some(e) => Err(e),
            None => executor::execute(shell, trimmed, out),
        };
        if let Err(e) = result {
            let _ = writeln!(err, "tsh: {}:{}: {}", origin, i + 1, e);
        }
    }
}

/// メインループだけが扱う `exit` と `history` は rc では使えない。
fn rc_only_interactive(cmd: &str) -> Option<ShellError> {
    match cmd.split_whitespace().next() {
        Some(EOF_LINE) => Some(ShellError::Usage("exit is not available in the rc file".to_string())),
        Some("history") => Some(ShellError::Usage("history is not available in the rc file".to_string())),
        _ => None,
    }
}

/// `history` / `history N` を処理する。
/// editor が履歴を所有しているため main.rs で特別扱いする。
fn handle_history(editor: &LineEditor, cmd: &str) -> i32 {
    let entries = editor.history().entries();
    let args: Vec<&str> = cmd.split_whitespace().collect();
    let start = match args.get(1) {
        None => 0,
        Some(n_str) => match n_str.parse::<usize>() {
            Ok(n) => entries.len().saturating_sub(n),
            Err(_) => {
                eprintln!("tsh: history: {}: numeric argument required", n_str);
                return 2;
            }
        },
    };
    for (i, entry) in entries[start..].iter().enumerate() {
        println!("{:5}  {}", start + i + 1, entry);
    }
    0
}

fn is_history_command(line: &str) -> bool {
    line.split_whitespace().next() == Some("history")
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    // シグナル設定: SIGINT はフラグを立てるだけ、SIGTTOU は無視。
    // 子プロセスでは起動経路ごとに SIG_DFL に戻す。
    if let Err(e) = signals::install() {
        eprintln!("tsh: {}", e);
    }

    let config = Config::from_env();
    log::debug!("config: {:?}", config);
    let mut shell = Shell::interactive(config);
    load_rc(&mut shell);

    // 行エディタ: セッション中ずっと raw モード（ECHO/ICANON オフ、ISIG はオン）。
    let mut editor = match LineEditor::new(&shell.config) {
        Ok(editor) => editor,
        Err(e) => {
            eprintln!("tsh: {}", e);
            std::process::exit(1);
        }
    };

    loop {
        // 割り込みはフラグを消費して新しいプロンプトへ
        if signals::take_interrupt() {
            println!();
            continue;
        }

        let line = match editor.read_line() {
            Ok(line) => line,
            Err(e) => {
                eprintln!("tsh: read: {}", e);
                break;
            }
        };
        let cmd = line.trim();
        if cmd == EOF_LINE {
            break;
        }
        if cmd.is_empty() {
            continue;
        }

        if is_history_command(cmd) {
            shell.last_status = handle_history(&editor, cmd);
            continue;
        }

        let stdout = io::stdout();
        let mut out = stdout.lock();
        if let Err(e) = executor::execute(&mut shell, cmd, &mut out) {
            eprintln!("tsh: {}", e);
        }
        let _ = out.flush();
    }

    if !shell.jobs.is_empty() {
        log::warn!("exiting with {} background job(s) still running", shell.jobs.len());
    }

    // editor の Drop で端末設定を戻してから終了する
    drop(editor);
    std::process::exit(0);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_shell() -> Shell {
        Shell::new(Config::from_lookup(|key| match key {
            "HOME" => Some("/tmp".to_string()),
            "PATH" => Some(config::DEFAULT_PATH.to_string()),
            _ => None,
        }))
    }

    #[test]
    fn rc_rejects_exit_and_history_and_continues() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("touched");
        let content = format!("# comment\n\nexit\nhistory 5\ntouch {}\n", marker.display());

        let mut shell = test_shell();
        let mut out = Vec::new();
        let mut err = Vec::new();
        run_rc(&mut shell, "tshrc", &content, &mut out, &mut err);

        let err = String::from_utf8(err).unwrap();
        assert!(err.contains("tsh: tshrc:3: usage: exit is not available"), "{err}");
        assert!(err.contains("tsh: tshrc:4: usage: history is not available"), "{err}");
        assert!(!err.contains("command not found"), "{err}");
        assert!(marker.exists());
    }

    #[test]
    fn rc_reports_errors_with_line_number() {
        let mut shell = test_shell();
        let mut out = Vec::new();
        let mut err = Vec::new();
        run_rc(&mut shell, "tshrc", "true\ndefinitely-not-a-binary-xyz\n", &mut out, &mut err);
        assert_eq!(
            String::from_utf8(err).unwrap(),
            "tsh: tshrc:2: definitely-not-a-binary-xyz: command not found\n"
        );
    }

    #[test]
    fn exit_prefix_is_not_mistaken_for_exit() {
        assert!(rc_only_interactive("exit").is_some());
        assert!(rc_only_interactive("history").is_some());
        assert!(rc_only_interactive("exiting").is_none());
        assert!(rc_only_interactive("cd /tmp").is_none());
    }
}
