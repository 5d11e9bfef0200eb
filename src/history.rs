//! コマンド履歴の管理。
//!
//! 起動時に履歴ファイル（既定 `~/.tsh_history`）を全件読み込み、確定した非空行を
//! 1 行ずつ追記する。ファイルは追記専用で、切り詰めは行わない。
//!
//! ## ナビゲーション
//!
//! `read_line` の開始時に [`History::begin_nav`] で `entries` の作業コピー `nav` を作り、
//! 末尾に「現在の入力」用のセンチネルスロットを 1 つ足す。
//! ↑↓で移動するときは、離れるスロットに現在のバッファを書き戻す。
//! これにより編集途中の行は、別の履歴を見に行って戻ってきても失われない。
//! 書き戻しは作業コピーに対してのみ行い、確定済みの `entries` は変わらない。

use std::fs::{self, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

/// コマンド履歴。確定済みエントリとナビゲーション用の作業コピーを持つ。
pub struct History {
    /// 確定済みエントリ（古い順）。
    entries: Vec<String>,
    /// ナビゲーション用の作業コピー。`nav.len() == entries.len() + 1` で、最後がセンチネル。
    nav: Vec<String>,
    /// `nav` 内の現在位置。
    nav_index: usize,
    /// 履歴ファイル。`None` ならメモリ上のみ。
    path: Option<PathBuf>,
}

impl History {
    /// `path` から既存エントリを読み込んで `History` を作る。
    /// ファイルが無ければ空の履歴から始める。
    pub fn load(path: &Path) -> Self {
        let mut entries = Vec::new();
        match fs::File::open(path) {
            Ok(file) => {
                for line in BufReader::new(file).lines().map_while(Result::ok) {
                    if !line.is_empty() {
                        entries.push(line);
                    }
                }
                log::debug!("loaded {} history entries from {}", entries.len(), path.display());
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => log::warn!("cannot read history file {}: {}", path.display(), e),
        }
        let mut h = Self::in_memory(entries);
        h.path = Some(path.to_path_buf());
        h
    }

    /// ファイルに永続化しない履歴を作る。
    pub fn in_memory(entries: Vec<String>) -> Self {
        let mut h = Self {
            entries,
            nav: Vec::new(),
            nav_index: 0,
            path: None,
        };
        h.begin_nav();
        h
    }

    /// 確定済みエントリ。
    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    /// 非空行を末尾に追加し、履歴ファイルにも追記する。空行は何もしない。
    ///
    /// 追加した場合に `true` を返す。ファイルへの書き込み失敗は警告ログのみで、
    /// メモリ上の履歴には追加される。
    pub fn add(&mut self, line: &str) -> bool {
        if line.trim().is_empty() {
            return false;
        }
        self.entries.push(line.to_string());
        if let Some(path) = &self.path {
            if let Err(e) = append_line(path, line) {
                log::warn!("cannot append to history file {}: {}", path.display(), e);
            }
        }
        true
    }

    /// ナビゲーション状態を作り直す（`read_line` 開始時に呼ぶ）。
    pub fn begin_nav(&mut self) {
        self.nav.clear();
        self.nav.extend(self.entries.iter().cloned());
        self.nav.push(String::new());
        self.nav_index = self.entries.len();
    }

    /// ↑: `current` を現在のスロットに書き戻し、一つ前のスロットの内容を返す。
    /// 先頭なら `None`。
    pub fn prev(&mut self, current: &str) -> Option<&str> {
        if self.nav_index == 0 {
            return None;
        }
        self.stash(current);
        self.nav_index -= 1;
        Some(&self.nav[self.nav_index])
    }

    /// ↓: `current` を現在のスロットに書き戻し、一つ次のスロットの内容を返す。
    ///
    /// センチネル位置ではさらに進めず、バッファが空なら `None`（何もしない）、
    /// 空でなければ空行を返す。
    pub fn next(&mut self, current: &str) -> Option<&str> {
        if self.nav_index + 1 < self.nav.len() {
            self.stash(current);
            self.nav_index += 1;
            return Some(&self.nav[self.nav_index]);
        }
        if current.is_empty() {
            None
        } else {
            Some("")
        }
    }

    fn stash(&mut self, current: &str) {
        if let Some(slot) = self.nav.get_mut(self.nav_index) {
            slot.clear();
            slot.push_str(current);
        }
    }
}

fn append_line(path: &Path, line: &str) -> io::Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "{}", line)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_history(entries: &[&str]) -> History {
        History::in_memory(entries.iter().map(|s| s.to_string()).collect())
    }

    #[test]
    fn prev_next_navigation() {
        let mut h = make_history(&["first", "second", "third"]);

        assert_eq!(h.prev("current"), Some("third"));
        assert_eq!(h.prev("third"), Some("second"));
        assert_eq!(h.prev("second"), Some("first"));
        assert_eq!(h.prev("first"), None);

        assert_eq!(h.next("first"), Some("second"));
        assert_eq!(h.next("second"), Some("third"));
        assert_eq!(h.next("third"), Some("current"));
    }

    #[test]
    fn edits_survive_paging_away_and_back() {
        let mut h = make_history(&["ls", "pwd"]);
        assert_eq!(h.prev("draft"), Some("pwd"));
        // 呼び出した履歴を編集してから離れる
        assert_eq!(h.prev("pwd -P"), Some("ls"));
        assert_eq!(h.next("ls"), Some("pwd -P"));
        assert_eq!(h.next("pwd -P"), Some("draft"));
        // 確定済みエントリは変わらない
        assert_eq!(h.entries(), &["ls".to_string(), "pwd".to_string()]);
    }

    #[test]
    fn down_at_sentinel() {
        let mut h = make_history(&["a"]);
        assert_eq!(h.next(""), None);
        assert_eq!(h.next("typed"), Some(""));
        assert_eq!(h.prev(""), Some("a"));
    }

    #[test]
    fn begin_nav_discards_stashed_edits() {
        let mut h = make_history(&["a", "b"]);
        h.prev("x");
        h.prev("b-edited");
        h.begin_nav();
        assert_eq!(h.prev(""), Some("b"));
    }

    #[test]
    fn add_skips_empty_and_keeps_duplicates() {
        let mut h = make_history(&[]);
        assert!(!h.add(""));
        assert!(!h.add("  "));
        assert!(h.entries().is_empty());

        assert!(h.add("echo hello"));
        assert!(h.add("echo hello"));
        assert_eq!(h.entries().len(), 2);
    }

    #[test]
    fn add_appends_to_file_and_load_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hist");
        fs::write(&path, "old one\n\nold two\n").unwrap();

        let mut h = History::load(&path);
        assert_eq!(h.entries(), &["old one".to_string(), "old two".to_string()]);

        h.add("new");
        h.add("");
        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content, "old one\n\nold two\nnew\n");

        let reloaded = History::load(&path);
        assert_eq!(reloaded.entries().len(), 3);
    }

    #[test]
    fn load_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let h = History::load(&dir.path().join("absent"));
        assert!(h.entries().is_empty());
    }
}
