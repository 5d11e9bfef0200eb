//! 行エディタ: raw モード、キー入力、バッファ操作、表示更新。
//!
//! `libc`（termios, `read(2)`）で端末を raw モードにし、自前の行エディタを提供する。
//!
//! ## アーキテクチャ
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │ LineEditor::read_line()                       │
//! │  ┌──────────┐  ┌──────────┐  ┌────────────┐  │
//! │  │ RawMode  │  │ read_key │  │ render     │  │
//! │  │ (RAII)   │  │ (入力)   │  │ (表示更新) │  │
//! │  └──────────┘  └──────────┘  └────────────┘  │
//! │                      │                        │
//! │               ┌──────┴──────┐                 │
//! │               │ History     │                 │
//! │               │ (↑↓ 履歴)  │                 │
//! │               └─────────────┘                 │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! ## raw モードの範囲
//!
//! raw モードは [`LineEditor`] の生存期間全体で有効（シェルセッション全体）。
//! [`RawMode`] の RAII ガードをエディタが保持し、エディタの Drop で元の termios が復元される。
//! `ISIG` は残すので Ctrl+C は SIGINT として届き、[`signals`](crate::signals) の
//! フラグ経由でメインループに伝わる。
//!
//! ## 表示更新
//!
//! 変更のたびに全行を再描画する: 行クリア (`\x1b[2K\r`) → プロンプト + バッファ →
//! カーソル列の絶対指定 (`\x1b[{N}G`)。表示は常に論理バッファと一致する。

use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::error::ShellError;
use crate::history::History;
use crate::signals;

/// Ctrl+D が押されたときに `read_line` が返す行。
pub const EOF_LINE: &str = "exit";

// ── RawMode ガード ────────────────────────────────────────────────

/// RAII ガードで raw モードを管理する。Drop で元の termios を自動復元する。
///
/// | フラグ | 操作 | 理由 |
/// |--------|------|------|
/// | `c_lflag` | `ECHO\|ICANON` OFF | エコー無効、1 バイトずつ読み取り |
/// | `c_lflag` | `ISIG` ON のまま | Ctrl+C を SIGINT として受け取る |
/// | `VMIN`/`VTIME` | `1` / `0` | 最低 1 バイトで即座に返る |
pub struct RawMode {
    /// `tcgetattr` で保存した元の termios 設定。
    orig: libc::termios,
    fd: i32,
}

impl RawMode {
    /// `tcgetattr` で現在の設定を保存し、raw モードを `tcsetattr(TCSAFLUSH)` で適用する。
    pub fn enable(fd: i32) -> io::Result<Self> {
        let mut orig: libc::termios = unsafe { std::mem::zeroed() };
        if unsafe { libc::tcgetattr(fd, &mut orig) } != 0 {
            return Err(io::Error::last_os_error());
        }
        let mut raw = orig;
        raw.c_lflag &= !(libc::ECHO | libc::ICANON);
        raw.c_cc[libc::VMIN] = 1;
        raw.c_cc[libc::VTIME] = 0;
        if unsafe { libc::tcsetattr(fd, libc::TCSAFLUSH, &raw) } != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(Self { orig, fd })
    }
}

impl Drop for RawMode {
    fn drop(&mut self) {
        unsafe {
            libc::tcsetattr(self.fd, libc::TCSAFLUSH, &self.orig);
        }
    }
}

// ── Key 入力 ──────────────────────────────────────────────────────

/// 入力バイト列から解釈したキー。
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Key {
    /// 印字可能文字（ASCII + UTF-8）。
    Char(char),
    /// 改行。行を確定する。
    Enter,
    /// DEL (`0x7f`)。
    Backspace,
    /// `ESC [ D`
    Left,
    /// `ESC [ C`
    Right,
    /// `ESC [ A`: 履歴を遡る。
    Up,
    /// `ESC [ B`: 履歴を進む。
    Down,
    /// `ESC [ H`
    Home,
    /// `ESC [ F`
    End,
    /// `ESC [ 1 ; 5 D`（Ctrl+←）: 前の単語頭へ。
    WordLeft,
    /// `ESC [ 1 ; 5 C`（Ctrl+→）: 次の単語末へ。
    WordRight,
    /// Ctrl+D (`0x04`)。
    CtrlD,
    /// 割り当てのない制御バイト・シーケンス。黙って捨てる。
    Ignored,
}

/// 1 バイト読み取る。EOF なら `Ok(None)`。
/// `EINTR` は呼び出し側で割り込みフラグを確認できるよう、そのまま返す。
fn read_byte<R: Read>(input: &mut R) -> io::Result<Option<u8>> {
    let mut buf = [0u8; 1];
    match input.read(&mut buf)? {
        0 => Ok(None),
        _ => Ok(Some(buf[0])),
    }
}

/// ESC (`\x1b`) 後のエスケープシーケンスを解析する。
///
/// 2 バイト形式（`[A`〜`[D`, `[H`, `[F`、`O` 始まりも同様）と、数字で始まる
/// CSI 形式（`[1;5C` / `[1;5D`、`[1~` / `[4~`、`[3~` 等）に対応する。
/// 数字で始まる形式は終端バイトまで読み切るので、割り当てのないキーでも
/// `~` などの残りがバッファに入ることはない。
fn read_escape_seq<R: Read>(input: &mut R) -> io::Result<Key> {
    match read_byte(input)? {
        Some(b'[') | Some(b'O') => {}
        _ => return Ok(Key::Ignored),
    }

    let key = match read_byte(input)? {
        Some(b'A') => Key::Up,
        Some(b'B') => Key::Down,
        Some(b'C') => Key::Right,
        Some(b'D') => Key::Left,
        Some(b'H') => Key::Home,
        Some(b'F') => Key::End,
        Some(b) if b.is_ascii_digit() => read_csi_params(input, b)?,
        _ => Key::Ignored,
    };
    Ok(key)
}

/// CSI のパラメータ部（数字と `;`）を終端バイトまで読み、キーに変換する。
fn read_csi_params<R: Read>(input: &mut R, first: u8) -> io::Result<Key> {
    const MAX_PARAMS: usize = 16;

    let mut params = vec![first];
    let last = loop {
        match read_byte(input)? {
            Some(b) if b.is_ascii_digit() || b == b';' => {
                if params.len() >= MAX_PARAMS {
                    return Ok(Key::Ignored);
                }
                params.push(b);
            }
            Some(b) => break b,
            None => return Ok(Key::Ignored),
        }
    };

    Ok(match (params.as_slice(), last) {
        (b"1;5", b'C') => Key::WordRight,
        (b"1;5", b'D') => Key::WordLeft,
        (b"1" | b"7", b'~') => Key::Home,
        (b"4" | b"8", b'~') => Key::End,
        _ => Key::Ignored,
    })
}

/// UTF-8 マルチバイト文字の残りのバイトを読み取り、`Key::Char` に変換する。
fn read_utf8<R: Read>(input: &mut R, first: u8, expected_len: usize) -> io::Result<Key> {
    let mut buf = [0u8; 4];
    buf[0] = first;
    for slot in buf.iter_mut().take(expected_len).skip(1) {
        match read_byte(input)? {
            Some(b) => *slot = b,
            None => return Ok(Key::Ignored),
        }
    }
    Ok(match std::str::from_utf8(&buf[..expected_len]) {
        Ok(s) => s.chars().next().map_or(Key::Ignored, Key::Char),
        Err(_) => Key::Ignored,
    })
}

/// `input` から 1 キー分のバイト列を読み取り、[`Key`] に変換する。EOF なら `Ok(None)`。
pub fn read_key<R: Read>(input: &mut R) -> io::Result<Option<Key>> {
    let byte = match read_byte(input)? {
        Some(b) => b,
        None => return Ok(None),
    };

    let key = match byte {
        b'\n' | b'\r' => Key::Enter,
        0x7f => Key::Backspace,
        0x1b => read_escape_seq(input)?,
        4 => Key::CtrlD,
        b if (32..127).contains(&b) => Key::Char(b as char),
        b if b & 0xE0 == 0xC0 => read_utf8(input, b, 2)?,
        b if b & 0xF0 == 0xE0 => read_utf8(input, b, 3)?,
        b if b & 0xF8 == 0xF0 => read_utf8(input, b, 4)?,
        _ => Key::Ignored,
    };
    Ok(Some(key))
}

/// 端末 fd を `libc::read` で直接読む入力。Rust の stdin バッファを経由しない。
///
/// `EINTR` は `ErrorKind::Interrupted` としてそのまま返す。
pub struct TerminalInput {
    fd: i32,
}

impl TerminalInput {
    pub fn stdin() -> Self {
        Self {
            fd: libc::STDIN_FILENO,
        }
    }
}

impl Read for TerminalInput {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = unsafe { libc::read(self.fd, buf.as_mut_ptr() as *mut libc::c_void, buf.len()) };
        if n < 0 {
            Err(io::Error::last_os_error())
        } else {
            Ok(n as usize)
        }
    }
}

// ── プロンプト ────────────────────────────────────────────────────

/// 表示用プロンプト。ANSI カラーを含む文字列と、その表示幅を持つ。
#[derive(Debug, Clone, PartialEq)]
pub struct Prompt {
    text: String,
    width: usize,
}

impl Prompt {
    /// `user@( dir )-> ` を組み立てる。`cwd` が `home` 配下なら `~` に短縮する。
    pub fn compose(user: &str, home: &Path, cwd: &Path) -> Self {
        let dir = abbreviate_home(home, cwd);
        let plain = format!("{}@( {} )-> ", user, dir);
        let text = format!(
            "\x1b[31m{}\x1b[0m@( \x1b[1m\x1b[32m{}\x1b[0m )-> ",
            user, dir
        );
        Self {
            text,
            width: plain.chars().count(),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// カーソル位置計算に使う表示幅（エスケープシーケンスを除く文字数）。
    pub fn width(&self) -> usize {
        self.width
    }
}

fn abbreviate_home(home: &Path, cwd: &Path) -> String {
    if home.as_os_str().is_empty() || home == Path::new("/") {
        return cwd.display().to_string();
    }
    match cwd.strip_prefix(home) {
        Ok(rest) if rest.as_os_str().is_empty() => "~".to_string(),
        Ok(rest) => format!("~/{}", rest.display()),
        Err(_) => cwd.display().to_string(),
    }
}

// ── LineEditor ────────────────────────────────────────────────────

/// キー処理の結果。
#[derive(Debug, PartialEq)]
enum Action {
    /// 表示更新が必要。
    Render,
    /// 何もしない（表示も変えない）。
    Skip,
    /// 行確定。
    Submit,
    /// Ctrl+D。
    Eof,
}

/// 行エディタ本体。入力バッファ、カーソル位置、履歴、raw モードガードを保持する。
///
/// メインループの開始時に [`LineEditor::new`] で生成し、毎プロンプトで
/// [`LineEditor::read_line`] を呼ぶ。履歴はセッション中このエディタだけが所有する。
pub struct LineEditor {
    /// 現在の入力テキスト。
    buf: String,
    /// カーソルのバイトオフセット（`0` = 行頭、`buf.len()` = 行末）。常に文字境界上。
    cursor: usize,
    history: History,
    /// `read_line` 呼び出しごとに一度だけ組み立てるプロンプト。
    prompt: Prompt,
    user: String,
    home: PathBuf,
    /// `false` なら端末ではない入力（スクリプト）。プロンプトと再描画を出さない。
    interactive: bool,
    /// 端末の raw モード。Drop で復元される。
    _raw: Option<RawMode>,
}

impl LineEditor {
    /// 履歴ファイルを読み込み、stdin が端末なら raw モードに切り替える。
    ///
    /// 端末なのに raw モードにできない場合は [`ShellError::Terminal`]。
    pub fn new(config: &Config) -> Result<Self, ShellError> {
        let history = History::load(&config.history_path);
        let interactive = unsafe { libc::isatty(libc::STDIN_FILENO) } == 1;
        let raw = if interactive {
            Some(RawMode::enable(libc::STDIN_FILENO).map_err(ShellError::Terminal)?)
        } else {
            None
        };
        let mut editor = Self::with_history(history, &config.user, &config.home);
        editor.interactive = interactive;
        editor._raw = raw;
        Ok(editor)
    }

    /// 端末を触らないエディタを作る。入出力は [`read_line_from`](Self::read_line_from) で渡す。
    pub fn with_history(history: History, user: &str, home: &Path) -> Self {
        Self {
            buf: String::new(),
            cursor: 0,
            history,
            prompt: Prompt::compose(user, home, home),
            user: user.to_string(),
            home: home.to_path_buf(),
            interactive: true,
            _raw: None,
        }
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    /// stdin から 1 行読み取る。
    pub fn read_line(&mut self) -> io::Result<String> {
        let mut input = TerminalInput::stdin();
        let stdout = io::stdout();
        let mut out = stdout.lock();
        self.read_line_from(&mut input, &mut out)
    }

    /// プロンプトを表示し、`input` から 1 行読み取る。
    ///
    /// - Enter → バッファの内容（非空なら履歴に追加）
    /// - Ctrl+D / 入力 EOF → [`EOF_LINE`]
    /// - 割り込みで `read` が中断され、割り込みフラグが立っている → 入力途中の行を捨てて空行
    pub fn read_line_from<R: Read, W: Write>(&mut self, input: &mut R, out: &mut W) -> io::Result<String> {
        let cwd = std::env::current_dir().unwrap_or_else(|_| self.home.clone());
        self.prompt = Prompt::compose(&self.user, &self.home, &cwd);
        self.buf.clear();
        self.cursor = 0;
        self.history.begin_nav();

        if self.interactive {
            out.write_all(self.prompt.text().as_bytes())?;
            out.flush()?;
        }

        loop {
            let key = match read_key(input) {
                Ok(Some(key)) => key,
                Ok(None) => Key::CtrlD,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {
                    if signals::interrupt_pending() {
                        self.buf.clear();
                        self.cursor = 0;
                        return Ok(String::new());
                    }
                    continue;
                }
                Err(e) => return Err(e),
            };

            match self.handle_key(key) {
                Action::Render => {
                    if self.interactive {
                        out.write_all(self.render().as_bytes())?;
                        out.flush()?;
                    }
                }
                Action::Skip => {}
                Action::Submit => {
                    if self.interactive {
                        out.write_all(b"\n")?;
                        out.flush()?;
                    }
                    let line = std::mem::take(&mut self.buf);
                    self.cursor = 0;
                    self.history.add(&line);
                    return Ok(line);
                }
                Action::Eof => {
                    if self.interactive {
                        out.write_all(b"\n")?;
                        out.flush()?;
                    }
                    return Ok(EOF_LINE.to_string());
                }
            }
        }
    }

    /// キー 1 つ分の状態遷移。
    fn handle_key(&mut self, key: Key) -> Action {
        match key {
            Key::Enter => return Action::Submit,
            Key::CtrlD => return Action::Eof,
            Key::Ignored => return Action::Skip,
            Key::Char(ch) => self.insert_char(ch),
            Key::Backspace => self.delete_char_before(),
            Key::Left => self.move_left(),
            Key::Right => self.move_right(),
            Key::Home => self.cursor = 0,
            Key::End => self.cursor = self.buf.len(),
            Key::WordLeft => self.move_word_left(),
            Key::WordRight => self.move_word_right(),
            Key::Up => self.history_prev(),
            Key::Down => self.history_next(),
        }
        Action::Render
    }

    // ── バッファ操作 ──────────────────────────────────────────────

    /// カーソル位置に 1 文字挿入し、カーソルをその文字の直後に進める。
    fn insert_char(&mut self, ch: char) {
        self.buf.insert(self.cursor, ch);
        self.cursor += ch.len_utf8();
    }

    /// Backspace: カーソル直前の 1 文字を削除する。行頭では何もしない。
    fn delete_char_before(&mut self) {
        if self.cursor > 0 {
            let prev = self.prev_boundary();
            self.buf.remove(prev);
            self.cursor = prev;
        }
    }

    /// 行頭では何もしない。
    fn move_left(&mut self) {
        if self.cursor > 0 {
            self.cursor = self.prev_boundary();
        }
    }

    /// 行末では何もしない。
    fn move_right(&mut self) {
        if let Some(ch) = self.buf[self.cursor..].chars().next() {
            self.cursor += ch.len_utf8();
        }
    }

    fn prev_boundary(&self) -> usize {
        self.buf[..self.cursor]
            .char_indices()
            .next_back()
            .map(|(i, _)| i)
            .unwrap_or(0)
    }

    /// Ctrl+←: 手前の空白を飛ばし、単語の先頭まで戻る。
    fn move_word_left(&mut self) {
        let before = &self.buf[..self.cursor];
        let trimmed = before.trim_end_matches(' ');
        self.cursor = trimmed.rfind(' ').map(|i| i + 1).unwrap_or(0);
    }

    /// Ctrl+→: 空白を飛ばし、次の単語の末尾まで進む。
    fn move_word_right(&mut self) {
        let after = &self.buf[self.cursor..];
        let skipped = after.len() - after.trim_start_matches(' ').len();
        let rest = &after[skipped..];
        let word = rest.find(' ').unwrap_or(rest.len());
        self.cursor += skipped + word;
    }

    // ── 履歴ナビゲーション ────────────────────────────────────────

    /// ↑: 現在のバッファを今のスロットに退避し、一つ前の履歴を表示する。
    fn history_prev(&mut self) {
        if let Some(entry) = self.history.prev(&self.buf).map(str::to_string) {
            self.buf = entry;
            self.cursor = self.buf.len();
        }
    }

    /// ↓: 一つ次の履歴へ。末尾を越えると空行、空バッファのまま末尾なら何もしない。
    fn history_next(&mut self) {
        if let Some(entry) = self.history.next(&self.buf).map(str::to_string) {
            self.buf = entry;
            self.cursor = self.buf.len();
        }
    }

    // ── 表示更新 ──────────────────────────────────────────────────

    /// 再描画シーケンスを組み立てる。
    ///
    /// 1. `\x1b[2K\r` で行全体をクリアして行頭へ
    /// 2. プロンプト + バッファ
    /// 3. `\x1b[{N}G` でカーソルを絶対列（1 始まり）に置く
    fn render(&self) -> String {
        let column = self.prompt.width() + self.cursor_chars() + 1;
        format!("\x1b[2K\r{}{}\x1b[{}G", self.prompt.text(), self.buf, column)
    }

    /// 文字単位のカーソル位置。
    fn cursor_chars(&self) -> usize {
        self.buf[..self.cursor].chars().count()
    }
}

// ── Tests ─────────────────────────────────────────────────────────
