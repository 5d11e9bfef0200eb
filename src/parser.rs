//! トークナイザ + 行分類: 入力行を引数列に分解し、実行経路を決める。
//!
//! 1. 空白区切りでトークン化する（[`tokenize`]）
//! 2. `"` で始まるトークンから `"` で終わるトークンまでを 1 引数に再結合し、クォートを外す
//!    （[`merge_quoted`]）
//! 3. 行を分類する（[`parse`]）
//!    - クォート外の `|` がちょうど 1 つ → [`Line::Pipe`]（2 段テキストフィルタ、
//!      [`pipe`](crate::pipe) が解釈）。2 つ以上は usage エラー
//!    - 先頭または末尾に単独の `&` → [`Line::Background`]
//!    - それ以外 → [`Line::Command`]（ビルトイン判定は executor が行う）
//!
//! 変数展開・リダイレクト・サブシェルなどの構文は扱わない。

use crate::error::ShellError;

/// バックグラウンド実行マーカー。
pub const BACKGROUND_MARKER: &str = "&";

/// パイプ記号。
pub const PIPE: char = '|';

/// 分類済みの入力行。
#[derive(Debug, PartialEq)]
pub enum Line {
    /// フォアグラウンドで実行するコマンド（ビルトインまたは外部コマンド）。
    Command(Vec<String>),
    /// バックグラウンドで起動する外部コマンド。マーカーは取り除き済み。
    Background(Vec<String>),
    /// `cmd | find needle` 形式。`|` の左右を別々に持つ。
    Pipe {
        /// `|` より前（コマンドと引数）。
        command: Vec<String>,
        /// `|` より後（キーワードと検索語）。
        filter: Vec<String>,
    },
}

/// 空白区切りでトークン化する。
pub fn tokenize(line: &str) -> Vec<&str> {
    line.split_whitespace().collect()
}

/// ダブルクォートで囲まれたトークン列を 1 引数に結合する。
///
/// `"` で始まるトークンから、`"` で終わるトークンまでを空白 1 つで連結し、両端のクォートを外す。
/// 閉じクォートがなければ [`ShellError::Usage`]。
pub fn merge_quoted(tokens: &[&str]) -> Result<Vec<String>, ShellError> {
    let mut args = Vec::with_capacity(tokens.len());
    let mut open: Option<String> = None;

    for &tok in tokens {
        match open.as_mut() {
            Some(acc) => {
                acc.push(' ');
                if let Some(body) = tok.strip_suffix('"') {
                    acc.push_str(body);
                    args.extend(open.take());
                } else {
                    acc.push_str(tok);
                }
            }
            None => match tok.strip_prefix('"') {
                Some(rest) => match rest.strip_suffix('"') {
                    Some(body) => args.push(body.to_string()),
                    None => open = Some(rest.to_string()),
                },
                None => args.push(tok.to_string()),
            },
        }
    }

    if open.is_some() {
        return Err(ShellError::Usage("unterminated quote".to_string()));
    }
    Ok(args)
}

/// 入力行を解析する。空行（空白のみを含む）は `Ok(None)`。
pub fn parse(line: &str) -> Result<Option<Line>, ShellError> {
    let pipes = pipe_positions(line);
    match pipes.as_slice() {
        [] => {}
        [at] => {
            let command = merge_quoted(&tokenize(&line[..*at]))?;
            let filter = merge_quoted(&tokenize(&line[at + 1..]))?;
            return Ok(Some(Line::Pipe { command, filter }));
        }
        _ => {
            return Err(ShellError::Usage(
                "only one '|' is supported: <command> | find <string>".to_string(),
            ))
        }
    }

    let tokens = tokenize(line);
    if tokens.is_empty() {
        return Ok(None);
    }
    let mut args = merge_quoted(&tokens)?;

    let leading = args.first().is_some_and(|a| a == BACKGROUND_MARKER);
    let trailing = args.len() > 1 && args.last().is_some_and(|a| a == BACKGROUND_MARKER);
    if !leading && !trailing {
        return Ok(Some(Line::Command(args)));
    }

    if trailing {
        args.pop();
    }
    if leading {
        args.remove(0);
    }
    if args.is_empty() {
        return Err(ShellError::Usage("<command> &".to_string()));
    }
    Ok(Some(Line::Background(args)))
}

/// ダブルクォートの外にある `|` のバイト位置。
fn pipe_positions(line: &str) -> Vec<usize> {
    let mut quoted = false;
    let mut positions = Vec::new();
    for (i, ch) in line.char_indices() {
        match ch {
            '"' => quoted = !quoted,
            PIPE if !quoted => positions.push(i),
            _ => {}
        }
    }
    positions
}
