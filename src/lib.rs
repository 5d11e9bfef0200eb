//! tsh ライブラリ: ベンチマーク・テスト用にモジュールを公開する。
//!
//! バイナリ本体は `main.rs` の REPL ループ。
//! この `lib.rs` は `benches/bench_main.rs` 等の外部クレートから
//! パーサー・コマンド解決・フィルタ機能に直接アクセスするために存在する。
//!
//! ## モジュール構成
//!
//! | モジュール | 役割 |
//! |-----------|------|
//! | [`editor`] | 行エディタ（raw モード、キー入力、バッファ操作、表示更新、プロンプト） |
//! | [`history`] | コマンド履歴（ファイル永続化、↑↓ ナビゲーション） |
//! | [`parser`] | トークン化、ダブルクォート結合、行の分類 |
//! | [`executor`] | ディスパッチ（ビルトイン、フィルタ、バックグラウンド、フォアグラウンド） |
//! | [`builtins`] | ビルトイン（`cd`, `jobs`, `bf`, `killjob`） |
//! | [`launcher`] | コマンド解決と 2 段構えの起動 |
//! | [`spawn`] | `posix_spawn` / `waitpid` ラッパー |
//! | [`job`] | ジョブテーブル |
//! | [`pipe`] | `cmd \| find x` の 2 段フィルタ |
//! | [`signals`] | SIGINT フラグとハンドラ設定 |
//! | [`shell`] | セッション状態 |
//! | [`config`] | 環境変数から確定する設定 |
//! | [`error`] | エラー型 |

pub mod builtins;
pub mod config;
pub mod editor;
pub mod error;
pub mod executor;
pub mod history;
pub mod job;
pub mod launcher;
pub mod parser;
pub mod pipe;
pub mod shell;
pub mod signals;
pub mod spawn;
