//! tsh ベンチマーク: トークン化、行の分類、コマンド解決、キー入力デコード、フィルタ、起動経路の計測。
//!
//! `std::time::Instant` による手動計測。
//!
//! 実行: `cargo bench`

use std::time::{Duration, Instant};

use tsh::config::DEFAULT_PATH;
use tsh::editor::read_key;
use tsh::launcher::{Direct, Invocation, Launch, Managed, SearchPath};
use tsh::parser;
use tsh::pipe;

// ── ベンチマークインフラ ──────────────────────────────────────────

struct BenchResult {
    category: &'static str,
    name: &'static str,
    avg: Duration,
    iters: u64,
}

impl BenchResult {
    fn print(&self) {
        let avg_us = self.avg.as_nanos() as f64 / 1000.0;
        println!(
            "[{:<8}] {:<40}: avg {:>10.2}µs  ({} iters)",
            self.category, self.name, avg_us, self.iters,
        );
    }
}

fn bench<F: FnMut()>(category: &'static str, name: &'static str, iters: u64, mut f: F) -> BenchResult {
    // ウォームアップ
    for _ in 0..iters.min(100) {
        f();
    }

    let start = Instant::now();
    for _ in 0..iters {
        f();
    }
    let elapsed = start.elapsed();

    BenchResult {
        category,
        name,
        avg: elapsed / iters as u32,
        iters,
    }
}

fn report(results: &mut Vec<BenchResult>) {
    for r in results.iter() {
        r.print();
    }
    results.clear();
}

// ── メイン ────────────────────────────────────────────────────────

fn main() {
    println!("tsh benchmark suite");
    println!("{}", "=".repeat(80));

    let mut results = Vec::new();

    // ── パーサー ──
    println!("\n--- Parser ---");

    results.push(bench("parser", "tokenize \"ls -la /tmp\"", 10_000, || {
        let _ = parser::tokenize("ls -la /tmp");
    }));

    results.push(bench("parser", "merge_quoted 6 tokens", 10_000, || {
        let _ = parser::merge_quoted(&["echo", "\"hello", "big", "world\"", "and", "\"x\""]);
    }));

    results.push(bench("parser", "parse \"sleep 5 &\"", 10_000, || {
        let _ = parser::parse("sleep 5 &");
    }));

    results.push(bench("parser", "parse \"ls -a | find rc\"", 10_000, || {
        let _ = parser::parse("ls -a | find rc");
    }));

    report(&mut results);

    // ── コマンド解決 ──
    println!("\n--- Resolve ---");

    let search_path = SearchPath::parse(DEFAULT_PATH);

    results.push(bench("resolve", "resolve(\"ls\")", 10_000, || {
        let _ = search_path.resolve("ls");
    }));

    results.push(bench("resolve", "resolve(\"no-such-command\")", 10_000, || {
        let _ = search_path.resolve("no-such-command");
    }));

    results.push(bench("resolve", "resolve(\"/bin/sh\")", 10_000, || {
        let _ = search_path.resolve("/bin/sh");
    }));

    report(&mut results);

    // ── キー入力デコード ──
    println!("\n--- Key decoding ---");

    results.push(bench("editor", "read_key ascii x64", 10_000, || {
        let bytes = [b'a'; 64];
        let mut input: &[u8] = &bytes;
        while let Ok(Some(_)) = read_key(&mut input) {}
    }));

    results.push(bench("editor", "read_key ESC[1;5D x16", 10_000, || {
        let bytes = b"\x1b[1;5D".repeat(16);
        let mut input: &[u8] = &bytes;
        while let Ok(Some(_)) = read_key(&mut input) {}
    }));

    results.push(bench("editor", "read_key utf-8 x16", 10_000, || {
        let text = "あいうえおかきくけこさしすせそた";
        let mut input: &[u8] = text.as_bytes();
        while let Ok(Some(_)) = read_key(&mut input) {}
    }));

    report(&mut results);

    // ── フィルタ ──
    println!("\n--- Filter ---");

    let listing: String = (0..1_000).map(|i| format!("file_{:04}.txt\n", i)).collect();

    results.push(bench("filter", "search_all 1000 lines", 1_000, || {
        let _ = pipe::search_all(&listing, "_09");
    }));

    report(&mut results);

    // ── 起動経路 ──
    println!("\n--- Launch (spawn + wait) ---");

    let args = vec!["true".to_string()];
    match Invocation::resolve(&search_path, &args) {
        Ok(inv) => {
            results.push(bench("launch", "true (managed)", 500, || {
                let _ = Managed.launch(&inv);
            }));
            results.push(bench("launch", "true (direct)", 500, || {
                let _ = Direct.launch(&inv);
            }));
        }
        Err(e) => println!("skipped: {}", e),
    }

    report(&mut results);

    println!("\n{}", "=".repeat(80));
    println!("done.");
}
