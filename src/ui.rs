use std::io::{self, IsTerminal};

use crate::app::{ConfigView, FolderView, MemoView, StatusView};
use crate::csv::ImportSummary;

pub fn print_memo_list(memos: &[MemoView], config: &ConfigView, folder: Option<&str>) {
    let palette = Palette::auto();
    let scope = folder.unwrap_or("all folders");
    println!("{} {}", palette.heading("Memos"), palette.folder(scope));
    println!("{}", palette.dim(&sort_summary(config)));
    if let Some(summary) = filter_summary(config) {
        println!("{}", palette.dim(&format!("filters: {summary}")));
    }

    if memos.is_empty() {
        println!("{}", palette.dim("no memos matched"));
        return;
    }

    for memo in memos {
        println!("{}", format_memo_row(memo, &palette));
    }
    println!("{}", palette.dim(&format!("{} memo(s)", memos.len())));
}

fn format_memo_row(memo: &MemoView, palette: &Palette) -> String {
    let mut lines = memo.content.lines();
    let first = lines.next().unwrap_or_default();
    let more = lines.count();

    let mut line = format!(
        "{} {} {} {}",
        palette.id(&format!("#{}", memo.id)),
        palette.check(memo.completed),
        palette.priority(&memo.priority),
        first
    );
    if more > 0 {
        line.push(' ');
        line.push_str(&palette.dim(&format!("(+{more} line(s))")));
    }
    line.push(' ');
    line.push_str(&palette.dim(&memo.created_at));
    line
}

fn sort_summary(config: &ConfigView) -> String {
    let mut summary = format!("sort: {} {}", config.sort_key, config.sort_direction);
    if config.fixed_comp_down {
        summary.push_str(", completed pinned last");
    }
    summary
}

fn filter_summary(config: &ConfigView) -> Option<String> {
    let mut parts = Vec::new();
    if config.priority_filter != "all" {
        parts.push(format!("priority={}", config.priority_filter));
    }
    if config.status_filter != "all" {
        parts.push(format!("status={}", config.status_filter));
    }
    if config.date_filter != "all" {
        match config.date_filter_base.as_deref() {
            Some(base) => parts.push(format!("date={}@{}", config.date_filter, base)),
            None => parts.push(format!("date={}", config.date_filter)),
        }
    }

    if parts.is_empty() {
        None
    } else {
        Some(parts.join(" "))
    }
}

pub fn print_folder_list(folders: &[FolderView]) {
    let palette = Palette::auto();
    println!("{}", palette.heading("Folders"));
    if folders.is_empty() {
        println!("{}", palette.dim("no folders; create one with `tmemo folder add`"));
        return;
    }
    for folder in folders {
        let marker = if folder.current { "*" } else { " " };
        println!(
            "{} {} {}",
            marker,
            palette.folder(&folder.name),
            palette.dim(&format!("({} memo(s))", folder.memo_count))
        );
    }
}

pub fn print_config(config: &ConfigView) {
    let palette = Palette::auto();
    println!("{}", palette.heading("View"));
    println!("{}", sort_summary(config));
    println!(
        "filters: {}",
        filter_summary(config).unwrap_or_else(|| "none".to_string())
    );
}

pub fn print_status(status: &StatusView) {
    let palette = Palette::auto();
    println!("{}", palette.heading("Store"));
    println!(
        "mode={} memos={} folders={} current={}",
        status.storage_mode.as_str(),
        status.memo_count,
        status.folder_count,
        status.current_folder.as_deref().unwrap_or("-")
    );
    println!(
        "{}",
        palette.dim(&format!(
            "chunk ceiling {} bytes, store limit {} bytes",
            status.chunk_ceiling_bytes, status.store_limit_bytes
        ))
    );
    println!(
        "{}",
        palette.dim(&format!("documents: {}", status.documents.join(", ")))
    );
    if !status.skipped_chunks.is_empty() {
        println!(
            "{}",
            palette.warn(&format!(
                "skipped chunks: {}",
                status.skipped_chunks.join(", ")
            ))
        );
    }
    if !status.load_repairs.is_noop() {
        println!(
            "{}",
            palette.warn("stored data was repaired on load; run with --json for details")
        );
    }
}

pub fn format_import_summary(summary: &ImportSummary) -> String {
    let mut line = format!(
        "import {} processed={} inserted={} overwritten={} reassigned={} skipped={} dropped={}",
        summary.status,
        summary.processed_count,
        summary.inserted_count,
        summary.overwritten_count,
        summary.reassigned_count,
        summary.skipped_count,
        summary.dropped_count
    );
    if let Some(policy) = summary.policy {
        line.push_str(&format!(" collisions={}:{}", summary.collision_count, policy.as_str()));
    }
    if let Some(error) = summary.last_error.as_deref() {
        line.push_str(&format!(" last_error=\"{error}\""));
    }
    line
}

struct Palette {
    enabled: bool,
}

impl Palette {
    fn auto() -> Self {
        let enabled = std::env::var_os("NO_COLOR").is_none() && io::stdout().is_terminal();
        Self { enabled }
    }

    fn paint(&self, code: &str, text: &str) -> String {
        if self.enabled {
            format!("\x1b[{code}m{text}\x1b[0m")
        } else {
            text.to_string()
        }
    }

    fn heading(&self, text: &str) -> String {
        self.paint("1;36", text)
    }

    fn dim(&self, text: &str) -> String {
        self.paint("2", text)
    }

    fn id(&self, text: &str) -> String {
        self.paint("1;94", text)
    }

    fn folder(&self, text: &str) -> String {
        self.paint("35", text)
    }

    fn warn(&self, text: &str) -> String {
        self.paint("33", text)
    }

    fn check(&self, completed: bool) -> String {
        if completed {
            self.paint("32", "[x]")
        } else {
            "[ ]".to_string()
        }
    }

    fn priority(&self, level: &str) -> String {
        self.paint(priority_color_code(level), &format!("({level})"))
    }
}

fn priority_color_code(level: &str) -> &'static str {
    match level {
        "high" => "31",
        "medium" => "33",
        "low" => "34",
        _ => "37",
    }
}
