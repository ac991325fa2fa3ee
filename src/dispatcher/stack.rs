use std::backtrace::{Backtrace, BacktraceStatus};

const CRATE_PREFIX: &str = env!("CARGO_CRATE_NAME");

/// Captures a backtrace for a synthesized error, with the capture machinery
/// and the dispatcher's own frames removed so it starts at the caller.
///
/// Returns `None` when backtraces are disabled (`RUST_BACKTRACE` unset).
pub(crate) fn caller_stack() -> Option<String> {
    let backtrace = Backtrace::capture();
    if backtrace.status() != BacktraceStatus::Captured {
        return None;
    }
    let trimmed = trim_internal_frames(&backtrace.to_string());
    (!trimmed.is_empty()).then_some(trimmed)
}

/// Drops the leading run of frames that belong to `std::backtrace` or to this
/// crate's dispatch path. Frame headers look like `  12: some::symbol`; the
/// indented `at file:line` lines that follow stay with their frame.
pub(crate) fn trim_internal_frames(raw: &str) -> String {
    let mut frames: Vec<Vec<&str>> = Vec::new();
    for line in raw.lines() {
        if is_frame_header(line) || frames.is_empty() {
            frames.push(vec![line]);
        } else if let Some(frame) = frames.last_mut() {
            frame.push(line);
        }
    }

    frames
        .into_iter()
        .skip_while(|frame| frame.first().is_some_and(|header| is_internal(header)))
        .flatten()
        .collect::<Vec<_>>()
        .join("\n")
}

fn is_frame_header(line: &str) -> bool {
    let trimmed = line.trim_start();
    let digits = trimmed.chars().take_while(char::is_ascii_digit).count();
    digits > 0 && trimmed[digits..].starts_with(':')
}

fn symbol(header: &str) -> &str {
    header
        .trim_start()
        .split_once(':')
        .map_or("", |(_, rest)| rest.trim())
        .trim_start_matches('<')
}

fn is_internal(header: &str) -> bool {
    let symbol = symbol(header);
    symbol.starts_with("std::backtrace")
        || symbol.starts_with("std::backtrace_rs")
        || symbol.starts_with(&format!("{CRATE_PREFIX}::dispatcher"))
        || symbol.starts_with(&format!("{CRATE_PREFIX}::domain"))
}
