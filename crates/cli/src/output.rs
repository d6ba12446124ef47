//! Terminal rendering shared by the command handlers.

use duckrow_git::CloneError;

pub fn print_warnings(warnings: &[String]) {
    for w in warnings {
        eprintln!("warning: {w}");
    }
}

/// Print the failed git command and what to try next.
pub fn print_clone_error(err: &CloneError) {
    eprintln!("error: {}", err.kind);
    eprintln!("  command: {}", err.command);
    if let Some(line) = err.raw_output.lines().rev().find(|l| !l.trim().is_empty()) {
        eprintln!("  git said: {}", line.trim());
    }
    for hint in &err.hints {
        eprintln!("  hint: {hint}");
    }
}

/// Convert a skills error into a report, printing git hints first.
pub fn skill_error(err: duckrow_skills::Error) -> anyhow::Error {
    if let Some(clone) = err.as_clone_error() {
        print_clone_error(clone);
    }
    err.into()
}

pub fn registry_error(err: duckrow_registry::Error) -> anyhow::Error {
    if let Some(clone) = err.as_clone_error() {
        print_clone_error(clone);
    }
    err.into()
}

/// Left-aligned columns, widths taken from the widest cell.
pub fn table(header: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = header.iter().map(|h| h.len()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            if let Some(w) = widths.get_mut(i) {
                *w = (*w).max(cell.len());
            }
        }
    }
    let render = |cells: Vec<&str>| {
        let line: Vec<String> = cells
            .iter()
            .zip(&widths)
            .map(|(c, w)| format!("{c:<w$}"))
            .collect();
        line.join("  ").trim_end().to_string()
    };
    let mut out = render(header.to_vec());
    for row in rows {
        out.push('\n');
        out.push_str(&render(row.iter().map(String::as_str).collect()));
    }
    out
}

pub fn short_commit(commit: &str) -> &str {
    commit.get(..7).unwrap_or(commit)
}
