//! Terminal input mapped onto controller commands.

use client_core::FetchCommand;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiAction {
    Command(FetchCommand),
    Help,
    Quit,
    Unknown(String),
}

pub fn parse_input(line: &str) -> UiAction {
    let line = line.trim();
    let (verb, rest) = match line.split_once(char::is_whitespace) {
        Some((verb, rest)) => (verb, rest.trim()),
        None => (line, ""),
    };

    if let Some(query) = line.strip_prefix('/') {
        return search_or_page(query.trim());
    }

    match verb.to_ascii_lowercase().as_str() {
        "" | "m" | "more" | "next" => UiAction::Command(FetchCommand::LoadMore),
        "s" | "search" => search_or_page(rest),
        "h" | "help" | "?" => UiAction::Help,
        "q" | "quit" | "exit" => UiAction::Quit,
        _ => UiAction::Unknown(line.to_string()),
    }
}

// a cleared search box goes back to paging
fn search_or_page(query: &str) -> UiAction {
    if query.is_empty() {
        UiAction::Command(FetchCommand::LoadMore)
    } else {
        UiAction::Command(FetchCommand::Search(query.to_string()))
    }
}
