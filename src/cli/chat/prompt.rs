use std::path::PathBuf;

use rustyline::{Config, Editor, Result};

pub const HISTORY_FILE: &str = ".data_chat_history";

pub fn generate_prompt(dataset_name: Option<&str>) -> String {
    match dataset_name {
        Some(name) => format!("{}> ", name),
        None => "> ".to_string(),
    }
}

pub fn rl() -> Result<Editor<()>> {
    let config = Config::builder()
        .history_ignore_space(true)
        .completion_type(rustyline::CompletionType::List)
        .build();
    Editor::with_config(config)
}

/// Where line-editor history is persisted, if a home directory exists.
pub fn history_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(HISTORY_FILE))
}
