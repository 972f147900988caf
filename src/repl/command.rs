//! Command-line parsing for the interactive loop.

/// A parsed user command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `list`, `ls`, `1`
    List,
    /// `current`, `status`, `2`
    Current,
    /// `switch [algorithm]`, `3`
    Switch(Option<String>),
    /// `ask <question>`, `4`
    Ask(Option<String>),
    /// `see`, `look`, `5`
    See,
    /// `photo`, `snap`, `6`
    Photo,
    /// `exit`, `quit`, `7`
    Exit,
    /// `help`, `h`, `?`, `0`
    Help,
    Unknown(String),
}

impl Command {
    /// Parse one input line. Blank lines yield `None`.
    ///
    /// The command word is case-insensitive; the remainder of the line is
    /// passed through trimmed.
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((w, r)) => (w, Some(r.trim()).filter(|r| !r.is_empty())),
            None => (line, None),
        };
        let arg = rest.map(ToString::to_string);

        Some(match word.to_lowercase().as_str() {
            "list" | "ls" | "1" => Self::List,
            "current" | "status" | "2" => Self::Current,
            "switch" | "3" => Self::Switch(arg),
            "ask" | "4" => Self::Ask(arg),
            "see" | "look" | "5" => Self::See,
            "photo" | "snap" | "6" => Self::Photo,
            "exit" | "quit" | "7" => Self::Exit,
            "help" | "h" | "?" | "0" => Self::Help,
            _ => Self::Unknown(word.to_string()),
        })
    }
}
