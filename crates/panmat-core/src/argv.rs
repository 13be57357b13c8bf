//! Command-line tokenizer for the engine main entry point.

/// Tokens of a command line, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandArgv {
    tokens: Vec<String>,
}

/// Split `command` on runs of spaces and tabs.
///
/// Leading and trailing blanks are ignored. An empty or all-blank command
/// yields a single empty token.
pub fn tokenize(command: &str) -> CommandArgv {
    let mut tokens: Vec<String> = command
        .split([' ', '\t'])
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect();
    if tokens.is_empty() {
        tokens.push(String::new());
    }
    CommandArgv { tokens }
}

impl CommandArgv {
    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.tokens.iter().map(String::as_str)
    }

    pub fn into_vec(self) -> Vec<String> {
        self.tokens
    }

    /// Argument vector for the engine main: slot 0 is the (empty) program
    /// name, followed by the non-empty tokens.
    pub fn engine_argv(&self) -> Vec<String> {
        std::iter::once(String::new())
            .chain(self.tokens.iter().filter(|t| !t.is_empty()).cloned())
            .collect()
    }
}
