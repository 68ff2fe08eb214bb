use std::sync::Arc;

use regex::Regex;

use crate::item::CleanedPost;

/// Character that starts a short-form command line.
pub const SHORT_FORM_TRIGGER: char = '!';

const SHORT_FORM_PATTERN: &str = r"^!(\S{3,})(?:\s+(.*))?$";

/// A command line recognized in a post.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedCommand {
    /// The line in short form, e.g. `!roll 2d6`, whichever shape it was written in.
    pub input: String,
    /// Lowercased command word.
    pub command: String,
    pub args: Vec<String>,
    /// The `@name` prefix for mention commands.
    pub mention: Option<String>,
    pub post: Arc<CleanedPost>,
}

/// Extracts commands from the cleaned text of a post, one per line at most.
///
/// Short form: `!word args...` with a command word of at least 3 characters.
/// Mention form: `@botname word args...`, matched case-insensitively, with a
/// command word of at least 2 characters. A command word is any run of
/// non-whitespace. Without a bot name only the short form is recognized.
#[derive(Debug, Clone)]
pub struct CommandParser {
    short_form: Regex,
    mention_form: Option<Regex>,
}

struct CommandLine<'a> {
    word: &'a str,
    rest: &'a str,
    mention: Option<&'a str>,
}

impl CommandParser {
    pub fn new(bot_name: &str) -> Result<Self, regex::Error> {
        let bot_name = bot_name.trim();
        let mention_form = if bot_name.is_empty() {
            None
        } else {
            let pattern = format!(
                r"(?i)^(@{})\s+(\S{{2,}})(?:\s+(.*))?$",
                regex::escape(bot_name)
            );
            Some(Regex::new(&pattern)?)
        };
        Ok(Self {
            short_form: Regex::new(SHORT_FORM_PATTERN)?,
            mention_form,
        })
    }

    /// Parses every line of `post.cleaned` in order.
    pub fn parse(&self, post: Arc<CleanedPost>) -> Vec<ParsedCommand> {
        post.cleaned
            .lines()
            .filter_map(|line| self.match_line(line))
            .map(|line| build_command(line, &post))
            .collect()
    }

    fn match_line<'a>(&self, line: &'a str) -> Option<CommandLine<'a>> {
        let line = line.trim();
        if line.starts_with(SHORT_FORM_TRIGGER) {
            let caps = self.short_form.captures(line)?;
            return Some(CommandLine {
                word: caps.get(1)?.as_str(),
                rest: caps.get(2).map_or("", |m| m.as_str()),
                mention: None,
            });
        }
        let caps = self.mention_form.as_ref()?.captures(line)?;
        Some(CommandLine {
            word: caps.get(2)?.as_str(),
            rest: caps.get(3).map_or("", |m| m.as_str()),
            mention: Some(caps.get(1)?.as_str()),
        })
    }
}

fn build_command(line: CommandLine<'_>, post: &Arc<CleanedPost>) -> ParsedCommand {
    let rest = line.rest.trim();
    let input = if rest.is_empty() {
        format!("{SHORT_FORM_TRIGGER}{}", line.word)
    } else {
        format!("{SHORT_FORM_TRIGGER}{} {rest}", line.word)
    };
    ParsedCommand {
        input,
        command: line.word.to_lowercase(),
        args: rest.split_whitespace().map(str::to_string).collect(),
        mention: line.mention.map(str::to_string),
        post: Arc::clone(post),
    }
}
