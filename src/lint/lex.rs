// SPDX-FileCopyrightText: 2024 Ohin "Kazani" Taylor <kazani@kazani.dev>
// SPDX-License-Identifier: MIT

use fancy_regex::{Captures, Match, Regex};
use lazy_static::lazy_static;

/// 1-based position in the article body.
#[derive(Debug, Eq, PartialEq, Clone, Copy, PartialOrd, Ord)]
pub struct Location {
    pub line: u32,
    pub column: u32,
}

impl Location {
    pub fn shifted(&self, columns: usize) -> Self {
        Self {
            line: self.line,
            column: self.column + columns as u32,
        }
    }
}

#[derive(Debug, Eq, PartialEq, Clone)]
pub enum TokenKind {
    /// Dropped before tokens leave the lexer.
    EmptyLine,

    /// Any text that was not part of another block
    Paragraph {
        content: String,
    },

    /// `#`-style heading; `level` is the number of hashes.
    Heading {
        level: u8,
        title: String,
    },

    /// `- item`, `* item`, `1. item`. `depth` starts at 1 for a top level item.
    ListItem {
        depth: usize,
        content: String,
    },

    /// | cell | cell | cell |
    /// `first` is set on the opening row of each table.
    TableRow {
        cells: Vec<String>,
        first: bool,
    },

    /// An image standing alone on its line.
    Image {
        alt: String,
        src: String,
    },

    /// `---`, `***` or `___`
    ThematicBreak,

    /// Opening line of a fenced code block. The block's contents produce no tokens.
    Fence {
        info: Option<String>,
    },

    /// A fence still open at the end of the document, located at its opening line.
    UnclosedFence,

    /// [^label]: text
    FootnoteDefinition {
        label: String,
    },

    /// [label]: https://...
    LinkDefinition {
        label: String,
    },
}

#[derive(Debug, Eq, PartialEq, Clone)]
pub struct Token {
    pub kind: TokenKind,
    pub location: Location,
}

impl Token {
    /// Inline text carried by the token, for rules that look inside lines.
    /// `location` points at its first character.
    pub fn text(&self) -> Option<&str> {
        match &self.kind {
            TokenKind::Paragraph { content } | TokenKind::ListItem { content, .. } => Some(content),
            TokenKind::Heading { title, .. } => Some(title),
            _ => None,
        }
    }
}

fn match_to_str(match_: Match) -> String {
    match_.as_str().trim().into()
}

/// fancy-regex reports backtracking blowups as errors; a line that trips one
/// is treated as not matching.
fn captures<'t>(regex: &Regex, line: &'t str) -> Option<Captures<'t>> {
    regex.captures(line).ok().flatten()
}

fn is_match(regex: &Regex, line: &str) -> bool {
    regex.is_match(line).unwrap_or(false)
}

/// Leading whitespace as (characters, visual width with tab stops of 4).
fn leading(line: &str) -> (usize, usize) {
    let mut chars = 0;
    let mut width = 0;

    for ch in line.chars() {
        match ch {
            ' ' => width += 1,
            '\t' => width += 4 - width % 4,
            _ => break,
        }
        chars += 1;
    }

    (chars, width)
}

#[derive(Eq, PartialEq, Clone, Debug)]
enum State {
    Default,
    Fence { marker: char, width: usize, opened: Location },
}

lazy_static! {
    static ref HEADING_REGEX: Regex = Regex::new(r"^ {0,3}(?P<hashes>#{1,6})(?:[ \t]+(?P<title>.*?))?(?:[ \t]+#+)?[ \t]*$").unwrap();
    static ref THEMATIC_BREAK_REGEX: Regex = Regex::new(r"^ {0,3}([-*_])(?:[ \t]*\1){2,}[ \t]*$").unwrap();
    static ref FENCE_REGEX: Regex = Regex::new(r"^[ \t]*(?P<fence>`{3,}|~{3,})[ \t]*(?P<info>[^\s`]*)").unwrap();
    static ref FOOTNOTE_DEFINITION_REGEX: Regex = Regex::new(r"^ {0,3}\[\^(?P<label>[^\]\s]+)\]:").unwrap();
    static ref LINK_DEFINITION_REGEX: Regex = Regex::new(r"^ {0,3}\[(?P<label>[^\]\^][^\]]*)\]:[ \t]*\S+").unwrap();
    static ref TABLE_ROW_REGEX: Regex = Regex::new(r"^[ \t]*\|.*\|[ \t]*$").unwrap();
    static ref DELIMITER_ROW_REGEX: Regex = Regex::new(r"^[ \t]*\|?[ \t]*:?-+:?[ \t]*(?:\|[ \t]*:?-+:?[ \t]*)+\|?[ \t]*$").unwrap();
    static ref LIST_ITEM_REGEX: Regex = Regex::new(r"^(?P<indent>[ \t]*)(?P<marker>[-*+]|\d{1,9}[.)])(?:[ \t]+(?P<content>.*))?$").unwrap();
    static ref IMAGE_LINE_REGEX: Regex = Regex::new(r#"^[ \t]*!\[(?P<alt>[^\]]*)\]\((?P<src>[^)\s]+)(?:[ \t]+"[^"]*")?\)[ \t]*$"#).unwrap();
}

/// Splits a markdown body into block tokens, one line at a time.
///
/// The lexer is an iterator and only reads as far as it is asked to; cloning
/// it snapshots its position.
#[derive(Clone, Debug)]
pub struct Lexer<'a> {
    lines: std::str::Lines<'a>,
    line: u32,
    state: State,
    /// Content columns of the open list items, outermost first.
    list_columns: Vec<usize>,
    in_table: bool,
}

impl<'a> Lexer<'a> {
    pub fn new(content: &'a str) -> Self {
        Self {
            lines: content.lines(),
            line: 0,
            state: State::Default,
            list_columns: vec![],
            in_table: false,
        }
    }

    fn wrap(&self, kind: TokenKind, column: usize) -> Option<Token> {
        Some(Token {
            location: Location {
                line: self.line,
                column: column as u32 + 1,
            },
            kind,
        })
    }

    fn handle_line(&mut self, line: &str) -> Option<Token> {
        match &self.state {
            State::Default => self.handle_normal(line),
            State::Fence { marker, width, .. } => {
                let trimmed = line.trim();
                let closes = trimmed.chars().count() >= *width
                    && trimmed.chars().all(|ch| ch == *marker);

                if closes {
                    self.state = State::Default;
                }

                None
            }
        }
    }

    fn handle_normal(&mut self, line: &str) -> Option<Token> {
        let (lead, indent) = leading(line);
        let body = &line[line.len() - line.trim_start().len()..];

        if line.trim().is_empty() {
            return self.wrap(TokenKind::EmptyLine, 0);
        }

        if indent == 0 && !is_match(&LIST_ITEM_REGEX, line) {
            self.list_columns.clear();
        }

        if let Some(caps) = captures(&FENCE_REGEX, line) {
            let fence = caps.name("fence").map(|fence| fence.as_str()).unwrap_or("```");
            let info = caps
                .name("info")
                .map(match_to_str)
                .filter(|info| !info.is_empty());

            self.state = State::Fence {
                marker: fence.chars().next().unwrap_or('`'),
                width: fence.chars().count(),
                opened: Location {
                    line: self.line,
                    column: lead as u32 + 1,
                },
            };

            self.wrap(TokenKind::Fence { info }, lead)
        } else if let Some(caps) = captures(&HEADING_REGEX, line) {
            self.list_columns.clear();

            let level = caps.name("hashes").map_or(1, |hashes| hashes.as_str().len());
            let title = caps.name("title").map(match_to_str).unwrap_or_default();
            let column = caps.name("title").map_or(lead, |title| title.start());

            self.wrap(
                TokenKind::Heading {
                    level: u8::try_from(level).unwrap_or(u8::MAX),
                    title,
                },
                column,
            )
        } else if is_match(&THEMATIC_BREAK_REGEX, line) {
            self.list_columns.clear();
            self.wrap(TokenKind::ThematicBreak, lead)
        } else if let Some(caps) = captures(&FOOTNOTE_DEFINITION_REGEX, line) {
            self.wrap(
                TokenKind::FootnoteDefinition {
                    label: caps.name("label").map(match_to_str).unwrap_or_default(),
                },
                lead,
            )
        } else if let Some(caps) = captures(&LINK_DEFINITION_REGEX, line) {
            self.wrap(
                TokenKind::LinkDefinition {
                    label: caps.name("label").map(match_to_str).unwrap_or_default(),
                },
                lead,
            )
        } else if is_match(&TABLE_ROW_REGEX, line) || is_match(&DELIMITER_ROW_REGEX, line) {
            let cells = body
                .trim()
                .trim_matches('|')
                .split('|')
                .map(|cell| cell.trim().to_owned())
                .collect();

            self.wrap(
                TokenKind::TableRow {
                    cells,
                    first: !self.in_table,
                },
                lead,
            )
        } else if let Some(caps) = captures(&LIST_ITEM_REGEX, line) {
            let content = caps.name("content");
            let column = content.map_or(line.len(), |content| content.start());
            let marker_end = caps.name("marker").map_or(lead, |marker| marker.end());
            let content_column = indent
                + match content {
                    Some(content) => content.start() - lead,
                    None => marker_end - lead + 1,
                };
            let depth = self.list_depth(indent, content_column);

            self.wrap(
                TokenKind::ListItem {
                    depth,
                    content: content.map(match_to_str).unwrap_or_default(),
                },
                column,
            )
        } else if let Some(caps) = captures(&IMAGE_LINE_REGEX, line) {
            self.wrap(
                TokenKind::Image {
                    alt: caps.name("alt").map(match_to_str).unwrap_or_default(),
                    src: caps.name("src").map(match_to_str).unwrap_or_default(),
                },
                lead,
            )
        } else if let Some(quoted) = body.strip_prefix('>') {
            let content = quoted.trim_start();
            let column = line.len() - content.len();

            self.wrap(
                TokenKind::Paragraph {
                    content: content.trim_end().to_owned(),
                },
                column,
            )
        } else {
            self.wrap(
                TokenKind::Paragraph {
                    content: body.trim_end().to_owned(),
                },
                lead,
            )
        }
    }

    /// Nesting level of a list item indented by `indent` columns whose text
    /// starts at `content_column`. An item only nests when it is indented at
    /// least as far as its parent's text.
    fn list_depth(&mut self, indent: usize, content_column: usize) -> usize {
        while let Some(&parent) = self.list_columns.last() {
            if indent < parent {
                self.list_columns.pop();
            } else {
                break;
            }
        }

        self.list_columns.push(content_column);
        self.list_columns.len()
    }

    fn finish(&mut self) -> Option<Token> {
        match std::mem::replace(&mut self.state, State::Default) {
            State::Fence { opened, .. } => Some(Token {
                kind: TokenKind::UnclosedFence,
                location: opened,
            }),
            State::Default => None,
        }
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        loop {
            let line = match self.lines.next() {
                Some(line) => line,
                None => return self.finish(),
            };
            self.line += 1;

            if let Some(token) = self.handle_line(line) {
                self.in_table = matches!(token.kind, TokenKind::TableRow { .. });

                if token.kind != TokenKind::EmptyLine {
                    return Some(token);
                }
            }
        }
    }
}
