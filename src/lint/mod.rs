// SPDX-FileCopyrightText: 2024 Ohin "Kazani" Taylor <kazani@kazani.dev>
// SPDX-License-Identifier: MIT

//! Style checks for article bodies.
//!
//! Bodies are written in a constrained markdown subset: headings up to H3,
//! flat lists, images on their own line with a caption, and links written
//! inline. [`Linter::lint`] walks a body lazily and yields a [`Violation`]
//! for every departure from that subset.

use std::{collections::VecDeque, fmt};

pub mod lex;
pub mod rules;

use crate::config::{LintConfig, TablePolicy};
use lex::{Lexer, Location};
use rules::Rule;

/// Deepest heading any configuration may allow.
pub const MAX_HEADING: u8 = 3;
/// Deepest heading in strict mode.
pub const MAX_HEADING_STRICT: u8 = 2;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    /// Flagged for the editor; does not block export.
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Warning => f.write_str("warning"),
            Severity::Error => f.write_str("error"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Violation {
    pub rule: &'static str,
    pub severity: Severity,
    pub location: Location,
    pub message: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}: {} [{}] {}",
            self.location.line, self.location.column, self.severity, self.rule, self.message
        )
    }
}

#[derive(Clone, Debug)]
pub struct Linter {
    rules: Vec<Box<dyn Rule>>,
}

impl Default for Linter {
    fn default() -> Self {
        Self::new(&LintConfig::default())
    }
}

impl Linter {
    pub fn new(config: &LintConfig) -> Self {
        let max_heading = if config.strict {
            config.max_heading.min(MAX_HEADING_STRICT)
        } else {
            config.max_heading.min(MAX_HEADING)
        };

        let mut rules: Vec<Box<dyn Rule>> = vec![
            Box::new(rules::HeadingDepth { max: max_heading }),
            Box::new(rules::ListNesting { max_depth: 1 }),
            Box::new(rules::InlineImage),
            Box::new(rules::ImageCaption),
            Box::new(rules::Footnotes),
            Box::new(rules::CodeFence {
                require_language: config.require_fence_language,
                extra_languages: config.extra_languages.clone(),
            }),
        ];

        match config.tables {
            TablePolicy::Allow => (),
            TablePolicy::Warn => rules.push(Box::new(rules::Tables {
                severity: Severity::Warning,
            })),
            TablePolicy::Deny => rules.push(Box::new(rules::Tables {
                severity: Severity::Error,
            })),
        }

        Self { rules }
    }

    pub fn rule_ids(&self) -> Vec<&'static str> {
        self.rules.iter().map(|rule| rule.id()).collect()
    }

    /// Scans `text`. Nothing is read until the returned iterator is polled;
    /// clone it or call `lint` again to start over.
    pub fn lint<'a>(&'a self, text: &'a str) -> Violations<'a> {
        Violations {
            tokens: Lexer::new(text),
            rules: &self.rules,
            pending: VecDeque::new(),
        }
    }

    pub fn has_errors(&self, text: &str) -> bool {
        self.lint(text)
            .any(|violation| violation.severity == Severity::Error)
    }
}

/// Violations of one body, in document order.
#[derive(Clone)]
pub struct Violations<'a> {
    tokens: Lexer<'a>,
    rules: &'a [Box<dyn Rule>],
    pending: VecDeque<Violation>,
}

impl<'a> Iterator for Violations<'a> {
    type Item = Violation;

    fn next(&mut self) -> Option<Violation> {
        loop {
            if let Some(violation) = self.pending.pop_front() {
                return Some(violation);
            }

            let token = self.tokens.next()?;
            let mut found = vec![];
            for rule in self.rules {
                rule.check(&token, &mut found);
            }
            self.pending.extend(found);
        }
    }
}
