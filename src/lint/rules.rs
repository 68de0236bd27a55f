// SPDX-FileCopyrightText: 2024 Ohin "Kazani" Taylor <kazani@kazani.dev>
// SPDX-License-Identifier: MIT

use std::fmt::Debug;

use dyn_clone::DynClone;
use fancy_regex::Regex;
use lazy_static::lazy_static;
use syntect::parsing::SyntaxSet;

use super::{
    lex::{Token, TokenKind},
    Severity, Violation,
};

/// One style check. Rules see every token in document order and push any
/// findings; they hold no per-document state.
pub trait Rule: DynClone + Debug {
    fn id(&self) -> &'static str;
    fn check(&self, token: &Token, found: &mut Vec<Violation>);
}

dyn_clone::clone_trait_object!(Rule);

lazy_static! {
    static ref SYNTAXES: SyntaxSet = SyntaxSet::load_defaults_newlines();
    static ref INLINE_IMAGE_REGEX: Regex = Regex::new(r"!\[[^\]]*\]\([^)]*\)").unwrap();
    static ref FOOTNOTE_REFERENCE_REGEX: Regex = Regex::new(r"\[\^[^\]\s]+\](?!:)").unwrap();
    static ref REFERENCE_LINK_REGEX: Regex = Regex::new(r"!?\[[^\]]+\]\[[^\]]*\]").unwrap();
}

/// Fence labels that are fine to use even though syntect ships no grammar for them.
const LANGUAGE_ALIASES: [&str; 11] = [
    "text",
    "plaintext",
    "console",
    "shell",
    "terminal",
    "toml",
    "typescript",
    "ts",
    "tsx",
    "dockerfile",
    "mermaid",
];

/// Blanks out `code spans` so their contents are not mistaken for markup.
/// Byte offsets are preserved.
fn mask_code_spans(text: &str) -> String {
    let mut masked = String::with_capacity(text.len());
    let mut in_code = false;

    for ch in text.chars() {
        if ch == '`' {
            in_code = !in_code;
        }

        if in_code || ch == '`' {
            masked.extend(std::iter::repeat(' ').take(ch.len_utf8()));
        } else {
            masked.push(ch);
        }
    }

    masked
}

/// Byte ranges of every match of `regex` in `text`.
fn find_all(regex: &Regex, text: &str) -> Vec<(usize, usize)> {
    regex
        .find_iter(text)
        .filter_map(|found| found.ok())
        .map(|found| (found.start(), found.end()))
        .collect()
}

fn violation(
    rule: &'static str,
    severity: Severity,
    token: &Token,
    text_offset: Option<(&str, usize)>,
    message: String,
) -> Violation {
    let location = match text_offset {
        Some((text, offset)) => token.location.shifted(text[..offset].chars().count()),
        None => token.location,
    };

    Violation {
        rule,
        severity,
        location,
        message,
    }
}

#[derive(Clone, Debug)]
pub struct HeadingDepth {
    pub max: u8,
}

impl Rule for HeadingDepth {
    fn id(&self) -> &'static str {
        "heading-depth"
    }

    fn check(&self, token: &Token, found: &mut Vec<Violation>) {
        if let TokenKind::Heading { level, .. } = token.kind {
            if level > self.max {
                found.push(violation(
                    self.id(),
                    Severity::Error,
                    token,
                    None,
                    format!("H{} heading; headings stop at H{}", level, self.max),
                ));
            }
        }
    }
}

#[derive(Clone, Debug)]
pub struct ListNesting {
    pub max_depth: usize,
}

impl Rule for ListNesting {
    fn id(&self) -> &'static str {
        "list-nesting"
    }

    fn check(&self, token: &Token, found: &mut Vec<Violation>) {
        if let TokenKind::ListItem { depth, .. } = token.kind {
            if depth > self.max_depth {
                found.push(violation(
                    self.id(),
                    Severity::Error,
                    token,
                    None,
                    format!(
                        "list item nested {} levels deep; at most {} allowed",
                        depth, self.max_depth
                    ),
                ));
            }
        }
    }
}

#[derive(Clone, Debug)]
pub struct Tables {
    pub severity: Severity,
}

impl Rule for Tables {
    fn id(&self) -> &'static str {
        "table"
    }

    fn check(&self, token: &Token, found: &mut Vec<Violation>) {
        if let TokenKind::TableRow { first: true, .. } = token.kind {
            found.push(violation(
                self.id(),
                self.severity,
                token,
                None,
                "table found; prefer a list or an image of the data".into(),
            ));
        }
    }
}

/// Images must stand on their own line, not inside running text.
#[derive(Clone, Debug)]
pub struct InlineImage;

impl Rule for InlineImage {
    fn id(&self) -> &'static str {
        "inline-image"
    }

    fn check(&self, token: &Token, found: &mut Vec<Violation>) {
        let text = match token.text() {
            Some(text) => mask_code_spans(text),
            None => return,
        };

        let images = find_all(&INLINE_IMAGE_REGEX, &text);
        let first = match images.first() {
            Some(&(start, _)) => start,
            None => return,
        };

        let mut rest = text.clone();
        for &(start, end) in images.iter().rev() {
            rest.replace_range(start..end, "");
        }

        if !rest.trim().is_empty() {
            found.push(violation(
                self.id(),
                Severity::Error,
                token,
                Some((&text, first)),
                "image sits inside paragraph text; give it its own line".into(),
            ));
        }
    }
}

#[derive(Clone, Debug)]
pub struct ImageCaption;

impl Rule for ImageCaption {
    fn id(&self) -> &'static str {
        "image-caption"
    }

    fn check(&self, token: &Token, found: &mut Vec<Violation>) {
        if let TokenKind::Image { alt, src } = &token.kind {
            if alt.trim().is_empty() {
                found.push(violation(
                    self.id(),
                    Severity::Warning,
                    token,
                    None,
                    format!("image `{}` has no caption", src),
                ));
            }
        }
    }
}

/// Footnotes and reference-style links; every link goes inline.
#[derive(Clone, Debug)]
pub struct Footnotes;

impl Rule for Footnotes {
    fn id(&self) -> &'static str {
        "footnote"
    }

    fn check(&self, token: &Token, found: &mut Vec<Violation>) {
        match &token.kind {
            TokenKind::FootnoteDefinition { label } => found.push(violation(
                self.id(),
                Severity::Error,
                token,
                None,
                format!("footnote definition `[^{}]`", label),
            )),
            TokenKind::LinkDefinition { label } => found.push(violation(
                self.id(),
                Severity::Error,
                token,
                None,
                format!("link reference definition `[{}]`", label),
            )),
            _ => {
                let text = match token.text() {
                    Some(text) => mask_code_spans(text),
                    None => return,
                };

                let mut references: Vec<(usize, usize, &str)> = find_all(&FOOTNOTE_REFERENCE_REGEX, &text)
                    .into_iter()
                    .map(|(start, end)| (start, end, "footnote reference"))
                    .chain(
                        find_all(&REFERENCE_LINK_REGEX, &text)
                            .into_iter()
                            .map(|(start, end)| (start, end, "reference-style link")),
                    )
                    .collect();
                references.sort();

                for (start, end, what) in references {
                    found.push(violation(
                        self.id(),
                        Severity::Error,
                        token,
                        Some((&text, start)),
                        format!("{} `{}`; link inline instead", what, text[start..end].trim()),
                    ));
                }
            }
        }
    }
}

#[derive(Clone, Debug)]
pub struct CodeFence {
    pub require_language: bool,
    pub extra_languages: Vec<String>,
}

impl CodeFence {
    fn knows(&self, language: &str) -> bool {
        let language = language.to_ascii_lowercase();

        LANGUAGE_ALIASES.contains(&language.as_str())
            || self.extra_languages.iter().any(|extra| extra.eq_ignore_ascii_case(&language))
            || SYNTAXES.find_syntax_by_token(&language).is_some()
    }
}

impl Rule for CodeFence {
    fn id(&self) -> &'static str {
        "code-fence-language"
    }

    fn check(&self, token: &Token, found: &mut Vec<Violation>) {
        let (severity, message) = match &token.kind {
            TokenKind::UnclosedFence => (Severity::Error, "code block is never closed".to_owned()),
            TokenKind::Fence { info: None } if self.require_language => {
                (Severity::Warning, "code block has no language".to_owned())
            }
            TokenKind::Fence { info: Some(language) } if !self.knows(language) => (
                Severity::Warning,
                format!("unknown code block language `{}`", language),
            ),
            _ => return,
        };

        found.push(violation(self.id(), severity, token, None, message));
    }
}

#[cfg(test)]
mod test {
    use super::{mask_code_spans, CodeFence, Footnotes, InlineImage, Rule};
    use crate::lint::{lex::Lexer, Violation};

    fn run(rule: &dyn Rule, text: &str) -> Vec<Violation> {
        let mut found = vec![];
        for token in Lexer::new(text) {
            rule.check(&token, &mut found);
        }
        found
    }

    #[test]
    fn masking_keeps_offsets() {
        let masked = mask_code_spans("see `[^1]` here");
        assert_eq!(masked.len(), "see `[^1]` here".len());
        assert!(!masked.contains("[^1]"));
    }

    #[test]
    fn inline_image_location() {
        let found = run(&InlineImage, "As shown ![graph](g.png) above.");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].location.column, 10);

        assert!(run(&InlineImage, "- ![graph](g.png)").is_empty());
    }

    #[test]
    fn footnote_forms() {
        let found = run(
            &Footnotes,
            "Bundler pins versions[^lock] per the [docs][bundler].\n\n[^lock]: Gemfile.lock\n[bundler]: https://bundler.io",
        );

        let messages: Vec<_> = found.iter().map(|v| v.message.as_str()).collect();
        assert_eq!(found.len(), 4, "{:?}", messages);
        assert!(messages[0].starts_with("footnote reference"));
        assert!(messages[1].starts_with("reference-style link"));
    }

    #[test]
    fn code_in_backticks_is_ignored() {
        assert!(run(&Footnotes, "Write `[^1]` for a footnote.").is_empty());
    }

    #[test]
    fn fence_languages() {
        let rule = CodeFence {
            require_language: true,
            extra_languages: vec!["hcl".into()],
        };

        assert!(run(&rule, "```ruby\nputs 1\n```").is_empty());
        assert!(run(&rule, "```hcl\nx = 1\n```").is_empty());
        assert!(run(&rule, "```typescript\nlet x = 1\n```").is_empty());
        assert_eq!(run(&rule, "```\nplain\n```").len(), 1);
        assert_eq!(run(&rule, "```klingon\nplain\n```").len(), 1);
    }
}
