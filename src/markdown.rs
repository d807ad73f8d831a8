//! Minimal Markdown to terminal text rendering.
//!
//! Headings, emphasis, inline code, lists, code blocks and rules are
//! honored. With colors off, styling falls back to plain-text cues
//! (underlined headings, bullets) and the Markdown markers are dropped.

use pulldown_cmark::{Event, HeadingLevel, Parser, Tag, TagEnd};

const BOLD: &str = "\x1b[1m";
const NORMAL_INTENSITY: &str = "\x1b[22m";
const ITALIC: &str = "\x1b[3m";
const NO_ITALIC: &str = "\x1b[23m";
const CYAN: &str = "\x1b[36m";
const DIM: &str = "\x1b[2m";
const DEFAULT_FG: &str = "\x1b[39m";
const HEADING: &str = "\x1b[1;4m";
const RESET: &str = "\x1b[0m";

/// Render `markdown` for a terminal, with ANSI styles when `use_color` is set.
pub fn render(markdown: &str, use_color: bool) -> String {
    let mut state = RenderState {
        out: String::new(),
        use_color,
        heading: None,
        lists: Vec::new(),
        in_code_block: false,
    };
    for event in Parser::new(markdown) {
        state.handle(event);
    }
    let mut rendered = state.out.trim_end().to_string();
    rendered.push('\n');
    rendered
}

struct RenderState {
    out: String,
    use_color: bool,
    /// Text of the heading being collected, if inside one.
    heading: Option<String>,
    /// Next number for ordered lists, `None` for bullets.
    lists: Vec<Option<u64>>,
    in_code_block: bool,
}

impl RenderState {
    fn handle(&mut self, event: Event<'_>) {
        match event {
            Event::Start(tag) => self.start(tag),
            Event::End(tag) => self.end(tag),
            Event::Text(text) => {
                if self.in_code_block {
                    self.code_text(&text);
                } else {
                    self.push(&text);
                }
            }
            Event::Code(code) => {
                self.style(CYAN);
                self.push(&code);
                self.style(DEFAULT_FG);
            }
            Event::SoftBreak | Event::HardBreak => self.push("\n"),
            Event::Rule => {
                self.blank_line();
                self.out.push_str(&"─".repeat(40));
                self.out.push_str("\n\n");
            }
            Event::Html(html) | Event::InlineHtml(html) => self.push(&html),
            Event::TaskListMarker(done) => self.push(if done { "[x] " } else { "[ ] " }),
            _ => {}
        }
    }

    fn start(&mut self, tag: Tag<'_>) {
        match tag {
            Tag::Heading { .. } => {
                self.blank_line();
                self.heading = Some(String::new());
            }
            Tag::Strong => self.style(BOLD),
            Tag::Emphasis => self.style(ITALIC),
            Tag::List(start) => {
                if self.lists.is_empty() {
                    self.blank_line();
                }
                self.lists.push(start);
            }
            Tag::Item => {
                self.line_start();
                let depth = self.lists.len().saturating_sub(1);
                self.out.push_str(&"  ".repeat(depth));
                let marker = match self.lists.last_mut() {
                    Some(Some(n)) => {
                        let marker = format!("{n}. ");
                        *n += 1;
                        marker
                    }
                    _ => "• ".to_string(),
                };
                self.out.push_str(&marker);
            }
            Tag::CodeBlock(_) => {
                self.blank_line();
                self.in_code_block = true;
            }
            _ => {}
        }
    }

    fn end(&mut self, tag: TagEnd) {
        match tag {
            TagEnd::Heading(level) => {
                let text = self.heading.take().unwrap_or_default();
                self.heading_line(&text, level);
            }
            TagEnd::Strong => self.style(NORMAL_INTENSITY),
            TagEnd::Emphasis => self.style(NO_ITALIC),
            TagEnd::Paragraph => {
                if self.lists.is_empty() {
                    self.out.push_str("\n\n");
                } else {
                    self.line_start();
                }
            }
            TagEnd::Item => self.line_start(),
            TagEnd::List(_) => {
                self.lists.pop();
                if self.lists.is_empty() {
                    self.out.push('\n');
                }
            }
            TagEnd::CodeBlock => {
                self.in_code_block = false;
                self.out.push('\n');
            }
            _ => {}
        }
    }

    fn heading_line(&mut self, text: &str, level: HeadingLevel) {
        if self.use_color {
            self.out.push_str(HEADING);
            self.out.push_str(text);
            self.out.push_str(RESET);
            self.out.push('\n');
        } else {
            let rule = if matches!(level, HeadingLevel::H1 | HeadingLevel::H2) {
                "="
            } else {
                "-"
            };
            self.out.push_str(text);
            self.out.push('\n');
            self.out.push_str(&rule.repeat(text.chars().count()));
            self.out.push('\n');
        }
        self.out.push('\n');
    }

    fn code_text(&mut self, text: &str) {
        for line in text.lines() {
            self.out.push_str("    ");
            if self.use_color {
                self.out.push_str(DIM);
                self.out.push_str(line);
                self.out.push_str(RESET);
            } else {
                self.out.push_str(line);
            }
            self.out.push('\n');
        }
    }

    fn push(&mut self, text: &str) {
        match self.heading.as_mut() {
            Some(heading) => heading.push_str(text),
            None => self.out.push_str(text),
        }
    }

    fn style(&mut self, code: &str) {
        if self.use_color {
            self.push(code);
        }
    }

    fn line_start(&mut self) {
        if !self.out.is_empty() && !self.out.ends_with('\n') {
            self.out.push('\n');
        }
    }

    fn blank_line(&mut self) {
        if self.out.is_empty() || self.out.ends_with("\n\n") {
            return;
        }
        self.line_start();
        self.out.push('\n');
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_heading_and_bold() {
        let rendered = render("### Score\nGlobal score of risks: **HIGH**", false);
        assert_eq!(rendered, "Score\n-----\n\nGlobal score of risks: HIGH\n");
    }

    #[test]
    fn top_level_heading_uses_double_rule() {
        let rendered = render("# Audit", false);
        assert_eq!(rendered, "Audit\n=====\n");
    }

    #[test]
    fn colored_heading_and_bold() {
        let rendered = render("## Summary\n\nThis is **bad**.", true);
        assert!(rendered.contains(&format!("{HEADING}Summary{RESET}")));
        assert!(rendered.contains(&format!("{BOLD}bad{NORMAL_INTENSITY}")));
        assert!(!rendered.contains("**"));
        assert!(!rendered.contains("##"));
    }

    #[test]
    fn bullets_and_numbers() {
        let rendered = render("- one\n- two\n\n1. first\n2. second", false);
        assert!(rendered.contains("• one\n• two"));
        assert!(rendered.contains("1. first\n2. second"));
    }

    #[test]
    fn nested_list_is_indented() {
        let rendered = render("- outer\n  - inner", false);
        assert!(rendered.contains("• outer\n  • inner"));
    }

    #[test]
    fn code_block_is_indented() {
        let rendered = render("```rust\nlet x = 1;\n```", false);
        assert_eq!(rendered, "    let x = 1;\n");
    }

    #[test]
    fn inline_code_without_color_is_bare() {
        assert_eq!(render("call `unwrap()` less", false), "call unwrap() less\n");
    }

    #[test]
    fn plain_text_passes_through() {
        assert_eq!(render("Fix typo in README", false), "Fix typo in README\n");
    }
}
