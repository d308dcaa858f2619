//! The localized-text collaborator.

use std::collections::HashMap;

/// Looks up a text template by language and key.
pub trait TextSource: Send + Sync + 'static {
    fn template(&self, lang: &str, key: &str) -> Option<String>;
}

/// Substitutes `{}` (sequential) and `{N}` (indexed) placeholders.
///
/// Placeholders without a matching argument are left untouched; `{{` and `}}`
/// escape braces.
pub fn format_text(template: &str, args: &[&str]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut next = 0;
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                out.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                out.push('}');
            }
            '{' => {
                let mut inner = String::new();
                let mut closed = false;
                for c in chars.by_ref() {
                    if c == '}' {
                        closed = true;
                        break;
                    }
                    inner.push(c);
                }
                let index = if inner.is_empty() {
                    next += 1;
                    Some(next - 1)
                } else {
                    inner.parse::<usize>().ok()
                };
                match index.and_then(|i| args.get(i)) {
                    Some(arg) if closed => out.push_str(arg),
                    _ => {
                        out.push('{');
                        out.push_str(&inner);
                        if closed {
                            out.push('}');
                        }
                    }
                }
            }
            c => out.push(c),
        }
    }
    out
}

/// A [`TextSource`] backed by nested maps: `lang → key → template`.
#[derive(Debug, Clone, Default)]
pub struct MapTextSource {
    languages: HashMap<String, HashMap<String, String>>,
}

impl MapTextSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces one template.
    pub fn insert(
        mut self,
        lang: impl Into<String>,
        key: impl Into<String>,
        template: impl Into<String>,
    ) -> Self {
        self.languages
            .entry(lang.into())
            .or_default()
            .insert(key.into(), template.into());
        self
    }
}

impl TextSource for MapTextSource {
    fn template(&self, lang: &str, key: &str) -> Option<String> {
        self.languages.get(lang)?.get(key).cloned()
    }
}
