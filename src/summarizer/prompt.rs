use std::path::Path;

use anyhow::{Context, Result, bail};

const BUILTIN: &str = include_str!("../../prompts/summarize.txt");
const PLACEHOLDERS: [&str; 3] = ["{title}", "{url}", "{content}"];

#[derive(Clone, Debug)]
pub struct PromptTemplate {
    template: String,
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self { template: BUILTIN.to_string() }
    }
}

impl PromptTemplate {
    /// Template with `{title}`, `{url}` and `{content}` placeholders. `{content}` is required.
    pub fn new(template: impl Into<String>) -> Result<Self> {
        let template = template.into();
        if !template.contains("{content}") {
            bail!("prompt template has no {{content}} placeholder");
        }
        Ok(Self { template })
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("read prompt template {}", path.display()))?;
        Self::new(raw).with_context(|| format!("prompt template {}", path.display()))
    }

    pub fn render(&self, title: &str, url: &str, content: &str) -> String {
        // single pass so placeholder text inside the page is left alone
        let mut out = String::with_capacity(self.template.len() + content.len());
        let mut rest = self.template.as_str();
        while let Some((idx, ph)) = next_placeholder(rest) {
            out.push_str(&rest[..idx]);
            out.push_str(match ph {
                "{title}" => title,
                "{url}" => url,
                _ => content,
            });
            rest = &rest[idx + ph.len()..];
        }
        out.push_str(rest);
        out
    }
}

fn next_placeholder(s: &str) -> Option<(usize, &'static str)> {
    PLACEHOLDERS
        .iter()
        .filter_map(|ph| s.find(ph).map(|idx| (idx, *ph)))
        .min_by_key(|(idx, _)| *idx)
}
