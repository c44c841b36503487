//! A dashboard file parsed into text nodes and slot nodes.
//!
//! Only slot payloads are ever changed. Everything else, markup and whitespace included, renders
//! back exactly as it was read.

use crate::error::Res;
use crate::model::Source;
use anyhow::{bail, Context};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// Marks the comment that records when and for which period a file was generated.
pub(crate) const GENERATED_TAG: &str = "suivi:generated";

/// What a slot holds.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum SlotKey {
    /// The total in a section heading, `<h2 data-section="cm">CM (6)</h2>`.
    Heading(Source),
    /// One category count, `<span data-count="cm.RAF">3</span>`.
    Count {
        source: Source,
        category: &'static str,
    },
    /// A chart array in the script, `/* counts:cm */ [3, 1, 2, 0]`.
    Series(Source),
    /// A billing amount; `None` is the grand total.
    Amount(Option<Source>),
    /// The global average duration of a source.
    Dmt(Source),
    /// The reporting period.
    Period,
}

impl Display for SlotKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            SlotKey::Heading(s) => write!(f, "data-section=\"{s}\""),
            SlotKey::Count { source, category } => write!(f, "data-count=\"{source}.{category}\""),
            SlotKey::Series(s) => write!(f, "/* counts:{s} */"),
            SlotKey::Amount(Some(s)) => write!(f, "amount {s}"),
            SlotKey::Amount(None) => write!(f, "amount total"),
            SlotKey::Dmt(s) => write!(f, "dmt {s}"),
            SlotKey::Period => write!(f, "data-period"),
        }
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Slot {
    key: SlotKey,
    payload: String,
}

impl Slot {
    pub fn key(&self) -> SlotKey {
        self.key
    }

    pub fn payload(&self) -> &str {
        &self.payload
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Node {
    Text(String),
    Slot(Slot),
}

/// The two kinds of dashboard file.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Flavor {
    /// The HTML page.
    Display,
    /// The JavaScript file that feeds the charts.
    Script,
}

impl Flavor {
    /// The generation comment line for this kind of file.
    pub(crate) fn generation_comment(&self, body: &str) -> String {
        match self {
            Flavor::Display => format!("<!-- {GENERATED_TAG} {body} -->"),
            Flavor::Script => format!("// {GENERATED_TAG} {body}"),
        }
    }

    fn is_generation_comment(&self, line: &str) -> bool {
        let line = line.trim();
        let prefix = match self {
            Flavor::Display => "<!--",
            Flavor::Script => "//",
        };
        line.strip_prefix(prefix)
            .is_some_and(|rest| rest.trim_start().starts_with(GENERATED_TAG))
    }

    /// Removes a trailing generation comment, if any, so that it is replaced rather than
    /// stacked on every run.
    pub(crate) fn strip_generation_comment<'a>(&self, text: &'a str) -> &'a str {
        let trimmed = text.trim_end();
        let last_line_start = trimmed.rfind('\n').map(|i| i + 1).unwrap_or(0);
        if self.is_generation_comment(&trimmed[last_line_start..]) {
            &trimmed[..last_line_start]
        } else {
            text
        }
    }
}

/// A parsed dashboard file.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Document {
    nodes: Vec<Node>,
}

impl Document {
    pub fn parse(flavor: Flavor, text: &str) -> Res<Self> {
        let mut parser = Parser::new(text);
        match flavor {
            Flavor::Display => parser.display()?,
            Flavor::Script => parser.script()?,
        }
        Ok(Self {
            nodes: parser.finish(),
        })
    }

    pub fn slots(&self) -> impl Iterator<Item = &Slot> {
        self.nodes.iter().filter_map(|n| match n {
            Node::Slot(s) => Some(s),
            Node::Text(_) => None,
        })
    }

    /// The keys in `required` that no slot of this document carries.
    pub fn missing<I>(&self, required: I) -> Vec<SlotKey>
    where
        I: IntoIterator<Item = SlotKey>,
    {
        required
            .into_iter()
            .filter(|key| !self.slots().any(|s| s.key == *key))
            .collect()
    }

    /// Replaces every slot's payload with the value `f` computes for its key. A key that appears
    /// more than once gets the same value everywhere.
    pub fn fill<F>(&mut self, mut f: F)
    where
        F: FnMut(SlotKey) -> String,
    {
        for node in &mut self.nodes {
            if let Node::Slot(slot) = node {
                slot.payload = f(slot.key);
            }
        }
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        for node in &self.nodes {
            match node {
                Node::Text(t) => out.push_str(t),
                Node::Slot(s) => out.push_str(&s.payload),
            }
        }
        out
    }
}

const DISPLAY_ATTRIBUTES: [&str; 5] = [
    "data-section",
    "data-count",
    "data-amount",
    "data-dmt",
    "data-period",
];

const SCRIPT_KINDS: [&str; 3] = ["counts", "amount", "dmt"];

struct Parser<'a> {
    text: &'a str,
    nodes: Vec<Node>,
    /// Start of the text not yet pushed as a node.
    pending: usize,
    cursor: usize,
}

impl<'a> Parser<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            text,
            nodes: Vec::new(),
            pending: 0,
            cursor: 0,
        }
    }

    fn finish(mut self) -> Vec<Node> {
        if self.pending < self.text.len() {
            self.nodes
                .push(Node::Text(self.text[self.pending..].to_string()));
        }
        self.nodes
    }

    fn line(&self, at: usize) -> usize {
        self.text[..at].matches('\n').count() + 1
    }

    /// Pushes the text before the payload, then the slot. Whitespace around the payload stays in
    /// the text nodes.
    fn push_slot(&mut self, key: SlotKey, start: usize, end: usize) {
        let region = &self.text[start..end];
        let (start, end) = if region.trim().is_empty() {
            (end, end)
        } else {
            let lead = region.len() - region.trim_start().len();
            let trail = region.len() - region.trim_end().len();
            (start + lead, end - trail)
        };
        if self.pending < start {
            self.nodes
                .push(Node::Text(self.text[self.pending..start].to_string()));
        }
        self.nodes.push(Node::Slot(Slot {
            key,
            payload: self.text[start..end].to_string(),
        }));
        self.pending = end;
        self.cursor = end;
    }

    fn next_attribute(&self) -> Option<(usize, &'static str)> {
        DISPLAY_ATTRIBUTES
            .iter()
            .filter_map(|attr| {
                self.text[self.cursor..]
                    .find(attr)
                    .map(|i| (self.cursor + i, *attr))
            })
            .min_by_key(|(at, _)| *at)
    }

    fn display(&mut self) -> Res<()> {
        while let Some((at, attr)) = self.next_attribute() {
            let after_name = at + attr.len();
            let Some(tag_start) = self.text[..at].rfind('<') else {
                self.cursor = after_name;
                continue;
            };
            let in_tag = !self.text[tag_start..at].contains('>');
            let separated = self.text[..at].ends_with(char::is_whitespace);
            let name_ends = !self.text[after_name..].starts_with(|c: char| c == '-' || c.is_alphanumeric());
            if !in_tag || !separated || !name_ends {
                self.cursor = after_name;
                continue;
            }

            let line = self.line(at);
            let (value, value_end) = self.attribute_value(after_name);
            let Some(tag_end) = self.text[value_end..].find('>').map(|i| value_end + i) else {
                bail!("Line {line}: the tag holding {attr} is never closed");
            };
            let key = display_key(attr, value)
                .with_context(|| format!("Line {line}: invalid marker {attr}"))?;

            let content_start = tag_end + 1;
            if let SlotKey::Heading(_) = key {
                let (start, end) = self.heading_payload(tag_start, content_start, line)?;
                self.push_slot(key, start, end);
            } else {
                let end = self.text[content_start..]
                    .find('<')
                    .map(|i| content_start + i)
                    .unwrap_or(self.text.len());
                self.push_slot(key, content_start, end);
            }
        }
        Ok(())
    }

    /// Reads `="value"` or `='value'` after an attribute name. An attribute without a value
    /// yields `None`.
    fn attribute_value(&self, after_name: usize) -> (Option<&'a str>, usize) {
        let rest = &self.text[after_name..];
        let trimmed = rest.trim_start();
        let Some(eq) = trimmed.strip_prefix('=') else {
            return (None, after_name);
        };
        let eq = eq.trim_start();
        let value_start = after_name + (rest.len() - eq.len());
        let Some(quote) = eq.chars().next().filter(|c| *c == '"' || *c == '\'') else {
            let end = eq
                .find(|c: char| c.is_whitespace() || c == '>')
                .unwrap_or(eq.len());
            return (Some(&eq[..end]), value_start + end);
        };
        match eq[1..].find(quote) {
            Some(close) => (Some(&eq[1..1 + close]), value_start + close + 2),
            None => (Some(&eq[1..]), self.text.len()),
        }
    }

    /// The heading payload is the content of the last parentheses before the closing tag.
    fn heading_payload(
        &self,
        tag_start: usize,
        content_start: usize,
        line: usize,
    ) -> Res<(usize, usize)> {
        let name: String = self.text[tag_start + 1..]
            .chars()
            .take_while(|c| c.is_ascii_alphanumeric())
            .collect();
        let closing = format!("</{name}");
        let Some(content_end) = self.text[content_start..]
            .find(&closing)
            .map(|i| content_start + i)
        else {
            bail!("Line {line}: <{name}> heading is never closed");
        };
        let content = &self.text[content_start..content_end];
        let open = content.rfind('(');
        let close = open.and_then(|o| content[o..].find(')').map(|c| o + c));
        match (open, close) {
            (Some(open), Some(close)) => Ok((content_start + open + 1, content_start + close)),
            _ => bail!("Line {line}: the heading has no '(total)' to update"),
        }
    }

    fn script(&mut self) -> Res<()> {
        while let Some(open) = self.text[self.cursor..].find("/*").map(|i| self.cursor + i) {
            let Some(close) = self.text[open..].find("*/").map(|i| open + i) else {
                break;
            };
            let after_comment = close + 2;
            self.cursor = after_comment;

            let inner = self.text[open + 2..close].trim();
            let Some((kind, value)) = inner.split_once(':') else {
                continue;
            };
            let kind = kind.trim();
            if !SCRIPT_KINDS.contains(&kind) {
                continue;
            }

            let line = self.line(open);
            let key = script_key(kind, value.trim())
                .with_context(|| format!("Line {line}: invalid marker /* {inner} */"))?;
            let rest = &self.text[after_comment..];
            let start = after_comment + (rest.len() - rest.trim_start().len());

            let end = if let SlotKey::Series(_) = key {
                if !self.text[start..].starts_with('[') {
                    bail!("Line {line}: /* {inner} */ is not followed by an array");
                }
                match self.text[start..].find(']') {
                    Some(i) => start + i + 1,
                    None => bail!("Line {line}: the array after /* {inner} */ is never closed"),
                }
            } else {
                let len = self.text[start..]
                    .find(|c: char| !(c.is_ascii_digit() || c == '.' || c == '-'))
                    .unwrap_or(self.text.len() - start);
                if len == 0 {
                    bail!("Line {line}: /* {inner} */ is not followed by a number");
                }
                start + len
            };
            self.push_slot(key, start, end);
        }
        Ok(())
    }
}

fn source(value: &str) -> Res<Source> {
    Source::from_str(value.trim()).with_context(|| format!("'{value}' is not a known source"))
}

fn display_key(attr: &str, value: Option<&str>) -> Res<SlotKey> {
    if attr == "data-period" {
        return Ok(SlotKey::Period);
    }
    let Some(value) = value else {
        bail!("{attr} needs a value");
    };
    Ok(match attr {
        "data-section" => SlotKey::Heading(source(value)?),
        "data-count" => {
            let Some((s, category)) = value.split_once('.') else {
                bail!("'{value}' should look like source.CATEGORY");
            };
            let source = source(s)?;
            let Some(category) = source.category(category.trim()) else {
                bail!("'{category}' is not a category of {source}");
            };
            SlotKey::Count {
                source,
                category: category.key(),
            }
        }
        "data-amount" if value.trim() == "total" => SlotKey::Amount(None),
        "data-amount" => SlotKey::Amount(Some(source(value)?)),
        "data-dmt" => SlotKey::Dmt(source(value)?),
        _ => bail!("unknown marker {attr}"),
    })
}

fn script_key(kind: &str, value: &str) -> Res<SlotKey> {
    Ok(match kind {
        "counts" => SlotKey::Series(source(value)?),
        "amount" if value == "total" => SlotKey::Amount(None),
        "amount" => SlotKey::Amount(Some(source(value)?)),
        "dmt" => SlotKey::Dmt(source(value)?),
        _ => bail!("unknown marker kind {kind}"),
    })
}
