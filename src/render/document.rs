//! Typed model of an nginx configuration document.
//!
//! Rendering assembles `Directive` and `Block` values into a `Document`
//! and serializes it once, instead of concatenating strings. The typed
//! constructors pin down the emitted format and give a single seam where
//! escaping of injected values would go if it is ever added.

use std::fmt;

/// One node of a configuration document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Item {
    /// `# text`
    Comment(String),
    /// `name args;`
    Directive(Directive),
    /// `name args { ... }`
    Block(Block),
    /// Empty separator line.
    Blank,
}

/// A single `name args;` line. Arguments are carried as one raw string
/// and emitted without escaping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directive {
    name: String,
    args: String,
}

impl Directive {
    pub fn new(name: impl Into<String>, args: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: args.into(),
        }
    }
}

/// A braced section holding nested items.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    name: String,
    args: String,
    items: Vec<Item>,
}

impl Block {
    pub fn new(name: impl Into<String>, args: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: args.into(),
            items: Vec::new(),
        }
    }

    pub fn push(&mut self, item: Item) {
        self.items.push(item);
    }

    pub fn directive(&mut self, name: impl Into<String>, args: impl Into<String>) {
        self.items.push(Item::Directive(Directive::new(name, args)));
    }

    pub fn comment(&mut self, text: impl Into<String>) {
        self.items.push(Item::Comment(text.into()));
    }

    pub fn blank(&mut self) {
        self.items.push(Item::Blank);
    }
}

/// A whole configuration document: top-level items serialized with
/// four-space indentation per nesting level.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Document {
    items: Vec<Item>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, item: Item) {
        self.items.push(item);
    }

    pub fn comment(&mut self, text: impl Into<String>) {
        self.items.push(Item::Comment(text.into()));
    }

    pub fn block(&mut self, block: Block) {
        self.items.push(Item::Block(block));
    }

    pub fn blank(&mut self) {
        self.items.push(Item::Blank);
    }
}

fn write_items(f: &mut fmt::Formatter<'_>, items: &[Item], depth: usize) -> fmt::Result {
    let indent = "    ".repeat(depth);
    for item in items {
        match item {
            Item::Comment(text) => writeln!(f, "{indent}# {text}")?,
            Item::Directive(d) => {
                if d.args.is_empty() {
                    writeln!(f, "{indent}{};", d.name)?;
                } else {
                    writeln!(f, "{indent}{} {};", d.name, d.args)?;
                }
            }
            Item::Block(b) => {
                if b.args.is_empty() {
                    writeln!(f, "{indent}{} {{", b.name)?;
                } else {
                    writeln!(f, "{indent}{} {} {{", b.name, b.args)?;
                }
                write_items(f, &b.items, depth + 1)?;
                writeln!(f, "{indent}}}")?;
            }
            Item::Blank => writeln!(f)?,
        }
    }
    Ok(())
}

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_items(f, &self.items, 0)
    }
}
