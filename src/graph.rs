//! Filter-graph intermediate representation.
//!
//! Compilers build [`FilterNode`] records (`inputs`, filter chain, `outputs`) and only the final
//! [`FilterGraph::render`] pass turns them into ffmpeg `-filter_complex` text. Escaping lives in
//! [`ArgValue`] rendering so graph construction never deals with quoting.

use std::collections::BTreeMap;
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreamKind {
    Video,
    Audio,
}

/// An edge endpoint: either a stream of a numbered input file or a named pad.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PadRef {
    Input { index: usize, kind: StreamKind },
    Label(String),
}

impl PadRef {
    pub fn video(index: usize) -> Self {
        Self::Input {
            index,
            kind: StreamKind::Video,
        }
    }

    pub fn audio(index: usize) -> Self {
        Self::Input {
            index,
            kind: StreamKind::Audio,
        }
    }

    pub fn label(name: impl Into<String>) -> Self {
        Self::Label(name.into())
    }
}

impl fmt::Display for PadRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PadRef::Input {
                index,
                kind: StreamKind::Video,
            } => write!(f, "[{index}:v]"),
            PadRef::Input {
                index,
                kind: StreamKind::Audio,
            } => write!(f, "[{index}:a]"),
            PadRef::Label(name) => write!(f, "[{name}]"),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum ArgValue {
    /// Emitted verbatim. Must not contain graph or option delimiters.
    Raw(String),
    /// Arithmetic expression, emitted inside single quotes so commas survive.
    Expr(String),
    /// Free text (titles, paths, colors), escaped for both the option and graph levels.
    Text(String),
}

impl ArgValue {
    fn render(&self) -> String {
        match self {
            ArgValue::Raw(v) => v.clone(),
            ArgValue::Expr(e) => format!("'{e}'"),
            ArgValue::Text(t) => escape_graph_value(&escape_option_value(t)),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Filter {
    pub name: String,
    pub args: Vec<(Option<String>, ArgValue)>,
}

impl Filter {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, key: &str, value: impl fmt::Display) -> Self {
        self.args
            .push((Some(key.to_string()), ArgValue::Raw(value.to_string())));
        self
    }

    pub fn positional(mut self, value: impl fmt::Display) -> Self {
        self.args.push((None, ArgValue::Raw(value.to_string())));
        self
    }

    pub fn expr(mut self, key: &str, expr: impl Into<String>) -> Self {
        self.args
            .push((Some(key.to_string()), ArgValue::Expr(expr.into())));
        self
    }

    pub fn value(mut self, key: &str, value: ArgValue) -> Self {
        self.args.push((Some(key.to_string()), value));
        self
    }

    pub fn text(mut self, key: &str, text: impl Into<String>) -> Self {
        self.args
            .push((Some(key.to_string()), ArgValue::Text(text.into())));
        self
    }

    /// Value of the first argument named `key`, unescaped.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.args.iter().find_map(|(k, v)| match (k, v) {
            (Some(k), ArgValue::Raw(s) | ArgValue::Expr(s) | ArgValue::Text(s)) if k == key => {
                Some(s.as_str())
            }
            _ => None,
        })
    }

    pub fn render(&self) -> String {
        if self.args.is_empty() {
            return self.name.clone();
        }
        let args = self
            .args
            .iter()
            .map(|(k, v)| match k {
                Some(k) => format!("{k}={}", v.render()),
                None => v.render(),
            })
            .collect::<Vec<_>>()
            .join(":");
        format!("{}={args}", self.name)
    }
}

/// One `[in]...filter,filter...[out]` chain.
#[derive(Clone, Debug, PartialEq)]
pub struct FilterNode {
    pub inputs: Vec<PadRef>,
    pub filters: Vec<Filter>,
    pub outputs: Vec<String>,
}

impl FilterNode {
    pub fn new(inputs: Vec<PadRef>, filters: Vec<Filter>, output: impl Into<String>) -> Self {
        Self {
            inputs,
            filters,
            outputs: vec![output.into()],
        }
    }

    pub fn has_filter(&self, name: &str) -> bool {
        self.filters.iter().any(|f| f.name == name)
    }

    pub fn filter(&self, name: &str) -> Option<&Filter> {
        self.filters.iter().find(|f| f.name == name)
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        for pad in &self.inputs {
            out.push_str(&pad.to_string());
        }
        out.push_str(
            &self
                .filters
                .iter()
                .map(Filter::render)
                .collect::<Vec<_>>()
                .join(","),
        );
        for pad in &self.outputs {
            out.push('[');
            out.push_str(pad);
            out.push(']');
        }
        out
    }
}

/// A self-contained piece of graph produced by one sub-compiler.
#[derive(Clone, Debug, PartialEq)]
pub struct Fragment {
    pub inputs: Vec<InputRef>,
    pub nodes: Vec<FilterNode>,
    pub output: String,
}

#[derive(Clone, Debug, Default)]
pub struct FilterGraph {
    nodes: Vec<FilterNode>,
}

impl FilterGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, node: FilterNode) {
        self.nodes.push(node);
    }

    /// Append a fragment's nodes and return its output pad.
    pub fn absorb(&mut self, fragment: Fragment) -> String {
        self.nodes.extend(fragment.nodes);
        fragment.output
    }

    pub fn nodes(&self) -> &[FilterNode] {
        &self.nodes
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn render(&self) -> String {
        self.nodes
            .iter()
            .map(FilterNode::render)
            .collect::<Vec<_>>()
            .join(";")
    }
}

/// Hands out pad names unique within one compilation (`vout0`, `vout1`, `color0`, ...).
#[derive(Debug, Default)]
pub struct PadNamer {
    counters: BTreeMap<&'static str, u32>,
}

impl PadNamer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fresh(&mut self, prefix: &'static str) -> String {
        let n = self.counters.entry(prefix).or_insert(0);
        let name = format!("{prefix}{n}");
        *n += 1;
        name
    }
}

/// One `-i` input with the options that precede it.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct InputSpec {
    pub path: String,
    pub options: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InputRef {
    pub index: usize,
    pub path: String,
}

/// Assigns numeric input slots in registration order.
#[derive(Debug, Default)]
pub struct InputRegistry {
    inputs: Vec<InputSpec>,
}

impl InputRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, path: &str, options: Vec<String>) -> InputRef {
        let index = self.inputs.len();
        self.inputs.push(InputSpec {
            path: path.to_string(),
            options,
        });
        InputRef {
            index,
            path: path.to_string(),
        }
    }

    pub fn len(&self) -> usize {
        self.inputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty()
    }

    pub fn into_inputs(self) -> Vec<InputSpec> {
        self.inputs
    }
}

/// Escape a value for ffmpeg's option parser (`key=value:key=value`).
pub fn escape_option_value(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '\\' | '\'' | ':') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Escape an already option-escaped value for the filtergraph parser.
pub fn escape_graph_value(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '\\' | '\'' | '[' | ']' | ',' | ';') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
