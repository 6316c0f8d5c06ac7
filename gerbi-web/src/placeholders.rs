// Gerbi - A multi-language page CMS built with Rust
// Copyright (C) 2025 Gerbi Project Contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as
// published by the Free Software Foundation, either version 3 of the
// License, or (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! Placeholder tags and the other page tags understood in templates.
//!
//! Tera has no custom tags, so the page tags are rewritten into plain tera
//! syntax before a template is compiled:
//!
//! | tag | becomes |
//! |-----|---------|
//! | `{% placeholder "body" %}` | `{{ gerbi_placeholders.body \| default(value="") \| safe }}` |
//! | `{% placeholder "body" as text %}` | `{% set text = gerbi_placeholders.body \| default(value="") %}` |
//! | `{% dynamic_tree_menu "slug" %}` | `{{ gerbi_menu \| tree_menu(root="slug") \| safe }}` |
//! | `{% get_page 3 as p %}` | `{% set p = gerbi_menu \| find_page(id=3) %}` |
//! | `{% show_url p %}` / `{% show_slug p %}` | `{{ p \| page_url }}` / `{{ p \| page_slug }}` |
//!
//! The untouched sources are kept around so [`get_placeholders`] can list
//! the slots of a template, following `extends` and `include`.

use gerbi_core::LanguageSettings;
use gerbi_db::{resolve_content, ContentRepository, PageContents};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

static TAG_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?s)\{%-?\s*raw\s*-?%\}.*?\{%-?\s*endraw\s*-?%\}|\{#.*?#\}|\{%(-?)\s*(\w+)\s*(.*?)\s*(-?)%\}",
    )
    .expect("Failed to compile template tag regex")
});

static TOKEN_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#""[^"]*"|'[^']*'|\S+"#).expect("Failed to compile tag token regex")
});

static IDENTIFIER_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("Failed to compile identifier regex")
});

static VARIABLE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(?:\.[A-Za-z0-9_]+)*$")
        .expect("Failed to compile variable regex")
});

#[derive(Debug, Error, PartialEq)]
pub enum TemplateError {
    #[error("Template '{0}' not found")]
    NotFound(String),

    #[error("Invalid {tag} tag: {reason}")]
    InvalidTag { tag: &'static str, reason: String },

    #[error("Template '{0}' includes or extends itself")]
    Cycle(String),
}

fn invalid(tag: &'static str, reason: impl Into<String>) -> TemplateError {
    TemplateError::InvalidTag {
        tag,
        reason: reason.into(),
    }
}

/// A `{% placeholder %}` slot declared in a template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaceholderNode {
    pub name: String,
    /// Read and written in the default language only.
    pub untranslated: bool,
    /// Empty values are taken from the nearest ancestor page.
    pub inherited: bool,
    /// The value is rendered as a template itself.
    pub parsed: bool,
    /// Editing widget hint, `with <widget>`.
    pub widget: Option<String>,
    /// Template variable receiving the value instead of printing it.
    pub as_varname: Option<String>,
}

impl PlaceholderNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            untranslated: false,
            inherited: false,
            parsed: false,
            widget: None,
            as_varname: None,
        }
    }

    /// Parse the arguments of a placeholder tag, for example
    /// `"body" inherited as text`.
    pub fn parse(args: &str) -> Result<Self, TemplateError> {
        let tokens = tokenize(args);
        let (first, rest) = tokens
            .split_first()
            .ok_or_else(|| invalid("placeholder", "missing name"))?;

        let name = unquote(first).unwrap_or(*first);
        if !IDENTIFIER_REGEX.is_match(name) {
            return Err(invalid(
                "placeholder",
                format!("name '{}' must be an identifier", name),
            ));
        }

        let mut node = Self::new(name);
        let mut rest = rest.iter();
        while let Some(token) = rest.next() {
            match *token {
                "untranslated" => node.untranslated = true,
                "inherited" => node.inherited = true,
                "parsed" => node.parsed = true,
                "with" => {
                    let widget = rest
                        .next()
                        .ok_or_else(|| invalid("placeholder", "'with' needs a widget name"))?;
                    node.widget = Some(unquote(widget).unwrap_or(*widget).to_string());
                }
                "as" => {
                    let var = rest
                        .next()
                        .ok_or_else(|| invalid("placeholder", "'as' needs a variable name"))?;
                    if !IDENTIFIER_REGEX.is_match(var) {
                        return Err(invalid(
                            "placeholder",
                            format!("'{}' is not a valid variable name", var),
                        ));
                    }
                    node.as_varname = Some(var.to_string());
                }
                other => {
                    return Err(invalid(
                        "placeholder",
                        format!("unexpected argument '{}'", other),
                    ))
                }
            }
        }

        Ok(node)
    }

    /// Language the value is stored in when requested in `language`.
    pub fn storage_language<'a>(&self, languages: &'a LanguageSettings, language: &'a str) -> &'a str {
        if self.untranslated {
            languages.default_language()
        } else {
            language
        }
    }

    /// Value of this slot for a page.
    ///
    /// `ancestors` are the contents of the page's ancestors, nearest first,
    /// and are only consulted for inherited placeholders.
    pub fn resolve(
        &self,
        contents: &PageContents,
        ancestors: &[&PageContents],
        languages: &LanguageSettings,
        language: &str,
        fallback: bool,
    ) -> String {
        let language = self.storage_language(languages, language);
        let value = resolve_content(contents, languages, language, &self.name, fallback);
        if !value.is_empty() || !self.inherited {
            return value;
        }

        ancestors
            .iter()
            .map(|ancestor| resolve_content(ancestor, languages, language, &self.name, fallback))
            .find(|value| !value.is_empty())
            .unwrap_or_default()
    }

    /// Store a new value for a page and invalidate its cached contents.
    /// Returns `false` when the value was unchanged.
    pub async fn save(
        &self,
        repo: &ContentRepository,
        page_id: i64,
        language: &str,
        value: &str,
    ) -> anyhow::Result<bool> {
        let language = self.storage_language(repo.languages(), language);
        repo.set_content(page_id, language, &self.name, value).await
    }

    fn expand(&self, trim_left: &str, trim_right: &str) -> String {
        let value = format!("gerbi_placeholders.{} | default(value=\"\")", self.name);
        match &self.as_varname {
            Some(var) => format!("{{%{} set {} = {} {}%}}", trim_left, var, value, trim_right),
            None => format!("{{{{{} {} | safe {}}}}}", trim_left, value, trim_right),
        }
    }
}

impl fmt::Display for PlaceholderNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<Placeholder Node: {}>", self.name)
    }
}

/// Formats a node list the way it prints in a template debug listing.
pub fn format_nodes(nodes: &[PlaceholderNode]) -> String {
    let inner: Vec<String> = nodes.iter().map(ToString::to_string).collect();
    format!("[{}]", inner.join(", "))
}

fn tokenize(args: &str) -> Vec<&str> {
    TOKEN_REGEX.find_iter(args).map(|m| m.as_str()).collect()
}

fn unquote(token: &str) -> Option<&str> {
    let bytes = token.as_bytes();
    if token.len() >= 2
        && (bytes[0] == b'"' || bytes[0] == b'\'')
        && bytes[token.len() - 1] == bytes[0]
    {
        Some(&token[1..token.len() - 1])
    } else {
        None
    }
}

/// A tera string literal, rejecting values that would need escaping.
fn string_literal(tag: &'static str, value: &str) -> Result<String, TemplateError> {
    if value.contains('"') || value.contains('\\') {
        return Err(invalid(tag, format!("unsupported characters in '{}'", value)));
    }
    Ok(format!("\"{}\"", value))
}

fn variable(tag: &'static str, token: Option<&&str>) -> Result<String, TemplateError> {
    match token {
        Some(var) if VARIABLE_REGEX.is_match(var) => Ok(var.to_string()),
        Some(var) => Err(invalid(tag, format!("'{}' is not a variable", var))),
        None => Err(invalid(tag, "missing variable")),
    }
}

fn expand_tag(
    name: &str,
    args: &str,
    trim_left: &str,
    trim_right: &str,
) -> Result<Option<String>, TemplateError> {
    let tokens = tokenize(args);
    let expanded = match name {
        "placeholder" => PlaceholderNode::parse(args)?.expand(trim_left, trim_right),
        "dynamic_tree_menu" => {
            let filter = match tokens.as_slice() {
                [] => "tree_menu".to_string(),
                [root] => {
                    let slug = unquote(root)
                        .ok_or_else(|| invalid("dynamic_tree_menu", "root slug must be quoted"))?;
                    format!("tree_menu(root={})", string_literal("dynamic_tree_menu", slug)?)
                }
                _ => return Err(invalid("dynamic_tree_menu", "expected at most one root slug")),
            };
            format!("{{{{{} gerbi_menu | {} | safe {}}}}}", trim_left, filter, trim_right)
        }
        "get_page" => {
            let (target, var) = match tokens.as_slice() {
                [target, "as", var] => (*target, *var),
                _ => return Err(invalid("get_page", "expected `get_page <id|\"slug\"> as <var>`")),
            };
            if !IDENTIFIER_REGEX.is_match(var) {
                return Err(invalid("get_page", format!("'{}' is not a valid variable name", var)));
            }
            let lookup = match unquote(target) {
                Some(slug) => format!("slug={}", string_literal("get_page", slug)?),
                None => {
                    let id: i64 = target
                        .parse()
                        .map_err(|_| invalid("get_page", format!("'{}' is not a page id", target)))?;
                    format!("id={}", id)
                }
            };
            format!(
                "{{%{} set {} = gerbi_menu | find_page({}) {}%}}",
                trim_left, var, lookup, trim_right
            )
        }
        "show_url" | "show_slug" => {
            let tag = if name == "show_url" { "show_url" } else { "show_slug" };
            if tokens.len() > 1 {
                return Err(invalid(tag, "expected a single page variable"));
            }
            let var = variable(tag, tokens.first())?;
            let filter = if name == "show_url" { "page_url" } else { "page_slug" };
            format!("{{{{{} {} | {} {}}}}}", trim_left, var, filter, trim_right)
        }
        _ => return Ok(None),
    };
    Ok(Some(expanded))
}

/// Rewrite the page tags of a template source into tera syntax.
pub fn expand_tags(source: &str) -> Result<String, TemplateError> {
    let mut error = None;
    let expanded = TAG_REGEX.replace_all(source, |caps: &Captures| {
        let whole = caps[0].to_string();
        let Some(name) = caps.get(2) else {
            return whole;
        };
        let trim_left = caps.get(1).map_or("", |m| m.as_str());
        let trim_right = caps.get(4).map_or("", |m| m.as_str());
        let args = caps.get(3).map_or("", |m| m.as_str());

        match expand_tag(name.as_str(), args, trim_left, trim_right) {
            Ok(Some(replacement)) => replacement,
            Ok(None) => whole,
            Err(e) => {
                error.get_or_insert(e);
                whole
            }
        }
    });

    match error {
        Some(e) => Err(e),
        None => Ok(expanded.into_owned()),
    }
}

/// Placeholders of a template in declaration order.
///
/// Slots of the `extends` parent come first, then the template's own
/// slots with `include`d templates inlined where they are included. Each
/// name is listed once.
pub fn get_placeholders(
    sources: &HashMap<String, String>,
    template: &str,
) -> Result<Vec<PlaceholderNode>, TemplateError> {
    let mut nodes = Vec::new();
    let mut stack = Vec::new();
    collect(sources, template, &mut stack, &mut nodes)?;
    Ok(nodes)
}

fn collect(
    sources: &HashMap<String, String>,
    template: &str,
    stack: &mut Vec<String>,
    nodes: &mut Vec<PlaceholderNode>,
) -> Result<(), TemplateError> {
    let source = sources
        .get(template)
        .ok_or_else(|| TemplateError::NotFound(template.to_string()))?;
    if stack.iter().any(|t| t == template) {
        return Err(TemplateError::Cycle(template.to_string()));
    }
    stack.push(template.to_string());

    let tags: Vec<(String, String)> = TAG_REGEX
        .captures_iter(source)
        .filter_map(|caps| {
            let name = caps.get(2)?.as_str().to_string();
            let args = caps.get(3).map_or("", |m| m.as_str()).to_string();
            Some((name, args))
        })
        .collect();

    for (_, args) in tags.iter().filter(|(name, _)| name == "extends") {
        if let Some(parent) = tokenize(args).first().and_then(|t| unquote(*t)) {
            collect(sources, parent, stack, nodes)?;
        }
    }

    for (name, args) in &tags {
        match name.as_str() {
            "placeholder" => {
                let node = PlaceholderNode::parse(args)?;
                if !nodes.iter().any(|n| n.name == node.name) {
                    nodes.push(node);
                }
            }
            "include" => {
                let tokens = tokenize(args);
                let ignore_missing = tokens.ends_with(&["ignore", "missing"]);
                let Some(included) = tokens.first().and_then(|t| unquote(*t)) else {
                    continue;
                };
                if ignore_missing && !sources.contains_key(included) {
                    continue;
                }
                collect(sources, included, stack, nodes)?;
            }
            _ => {}
        }
    }

    stack.pop();
    Ok(())
}
