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

use anyhow::{Context as _, Result};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use tera::{Context, Filter, Tera, Value};

use crate::navigation::{find_by_id, find_by_slug, render_menu, MenuNode};
use crate::placeholders::{expand_tags, get_placeholders, PlaceholderNode};

const BASE_TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="{{ lang }}">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{% block title %}{% if gerbi_current_page %}{{ gerbi_current_page.title }}{% else %}Gerbi{% endif %}{% endblock %}</title>
    {% block head %}{% endblock %}
</head>
<body>
    <nav>{% dynamic_tree_menu %}</nav>
    <main>{% block content %}{% endblock %}</main>
</body>
</html>
"#;

const DEFAULT_PAGE_TEMPLATE: &str = r#"{% extends "base.html" %}
{% block content %}
<h1>{% placeholder "title" %}</h1>
<div class="body">{% placeholder "body" %}</div>
{% endblock %}
"#;

const NOT_FOUND_TEMPLATE: &str = r#"{% extends "base.html" %}
{% block title %}Page not found{% endblock %}
{% block content %}
<h1>Page not found</h1>
<p>The page you requested does not exist.</p>
{% endblock %}
"#;

const LOGIN_TEMPLATE: &str = r#"{% extends "base.html" %}
{% block title %}Log in{% endblock %}
{% block content %}
<h1>Log in</h1>
{% if error %}<p class="error">{{ error }}</p>{% endif %}
<form method="post" action="/admin/login">
    <label>Username <input type="text" name="username" required></label>
    <label>Password <input type="password" name="password" required></label>
    <button type="submit">Log in</button>
</form>
{% endblock %}
"#;

const PAGE_LIST_TEMPLATE: &str = r#"{% extends "base.html" %}
{% block title %}Pages{% endblock %}
{% block content %}
<h1>Pages</h1>
<p>Logged in as {{ user.username }}. <a href="/admin/logout">Log out</a></p>
<table>
    <tr><th>Id</th><th>Title</th><th>URL</th><th>Status</th><th>Template</th></tr>
    {% for page in admin_pages %}
    <tr>
        <td>{{ page.id }}</td>
        <td style="padding-left: {{ page.depth }}em">{{ page.title }}</td>
        <td><a href="{{ page.url }}">{{ page.url }}</a></td>
        <td>{{ page.status }}{% if page.status != page.calculated_status %} ({{ page.calculated_status }}){% endif %}</td>
        <td>{{ page.template }}</td>
    </tr>
    {% endfor %}
</table>
<h2>Add a page</h2>
<form method="post" action="/admin/pages/add">
    <label>Title <input type="text" name="title" required></label>
    <label>Slug <input type="text" name="slug"></label>
    <label>Status
        <select name="status">
            <option value="draft">draft</option>
            <option value="published">published</option>
            <option value="hidden">hidden</option>
        </select>
    </label>
    <label>Language
        <select name="language">
            {% for language in languages %}<option value="{{ language }}">{{ language }}</option>{% endfor %}
        </select>
    </label>
    <label>Parent
        <select name="parent">
            <option value="">(top level)</option>
            {% for page in admin_pages %}<option value="{{ page.id }}">{{ page.title }}</option>{% endfor %}
        </select>
    </label>
    <button type="submit">Add</button>
</form>
{% endblock %}
"#;

/// Templates available when the templates directory does not provide them.
pub const BUILTIN_TEMPLATES: &[(&str, &str)] = &[
    ("base.html", BASE_TEMPLATE),
    ("pages/default.html", DEFAULT_PAGE_TEMPLATE),
    ("404.html", NOT_FOUND_TEMPLATE),
    ("admin/login.html", LOGIN_TEMPLATE),
    ("admin/page_list.html", PAGE_LIST_TEMPLATE),
];

/// Compiled templates together with their unexpanded sources.
pub struct LoadedTemplates {
    tera: Tera,
    sources: HashMap<String, String>,
}

impl LoadedTemplates {
    fn build(sources: HashMap<String, String>) -> Result<Self> {
        let mut expanded = Vec::with_capacity(sources.len());
        for (name, source) in &sources {
            let body = expand_tags(source)
                .with_context(|| format!("Failed to expand tags in template '{}'", name))?;
            expanded.push((name.clone(), body));
        }

        let mut tera = Tera::default();
        register_filters(&mut tera);
        tera.add_raw_templates(expanded)
            .context("Failed to compile templates")?;

        Ok(Self { tera, sources })
    }
}

/// A wrapper around Tera that can reload templates in development mode
#[derive(Clone)]
pub enum TemplateEngine {
    /// Static templates loaded once at startup
    Static(Arc<LoadedTemplates>),
    /// Reloadable templates that refresh on each render
    Reloadable {
        templates_dir: PathBuf,
        cached: Arc<RwLock<Arc<LoadedTemplates>>>,
    },
}

impl TemplateEngine {
    /// Built-in templates, overridden by the files of `templates_dir`.
    pub fn new(templates_dir: Option<&Path>, development_mode: bool) -> Result<Self> {
        let loaded = Arc::new(Self::load(templates_dir)?);
        match templates_dir {
            Some(dir) if development_mode => {
                tracing::info!("Template hot reload enabled (development mode)");
                Ok(Self::Reloadable {
                    templates_dir: dir.to_path_buf(),
                    cached: Arc::new(RwLock::new(loaded)),
                })
            }
            _ => {
                tracing::info!("Templates loaded once");
                Ok(Self::Static(loaded))
            }
        }
    }

    /// Built-in templates plus in-memory ones, mostly for tests.
    pub fn from_sources(extra: &[(&str, &str)]) -> Result<Self> {
        let mut sources = builtin_sources();
        for (name, source) in extra {
            sources.insert(name.to_string(), source.to_string());
        }
        Ok(Self::Static(Arc::new(LoadedTemplates::build(sources)?)))
    }

    fn load(templates_dir: Option<&Path>) -> Result<LoadedTemplates> {
        let mut sources = builtin_sources();
        if let Some(dir) = templates_dir {
            if dir.is_dir() {
                read_dir_sources(dir, dir, &mut sources)?;
            } else {
                tracing::warn!("Templates directory {} not found, using built-in templates", dir.display());
            }
        }
        LoadedTemplates::build(sources)
    }

    fn current(&self) -> Arc<LoadedTemplates> {
        match self {
            Self::Static(loaded) => Arc::clone(loaded),
            Self::Reloadable {
                templates_dir,
                cached,
            } => match Self::load(Some(templates_dir.as_path())) {
                Ok(fresh) => {
                    let fresh = Arc::new(fresh);
                    let mut guard = cached.write().unwrap_or_else(|p| p.into_inner());
                    *guard = Arc::clone(&fresh);
                    fresh
                }
                Err(e) => {
                    tracing::warn!("Failed to reload templates: {:?}. Using cached version.", e);
                    let guard = cached.read().unwrap_or_else(|p| p.into_inner());
                    Arc::clone(&guard)
                }
            },
        }
    }

    pub fn render(&self, template_name: &str, context: &Context) -> Result<String> {
        self.current()
            .tera
            .render(template_name, context)
            .with_context(|| format!("Failed to render template '{}'", template_name))
    }

    /// Placeholder slots of a template, see [`get_placeholders`].
    pub fn placeholders(&self, template_name: &str) -> Result<Vec<PlaceholderNode>> {
        Ok(get_placeholders(&self.current().sources, template_name)?)
    }

    pub fn has_template(&self, template_name: &str) -> bool {
        self.current().sources.contains_key(template_name)
    }

    pub fn template_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.current().sources.keys().cloned().collect();
        names.sort();
        names
    }
}

impl fmt::Debug for TemplateEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Static(_) => f.write_str("TemplateEngine::Static"),
            Self::Reloadable { templates_dir, .. } => f
                .debug_struct("TemplateEngine::Reloadable")
                .field("templates_dir", templates_dir)
                .finish(),
        }
    }
}

fn builtin_sources() -> HashMap<String, String> {
    BUILTIN_TEMPLATES
        .iter()
        .map(|(name, source)| (name.to_string(), source.to_string()))
        .collect()
}

fn read_dir_sources(root: &Path, dir: &Path, sources: &mut HashMap<String, String>) -> Result<()> {
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to read templates directory {}", dir.display()))?;

    for entry in entries {
        let path = entry?.path();
        if path.is_dir() {
            read_dir_sources(root, &path, sources)?;
            continue;
        }

        let Ok(relative) = path.strip_prefix(root) else {
            continue;
        };
        let name = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        if name.split('/').any(|part| part.starts_with('.')) {
            continue;
        }

        let source = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read template {}", path.display()))?;
        sources.insert(name, source);
    }

    Ok(())
}

fn register_filters(tera: &mut Tera) {
    tera.register_filter("tree_menu", TreeMenuFilter);
    tera.register_filter("find_page", FindPageFilter);
    tera.register_filter("page_url", PageFieldFilter("url"));
    tera.register_filter("page_slug", PageFieldFilter("slug"));
}

fn menu_from_value(value: &Value) -> tera::Result<Vec<MenuNode>> {
    match value {
        Value::Null => Ok(Vec::new()),
        _ => tera::from_value(value.clone())
            .map_err(|e| tera::Error::msg(format!("Expected a page menu: {}", e))),
    }
}

/// `{{ gerbi_menu | tree_menu(root="slug") }}`
struct TreeMenuFilter;

impl Filter for TreeMenuFilter {
    fn filter(&self, value: &Value, args: &HashMap<String, Value>) -> tera::Result<Value> {
        let menu = menu_from_value(value)?;
        let html = match args.get("root") {
            None | Some(Value::Null) => render_menu(&menu),
            Some(Value::String(slug)) if slug.is_empty() => render_menu(&menu),
            Some(Value::String(slug)) => find_by_slug(&menu, slug)
                .map(|root| render_menu(&root.children))
                .unwrap_or_default(),
            Some(other) => {
                return Err(tera::Error::msg(format!(
                    "tree_menu root must be a slug, got {}",
                    other
                )))
            }
        };
        Ok(Value::String(html))
    }

    fn is_safe(&self) -> bool {
        true
    }
}

/// `{{ gerbi_menu | find_page(id=3) }}` or `find_page(slug="about")`
struct FindPageFilter;

impl Filter for FindPageFilter {
    fn filter(&self, value: &Value, args: &HashMap<String, Value>) -> tera::Result<Value> {
        let menu = menu_from_value(value)?;
        let found = if let Some(id) = args.get("id") {
            let id = id
                .as_i64()
                .ok_or_else(|| tera::Error::msg("find_page id must be an integer"))?;
            find_by_id(&menu, id)
        } else if let Some(slug) = args.get("slug") {
            let slug = slug
                .as_str()
                .ok_or_else(|| tera::Error::msg("find_page slug must be a string"))?;
            find_by_slug(&menu, slug)
        } else {
            return Err(tera::Error::msg("find_page needs an `id` or a `slug`"));
        };

        match found {
            Some(node) => tera::to_value(node).map_err(tera::Error::from),
            None => Ok(Value::Null),
        }
    }
}

/// Reads one field of a page value; strings pass through, anything else is
/// empty. Output is attribute-escaped, leaving slashes alone.
struct PageFieldFilter(&'static str);

impl Filter for PageFieldFilter {
    fn filter(&self, value: &Value, _args: &HashMap<String, Value>) -> tera::Result<Value> {
        let raw = match value {
            Value::Object(map) => map.get(self.0).and_then(Value::as_str).unwrap_or_default(),
            Value::String(s) => s.as_str(),
            _ => "",
        };
        Ok(Value::String(
            html_escape::encode_double_quoted_attribute(raw).into_owned(),
        ))
    }

    fn is_safe(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gerbi_core::PageStatus;
    use pretty_assertions::assert_eq;

    fn menu() -> Vec<MenuNode> {
        vec![MenuNode {
            id: 1,
            title: "Home".to_string(),
            slug: "home".to_string(),
            url: "/home/".to_string(),
            status: PageStatus::Published,
            listed: true,
            current: false,
            children: vec![MenuNode {
                id: 2,
                title: "About".to_string(),
                slug: "about".to_string(),
                url: "/home/about/".to_string(),
                status: PageStatus::Published,
                listed: true,
                current: false,
                children: vec![],
            }],
        }]
    }

    fn context() -> Context {
        let mut context = Context::new();
        context.insert("gerbi_menu", &menu());
        context.insert("gerbi_placeholders", &HashMap::<String, String>::new());
        context
    }

    #[test]
    fn test_builtin_templates_compile() {
        let engine = TemplateEngine::from_sources(&[]).unwrap();
        for (name, _) in BUILTIN_TEMPLATES {
            assert!(engine.has_template(name), "missing {}", name);
        }
        let names: Vec<String> = engine
            .placeholders("pages/default.html")
            .unwrap()
            .into_iter()
            .map(|n| n.name)
            .collect();
        assert_eq!(names, vec!["title".to_string(), "body".to_string()]);
    }

    #[test]
    fn test_menu_tags_render() {
        let engine = TemplateEngine::from_sources(&[
            ("menu.html", r#"[{% dynamic_tree_menu "home" %}]"#),
            ("wrong.html", r#"[{% dynamic_tree_menu "wrong-slug" %}]"#),
            (
                "get.html",
                r#"{% get_page 2 as p %}{{ p.title }} {% show_url p %} {% show_slug p %}{% get_page "home" as h %} {{ h | page_url }}"#,
            ),
        ])
        .unwrap();

        assert_eq!(
            engine.render("menu.html", &context()).unwrap(),
            "[<ul class=\"gerbi-menu\"><li><a href=\"/home/about/\">About</a></li></ul>]"
        );
        assert_eq!(engine.render("wrong.html", &context()).unwrap(), "[]");
        assert_eq!(
            engine.render("get.html", &context()).unwrap(),
            "About /home/about/ about /home/"
        );
    }

    #[test]
    fn test_placeholder_value_is_not_escaped() {
        let engine = TemplateEngine::from_sources(&[(
            "p.html",
            r#"{% placeholder "body" %}|{% placeholder "missing" %}|{% placeholder "body" as b %}{{ b | length }}"#,
        )])
        .unwrap();

        let mut context = context();
        let mut values = HashMap::new();
        values.insert("body", "<b>bold</b>");
        context.insert("gerbi_placeholders", &values);

        assert_eq!(engine.render("p.html", &context).unwrap(), "<b>bold</b>||11");
    }

    #[test]
    fn test_invalid_tag_fails_loading() {
        let result = TemplateEngine::from_sources(&[("bad.html", "{% get_page as %}")]);
        assert!(result.is_err());
    }

    #[test]
    fn test_directory_overrides_builtin() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("pages")).unwrap();
        std::fs::write(
            dir.path().join("pages/default.html"),
            r#"<article>{% placeholder "content" %}</article>"#,
        )
        .unwrap();
        std::fs::write(dir.path().join("extra.html"), "extra").unwrap();

        let engine = TemplateEngine::new(Some(dir.path()), false).unwrap();
        assert!(matches!(engine, TemplateEngine::Static(_)));
        assert!(engine.has_template("extra.html"));
        assert!(engine.has_template("base.html"));
        let names: Vec<String> = engine
            .placeholders("pages/default.html")
            .unwrap()
            .into_iter()
            .map(|n| n.name)
            .collect();
        assert_eq!(names, vec!["content".to_string()]);
    }

    #[test]
    fn test_development_mode_reloads() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("live.html"), "one").unwrap();

        let engine = TemplateEngine::new(Some(dir.path()), true).unwrap();
        assert_eq!(engine.render("live.html", &Context::new()).unwrap(), "one");

        std::fs::write(dir.path().join("live.html"), "two").unwrap();
        assert_eq!(engine.render("live.html", &Context::new()).unwrap(), "two");

        // A broken edit keeps serving the last good version.
        std::fs::write(dir.path().join("live.html"), "{% if %}").unwrap();
        assert_eq!(engine.render("live.html", &Context::new()).unwrap(), "two");
    }

    #[test]
    fn test_missing_directory_uses_builtins() {
        let engine = TemplateEngine::new(Some(Path::new("/nonexistent/gerbi")), false).unwrap();
        assert!(engine.has_template("404.html"));
        assert!(engine.placeholders("nope.html").is_err());
    }
}
