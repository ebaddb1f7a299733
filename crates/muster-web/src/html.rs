//! Minimal HTML helpers for the server-rendered pages.

use std::fmt::Display;

use axum::response::Html;
use chrono::{DateTime, SecondsFormat, Utc};

const STYLE: &str = "
body { font-family: system-ui, sans-serif; margin: 2rem auto; max-width: 60rem; padding: 0 1rem; }
table { border-collapse: collapse; width: 100%; }
th, td { border-bottom: 1px solid #ddd; padding: .35rem .5rem; text-align: left; }
nav a { margin-right: 1rem; }
.banner { background: #e8f5e9; border: 1px solid #a5d6a7; padding: .5rem 1rem; }
.error { background: #ffebee; border-color: #ef9a9a; }
label { display: block; margin-top: .6rem; }
";

/// Escape text for use in element content and quoted attribute values.
pub fn escape(s: &str) -> String {
  let mut out = String::with_capacity(s.len());
  for c in s.chars() {
    match c {
      '&' => out.push_str("&amp;"),
      '<' => out.push_str("&lt;"),
      '>' => out.push_str("&gt;"),
      '"' => out.push_str("&quot;"),
      '\'' => out.push_str("&#39;"),
      _ => out.push(c),
    }
  }
  out
}

/// Escaped value, or `-` when absent.
pub fn opt(value: Option<impl Display>) -> String {
  value.map_or_else(|| "-".to_owned(), |v| escape(&v.to_string()))
}

pub fn datetime(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub fn banner(message: &str) -> String {
  format!(r#"<p class="banner">{}</p>"#, escape(message))
}

pub fn error_banner(message: &str) -> String {
  format!(r#"<p class="banner error">{}</p>"#, escape(message))
}

/// Wrap `body` in a complete document. `body` must already be escaped.
pub fn page(title: &str, body: &str) -> Html<String> {
  Html(format!(
    r#"<!doctype html>
<html>
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{title}</title>
<style>{STYLE}</style>
</head>
<body>
{body}
</body>
</html>"#,
    title = escape(title),
  ))
}

/// Admin page with the shared navigation bar.
pub fn admin_page(title: &str, body: &str) -> Html<String> {
  let nav = r#"<nav>
<a href="/admin">Dashboard</a>
<a href="/admin/reports">Reports</a>
<a href="/admin/absentees">Absentees</a>
<a href="/admin/users">Roster</a>
<a href="/admin/logout">Log out</a>
</nav>"#;
  page(title, &format!("{nav}\n<h1>{}</h1>\n{body}", escape(title)))
}
