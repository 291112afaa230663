use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use chrono::{Datelike, NaiveDate};

use crate::errors::Result;
use crate::storage::models::{Client, Post};

pub const FALLBACK_THEME_COLOR: &str = "#dc2626";
const DEFAULT_DESCRIPTION: &str = "Planejamento da Semana/Mês";
const DEFAULT_COMPANY: &str = "Agenda de Postagens";

/// The parts of a client shown on a snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientIdentity {
    pub name: String,
    pub theme_color: String,
    pub description: String,
}

impl From<&Client> for ClientIdentity {
    fn from(client: &Client) -> Self {
        Self {
            name: client.name.clone(),
            theme_color: client.theme_color.clone(),
            description: client.description.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExportOptions {
    pub company_name: String,
    pub generated_on: NaiveDate,
}

impl ExportOptions {
    pub fn today(company_name: impl Into<String>) -> Self {
        Self {
            company_name: company_name.into(),
            generated_on: chrono::Local::now().date_naive(),
        }
    }
}

pub fn escape_html(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
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

/// Theme colors end up inside CSS, so anything but `#rgb`/`#rrggbb` falls back.
fn css_color(value: &str) -> &str {
    let hex = value.strip_prefix('#').unwrap_or("");
    if matches!(hex.len(), 3 | 6) && hex.chars().all(|c| c.is_ascii_hexdigit()) {
        value
    } else {
        FALLBACK_THEME_COLOR
    }
}

fn style_block(color: &str) -> String {
    format!(
        r#"    <style>
      body {{
        font-family: 'Inter', sans-serif;
        padding: 40px;
        max-width: 1200px;
        margin: 0 auto;
        color: #333;
        background: linear-gradient(to bottom right, {color}15, white);
      }}
      .agenda-header {{ text-align: center; margin-bottom: 40px; padding-bottom: 20px; }}
      .agenda-header h1 {{ color: {color}; font-size: 32px; margin-bottom: 8px; font-weight: 700; }}
      .agenda-header h2 {{ font-size: 24px; margin-bottom: 12px; font-weight: 600; }}
      .card-container {{ display: grid; grid-template-columns: 1fr; gap: 20px; width: 100%; }}
      .card {{
        background: rgba(255, 255, 255, 0.8);
        border-left: 4px solid {color};
        border-radius: 8px;
        padding: 16px;
        break-inside: avoid;
        page-break-inside: avoid;
      }}
      .card.completed {{ opacity: 0.6; }}
      .card-date {{
        display: inline-block;
        background-color: {color};
        color: white;
        border-radius: 6px;
        padding: 4px 8px;
        font-weight: 600;
      }}
      .card-title {{ font-size: 18px; font-weight: 600; margin-top: 8px; }}
      .card-type {{
        display: inline-block;
        background: #f3f4f6;
        color: #374151;
        border-radius: 4px;
        padding: 2px 6px;
        font-size: 12px;
        margin-top: 4px;
      }}
      .card-text {{
        white-space: pre-line;
        color: #4b5563;
        line-height: 1.5;
        font-size: 14px;
        text-align: justify;
        overflow-wrap: break-word;
      }}
      .social-icons {{ display: flex; flex-wrap: wrap; gap: 8px; margin-top: 12px; }}
      .social-icon {{
        background-color: #f1f5f9;
        color: #64748b;
        border-radius: 12px;
        padding: 2px 8px;
        font-size: 12px;
      }}
      .footer {{ text-align: center; margin-top: 60px; padding-top: 20px; color: #666; font-size: 14px; }}
      @media print {{
        body {{ padding: 20px; }}
        .card {{ box-shadow: none; }}
      }}
    </style>
"#
    )
}

fn render_card(out: &mut String, post: &Post) {
    let class = if post.completed { "card completed" } else { "card" };
    let date = match (post.date.is_empty(), post.day_of_week.is_empty()) {
        (false, false) => format!("{} · {}", post.date, post.day_of_week),
        (false, true) => post.date.clone(),
        (true, _) => post.day_of_week.clone(),
    };

    let _ = writeln!(out, r#"      <div class="{}">"#, class);
    let _ = writeln!(out, r#"        <div class="card-date">{}</div>"#, escape_html(&date));
    let _ = writeln!(out, r#"        <div class="card-title">{}</div>"#, escape_html(&post.title));
    let _ = writeln!(out, r#"        <div class="card-type">{}</div>"#, escape_html(&post.post_type));
    let _ = writeln!(out, r#"        <div class="card-text">{}</div>"#, escape_html(&post.text));
    if !post.social_networks.is_empty() {
        out.push_str("        <div class=\"social-icons\">\n");
        for network in &post.social_networks {
            let _ = writeln!(
                out,
                r#"          <span class="social-icon">{}</span>"#,
                escape_html(network)
            );
        }
        out.push_str("        </div>\n");
    }
    out.push_str("      </div>\n");
}

/// Renders a printable, self-contained HTML agenda for one client.
///
/// Empty post fields render as empty elements; no posts gives an empty card
/// container between the header and the footer.
pub fn render_snapshot(client: &ClientIdentity, posts: &[Post], options: &ExportOptions) -> String {
    let color = css_color(&client.theme_color);
    let date = options.generated_on.format("%d/%m/%Y").to_string();
    let description = if client.description.trim().is_empty() {
        DEFAULT_DESCRIPTION
    } else {
        client.description.as_str()
    };
    let company = if options.company_name.trim().is_empty() {
        DEFAULT_COMPANY
    } else {
        options.company_name.as_str()
    };
    let name = escape_html(&client.name);

    let mut out = String::new();
    out.push_str("<!DOCTYPE html>\n<html>\n  <head>\n    <meta charset=\"utf-8\">\n");
    let _ = writeln!(out, "    <title>Agenda de {}</title>", name);
    out.push_str(&style_block(color));
    out.push_str("  </head>\n  <body>\n");

    out.push_str("    <div class=\"agenda-header\">\n");
    out.push_str("      <h1>Agenda de Postagens</h1>\n");
    let _ = writeln!(out, "      <h2>{}</h2>", name);
    let _ = writeln!(out, "      <p>{}</p>", escape_html(description));
    let _ = writeln!(out, "      <p>{}</p>", date);
    out.push_str("    </div>\n");

    out.push_str("    <div class=\"card-container\">\n");
    for post in posts {
        render_card(&mut out, post);
    }
    out.push_str("    </div>\n");

    out.push_str("    <div class=\"footer\">\n");
    let _ = writeln!(out, "      <p>Última atualização: {}</p>", date);
    let _ = writeln!(
        out,
        "      <p>© {} {}</p>",
        options.generated_on.year(),
        escape_html(company)
    );
    out.push_str("    </div>\n  </body>\n</html>\n");
    out
}

pub fn write_snapshot(path: &Path, html: &str) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, html)?;
    tracing::info!(path = %path.display(), bytes = html.len(), "wrote snapshot");
    Ok(())
}
