//! Wire and display forms of a [`StatusSnapshot`].

use crate::types::{CanonicalFlagState, StatusSnapshot, VariantValue};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Status document served by `/feature-status`.
///
/// `color` follows the state; `boxColor` carries the variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusView {
    pub status: String,
    pub color: String,
    #[serde(default)]
    pub warning: String,
    #[serde(rename = "boxColor", default)]
    pub box_color: String,
}

impl StatusView {
    pub fn from_snapshot(snapshot: &StatusSnapshot) -> Self {
        Self {
            status: snapshot.state.label().to_string(),
            color: snapshot.color().to_string(),
            warning: snapshot.warning.clone().unwrap_or_default(),
            box_color: snapshot.display_variant().to_string(),
        }
    }

    /// Rebuild a snapshot from a fetched document.
    ///
    /// Unknown status labels become `Error`.
    pub fn into_snapshot(self, observed_at: DateTime<Utc>) -> StatusSnapshot {
        let state = CanonicalFlagState::from_label(&self.status);
        let variant = (!self.box_color.is_empty()).then(|| VariantValue::new(self.box_color));
        StatusSnapshot::new(state, observed_at)
            .with_variant(variant)
            .with_warning(self.warning)
    }
}

/// How `/feature-status` is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderMode {
    #[default]
    Json,
    Html,
}

impl FromStr for RenderMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "html" => Ok(Self::Html),
            other => Err(format!("unknown render mode '{other}' (expected json or html)")),
        }
    }
}

/// HTML fragment for `RenderMode::Html`.
///
/// The root element carries the whole document as `data-*` attributes so a
/// polling page can treat it like the JSON form. The fragment holds no `id`s;
/// the page owns those.
pub fn html_fragment(view: &StatusView) -> String {
    let mut html = format!(
        r#"<div class="feature-status-fragment" data-status="{}" data-color="{}" data-box-color="{}" data-warning="{}">"#,
        escape_html(&view.status),
        escape_html(&view.color),
        escape_html(&view.box_color),
        escape_html(&view.warning)
    );
    html.push_str(&format!(
        r#"<span style="color:{};">Feature is <b>{}</b></span>"#,
        escape_html(&view.color),
        escape_html(&view.status)
    ));
    html.push_str(&format!(
        r#"<span class="color-box" style="background:{};"></span>"#,
        escape_html(&view.box_color)
    ));
    if !view.warning.is_empty() {
        html.push_str(&format!(
            r#"<div class="feature-warning" style="color:orange;">{}</div>"#,
            escape_html(&view.warning)
        ));
    }
    html.push_str("</div>");
    html
}

/// One line for terminal output.
pub fn terminal_line(snapshot: &StatusSnapshot) -> String {
    let mut line = format!(
        "{}  Feature is {}  (box {})",
        snapshot.observed_at.format("%H:%M:%S"),
        snapshot.state,
        snapshot.display_variant()
    );
    if let Some(warning) = &snapshot.warning {
        line.push_str("  warning: ");
        line.push_str(warning);
    }
    line
}

pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
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
