use serde::Serialize;

/// Photo slot of a popup: the entity's first photo or a category glyph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PhotoSlot {
    Url { url: String },
    Placeholder { glyph: &'static str },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PopupField {
    pub label: &'static str,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PopupAction {
    pub label: &'static str,
    pub href: String,
}

/// Structured popup payload bound to a marker.
///
/// Invariant: `fields` holds between one and `MAX_FIELDS` entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PopupContent {
    pub title: String,
    pub photo: PhotoSlot,
    pub fields: Vec<PopupField>,
    pub action: PopupAction,
}

impl PopupContent {
    pub const MAX_FIELDS: usize = 3;

    /// Builds content from candidate fields. `None` values are skipped,
    /// at most `MAX_FIELDS` are kept, and if nothing is left a single
    /// `fallback` field is used.
    pub fn build(
        title: impl Into<String>,
        photo: PhotoSlot,
        candidates: Vec<(&'static str, Option<String>)>,
        fallback: PopupField,
        action: PopupAction,
    ) -> Self {
        let mut fields: Vec<PopupField> = candidates
            .into_iter()
            .filter_map(|(label, value)| {
                let value = value?;
                (!value.trim().is_empty()).then_some(PopupField { label, value })
            })
            .take(Self::MAX_FIELDS)
            .collect();
        if fields.is_empty() {
            fields.push(fallback);
        }
        Self {
            title: title.into(),
            photo,
            fields,
            action,
        }
    }

    /// HTML for popup APIs that take markup. Every piece of entity data is
    /// escaped.
    pub fn to_html(&self) -> String {
        let mut out = String::with_capacity(256);
        out.push_str("<div class=\"mv-popup\">");
        match &self.photo {
            PhotoSlot::Url { url } => {
                out.push_str("<img class=\"mv-popup-photo\" src=\"");
                out.push_str(&escape_html(url));
                out.push_str("\" alt=\"\">");
            }
            PhotoSlot::Placeholder { glyph } => {
                out.push_str("<div class=\"mv-popup-photo mv-popup-placeholder\">");
                out.push_str(glyph);
                out.push_str("</div>");
            }
        }
        out.push_str("<h3 class=\"mv-popup-title\">");
        out.push_str(&escape_html(&self.title));
        out.push_str("</h3><dl class=\"mv-popup-fields\">");
        for f in &self.fields {
            out.push_str("<dt>");
            out.push_str(f.label);
            out.push_str("</dt><dd>");
            out.push_str(&escape_html(&f.value));
            out.push_str("</dd>");
        }
        out.push_str("</dl><a class=\"mv-popup-action\" href=\"");
        out.push_str(&escape_html(&self.action.href));
        out.push_str("\">");
        out.push_str(self.action.label);
        out.push_str("</a></div>");
        out
    }
}

pub fn escape_html(s: &str) -> String {
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

/// `"a, b, c"` or `None` for an empty list.
pub fn join_list(items: &[String]) -> Option<String> {
    (!items.is_empty()).then(|| items.join(", "))
}

pub fn format_rating(rating: Option<f64>) -> Option<String> {
    rating.filter(|r| r.is_finite()).map(|r| format!("★ {r:.1}"))
}

/// Price in GEL. Whole amounts print without decimals.
pub fn format_price(amount: f64) -> String {
    if amount.fract() == 0.0 {
        format!("{amount:.0} ₾")
    } else {
        format!("{amount:.2} ₾")
    }
}

pub fn format_price_range(min: Option<f64>, max: Option<f64>) -> Option<String> {
    match (min, max) {
        (Some(a), Some(b)) if a == b => Some(format_price(a)),
        (Some(a), Some(b)) => Some(format!("{} – {}", format_price(a), format_price(b))),
        (Some(a), None) => Some(format!("from {}", format_price(a))),
        (None, Some(b)) => Some(format!("up to {}", format_price(b))),
        (None, None) => None,
    }
}
