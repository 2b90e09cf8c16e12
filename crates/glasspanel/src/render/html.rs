//! Retained HTML/SVG rendering of the dashboard.
//!
//! The document is built once on mount. Elements that change per frame are
//! kept by id, and each frame only updates their text, bar width, arc offset
//! or status class. [`HtmlRenderer::to_html`] serializes the current document.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use tracing::debug;

use super::{arc_circumference, format_fixed, RenderState, Renderer, Status, CHT_ARC_RADIUS, RPM_ARC_RADIUS};
use crate::error::{Error, Result};

/// Marker id of the injected stylesheet.
pub const STYLESHEET_ID: &str = "glass-dashboard-styles";

const HOST_ID: &str = "glasspanel";

const RPM_VAL: &str = "gd-rpm-val";
const RPM_BAR: &str = "gd-rpm-bar";
const CHT_VAL: &str = "gd-cht-val";
const CHT_BAR: &str = "gd-cht-bar";
const FUEL_LEFT_VAL: &str = "gd-fuel-left-val";
const FUEL_LEFT_BAR: &str = "gd-fuel-left-bar";
const FUEL_RIGHT_VAL: &str = "gd-fuel-right-val";
const FUEL_RIGHT_BAR: &str = "gd-fuel-right-bar";
const RPM_CENTER: &str = "gd-rpm-center";
const CHT_CENTER: &str = "gd-cht-center";
const RPM_ARC: &str = "gd-rpm-arc";
const CHT_ARC: &str = "gd-cht-arc";
const STATUS_RPM: &str = "gd-status-rpm";
const STATUS_CHT: &str = "gd-status-cht";
const STATUS_FUEL: &str = "gd-status-fuel";

const STYLESHEET: &str = r"
#glasspanel.glass-host { background:#05060a; position:relative; overflow:hidden; font-family:'Segoe UI', Arial, sans-serif; }
.glass-dashboard { display:flex; flex-direction:column; gap:0.75rem; color:#e6f8ff; }
.gd-row { display:flex; flex-wrap:wrap; gap:0.75rem; }
.gd-card { flex:1 1 0; min-width:140px; background:linear-gradient(135deg, rgba(0,40,60,0.6), rgba(0,15,25,0.9)); border:1px solid rgba(0,255,255,0.15); border-radius:12px; padding:10px 12px; }
.gd-card.wide, .gd-card.span2 { flex:2 1 0; }
.gd-card.radial { display:flex; align-items:center; justify-content:center; max-width:200px; }
.gd-label { font-size:0.70rem; letter-spacing:1px; color:#6ddfff; }
.gd-value { font-size:1.4rem; font-weight:600; margin-top:2px; text-shadow:0 0 6px #00eaff; }
.gd-bar { height:10px; margin-top:6px; background:#101820; border-radius:6px; overflow:hidden; }
.gd-bar.small { height:8px; }
.gd-bar-fill { height:100%; width:0%; background:linear-gradient(90deg,#00ffc8,#00b0ff); transition:width 0.18s ease; }
.gd-bar-fill.grad-hot { background:linear-gradient(90deg,#2bff5e,#ffcf00,#ff2b2b); }
.gd-bar-fill.grad-fuel { background:linear-gradient(90deg,#5eff8e,#00d8ff); }
.radial-bg { fill:rgba(0,10,20,0.6); stroke:#062a33; stroke-width:2; }
.radial-track { fill:none; stroke:#0d2e38; stroke-width:10; }
.radial-track.inner { stroke-width:8; }
.radial-arc { fill:none; stroke-width:10; stroke-linecap:round; transform:rotate(-90deg); transform-origin:70px 70px; transition:stroke-dashoffset 0.25s ease; }
.radial-arc.cht { stroke-width:8; }
.radial-text { font-size:14px; fill:#c7f7ff; font-weight:600; }
.radial-subtext { font-size:11px; fill:#ffe2d0; font-weight:500; }
.gd-status-grid { display:flex; gap:0.5rem; margin-top:0.5rem; }
.gd-status { flex:1 1 0; text-align:center; padding:6px 4px; font-size:0.75rem; border:1px solid #0b4250; border-radius:8px; }
.gd-status.ok { color:#6dffb1; }
.gd-status.warn { color:#ffe27a; }
.gd-status.alarm { color:#ff7878; animation:pulse 1.1s infinite; }
@keyframes pulse { 0%,100% { filter:drop-shadow(0 0 2px #ff3a3a); } 50% { filter:drop-shadow(0 0 8px #ff3a3a); } }
";

/// Mutable parts of one element.
#[derive(Debug, Clone, Default, PartialEq)]
struct Element {
    text: String,
    width: Option<String>,
    class: Option<String>,
    attrs: BTreeMap<&'static str, String>,
}

/// HTML document renderer.
#[derive(Debug, Default)]
pub struct HtmlRenderer {
    styles: Vec<(String, String)>,
    elements: BTreeMap<&'static str, Element>,
    mounted: bool,
}

impl HtmlRenderer {
    /// Create an unmounted renderer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the template has been built.
    #[must_use]
    pub fn is_mounted(&self) -> bool {
        self.mounted
    }

    /// Add a stylesheet unless one with the same id is already present.
    /// Returns whether it was added.
    pub fn inject_stylesheet(&mut self, id: &str, css: &str) -> bool {
        if self.styles.iter().any(|(existing, _)| existing == id) {
            return false;
        }
        self.styles.push((id.to_string(), css.to_string()));
        true
    }

    /// Number of stylesheets in the document head.
    #[must_use]
    pub fn stylesheet_count(&self) -> usize {
        self.styles.len()
    }

    /// Text content of an element.
    #[must_use]
    pub fn text(&self, id: &str) -> Option<&str> {
        self.elements.get(id).map(|e| e.text.as_str())
    }

    /// Inline width of a bar element.
    #[must_use]
    pub fn width(&self, id: &str) -> Option<&str> {
        self.elements.get(id).and_then(|e| e.width.as_deref())
    }

    /// Class list of an element.
    #[must_use]
    pub fn class(&self, id: &str) -> Option<&str> {
        self.elements.get(id).and_then(|e| e.class.as_deref())
    }

    /// Attribute of an element.
    #[must_use]
    pub fn attr(&self, id: &str, name: &str) -> Option<&str> {
        self.elements
            .get(id)
            .and_then(|e| e.attrs.get(name))
            .map(String::as_str)
    }

    /// Serialize the whole document.
    #[must_use]
    pub fn to_html(&self) -> String {
        let mut out = String::from("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n");
        for (id, css) in &self.styles {
            let _ = writeln!(out, "<style id=\"{id}\">{css}</style>");
        }
        out.push_str("</head>\n<body>\n");
        let _ = writeln!(out, "<div id=\"{HOST_ID}\" class=\"glass-host\">");
        if self.mounted {
            self.write_template(&mut out);
        }
        out.push_str("</div>\n</body>\n</html>\n");
        out
    }

    fn el(&mut self, id: &str) -> Result<&mut Element> {
        self.elements
            .get_mut(id)
            .ok_or_else(|| Error::render(format!("element #{id} missing from template")))
    }

    fn set_text(&mut self, id: &str, text: &str) -> Result<()> {
        self.el(id)?.text = text.to_string();
        Ok(())
    }

    fn set_width(&mut self, id: &str, width: String) -> Result<()> {
        self.el(id)?.width = Some(width);
        Ok(())
    }

    fn set_status(&mut self, id: &str, status: Status) -> Result<()> {
        self.el(id)?.class = Some(format!("gd-status {status}"));
        Ok(())
    }

    fn set_attr(&mut self, id: &str, name: &'static str, value: String) -> Result<()> {
        self.el(id)?.attrs.insert(name, value);
        Ok(())
    }

    fn build_elements(&mut self) {
        let placeholders = [
            (RPM_VAL, "----"),
            (CHT_VAL, "---°F"),
            (FUEL_LEFT_VAL, "--.- gal"),
            (FUEL_RIGHT_VAL, "--.- gal"),
            (RPM_CENTER, "RPM"),
            (CHT_CENTER, "CHT"),
            (STATUS_RPM, "RPM"),
            (STATUS_CHT, "CHT"),
            (STATUS_FUEL, "FUEL"),
        ];
        for (id, text) in placeholders {
            self.elements.insert(
                id,
                Element {
                    text: text.to_string(),
                    ..Element::default()
                },
            );
        }
        for id in [STATUS_RPM, STATUS_CHT, STATUS_FUEL] {
            if let Some(e) = self.elements.get_mut(id) {
                e.class = Some("gd-status".to_string());
            }
        }
        for id in [RPM_BAR, CHT_BAR, FUEL_LEFT_BAR, FUEL_RIGHT_BAR] {
            self.elements.insert(
                id,
                Element {
                    width: Some("0%".to_string()),
                    ..Element::default()
                },
            );
        }

        // Arcs start fully hidden: dash offset equals the circumference
        for (id, r) in [(RPM_ARC, RPM_ARC_RADIUS), (CHT_ARC, CHT_ARC_RADIUS)] {
            let circ = arc_circumference(r).to_string();
            let mut arc = Element::default();
            arc.attrs.insert("stroke-dasharray", circ.clone());
            arc.attrs.insert("stroke-dashoffset", circ);
            self.elements.insert(id, arc);
        }
    }

    fn text_of(&self, id: &str) -> String {
        escape(self.text(id).unwrap_or_default())
    }

    fn bar(&self, id: &str, extra: &str) -> String {
        let width = self.width(id).unwrap_or("0%");
        format!("<div class=\"gd-bar-fill{extra}\" id=\"{id}\" style=\"width:{width}\"></div>")
    }

    fn arc(&self, id: &str, class: &str, r: f64, gradient: &str) -> String {
        let dasharray = self.attr(id, "stroke-dasharray").unwrap_or_default();
        let dashoffset = self.attr(id, "stroke-dashoffset").unwrap_or_default();
        format!(
            "<circle class=\"radial-arc {class}\" id=\"{id}\" cx=\"70\" cy=\"70\" r=\"{r}\" \
             stroke=\"url(#{gradient})\" stroke-dasharray=\"{dasharray}\" stroke-dashoffset=\"{dashoffset}\" />"
        )
    }

    fn status(&self, id: &str) -> String {
        let class = self.class(id).unwrap_or("gd-status");
        format!("<div class=\"{class}\" id=\"{id}\">{}</div>", self.text_of(id))
    }

    fn write_template(&self, out: &mut String) {
        let _ = write!(
            out,
            r##"<div class="glass-dashboard">
<div class="gd-row">
<div class="gd-card wide"><div class="gd-label">RPM</div><div class="gd-value" id="{RPM_VAL}">{rpm}</div><div class="gd-bar">{rpm_bar}</div></div>
<div class="gd-card"><div class="gd-label">CHT</div><div class="gd-value" id="{CHT_VAL}">{cht}</div><div class="gd-bar">{cht_bar}</div></div>
<div class="gd-card radial">
<svg id="gd-engine-radial" viewBox="0 0 140 140">
<defs>
<linearGradient id="rpmGrad" x1="0%" y1="0%" x2="100%" y2="0%"><stop offset="0%" stop-color="#00f6ff" /><stop offset="100%" stop-color="#007bff" /></linearGradient>
<linearGradient id="chtGrad" x1="0%" y1="0%" x2="100%" y2="0%"><stop offset="0%" stop-color="#2bff5e" /><stop offset="70%" stop-color="#ffb300" /><stop offset="100%" stop-color="#ff2b2b" /></linearGradient>
</defs>
<circle class="radial-bg" cx="70" cy="70" r="62" />
<circle class="radial-track" cx="70" cy="70" r="54" />
{rpm_arc}
<circle class="radial-track inner" cx="70" cy="70" r="40" />
{cht_arc}
<text x="70" y="66" text-anchor="middle" class="radial-text" id="{RPM_CENTER}">{rpm_center}</text>
<text x="70" y="86" text-anchor="middle" class="radial-subtext" id="{CHT_CENTER}">{cht_center}</text>
</svg>
</div>
</div>
<div class="gd-row">
<div class="gd-card"><div class="gd-label">FUEL L</div><div class="gd-value" id="{FUEL_LEFT_VAL}">{left}</div><div class="gd-bar small">{left_bar}</div></div>
<div class="gd-card"><div class="gd-label">FUEL R</div><div class="gd-value" id="{FUEL_RIGHT_VAL}">{right}</div><div class="gd-bar small">{right_bar}</div></div>
<div class="gd-card span2"><div class="gd-label">STATUS</div><div class="gd-status-grid" id="gd-status">{status_rpm}{status_cht}{status_fuel}</div></div>
</div>
</div>
"##,
            rpm = self.text_of(RPM_VAL),
            rpm_bar = self.bar(RPM_BAR, ""),
            cht = self.text_of(CHT_VAL),
            cht_bar = self.bar(CHT_BAR, " grad-hot"),
            rpm_arc = self.arc(RPM_ARC, "rpm", RPM_ARC_RADIUS, "rpmGrad"),
            cht_arc = self.arc(CHT_ARC, "cht", CHT_ARC_RADIUS, "chtGrad"),
            rpm_center = self.text_of(RPM_CENTER),
            cht_center = self.text_of(CHT_CENTER),
            left = self.text_of(FUEL_LEFT_VAL),
            left_bar = self.bar(FUEL_LEFT_BAR, " grad-fuel"),
            right = self.text_of(FUEL_RIGHT_VAL),
            right_bar = self.bar(FUEL_RIGHT_BAR, " grad-fuel"),
            status_rpm = self.status(STATUS_RPM),
            status_cht = self.status(STATUS_CHT),
            status_fuel = self.status(STATUS_FUEL),
        );
    }
}

impl Renderer for HtmlRenderer {
    fn mount(&mut self) -> Result<()> {
        if !self.mounted {
            debug!("building dashboard template");
            self.build_elements();
            self.mounted = true;
        }
        self.inject_stylesheet(STYLESHEET_ID, STYLESHEET);
        Ok(())
    }

    fn apply(&mut self, state: &RenderState) -> Result<()> {
        if !self.mounted {
            return Err(Error::render("HTML renderer is not mounted"));
        }

        self.set_text(RPM_VAL, &state.rpm.text)?;
        self.set_text(CHT_VAL, &state.cht.text)?;
        self.set_text(FUEL_LEFT_VAL, &state.fuel_left.text)?;
        self.set_text(FUEL_RIGHT_VAL, &state.fuel_right.text)?;
        self.set_text(RPM_CENTER, &state.rpm.text)?;
        self.set_text(CHT_CENTER, &state.cht.text)?;

        self.set_width(RPM_BAR, state.rpm.bar_width())?;
        self.set_width(CHT_BAR, state.cht.bar_width())?;
        self.set_width(FUEL_LEFT_BAR, state.fuel_left.bar_width())?;
        self.set_width(FUEL_RIGHT_BAR, state.fuel_right.bar_width())?;

        self.set_attr(RPM_ARC, "stroke-dashoffset", format_fixed(state.rpm_arc_offset, 2))?;
        self.set_attr(CHT_ARC, "stroke-dashoffset", format_fixed(state.cht_arc_offset, 2))?;

        self.set_status(STATUS_RPM, state.rpm_status)?;
        self.set_status(STATUS_CHT, state.cht_status)?;
        self.set_status(STATUS_FUEL, state.fuel_status)?;
        Ok(())
    }
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::Readout;

    fn readout(value: f64, pct: f64, text: &str) -> Readout {
        Readout {
            value,
            pct,
            text: text.to_string(),
        }
    }

    fn sample_state() -> RenderState {
        RenderState {
            rpm: readout(2430.0, 0.9, "2430"),
            cht: readout(250.0, 0.5, "250°F"),
            fuel_left: readout(10.75, 0.5, "10.8 gal"),
            fuel_right: readout(5.375, 0.25, "5.4 gal"),
            rpm_arc_offset: arc_circumference(RPM_ARC_RADIUS) * 0.1,
            cht_arc_offset: arc_circumference(CHT_ARC_RADIUS) * 0.5,
            rpm_status: Status::Warn,
            cht_status: Status::Ok,
            fuel_status: Status::Ok,
            initial: false,
        }
    }

    #[test]
    fn test_stylesheet_injected_once() {
        let mut html = HtmlRenderer::new();
        html.mount().unwrap();
        html.mount().unwrap();
        assert_eq!(html.stylesheet_count(), 1);
        assert!(!html.inject_stylesheet(STYLESHEET_ID, "body {}"));
        assert_eq!(html.to_html().matches(STYLESHEET_ID).count(), 1);
    }

    #[test]
    fn test_mount_initializes_hidden_arcs() {
        let mut html = HtmlRenderer::new();
        html.mount().unwrap();

        let circ = arc_circumference(RPM_ARC_RADIUS).to_string();
        assert_eq!(html.attr(RPM_ARC, "stroke-dasharray"), Some(circ.as_str()));
        assert_eq!(html.attr(RPM_ARC, "stroke-dashoffset"), Some(circ.as_str()));
        assert_eq!(html.text(RPM_VAL), Some("----"));
        assert_eq!(html.width(RPM_BAR), Some("0%"));
    }

    #[test]
    fn test_apply_before_mount_fails() {
        let mut html = HtmlRenderer::new();
        assert!(html.apply(&sample_state()).is_err());
    }

    #[test]
    fn test_apply_updates_elements() {
        let mut html = HtmlRenderer::new();
        html.mount().unwrap();
        html.apply(&sample_state()).unwrap();

        assert_eq!(html.text(RPM_VAL), Some("2430"));
        assert_eq!(html.text(CHT_CENTER), Some("250°F"));
        assert_eq!(html.text(FUEL_RIGHT_VAL), Some("5.4 gal"));
        assert_eq!(html.width(FUEL_LEFT_BAR), Some("50.0%"));
        assert_eq!(html.attr(RPM_ARC, "stroke-dashoffset"), Some("33.93"));
        assert_eq!(html.attr(CHT_ARC, "stroke-dashoffset"), Some("125.66"));
        assert_eq!(html.class(STATUS_RPM), Some("gd-status warn"));
        assert_eq!(html.class(STATUS_FUEL), Some("gd-status ok"));
    }

    #[test]
    fn test_to_html_contains_frame() {
        let mut html = HtmlRenderer::new();
        html.mount().unwrap();
        html.apply(&sample_state()).unwrap();

        let doc = html.to_html();
        assert!(doc.starts_with("<!DOCTYPE html>"));
        assert!(doc.contains("id=\"gd-rpm-val\">2430</div>"));
        assert!(doc.contains("style=\"width:90.0%\""));
        assert!(doc.contains("class=\"gd-status warn\" id=\"gd-status-rpm\""));
        assert!(doc.contains("stroke-dashoffset=\"125.66\""));
    }

    #[test]
    fn test_unmounted_document_has_empty_host() {
        let html = HtmlRenderer::new();
        let doc = html.to_html();
        assert!(doc.contains("<div id=\"glasspanel\" class=\"glass-host\">\n</div>"));
        assert_eq!(html.stylesheet_count(), 0);
    }

    #[test]
    fn test_escape() {
        assert_eq!(escape("a<b>&c"), "a&lt;b&gt;&amp;c");
    }
}
