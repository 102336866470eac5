//! Sanitized `DomNode` trees → egui widgets.
//!
//! Block elements become headings, paragraphs, lists and grids; inline
//! content is flattened into runs laid out in a wrapped row. Reference
//! markers show their tooltip on hover.

use eframe::egui;

use wisdom_browser::content::annotate::{tooltip_of, REFERENCE_CLASS};
use wisdom_browser::dom::parser::parse_fragment;
use wisdom_browser::dom::DomNode;
use wisdom_browser::prefs::ReaderFont;

/// Family name registered when a serif font is found on the system.
pub const SERIF_FAMILY: &str = "serif";

const BLOCK_TAGS: &[&str] = &[
    "p", "div", "blockquote", "ul", "ol", "li", "table", "h1", "h2", "h3", "h4", "h5", "h6",
    "pre", "hr", "figure", "figcaption",
];

fn is_block(node: &DomNode) -> bool {
    BLOCK_TAGS.contains(&node.tag.as_str())
}

/// Font settings for rendered content.
#[derive(Clone)]
pub struct ReaderStyle {
    pub family: egui::FontFamily,
    pub size: f32,
}

impl ReaderStyle {
    pub fn new(font: ReaderFont, serif_available: bool) -> Self {
        let family = match font {
            ReaderFont::Sans => egui::FontFamily::Proportional,
            ReaderFont::Mono => egui::FontFamily::Monospace,
            ReaderFont::Serif if serif_available => egui::FontFamily::Name(SERIF_FAMILY.into()),
            ReaderFont::Serif => egui::FontFamily::Proportional,
        };
        Self { family, size: 15.0 }
    }

    fn text(&self, text: &str) -> egui::RichText {
        egui::RichText::new(text).family(self.family.clone()).size(self.size)
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Marks {
    bold: bool,
    italic: bool,
    code: bool,
}

#[derive(Debug, Clone)]
enum Run {
    Text(String, Marks),
    Link { text: String, href: String },
    Reference { text: String, tooltip: Option<String> },
    Break,
}

fn collect_runs(node: &DomNode, marks: Marks, out: &mut Vec<Run>) {
    if node.is_text() {
        out.push(Run::Text(node.text.clone(), marks));
        return;
    }
    if node.has_class(REFERENCE_CLASS) {
        out.push(Run::Reference {
            text: node.collect_text(),
            tooltip: tooltip_of(node).map(str::to_string),
        });
        return;
    }
    let mut marks = marks;
    match node.tag.as_str() {
        "br" => {
            out.push(Run::Break);
            return;
        }
        "a" => {
            if let Some(href) = node.attr("href") {
                out.push(Run::Link {
                    text: node.collect_text(),
                    href: href.to_string(),
                });
                return;
            }
        }
        "img" => {
            let alt = node.attr("alt").unwrap_or("image");
            out.push(Run::Text(format!("[{}]", alt), Marks { italic: true, ..marks }));
            return;
        }
        "b" | "strong" | "h1" | "h2" | "h3" | "th" => marks.bold = true,
        "i" | "em" => marks.italic = true,
        "code" | "pre" => marks.code = true,
        _ => {}
    }
    for child in &node.children {
        collect_runs(child, marks, out);
    }
}

fn draw_runs(ui: &mut egui::Ui, runs: &[Run], style: &ReaderStyle, clicked_link: &mut Option<String>) {
    if runs.iter().all(|r| matches!(r, Run::Text(t, _) if t.trim().is_empty())) {
        return;
    }
    ui.horizontal_wrapped(|ui| {
        ui.spacing_mut().item_spacing.x = 0.0;
        for run in runs {
            match run {
                Run::Text(text, marks) => {
                    let mut rt = style.text(text);
                    if marks.bold {
                        rt = rt.strong();
                    }
                    if marks.italic {
                        rt = rt.italics();
                    }
                    if marks.code {
                        rt = rt.code();
                    }
                    ui.label(rt);
                }
                Run::Link { text, href } => {
                    let rt = style
                        .text(text)
                        .color(egui::Color32::from_rgb(0, 100, 200))
                        .underline();
                    let link = ui.add(egui::Label::new(rt).sense(egui::Sense::click()));
                    if link.clicked() {
                        *clicked_link = Some(href.clone());
                    }
                    link.on_hover_text(href);
                }
                Run::Reference { text, tooltip } => {
                    let rt = style
                        .text(text)
                        .underline()
                        .color(egui::Color32::from_rgb(120, 80, 20));
                    let marker = ui.add(egui::Label::new(rt).sense(egui::Sense::hover()));
                    if let Some(html) = tooltip {
                        marker.on_hover_ui(|ui| {
                            ui.set_max_width(320.0);
                            let mut ignored = None;
                            render_node(ui, &parse_fragment(html), style, &mut ignored);
                        });
                    }
                }
                Run::Break => ui.end_row(),
            }
        }
    });
}

/// Render a node's children, grouping inline runs into paragraphs.
pub fn render_node(ui: &mut egui::Ui, node: &DomNode, style: &ReaderStyle, clicked_link: &mut Option<String>) {
    let mut inline: Vec<Run> = Vec::new();
    for child in &node.children {
        if is_block(child) {
            draw_runs(ui, &inline, style, clicked_link);
            inline.clear();
            render_block(ui, child, style, clicked_link);
        } else {
            collect_runs(child, Marks::default(), &mut inline);
        }
    }
    draw_runs(ui, &inline, style, clicked_link);
}

fn render_block(ui: &mut egui::Ui, node: &DomNode, style: &ReaderStyle, clicked_link: &mut Option<String>) {
    match node.tag.as_str() {
        tag @ ("h1" | "h2" | "h3" | "h4" | "h5" | "h6") => {
            let text = node.collect_text();
            if text.trim().is_empty() {
                return;
            }
            let size = match tag {
                "h1" => 26.0,
                "h2" => 22.0,
                "h3" => 19.0,
                _ => 17.0,
            };
            ui.add_space(6.0);
            ui.label(style.text(text.trim()).size(size).strong());
            ui.add_space(4.0);
        }
        "hr" => {
            ui.separator();
        }
        "ul" | "ol" => {
            let ordered = node.tag == "ol";
            let mut n = 0;
            for item in node.children.iter().filter(|c| c.tag == "li") {
                n += 1;
                let bullet = if ordered { format!("{}. ", n) } else { "• ".to_string() };
                ui.horizontal_top(|ui| {
                    ui.label(style.text(&bullet));
                    ui.vertical(|ui| render_node(ui, item, style, clicked_link));
                });
            }
        }
        "blockquote" => {
            egui::Frame::none()
                .inner_margin(egui::Margin {
                    left: 12.0,
                    ..Default::default()
                })
                .stroke(egui::Stroke::new(1.0, ui.visuals().weak_text_color()))
                .show(ui, |ui| render_node(ui, node, style, clicked_link));
        }
        "table" => render_table(ui, node, style, clicked_link),
        _ => {
            render_node(ui, node, style, clicked_link);
            if node.tag == "p" {
                ui.add_space(6.0);
            }
        }
    }
}

fn render_table(ui: &mut egui::Ui, table: &DomNode, style: &ReaderStyle, clicked_link: &mut Option<String>) {
    let rows = table.find_all(&|n| n.tag == "tr");
    let id = ui.next_auto_id();
    egui::Grid::new(id).striped(true).show(ui, |ui| {
        for row in rows {
            for cell in row.children.iter().filter(|c| c.tag == "td" || c.tag == "th") {
                ui.vertical(|ui| render_node(ui, cell, style, clicked_link));
            }
            ui.end_row();
        }
    });
}
