//! Box layout of LaTeX math into an SVG fragment.
//!
//! The formula is first converted to MathML with `latex2mathml`, the MathML is
//! read into a small element tree with `quick-xml`, and the tree is laid out as
//! nested boxes measured in ems of the requested font size. Glyph advances are
//! estimated from a fixed table; the raster path crops to real ink, so the
//! estimates only have to be roughly right. Tabular markup (matrices, cases,
//! alignments) is rejected: those formulas belong to the browser renderer.

use crate::error::TypesetError;
use crate::math::{html_escape, sanitize_mathml};
use crate::ports::{Layout, Typesetter};
use crate::style::Color;

use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

use std::fmt::Write;

const FONT_FAMILY: &str = "'DejaVu Serif', 'STIX Two Math', 'Latin Modern Math', serif";

const SCRIPT_SCALE: f32 = 0.7;
const FRACTION_SCALE: f32 = 0.85;
const ROOT_INDEX_SCALE: f32 = 0.5;
const ASCENT_EM: f32 = 0.75;
const DESCENT_EM: f32 = 0.25;
const AXIS_EM: f32 = 0.25;
const RULE_EM: f32 = 0.05;
const GAP_EM: f32 = 0.12;

/// Typesetter backed by `latex2mathml`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MathmlTypesetter;

impl Typesetter for MathmlTypesetter {
    fn typeset(&self, tex: &str, font_size: f32, color: Color) -> Result<Layout, TypesetError> {
        let mathml = latex2mathml::latex_to_mathml(tex, latex2mathml::DisplayStyle::Inline)
            .map_err(|err| TypesetError::Parse(format!("{err:?}")))?;
        layout_mathml(&sanitize_mathml(&mathml), font_size, color)
    }
}

/// Lays out a MathML document. Exposed separately so the layout rules can be
/// exercised without going through the LaTeX converter.
pub(crate) fn layout_mathml(
    mathml: &str,
    font_size: f32,
    color: Color,
) -> Result<Layout, TypesetError> {
    let root = parse_mathml(mathml)?;
    let engine = Engine {
        color: color.to_string(),
    };
    let boxed = engine.layout(&root, Ctx::root(font_size))?;
    Ok(Layout {
        width: boxed.width,
        ascent: boxed.ascent,
        descent: boxed.descent,
        svg: boxed.svg,
    })
}

#[derive(Debug)]
enum Node {
    Element(Element),
    Text(String),
}

#[derive(Debug)]
struct Element {
    name: String,
    attrs: Vec<(String, String)>,
    children: Vec<Node>,
}

impl Element {
    fn from_start(start: &BytesStart<'_>) -> Result<Self, TypesetError> {
        let name = String::from_utf8_lossy(start.local_name().as_ref()).into_owned();
        let mut attrs = Vec::new();
        for attr in start.attributes() {
            let attr = attr.map_err(|err| TypesetError::Markup(err.to_string()))?;
            let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
            let value = attr
                .unescape_value()
                .map_err(|err| TypesetError::Markup(err.to_string()))?
                .into_owned();
            attrs.push((key, value));
        }
        Ok(Self {
            name,
            attrs,
            children: Vec::new(),
        })
    }

    fn attr(&self, key: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.as_str())
    }

    fn elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|child| match child {
            Node::Element(element) => Some(element),
            Node::Text(_) => None,
        })
    }

    fn text(&self) -> String {
        let mut text = String::new();
        for child in &self.children {
            match child {
                Node::Text(value) => text.push_str(value),
                Node::Element(element) => text.push_str(&element.text()),
            }
        }
        text
    }

    fn exact_children<const N: usize>(&self) -> Result<[&Element; N], TypesetError> {
        let children: Vec<&Element> = self.elements().collect();
        let count = children.len();
        children.try_into().map_err(|_| {
            TypesetError::Markup(format!(
                "<{}> expects {N} children, found {count}",
                self.name
            ))
        })
    }
}

fn parse_mathml(mathml: &str) -> Result<Element, TypesetError> {
    let mut reader = Reader::from_str(mathml);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<Element> = Vec::new();
    let mut root = None;

    loop {
        let event = reader
            .read_event()
            .map_err(|err| TypesetError::Markup(err.to_string()))?;
        match event {
            Event::Start(start) => stack.push(Element::from_start(&start)?),
            Event::Empty(start) => {
                let element = Element::from_start(&start)?;
                attach(&mut stack, &mut root, element);
            }
            Event::End(_) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| TypesetError::Markup("unbalanced closing tag".to_string()))?;
                attach(&mut stack, &mut root, element);
            }
            Event::Text(text) => {
                let value = text
                    .unescape()
                    .map_err(|err| TypesetError::Markup(err.to_string()))?;
                if let Some(parent) = stack.last_mut() {
                    parent.children.push(Node::Text(value.into_owned()));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err(TypesetError::Markup("unclosed element".to_string()));
    }
    root.ok_or_else(|| TypesetError::Markup("empty document".to_string()))
}

fn attach(stack: &mut [Element], root: &mut Option<Element>, element: Element) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(Node::Element(element)),
        None => *root = Some(element),
    }
}

#[derive(Debug, Clone, Copy)]
struct Ctx {
    size: f32,
    script: bool,
}

impl Ctx {
    fn root(size: f32) -> Self {
        Self {
            size,
            script: false,
        }
    }

    fn scaled(self, factor: f32) -> Self {
        Self {
            size: self.size * factor,
            script: true,
        }
    }

    fn em(self, amount: f32) -> f32 {
        self.size * amount
    }
}

#[derive(Debug, Default)]
struct MathBox {
    width: f32,
    ascent: f32,
    descent: f32,
    svg: String,
}

impl MathBox {
    fn height(&self) -> f32 {
        self.ascent + self.descent
    }

    fn place_into(&self, out: &mut String, x: f32, y: f32) {
        if self.svg.is_empty() {
            return;
        }
        let _ = write!(
            out,
            r#"<g transform="translate({x:.2},{y:.2})">{}</g>"#,
            self.svg
        );
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Glyphs {
    Italic,
    Upright,
}

struct Engine {
    color: String,
}

impl Engine {
    fn layout(&self, element: &Element, ctx: Ctx) -> Result<MathBox, TypesetError> {
        match element.name.as_str() {
            "math" | "mrow" | "mstyle" | "mpadded" | "menclose" | "mfenced" => {
                self.row(element.elements(), ctx)
            }
            "semantics" => match element.elements().next() {
                Some(first) => self.layout(first, ctx),
                None => Ok(MathBox::default()),
            },
            "annotation" | "annotation-xml" | "none" | "mprescripts" => Ok(MathBox::default()),
            "mphantom" => {
                let mut phantom = self.row(element.elements(), ctx)?;
                phantom.svg.clear();
                Ok(phantom)
            }
            "mi" => {
                let text = element.text();
                let glyphs = if text.chars().count() == 1 && element.attr("mathvariant") != Some("normal") {
                    Glyphs::Italic
                } else {
                    Glyphs::Upright
                };
                Ok(self.glyphs(&text, ctx, glyphs, 0.0, 0.0))
            }
            "mn" | "mtext" | "ms" => Ok(self.glyphs(&element.text(), ctx, Glyphs::Upright, 0.0, 0.0)),
            "mo" => Ok(self.operator(&element.text(), ctx)),
            "mspace" => Ok(MathBox {
                width: element
                    .attr("width")
                    .map(|width| parse_length(width, ctx))
                    .unwrap_or(0.0),
                ..MathBox::default()
            }),
            "msup" => {
                let [base, sup] = element.exact_children()?;
                self.scripts(base, None, Some(sup), ctx)
            }
            "msub" => {
                let [base, sub] = element.exact_children()?;
                self.scripts(base, Some(sub), None, ctx)
            }
            "msubsup" => {
                let [base, sub, sup] = element.exact_children()?;
                self.scripts(base, Some(sub), Some(sup), ctx)
            }
            "mover" => {
                let [base, over] = element.exact_children()?;
                self.stack(base, None, Some(over), ctx)
            }
            "munder" => {
                let [base, under] = element.exact_children()?;
                self.stack(base, Some(under), None, ctx)
            }
            "munderover" => {
                let [base, under, over] = element.exact_children()?;
                self.stack(base, Some(under), Some(over), ctx)
            }
            "mfrac" => {
                let [num, den] = element.exact_children()?;
                let ruled = element
                    .attr("linethickness")
                    .is_none_or(|value| parse_length(value, ctx) > 0.0);
                self.fraction(num, den, ruled, ctx)
            }
            "msqrt" => {
                let radicand = self.row(element.elements(), ctx)?;
                Ok(self.radical(radicand, None, ctx))
            }
            "mroot" => {
                let [radicand, index] = element.exact_children()?;
                let radicand = self.layout(radicand, ctx)?;
                let index = self.layout(index, ctx.scaled(ROOT_INDEX_SCALE))?;
                Ok(self.radical(radicand, Some(index), ctx))
            }
            "merror" => Err(TypesetError::Parse(element.text())),
            other => Err(TypesetError::Unsupported(other.to_string())),
        }
    }

    fn row<'a>(
        &self,
        children: impl Iterator<Item = &'a Element>,
        ctx: Ctx,
    ) -> Result<MathBox, TypesetError> {
        let mut row = MathBox::default();
        for child in children {
            let child = self.layout(child, ctx)?;
            child.place_into(&mut row.svg, row.width, 0.0);
            row.width += child.width;
            row.ascent = row.ascent.max(child.ascent);
            row.descent = row.descent.max(child.descent);
        }
        Ok(row)
    }

    fn glyphs(&self, text: &str, ctx: Ctx, glyphs: Glyphs, lspace: f32, rspace: f32) -> MathBox {
        let text = text.trim();
        if text.is_empty() {
            return MathBox {
                width: lspace + rspace,
                ..MathBox::default()
            };
        }
        let advance: f32 = text.chars().map(advance_em).sum::<f32>() * ctx.size;
        let style = match glyphs {
            Glyphs::Italic => r#" font-style="italic""#,
            Glyphs::Upright => "",
        };
        let svg = format!(
            r#"<text x="{lspace:.2}" y="0" font-family="{FONT_FAMILY}" font-size="{:.2}"{style} fill="{}">{}</text>"#,
            ctx.size,
            self.color,
            html_escape(text)
        );
        MathBox {
            width: lspace + advance + rspace,
            ascent: ctx.em(ASCENT_EM),
            descent: ctx.em(DESCENT_EM),
            svg,
        }
    }

    fn operator(&self, text: &str, ctx: Ctx) -> MathBox {
        let (lspace, rspace) = if ctx.script {
            (0.0, 0.0)
        } else {
            match operator_class(text.trim()) {
                OperatorClass::Relation => (ctx.em(0.28), ctx.em(0.28)),
                OperatorClass::Binary => (ctx.em(0.22), ctx.em(0.22)),
                OperatorClass::Punctuation => (0.0, ctx.em(0.17)),
                OperatorClass::Ordinary => (0.0, 0.0),
            }
        };
        self.glyphs(text, ctx, Glyphs::Upright, lspace, rspace)
    }

    fn scripts(
        &self,
        base: &Element,
        sub: Option<&Element>,
        sup: Option<&Element>,
        ctx: Ctx,
    ) -> Result<MathBox, TypesetError> {
        let base = self.layout(base, ctx)?;
        let small = ctx.scaled(SCRIPT_SCALE);
        let sup = sup.map(|sup| self.layout(sup, small)).transpose()?;
        let sub = sub.map(|sub| self.layout(sub, small)).transpose()?;

        let sup_shift = (base.ascent * 0.55).max(ctx.em(0.38));
        let sub_shift = if sup.is_some() {
            ctx.em(0.3)
        } else {
            ctx.em(0.2)
        };

        let mut out = MathBox {
            width: base.width,
            ascent: base.ascent,
            descent: base.descent,
            svg: String::new(),
        };
        base.place_into(&mut out.svg, 0.0, 0.0);
        let x = base.width + ctx.em(0.04);
        let mut script_width: f32 = 0.0;
        if let Some(sup) = &sup {
            sup.place_into(&mut out.svg, x, -sup_shift);
            out.ascent = out.ascent.max(sup_shift + sup.ascent);
            script_width = script_width.max(sup.width);
        }
        if let Some(sub) = &sub {
            sub.place_into(&mut out.svg, x, sub_shift);
            out.descent = out.descent.max(sub_shift + sub.descent);
            script_width = script_width.max(sub.width);
        }
        out.width = x + script_width;
        Ok(out)
    }

    fn stack(
        &self,
        base: &Element,
        under: Option<&Element>,
        over: Option<&Element>,
        ctx: Ctx,
    ) -> Result<MathBox, TypesetError> {
        let base = self.layout(base, ctx)?;
        let small = ctx.scaled(SCRIPT_SCALE);
        let over = over.map(|over| self.layout(over, small)).transpose()?;
        let under = under.map(|under| self.layout(under, small)).transpose()?;
        let gap = ctx.em(0.1);

        let width = [Some(&base), over.as_ref(), under.as_ref()]
            .into_iter()
            .flatten()
            .map(|part| part.width)
            .fold(0.0_f32, f32::max);
        let center = |part: &MathBox| (width - part.width) / 2.0;

        let mut out = MathBox {
            width,
            ascent: base.ascent,
            descent: base.descent,
            svg: String::new(),
        };
        base.place_into(&mut out.svg, center(&base), 0.0);
        if let Some(over) = &over {
            let y = -(base.ascent + gap + over.descent);
            over.place_into(&mut out.svg, center(over), y);
            out.ascent = base.ascent + gap + over.height();
        }
        if let Some(under) = &under {
            let y = base.descent + gap + under.ascent;
            under.place_into(&mut out.svg, center(under), y);
            out.descent = base.descent + gap + under.height();
        }
        Ok(out)
    }

    fn fraction(
        &self,
        num: &Element,
        den: &Element,
        ruled: bool,
        ctx: Ctx,
    ) -> Result<MathBox, TypesetError> {
        let inner = ctx.scaled(FRACTION_SCALE);
        let num = self.layout(num, inner)?;
        let den = self.layout(den, inner)?;
        let axis = ctx.em(AXIS_EM);
        let gap = ctx.em(GAP_EM);
        let rule = ctx.em(RULE_EM);
        let margin = ctx.em(0.1);
        let width = num.width.max(den.width) + 2.0 * margin;

        let mut out = MathBox {
            width,
            ascent: axis + gap + num.height(),
            descent: (den.height() + gap - axis).max(0.0),
            svg: String::new(),
        };
        num.place_into(
            &mut out.svg,
            (width - num.width) / 2.0,
            -(axis + gap + num.descent),
        );
        den.place_into(
            &mut out.svg,
            (width - den.width) / 2.0,
            -axis + gap + den.ascent,
        );
        if ruled {
            let _ = write!(
                out.svg,
                r#"<line x1="{:.2}" y1="{:.2}" x2="{:.2}" y2="{:.2}" stroke="{}" stroke-width="{rule:.2}"/>"#,
                margin / 2.0,
                -axis,
                width - margin / 2.0,
                -axis,
                self.color
            );
        }
        Ok(out)
    }

    fn radical(&self, radicand: MathBox, index: Option<MathBox>, ctx: Ctx) -> MathBox {
        let rule = ctx.em(RULE_EM);
        let top = radicand.ascent + ctx.em(0.1);
        let bottom = radicand.descent;
        let offset = index
            .as_ref()
            .map(|index| index.width * 0.6)
            .unwrap_or(0.0);
        let sign_width = ctx.em(0.55);
        let body_x = offset + sign_width + ctx.em(0.05);
        let right = body_x + radicand.width + ctx.em(0.05);

        let mut out = MathBox {
            width: right + ctx.em(0.05),
            ascent: top + rule,
            descent: bottom,
            svg: String::new(),
        };
        let _ = write!(
            out.svg,
            r#"<polyline points="{:.2},{:.2} {:.2},{:.2} {:.2},{:.2} {:.2},{:.2} {:.2},{:.2}" fill="none" stroke="{}" stroke-width="{rule:.2}" stroke-linejoin="round"/>"#,
            offset + ctx.em(0.05),
            -ctx.em(0.3),
            offset + ctx.em(0.18),
            -ctx.em(0.38),
            offset + ctx.em(0.32),
            bottom,
            offset + sign_width,
            -top,
            right,
            -top,
            self.color
        );
        if let Some(index) = &index {
            index.place_into(&mut out.svg, 0.0, -(top * 0.55));
            out.ascent = out.ascent.max(top * 0.55 + index.ascent);
        }
        radicand.place_into(&mut out.svg, body_x, 0.0);
        out
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OperatorClass {
    Relation,
    Binary,
    Punctuation,
    Ordinary,
}

fn operator_class(op: &str) -> OperatorClass {
    match op {
        "=" | "<" | ">" | "≠" | "≤" | "≥" | "≈" | "≡" | "∼" | "≃" | "∝" | "→" | "←" | "⇒"
        | "⇔" | "↦" | "∈" | "∉" | "⊂" | "⊆" | ":=" => OperatorClass::Relation,
        "+" | "-" | "−" | "±" | "∓" | "×" | "÷" | "·" | "⋅" | "∗" | "∘" | "∪" | "∩" => {
            OperatorClass::Binary
        }
        "," | ";" => OperatorClass::Punctuation,
        _ => OperatorClass::Ordinary,
    }
}

fn advance_em(ch: char) -> f32 {
    match ch {
        'i' | 'j' | 'l' | 't' | 'f' | 'r' | 'I' | '!' | '|' | '.' | ',' | ';' | ':' | '\'' => 0.32,
        'm' | 'w' | 'M' | 'W' => 0.82,
        'a'..='z' => 0.52,
        'A'..='Z' => 0.68,
        '0'..='9' => 0.5,
        '(' | ')' | '[' | ']' | '{' | '}' => 0.38,
        '∑' | '∏' | '∫' | '∮' | '⋃' | '⋂' => 0.9,
        '\u{391}'..='\u{3c9}' => 0.58,
        '\u{2061}'..='\u{2064}' | '\u{338}' => 0.0,
        ch if ch.is_whitespace() => 0.25,
        _ => 0.7,
    }
}

/// Parses a MathML length (`0.167em`, `3pt`, `2px`, bare numbers as ems).
/// Layout units are px, so `px` is taken as-is and `pt` is 96/72 px.
fn parse_length(raw: &str, ctx: Ctx) -> f32 {
    let raw = raw.trim();
    let split = raw
        .find(|ch: char| !(ch.is_ascii_digit() || ch == '.' || ch == '-'))
        .unwrap_or(raw.len());
    let (number, unit) = raw.split_at(split);
    let Ok(value) = number.parse::<f32>() else {
        return 0.0;
    };
    match unit.trim() {
        "" | "em" => ctx.em(value),
        "ex" => ctx.em(value * 0.45),
        "px" => value,
        "pt" => value * 96.0 / 72.0,
        _ => 0.0,
    }
}
