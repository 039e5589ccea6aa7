//! Default layout backend using lopdf content-stream parsing
//!
//! Walks each page's content stream with a simplified text-rendering state
//! machine (BT/ET, Tf, Tm, Td, TD, T*, TL, Tj, TJ, ', ") and emits one
//! positioned [`TextItem`] per show-text run. Glyph metrics are not consulted;
//! run widths are approximated from character count and font size, which is
//! accurate enough for block grouping and annotation rectangles.

use lopdf::content::Content;
use lopdf::{Dictionary, Document, Object, ObjectId};
use std::collections::HashMap;
use tracing::{debug, warn};

use crate::layout::{ExtractError, LayoutBackend, PageContent, TextItem};

/// Approximate advance width of one glyph as a fraction of the font size
const APPROX_CHAR_WIDTH_RATIO: f64 = 0.5;

/// Approximate line height as a fraction of the font size
const APPROX_LINE_HEIGHT_RATIO: f64 = 1.1;

/// Layout backend backed by lopdf
pub struct LopdfBackend;

impl LopdfBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for LopdfBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl LayoutBackend for LopdfBackend {
    fn name(&self) -> &'static str {
        "lopdf"
    }

    fn extract(&self, data: &[u8]) -> Result<Vec<PageContent>, ExtractError> {
        let doc = Document::load_mem(data).map_err(|e| ExtractError::Parse(e.to_string()))?;

        if doc.is_encrypted() {
            return Err(ExtractError::Encrypted);
        }

        let page_ids = doc.get_pages();
        if page_ids.is_empty() {
            return Err(ExtractError::Empty);
        }

        let mut pages = Vec::with_capacity(page_ids.len());
        for (&page_number, &page_id) in page_ids.iter() {
            let (width, height) = page_dimensions(&doc, page_id);
            let text_items = match extract_page_items(&doc, page_id) {
                Ok(items) => items,
                Err(e) => {
                    // A broken page degrades to an empty page; a broken
                    // document already failed at load above.
                    warn!("page {} content unreadable: {}", page_number, e);
                    Vec::new()
                }
            };
            debug!("page {}: {} text items", page_number, text_items.len());
            pages.push(PageContent {
                page_number,
                text_items,
                width,
                height,
            });
        }

        Ok(pages)
    }
}

/// Text-rendering state carried across content-stream operations
struct TextState {
    line_x: f64,
    line_y: f64,
    cur_x: f64,
    cur_y: f64,
    font_size: f64,
    leading: f64,
    font_name: Option<String>,
}

impl TextState {
    fn new() -> Self {
        Self {
            line_x: 0.0,
            line_y: 0.0,
            cur_x: 0.0,
            cur_y: 0.0,
            font_size: 12.0,
            leading: 0.0,
            font_name: None,
        }
    }

    fn translate_line(&mut self, tx: f64, ty: f64) {
        self.line_x += tx;
        self.line_y += ty;
        self.cur_x = self.line_x;
        self.cur_y = self.line_y;
    }
}

fn extract_page_items(doc: &Document, page_id: ObjectId) -> Result<Vec<TextItem>, String> {
    let content_bytes = doc
        .get_page_content(page_id)
        .map_err(|e| e.to_string())?;
    let content = Content::decode(&content_bytes).map_err(|e| e.to_string())?;

    // Resource name (e.g. "F1") -> BaseFont, for bold/italic detection
    let fonts = page_base_fonts(doc, page_id);

    let mut state = TextState::new();
    let mut items: Vec<TextItem> = Vec::new();

    for op in &content.operations {
        match op.operator.as_str() {
            "BT" => {
                state.line_x = 0.0;
                state.line_y = 0.0;
                state.cur_x = 0.0;
                state.cur_y = 0.0;
            }
            "ET" => {}

            "Tf" => {
                if op.operands.len() >= 2 {
                    if let Ok(name) = op.operands[0].as_name_str() {
                        state.font_name = fonts.get(name).cloned().or_else(|| Some(name.to_string()));
                    }
                    if let Ok(size) = op.operands[1].as_float() {
                        state.font_size = size as f64;
                    }
                }
            }

            // Matrix scaling beyond translation is ignored; the translation
            // components are all the block grouping needs.
            "Tm" => {
                if op.operands.len() >= 6 {
                    let e = op.operands[4].as_float().unwrap_or(0.0) as f64;
                    let f = op.operands[5].as_float().unwrap_or(0.0) as f64;
                    state.line_x = e;
                    state.line_y = f;
                    state.cur_x = e;
                    state.cur_y = f;
                }
            }
            "Td" => {
                if op.operands.len() >= 2 {
                    let tx = op.operands[0].as_float().unwrap_or(0.0) as f64;
                    let ty = op.operands[1].as_float().unwrap_or(0.0) as f64;
                    state.translate_line(tx, ty);
                }
            }
            "TD" => {
                // TD is equivalent to: -ty TL; tx ty Td
                if op.operands.len() >= 2 {
                    let tx = op.operands[0].as_float().unwrap_or(0.0) as f64;
                    let ty = op.operands[1].as_float().unwrap_or(0.0) as f64;
                    state.leading = -ty;
                    state.translate_line(tx, ty);
                }
            }
            "T*" => {
                let leading = state.leading;
                state.translate_line(0.0, -leading);
            }
            "TL" => {
                if let Some(v) = op.operands.first().and_then(|o| o.as_float().ok()) {
                    state.leading = v as f64;
                }
            }

            "Tj" | "TJ" => {
                for operand in &op.operands {
                    let text = decode_show_operand(operand);
                    push_item(&mut items, &mut state, text);
                }
            }
            "'" => {
                let leading = state.leading;
                state.translate_line(0.0, -leading);
                for operand in &op.operands {
                    let text = decode_show_operand(operand);
                    push_item(&mut items, &mut state, text);
                }
            }
            "\"" => {
                let leading = state.leading;
                state.translate_line(0.0, -leading);
                if let Some(operand) = op.operands.get(2) {
                    let text = decode_show_operand(operand);
                    push_item(&mut items, &mut state, text);
                }
            }

            _ => {}
        }
    }

    Ok(items)
}

/// Emit a text item at the current position and advance the cursor
fn push_item(items: &mut Vec<TextItem>, state: &mut TextState, text: String) {
    if text.trim().is_empty() {
        return;
    }
    let width = text.chars().count() as f64 * state.font_size * APPROX_CHAR_WIDTH_RATIO;
    let height = state.font_size * APPROX_LINE_HEIGHT_RATIO;
    items.push(TextItem {
        text,
        x: state.cur_x,
        y: state.cur_y,
        width,
        height,
        font_name: state.font_name.clone(),
        font_size: Some(state.font_size),
    });
    state.cur_x += width;
}

/// Decode a Tj/TJ operand into plain text.
///
/// Strings try UTF-8, then UTF-16BE (BOM), then Latin-1. TJ arrays join their
/// string elements; large negative kerning adjustments become spaces.
fn decode_show_operand(operand: &Object) -> String {
    match operand {
        Object::String(bytes, _) => decode_pdf_string(bytes),
        Object::Array(arr) => {
            let mut text = String::new();
            for item in arr {
                match item {
                    Object::String(bytes, _) => text.push_str(&decode_pdf_string(bytes)),
                    Object::Integer(n) if *n < -100 => text.push(' '),
                    Object::Real(n) if *n < -100.0 => text.push(' '),
                    _ => {}
                }
            }
            text
        }
        _ => String::new(),
    }
}

fn decode_pdf_string(bytes: &[u8]) -> String {
    if let Ok(s) = String::from_utf8(bytes.to_vec()) {
        return s;
    }
    // UTF-16BE with BOM (common in PDFs)
    if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
        let chars: Vec<u16> = bytes[2..]
            .chunks(2)
            .filter_map(|chunk| {
                if chunk.len() == 2 {
                    Some(u16::from_be_bytes([chunk[0], chunk[1]]))
                } else {
                    None
                }
            })
            .collect();
        if let Ok(s) = String::from_utf16(&chars) {
            return s;
        }
    }
    // Fallback to Latin-1
    bytes.iter().map(|&b| b as char).collect()
}

/// Map font resource names (e.g. "F1") to BaseFont names for the page
fn page_base_fonts(doc: &Document, page_id: ObjectId) -> HashMap<String, String> {
    let mut fonts = HashMap::new();

    let Some(page_dict) = doc
        .get_object(page_id)
        .ok()
        .and_then(|o| o.as_dict().ok())
    else {
        return fonts;
    };

    let Some(font_dict) = resolve_dict(doc, page_dict.get(b"Resources").ok())
        .and_then(|res| resolve_dict(doc, res.get(b"Font").ok()))
    else {
        return fonts;
    };

    for (name, value) in font_dict.iter() {
        if let Some(font) = resolve_dict(doc, Some(value)) {
            if let Ok(base) = font.get(b"BaseFont").and_then(|o| o.as_name_str()) {
                fonts.insert(
                    String::from_utf8_lossy(name).to_string(),
                    base.to_string(),
                );
            }
        }
    }

    fonts
}

/// Follow an optional reference to a dictionary
fn resolve_dict<'a>(doc: &'a Document, obj: Option<&'a Object>) -> Option<&'a Dictionary> {
    match obj? {
        Object::Dictionary(d) => Some(d),
        Object::Reference(id) => doc.get_object(*id).ok().and_then(|o| o.as_dict().ok()),
        _ => None,
    }
}

fn page_dimensions(doc: &Document, page_id: ObjectId) -> (f64, f64) {
    if let Ok(page) = doc.get_object(page_id) {
        if let Ok(dict) = page.as_dict() {
            if let Some(media_box) = find_media_box(doc, dict) {
                return (
                    media_box[2] - media_box[0],
                    media_box[3] - media_box[1],
                );
            }
        }
    }
    (612.0, 792.0) // Default US Letter
}

/// Get MediaBox from page, inheriting from parent if necessary
fn find_media_box(doc: &Document, page_dict: &Dictionary) -> Option<[f64; 4]> {
    if let Ok(arr) = page_dict.get(b"MediaBox").and_then(|o| o.as_array()) {
        if let Some(parsed) = parse_box_array(arr) {
            return Some(parsed);
        }
    }

    let parent_id = page_dict.get(b"Parent").ok()?.as_reference().ok()?;
    let parent = doc.get_object(parent_id).ok()?.as_dict().ok()?;
    let arr = parent.get(b"MediaBox").ok()?.as_array().ok()?;
    parse_box_array(arr)
}

fn parse_box_array(arr: &[Object]) -> Option<[f64; 4]> {
    if arr.len() != 4 {
        return None;
    }
    let mut result = [0.0; 4];
    for (i, obj) in arr.iter().enumerate() {
        result[i] = match obj {
            Object::Integer(n) => *n as f64,
            Object::Real(n) => *n as f64,
            _ => return None,
        };
    }
    Some(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_pdf_string_utf8() {
        assert_eq!(decode_pdf_string(b"hello"), "hello");
    }

    #[test]
    fn test_decode_pdf_string_utf16be() {
        let bytes = [0xFE, 0xFF, 0x00, b'H', 0x00, b'i'];
        assert_eq!(decode_pdf_string(&bytes), "Hi");
    }

    #[test]
    fn test_decode_tj_array_kerning_becomes_space() {
        let operand = Object::Array(vec![
            Object::String(b"data".to_vec(), lopdf::StringFormat::Literal),
            Object::Integer(-250),
            Object::String(b"retention".to_vec(), lopdf::StringFormat::Literal),
        ]);
        assert_eq!(decode_show_operand(&operand), "data retention");
    }

    #[test]
    fn test_invalid_bytes_are_a_parse_error() {
        let backend = LopdfBackend::new();
        let err = backend.extract(b"not a pdf at all").unwrap_err();
        assert!(matches!(err, ExtractError::Parse(_)));
    }
}
