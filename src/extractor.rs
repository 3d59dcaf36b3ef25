//! Positioned text extraction from PDF using lopdf
//!
//! Walks each page's content stream, tracking the graphics and text state,
//! and emits one fragment per shown string. Glyph widths are not read from
//! font metrics; a run's width is estimated from its length and font size,
//! which is enough to separate table columns.

use std::collections::BTreeMap;
use std::path::Path;

use log::debug;
use lopdf::content::Content;
use lopdf::{Dictionary, Document, Object, ObjectId};

use crate::fragment::{PageFragments, PositionedFragment};
use crate::StatementError;

/// Average glyph advance as a fraction of the font size
const GLYPH_WIDTH_RATIO: f32 = 0.5;
/// Leading used by `T*` when none was set
const DEFAULT_LEADING_RATIO: f32 = 1.2;

const IDENTITY: [f32; 6] = [1.0, 0.0, 0.0, 1.0, 0.0, 0.0];

/// Extract fragments from every page of a PDF file
pub fn extract_fragments<P: AsRef<Path>>(path: P) -> Result<Vec<PageFragments>, StatementError> {
    let doc = Document::load(path)?;
    extract_from_doc(&doc)
}

/// Extract fragments from a PDF held in memory
pub fn extract_fragments_mem(buffer: &[u8]) -> Result<Vec<PageFragments>, StatementError> {
    let doc = Document::load_mem(buffer)?;
    extract_from_doc(&doc)
}

fn extract_from_doc(doc: &Document) -> Result<Vec<PageFragments>, StatementError> {
    if doc.is_encrypted() {
        return Err(StatementError::Encrypted);
    }

    let mut pages = Vec::new();
    for (page_num, page_id) in doc.get_pages() {
        let fragments = extract_page_fragments(doc, page_id)?;
        debug!("page {}: {} fragments", page_num, fragments.len());
        pages.push(PageFragments::new(page_num, fragments));
    }

    if pages.iter().all(|p| p.fragments.is_empty()) {
        return Err(StatementError::NoTextLayer);
    }
    Ok(pages)
}

/// Multiply two 2D transformation matrices
/// Matrix format: [a, b, c, d, e, f] representing:
/// | a  b  0 |
/// | c  d  0 |
/// | e  f  1 |
fn multiply_matrices(m1: &[f32; 6], m2: &[f32; 6]) -> [f32; 6] {
    [
        m1[0] * m2[0] + m1[1] * m2[2],
        m1[0] * m2[1] + m1[1] * m2[3],
        m1[2] * m2[0] + m1[3] * m2[2],
        m1[2] * m2[1] + m1[3] * m2[3],
        m1[4] * m2[0] + m1[5] * m2[2] + m2[4],
        m1[4] * m2[1] + m1[5] * m2[3] + m2[5],
    ]
}

/// Graphics and text state while walking a content stream
struct TextState {
    ctm: [f32; 6],
    ctm_stack: Vec<[f32; 6]>,
    font: String,
    font_size: f32,
    /// Set by `TL`; `None` falls back to a multiple of the font size
    leading: Option<f32>,
    text_matrix: [f32; 6],
    line_matrix: [f32; 6],
    in_text_block: bool,
}

impl TextState {
    fn new() -> Self {
        Self {
            ctm: IDENTITY,
            ctm_stack: Vec::new(),
            font: String::new(),
            font_size: 12.0,
            leading: None,
            text_matrix: IDENTITY,
            line_matrix: IDENTITY,
            in_text_block: false,
        }
    }

    fn move_line(&mut self, tx: f32, ty: f32) {
        self.line_matrix[4] += tx;
        self.line_matrix[5] += ty;
        self.text_matrix = self.line_matrix;
    }

    fn next_line(&mut self) {
        let leading = self
            .leading
            .unwrap_or(self.font_size * DEFAULT_LEADING_RATIO);
        self.move_line(0.0, -leading);
    }

    fn rendered_size(&self) -> f32 {
        let scale_x = (self.text_matrix[0].powi(2) + self.text_matrix[1].powi(2)).sqrt();
        let scale_y = (self.text_matrix[2].powi(2) + self.text_matrix[3].powi(2)).sqrt();
        self.font_size * scale_x.max(scale_y)
    }

    /// Fragment for `text` at the current text position, in page space
    fn fragment(&self, text: String) -> Option<PositionedFragment> {
        if text.trim().is_empty() {
            return None;
        }
        let size = self.rendered_size();
        let combined = multiply_matrices(&self.text_matrix, &self.ctm);
        let width = text.trim().chars().count() as f32 * size * GLYPH_WIDTH_RATIO;
        Some(PositionedFragment::new(text, combined[4], combined[5], width, size))
    }
}

/// Extract fragments from a single page
fn extract_page_fragments(
    doc: &Document,
    page_id: ObjectId,
) -> Result<Vec<PositionedFragment>, StatementError> {
    let fonts = doc.get_page_fonts(page_id).unwrap_or_default();
    let content_data = doc.get_page_content(page_id)?;
    let content = Content::decode(&content_data)?;

    let mut fragments = Vec::new();
    let mut state = TextState::new();
    let decode = |obj: &Object, font: &str| decode_operand(obj, doc, &fonts, font);

    for op in &content.operations {
        let operands = &op.operands;
        match op.operator.as_str() {
            "q" => state.ctm_stack.push(state.ctm),
            "Q" => {
                if let Some(saved) = state.ctm_stack.pop() {
                    state.ctm = saved;
                }
            }
            "cm" if operands.len() >= 6 => {
                let m = matrix_from(operands);
                state.ctm = multiply_matrices(&m, &state.ctm);
            }
            "BT" => {
                state.in_text_block = true;
                state.text_matrix = IDENTITY;
                state.line_matrix = IDENTITY;
            }
            "ET" => state.in_text_block = false,
            "Tf" if operands.len() >= 2 => {
                if let Ok(name) = operands[0].as_name() {
                    state.font = String::from_utf8_lossy(name).to_string();
                }
                if let Some(size) = get_number(&operands[1]) {
                    state.font_size = size;
                }
            }
            "TL" => {
                if let Some(leading) = operands.first().and_then(get_number) {
                    state.leading = Some(leading);
                }
            }
            "Td" | "TD" if operands.len() >= 2 => {
                let tx = get_number(&operands[0]).unwrap_or(0.0);
                let ty = get_number(&operands[1]).unwrap_or(0.0);
                if op.operator == "TD" {
                    state.leading = Some(-ty);
                }
                state.move_line(tx, ty);
            }
            "Tm" if operands.len() >= 6 => {
                state.text_matrix = matrix_from(operands);
                state.line_matrix = state.text_matrix;
            }
            "T*" => state.next_line(),
            "Tj" if state.in_text_block => {
                if let Some(text) = operands.first().and_then(|o| decode(o, &state.font)) {
                    fragments.extend(state.fragment(text));
                }
            }
            "TJ" if state.in_text_block => {
                if let Some(Ok(array)) = operands.first().map(Object::as_array) {
                    let text: String = array
                        .iter()
                        .filter_map(|item| decode(item, &state.font))
                        .collect();
                    fragments.extend(state.fragment(text));
                }
            }
            "'" => {
                state.next_line();
                if let Some(text) = operands.first().and_then(|o| decode(o, &state.font)) {
                    fragments.extend(state.fragment(text));
                }
            }
            // aw ac string: spacing operands are irrelevant for positions
            "\"" => {
                state.next_line();
                if let Some(text) = operands.get(2).and_then(|o| decode(o, &state.font)) {
                    fragments.extend(state.fragment(text));
                }
            }
            _ => {}
        }
    }

    Ok(fragments)
}

fn matrix_from(operands: &[Object]) -> [f32; 6] {
    let mut m = IDENTITY;
    for (i, operand) in operands.iter().take(6).enumerate() {
        if let Some(value) = get_number(operand) {
            m[i] = value;
        }
    }
    m
}

/// Helper to get f32 from Object
fn get_number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r),
        _ => None,
    }
}

/// Decode a string operand using the current font's encoding
fn decode_operand(
    obj: &Object,
    doc: &Document,
    fonts: &BTreeMap<Vec<u8>, &Dictionary>,
    current_font: &str,
) -> Option<String> {
    let Object::String(bytes, _) = obj else {
        return None;
    };

    if let Some(font_dict) = fonts.get(current_font.as_bytes()) {
        if let Ok(encoding) = font_dict.get_font_encoding(doc) {
            if let Ok(text) = Document::decode_text(&encoding, bytes) {
                return Some(text);
            }
        }
    }

    // UTF-16BE with BOM, else Latin-1
    if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
        let utf16: Vec<u16> = bytes[2..]
            .chunks_exact(2)
            .map(|chunk| u16::from_be_bytes([chunk[0], chunk[1]]))
            .collect();
        return Some(String::from_utf16_lossy(&utf16));
    }
    Some(bytes.iter().map(|&b| b as char).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fragment_width_from_length() {
        let mut state = TextState::new();
        state.font_size = 10.0;
        state.text_matrix = [1.0, 0.0, 0.0, 1.0, 50.0, 700.0];
        let fragment = state.fragment("500.00".to_string()).unwrap();
        assert_eq!(fragment.x, 50.0);
        assert_eq!(fragment.y, 700.0);
        assert_eq!(fragment.width, 30.0);
        assert_eq!(fragment.height, 10.0);
        assert!(state.fragment("   ".to_string()).is_none());
    }

    #[test]
    fn test_next_line_uses_leading() {
        let mut state = TextState::new();
        state.font_size = 10.0;
        state.move_line(0.0, 700.0);
        state.next_line();
        assert_eq!(state.text_matrix[5], 688.0);

        state.leading = Some(14.0);
        state.next_line();
        assert_eq!(state.text_matrix[5], 674.0);
    }

    #[test]
    fn test_ctm_translates_position() {
        let mut state = TextState::new();
        state.ctm = [1.0, 0.0, 0.0, 1.0, 20.0, 30.0];
        state.text_matrix = [1.0, 0.0, 0.0, 1.0, 5.0, 5.0];
        let fragment = state.fragment("Date".to_string()).unwrap();
        assert_eq!((fragment.x, fragment.y), (25.0, 35.0));
    }

    #[test]
    fn test_invalid_buffer_is_parse_error() {
        let result = extract_fragments_mem(b"not a pdf");
        assert!(matches!(result, Err(StatementError::Parse(_))));
    }
}
