//! Character-level content-stream redaction.
//!
//! Walks a page content stream tracking the transform and text matrices,
//! and blanks every character whose estimated box falls inside a mask. The
//! masked glyphs become spaces so later characters keep their positions and
//! nothing sensitive survives in the text layer. A black rectangle overlay
//! is painted on top as well, which also covers fonts whose metrics the
//! estimate gets wrong.

use crate::content::get_number;
use crate::{MaskRect, Result};
use lopdf::{
    content::{Content, Operation},
    Object,
};

const DEFAULT_FONT_SIZE: f32 = 12.0;

/// Width estimate per byte; multi-byte encoded glyphs tend to be full-width.
fn char_width(byte: u8, font_size: f32) -> f32 {
    if byte < 128 {
        font_size * 0.55
    } else {
        font_size
    }
}

fn text_width(text: &[u8], font_size: f32) -> f32 {
    text.iter().map(|&b| char_width(b, font_size)).sum()
}

/// Graphics and text state tracked while walking the stream.
struct TextState {
    ctm: [f32; 6],
    ctm_stack: Vec<[f32; 6]>,
    text_matrix: [f32; 6],
    line_matrix: [f32; 6],
    font_size: f32,
}

impl TextState {
    fn new() -> Self {
        const ID: [f32; 6] = [1.0, 0.0, 0.0, 1.0, 0.0, 0.0];
        Self {
            ctm: ID,
            ctm_stack: Vec::new(),
            text_matrix: ID,
            line_matrix: ID,
            font_size: DEFAULT_FONT_SIZE,
        }
    }

    fn concat_ctm(&mut self, m: [f32; 6]) {
        let [a, b, c, d, e, f] = m;
        self.ctm = [
            self.ctm[0] * a + self.ctm[2] * b,
            self.ctm[1] * a + self.ctm[3] * b,
            self.ctm[0] * c + self.ctm[2] * d,
            self.ctm[1] * c + self.ctm[3] * d,
            self.ctm[0] * e + self.ctm[2] * f + self.ctm[4],
            self.ctm[1] * e + self.ctm[3] * f + self.ctm[5],
        ];
    }

    fn begin_text(&mut self) {
        self.text_matrix = [1.0, 0.0, 0.0, 1.0, 0.0, 0.0];
        self.line_matrix = self.text_matrix;
    }

    fn move_line(&mut self, tx: f32, ty: f32) {
        self.line_matrix[4] += tx;
        self.line_matrix[5] += ty;
        self.text_matrix = self.line_matrix;
    }

    /// Current text origin in user space.
    fn text_origin(&self) -> (f32, f32) {
        (
            self.ctm[0] * self.text_matrix[4] + self.ctm[2] * self.text_matrix[5] + self.ctm[4],
            self.ctm[1] * self.text_matrix[4] + self.ctm[3] * self.text_matrix[5] + self.ctm[5],
        )
    }
}

fn matrix_operands(operands: &[Object]) -> Option<[f32; 6]> {
    if operands.len() < 6 {
        return None;
    }
    let mut m = [0.0f32; 6];
    for (slot, obj) in m.iter_mut().zip(operands) {
        *slot = get_number(obj)?;
    }
    Some(m)
}

/// Replaces masked characters with spaces, advancing an estimated pen
/// position per byte. Returns the rewritten bytes and whether anything
/// changed.
fn blank_masked_chars(
    text: &[u8],
    start_x: f32,
    start_y: f32,
    font_size: f32,
    masks: &[MaskRect],
) -> (Vec<u8>, bool) {
    let mut result = Vec::with_capacity(text.len());
    let mut pen_x = start_x;
    let mut any_masked = false;
    let glyph_height = font_size.abs().max(DEFAULT_FONT_SIZE);

    for &byte in text {
        let width = char_width(byte, font_size);
        let masked = masks
            .iter()
            .any(|m| m.intersects(pen_x, start_y, width, glyph_height));
        if masked {
            result.push(b' ');
            any_masked = true;
        } else {
            result.push(byte);
        }
        pen_x += width;
    }

    (result, any_masked)
}

fn rewrite_show_op(op: Operation, state: &TextState, masks: &[MaskRect]) -> Operation {
    // For " the string is the third operand; for Tj and ' it is the first.
    let string_index = if op.operator == "\"" { 2 } else { 0 };
    let (bytes, format) = match op.operands.get(string_index) {
        Some(Object::String(s, fmt)) => (s.clone(), *fmt),
        _ => return op,
    };

    let (x, y) = state.text_origin();
    let (blanked, any_masked) = blank_masked_chars(&bytes, x, y, state.font_size, masks);
    if !any_masked {
        return op;
    }

    log::debug!(
        "[Scrub] {} op: {:?} -> {:?}",
        op.operator,
        String::from_utf8_lossy(&bytes),
        String::from_utf8_lossy(&blanked)
    );
    let mut operands = op.operands.clone();
    operands[string_index] = Object::String(blanked, format);
    Operation::new(&op.operator, operands)
}

fn rewrite_show_array_op(op: Operation, state: &TextState, masks: &[MaskRect]) -> Operation {
    let arr = match op.operands.first() {
        Some(Object::Array(arr)) => arr.clone(),
        _ => return op,
    };

    let (mut pen_x, y) = state.text_origin();
    let mut new_array = Vec::with_capacity(arr.len());
    let mut any_masked = false;

    for item in arr {
        match item {
            Object::String(s, fmt) => {
                let (blanked, masked) = blank_masked_chars(&s, pen_x, y, state.font_size, masks);
                any_masked |= masked;
                pen_x += text_width(&s, state.font_size);
                new_array.push(Object::String(blanked, fmt));
            }
            Object::Integer(n) => {
                pen_x -= (n as f32) / 1000.0 * state.font_size;
                new_array.push(Object::Integer(n));
            }
            Object::Real(n) => {
                pen_x -= n / 1000.0 * state.font_size;
                new_array.push(Object::Real(n));
            }
            other => new_array.push(other),
        }
    }

    if any_masked {
        Operation::new("TJ", vec![Object::Array(new_array)])
    } else {
        op
    }
}

/// Rewrites a content stream so no masked character remains selectable.
pub fn scrub_content_stream(content_data: &[u8], masks: &[MaskRect]) -> Result<Vec<u8>> {
    let content = Content::decode(content_data)?;
    let mut state = TextState::new();
    let mut in_text = false;
    let mut rewritten: Vec<Operation> = Vec::with_capacity(content.operations.len());

    for op in content.operations {
        match op.operator.as_str() {
            "q" => {
                state.ctm_stack.push(state.ctm);
                rewritten.push(op);
            }
            "Q" => {
                if let Some(saved) = state.ctm_stack.pop() {
                    state.ctm = saved;
                }
                rewritten.push(op);
            }
            "cm" => {
                if let Some(m) = matrix_operands(&op.operands) {
                    state.concat_ctm(m);
                }
                rewritten.push(op);
            }
            "BT" => {
                in_text = true;
                state.begin_text();
                rewritten.push(op);
            }
            "ET" => {
                in_text = false;
                rewritten.push(op);
            }
            "Tm" if in_text => {
                if let Some(m) = matrix_operands(&op.operands) {
                    state.text_matrix = m;
                    state.line_matrix = m;
                }
                rewritten.push(op);
            }
            "Td" | "TD" if in_text && op.operands.len() >= 2 => {
                if let (Some(tx), Some(ty)) =
                    (get_number(&op.operands[0]), get_number(&op.operands[1]))
                {
                    state.move_line(tx, ty);
                }
                rewritten.push(op);
            }
            "Tf" if op.operands.len() >= 2 => {
                if let Some(size) = get_number(&op.operands[1]) {
                    state.font_size = size.abs();
                }
                rewritten.push(op);
            }
            "Tj" | "'" | "\"" if in_text => {
                rewritten.push(rewrite_show_op(op, &state, masks));
            }
            "TJ" if in_text => {
                rewritten.push(rewrite_show_array_op(op, &state, masks));
            }
            _ => rewritten.push(op),
        }
    }

    Ok(Content {
        operations: rewritten,
    }
    .encode()?)
}

/// Appends filled black rectangles over the mask areas, inside a saved
/// graphics state.
pub fn paint_black_boxes(content_data: &[u8], masks: &[MaskRect]) -> Result<Vec<u8>> {
    let content = Content::decode(content_data)?;
    let mut operations = content.operations;

    operations.push(Operation::new("q", vec![]));
    operations.push(Operation::new(
        "rg",
        vec![Object::Real(0.0), Object::Real(0.0), Object::Real(0.0)],
    ));
    operations.push(Operation::new(
        "RG",
        vec![Object::Real(0.0), Object::Real(0.0), Object::Real(0.0)],
    ));

    for rect in masks {
        operations.push(Operation::new(
            "re",
            vec![
                Object::Real(rect.x),
                Object::Real(rect.y),
                Object::Real(rect.width),
                Object::Real(rect.height),
            ],
        ));
        operations.push(Operation::new("f", vec![]));
    }

    operations.push(Operation::new("Q", vec![]));

    Ok(Content { operations }.encode()?)
}
