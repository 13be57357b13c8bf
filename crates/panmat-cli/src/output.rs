//! Text rendering of values read back from the engine.

use std::fmt::Write;

use panmat_core::{HostArray, HostValue};

/// Render `value` as `name = ...` the way an interactive host would display it.
pub fn format_value(name: &str, value: &HostValue) -> String {
    match value {
        HostValue::Numeric(array) => format_array(name, array),
        HostValue::Char(text) => format!("{} = '{}'\n", name, text),
        HostValue::Cell(cell) => format!("{} = {{{}x{} cell}}\n", name, cell.rows(), cell.cols()),
        HostValue::Struct(fields) => {
            let mut out = format!("{} =\n", name);
            for (field, value) in fields.iter() {
                let _ = writeln!(out, "    {}: {}", field, summary(value));
            }
            out
        }
    }
}

fn format_array(name: &str, array: &HostArray) -> String {
    if array.rank() > 2 {
        return format!("{} = [{} {}]\n", name, shape_text(array.shape()), array.class());
    }
    if array.numel() == 1 {
        return format!("{} = {}\n", name, element(array, 0, 0));
    }

    let mut out = format!("{} =\n", name);
    for row in 0..array.rows() {
        out.push_str("   ");
        for col in 0..array.cols() {
            let _ = write!(out, " {:>14}", element(array, row, col));
        }
        out.push('\n');
    }
    out
}

fn element(array: &HostArray, row: usize, col: usize) -> String {
    match array.complex_at(row, col) {
        Some(z) if array.is_complex() => {
            let sign = if z.im.is_sign_negative() { '-' } else { '+' };
            format!("{:.6e}{}{:.6e}i", z.re, sign, z.im.abs())
        }
        Some(z) => format!("{:.6e}", z.re),
        None => String::new(),
    }
}

fn shape_text(shape: &[usize]) -> String {
    shape
        .iter()
        .map(usize::to_string)
        .collect::<Vec<_>>()
        .join("x")
}

fn summary(value: &HostValue) -> String {
    match value {
        HostValue::Numeric(array) if array.numel() == 1 => element(array, 0, 0),
        HostValue::Numeric(array) => format!("[{} {}]", shape_text(array.shape()), array.class()),
        HostValue::Char(text) => format!("'{}'", text),
        other => format!("[{}]", other.class_name()),
    }
}
