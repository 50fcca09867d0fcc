//! Browser bindings. Programs run against in-memory input and output.

use crate::DecodeError;
use wasm_bindgen::prelude::wasm_bindgen;
use wasm_bindgen::JsValue;

impl From<crate::Error> for JsValue {
    fn from(err: crate::Error) -> JsValue {
        JsValue::from(format!("wspace error occurred: {}", err))
    }
}

impl From<DecodeError> for JsValue {
    fn from(err: DecodeError) -> JsValue {
        crate::Error::from(err).into()
    }
}

/// Runs a whitespace source and returns everything it printed
///
/// - `source` the whitespace source
/// - `input` everything the program may read, numbers are read one per line
#[wasm_bindgen]
pub fn execute(source: &str, input: &str) -> Result<String, JsValue> {
    let output = crate::execute(source.as_bytes(), input.as_bytes())?;

    Ok(String::from_utf8_lossy(&output).into_owned())
}

/// Returns the mnemonic listing of a whitespace source, one instruction per line
#[wasm_bindgen]
pub fn disassemble(source: &str) -> Result<String, JsValue> {
    Ok(crate::disassemble(source.as_bytes())?)
}
