#![doc = include_str!("../README.md")]

//! Textual fault tree formats.

pub mod errors;
pub mod galileo;
pub mod json;

pub use errors::FormatError;

use loris_dft::model::Dft;

/// Parse a fault tree, sniffing the format from the input text.
///
/// A leading `{` means JSON; everything else is treated as Galileo.
pub fn parse(text: &str) -> Result<Dft, FormatError> {
    if text.trim_start().starts_with('{') {
        json::parse_json(text)
    } else {
        galileo::parse_galileo(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sniffs_json_and_galileo() {
        let json = r#"{
            "toplevel": "top",
            "elements": [
                {"type": "be", "name": "a", "rate": 1.0},
                {"type": "or", "name": "top", "children": ["a"]}
            ]
        }"#;
        let galileo = "toplevel top;\ntop or a;\na lambda=1.0;\n";
        assert_eq!(parse(json).unwrap().len(), 2);
        assert_eq!(parse(galileo).unwrap().len(), 2);
    }
}
