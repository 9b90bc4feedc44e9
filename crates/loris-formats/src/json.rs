//! The JSON fault tree format: a toplevel name plus an element list.
//!
//! ```json
//! {
//!   "toplevel": "system",
//!   "elements": [
//!     { "type": "be", "name": "pump", "rate": 0.5, "dormancy": 0.3 },
//!     { "type": "and", "name": "system", "children": ["pump"] }
//!   ]
//! }
//! ```

use loris_dft::model::{Dft, DftBuilder, GateKind};
use serde::Deserialize;

use crate::errors::FormatError;

#[derive(Debug, Deserialize)]
struct JsonDft {
    toplevel: Option<String>,
    elements: Vec<JsonElement>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum JsonElement {
    Be {
        name: String,
        rate: f64,
        #[serde(default = "default_dormancy")]
        dormancy: f64,
    },
    Const {
        name: String,
        failed: bool,
    },
    And {
        name: String,
        children: Vec<String>,
    },
    Or {
        name: String,
        children: Vec<String>,
    },
    Vote {
        name: String,
        threshold: usize,
        children: Vec<String>,
    },
    Pand {
        name: String,
        children: Vec<String>,
    },
    Spare {
        name: String,
        children: Vec<String>,
    },
    Seq {
        name: String,
        children: Vec<String>,
    },
    Fdep {
        name: String,
        trigger: String,
        dependents: Vec<String>,
    },
}

fn default_dormancy() -> f64 {
    1.0
}

/// Parse the JSON element-list format.
pub fn parse_json(text: &str) -> Result<Dft, FormatError> {
    let raw: JsonDft = serde_json::from_str(text)?;
    let toplevel = raw.toplevel.ok_or(FormatError::MissingToplevel)?;

    let mut builder = DftBuilder::new();
    for element in &raw.elements {
        match element {
            JsonElement::Be {
                name,
                rate,
                dormancy,
            } => builder.exponential(name, *rate, *dormancy)?,
            JsonElement::Const { name, failed } => builder.constant(name, *failed)?,
            JsonElement::And { name, children } => {
                add_gate(&mut builder, name, GateKind::And, children)?
            }
            JsonElement::Or { name, children } => {
                add_gate(&mut builder, name, GateKind::Or, children)?
            }
            JsonElement::Vote {
                name,
                threshold,
                children,
            } => add_gate(
                &mut builder,
                name,
                GateKind::Vote {
                    threshold: *threshold,
                },
                children,
            )?,
            JsonElement::Pand { name, children } => {
                add_gate(&mut builder, name, GateKind::Pand, children)?
            }
            JsonElement::Spare { name, children } => {
                add_gate(&mut builder, name, GateKind::Spare, children)?
            }
            JsonElement::Seq { name, children } => {
                add_gate(&mut builder, name, GateKind::Seq, children)?
            }
            JsonElement::Fdep {
                name,
                trigger,
                dependents,
            } => {
                let dependents: Vec<&str> = dependents.iter().map(String::as_str).collect();
                builder.dependency(name, trigger, &dependents)?;
            }
        }
    }

    Ok(builder.build(&toplevel)?)
}

fn add_gate(
    builder: &mut DftBuilder,
    name: &str,
    kind: GateKind,
    children: &[String],
) -> Result<(), loris_dft::model::DftError> {
    let children: Vec<&str> = children.iter().map(String::as_str).collect();
    builder.gate(name, kind, &children)
}

#[cfg(test)]
mod tests {
    use super::*;
    use loris_dft::model::{ElementKind, FailureDistribution};

    #[test]
    fn parses_a_full_element_mix() {
        let text = r#"{
            "toplevel": "system",
            "elements": [
                { "type": "be", "name": "a", "rate": 0.5 },
                { "type": "be", "name": "b", "rate": 0.5, "dormancy": 0.2 },
                { "type": "const", "name": "stuck", "failed": true },
                { "type": "vote", "name": "core", "threshold": 2, "children": ["a", "b", "stuck"] },
                { "type": "spare", "name": "backup", "children": ["a", "b"] },
                { "type": "and", "name": "system", "children": ["core", "backup"] },
                { "type": "fdep", "name": "f", "trigger": "a", "dependents": ["b"] }
            ]
        }"#;
        let dft = parse_json(text).unwrap();
        assert_eq!(dft.len(), 7);
        assert_eq!(dft.name(dft.top()), "system");

        let b = dft.element(dft.element_id("b").unwrap());
        match &b.kind {
            ElementKind::Basic(be) => assert_eq!(
                be.distribution,
                FailureDistribution::Exponential {
                    rate: 0.5,
                    dormancy: 0.2
                }
            ),
            other => panic!("expected basic event, got {other:?}"),
        }

        let core = dft.element(dft.element_id("core").unwrap());
        assert_eq!(
            core.as_gate().unwrap().kind,
            GateKind::Vote { threshold: 2 }
        );
    }

    #[test]
    fn dormancy_defaults_to_one() {
        let text = r#"{
            "toplevel": "top",
            "elements": [
                { "type": "be", "name": "a", "rate": 2.0 },
                { "type": "or", "name": "top", "children": ["a"] }
            ]
        }"#;
        let dft = parse_json(text).unwrap();
        let a = dft.element(dft.element_id("a").unwrap());
        assert_eq!(
            a.as_basic().unwrap().distribution,
            FailureDistribution::Exponential {
                rate: 2.0,
                dormancy: 1.0
            }
        );
    }

    #[test]
    fn missing_toplevel_is_its_own_error() {
        let text = r#"{ "elements": [] }"#;
        assert!(matches!(
            parse_json(text),
            Err(FormatError::MissingToplevel)
        ));
    }

    #[test]
    fn syntax_errors_report_line_and_column() {
        let err = parse_json("{ \"toplevel\": }").unwrap_err();
        assert!(matches!(err, FormatError::Json { line: 1, .. }));
    }

    #[test]
    fn unknown_reference_surfaces_as_model_error() {
        let text = r#"{
            "toplevel": "top",
            "elements": [
                { "type": "or", "name": "top", "children": ["ghost"] }
            ]
        }"#;
        assert!(matches!(parse_json(text), Err(FormatError::Model(_))));
    }
}
