//! Parser for the Galileo plain-text gate notation.

use loris_dft::model::{Dft, DftBuilder, GateKind};
use pest::iterators::Pair;
use pest::Parser;
use pest_derive::Parser;

use crate::errors::FormatError;

#[derive(Parser)]
#[grammar = "galileo.pest"]
struct GalileoParser;

const SOURCE_NAME: &str = "<galileo>";

/// Parse the Galileo gate notation.
pub fn parse_galileo(text: &str) -> Result<Dft, FormatError> {
    let mut pairs =
        GalileoParser::parse(Rule::file, text).map_err(|e| syntax_error(e, text))?;
    let file = pairs.next().expect("grammar yields exactly one file pair");

    let mut builder = DftBuilder::new();
    let mut toplevel: Option<String> = None;

    for stmt in file.into_inner() {
        if stmt.as_rule() != Rule::stmt {
            continue; // EOI
        }
        let inner = stmt.into_inner().next().expect("stmt has one alternative");
        match inner.as_rule() {
            Rule::toplevel_stmt => {
                let name = inner
                    .into_inner()
                    .find(|p| p.as_rule() == Rule::name)
                    .expect("toplevel names its root");
                toplevel = Some(unquote(name.as_str()));
            }
            Rule::def_stmt => {
                parse_definition(inner, text, &mut builder)?;
            }
            _ => {}
        }
    }

    let toplevel = toplevel.ok_or(FormatError::MissingToplevel)?;
    Ok(builder.build(&toplevel)?)
}

fn parse_definition(
    def: Pair<'_, Rule>,
    text: &str,
    builder: &mut DftBuilder,
) -> Result<(), FormatError> {
    let mut parts = def.into_inner();
    let name_pair = parts.next().expect("definition starts with its name");
    let name = unquote(name_pair.as_str());
    let body = parts.next().expect("definition has a body");
    let body = body.into_inner().next().expect("body has one alternative");

    match body.as_rule() {
        Rule::gate_body => {
            let mut inner = body.into_inner();
            let gate_type = inner.next().expect("gate body starts with its type");
            let kind = parse_gate_kind(gate_type.as_str(), &gate_type, text)?;
            let children: Vec<String> = inner.map(|p| unquote(p.as_str())).collect();
            let refs: Vec<&str> = children.iter().map(String::as_str).collect();
            builder.gate(&name, kind, &refs)?;
        }
        Rule::fdep_body => {
            let span = span_of(&body);
            let names: Vec<String> = body
                .into_inner()
                .filter(|p| p.as_rule() == Rule::name)
                .map(|p| unquote(p.as_str()))
                .collect();
            if names.len() < 2 {
                return Err(FormatError::Unsupported {
                    message: "fdep needs a trigger and at least one dependent".into(),
                    span,
                    src: named_source(text),
                });
            }
            let dependents: Vec<&str> = names[1..].iter().map(String::as_str).collect();
            builder.dependency(&name, &names[0], &dependents)?;
        }
        Rule::be_body => {
            let span = span_of(&body);
            let mut lambda: Option<f64> = None;
            let mut dormancy = 1.0;
            let mut prob: Option<f64> = None;
            for param in body.into_inner() {
                let setting = param.into_inner().next().expect("param has one alternative");
                let value = number_value(&setting, text)?;
                match setting.as_rule() {
                    Rule::lambda_param => lambda = Some(value),
                    Rule::dorm_param => dormancy = value,
                    Rule::prob_param => prob = Some(value),
                    _ => {}
                }
            }
            match (lambda, prob) {
                (Some(rate), None) => builder.exponential(&name, rate, dormancy)?,
                (None, Some(p)) if p == 0.0 || p == 1.0 => {
                    builder.constant(&name, p == 1.0)?;
                }
                (None, Some(_)) => {
                    return Err(FormatError::Unsupported {
                        message: format!(
                            "basic event '{name}': prob must be 0 or 1 (constant events)"
                        ),
                        span,
                        src: named_source(text),
                    })
                }
                (Some(_), Some(_)) => {
                    return Err(FormatError::Unsupported {
                        message: format!("basic event '{name}' mixes lambda and prob"),
                        span,
                        src: named_source(text),
                    })
                }
                (None, None) => {
                    return Err(FormatError::Unsupported {
                        message: format!("basic event '{name}' needs lambda or prob"),
                        span,
                        src: named_source(text),
                    })
                }
            }
        }
        _ => {}
    }
    Ok(())
}

fn parse_gate_kind(
    token: &str,
    pair: &Pair<'_, Rule>,
    text: &str,
) -> Result<GateKind, FormatError> {
    let kind = match token {
        "and" => GateKind::And,
        "or" => GateKind::Or,
        "pand" => GateKind::Pand,
        "seq" => GateKind::Seq,
        "wsp" | "csp" | "hsp" | "spare" => GateKind::Spare,
        vote => {
            let Some((threshold, _)) = vote.split_once("of") else {
                return Err(unsupported_gate(vote, pair, text));
            };
            let Ok(threshold) = threshold.parse::<usize>() else {
                return Err(unsupported_gate(vote, pair, text));
            };
            GateKind::Vote { threshold }
        }
    };
    Ok(kind)
}

fn unsupported_gate(token: &str, pair: &Pair<'_, Rule>, text: &str) -> FormatError {
    FormatError::Unsupported {
        message: format!("unknown gate type '{token}'"),
        span: span_of(pair),
        src: named_source(text),
    }
}

fn number_value(pair: &Pair<'_, Rule>, text: &str) -> Result<f64, FormatError> {
    let number = pair
        .clone()
        .into_inner()
        .find(|p| p.as_rule() == Rule::number)
        .expect("grammar guarantees a number per parameter");
    number.as_str().parse::<f64>().map_err(|_| {
        FormatError::Unsupported {
            message: format!("unreadable number '{}'", number.as_str()),
            span: span_of(pair),
            src: named_source(text),
        }
    })
}

fn unquote(raw: &str) -> String {
    raw.strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(raw)
        .to_string()
}

fn span_of(pair: &Pair<'_, Rule>) -> miette::SourceSpan {
    let span = pair.as_span();
    (span.start(), span.end() - span.start()).into()
}

fn named_source(text: &str) -> miette::NamedSource<String> {
    miette::NamedSource::new(SOURCE_NAME, text.to_owned())
}

fn syntax_error(error: pest::error::Error<Rule>, text: &str) -> FormatError {
    let (offset, len) = match error.location {
        pest::error::InputLocation::Pos(p) => (p.min(text.len()), 1),
        pest::error::InputLocation::Span((s, e)) => (s, e.saturating_sub(s).max(1)),
    };
    FormatError::GalileoSyntax {
        message: error.variant.message().to_string(),
        span: (offset, len).into(),
        src: named_source(text),
    }
}
