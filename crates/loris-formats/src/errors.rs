use loris_dft::model::DftError;
use miette::Diagnostic;
use thiserror::Error;

/// Malformed fault tree input.
///
/// Always recoverable by the caller: fix the input text and retry.
#[derive(Debug, Error, Diagnostic)]
pub enum FormatError {
    #[error("JSON error at line {line}, column {column}: {message}")]
    #[diagnostic(code(loris::formats::json))]
    Json {
        message: String,
        line: usize,
        column: usize,
    },

    #[error("Syntax error: {message}")]
    #[diagnostic(code(loris::formats::galileo_syntax))]
    GalileoSyntax {
        message: String,
        #[label("here")]
        span: miette::SourceSpan,
        #[source_code]
        src: miette::NamedSource<String>,
    },

    #[error("Unsupported declaration: {message}")]
    #[diagnostic(code(loris::formats::unsupported))]
    Unsupported {
        message: String,
        #[label("unsupported")]
        span: miette::SourceSpan,
        #[source_code]
        src: miette::NamedSource<String>,
    },

    #[error("Missing toplevel declaration")]
    #[diagnostic(
        code(loris::formats::missing_toplevel),
        help("declare the root with `toplevel <name>;` (Galileo) or a \"toplevel\" key (JSON)")
    )]
    MissingToplevel,

    #[error("Invalid model: {0}")]
    #[diagnostic(code(loris::formats::model))]
    Model(#[from] DftError),
}

impl From<serde_json::Error> for FormatError {
    fn from(e: serde_json::Error) -> Self {
        FormatError::Json {
            line: e.line(),
            column: e.column(),
            message: e.to_string(),
        }
    }
}
