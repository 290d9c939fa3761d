use thiserror::Error;

#[derive(Error, Debug)]
pub enum XmlError {
    #[error("Malformed tag: {0}")]
    MalformedTag(String),

    #[error("Mismatched closing tag: expected </{expected}>, found </{found}>")]
    MismatchedTag { expected: String, found: String },

    #[error("Closing tag </{0}> without matching open tag")]
    UnexpectedClose(String),

    #[error("Invalid UTF-8 in XML input")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),

    #[error("Invalid entity: {0}")]
    Entity(#[from] quick_xml::escape::EscapeError),

    #[error("Pending token exceeds {0} bytes")]
    TokenTooLong(usize),

    #[error("Unexpected end of document (unclosed: {0:?})")]
    UnexpectedEof(Vec<String>),
}
