use thiserror::Error;

use crate::mpd::RepresentationAddress;

#[derive(Error, Debug)]
pub enum ProxyError {
    #[error("HTTP error: {0}")]
    HttpError(reqwest::StatusCode),

    #[error("Invalid MPD: {0}")]
    MpdParsing(String),

    #[error("MPD has no period at index {0}")]
    NoPeriodFound(usize),

    #[error("{kind} index {index} out of range for {address} ({len} present)")]
    OutOfRange {
        kind: &'static str,
        index: usize,
        len: usize,
        address: RepresentationAddress,
    },

    #[error("No SegmentTemplate found for {0}")]
    MissingSegmentTemplate(RepresentationAddress),

    #[error("Template variable ${0}$ can not be resolved in {1:?}")]
    TemplateVariableMissing(String, String),

    #[error(transparent)]
    IOError(#[from] std::io::Error),

    #[error(transparent)]
    UrlParseError(#[from] url::ParseError),

    #[error(transparent)]
    RequestError(#[from] reqwest::Error),

    #[error(transparent)]
    XmlError(#[from] quick_xml::Error),

    #[error(transparent)]
    XmlAttrError(#[from] quick_xml::events::attributes::AttrError),

    #[error(transparent)]
    Utf8Error(#[from] std::string::FromUtf8Error),
}

impl ProxyError {
    /// Errors caused by an inconsistent manifest rather than by the network or the disk.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            ProxyError::NoPeriodFound(_)
                | ProxyError::OutOfRange { .. }
                | ProxyError::MissingSegmentTemplate(_)
        )
    }
}

pub type ProxyResult<T> = Result<T, ProxyError>;
