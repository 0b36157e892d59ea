// References:
// 1. https://github.com/clitic/vsd/blob/30ca1985e4a467ea3304b11c08d3176deaafd22a/vsd/src/dash/template.rs
// 2. https://github.com/emarsden/dash-mpd-rs/blob/6ebdfb4759adbda8233b5b3520804e23ff86e7de/src/fetch.rs#L435-L466

use regex::Regex;
use std::{collections::HashMap, sync::LazyLock};

use super::document::Attributes;
use crate::error::{ProxyError, ProxyResult};

// From https://dashif.org/docs/DASH-IF-IOP-v4.3.pdf:
// "For the avoidance of doubt, only %0[width]d is permitted and no other identifiers."
//
// Example template: "$RepresentationID$/$Time%010d$.m4s"
// `$$` is an escaped dollar sign.
static TEMPLATE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$(?:(RepresentationID|Number|Time|Bandwidth)(?:%0(\d+)d)?)?\$").unwrap()
});

/// Values of a single media segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentVars {
    pub time: u64,
    pub number: u64,
}

#[derive(Debug, Default, Clone)]
pub struct Template {
    args: HashMap<&'static str, String>,
}

impl Template {
    pub const REPRESENTATION_ID: &'static str = "RepresentationID";
    pub const NUMBER: &'static str = "Number";
    pub const TIME: &'static str = "Time";
    pub const BANDWIDTH: &'static str = "Bandwidth";

    pub fn new() -> Self {
        Self {
            args: HashMap::with_capacity(4),
        }
    }

    /// Variables for a representation and, for media segments, the segment itself.
    ///
    /// A missing `@bandwidth` is rendered as `0`. A missing `@id` leaves
    /// `$RepresentationID$` unresolvable.
    pub fn with_context(representation: Option<&Attributes>, segment: Option<SegmentVars>) -> Self {
        let mut template = Self::new();
        if let Some(representation) = representation {
            if let Some(id) = representation.get("id") {
                template.insert(Self::REPRESENTATION_ID, id);
            }
            template.insert(
                Self::BANDWIDTH,
                representation.get_string("bandwidth", "0"),
            );
        }
        if let Some(segment) = segment {
            template.insert(Self::TIME, segment.time.to_string());
            template.insert(Self::NUMBER, segment.number.to_string());
        }
        template
    }

    pub fn insert(&mut self, key: &'static str, value: impl Into<String>) {
        self.args.insert(key, value.into());
    }

    pub fn resolve(&self, template: &str) -> ProxyResult<String> {
        let mut result = String::with_capacity(template.len());
        let mut last = 0;

        for caps in TEMPLATE_REGEX.captures_iter(template) {
            let whole = caps.get(0).unwrap();
            result.push_str(&template[last..whole.start()]);
            last = whole.end();

            let Some(key) = caps.get(1).map(|m| m.as_str()) else {
                result.push('$');
                continue;
            };
            let value = self.args.get(key).ok_or_else(|| {
                ProxyError::TemplateVariableMissing(key.to_string(), template.to_string())
            })?;

            match caps.get(2).and_then(|m| m.as_str().parse::<usize>().ok()) {
                Some(width) => result.push_str(&format!("{value:0>width$}")),
                None => result.push_str(value),
            }
        }
        result.push_str(&template[last..]);

        Ok(result)
    }
}

pub fn render_template(
    template: &str,
    representation: Option<&Attributes>,
    segment: Option<SegmentVars>,
) -> ProxyResult<String> {
    Template::with_context(representation, segment).resolve(template)
}
