use super::{
    address::RepresentationAddress,
    document::{Document, NodeId},
};
use crate::error::{ProxyError, ProxyResult};

/// Read-only lookups of manifest elements by [`RepresentationAddress`].
pub struct MpdLocator<'a> {
    mpd: &'a Document,
}

impl<'a> MpdLocator<'a> {
    pub fn new(mpd: &'a Document) -> Self {
        Self { mpd }
    }

    pub fn period(&self, addr: &RepresentationAddress) -> ProxyResult<NodeId> {
        self.mpd
            .find_all(self.mpd.root(), "Period")
            .get(addr.period)
            .copied()
            .ok_or(ProxyError::NoPeriodFound(addr.period))
    }

    /// Text of the period's `BaseURL`, if any.
    pub fn base_url(&self, addr: &RepresentationAddress) -> ProxyResult<Option<&'a str>> {
        let period = self.period(addr)?;
        Ok(self
            .mpd
            .find(period, "BaseURL")
            .and_then(|node| self.mpd.text(node)))
    }

    pub fn adaptation_set(&self, addr: &RepresentationAddress) -> ProxyResult<NodeId> {
        let period = self.period(addr)?;
        let adaptation_sets = self.mpd.find_all(period, "AdaptationSet");
        adaptation_sets
            .get(addr.adaptation_set)
            .copied()
            .ok_or(ProxyError::OutOfRange {
                kind: "AdaptationSet",
                index: addr.adaptation_set,
                len: adaptation_sets.len(),
                address: *addr,
            })
    }

    pub fn representation(&self, addr: &RepresentationAddress) -> ProxyResult<NodeId> {
        let adaptation_set = self.adaptation_set(addr)?;
        let representations = self.mpd.find_all(adaptation_set, "Representation");
        representations
            .get(addr.representation)
            .copied()
            .ok_or(ProxyError::OutOfRange {
                kind: "Representation",
                index: addr.representation,
                len: representations.len(),
                address: *addr,
            })
    }

    /// The representation's own `SegmentTemplate`, falling back to the adaptation set's.
    pub fn segment_template(&self, addr: &RepresentationAddress) -> ProxyResult<NodeId> {
        let representation = self.representation(addr)?;
        if let Some(template) = self.mpd.find(representation, "SegmentTemplate") {
            return Ok(template);
        }

        let adaptation_set = self.adaptation_set(addr)?;
        self.mpd
            .find(adaptation_set, "SegmentTemplate")
            .ok_or(ProxyError::MissingSegmentTemplate(*addr))
    }

    /// `None` means there is nothing to download for this representation.
    pub fn segment_timeline(&self, addr: &RepresentationAddress) -> ProxyResult<Option<NodeId>> {
        let template = self.segment_template(addr)?;
        Ok(self.mpd.find(template, "SegmentTimeline"))
    }
}
