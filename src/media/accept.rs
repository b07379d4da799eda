use super::media_type::MediaType;
use std::cmp::Ordering;
use tracing::debug;

/// Quality values are stored in thousandths so ordering stays exact.
const MAX_QUALITY: u16 = 1000;

/// One acceptable range from an `Accept` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceptEntry {
    media_type: MediaType,
    quality: u16,
}

impl AcceptEntry {
    #[must_use]
    pub fn media_type(&self) -> &MediaType {
        &self.media_type
    }

    /// Quality in thousandths (`q=0.5` is `500`).
    #[must_use]
    pub fn quality(&self) -> u16 {
        self.quality
    }
}

/// Parsed `Accept` header(s).
///
/// Acceptable ranges are sorted by quality then specificity (stable, so equal
/// entries keep header order). Ranges with `q=0` are kept apart as denials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceptHeader {
    acceptable: Vec<AcceptEntry>,
    denied: Vec<MediaType>,
}

/// Outcome of negotiating a list of produced types against an `Accept` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NegotiatedMatch {
    quality: u16,
    accept: MediaType,
    produced: MediaType,
    produced_index: usize,
}

impl NegotiatedMatch {
    #[must_use]
    pub fn quality(&self) -> u16 {
        self.quality
    }

    /// The acceptable range that matched.
    #[must_use]
    pub fn accept(&self) -> &MediaType {
        &self.accept
    }

    /// The declared produced type that matched.
    #[must_use]
    pub fn produced(&self) -> &MediaType {
        &self.produced
    }

    /// Position of the matched type in the declared produced list.
    #[must_use]
    pub fn produced_index(&self) -> usize {
        self.produced_index
    }

    /// The concrete type to put on the wire where one is known: the more
    /// specific of the produced type and the accepted range.
    #[must_use]
    pub fn resolved(&self) -> MediaType {
        self.produced.most_specific(&self.accept).clone()
    }
}

impl Default for AcceptHeader {
    fn default() -> Self {
        Self::wildcard()
    }
}

impl AcceptHeader {
    /// `Accept: */*`
    #[must_use]
    pub fn wildcard() -> Self {
        Self {
            acceptable: vec![AcceptEntry {
                media_type: MediaType::wildcard(),
                quality: MAX_QUALITY,
            }],
            denied: Vec::new(),
        }
    }

    /// Parse a single comma-separated header value. Malformed entries are
    /// dropped; an empty or fully malformed value means `*/*`.
    #[must_use]
    pub fn parse(value: &str) -> Self {
        Self::from_values(std::iter::once(value))
    }

    /// Parse every `Accept` header value of a request, in order.
    pub fn from_values<'a, I>(values: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut acceptable = Vec::new();
        let mut denied = Vec::new();
        let mut seen_any = false;

        for value in values {
            for raw in value.split(',') {
                let raw = raw.trim();
                if raw.is_empty() {
                    continue;
                }
                seen_any = true;
                let parsed = match MediaType::parse(raw) {
                    Ok(mt) => mt,
                    Err(err) => {
                        debug!(entry = raw, error = %err, "Dropping malformed Accept entry");
                        continue;
                    }
                };
                let Some(quality) = quality_of(&parsed) else {
                    debug!(entry = raw, "Dropping Accept entry with invalid q value");
                    continue;
                };
                let media_type = strip_quality(parsed);
                if quality == 0 {
                    denied.push(media_type);
                } else {
                    acceptable.push(AcceptEntry {
                        media_type,
                        quality,
                    });
                }
            }
        }

        if acceptable.is_empty() && (denied.is_empty() || !seen_any) {
            return Self::wildcard();
        }

        acceptable.sort_by(|a, b| {
            b.quality
                .cmp(&a.quality)
                .then_with(|| b.media_type.compare_specificity(&a.media_type))
        });

        Self { acceptable, denied }
    }

    #[must_use]
    pub fn acceptable(&self) -> &[AcceptEntry] {
        &self.acceptable
    }

    #[must_use]
    pub fn denied(&self) -> &[MediaType] {
        &self.denied
    }

    /// Acceptable ranges in preference order.
    #[must_use]
    pub fn media_types(&self) -> Vec<MediaType> {
        self.acceptable
            .iter()
            .map(|e| e.media_type.clone())
            .collect()
    }

    /// True when a `q=0` range explicitly refuses `media_type`.
    #[must_use]
    pub fn is_denied(&self, media_type: &MediaType) -> bool {
        self.denied.iter().any(|d| d.includes(media_type))
    }

    /// Quality of `media_type` under this header: the quality of the most
    /// specific compatible range, `None` when none matches or it is denied.
    #[must_use]
    pub fn quality_for(&self, media_type: &MediaType) -> Option<(u16, &MediaType)> {
        if self.is_denied(media_type) {
            return None;
        }
        self.acceptable
            .iter()
            .filter(|e| e.media_type.is_compatible(media_type))
            .max_by(|a, b| {
                a.media_type
                    .compare_specificity(&b.media_type)
                    .then_with(|| a.quality.cmp(&b.quality))
            })
            .map(|e| (e.quality, &e.media_type))
    }

    /// Pick the best of `produced` for this header.
    ///
    /// An empty `produced` list means "anything" (`*/*`). Ranking is quality,
    /// then specificity of the produced type, then specificity of the matched
    /// range; remaining ties go to the earliest declared type.
    #[must_use]
    pub fn best_match(&self, produced: &[MediaType]) -> Option<NegotiatedMatch> {
        let any = [MediaType::wildcard()];
        let produced = if produced.is_empty() { &any[..] } else { produced };

        let mut best: Option<NegotiatedMatch> = None;
        for (index, candidate) in produced.iter().enumerate() {
            let Some((quality, range)) = self.quality_for(candidate) else {
                continue;
            };
            let current = NegotiatedMatch {
                quality,
                accept: range.clone(),
                produced: candidate.clone(),
                produced_index: index,
            };
            let better = match &best {
                None => true,
                Some(b) => rank(&current, b) == Ordering::Greater,
            };
            if better {
                best = Some(current);
            }
        }
        best
    }
}

fn rank(a: &NegotiatedMatch, b: &NegotiatedMatch) -> Ordering {
    a.quality
        .cmp(&b.quality)
        .then_with(|| a.produced.compare_specificity(&b.produced))
        .then_with(|| a.accept.compare_specificity(&b.accept))
}

fn quality_of(mt: &MediaType) -> Option<u16> {
    match mt.parameter("q") {
        None => Some(MAX_QUALITY),
        Some(raw) => {
            let q: f32 = raw.trim().parse().ok()?;
            if !(0.0..=1.0).contains(&q) {
                return None;
            }
            Some((q * f32::from(MAX_QUALITY)).round() as u16)
        }
    }
}

fn strip_quality(mt: MediaType) -> MediaType {
    if mt.parameter("q").is_none() {
        return mt;
    }
    let mut stripped = mt.without_parameters();
    for (k, v) in mt.parameters() {
        if k != "q" {
            stripped = stripped.with_parameter(k, v);
        }
    }
    stripped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sorts_by_quality_then_specificity() {
        let accept = AcceptHeader::parse("*/*;q=0.1, text/*, text/html;q=0.9, text/plain");
        let order: Vec<String> = accept
            .acceptable()
            .iter()
            .map(|e| e.media_type().to_string())
            .collect();
        assert_eq!(order, vec!["text/plain", "text/*", "text/html", "*/*"]);
    }

    #[test]
    fn empty_header_means_wildcard() {
        assert_eq!(AcceptHeader::parse(""), AcceptHeader::wildcard());
        assert_eq!(AcceptHeader::parse("garbage"), AcceptHeader::wildcard());
    }

    #[test]
    fn zero_quality_is_a_denial() {
        let accept = AcceptHeader::parse("*/*, text/plain;q=0");
        assert!(accept.is_denied(&MediaType::text_plain()));
        assert!(accept
            .best_match(&[MediaType::text_plain()])
            .is_none());
        let best = accept
            .best_match(&[MediaType::text_plain(), MediaType::application_json()])
            .unwrap();
        assert_eq!(best.produced(), &MediaType::application_json());
    }

    #[test]
    fn most_specific_range_sets_quality() {
        let accept = AcceptHeader::parse("text/*;q=0.5, text/plain;q=0.2");
        let (q, range) = accept.quality_for(&MediaType::text_plain()).unwrap();
        assert_eq!(q, 200);
        assert_eq!(range, &MediaType::text_plain());
    }

    #[test]
    fn ties_go_to_first_declared() {
        let accept = AcceptHeader::wildcard();
        let best = accept
            .best_match(&[MediaType::application_json(), MediaType::text_plain()])
            .unwrap();
        assert_eq!(best.produced_index(), 0);
        assert_eq!(best.resolved(), MediaType::application_json());
    }

    #[test]
    fn resolved_prefers_concrete_range() {
        let accept = AcceptHeader::parse("application/json");
        let best = accept.best_match(&[]).unwrap();
        assert_eq!(best.resolved(), MediaType::application_json());
    }
}
