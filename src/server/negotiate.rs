//! `Accept` header negotiation.

pub const MIME_TEXT_SONG: &str = "text/song";
pub const MIME_TEXT_PLAIN: &str = "text/plain";
pub const MIME_TEXT_HTML: &str = "text/html";
pub const MIME_APPLICATION_JSON: &str = "application/json";

/// Representations a response can take, in order of preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Representation {
    Song,
    Plain,
    Html,
    Json,
}

impl Representation {
    const ALL: [Representation; 4] = [
        Representation::Song,
        Representation::Plain,
        Representation::Html,
        Representation::Json,
    ];

    #[must_use]
    pub const fn mime(self) -> &'static str {
        match self {
            Representation::Song => MIME_TEXT_SONG,
            Representation::Plain => MIME_TEXT_PLAIN,
            Representation::Html => MIME_TEXT_HTML,
            Representation::Json => MIME_APPLICATION_JSON,
        }
    }

    /// Picks the representation that best matches `accept`. A missing
    /// header accepts anything; when nothing is acceptable the answer is
    /// plain text.
    #[must_use]
    pub fn negotiate(accept: Option<&str>) -> Self {
        let ranges = parse_accept(accept.unwrap_or("*/*"));
        let mut best: Option<(Representation, f32)> = None;

        for candidate in Self::ALL {
            let quality = quality_of(candidate.mime(), &ranges);
            if quality <= 0.0 {
                continue;
            }
            if best.is_none_or(|(_, q)| quality > q) {
                best = Some((candidate, quality));
            }
        }

        best.map_or(Representation::Plain, |(r, _)| r)
    }
}

struct MediaRange<'a> {
    kind: &'a str,
    subtype: &'a str,
    quality: f32,
}

fn parse_accept(accept: &str) -> Vec<MediaRange<'_>> {
    accept
        .split(',')
        .filter_map(|part| {
            let mut pieces = part.split(';');
            let (kind, subtype) = pieces.next()?.trim().split_once('/')?;
            let mut quality = 1.0;
            for param in pieces {
                if let Some((name, value)) = param.trim().split_once('=') {
                    if name.trim() == "q" {
                        quality = value.trim().parse().unwrap_or(0.0);
                    }
                }
            }
            Some(MediaRange {
                kind: kind.trim(),
                subtype: subtype.trim(),
                quality,
            })
        })
        .collect()
}

/// Quality of `mime` under the most specific matching range.
fn quality_of(mime: &str, ranges: &[MediaRange<'_>]) -> f32 {
    let Some((kind, subtype)) = mime.split_once('/') else {
        return 0.0;
    };

    let mut best: Option<(u8, f32)> = None;
    for range in ranges {
        let specificity = match (range.kind, range.subtype) {
            (k, s) if k == kind && s == subtype => 2,
            (k, "*") if k == kind => 1,
            ("*", "*") => 0,
            _ => continue,
        };
        if best.is_none_or(|(s, _)| specificity > s) {
            best = Some((specificity, range.quality));
        }
    }
    best.map_or(0.0, |(_, q)| q)
}
