//! Media classification and size filtering.
//!
//! Everything here is a pure function of its inputs so filter decisions can
//! be replayed at any time with the same outcome.

use crate::tg::api::{MediaInfo, PhotoSizeInfo};

/// The four media kinds the crawler distinguishes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MediaKind {
    Photo,
    Video,
    Audio,
    File,
}

impl MediaKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MediaKind::Photo => "photo",
            MediaKind::Video => "video",
            MediaKind::Audio => "audio",
            MediaKind::File => "file",
        }
    }

    pub fn parse(s: &str) -> Option<MediaKind> {
        match s.trim() {
            "photo" => Some(MediaKind::Photo),
            "video" => Some(MediaKind::Video),
            "audio" => Some(MediaKind::Audio),
            "file" => Some(MediaKind::File),
            _ => None,
        }
    }

    /// Extension used when neither the filename nor the mime type yields one.
    pub fn default_ext(self) -> &'static str {
        match self {
            MediaKind::Photo => "jpg",
            MediaKind::Video => "mp4",
            MediaKind::Audio => "mp3",
            MediaKind::File => "dat",
        }
    }
}

/// A subset of [`MediaKind`]s, as configured per channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MediaKindSet(u8);

impl MediaKindSet {
    pub fn all() -> Self {
        MediaKindSet(0b1111)
    }

    pub fn empty() -> Self {
        MediaKindSet(0)
    }

    fn bit(kind: MediaKind) -> u8 {
        match kind {
            MediaKind::Photo => 1,
            MediaKind::Video => 2,
            MediaKind::Audio => 4,
            MediaKind::File => 8,
        }
    }

    pub fn insert(&mut self, kind: MediaKind) {
        self.0 |= Self::bit(kind);
    }

    pub fn contains(self, kind: MediaKind) -> bool {
        self.0 & Self::bit(kind) != 0
    }

    /// Parse a comma-separated kind list, e.g. `"photo,video"`.
    ///
    /// `"_"` is the config placeholder for "unset"; it and any spec with no
    /// recognizable kind fall back to allowing everything. Unknown tokens
    /// are ignored.
    pub fn parse(spec: &str) -> MediaKindSet {
        if spec.trim() == "_" {
            return MediaKindSet::all();
        }
        let mut set = MediaKindSet::empty();
        for token in spec.split(',') {
            if let Some(kind) = MediaKind::parse(token) {
                set.insert(kind);
            }
        }
        if set == MediaKindSet::empty() {
            MediaKindSet::all()
        } else {
            set
        }
    }
}

/// Classify a media descriptor into one of the downloadable kinds.
///
/// `File` is a document whose only attribute is its filename. Documents with
/// other attribute combinations (stickers, animated emoji) fall outside the
/// four kinds and are not downloadable.
pub fn classify(media: &MediaInfo) -> Option<MediaKind> {
    match media {
        MediaInfo::Photo(_) => Some(MediaKind::Photo),
        MediaInfo::Document(doc) => {
            if doc.is_video {
                Some(MediaKind::Video)
            } else if doc.is_audio {
                Some(MediaKind::Audio)
            } else if doc.file_name.is_some() && doc.attr_count == 1 {
                Some(MediaKind::File)
            } else {
                None
            }
        }
    }
}

/// Parse a `"min-max"` size range into inclusive byte bounds.
///
/// Bounds are plain byte counts with an optional base-1024 `k`/`m`/`g`
/// suffix. Reversed bounds are normalized. Returns `None` when either bound
/// does not parse, which callers must treat as "no filter".
pub fn parse_range(spec: &str) -> Option<(u64, u64)> {
    let (lo, hi) = spec.split_once('-')?;
    let lo = parse_bytes(lo)?;
    let hi = parse_bytes(hi)?;
    Some((lo.min(hi), lo.max(hi)))
}

fn parse_bytes(s: &str) -> Option<u64> {
    let s = s.trim();
    let (digits, multiplier) = match s.chars().last()? {
        'k' | 'K' => (&s[..s.len() - 1], 1024),
        'm' | 'M' => (&s[..s.len() - 1], 1024 * 1024),
        'g' | 'G' => (&s[..s.len() - 1], 1024 * 1024 * 1024),
        _ => (s, 1),
    };
    digits.trim().parse::<u64>().ok().map(|n| n * multiplier)
}

/// Decide whether a media of `size` bytes passes the configured range.
///
/// Unknown sizes and unparsable ranges err on the side of downloading.
pub fn size_allowed(size: Option<i64>, range: Option<&str>) -> bool {
    let Some(size) = size else { return true };
    let Some(range) = range else { return true };
    match parse_range(range) {
        Some((lo, hi)) => {
            let size = size.max(0) as u64;
            lo <= size && size <= hi
        }
        None => true,
    }
}

/// Byte size of a media descriptor, if it can be determined.
///
/// Photos use their largest size; progressive photo sizes count as the
/// largest of their steps.
pub fn media_size(media: &MediaInfo) -> Option<i64> {
    match media {
        MediaInfo::Photo(photo) => photo.byte_size(),
        MediaInfo::Document(doc) => Some(doc.size),
    }
}

pub(crate) fn photo_size_bytes(size: &PhotoSizeInfo) -> i64 {
    match size {
        PhotoSizeInfo::Plain { bytes, .. } => *bytes,
        PhotoSizeInfo::Progressive { steps, .. } => {
            steps.iter().copied().max().unwrap_or(0) as i64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tg::api::DocumentInfo;

    fn doc(is_video: bool, is_audio: bool, file_name: Option<&str>, attr_count: usize) -> MediaInfo {
        MediaInfo::Document(DocumentInfo {
            id: 1,
            access_hash: 2,
            file_reference: vec![],
            dc_id: 2,
            size: 1024,
            mime_type: "application/octet-stream".to_string(),
            file_name: file_name.map(|s| s.to_string()),
            is_video,
            is_audio,
            attr_count,
        })
    }

    #[test]
    fn test_classify_documents() {
        assert_eq!(classify(&doc(true, false, Some("a.mp4"), 2)), Some(MediaKind::Video));
        assert_eq!(classify(&doc(false, true, Some("a.mp3"), 2)), Some(MediaKind::Audio));
        assert_eq!(classify(&doc(false, false, Some("a.zip"), 1)), Some(MediaKind::File));
        // A document with a filename plus another attribute is not a plain file.
        assert_eq!(classify(&doc(false, false, Some("a.webp"), 2)), None);
        assert_eq!(classify(&doc(false, false, None, 0)), None);
    }

    #[test]
    fn test_parse_range() {
        assert_eq!(parse_range("0-1048576"), Some((0, 1048576)));
        assert_eq!(parse_range("1048576-0"), Some((0, 1048576)));
        assert_eq!(parse_range("1k-2m"), Some((1024, 2 * 1024 * 1024)));
        assert_eq!(parse_range("10"), None);
        assert_eq!(parse_range("a-b"), None);
    }

    #[test]
    fn test_size_allowed() {
        assert!(size_allowed(Some(500), Some("0-1024")));
        assert!(!size_allowed(Some(2048), Some("0-1024")));
        assert!(size_allowed(Some(1024), Some("0-1024")), "bounds are inclusive");
        // Unknown size and broken ranges err on downloading.
        assert!(size_allowed(None, Some("0-1024")));
        assert!(size_allowed(Some(1 << 30), Some("oops-1024")));
        assert!(size_allowed(Some(1 << 30), None));
    }

    #[test]
    fn test_filter_idempotence() {
        // Filtering is a pure decision: evaluating it twice never flips it.
        for size in [None, Some(0), Some(1024), Some(1 << 30)] {
            for range in [None, Some("0-1024"), Some("bad-range")] {
                let once = size_allowed(size, range);
                let twice = size_allowed(size, range);
                assert_eq!(once, twice);
            }
        }
    }

    #[test]
    fn test_media_kind_set() {
        let set = MediaKindSet::parse("photo,video");
        assert!(set.contains(MediaKind::Photo));
        assert!(set.contains(MediaKind::Video));
        assert!(!set.contains(MediaKind::Audio));
        assert!(!set.contains(MediaKind::File));

        assert_eq!(MediaKindSet::parse("_"), MediaKindSet::all());
        assert_eq!(MediaKindSet::parse(""), MediaKindSet::all());
        assert_eq!(MediaKindSet::parse("bogus"), MediaKindSet::all());
        assert!(MediaKindSet::parse("audio,bogus").contains(MediaKind::Audio));
    }
}
