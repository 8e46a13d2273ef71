//! Binary-searched extension→type and extension→encoding maps, grounded on
//! the original implementation's `enc_tab`/`typ_tab` (sorted for bsearch)
//! and `figure_mime`'s iterative suffix-peeling: an extension is peeled off
//! the filename one dot-segment at a time, first checking the encoding
//! table, then the type table, falling back to `text/html` if nothing
//! matches.

/// (extension without leading dot, MIME type or encoding name). Kept sorted
/// by extension so lookups are a binary search, matching the original's
/// qsort-then-bsearch discipline.
const ENCODINGS: &[(&str, &str)] = &[("gz", "gzip"), ("Z", "compress")];

const TYPES: &[(&str, &str)] = &[
    ("asc", "application/pgp-keys"),
    ("bz2", "application/x-bzip2"),
    ("css", "text/css"),
    ("csv", "text/csv"),
    ("gif", "image/gif"),
    ("gpg", "application/pgp-encrypted"),
    ("htm", "text/html"),
    ("html", "text/html"),
    ("ico", "image/x-icon"),
    ("jpeg", "image/jpeg"),
    ("jpg", "image/jpeg"),
    ("js", "application/javascript"),
    ("json", "application/json"),
    ("pdf", "application/pdf"),
    ("pgp", "application/pgp-keys"),
    ("png", "image/png"),
    ("sig", "application/pgp-signature"),
    ("svg", "image/svg+xml"),
    ("tar", "application/x-tar"),
    ("txt", "text/plain"),
    ("xml", "application/xml"),
    ("zip", "application/zip"),
];

const DEFAULT_TYPE: &str = "text/html";

fn bsearch_ext<'a>(table: &'a [(&str, &str)], ext: &str) -> Option<&'a str> {
    table
        .binary_search_by(|(e, _)| e.cmp(&ext))
        .ok()
        .map(|i| table[i].1)
}

/// Result of MIME figuring: the content type (with charset applied by the
/// caller) and an optional `Content-Encoding`.
pub struct MimeResult {
    pub content_type: &'static str,
    pub content_encoding: Option<&'static str>,
}

/// Peels dot-separated suffixes off `filename` right to left. The first
/// suffix is checked against the encoding table; if it matches, peel it and
/// check the next suffix against the type table. A lone type-table hit (no
/// encoding suffix) is the common case.
pub fn figure_mime(filename: &str) -> MimeResult {
    let mut encoding = None;
    let mut rest = filename;

    if let Some((stem, ext)) = rsplit_ext(rest) {
        if let Some(enc) = bsearch_ext(ENCODINGS, ext) {
            encoding = Some(enc);
            rest = stem;
        }
    }

    let content_type = rsplit_ext(rest)
        .and_then(|(_, ext)| bsearch_ext(TYPES, ext))
        .unwrap_or(DEFAULT_TYPE);

    MimeResult { content_type, content_encoding: encoding }
}

fn rsplit_ext(name: &str) -> Option<(&str, &str)> {
    let dot = name.rfind('.')?;
    if dot == 0 {
        return None;
    }
    Some((&name[..dot], &name[dot + 1..]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_type_extension() {
        let m = figure_mime("index.html");
        assert_eq!(m.content_type, "text/html");
        assert!(m.content_encoding.is_none());
    }

    #[test]
    fn encoding_then_type_peeled_in_order() {
        let m = figure_mime("archive.tar.gz");
        assert_eq!(m.content_type, "application/x-tar");
        assert_eq!(m.content_encoding, Some("gzip"));
    }

    #[test]
    fn unknown_extension_falls_back_to_default() {
        let m = figure_mime("weird.xyz123");
        assert_eq!(m.content_type, DEFAULT_TYPE);
    }

    #[test]
    fn no_extension_falls_back_to_default() {
        let m = figure_mime("README");
        assert_eq!(m.content_type, DEFAULT_TYPE);
    }

    #[test]
    fn tables_are_sorted_for_binary_search() {
        assert!(ENCODINGS.windows(2).all(|w| w[0].0 < w[1].0));
        assert!(TYPES.windows(2).all(|w| w[0].0 < w[1].0));
    }
}
