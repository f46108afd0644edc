//! Address cleaning and query refinement for Korean addresses.
//!
//! Dataset address columns carry noise that the VWorld geocoder rejects:
//! - Alternate forms after a slash: `"성남대로 997 / 여수동 200"`
//! - Parenthesised annotations: `"수정로 100 (여수동)"`
//! - Stray CSV quoting
//!
//! The search pipeline additionally retries with a narrowed query that
//! keeps only the road (`…로`/`…길` plus building number) or parcel
//! (`…동`/`리`/`읍`/`면` plus lot number) fragment, since long
//! province/city prefixes sometimes make VWorld miss.

use regex::Regex;
use std::sync::LazyLock;

/// Non-greedy parenthesised annotation, used when cleaning ingestion
/// addresses.
static ANNOTATION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\(.*?\)").expect("valid regex"));

/// Parenthesised annotation with any leading whitespace, used before
/// refinement.
static SPACED_ANNOTATION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*\([^)]*\)").expect("valid regex"));

/// Road name ending in 로/길 followed by a building number
/// (e.g. `"성남대로 997"`, `"탄천상로151번길 20"`).
static ROAD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[가-힣a-zA-Z0-9·]+(?:로|길)\s*\d+-?\d*").expect("valid regex")
});

/// Dong/ri/eup/myeon name followed by a lot number (e.g. `"삼평동 717"`).
static PARCEL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[가-힣0-9]+(?:동|리|읍|면)\s*\d+-?\d*").expect("valid regex"));

/// Cleans a raw dataset address for forward geocoding.
///
/// Quotes are removed, anything after the first `/` is dropped, and
/// parenthesised annotations are stripped. The result may be empty.
#[must_use]
pub fn clean_address(raw: &str) -> String {
    let addr = raw.replace('"', "");
    let addr = addr.trim();
    let addr = addr.split('/').next().unwrap_or(addr).trim();
    ANNOTATION_RE.replace_all(addr, "").trim().to_string()
}

fn strip_annotations(query: &str) -> String {
    SPACED_ANNOTATION_RE.replace_all(query, "").trim().to_string()
}

/// Narrows a search query to its road-address fragment.
///
/// Returns the annotation-stripped query unchanged when no road fragment is
/// present.
#[must_use]
pub fn refine_road_query(query: &str) -> String {
    let cleaned = strip_annotations(query);
    ROAD_RE
        .find(&cleaned)
        .map_or(cleaned.clone(), |m| m.as_str().trim().to_string())
}

/// Narrows a search query to its parcel-address fragment.
///
/// Returns the annotation-stripped query unchanged when no parcel fragment
/// is present.
#[must_use]
pub fn refine_parcel_query(query: &str) -> String {
    let cleaned = strip_annotations(query);
    PARCEL_RE
        .find(&cleaned)
        .map_or(cleaned.clone(), |m| m.as_str().trim().to_string())
}

/// Whether a raw VWorld search response means "nothing found".
///
/// A missing response (transport failure) counts as not found.
#[must_use]
pub fn is_not_found(response: Option<&str>) -> bool {
    response.is_none_or(|body| {
        body.contains(r#""status":"NOT_FOUND""#) || body.contains(r#""total":"0""#)
    })
}
