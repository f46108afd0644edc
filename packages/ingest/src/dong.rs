//! Approximate centroids of Seongnam-si administrative dongs.
//!
//! Population rows are keyed by district and dong name only; this table
//! places the common dongs without a geocoding round trip. Lookup is by
//! substring containment so that qualified names such as `"분당구 삼평동"`
//! still match. The table is scanned in order and the first key contained
//! in the input wins. No key currently contains another, but the rule is
//! order-dependent if one ever does.

use risk_map_point_models::Coordinates;

/// One table entry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DongCentroid {
    /// District (gu) the dong belongs to. Informational only.
    pub district: &'static str,
    /// Dong name, matched as a substring of the input.
    pub dong: &'static str,
    /// Approximate centroid.
    pub coordinates: Coordinates,
}

const fn entry(district: &'static str, dong: &'static str, lat: f64, lon: f64) -> DongCentroid {
    DongCentroid {
        district,
        dong,
        coordinates: Coordinates::new(lat, lon),
    }
}

/// Known dong centroids in lookup order.
pub static DONG_CENTROIDS: &[DongCentroid] = &[
    // ── 수정구 ──
    entry("수정구", "신흥1동", 37.441, 127.140),
    entry("수정구", "신흥2동", 37.446, 127.146),
    entry("수정구", "신흥3동", 37.438, 127.144),
    entry("수정구", "태평1동", 37.439, 127.126),
    entry("수정구", "태평2동", 37.443, 127.129),
    entry("수정구", "태평3동", 37.440, 127.132),
    entry("수정구", "태평4동", 37.445, 127.133),
    entry("수정구", "수진1동", 37.436, 127.131),
    entry("수정구", "수진2동", 37.438, 127.124),
    entry("수정구", "단대동", 37.452, 127.158),
    entry("수정구", "산성동", 37.456, 127.150),
    entry("수정구", "양지동", 37.452, 127.165),
    entry("수정구", "복정동", 37.456, 127.127),
    entry("수정구", "고등동", 37.429, 127.103),
    entry("수정구", "신촌동", 37.433, 127.098),
    // ── 중원구 ──
    entry("중원구", "성남동", 37.436, 127.142),
    entry("중원구", "중앙동", 37.442, 127.152),
    entry("중원구", "금광1동", 37.446, 127.162),
    entry("중원구", "금광2동", 37.450, 127.168),
    entry("중원구", "은행1동", 37.454, 127.164),
    entry("중원구", "은행2동", 37.458, 127.169),
    entry("중원구", "상대원1동", 37.439, 127.172),
    entry("중원구", "상대원2동", 37.435, 127.165),
    entry("중원구", "상대원3동", 37.431, 127.176),
    entry("중원구", "하대원동", 37.428, 127.153),
    entry("중원구", "도촌동", 37.422, 127.162),
    // ── 분당구 ──
    entry("분당구", "분당동", 37.368, 127.135),
    entry("분당구", "수내1동", 37.378, 127.113),
    entry("분당구", "수내2동", 37.374, 127.119),
    entry("분당구", "수내3동", 37.366, 127.124),
    entry("분당구", "정자1동", 37.365, 127.106),
    entry("분당구", "정자2동", 37.358, 127.115),
    entry("분당구", "정자3동", 37.352, 127.112),
    entry("분당구", "서현1동", 37.388, 127.132),
    entry("분당구", "서현2동", 37.381, 127.140),
    entry("분당구", "이매1동", 37.397, 127.127),
    entry("분당구", "이매2동", 37.404, 127.120),
    entry("분당구", "야탑1동", 37.408, 127.130),
    entry("분당구", "야탑2동", 37.411, 127.122),
    entry("분당구", "야탑3동", 37.418, 127.142),
    entry("분당구", "판교동", 37.391, 127.086),
    entry("분당구", "삼평동", 37.401, 127.111),
    entry("분당구", "백현동", 37.387, 127.107),
    entry("분당구", "운중동", 37.392, 127.054),
];

/// Finds the first table entry whose dong name is contained in `name`.
#[must_use]
pub fn lookup(name: &str) -> Option<&'static DongCentroid> {
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    DONG_CENTROIDS.iter().find(|entry| name.contains(entry.dong))
}

/// Resolves a dong name to its approximate centroid.
#[must_use]
pub fn resolve(name: &str) -> Option<Coordinates> {
    lookup(name).map(|entry| entry.coordinates)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;

    #[test]
    fn resolves_qualified_name_by_substring() {
        let coords = resolve("분당구 삼평동").unwrap();
        assert!((coords.latitude - 37.401).abs() < f64::EPSILON);
        assert!((coords.longitude - 127.111).abs() < f64::EPSILON);
    }

    #[test]
    fn trims_input() {
        assert_eq!(lookup("  백현동 ").unwrap().dong, "백현동");
    }

    #[test]
    fn unknown_dong_has_no_match() {
        assert!(resolve("역삼동").is_none());
        assert!(resolve("").is_none());
        assert!(resolve("   ").is_none());
    }

    #[test]
    fn keys_are_unique_and_in_range() {
        let mut seen = BTreeSet::new();
        for entry in DONG_CENTROIDS {
            assert!(seen.insert(entry.dong), "Duplicate dong: {}", entry.dong);
            assert!((37.0..38.0).contains(&entry.coordinates.latitude));
            assert!((126.5..127.5).contains(&entry.coordinates.longitude));
        }
        assert_eq!(DONG_CENTROIDS.len(), 44);
    }
}
