//! Property tests for version ordering and range containment

use proptest::prelude::*;

use rtx::domain::trust::{Version, VersionRange};

fn arbitrary_version() -> impl Strategy<Value = String> {
    (0u64..100, 0u64..100, 0u64..100, prop::option::of("[a-z]{1,5}")).prop_map(
        |(major, minor, patch, pre)| match pre {
            Some(pre) => format!("{major}.{minor}.{patch}-{pre}"),
            None => format!("{major}.{minor}.{patch}"),
        },
    )
}

proptest! {
    #[test]
    fn ordering_is_reflexive(raw in arbitrary_version()) {
        let version = Version::parse(&raw);
        prop_assert_eq!(version.cmp(&version), std::cmp::Ordering::Equal);
    }

    #[test]
    fn ordering_is_antisymmetric(a in arbitrary_version(), b in arbitrary_version()) {
        let left = Version::parse(&a);
        let right = Version::parse(&b);
        prop_assert_eq!(left.cmp(&right), right.cmp(&left).reverse());
    }

    #[test]
    fn ordering_is_transitive(
        a in arbitrary_version(),
        b in arbitrary_version(),
        c in arbitrary_version(),
    ) {
        let mut versions = vec![Version::parse(&a), Version::parse(&b), Version::parse(&c)];
        versions.sort();
        prop_assert!(versions[0] <= versions[1] && versions[1] <= versions[2]);
        prop_assert!(versions[0] <= versions[2]);
    }

    #[test]
    fn pre_release_precedes_its_release(
        major in 0u64..100,
        minor in 0u64..100,
        pre in "[a-z]{1,5}",
    ) {
        let release = Version::parse(&format!("{major}.{minor}.0"));
        let pre_release = Version::parse(&format!("{major}.{minor}.0-{pre}"));
        prop_assert!(pre_release < release);
    }

    #[test]
    fn half_open_range_never_contains_its_fixed_bound(
        introduced in arbitrary_version(),
        fixed in arbitrary_version(),
    ) {
        let range = VersionRange {
            introduced: Some(Version::parse(&introduced)),
            fixed: Some(Version::parse(&fixed)),
            last_affected: None,
        };
        prop_assert!(!range.contains(&Version::parse(&fixed)));
    }

    #[test]
    fn parsing_never_panics(raw in "\\PC{0,40}") {
        let _ = Version::parse(&raw);
    }
}
