//! Property-based tests for domain value objects
//!
//! These tests use proptest to verify invariants across many random inputs.

use domain::{ModelId, ProviderKind};
use proptest::prelude::*;

mod provider_kind_tests {
    use super::*;

    proptest! {
        #[test]
        fn parse_never_yields_empty_remote(tag in "\\PC{0,24}") {
            match ProviderKind::parse(&tag) {
                ProviderKind::Local => {},
                ProviderKind::Remote(name) => prop_assert!(!name.is_empty()),
            }
        }

        #[test]
        fn display_then_parse_is_stable(tag in "[a-z][a-z0-9-]{0,16}") {
            let kind = ProviderKind::parse(&tag);
            prop_assert_eq!(ProviderKind::parse(&kind.to_string()), kind);
        }
    }
}

mod model_id_tests {
    use super::*;

    proptest! {
        #[test]
        fn ids_are_trimmed(id in "[a-zA-Z0-9._:-]{1,32}", pad in " {0,4}") {
            let padded = format!("{pad}{id}{pad}");
            let trimmed = ModelId::new(padded);
            prop_assert_eq!(trimmed.as_str(), id.as_str());
        }

        #[test]
        fn whitespace_only_ids_are_rejected(ws in "[ \\t]{0,8}") {
            prop_assert!(ModelId::parse(&ws).is_err());
        }
    }
}
