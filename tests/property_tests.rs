//! Property-Based Tests for Sideload
//!
//! Uses proptest for testing invariants and edge cases
//!
//! These tests verify:
//! - Identifier inference never panics and its successes are well formed
//! - Names built from the OBB naming scheme infer back to their identifier
//! - Chunked copies reproduce their input for any chunk size

use proptest::prelude::*;
use sideload::identifier::{infer, InferenceError, MARKER_TOKENS};
use sideload::pipeline_state::PipelineState;
use sideload::staging::copy_stream;

// =============================================================================
// Identifier Inference Property Tests
// =============================================================================

/// Strategy for a single non-empty identifier component
fn component_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z][a-zA-Z0-9_]{0,11}"
}

fn identifier_strategy() -> impl Strategy<Value = String> {
    prop::collection::vec(component_strategy(), 1..6).prop_map(|parts| parts.join("."))
}

fn marker_strategy() -> impl Strategy<Value = &'static str> {
    prop_oneof![Just(MARKER_TOKENS[0]), Just(MARKER_TOKENS[1])]
}

proptest! {
    /// Inference is total over printable ASCII names
    #[test]
    fn infer_never_panics(name in "[ -~]{0,64}") {
        let _ = infer(&name);
    }

    /// Any inferred identifier is a non-empty dot-joined list of clean components
    #[test]
    fn inferred_identifier_is_well_formed(name in "[a-z0-9./]{0,48}") {
        if let Ok(id) = infer(&name) {
            prop_assert!(!id.as_str().is_empty());
            for part in id.components() {
                prop_assert!(!part.is_empty());
                prop_assert!(!part.contains('/'));
            }
            prop_assert!(name.contains(id.as_str()));
        }
    }

    /// main.<version>.<identifier>.obb infers back to <identifier>
    #[test]
    fn scheme_names_roundtrip(
        marker in marker_strategy(),
        version in 0u32..100_000,
        id in identifier_strategy(),
    ) {
        let name = format!("{}.{}.{}.obb", marker, version, id);
        let inferred = infer(&name).expect("scheme name should infer");
        prop_assert_eq!(inferred.as_str(), id.as_str());
    }

    /// Prefix tokens before the marker are ignored
    #[test]
    fn leading_tokens_are_skipped(
        prefix in prop::collection::vec("[a-z]{1,6}", 0..3),
        id in identifier_strategy(),
    ) {
        prop_assume!(!prefix.iter().any(|t| MARKER_TOKENS.contains(&t.as_str())));
        let mut tokens = prefix.clone();
        tokens.push("main".to_string());
        tokens.push("7".to_string());
        tokens.push(id.clone());
        tokens.push("obb".to_string());
        let name = tokens.join(".");
        let inferred = infer(&name).expect("should infer");
        prop_assert_eq!(inferred.as_str(), id.as_str());
    }

    /// Names without any marker token never infer
    #[test]
    fn names_without_marker_fail(tokens in prop::collection::vec("[a-z0-9]{1,8}", 4..8)) {
        prop_assume!(!tokens.iter().any(|t| MARKER_TOKENS.contains(&t.as_str())));
        let name = tokens.join(".");
        prop_assert_eq!(infer(&name), Err(InferenceError::NoMarkerToken));
    }

    /// Chunked copy reproduces the input for any positive chunk size
    #[test]
    fn copy_stream_is_exact(
        data in prop::collection::vec(any::<u8>(), 0..20_000),
        chunk in 1usize..10_000,
    ) {
        let mut out = Vec::new();
        let copied = copy_stream(&mut data.as_slice(), &mut out, chunk).unwrap();
        prop_assert_eq!(copied, data.len() as u64);
        prop_assert_eq!(out, data);
    }
}

// =============================================================================
// Pipeline State Property Tests
// =============================================================================

proptest! {
    /// Following `next` from Idle visits every stage once, in order
    #[test]
    fn next_walks_forward(steps in 0usize..10) {
        let mut state = PipelineState::Idle;
        for _ in 0..steps {
            match state.next() {
                Some(next) => {
                    prop_assert!(next.order() > state.order());
                    state = next;
                }
                None => {
                    prop_assert_eq!(state, PipelineState::Succeeded);
                    break;
                }
            }
        }
    }
}
