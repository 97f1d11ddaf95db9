//! Call-key namespaces
//!
//! A call-key identifies one logical call site within a workflow execution.
//! Three disjoint namespaces share the decider-visible key `k` (a decimal
//! counter assigned in call order):
//!
//! - activities are scheduled under `k` directly;
//! - sub-workflows are scheduled under `<uuid>-<k>`, because the service
//!   requires globally unique workflow ids; the suffix is recovered from
//!   incoming events;
//! - retry timers run under `<k>:t`.

use uuid::Uuid;

/// The timer id paired with a call-key.
pub fn timer_key(call_key: &str) -> String {
    format!("{call_key}:t")
}

/// Wrap a call-key into a globally unique child workflow id.
pub fn subworkflow_id(call_key: &str) -> String {
    format!("{}-{}", Uuid::new_v4(), call_key)
}

/// Recover the call-key from a child workflow id.
pub fn subworkflow_call_key(workflow_id: &str) -> String {
    match workflow_id.rsplit_once('-') {
        Some((_, key)) => key.to_string(),
        None => workflow_id.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_timer_key() {
        assert_eq!(timer_key("0"), "0:t");
        assert_eq!(timer_key("17"), "17:t");
    }

    #[test]
    fn test_subworkflow_round_trip() {
        let wrapped = subworkflow_id("4");
        assert_eq!(subworkflow_call_key(&wrapped), "4");
    }

    #[test]
    fn test_wrapped_ids_are_unique() {
        assert_ne!(subworkflow_id("0"), subworkflow_id("0"));
    }

    proptest! {
        // Counter-style keys always survive the wrap/extract round trip.
        #[test]
        fn prop_subworkflow_round_trip(key in "[0-9]{1,6}") {
            prop_assert_eq!(subworkflow_call_key(&subworkflow_id(&key)), key);
        }
    }
}
