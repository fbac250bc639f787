//! Tests for the fault event model

use super::*;

#[test]
fn test_first_decision_wins() {
    let mut fault = FaultEvent::new("app/crash");

    fault.record_sample_decision(true, "sampled");
    assert_eq!(fault.is_included_in_watson_sample(), Some(true));

    // A later evaluation must not overwrite the decision, only provenance.
    fault.record_sample_decision(false, "budget");
    assert_eq!(fault.is_included_in_watson_sample(), Some(true));
    assert_eq!(
        fault.event().reserved(reserved::WATSON_DECISION_SOURCE),
        Some(&PropertyValue::from("budget"))
    );
}

#[test]
fn test_for_current_process_tags_pid() {
    let fault = FaultEvent::for_current_process("beacon/pipeline/poisonevent");
    let pid = fault
        .event()
        .reserved_integer(reserved::FAULT_PROCESS_ID)
        .unwrap();
    assert_eq!(pid, std::process::id() as i64);
}

#[test]
fn test_into_event_folds_fields() {
    let mut fault = FaultEvent::new("app/crash")
        .with_exception("index out of range")
        .with_dump("/tmp/crash.dmp");
    fault.record_sample_decision(true, "sampled");

    let event = fault.into_event();
    assert_eq!(
        event.property("fault.exception"),
        Some(&PropertyValue::from("index out of range"))
    );
    assert_eq!(
        event.property("fault.dump"),
        Some(&PropertyValue::from("/tmp/crash.dmp"))
    );
    assert_eq!(
        event.property("fault.watsonincluded").and_then(PropertyValue::as_bool),
        Some(true)
    );
}

#[test]
fn test_opt_in_default_is_unspecified() {
    let fault = FaultEvent::new("app/crash");
    assert_eq!(fault.user_opt_in(), WatsonOptIn::Unspecified);

    let fault = fault.with_opt_in(WatsonOptIn::PropertyOptOut);
    assert_eq!(fault.user_opt_in(), WatsonOptIn::PropertyOptOut);
}
