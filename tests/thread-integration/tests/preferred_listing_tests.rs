use souk_common::identity::CounterpartId;
use souk_common::{compute_preferred_listings, InboxState, ThreadAssembler};
use souk_thread_integration::MessageBuilder as M;

#[test]
fn later_listing_labels_the_counterpart() {
    let messages = vec![
        M::confirmed(1, 5).listing("L1").created_at("2024-01-01T00:00:00Z").build(),
        M::confirmed(2, 5).listing("L2").created_at("2024-02-01T00:00:00Z").build(),
    ];
    let preferred = compute_preferred_listings(&messages, |m| m.counterpart_id);
    assert_eq!(preferred.len(), 1);
    assert_eq!(preferred[&CounterpartId(5)].listing_document_id, "L2");
}

#[test]
fn tie_resolved_by_input_order() {
    let a = M::confirmed(1, 5).listing("L1").at(0).build();
    let b = M::confirmed(2, 5).listing("L2").at(0).build();

    let forward = compute_preferred_listings([&a, &b], |m| m.counterpart_id);
    let backward = compute_preferred_listings([&b, &a], |m| m.counterpart_id);
    assert_eq!(forward[&CounterpartId(5)].listing_document_id, "L2");
    assert_eq!(backward[&CounterpartId(5)].listing_document_id, "L1");
}

#[test]
fn input_is_left_untouched() {
    let messages = vec![
        M::confirmed(2, 5).listing(" L2 ").at(60).build(),
        M::confirmed(1, 5).listing("L1").at(0).build(),
    ];
    let before = messages.clone();
    let preferred = compute_preferred_listings(&messages, |m| m.counterpart_id);
    assert_eq!(messages, before);
    assert_eq!(preferred[&CounterpartId(5)].listing_document_id, "L2");
}

#[test]
fn one_entry_per_listed_counterpart() {
    let messages = vec![
        M::confirmed(1, 5).listing("L1").at(0).build(),
        M::confirmed(2, 6).at(10).build(),
        M::confirmed(3, 7).listing("L3").at(20).build(),
        M::confirmed(4, 7).listing("L4").at(10).build(),
        M::confirmed(5, 8).raw_counterpart(-8.0).listing("L5").at(10).build(),
    ];
    let preferred = compute_preferred_listings(&messages, |m| m.counterpart_id);
    assert_eq!(preferred.keys().copied().collect::<Vec<_>>(), vec![CounterpartId(5), CounterpartId(7)]);
    assert_eq!(preferred[&CounterpartId(7)].listing_document_id, "L3");
}

#[test]
fn inbox_labels_follow_arrival_order_on_ties() {
    let assembler = ThreadAssembler::default();
    let (state, _) = assembler.merge_batch(
        InboxState::new(),
        vec![M::confirmed(1, 5).listing("L1").at(0).build()],
    );
    let (state, _) = assembler.merge_batch(
        state,
        vec![M::confirmed(2, 5).listing("L2").at(0).build()],
    );
    assert_eq!(state.preferred_listings()[&CounterpartId(5)].listing_document_id, "L2");

    // Replaying the first batch re-delivers L1 but does not change its arrival slot.
    let (state, _) = assembler.merge_batch(
        state,
        vec![M::confirmed(1, 5).listing("L1").at(0).build()],
    );
    assert_eq!(state.preferred_listings()[&CounterpartId(5)].listing_document_id, "L2");
}

#[test]
fn merged_thread_spans_listings() {
    let (state, _) = ThreadAssembler::default().merge_batch(
        InboxState::new(),
        vec![
            M::confirmed(1, 5).listing("L1").at(0).build(),
            M::confirmed(2, 5).listing("L2").at(30).build(),
            M::confirmed(3, 5).listing("L1").at(60).build(),
            M::confirmed(4, 5).at(90).build(),
        ],
    );
    assert_eq!(state.len(), 3);

    let merged = state.merged_thread(CounterpartId(5)).unwrap();
    assert_eq!(merged.messages.len(), 4);
    let label = merged.label.unwrap();
    assert_eq!(label.listing_document_id, "L1");
    assert_eq!(label.last_activity, souk_thread_integration::t0().timestamp_millis() + 60_000);
}
