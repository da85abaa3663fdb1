use page_cache::LruReplacer;

#[test]
fn victims_come_out_in_unpin_order() {
    let replacer = LruReplacer::new();
    replacer.unpin(1);
    replacer.unpin(2);
    replacer.unpin(3);
    assert_eq!(replacer.size(), 3);

    assert_eq!(replacer.victim(), Some(1));
    assert_eq!(replacer.victim(), Some(2));
    assert_eq!(replacer.victim(), Some(3));
    assert_eq!(replacer.victim(), None);
    assert_eq!(replacer.size(), 0);
}

#[test]
fn pin_removes_a_frame_from_tracking() {
    let replacer = LruReplacer::new();
    for frame_id in 1..=5 {
        replacer.unpin(frame_id);
    }

    // Frames 3 and 4 are back in use; they must not be offered as victims.
    replacer.pin(3);
    replacer.pin(4);

    assert_eq!(replacer.victim(), Some(1));
    assert_eq!(replacer.victim(), Some(2));
    assert_eq!(replacer.victim(), Some(5));
    assert_eq!(replacer.victim(), None);
}

#[test]
fn second_unpin_sets_recency() {
    let replacer = LruReplacer::new();
    replacer.unpin(1);
    replacer.unpin(2);
    replacer.unpin(3);

    // Frame 1 is used again: pinned, then unpinned. Its recency is the
    // second unpin, so it becomes the most recently used frame.
    replacer.pin(1);
    replacer.unpin(1);

    assert_eq!(replacer.victim(), Some(2));
    assert_eq!(replacer.victim(), Some(3));
    assert_eq!(replacer.victim(), Some(1));
}

#[test]
fn pin_of_untracked_frame_is_a_noop() {
    let replacer = LruReplacer::new();
    replacer.unpin(1);
    replacer.unpin(2);

    replacer.pin(99);

    assert_eq!(replacer.size(), 2);
    assert_eq!(replacer.victim(), Some(1));
    assert_eq!(replacer.victim(), Some(2));
}

#[test]
fn repeated_unpin_keeps_original_position() {
    let replacer = LruReplacer::new();
    replacer.unpin(1);
    replacer.unpin(2);

    // Already tracked: a second unpin without an intervening pin does not
    // refresh recency.
    replacer.unpin(1);

    assert_eq!(replacer.size(), 2);
    assert_eq!(replacer.victim(), Some(1));
    assert_eq!(replacer.victim(), Some(2));
}

#[test]
fn victim_on_empty_replacer_is_none() {
    let replacer = LruReplacer::new();
    assert_eq!(replacer.victim(), None);
    assert_eq!(replacer.size(), 0);
}
