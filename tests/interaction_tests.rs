use rum_agent::kernel::interaction::{RageClick, RageClickDetector};

#[test]
fn test_three_clicks_inside_window_fire_once() {
    let mut detector = RageClickDetector::new(3, 1000);

    assert_eq!(detector.observe("button", 0), None);
    assert_eq!(detector.observe("button", 300), None);
    assert_eq!(
        detector.observe("button", 600),
        Some(RageClick {
            element: "button".to_string(),
            count: 3
        })
    );
    assert_eq!(detector.history_len(), 0, "History is cleared after a rage click");

    // A fourth click starts a new burst instead of firing again.
    assert_eq!(detector.observe("button", 700), None);
}

#[test]
fn test_clicks_spread_past_window_do_not_fire() {
    let mut detector = RageClickDetector::new(3, 1000);

    assert_eq!(detector.observe("button", 0), None);
    assert_eq!(detector.observe("button", 600), None);
    assert_eq!(detector.observe("button", 1300), None, "First click fell out of the window");
    assert_eq!(detector.history_len(), 2);
}

#[test]
fn test_window_is_exclusive_at_its_edge() {
    let mut detector = RageClickDetector::new(2, 1000);

    assert_eq!(detector.observe("a", 0), None);
    assert_eq!(detector.observe("a", 1000), None, "A click exactly one window old is expired");
    assert!(detector.observe("a", 1999).is_some());
}

#[test]
fn test_other_elements_count_separately() {
    let mut detector = RageClickDetector::new(3, 1000);

    detector.observe("a", 0);
    detector.observe("div", 100);
    detector.observe("a", 200);
    assert_eq!(detector.observe("div", 300), None);

    let rage = detector.observe("a", 400).expect("third click on <a> fires");
    assert_eq!(rage.count, 3);
    assert_eq!(detector.history_len(), 0, "Whole history is cleared, other elements included");
}

#[test]
fn test_zero_threshold_is_clamped() {
    let mut detector = RageClickDetector::new(0, 0);
    let rage = detector.observe("button", 5).expect("threshold clamps to one");
    assert_eq!(rage.count, 1);
}
