//! Scanner traversal and controller lifecycle over `VirtualElement` trees.

use super::*;
use crate::config::{ProbeConfig, ScanConfig};
use crate::session::{Clock, HitSource, ManualClock, MemoryStorage, SessionContext, SessionHandle};

const PAGE: &str = "https://www.example-resort.com/book/";

fn scanner() -> DomRangeScanner {
    DomRangeScanner::new(&ScanConfig::default()).unwrap()
}

fn cell(id: &str, from: &str, to: &str) -> VirtualElement {
    VirtualElement::new("range-datepicker-cell")
        .attr("id", id)
        .attr("date-from", from)
        .attr("date-to", to)
}

fn session(clock: &ManualClock) -> SessionHandle {
    SessionContext::start(ProbeConfig::default(), MemoryStorage::new(), clock.clone()).into_handle()
}

// ============================================================================
// Scanner
// ============================================================================

#[test]
fn test_single_cell_three_days() {
    let doc = VirtualElement::new("html").child(
        VirtualElement::new("div").child(VirtualElement::new("td").attr("date-from", "1700000000").attr("date-to", "1700259200")),
    );
    let report = scanner().scan(&doc, PAGE, 1);

    assert_eq!(report.all.len(), 1);
    let c = &report.all[0];
    assert_eq!(c.tag, "td");
    assert_eq!(c.frame, PAGE);
    assert_eq!(c.duration_days, Some(3));
    assert_eq!(c.end_inclusive_iso.as_deref(), Some("2023-11-17T22:13:19.000Z"));
    assert_eq!(report.stats.elements_visited, 3);
    assert_eq!(report.stats.pass, 1);
    assert!(report.is_qualifying());
}

#[test]
fn test_duplicate_ranges_counted() {
    let doc = VirtualElement::new("html")
        .child(cell("a", "1700000000", "1700259200"))
        .child(cell("b", "1700000000", "1700259200"))
        .child(cell("c", "1700086400", "1700172800"));
    let report = scanner().scan(&doc, PAGE, 1);

    assert_eq!(report.stats.candidates, 3);
    assert_eq!(report.stats.unique_ranges, 2);
    let top = report.top().unwrap();
    assert_eq!(top.count, 2);
    assert_eq!(top.range.element_id.as_deref(), Some("a"));
}

#[test]
fn test_blocked_frame_does_not_fail_scan() {
    let doc = VirtualElement::new("html")
        .child(
            VirtualElement::new("iframe")
                .attr("src", "https://pay.other.net/widget")
                .attr("referrerpolicy", "no-referrer")
                .blocked_frame("SecurityError: Blocked a frame with origin"),
        )
        .child(cell("a", "1700000000", "1700259200"));
    let report = scanner().scan(&doc, PAGE, 1);

    assert_eq!(report.blocked.len(), 1);
    let blocked = &report.blocked[0];
    assert!(!blocked.reason.is_empty());
    assert_eq!(blocked.src.as_deref(), Some("https://pay.other.net/widget"));
    assert_eq!(blocked.referrer_policy.as_deref(), Some("no-referrer"));
    assert_eq!(report.stats.frames_blocked, 1);
    assert_eq!(report.all.len(), 1);
}

#[test]
fn test_document_order_with_frames_and_shadow_roots() {
    let frame_doc = VirtualElement::new("html").child(cell("in-frame", "3", "4"));
    let host = VirtualElement::new("date-picker")
        .shadow_child(cell("in-shadow", "5", "6"))
        .child(cell("light", "7", "8"));
    let doc = VirtualElement::new("html")
        .child(cell("first", "1", "2"))
        .child(VirtualElement::new("iframe").frame_document("https://www.example-resort.com/cal", frame_doc))
        .child(host)
        .child(cell("last", "9", "10"));

    let report = scanner().scan(&doc, PAGE, 1);
    let ids: Vec<_> = report.all.iter().map(|c| c.element_id.clone().unwrap()).collect();
    assert_eq!(ids, vec!["first", "in-frame", "in-shadow", "light", "last"]);
    assert_eq!(report.all[1].frame, "https://www.example-resort.com/cal");
    assert_eq!(report.all[2].frame, PAGE);
    assert_eq!(report.stats.frames_scanned, 1);
}

#[test]
fn test_frame_nesting_bounded() {
    let mut inner = VirtualElement::new("html").child(cell("deep", "1", "2"));
    for level in (1..=4).rev() {
        inner = VirtualElement::new("html")
            .child(VirtualElement::new("iframe").frame_document(&format!("https://f{}.example.com/", level), inner));
    }
    let report = scanner().scan(&inner, PAGE, 1);
    assert_eq!(report.stats.frames_scanned, 3);
    assert!(report.all.is_empty());
}

#[test]
fn test_alternate_pairs_and_tag_only_cells() {
    let doc = VirtualElement::new("html")
        .child(
            VirtualElement::new("button")
                .attr("data-checkin", "1700000000")
                .attr("data-checkout", "1700259200"),
        )
        .child(VirtualElement::new("range-datepicker-cell").attr("date-from", "1700000000"))
        .child(VirtualElement::new("span").attr("date-from", "1700000000"));
    let report = scanner().scan(&doc, PAGE, 1);

    assert_eq!(report.all.len(), 2);
    assert_eq!(report.all[0].attributes.as_ref().unwrap().start, "data-checkin");
    assert_eq!(report.all[0].duration_days, Some(3));
    let partial = &report.all[1];
    assert_eq!(partial.tag, "range-datepicker-cell");
    assert!(partial.start_epoch_seconds.is_some());
    assert_eq!(partial.end_epoch_seconds, None);
    assert_eq!(partial.duration_days, None);
}

#[test]
fn test_broadened_mode() {
    let doc = VirtualElement::new("html")
        .child(VirtualElement::new("div").attr("aria-label", "Check-in date"))
        .child(VirtualElement::new("div").attr("data-arrival", "x"));

    assert!(scanner().scan(&doc, PAGE, 1).all.is_empty());

    let broadened = DomRangeScanner::new(&ScanConfig {
        broadened: true,
        ..ScanConfig::default()
    })
    .unwrap();
    let report = broadened.scan(&doc, PAGE, 1);
    assert_eq!(report.all.len(), 2);
    assert!(!report.is_qualifying());
}

// ============================================================================
// Controller
// ============================================================================

#[test]
fn test_first_pass_hit_finishes_and_mirrors_hits() {
    let clock = ManualClock::new(0.0);
    let session = session(&clock);
    let mut controller = RangeScanController::new(session.clone()).unwrap();
    let doc = VirtualElement::new("html").child(cell("a", "1700000000", "1700259200"));

    controller.activate(&doc, PAGE);
    assert_eq!(controller.phase(), ScanPhase::Finished(FinishReason::Found));
    assert!(!controller.is_watching());
    assert_eq!(controller.next_wakeup(), None);

    let ctx = session.borrow();
    assert_eq!(ctx.sink().scan().unwrap().unique.len(), 1);
    let dom: Vec<_> = ctx.sink().hits_from(HitSource::DomAttribute).collect();
    assert_eq!(dom.len(), 2);
    assert_eq!(dom[0].key, "date-from");
    assert_eq!(dom[0].iso.as_deref(), Some("2023-11-14T22:13:20.000Z"));
    assert_eq!(dom[0].raw_value, serde_json::json!(1_700_000_000));
    assert_eq!(dom[1].key, "date-to");
    assert_eq!(dom[1].origin, PAGE);
}

#[test]
fn test_retry_picks_up_hydrated_cells() {
    let clock = ManualClock::new(0.0);
    let session = session(&clock);
    let mut controller = RangeScanController::new(session.clone()).unwrap();
    let app = VirtualElement::new("div").attr("id", "app");
    let doc = VirtualElement::new("html").child(app.clone());

    let first = controller.activate(&doc, PAGE);
    assert!(first.all.is_empty());
    assert!(controller.is_watching());
    assert_eq!(controller.next_wakeup(), Some(500.0));

    clock.set(200.0);
    app.append_child(cell("a", "1700000000", "1700259200"));
    controller.on_structure_change();
    assert_eq!(controller.next_wakeup(), Some(350.0));

    clock.set(300.0);
    assert!(controller.on_timer(&doc, PAGE).is_none());

    clock.set(350.0);
    let report = controller.on_timer(&doc, PAGE).expect("rescan");
    assert_eq!(report.stats.pass, 2);
    assert_eq!(controller.phase(), ScanPhase::Finished(FinishReason::Found));
    assert_eq!(session.borrow().sink().scan().unwrap().stats.pass, 2);
}

#[test]
fn test_gives_up_at_ceiling() {
    let clock = ManualClock::new(0.0);
    let session = session(&clock);
    let mut controller = RangeScanController::new(session.clone()).unwrap();
    let doc = VirtualElement::new("html");

    controller.activate(&doc, PAGE);
    let mut rescans = 0;
    while let Some(at) = controller.next_wakeup() {
        clock.set(at);
        if controller.on_timer(&doc, PAGE).is_some() {
            rescans += 1;
        }
    }
    assert_eq!(rescans, 4, "one per seed");
    assert_eq!(controller.phase(), ScanPhase::Finished(FinishReason::Ceiling));
    assert_eq!(clock.now_ms(), 6_000.0);
    // empty rescans never replace the first published report
    assert_eq!(session.borrow().sink().scan().unwrap().stats.pass, 1);
}

#[test]
fn test_new_activation_supersedes() {
    let clock = ManualClock::new(0.0);
    let session = session(&clock);
    let mut controller = RangeScanController::new(session).unwrap();
    let empty = VirtualElement::new("html");

    controller.activate(&empty, PAGE);
    assert!(controller.is_watching());
    clock.set(1_000.0);
    controller.activate(&empty, PAGE);
    assert_eq!(controller.activation(), 2);
    assert!(controller.is_watching());
    assert_eq!(controller.next_wakeup(), Some(1_500.0));

    controller.cancel();
    assert_eq!(controller.phase(), ScanPhase::Finished(FinishReason::Cancelled));
    controller.on_structure_change();
    assert_eq!(controller.next_wakeup(), None);
}
