use super::*;
use crate::viewport::{PlanarViewport, Point2, Point3, ViewportKind};

// =============================================================
// Helpers
// =============================================================

fn fine_engine() -> EngineCore {
    let mut engine = EngineCore::new(ContourToolConfig { sub_pixel_resolution: 1, ..ContourToolConfig::default() });
    engine.set_tool(Tool::Freehand);
    engine
}

fn viewport() -> PlanarViewport {
    PlanarViewport::axial("vp", "frame", 200.0, 200.0)
}

fn square(engine: &EngineCore, vp: &PlanarViewport) -> Annotation {
    let mut a = Annotation::shell(&engine.config().tool_name, vp);
    a.set_closed_contour(vec![
        Point3::new(20.0, 20.0, 0.0),
        Point3::new(80.0, 20.0, 0.0),
        Point3::new(80.0, 80.0, 0.0),
        Point3::new(20.0, 80.0, 0.0),
    ]);
    a
}

/// Draw a polyline gesture through `path`, returning every action emitted.
fn gesture(engine: &mut EngineCore, vp: &PlanarViewport, path: &[(f64, f64)]) -> Vec<Action> {
    let (&(x, y), rest) = path.split_first().unwrap();
    let mut evt = PointerEvent::at(vp, Point2::new(x, y));
    let mut actions = engine.on_pointer_down(vp, &evt).unwrap();
    for &(x, y) in rest {
        evt = evt.moved_to(vp, Point2::new(x, y));
        actions.extend(engine.on_pointer_move(vp, &evt).unwrap());
    }
    actions.extend(engine.on_pointer_up(vp, &evt).unwrap());
    actions
}

fn completed(actions: &[Action]) -> Vec<&Annotation> {
    actions
        .iter()
        .filter_map(|a| match a {
            Action::AnnotationCompleted(annotation) => Some(annotation),
            _ => None,
        })
        .collect()
}

// =============================================================
// Drawing
// =============================================================

#[test]
fn freehand_gesture_commits_annotation() {
    let mut engine = fine_engine();
    let vp = viewport();
    let actions = gesture(&mut engine, &vp, &[(10.0, 10.0), (60.0, 10.0), (60.0, 60.0)]);

    let done = completed(&actions);
    assert_eq!(done.len(), 1);
    assert!(done[0].data.is_open_contour);
    assert_eq!(engine.store.len(), 1);
    assert!(engine.session().is_none());
    assert_eq!(actions.first(), Some(&Action::SetCursor("crosshair".into())));
    assert_eq!(actions.last(), Some(&Action::SetCursor("default".into())));
}

#[test]
fn select_tool_does_not_draw() {
    let mut engine = fine_engine();
    engine.set_tool(Tool::Select);
    let vp = viewport();
    let actions = gesture(&mut engine, &vp, &[(10.0, 10.0), (60.0, 10.0)]);
    assert!(actions.is_empty());
    assert!(engine.store.is_empty());
}

#[test]
fn pointer_down_on_contour_starts_edit() {
    let mut engine = fine_engine();
    engine.set_tool(Tool::Select);
    let vp = viewport();
    let a = square(&engine, &vp);
    let uid = a.annotation_uid;
    engine.store.add(a);

    let evt = PointerEvent::at(&vp, Point2::new(50.0, 21.0));
    let actions = engine.on_pointer_down(&vp, &evt).unwrap();
    assert_eq!(actions, vec![Action::SetCursor("crosshair".into()), Action::RenderNeeded]);
    assert!(engine.session().is_some());
    assert_eq!(engine.contour.active_annotation(), Some(uid));

    let actions = engine.on_pointer_up(&vp, &evt).unwrap();
    assert!(actions.iter().any(|a| matches!(a, Action::AnnotationModified { .. })));
    assert!(engine.session().is_none());
}

#[test]
fn unsupported_viewport_is_rejected() {
    let mut engine = fine_engine();
    let mut vp = viewport();
    vp.kind = ViewportKind::Video;
    let evt = PointerEvent::at(&vp, Point2::new(10.0, 10.0));
    assert_eq!(engine.on_pointer_down(&vp, &evt).unwrap_err(), InteractionError::UnsupportedViewport(ViewportKind::Video));
    assert!(engine.session().is_none());
}

#[test]
fn pointer_up_without_session_is_noop() {
    let mut engine = fine_engine();
    let vp = viewport();
    let evt = PointerEvent::at(&vp, Point2::new(10.0, 10.0));
    assert!(engine.on_pointer_up(&vp, &evt).unwrap().is_empty());
}

#[test]
fn viewport_mismatch_clears_session() {
    let mut engine = fine_engine();
    let vp = viewport();
    let evt = PointerEvent::at(&vp, Point2::new(10.0, 10.0));
    engine.on_pointer_down(&vp, &evt).unwrap();

    let other = PlanarViewport::axial("vp-2", "frame", 200.0, 200.0);
    let foreign = PointerEvent::at(&other, Point2::new(40.0, 10.0));
    assert!(engine.on_pointer_move(&other, &foreign).is_err());
    assert!(engine.session().is_none());
    assert!(!engine.contour.is_interacting());
}

// =============================================================
// Cancel
// =============================================================

#[test]
fn escape_cancels_and_finalizes() {
    let mut engine = fine_engine();
    let vp = viewport();
    let mut evt = PointerEvent::at(&vp, Point2::new(10.0, 10.0));
    engine.on_pointer_down(&vp, &evt).unwrap();
    evt = evt.moved_to(&vp, Point2::new(60.0, 10.0));
    engine.on_pointer_move(&vp, &evt).unwrap();

    assert!(engine.on_key_down(&vp, &Key("Enter".into())).unwrap().is_empty());
    assert!(engine.session().is_some());

    let actions = engine.on_key_down(&vp, &Key("Escape".into())).unwrap();
    assert_eq!(completed(&actions).len(), 1);
    assert!(engine.session().is_none());
    assert_eq!(engine.cancel(&vp).unwrap_err(), InteractionError::NoActiveSession);
}

// =============================================================
// Hover
// =============================================================

#[test]
fn hover_highlights_and_sets_cursor() {
    let mut engine = fine_engine();
    let vp = viewport();
    let a = square(&engine, &vp);
    let uid = a.annotation_uid;
    engine.store.add(a);

    let near = PointerEvent::at(&vp, Point2::new(50.0, 22.0));
    let actions = engine.on_pointer_move(&vp, &near).unwrap();
    assert_eq!(actions, vec![Action::SetCursor("pointer".into()), Action::RenderNeeded]);
    assert!(engine.store.get(uid, LookupFilter::default()).unwrap().data.highlighted);

    // Still over the same contour: nothing to do.
    let nearby = near.moved_to(&vp, Point2::new(52.0, 22.0));
    assert!(engine.on_pointer_move(&vp, &nearby).unwrap().is_empty());

    let away = nearby.moved_to(&vp, Point2::new(150.0, 150.0));
    let actions = engine.on_pointer_move(&vp, &away).unwrap();
    assert_eq!(actions, vec![Action::SetCursor("default".into()), Action::RenderNeeded]);
    assert!(!engine.store.get(uid, LookupFilter::default()).unwrap().data.highlighted);
}

#[test]
fn hover_over_open_handle_shows_grab() {
    let mut engine = fine_engine();
    let vp = viewport();
    let mut a = Annotation::shell(&engine.config().tool_name, &vp);
    a.set_open_contour(vec![Point3::new(20.0, 50.0, 0.0), Point3::new(50.0, 60.0, 0.0), Point3::new(80.0, 50.0, 0.0)], None);
    engine.store.add(a);

    let evt = PointerEvent::at(&vp, Point2::new(80.0, 51.0));
    let actions = engine.on_pointer_move(&vp, &evt).unwrap();
    assert_eq!(actions[0], Action::SetCursor("grab".into()));
}

// =============================================================
// External mutations
// =============================================================

#[test]
fn remove_annotation_aborts_its_edit() {
    let mut engine = fine_engine();
    let vp = viewport();
    let a = square(&engine, &vp);
    let uid = a.annotation_uid;
    engine.store.add(a);

    let evt = PointerEvent::at(&vp, Point2::new(50.0, 21.0));
    engine.on_pointer_down(&vp, &evt).unwrap();
    assert!(engine.session().is_some());

    let actions = engine.remove_annotation(uid);
    assert_eq!(actions, vec![Action::AnnotationRemoved { annotation_uid: uid }, Action::RenderNeeded]);
    assert!(engine.session().is_none());
    assert!(engine.store.is_empty());
    assert!(engine.remove_annotation(uid).is_empty());
}

#[test]
fn edit_commit_keeps_flags_changed_mid_edit() {
    let mut engine = fine_engine();
    let vp = viewport();
    let a = square(&engine, &vp);
    let uid = a.annotation_uid;
    engine.store.add(a);

    let evt = PointerEvent::at(&vp, Point2::new(50.0, 21.0));
    engine.on_pointer_down(&vp, &evt).unwrap();
    assert!(engine.store.set_locked(uid, true));
    assert!(engine.store.set_visible(uid, false));

    let actions = engine.on_pointer_up(&vp, &evt).unwrap();
    let stored = engine.store.get(uid, LookupFilter::default()).unwrap();
    assert!(stored.is_locked);
    assert!(!stored.is_visible);
    assert!(!stored.data.is_open_contour);
    assert_eq!(stored.data.invalidated, Some(true));
    let done = completed(&actions);
    assert_eq!(done.len(), 1);
    assert!(done[0].is_locked && !done[0].is_visible);
}

#[test]
fn remove_other_annotation_keeps_session() {
    let mut engine = fine_engine();
    let vp = viewport();
    let a = square(&engine, &vp);
    let uid = a.annotation_uid;
    engine.store.add(a);

    let evt = PointerEvent::at(&vp, Point2::new(150.0, 150.0));
    engine.on_pointer_down(&vp, &evt).unwrap();
    engine.remove_annotation(uid);
    assert!(engine.session().is_some());
}

#[test]
fn volume_modified_requests_render_only_when_flags_flip() {
    let mut engine = fine_engine();
    let vp = viewport();
    assert!(engine.on_volume_modified("frame").is_empty());

    let mut a = square(&engine, &vp);
    a.data.invalidated = Some(false);
    engine.store.add(a);
    assert_eq!(engine.on_volume_modified("frame"), vec![Action::RenderNeeded]);
}

// =============================================================
// Render
// =============================================================

#[test]
fn render_refreshes_stale_stats() {
    let mut engine = fine_engine();
    let vp = viewport();
    let a = square(&engine, &vp);
    let uid = a.annotation_uid;
    engine.store.add(a);

    let prims = engine.render(&vp);
    let stored = engine.store.get(uid, LookupFilter::default()).unwrap();
    assert_eq!(stored.data.invalidated, Some(false));
    let stats = &stored.data.cached_stats[&vp.target_id()];
    assert!((stats.area.unwrap() - 3600.0).abs() < 1e-9);
    assert!(prims.iter().any(|p| matches!(p, Primitive::Label { lines, .. } if lines[0] == "Area: 3600.00 mm\u{b2}")));

    engine.on_volume_modified("frame");
    assert_eq!(engine.store.get(uid, LookupFilter::default()).unwrap().data.invalidated, Some(true));
    engine.render(&vp);
    assert_eq!(engine.store.get(uid, LookupFilter::default()).unwrap().data.invalidated, Some(false));
}

#[test]
fn render_without_stats_leaves_annotations_alone() {
    let mut engine = EngineCore::new(ContourToolConfig { calculate_stats: false, ..ContourToolConfig::default() });
    let vp = viewport();
    let a = square(&engine, &vp);
    let uid = a.annotation_uid;
    engine.store.add(a);

    let prims = engine.render(&vp);
    assert_eq!(prims.len(), 1);
    assert!(engine.store.get(uid, LookupFilter::default()).unwrap().data.cached_stats.is_empty());
}

#[test]
fn render_includes_transient_buffer() {
    let mut engine = fine_engine();
    let vp = viewport();
    let mut evt = PointerEvent::at(&vp, Point2::new(10.0, 10.0));
    engine.on_pointer_down(&vp, &evt).unwrap();
    evt = evt.moved_to(&vp, Point2::new(40.0, 10.0));
    engine.on_pointer_move(&vp, &evt).unwrap();

    let prims = engine.render(&vp);
    assert_eq!(prims.len(), 1);
    assert!(matches!(&prims[0], Primitive::Polyline { points, closed: false, .. } if points.len() == 31));
}

#[test]
fn render_on_inactive_viewport_is_empty() {
    let mut engine = fine_engine();
    let mut vp = viewport();
    let a = square(&engine, &vp);
    let uid = a.annotation_uid;
    engine.store.add(a);
    vp.active = false;
    assert!(engine.render(&vp).is_empty());
    assert!(engine.store.get(uid, LookupFilter::default()).unwrap().data.cached_stats.is_empty());
}
