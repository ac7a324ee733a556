use uuid::Uuid;

use super::*;
use crate::viewport::{PlanarViewport, Point3};

// =============================================================
// Helpers
// =============================================================

const TOOL: &str = "PlanarFreehandROI";

fn make(frame: &str, tool: &str) -> Annotation {
    let vp = PlanarViewport::axial("vp", frame, 100.0, 100.0);
    let mut a = Annotation::shell(tool, &vp);
    a.set_closed_contour(vec![Point3::new(1.0, 1.0, 0.0), Point3::new(9.0, 1.0, 0.0), Point3::new(5.0, 8.0, 0.0)]);
    a
}

fn store_with(annotations: &[Annotation]) -> AnnotationStore {
    let mut store = AnnotationStore::new();
    for a in annotations {
        store.add(a.clone());
    }
    store
}

// =============================================================
// Add / get / remove
// =============================================================

#[test]
fn add_creates_buckets_in_order() {
    let a = make("f1", TOOL);
    let b = make("f1", TOOL);
    let store = store_with(&[a.clone(), b.clone()]);
    let bucket = store.get_by_frame_and_tool("f1", TOOL).unwrap();
    assert_eq!(bucket.len(), 2);
    assert_eq!(bucket[0].annotation_uid, a.annotation_uid);
    assert_eq!(bucket[1].annotation_uid, b.annotation_uid);
    assert_eq!(store.len(), 2);
    assert!(!store.is_empty());
}

#[test]
fn get_respects_filter() {
    let a = make("f1", TOOL);
    let store = store_with(&[a.clone()]);
    let uid = a.annotation_uid;
    assert!(store.get(uid, LookupFilter::default()).is_some());
    assert!(store.get(uid, LookupFilter::frame("f1")).is_some());
    assert!(store.get(uid, LookupFilter::bucket("f1", TOOL)).is_some());
    assert!(store.get(uid, LookupFilter::frame("f2")).is_none());
    assert!(store.get(uid, LookupFilter::bucket("f1", "Other")).is_none());
}

#[test]
fn remove_last_annotation_drops_frame() {
    let a = make("f1", TOOL);
    let mut store = store_with(&[a.clone()]);
    assert_eq!(store.list_frames_of_reference(), vec!["f1".to_owned()]);

    let removed = store.remove(a.annotation_uid, LookupFilter::default()).unwrap();
    assert_eq!(removed.annotation_uid, a.annotation_uid);
    assert!(store.list_frames_of_reference().is_empty());
    assert!(store.get_by_frame_and_tool("f1", TOOL).is_none());
    assert!(store.is_empty());
}

#[test]
fn remove_keeps_other_buckets() {
    let a = make("f1", TOOL);
    let b = make("f1", "Other");
    let mut store = store_with(&[a.clone(), b.clone()]);
    store.remove(a.annotation_uid, LookupFilter::default());
    assert!(store.get_by_frame_and_tool("f1", TOOL).is_none());
    assert_eq!(store.get_by_frame_and_tool("f1", "Other").unwrap().len(), 1);
    assert_eq!(store.list_frames_of_reference(), vec!["f1".to_owned()]);
}

#[test]
fn remove_missing_is_noop() {
    let a = make("f1", TOOL);
    let mut store = store_with(&[a.clone()]);
    assert!(store.remove(Uuid::new_v4(), LookupFilter::default()).is_none());
    assert!(store.remove(a.annotation_uid, LookupFilter::frame("f2")).is_none());
    assert_eq!(store.len(), 1);
}

#[test]
fn replace_keeps_position() {
    let a = make("f1", TOOL);
    let b = make("f1", TOOL);
    let mut store = store_with(&[a.clone(), b.clone()]);
    let mut edited = a.clone();
    edited.data.label = "edited".into();
    assert!(store.replace(edited));
    let bucket = store.get_by_frame_and_tool("f1", TOOL).unwrap();
    assert_eq!(bucket[0].data.label, "edited");
    assert_eq!(bucket[1].annotation_uid, b.annotation_uid);

    assert!(!store.replace(make("f1", TOOL)));
}

#[test]
fn flag_setters() {
    let a = make("f1", TOOL);
    let uid = a.annotation_uid;
    let mut store = store_with(&[a]);
    assert!(store.set_locked(uid, true));
    assert!(store.set_visible(uid, false));
    assert!(store.set_highlighted(uid, true));
    assert!(store.set_invalidated(uid, false));
    let stored = store.get(uid, LookupFilter::default()).unwrap();
    assert!(stored.is_locked);
    assert!(!stored.is_visible);
    assert!(stored.data.highlighted);
    assert_eq!(stored.data.invalidated, Some(false));
    assert!(!store.set_locked(Uuid::new_v4(), true));
}

#[test]
fn annotations_in_frame_spans_tools() {
    let store = store_with(&[make("f1", TOOL), make("f1", "Other"), make("f2", TOOL)]);
    assert_eq!(store.annotations_in_frame("f1").count(), 2);
    assert_eq!(store.annotations_in_frame("f3").count(), 0);
}

// =============================================================
// Export / import
// =============================================================

#[test]
fn export_import_round_trip() {
    let store = store_with(&[make("f1", TOOL), make("f1", "Other"), make("f2", TOOL)]);
    let snapshot = store.export_state(None, None).unwrap();

    let mut fresh = AnnotationStore::new();
    fresh.import_state(snapshot.clone(), None, None).unwrap();
    assert_eq!(fresh.export_state(None, None), Some(snapshot));
    assert_eq!(fresh.len(), 3);
}

#[test]
fn export_is_independent_of_store() {
    let a = make("f1", TOOL);
    let uid = a.annotation_uid;
    let mut store = store_with(&[a]);
    let before = store.export_state(None, None).unwrap();

    store.set_locked(uid, true);
    let StateSnapshot::All(state) = &before else {
        panic!("expected full snapshot");
    };
    assert!(!state["f1"][TOOL][0].is_locked);

    let StateSnapshot::All(mut exported) = store.export_state(None, None).unwrap() else {
        panic!("expected full snapshot");
    };
    Arc::make_mut(&mut exported.get_mut("f1").unwrap().get_mut(TOOL).unwrap()[0]).data.label = "changed".into();
    exported.clear();
    let stored = store.get(uid, LookupFilter::default()).unwrap();
    assert!(stored.is_locked);
    assert!(stored.data.label.is_empty());
    assert_eq!(store.len(), 1);
}

#[test]
fn export_scopes() {
    let store = store_with(&[make("f1", TOOL), make("f1", "Other"), make("f2", TOOL)]);
    assert!(matches!(store.export_state(Some("f1"), None), Some(StateSnapshot::Frame(tools)) if tools.len() == 2));
    assert!(matches!(store.export_state(Some("f1"), Some(TOOL)), Some(StateSnapshot::Bucket(list)) if list.len() == 1));
    assert!(matches!(store.export_state(None, Some(TOOL)), Some(StateSnapshot::All(state)) if state.len() == 2));
    assert!(store.export_state(Some("f9"), None).is_none());
    assert!(store.export_state(Some("f1"), Some("Missing")).is_none());
}

#[test]
fn import_replaces_scope_wholesale() {
    let old = make("f1", TOOL);
    let keep = make("f1", "Other");
    let mut store = store_with(&[old.clone(), keep.clone()]);
    let new = make("f1", TOOL);

    store.import_state(StateSnapshot::Bucket(vec![Arc::new(new.clone())]), Some("f1"), Some(TOOL)).unwrap();
    assert!(store.get(old.annotation_uid, LookupFilter::default()).is_none());
    assert!(store.get(new.annotation_uid, LookupFilter::default()).is_some());
    assert!(store.get(keep.annotation_uid, LookupFilter::default()).is_some());
}

#[test]
fn import_empty_bucket_drops_it() {
    let a = make("f1", TOOL);
    let mut store = store_with(&[a]);
    store.import_state(StateSnapshot::Bucket(Vec::new()), Some("f1"), Some(TOOL)).unwrap();
    assert!(store.is_empty());
    assert!(store.list_frames_of_reference().is_empty());
}

#[test]
fn import_tool_scope_leaves_other_tools() {
    let other = make("f1", "Other");
    let mut store = store_with(&[make("f1", TOOL), other.clone()]);
    store.import_state(StateSnapshot::All(AnnotationState::new()), None, Some(TOOL)).unwrap();
    assert_eq!(store.len(), 1);
    assert!(store.get(other.annotation_uid, LookupFilter::default()).is_some());
}

#[test]
fn import_rejects_shape_mismatch() {
    let a = make("f1", TOOL);
    let mut store = store_with(&[a.clone()]);
    let err = store
        .import_state(StateSnapshot::Bucket(Vec::new()), None, None)
        .unwrap_err();
    assert_eq!(err, StoreError::ScopeMismatch { shape: "bucket", scope: "all" });
    assert_eq!(store.len(), 1);
}

#[test]
fn import_rejects_misplaced_annotation() {
    let mut store = AnnotationStore::new();
    let stray = make("f2", TOOL);
    let err = store
        .import_state(StateSnapshot::Bucket(vec![Arc::new(stray)]), Some("f1"), Some(TOOL))
        .unwrap_err();
    assert!(matches!(err, StoreError::BucketMismatch { .. }));
    assert!(store.is_empty());
}

#[test]
fn snapshot_serializes_with_scope_tag() {
    let store = store_with(&[make("f1", TOOL)]);
    let snapshot = store.export_state(Some("f1"), Some(TOOL)).unwrap();
    let json = serde_json::to_value(&snapshot).unwrap();
    assert_eq!(json["scope"], "bucket");
    assert_eq!(json["annotations"].as_array().unwrap().len(), 1);
    let back: StateSnapshot = serde_json::from_value(json).unwrap();
    assert_eq!(back, snapshot);
}

// =============================================================
// Invalidation
// =============================================================

#[test]
fn volume_modified_flips_defined_flags_in_frame() {
    let mut annotations: Vec<Annotation> = (0..3).map(|_| make("f1", TOOL)).collect();
    for a in &mut annotations {
        a.data.invalidated = Some(false);
    }
    let mut undefined = make("f1", TOOL);
    undefined.data.invalidated = None;
    let mut elsewhere = make("f2", TOOL);
    elsewhere.data.invalidated = Some(false);

    let mut all = annotations.clone();
    all.push(undefined.clone());
    all.push(elsewhere.clone());
    let mut store = store_with(&all);

    assert_eq!(store.on_volume_modified("f1"), 3);
    for a in &annotations {
        let stored = store.get(a.annotation_uid, LookupFilter::default()).unwrap();
        assert_eq!(stored.data.invalidated, Some(true));
    }
    let untouched = store.get(undefined.annotation_uid, LookupFilter::default()).unwrap();
    assert_eq!(untouched.data.invalidated, None);
    let other = store.get(elsewhere.annotation_uid, LookupFilter::default()).unwrap();
    assert_eq!(other.data.invalidated, Some(false));

    assert_eq!(store.on_volume_modified("missing"), 0);
}
