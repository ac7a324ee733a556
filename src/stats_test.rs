use super::*;
use crate::viewport::PlanarViewport;

const EPSILON: f64 = 1e-9;

fn approx_eq(a: f64, b: f64) -> bool {
    (a - b).abs() < EPSILON
}

fn rectangle() -> Annotation {
    let vp = PlanarViewport::axial("vp", "frame", 100.0, 100.0);
    let mut a = Annotation::shell("PlanarFreehandROI", &vp);
    a.set_closed_contour(vec![
        Point3::new(0.0, 0.0, 0.0),
        Point3::new(4.0, 0.0, 0.0),
        Point3::new(4.0, 3.0, 0.0),
        Point3::new(0.0, 3.0, 0.0),
    ]);
    a
}

#[test]
fn planar_area_ignores_winding() {
    let a = rectangle();
    let normal = a.metadata.view_plane_normal;
    assert!(approx_eq(planar_area(&a.data.polyline, normal), 12.0));
    let reversed: Vec<Point3> = a.data.polyline.iter().rev().copied().collect();
    assert!(approx_eq(planar_area(&reversed, normal), 12.0));
}

#[test]
fn planar_area_on_tilted_plane() {
    let points = [Point3::new(0.0, 0.0, 0.0), Point3::new(0.0, 2.0, 0.0), Point3::new(0.0, 2.0, 5.0), Point3::new(0.0, 0.0, 5.0)];
    assert!(approx_eq(planar_area(&points, Point3::new(1.0, 0.0, 0.0)), 10.0));
}

#[test]
fn closed_stats_have_area_and_perimeter() {
    let stats = compute_stats(&rectangle());
    assert!(approx_eq(stats.area.unwrap(), 12.0));
    assert!(approx_eq(stats.length, 14.0));
    assert_eq!(stats.length_unit, "mm");
}

#[test]
fn open_stats_have_length_only() {
    let mut a = rectangle();
    a.set_open_contour(a.data.polyline.clone(), None);
    let stats = compute_stats(&a);
    assert!(stats.area.is_none());
    assert!(approx_eq(stats.length, 11.0));
}

#[test]
fn refresh_only_when_stale() {
    let mut a = rectangle();
    assert!(refresh(&mut a, "volumeId:frame"));
    assert_eq!(a.data.invalidated, Some(false));
    assert!(a.data.cached_stats.contains_key("volumeId:frame"));

    assert!(!refresh(&mut a, "volumeId:frame"));
    // A new target is computed even when the flag is clear.
    assert!(refresh(&mut a, "imageId:other"));

    a.mark_stale();
    assert!(refresh(&mut a, "volumeId:frame"));
}

#[test]
fn label_lines_for_closed_and_open() {
    let mut a = rectangle();
    assert!(label_lines(&a, "t").is_empty());

    a.data.label = "Lesion".into();
    refresh(&mut a, "t");
    assert_eq!(label_lines(&a, "t"), vec!["Lesion".to_owned(), "Area: 12.00 mm\u{b2}".to_owned(), "Perimeter: 14.00 mm".to_owned()]);

    a.set_open_contour(a.data.polyline.clone(), None);
    refresh(&mut a, "t");
    assert_eq!(label_lines(&a, "t"), vec!["Lesion".to_owned(), "Length: 11.00 mm".to_owned()]);
}
