use campus_types::TaskId;
use std::str::FromStr;

#[test]
fn task_ids_are_unique() {
    let a = TaskId::new();
    let b = TaskId::new();
    assert_ne!(a, b);
}

#[test]
fn task_id_display_parse_roundtrip() {
    let id = TaskId::new();
    let s = id.to_string();
    assert_eq!(TaskId::from_str(&s).unwrap(), id);
}

#[test]
fn task_id_parse_rejects_garbage() {
    assert!(TaskId::from_str("not-a-uuid").is_err());
}

#[test]
fn task_id_serde_is_transparent() {
    let id = TaskId::new();
    let json = serde_json::to_string(&id).unwrap();
    assert_eq!(json, format!("\"{id}\""));

    let parsed: TaskId = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, id);
}

#[test]
fn task_ids_are_time_ordered() {
    // UUID v7 embeds a timestamp, so later IDs compare later as strings.
    let a = TaskId::new();
    std::thread::sleep(std::time::Duration::from_millis(2));
    let b = TaskId::new();
    assert!(a.to_string() < b.to_string());
}
