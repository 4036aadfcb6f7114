use chrono::{Duration, Utc};
use entity_api::{
    models::{
        Device, Email, EmailStatus, Image, Metric, Organization, Scrub, Token, User, UserStatus,
    },
    table::Entity,
    tuid::Tuid,
};
use serde_json::json;

// --- Wire format ---

#[test]
fn test_user_json_field_names() {
    let user = User {
        id: "id".to_string(),
        version_id: "v".to_string(),
        email: "a@b.com".to_string(),
        org_id: "o".to_string(),
        status: UserStatus::Enabled,
        ..User::default()
    };
    let value = serde_json::to_value(&user).unwrap();
    assert_eq!(value["versionID"], "v");
    assert_eq!(value["orgID"], "o");
    assert_eq!(value["displayName"], "");
    assert_eq!(value["status"], "ENABLED");
    assert!(value.get("createdAt").is_some());
}

#[test]
fn test_missing_fields_take_defaults() {
    let user: User = serde_json::from_value(json!({ "email": "a@b.com" })).unwrap();
    assert_eq!(user.status, UserStatus::Pending);
    assert!(user.roles.is_empty());

    let email: Email = serde_json::from_value(json!({})).unwrap();
    assert_eq!(email.status, EmailStatus::Pending);
}

#[test]
fn test_unknown_status_is_rejected() {
    let result: Result<User, _> = serde_json::from_value(json!({ "status": "ARCHIVED" }));
    assert!(result.is_err());
}

// --- Validation ---

#[test]
fn test_user_problems() {
    let mut user = User {
        email: "nope".to_string(),
        org_id: "not-a-tuid".to_string(),
        roles: vec!["ok_role".to_string(), "bad role".to_string()],
        ..User::default()
    };
    user.normalize();
    let problems = user.problems();
    assert_eq!(problems.len(), 3, "{problems:?}");
}

#[test]
fn test_image_problems() {
    let image = Image {
        owner_id: Tuid::new().to_string(),
        title: "t".to_string(),
        file_name: "dir/evil.png".to_string(),
        content_type: "application/pdf".to_string(),
        ..Image::default()
    };
    let problems = image.problems();
    assert_eq!(problems.len(), 2, "{problems:?}");
}

#[test]
fn test_token_must_expire_in_the_future() {
    let now = Utc::now();
    let token = Token {
        user_id: Tuid::new().to_string(),
        created_at: now,
        updated_at: now,
        expires_at: now - Duration::seconds(1),
        ..Token::default()
    };
    assert_eq!(token.problems().len(), 1);
    assert_eq!(token.expires_at(), Some(token.expires_at));
}

#[test]
fn test_metric_name_is_a_tag() {
    let mut metric = Metric {
        name: " Latency ".to_string(),
        tags: vec!["API".to_string(), "latency".to_string()],
        ..Metric::default()
    };
    metric.normalize();
    assert_eq!(metric.name, "latency");

    let tags: Vec<String> = metric
        .index_entries()
        .into_iter()
        .filter(|entry| entry.name == "tag")
        .map(|entry| entry.value)
        .collect();
    assert_eq!(tags, vec!["latency".to_string(), "api".to_string()]);
}

// --- Scrubbing ---

#[test]
fn test_user_scrub_round_trip() {
    let original = User {
        email: "a@b.com".to_string(),
        roles: vec!["admin".to_string()],
        status: UserStatus::Enabled,
        org_id: Tuid::new().to_string(),
        notes: "vip".to_string(),
        ..User::default()
    };

    let scrubbed = original.clone().scrub();
    assert_eq!(scrubbed.notes, "");
    assert_eq!(scrubbed.email, original.email);

    let edited = User {
        display_name: "New Name".to_string(),
        roles: Vec::new(),
        status: UserStatus::Disabled,
        ..scrubbed
    };
    let restored = edited.restore_scrubbed(&original);
    assert_eq!(restored.display_name, "New Name");
    assert_eq!(restored.roles, original.roles);
    assert_eq!(restored.status, original.status);
    assert_eq!(restored.notes, original.notes);
}

#[test]
fn test_device_scrub_hides_client_ip() {
    let device = Device {
        user_id: Some(Tuid::new().to_string()),
        client_ip: "203.0.113.9".to_string(),
        ..Device::default()
    };
    let scrubbed = device.clone().scrub();
    assert_eq!(scrubbed.client_ip, "");

    let restored = Device {
        user_id: None,
        ..scrubbed
    }
    .restore_scrubbed(&device);
    assert_eq!(restored.client_ip, device.client_ip);
    assert_eq!(restored.user_id, device.user_id);
}

#[test]
fn test_organization_scrub_hides_notes() {
    let org = Organization {
        name: "Acme".to_string(),
        notes: "late payer".to_string(),
        ..Organization::default()
    };
    assert_eq!(org.scrub().notes, "");
}
