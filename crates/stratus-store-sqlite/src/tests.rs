//! Integration tests for `SqliteStore` against an in-memory database.

use serde_json::{Value, json};

use stratus_core::{
  Error,
  catalog::{
    IAM_API_KEYS, IPS, PRIVATE_NETWORKS, PRIVATE_NICS, RDB_DATABASES,
    RDB_INSTANCES, RDB_PRIVILEGES, SECURITY_GROUPS, SERVERS, VPCS,
  },
  document::Document,
  store::ResourceStore,
};

use crate::SqliteStore;

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn doc(value: Value) -> Document {
  match value {
    Value::Object(map) => map,
    other => panic!("not an object: {other}"),
  }
}

// ─── Inserts and reads ───────────────────────────────────────────────────────

#[tokio::test]
async fn insert_and_get_roundtrip() {
  let s = store().await;

  s.insert(
    &VPCS,
    doc(json!({"id": "vpc-1", "region": "fr-par", "name": "default"})),
  )
  .await
  .unwrap();

  let fetched = s.get(&VPCS, &["vpc-1"]).await.unwrap().unwrap();
  assert_eq!(fetched.get("id"), Some(&json!("vpc-1")));
  assert_eq!(fetched.get("name"), Some(&json!("default")));
  assert_eq!(fetched.get("region"), Some(&json!("fr-par")));
}

#[tokio::test]
async fn get_missing_returns_none() {
  let s = store().await;
  assert!(s.get(&VPCS, &["nope"]).await.unwrap().is_none());
}

#[tokio::test]
async fn insert_duplicate_key_conflicts() {
  let s = store().await;

  let row = doc(json!({"id": "vpc-1", "region": "fr-par"}));
  s.insert(&VPCS, row.clone()).await.unwrap();

  let err = s.insert(&VPCS, row).await.unwrap_err();
  assert!(matches!(err, Error::Conflict("vpcs")));
}

#[tokio::test]
async fn list_plain_and_filtered() {
  let s = store().await;

  s.insert(&RDB_INSTANCES, doc(json!({"id": "inst-1", "region": "fr-par"})))
    .await
    .unwrap();
  s.insert(&RDB_INSTANCES, doc(json!({"id": "inst-2", "region": "fr-par"})))
    .await
    .unwrap();
  for (inst, name) in [("inst-1", "app"), ("inst-1", "jobs"), ("inst-2", "app")]
  {
    s.insert(
      &RDB_DATABASES,
      doc(json!({"instance_id": inst, "name": name})),
    )
    .await
    .unwrap();
  }

  let all = s.list(&RDB_DATABASES, None).await.unwrap();
  assert_eq!(all.len(), 3);

  let first = s
    .list(&RDB_DATABASES, Some(("instance_id", "inst-1")))
    .await
    .unwrap();
  assert_eq!(first.len(), 2);
  assert!(
    first
      .iter()
      .all(|d| d.get("instance_id") == Some(&json!("inst-1")))
  );
}

// ─── Reference checks on insert ──────────────────────────────────────────────

#[tokio::test]
async fn required_reference_must_resolve() {
  let s = store().await;

  let err = s
    .insert(
      &PRIVATE_NETWORKS,
      doc(json!({"id": "pn-1", "region": "fr-par", "vpc_id": "ghost"})),
    )
    .await
    .unwrap_err();
  assert!(matches!(err, Error::ReferenceNotFound("vpcs")));
}

#[tokio::test]
async fn required_reference_rejects_blank_and_absent_values() {
  let s = store().await;

  let err = s
    .insert(
      &PRIVATE_NETWORKS,
      doc(json!({"id": "pn-1", "region": "fr-par", "vpc_id": "  "})),
    )
    .await
    .unwrap_err();
  assert!(matches!(err, Error::ReferenceNotFound("vpcs")));

  let err = s
    .insert(&PRIVATE_NETWORKS, doc(json!({"id": "pn-1", "region": "fr-par"})))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::ReferenceNotFound("vpcs")));

  // Nothing landed.
  assert!(s.list(&PRIVATE_NETWORKS, None).await.unwrap().is_empty());
}

#[tokio::test]
async fn optional_reference_checked_only_when_bound() {
  let s = store().await;

  // No server_id at all — fine.
  s.insert(&IPS, doc(json!({"id": "ip-1", "zone": "fr-par-1"})))
    .await
    .unwrap();

  // A bound server_id must resolve.
  let err = s
    .insert(
      &IPS,
      doc(json!({"id": "ip-2", "zone": "fr-par-1", "server_id": "ghost"})),
    )
    .await
    .unwrap_err();
  assert!(matches!(err, Error::ReferenceNotFound("servers")));
}

// ─── Replace ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn replace_swaps_the_document() {
  let s = store().await;

  s.insert(&VPCS, doc(json!({"id": "vpc-1", "region": "fr-par", "name": "a"})))
    .await
    .unwrap();
  s.replace(
    &VPCS,
    &["vpc-1"],
    doc(json!({"id": "vpc-1", "region": "fr-par", "name": "b"})),
  )
  .await
  .unwrap();

  let fetched = s.get(&VPCS, &["vpc-1"]).await.unwrap().unwrap();
  assert_eq!(fetched.get("name"), Some(&json!("b")));
}

#[tokio::test]
async fn replace_missing_row_errors() {
  let s = store().await;
  let err = s
    .replace(&VPCS, &["ghost"], doc(json!({"id": "ghost"})))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::NotFound));
}

// ─── Delete policies ─────────────────────────────────────────────────────────

async fn seed_network(s: &SqliteStore) {
  s.insert(&VPCS, doc(json!({"id": "vpc-1", "region": "fr-par"})))
    .await
    .unwrap();
  s.insert(
    &PRIVATE_NETWORKS,
    doc(json!({"id": "pn-1", "region": "fr-par", "vpc_id": "vpc-1"})),
  )
  .await
  .unwrap();
}

#[tokio::test]
async fn delete_missing_row_errors() {
  let s = store().await;
  let err = s.delete(&VPCS, &["ghost"]).await.unwrap_err();
  assert!(matches!(err, Error::NotFound));
}

#[tokio::test]
async fn reject_policy_blocks_delete_and_leaves_state_alone() {
  let s = store().await;
  seed_network(&s).await;

  let err = s.delete(&VPCS, &["vpc-1"]).await.unwrap_err();
  assert!(matches!(err, Error::Conflict("private_networks")));

  // Parent and child both survive.
  assert!(s.get(&VPCS, &["vpc-1"]).await.unwrap().is_some());
  assert!(s.get(&PRIVATE_NETWORKS, &["pn-1"]).await.unwrap().is_some());

  // Without the child the delete goes through.
  s.delete(&PRIVATE_NETWORKS, &["pn-1"]).await.unwrap();
  s.delete(&VPCS, &["vpc-1"]).await.unwrap();
  assert!(s.get(&VPCS, &["vpc-1"]).await.unwrap().is_none());
}

#[tokio::test]
async fn cascade_policy_removes_children() {
  let s = store().await;
  seed_network(&s).await;

  s.insert(&SERVERS, doc(json!({"id": "srv-1", "zone": "fr-par-1"})))
    .await
    .unwrap();
  s.insert(
    &PRIVATE_NICS,
    doc(json!({
      "id": "nic-1",
      "zone": "fr-par-1",
      "server_id": "srv-1",
      "private_network_id": "pn-1",
    })),
  )
  .await
  .unwrap();

  s.delete(&SERVERS, &["srv-1"]).await.unwrap();

  assert!(s.get(&PRIVATE_NICS, &["nic-1"]).await.unwrap().is_none());
  // The private network was only referenced by the NIC, not cascaded.
  assert!(s.get(&PRIVATE_NETWORKS, &["pn-1"]).await.unwrap().is_some());
}

#[tokio::test]
async fn nullify_policy_clears_column_and_document_fields() {
  let s = store().await;

  s.insert(
    &SECURITY_GROUPS,
    doc(json!({"id": "sg-1", "zone": "fr-par-1", "name": "default"})),
  )
  .await
  .unwrap();
  s.insert(
    &SERVERS,
    doc(json!({
      "id": "srv-1",
      "zone": "fr-par-1",
      "security_group_id": "sg-1",
      "security_group": {"id": "sg-1", "name": "default"},
    })),
  )
  .await
  .unwrap();
  s.insert(&SERVERS, doc(json!({"id": "srv-2", "zone": "fr-par-1"})))
    .await
    .unwrap();

  s.delete(&SECURITY_GROUPS, &["sg-1"]).await.unwrap();

  let srv = s.get(&SERVERS, &["srv-1"]).await.unwrap().unwrap();
  assert_eq!(srv.get("security_group_id"), Some(&Value::Null));
  assert_eq!(srv.get("security_group"), Some(&Value::Null));

  // Unrelated servers are untouched.
  let other = s.get(&SERVERS, &["srv-2"]).await.unwrap().unwrap();
  assert!(other.get("security_group_id").is_none());
}

#[tokio::test]
async fn nullified_children_do_not_block_a_second_delete() {
  let s = store().await;

  s.insert(
    &SECURITY_GROUPS,
    doc(json!({"id": "sg-1", "zone": "fr-par-1"})),
  )
  .await
  .unwrap();
  s.insert(
    &SERVERS,
    doc(json!({
      "id": "srv-1",
      "zone": "fr-par-1",
      "security_group_id": "sg-1",
    })),
  )
  .await
  .unwrap();
  s.delete(&SECURITY_GROUPS, &["sg-1"]).await.unwrap();

  // The server detached, so deleting it must not try to touch the
  // vanished group.
  s.delete(&SERVERS, &["srv-1"]).await.unwrap();
  assert!(s.get(&SERVERS, &["srv-1"]).await.unwrap().is_none());
}

// ─── Composite keys ──────────────────────────────────────────────────────────

#[tokio::test]
async fn composite_keys_address_one_row() {
  let s = store().await;

  s.insert(&RDB_INSTANCES, doc(json!({"id": "inst-1", "region": "fr-par"})))
    .await
    .unwrap();
  s.insert(
    &RDB_DATABASES,
    doc(json!({"instance_id": "inst-1", "name": "app"})),
  )
  .await
  .unwrap();
  s.insert(
    &RDB_DATABASES,
    doc(json!({"instance_id": "inst-1", "name": "jobs"})),
  )
  .await
  .unwrap();

  let fetched = s
    .get(&RDB_DATABASES, &["inst-1", "app"])
    .await
    .unwrap()
    .unwrap();
  assert_eq!(fetched.get("name"), Some(&json!("app")));

  s.delete(&RDB_DATABASES, &["inst-1", "app"]).await.unwrap();
  assert!(
    s.get(&RDB_DATABASES, &["inst-1", "app"])
      .await
      .unwrap()
      .is_none()
  );
  assert!(
    s.get(&RDB_DATABASES, &["inst-1", "jobs"])
      .await
      .unwrap()
      .is_some()
  );
}

#[tokio::test]
async fn delete_matching_removes_a_dependent_set() {
  let s = store().await;

  s.insert(&RDB_INSTANCES, doc(json!({"id": "inst-1", "region": "fr-par"})))
    .await
    .unwrap();
  for (user, db) in [("alice", "app"), ("alice", "jobs"), ("bob", "app")] {
    s.insert(
      &RDB_PRIVILEGES,
      doc(json!({
        "instance_id": "inst-1",
        "user_name": user,
        "database_name": db,
      })),
    )
    .await
    .unwrap();
  }

  let removed = s
    .delete_matching(&RDB_PRIVILEGES, "instance_id", "inst-1")
    .await
    .unwrap();
  assert_eq!(removed, 3);
  assert!(s.list(&RDB_PRIVILEGES, None).await.unwrap().is_empty());

  let removed = s
    .delete_matching(&RDB_PRIVILEGES, "instance_id", "inst-1")
    .await
    .unwrap();
  assert_eq!(removed, 0);
}

// ─── Redaction ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn redacted_fields_never_leave_the_store() {
  let s = store().await;

  s.insert(
    &IAM_API_KEYS,
    doc(json!({"access_key": "STRAAAAAAAAAAAAAAAAA", "secret_key": "hush"})),
  )
  .await
  .unwrap();

  let fetched = s
    .get(&IAM_API_KEYS, &["STRAAAAAAAAAAAAAAAAA"])
    .await
    .unwrap()
    .unwrap();
  assert!(fetched.get("secret_key").is_none());
  assert_eq!(fetched.get("access_key"), Some(&json!("STRAAAAAAAAAAAAAAAAA")));

  let listed = s.list(&IAM_API_KEYS, None).await.unwrap();
  assert!(listed.iter().all(|d| d.get("secret_key").is_none()));
}

// ─── Reset ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn reset_empties_every_table() {
  let s = store().await;
  seed_network(&s).await;
  s.insert(&SERVERS, doc(json!({"id": "srv-1", "zone": "fr-par-1"})))
    .await
    .unwrap();

  s.reset().await.unwrap();

  assert!(s.list(&VPCS, None).await.unwrap().is_empty());
  assert!(s.list(&PRIVATE_NETWORKS, None).await.unwrap().is_empty());
  assert!(s.list(&SERVERS, None).await.unwrap().is_empty());
}
