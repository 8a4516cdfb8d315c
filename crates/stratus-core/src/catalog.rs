//! The resource catalog — one declaration per stored resource kind.
//!
//! Every table holds schemaless JSON documents plus a handful of promoted
//! columns: the primary key, an optional namespace column (zone, region,
//! DNS zone), and the columns that reference other tables. Referential
//! behaviour is declared here, not in SQL; the store reads these
//! declarations to check parents on insert and to apply delete policies.
//!
//! Adding a resource kind means adding a [`Table`] here and wiring routes
//! to it. Nothing else needs to change.

// ─── Declarations ────────────────────────────────────────────────────────────

/// What happens to child rows when the parent they reference is deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeletePolicy {
  /// Refuse to delete the parent while children exist.
  Reject,
  /// Delete the children along with the parent.
  Cascade,
  /// Keep the children; null the reference column and the declared
  /// document fields.
  Nullify,
}

/// A reference from one table's column to another table's primary key.
#[derive(Debug, Clone, Copy)]
pub struct Reference {
  /// Column on the child table; also the document field the value is
  /// extracted from on insert.
  pub column:           &'static str,
  /// Name of the parent table.
  pub parent:           &'static str,
  /// Required references always bind and always check, so a missing or
  /// blank document field fails the parent check. Optional references
  /// bind NULL (and skip the check) when the field is blank or absent.
  pub required:         bool,
  pub on_parent_delete: DeletePolicy,
  /// Document fields nulled alongside the reference column when the
  /// parent is deleted under [`DeletePolicy::Nullify`].
  pub clear_fields:     &'static [&'static str],
}

/// Declaration of one resource table.
#[derive(Debug)]
pub struct Table {
  pub name:       &'static str,
  /// Primary key columns, extracted from the document on insert.
  pub key:        &'static [&'static str],
  /// Namespace column (zone, region, dns_zone), if the resource has one.
  pub scope:      Option<&'static str>,
  pub references: &'static [Reference],
  /// Service the table belongs to in state snapshots.
  pub service:    &'static str,
  /// Key the table's rows appear under in state snapshots.
  pub state_key:  &'static str,
  /// Document fields stripped from read paths (get/list/snapshots).
  pub redact:     &'static [&'static str],
}

// ─── Instance ────────────────────────────────────────────────────────────────

pub static SERVERS: Table = Table {
  name:       "servers",
  key:        &["id"],
  scope:      Some("zone"),
  references: &[Reference {
    column:           "security_group_id",
    parent:           "security_groups",
    required:         false,
    on_parent_delete: DeletePolicy::Nullify,
    clear_fields:     &["security_group"],
  }],
  service:    "instance",
  state_key:  "servers",
  redact:     &[],
};

pub static IPS: Table = Table {
  name:       "ips",
  key:        &["id"],
  scope:      Some("zone"),
  references: &[Reference {
    column:           "server_id",
    parent:           "servers",
    required:         false,
    on_parent_delete: DeletePolicy::Nullify,
    clear_fields:     &[],
  }],
  service:    "instance",
  state_key:  "ips",
  redact:     &[],
};

pub static PRIVATE_NICS: Table = Table {
  name:       "private_nics",
  key:        &["id"],
  scope:      Some("zone"),
  references: &[
    Reference {
      column:           "server_id",
      parent:           "servers",
      required:         true,
      on_parent_delete: DeletePolicy::Cascade,
      clear_fields:     &[],
    },
    Reference {
      column:           "private_network_id",
      parent:           "private_networks",
      required:         true,
      on_parent_delete: DeletePolicy::Reject,
      clear_fields:     &[],
    },
  ],
  service:    "instance",
  state_key:  "private_nics",
  redact:     &[],
};

pub static SECURITY_GROUPS: Table = Table {
  name:       "security_groups",
  key:        &["id"],
  scope:      Some("zone"),
  references: &[],
  service:    "instance",
  state_key:  "security_groups",
  redact:     &[],
};

// ─── VPC ─────────────────────────────────────────────────────────────────────

pub static VPCS: Table = Table {
  name:       "vpcs",
  key:        &["id"],
  scope:      Some("region"),
  references: &[],
  service:    "vpc",
  state_key:  "vpcs",
  redact:     &[],
};

pub static PRIVATE_NETWORKS: Table = Table {
  name:       "private_networks",
  key:        &["id"],
  scope:      Some("region"),
  references: &[Reference {
    column:           "vpc_id",
    parent:           "vpcs",
    required:         true,
    on_parent_delete: DeletePolicy::Reject,
    clear_fields:     &[],
  }],
  service:    "vpc",
  state_key:  "private_networks",
  redact:     &[],
};

// ─── Load balancer ───────────────────────────────────────────────────────────

pub static LB_IPS: Table = Table {
  name:       "lb_ips",
  key:        &["id"],
  scope:      Some("zone"),
  references: &[],
  service:    "lb",
  state_key:  "ips",
  redact:     &[],
};

pub static LBS: Table = Table {
  name:       "lbs",
  key:        &["id"],
  scope:      Some("zone"),
  references: &[],
  service:    "lb",
  state_key:  "lbs",
  redact:     &[],
};

pub static LB_FRONTENDS: Table = Table {
  name:       "lb_frontends",
  key:        &["id"],
  scope:      None,
  references: &[Reference {
    column:           "lb_id",
    parent:           "lbs",
    required:         true,
    on_parent_delete: DeletePolicy::Reject,
    clear_fields:     &[],
  }],
  service:    "lb",
  state_key:  "frontends",
  redact:     &[],
};

pub static LB_BACKENDS: Table = Table {
  name:       "lb_backends",
  key:        &["id"],
  scope:      None,
  references: &[Reference {
    column:           "lb_id",
    parent:           "lbs",
    required:         true,
    on_parent_delete: DeletePolicy::Reject,
    clear_fields:     &[],
  }],
  service:    "lb",
  state_key:  "backends",
  redact:     &[],
};

pub static LB_PRIVATE_NETWORKS: Table = Table {
  name:       "lb_private_networks",
  key:        &["lb_id", "private_network_id"],
  scope:      None,
  references: &[
    Reference {
      column:           "lb_id",
      parent:           "lbs",
      required:         true,
      on_parent_delete: DeletePolicy::Cascade,
      clear_fields:     &[],
    },
    Reference {
      column:           "private_network_id",
      parent:           "private_networks",
      required:         true,
      on_parent_delete: DeletePolicy::Reject,
      clear_fields:     &[],
    },
  ],
  service:    "lb",
  state_key:  "private_networks",
  redact:     &[],
};

// ─── Kubernetes ──────────────────────────────────────────────────────────────

pub static K8S_CLUSTERS: Table = Table {
  name:       "k8s_clusters",
  key:        &["id"],
  scope:      Some("region"),
  references: &[Reference {
    column:           "private_network_id",
    parent:           "private_networks",
    required:         false,
    on_parent_delete: DeletePolicy::Reject,
    clear_fields:     &[],
  }],
  service:    "k8s",
  state_key:  "clusters",
  redact:     &[],
};

pub static K8S_POOLS: Table = Table {
  name:       "k8s_pools",
  key:        &["id"],
  scope:      Some("region"),
  references: &[Reference {
    column:           "cluster_id",
    parent:           "k8s_clusters",
    required:         true,
    on_parent_delete: DeletePolicy::Reject,
    clear_fields:     &[],
  }],
  service:    "k8s",
  state_key:  "pools",
  redact:     &[],
};

// ─── Managed databases ───────────────────────────────────────────────────────

pub static RDB_INSTANCES: Table = Table {
  name:       "rdb_instances",
  key:        &["id"],
  scope:      Some("region"),
  references: &[],
  service:    "rdb",
  state_key:  "instances",
  redact:     &[],
};

pub static RDB_DATABASES: Table = Table {
  name:       "rdb_databases",
  key:        &["instance_id", "name"],
  scope:      None,
  references: &[Reference {
    column:           "instance_id",
    parent:           "rdb_instances",
    required:         true,
    on_parent_delete: DeletePolicy::Reject,
    clear_fields:     &[],
  }],
  service:    "rdb",
  state_key:  "databases",
  redact:     &[],
};

pub static RDB_USERS: Table = Table {
  name:       "rdb_users",
  key:        &["instance_id", "name"],
  scope:      None,
  references: &[Reference {
    column:           "instance_id",
    parent:           "rdb_instances",
    required:         true,
    on_parent_delete: DeletePolicy::Reject,
    clear_fields:     &[],
  }],
  service:    "rdb",
  state_key:  "users",
  redact:     &[],
};

pub static RDB_PRIVILEGES: Table = Table {
  name:       "rdb_privileges",
  key:        &["instance_id", "user_name", "database_name"],
  scope:      None,
  references: &[Reference {
    column:           "instance_id",
    parent:           "rdb_instances",
    required:         true,
    on_parent_delete: DeletePolicy::Reject,
    clear_fields:     &[],
  }],
  service:    "rdb",
  state_key:  "privileges",
  redact:     &[],
};

// ─── Redis ───────────────────────────────────────────────────────────────────

pub static REDIS_CLUSTERS: Table = Table {
  name:       "redis_clusters",
  key:        &["id"],
  scope:      Some("zone"),
  references: &[],
  service:    "redis",
  state_key:  "clusters",
  redact:     &[],
};

// ─── Container registry ──────────────────────────────────────────────────────

pub static REGISTRY_NAMESPACES: Table = Table {
  name:       "registry_namespaces",
  key:        &["id"],
  scope:      Some("region"),
  references: &[],
  service:    "registry",
  state_key:  "namespaces",
  redact:     &[],
};

// ─── IAM ─────────────────────────────────────────────────────────────────────

pub static IAM_APPLICATIONS: Table = Table {
  name:       "iam_applications",
  key:        &["id"],
  scope:      None,
  references: &[],
  service:    "iam",
  state_key:  "applications",
  redact:     &[],
};

pub static IAM_API_KEYS: Table = Table {
  name:       "iam_api_keys",
  key:        &["access_key"],
  scope:      None,
  references: &[Reference {
    column:           "application_id",
    parent:           "iam_applications",
    required:         false,
    on_parent_delete: DeletePolicy::Reject,
    clear_fields:     &[],
  }],
  service:    "iam",
  state_key:  "api_keys",
  redact:     &["secret_key"],
};

pub static IAM_POLICIES: Table = Table {
  name:       "iam_policies",
  key:        &["id"],
  scope:      None,
  references: &[Reference {
    column:           "application_id",
    parent:           "iam_applications",
    required:         false,
    on_parent_delete: DeletePolicy::Reject,
    clear_fields:     &[],
  }],
  service:    "iam",
  state_key:  "policies",
  redact:     &[],
};

pub static IAM_SSH_KEYS: Table = Table {
  name:       "iam_ssh_keys",
  key:        &["id"],
  scope:      None,
  references: &[],
  service:    "iam",
  state_key:  "ssh_keys",
  redact:     &[],
};

// ─── Domains ─────────────────────────────────────────────────────────────────

pub static DOMAIN_RECORDS: Table = Table {
  name:       "domain_records",
  key:        &["id"],
  scope:      Some("dns_zone"),
  references: &[],
  service:    "domain",
  state_key:  "records",
  redact:     &[],
};

// ─── The full catalog ────────────────────────────────────────────────────────

/// Every table, in state-snapshot order: tables of one service are
/// adjacent, and within a service they appear in snapshot key order.
pub static TABLES: [&Table; 24] = [
  &SERVERS,
  &IPS,
  &PRIVATE_NICS,
  &SECURITY_GROUPS,
  &VPCS,
  &PRIVATE_NETWORKS,
  &LB_IPS,
  &LBS,
  &LB_FRONTENDS,
  &LB_BACKENDS,
  &LB_PRIVATE_NETWORKS,
  &K8S_CLUSTERS,
  &K8S_POOLS,
  &RDB_INSTANCES,
  &RDB_DATABASES,
  &RDB_USERS,
  &RDB_PRIVILEGES,
  &REDIS_CLUSTERS,
  &REGISTRY_NAMESPACES,
  &IAM_APPLICATIONS,
  &IAM_API_KEYS,
  &IAM_POLICIES,
  &IAM_SSH_KEYS,
  &DOMAIN_RECORDS,
];

/// Look up a table declaration by name.
pub fn find(name: &str) -> Option<&'static Table> {
  TABLES.iter().copied().find(|t| t.name == name)
}

/// Every reference across the catalog pointing at `parent`, as
/// (child table, reference) pairs. Drives delete policies.
pub fn inbound(
  parent: &'static Table,
) -> impl Iterator<Item = (&'static Table, &'static Reference)> {
  TABLES.iter().copied().flat_map(move |t| {
    t.references
      .iter()
      .filter(move |r| r.parent == parent.name)
      .map(move |r| (t, r))
  })
}
