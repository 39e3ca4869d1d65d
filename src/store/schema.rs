use crate::types::CleanLevel;

pub const SCHEMA: &str = r#"
-- Reference data, seeded on initialize
CREATE TABLE IF NOT EXISTS registries (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS sig_status (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS packages (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    registry_id INTEGER NOT NULL REFERENCES registries(id),
    versions_count INTEGER NOT NULL DEFAULT 0,
    latest_release_date TEXT,
    first_release_date TEXT,
    downloads INTEGER,
    downloads_period TEXT,

    UNIQUE(name, registry_id)
);

CREATE TABLE IF NOT EXISTS versions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    package_id INTEGER NOT NULL REFERENCES packages(id),
    name TEXT NOT NULL,
    date TEXT,              -- NULL when the registry dates artifacts instead

    UNIQUE(package_id, name)
);

CREATE TABLE IF NOT EXISTS artifacts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    version_id INTEGER NOT NULL REFERENCES versions(id),
    name TEXT NOT NULL,
    type TEXT NOT NULL,
    has_sig INTEGER NOT NULL DEFAULT 0,
    digest TEXT,
    date TEXT,
    extensions TEXT,        -- JSON array

    UNIQUE(version_id, name)
);

CREATE TABLE IF NOT EXISTS signatures (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    artifact_id INTEGER NOT NULL UNIQUE REFERENCES artifacts(id),
    type TEXT NOT NULL,
    raw TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS sig_check (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    artifact_id INTEGER NOT NULL UNIQUE REFERENCES artifacts(id),
    status INTEGER NOT NULL REFERENCES sig_status(id),
    raw TEXT
);

CREATE TABLE IF NOT EXISTS list_packets (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    signature_id INTEGER NOT NULL UNIQUE REFERENCES signatures(id),
    algo INTEGER,
    digest_algo INTEGER,
    data INTEGER,           -- signed data length in bits
    key_id TEXT,
    created INTEGER,        -- seconds since epoch
    expires INTEGER NOT NULL DEFAULT 0,
    raw TEXT NOT NULL
);

-- Key lookup cache, independent of any registry
CREATE TABLE IF NOT EXISTS pgp_keys (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    key_id TEXT NOT NULL UNIQUE,
    keyserver TEXT NOT NULL,
    raw TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_packages_registry ON packages(registry_id);
"#;

/// One edge of the ownership graph: `table.fk` references `parent.id`.
///
/// `packages` is the root and is scoped directly by `registry_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Owned {
    pub table: &'static str,
    pub fk: &'static str,
    pub parent: Option<&'static str>,
    pub level: CleanLevel,
}

/// Package -> Version -> Artifact -> {Signature, SigCheck}; Signature -> ListPacket.
///
/// Both index creation and registry-scoped deletes are derived from this list.
pub const OWNERSHIP: &[Owned] = &[
    Owned {
        table: "packages",
        fk: "registry_id",
        parent: None,
        level: CleanLevel::Packages,
    },
    Owned {
        table: "versions",
        fk: "package_id",
        parent: Some("packages"),
        level: CleanLevel::Versions,
    },
    Owned {
        table: "artifacts",
        fk: "version_id",
        parent: Some("versions"),
        level: CleanLevel::Artifacts,
    },
    Owned {
        table: "signatures",
        fk: "artifact_id",
        parent: Some("artifacts"),
        level: CleanLevel::Signatures,
    },
    Owned {
        table: "sig_check",
        fk: "artifact_id",
        parent: Some("artifacts"),
        level: CleanLevel::Signatures,
    },
    Owned {
        table: "list_packets",
        fk: "signature_id",
        parent: Some("signatures"),
        level: CleanLevel::Signatures,
    },
];

pub fn owned(table: &str) -> Option<&'static Owned> {
    OWNERSHIP.iter().find(|o| o.table == table)
}

/// Distance from `packages` along the ownership chain.
pub fn depth(entry: &Owned) -> usize {
    match entry.parent.and_then(owned) {
        Some(parent) => depth(parent) + 1,
        None => 0,
    }
}

/// `SELECT id FROM <table>` restricted to rows reachable from registry `?1`.
pub fn scoped_ids(entry: &Owned) -> String {
    format!("SELECT id FROM {} WHERE {}", entry.table, scope_clause(entry))
}

/// WHERE clause restricting `entry.table` to rows owned by registry `?1`.
pub fn scope_clause(entry: &Owned) -> String {
    match entry.parent.and_then(owned) {
        Some(parent) => format!("{} IN ({})", entry.fk, scoped_ids(parent)),
        None => format!("{} = ?1", entry.fk),
    }
}

/// Tables removed when cleaning at `level`, deepest first so no row is
/// deleted while something still references it.
pub fn clean_order(level: CleanLevel) -> Vec<&'static Owned> {
    let mut tables: Vec<&'static Owned> = OWNERSHIP.iter().filter(|o| o.level >= level).collect();
    tables.sort_by_key(|o| std::cmp::Reverse(depth(o)));
    tables
}

/// Indexes on every ownership foreign key.
pub fn ownership_indexes() -> String {
    OWNERSHIP
        .iter()
        .filter(|o| o.parent.is_some())
        .map(|o| {
            format!(
                "CREATE INDEX IF NOT EXISTS idx_{t}_{fk} ON {t}({fk});\n",
                t = o.table,
                fk = o.fk
            )
        })
        .collect()
}
