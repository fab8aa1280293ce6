/// Database row types — these map directly to SQLite rows.
/// Distinct from turps-types models to keep the DB layer independent.

#[derive(Debug)]
pub struct UserRow {
    pub id: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub external_id: Option<String>,
    pub created_at: String,
}

#[derive(Debug)]
pub struct MessageRow {
    pub id: i64,
    pub author_name: String,
    pub body: String,
    pub created_at: String,
}

/// A session joined with the user it belongs to.
#[derive(Debug)]
pub struct SessionRow {
    pub id: String,
    pub expires_at: String,
    pub user: UserRow,
}
