/// Database row types — these map directly to SQLite rows.
/// Distinct from lattice-types API models to keep the DB layer independent.

pub struct UserRow {
    pub id: String,
    pub username: String,
    pub full_name: String,
    pub profile_picture: Option<String>,
    pub created_at: String,
}

pub struct MessageRow {
    pub id: String,
    pub from_user_id: String,
    pub to_user_id: String,
    pub message_type: String,
    pub text: Option<String>,
    pub media_url: Option<String>,
    pub seen: bool,
    pub created_at: String,
}
