use chrono::Utc;
use rusqlite::types::{ToSql, Type};
use rusqlite::{Connection, OptionalExtension, Row, params};
use uuid::Uuid;

use super::RemoteStore;
use super::models::{Client, ClientDraft, Post, PostDraft, PostImage, PostPatch};
use super::schema;
use crate::errors::{CalError, Result};

const CLIENT_SELECT: &str = "
    SELECT id, name, themecolor, password, active, created_at, description
    FROM clients
";

const POST_SELECT: &str = "
    SELECT id, clientid, date, day, dayofweek, title, type, posttype, text,
           completed, notes, images, socialnetworks, month, year, time
    FROM posts
";

const POST_IMAGE_SELECT: &str = "SELECT id, post_id, url, created_at FROM post_images";

pub struct SqliteStore {
    conn: Connection,
}

fn row_to_client(row: &Row) -> rusqlite::Result<Client> {
    let active: i32 = row.get(4)?;
    Ok(Client {
        id: row.get(0)?,
        name: row.get(1)?,
        theme_color: row.get(2)?,
        password: row.get(3)?,
        active: active != 0,
        created_at: row.get(5)?,
        description: row.get(6)?,
    })
}

fn json_list(row: &Row, idx: usize) -> rusqlite::Result<Vec<String>> {
    let raw: String = row.get(idx)?;
    if raw.is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn row_to_post(row: &Row) -> rusqlite::Result<Post> {
    let completed: i32 = row.get(9)?;
    Ok(Post {
        id: row.get(0)?,
        client_id: row.get(1)?,
        date: row.get(2)?,
        day: row.get(3)?,
        day_of_week: row.get(4)?,
        title: row.get(5)?,
        content_type: row.get(6)?,
        post_type: row.get(7)?,
        text: row.get(8)?,
        completed: completed != 0,
        notes: row.get(10)?,
        images: json_list(row, 11)?,
        social_networks: json_list(row, 12)?,
        month: row.get(13)?,
        year: row.get(14)?,
        time: row.get(15)?,
    })
}

fn row_to_post_image(row: &Row) -> rusqlite::Result<PostImage> {
    Ok(PostImage {
        id: row.get(0)?,
        post_id: row.get(1)?,
        url: row.get(2)?,
        created_at: row.get(3)?,
    })
}

impl SqliteStore {
    pub fn new(conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute(schema::CREATE_CLIENTS_TABLE, [])?;
        conn.execute(schema::CREATE_POSTS_TABLE, [])?;
        conn.execute(schema::CREATE_POST_IMAGES_TABLE, [])?;
        conn.execute(schema::CREATE_INDEX_POSTS_CLIENT, [])?;
        conn.execute(schema::CREATE_INDEX_POSTS_DATE, [])?;
        conn.execute(schema::CREATE_INDEX_POST_IMAGES_POST, [])?;
        Ok(Self { conn })
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::new(conn)
    }

    #[cfg(test)]
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    fn client_exists(&self, id: &str) -> Result<bool> {
        let found: Option<i64> = self
            .conn
            .query_row("SELECT 1 FROM clients WHERE id = ?", params![id], |row| row.get(0))
            .optional()?;
        Ok(found.is_some())
    }

    fn insert_client(&self, client: &ClientDraft) -> Result<Client> {
        let id = Uuid::new_v4().to_string();
        self.conn.execute(
            "INSERT INTO clients (id, name, themecolor, password, active, created_at, description)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
            params![
                id,
                client.name,
                client.theme_color,
                client.password,
                client.active as i32,
                Utc::now(),
                client.description,
            ],
        )?;
        tracing::debug!(client_id = %id, "inserted client");
        self.fetch_client_by_id(&id, None)
    }

    fn update_client(&self, id: &str, client: &ClientDraft) -> Result<Client> {
        let changes = self.conn.execute(
            "UPDATE clients SET name = ?, themecolor = ?, password = ?, active = ?, description = ?
             WHERE id = ?",
            params![
                client.name,
                client.theme_color,
                client.password,
                client.active as i32,
                client.description,
                id,
            ],
        )?;
        if changes == 0 {
            return Err(CalError::NotFound(format!("Client with id {} not found", id)));
        }
        tracing::debug!(client_id = %id, "updated client");
        self.fetch_client_by_id(id, None)
    }

    fn insert_post(&self, post: &PostDraft) -> Result<Post> {
        if !self.client_exists(&post.client_id)? {
            return Err(CalError::NotFound(format!(
                "Client with id {} not found",
                post.client_id
            )));
        }
        self.conn.execute(
            "INSERT INTO posts (clientid, date, day, dayofweek, title, type, posttype, text,
                                completed, notes, images, socialnetworks, month, year, time)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                post.client_id,
                post.date,
                post.day,
                post.day_of_week,
                post.title,
                post.content_type,
                post.post_type,
                post.text,
                post.completed as i32,
                post.notes,
                serde_json::to_string(&post.images)?,
                serde_json::to_string(&post.social_networks)?,
                post.month,
                post.year,
                post.time,
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        tracing::debug!(post_id = id, client_id = %post.client_id, "inserted post");
        self.fetch_post(id)
    }

    fn replace_post(&self, id: i64, post: &PostDraft) -> Result<Post> {
        let changes = self.conn.execute(
            "UPDATE posts SET clientid = ?, date = ?, day = ?, dayofweek = ?, title = ?, type = ?,
                              posttype = ?, text = ?, completed = ?, notes = ?, images = ?,
                              socialnetworks = ?, month = ?, year = ?, time = ?
             WHERE id = ?",
            params![
                post.client_id,
                post.date,
                post.day,
                post.day_of_week,
                post.title,
                post.content_type,
                post.post_type,
                post.text,
                post.completed as i32,
                post.notes,
                serde_json::to_string(&post.images)?,
                serde_json::to_string(&post.social_networks)?,
                post.month,
                post.year,
                post.time,
                id,
            ],
        )?;
        if changes == 0 {
            return Err(CalError::NotFound(format!("Post with id {} not found", id)));
        }
        tracing::debug!(post_id = id, "updated post");
        self.fetch_post(id)
    }
}

impl RemoteStore for SqliteStore {
    fn fetch_clients(&self) -> Result<Vec<Client>> {
        let sql = format!("{} ORDER BY created_at, rowid", CLIENT_SELECT);
        let mut stmt = self.conn.prepare(&sql)?;
        let clients = stmt
            .query_map([], row_to_client)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(clients)
    }

    fn fetch_client_by_id(&self, id: &str, password: Option<&str>) -> Result<Client> {
        let sql = format!("{} WHERE id = ?", CLIENT_SELECT);
        let client = self
            .conn
            .query_row(&sql, params![id], row_to_client)
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => {
                    CalError::NotFound(format!("Client with id {} not found", id))
                }
                other => CalError::Storage(other),
            })?;

        if let Some(supplied) = password
            && !supplied.is_empty()
            && !client.password.is_empty()
            && client.password != supplied
        {
            return Err(CalError::Unauthorized(format!(
                "Password mismatch for client {}",
                id
            )));
        }
        Ok(client)
    }

    fn save_client(&self, client: &ClientDraft) -> Result<Client> {
        match client.id.as_deref() {
            Some(id) => self.update_client(id, client),
            None => self.insert_client(client),
        }
    }

    fn delete_client(&self, id: &str) -> Result<bool> {
        let changes = self.conn.execute("DELETE FROM clients WHERE id = ?", params![id])?;
        Ok(changes > 0)
    }

    fn fetch_client_posts(&self, client_id: &str) -> Result<Vec<Post>> {
        let sql = format!("{} WHERE clientid = ? ORDER BY date, id", POST_SELECT);
        let mut stmt = self.conn.prepare(&sql)?;
        let posts = stmt
            .query_map(params![client_id], row_to_post)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(posts)
    }

    fn fetch_post(&self, id: i64) -> Result<Post> {
        let sql = format!("{} WHERE id = ?", POST_SELECT);
        self.conn
            .query_row(&sql, params![id], row_to_post)
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => {
                    CalError::NotFound(format!("Post with id {} not found", id))
                }
                other => CalError::Storage(other),
            })
    }

    fn save_post(&self, post: &PostDraft) -> Result<Post> {
        match post.id {
            Some(id) => self.replace_post(id, post),
            None => self.insert_post(post),
        }
    }

    fn update_post(&self, id: i64, patch: &PostPatch) -> Result<Post> {
        let mut assignments = Vec::new();
        let mut param_values: Vec<Box<dyn ToSql>> = Vec::new();

        if let Some(ref title) = patch.title {
            assignments.push("title = ?");
            param_values.push(Box::new(title.clone()));
        }
        if let Some(ref text) = patch.text {
            assignments.push("text = ?");
            param_values.push(Box::new(text.clone()));
        }
        if let Some(completed) = patch.completed {
            assignments.push("completed = ?");
            param_values.push(Box::new(completed as i32));
        }
        if let Some(ref notes) = patch.notes {
            assignments.push("notes = ?");
            param_values.push(Box::new(notes.clone()));
        }
        if let Some(ref images) = patch.images {
            assignments.push("images = ?");
            param_values.push(Box::new(serde_json::to_string(images)?));
        }

        if assignments.is_empty() {
            return self.fetch_post(id);
        }

        let sql = format!("UPDATE posts SET {} WHERE id = ?", assignments.join(", "));
        param_values.push(Box::new(id));
        let param_refs: Vec<&dyn ToSql> = param_values.iter().map(|p| p.as_ref()).collect();

        let changes = self.conn.execute(&sql, param_refs.as_slice())?;
        if changes == 0 {
            return Err(CalError::NotFound(format!("Post with id {} not found", id)));
        }
        self.fetch_post(id)
    }

    fn delete_post(&self, id: i64) -> Result<bool> {
        let changes = self.conn.execute("DELETE FROM posts WHERE id = ?", params![id])?;
        Ok(changes > 0)
    }

    fn insert_post_image(&self, post_id: i64, url: &str) -> Result<PostImage> {
        self.conn.execute(
            "INSERT INTO post_images (post_id, url, created_at) VALUES (?, ?, ?)",
            params![post_id, url, Utc::now()],
        )?;
        let id = self.conn.last_insert_rowid();
        let sql = format!("{} WHERE id = ?", POST_IMAGE_SELECT);
        Ok(self.conn.query_row(&sql, params![id], row_to_post_image)?)
    }

    fn find_post_image(&self, post_id: i64, url: &str) -> Result<Option<PostImage>> {
        let sql = format!("{} WHERE post_id = ? AND url = ? ORDER BY id LIMIT 1", POST_IMAGE_SELECT);
        let image = self
            .conn
            .query_row(&sql, params![post_id, url], row_to_post_image)
            .optional()?;
        Ok(image)
    }

    fn delete_post_image(&self, id: i64) -> Result<bool> {
        let changes = self.conn.execute("DELETE FROM post_images WHERE id = ?", params![id])?;
        Ok(changes > 0)
    }

    fn list_post_images(&self, post_id: i64) -> Result<Vec<PostImage>> {
        let sql = format!("{} WHERE post_id = ? ORDER BY id", POST_IMAGE_SELECT);
        let mut stmt = self.conn.prepare(&sql)?;
        let images = stmt
            .query_map(params![post_id], row_to_post_image)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(images)
    }

    fn post_counts(&self) -> Result<Vec<(String, i64)>> {
        let mut stmt = self.conn.prepare(
            "SELECT clients.id, COUNT(posts.id)
             FROM clients
             LEFT JOIN posts ON posts.clientid = clients.id
             GROUP BY clients.id
             ORDER BY clients.created_at, clients.rowid",
        )?;
        let counts = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(counts)
    }
}
