use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_THEME_COLOR: &str = "#1E3A8A";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Client {
    pub id: String,
    pub name: String,
    pub theme_color: String,
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_active")]
    pub active: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub description: String,
}

fn default_active() -> bool {
    true
}

impl Client {
    pub fn to_draft(&self) -> ClientDraft {
        ClientDraft {
            id: Some(self.id.clone()),
            name: self.name.clone(),
            theme_color: self.theme_color.clone(),
            password: self.password.clone(),
            active: self.active,
            description: self.description.clone(),
        }
    }
}

/// Input for `save_client`. A present `id` selects update, an absent one insert.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientDraft {
    pub id: Option<String>,
    pub name: String,
    pub theme_color: String,
    pub password: String,
    pub active: bool,
    pub description: String,
}

impl ClientDraft {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            theme_color: DEFAULT_THEME_COLOR.to_string(),
            password: String::new(),
            active: true,
            description: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: i64,
    pub client_id: String,
    pub date: String,
    #[serde(default)]
    pub day: String,
    #[serde(default)]
    pub day_of_week: String,
    #[serde(default)]
    pub title: String,
    #[serde(rename = "type", default)]
    pub content_type: String,
    #[serde(default)]
    pub post_type: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub social_networks: Vec<String>,
    pub month: Option<i32>,
    pub year: Option<i32>,
    pub time: Option<String>,
}

impl Post {
    pub fn to_draft(&self) -> PostDraft {
        PostDraft {
            id: Some(self.id),
            client_id: self.client_id.clone(),
            date: self.date.clone(),
            day: self.day.clone(),
            day_of_week: self.day_of_week.clone(),
            title: self.title.clone(),
            content_type: self.content_type.clone(),
            post_type: self.post_type.clone(),
            text: self.text.clone(),
            completed: self.completed,
            notes: self.notes.clone(),
            images: self.images.clone(),
            social_networks: self.social_networks.clone(),
            month: self.month,
            year: self.year,
            time: self.time.clone(),
        }
    }

    /// Applies the set fields of `patch` in place.
    pub fn apply(&mut self, patch: &PostPatch) {
        if let Some(ref title) = patch.title {
            self.title = title.clone();
        }
        if let Some(ref text) = patch.text {
            self.text = text.clone();
        }
        if let Some(completed) = patch.completed {
            self.completed = completed;
        }
        if let Some(ref notes) = patch.notes {
            self.notes = notes.clone();
        }
        if let Some(ref images) = patch.images {
            self.images = images.clone();
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PostDraft {
    pub id: Option<i64>,
    pub client_id: String,
    pub date: String,
    pub day: String,
    pub day_of_week: String,
    pub title: String,
    pub content_type: String,
    pub post_type: String,
    pub text: String,
    pub completed: bool,
    pub notes: String,
    pub images: Vec<String>,
    pub social_networks: Vec<String>,
    pub month: Option<i32>,
    pub year: Option<i32>,
    pub time: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PostPatch {
    pub title: Option<String>,
    pub text: Option<String>,
    pub completed: Option<bool>,
    pub notes: Option<String>,
    pub images: Option<Vec<String>>,
}

impl PostPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.text.is_none()
            && self.completed.is_none()
            && self.notes.is_none()
            && self.images.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostImage {
    pub id: i64,
    pub post_id: i64,
    pub url: String,
    pub created_at: DateTime<Utc>,
}
