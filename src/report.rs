use std::collections::HashMap;

use serde::Serialize;

use crate::storage::models::Client;

const CHART_NAME_LIMIT: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartEntry {
    pub name: String,
    pub posts: i64,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    pub total_clients: usize,
    pub active_clients: usize,
    pub total_posts: i64,
    pub average_posts: f64,
    pub chart: Vec<ChartEntry>,
}

fn chart_name(name: &str) -> String {
    if name.chars().count() > CHART_NAME_LIMIT {
        let head: String = name.chars().take(CHART_NAME_LIMIT).collect();
        format!("{}...", head)
    } else {
        name.to_string()
    }
}

impl Dashboard {
    /// `counts` maps client ids to post counts; clients missing from it count zero.
    pub fn build(clients: &[Client], counts: &[(String, i64)]) -> Self {
        let by_client: HashMap<&str, i64> =
            counts.iter().map(|(id, n)| (id.as_str(), *n)).collect();

        let mut chart: Vec<ChartEntry> = clients
            .iter()
            .map(|c| ChartEntry {
                name: chart_name(&c.name),
                posts: by_client.get(c.id.as_str()).copied().unwrap_or(0),
                color: c.theme_color.clone(),
            })
            .collect();
        chart.sort_by(|a, b| b.posts.cmp(&a.posts));

        let total_posts: i64 = chart.iter().map(|e| e.posts).sum();
        let average_posts = if clients.is_empty() {
            0.0
        } else {
            total_posts as f64 / clients.len() as f64
        };

        Self {
            total_clients: clients.len(),
            active_clients: clients.iter().filter(|c| c.active).count(),
            total_posts,
            average_posts,
            chart,
        }
    }

    pub fn average_display(&self) -> String {
        format!("{:.1}", self.average_posts)
    }
}
