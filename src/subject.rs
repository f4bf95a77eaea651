//! Subject listing

use crate::client::ApiClient;
use crate::ui::UI;
use handout_vault_protocol::api::ListSubjectsResponse;
use handout_vault_protocol::common::SubjectSummary;

pub const SUBJECTS_ENDPOINT: &str = "/handouts/subjects";

/// Configured subjects first, in order, with the server count or 0.
/// Subjects only the server knows follow in server order.
pub fn merge_subjects(configured: &[String], server: Vec<SubjectSummary>) -> Vec<SubjectSummary> {
    let mut merged: Vec<SubjectSummary> = configured
        .iter()
        .map(|name| SubjectSummary {
            id: name.clone(),
            count: server
                .iter()
                .find(|s| &s.id == name)
                .map(|s| s.count)
                .unwrap_or(0),
        })
        .collect();

    for subject in server {
        if !merged.iter().any(|s| s.id == subject.id) {
            merged.push(subject);
        }
    }

    merged
}

pub struct SubjectService {
    ui: UI,
}

impl SubjectService {
    pub fn new() -> Self {
        Self { ui: UI::new() }
    }

    /// Subjects with handout counts. Never fails: an API error yields an empty list.
    pub async fn list<C: ApiClient + ?Sized>(&self, client: &C) -> Vec<SubjectSummary> {
        match client.get_json::<ListSubjectsResponse>(SUBJECTS_ENDPOINT).await {
            Ok(server) => merge_subjects(&client.config().subjects, server),
            Err(e) => {
                tracing::warn!(error = %e, "failed to load subjects");
                Vec::new()
            }
        }
    }

    /// `hvault subjects`
    pub async fn show<C: ApiClient + ?Sized>(&self, client: &C) -> Vec<SubjectSummary> {
        let subjects = self.list(client).await;
        self.render(&subjects);
        subjects
    }

    pub fn render(&self, subjects: &[SubjectSummary]) {
        if subjects.is_empty() {
            self.ui.warning("No subjects available.");
            return;
        }

        let rows = subjects
            .iter()
            .map(|s| vec![s.id.clone(), s.count.to_string()])
            .collect();
        self.ui.table(&["SUBJECT", "HANDOUTS"], rows);
    }
}

impl Default for SubjectService {
    fn default() -> Self {
        Self::new()
    }
}
