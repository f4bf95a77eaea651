use dialoguer::{theme::ColorfulTheme, Input, Select};
use std::path::PathBuf;
use std::sync::Arc;
use validator::Validate;

use crate::client::{ApiClient, Progress, UploadForm};
use crate::error::{Result, VaultError};
use crate::subject::SubjectService;
use crate::ui::UI;
use crate::utils::percent;
use crate::UploadArgs;
use handout_vault_protocol::api::{UploadHandoutRequest, UploadHandoutResponse};

pub const UPLOAD_ENDPOINT: &str = "/handouts/upload";

const ADD_SUBJECT_ENTRY: &str = "+ Add New Subject";

/// Upload service for sending a handout file with its subject and title
pub struct UploadService<C: ApiClient + ?Sized> {
    client: Arc<C>,
    interactive: bool,
    progress_enabled: bool,
    ui: UI,
}

impl<C: ApiClient + ?Sized> UploadService<C> {
    pub fn new(client: Arc<C>, interactive: bool) -> Self {
        Self {
            client,
            interactive,
            progress_enabled: interactive,
            ui: UI::new(),
        }
    }

    /// Upload a file, then refresh the subject list
    pub async fn upload(&self, args: UploadArgs) -> Result<UploadHandoutResponse> {
        let subject = match args.subject {
            Some(subject) => subject,
            None if self.interactive => self.prompt_subject().await?,
            None => String::new(),
        };
        let title = match args.title {
            Some(title) => title,
            None if self.interactive => Input::<String>::with_theme(&ColorfulTheme::default())
                .with_prompt("Title")
                .allow_empty(true)
                .interact_text()?,
            None => String::new(),
        };
        let file_path = match args.file {
            Some(path) => Some(path),
            None if self.interactive => {
                let raw = Input::<String>::with_theme(&ColorfulTheme::default())
                    .with_prompt("File")
                    .allow_empty(true)
                    .interact_text()?;
                Some(PathBuf::from(raw.trim())).filter(|p| !p.as_os_str().is_empty())
            }
            None => None,
        };

        let request = UploadHandoutRequest {
            subject: subject.trim().to_string(),
            title: title.trim().to_string(),
        };
        request.validate()?;
        let file_path =
            file_path.ok_or_else(|| VaultError::validation_field("Fill all fields", "file"))?;

        let metadata = tokio::fs::metadata(&file_path)
            .await
            .map_err(|_| VaultError::file_not_found(file_path.display().to_string()))?;
        if !metadata.is_file() {
            return Err(VaultError::validation_field(
                format!("{} is not a file", file_path.display()),
                "file",
            ));
        }

        let form = UploadForm {
            subject: request.subject,
            title: request.title,
            file_path,
        };
        tracing::info!(subject = %form.subject, title = %form.title, bytes = metadata.len(), "uploading handout");

        let response = self.send(&form).await?;

        let version = response
            .latest_version()
            .map(|v| format!(" (v{})", v))
            .unwrap_or_default();
        self.ui.success(&format!(
            "Uploaded '{}' to {}{}",
            form.title, form.subject, version
        ));

        SubjectService::new().show(&*self.client).await;
        Ok(response)
    }

    async fn send(&self, form: &UploadForm) -> Result<UploadHandoutResponse> {
        let progress_bar = self
            .progress_enabled
            .then(|| crate::ui::create_percent_bar("Uploading"));

        let progress: Progress = match progress_bar.clone() {
            Some(pb) => Arc::new(move |sent: u64, total: u64| pb.set_position(percent(sent, total))),
            None => Arc::new(|sent: u64, total: u64| {
                tracing::debug!(progress = percent(sent, total), "upload progress");
            }),
        };

        let result = self
            .client
            .upload_multipart::<UploadHandoutResponse>(UPLOAD_ENDPOINT, form, progress)
            .await;

        if let Some(pb) = progress_bar {
            match &result {
                Ok(_) => pb.finish_with_message("Upload completed"),
                Err(_) => pb.abandon_with_message("Upload failed"),
            }
        }

        result.map_err(|e| match e {
            VaultError::Api { message, .. } | VaultError::Network { message, .. } => {
                VaultError::upload(message)
            }
            VaultError::Io { message, .. } => VaultError::upload(message),
            other => other,
        })
    }

    /// Subject picker over the known subjects plus an entry for a new one
    async fn prompt_subject(&self) -> Result<String> {
        let mut items: Vec<String> = SubjectService::new()
            .list(&*self.client)
            .await
            .into_iter()
            .map(|s| s.id)
            .collect();
        if items.is_empty() {
            items = self.client.config().subjects.clone();
        }
        items.push(ADD_SUBJECT_ENTRY.to_string());

        let selection = Select::with_theme(&ColorfulTheme::default())
            .with_prompt("Subject")
            .items(&items)
            .default(0)
            .interact()?;

        if items[selection] == ADD_SUBJECT_ENTRY {
            let name = Input::<String>::with_theme(&ColorfulTheme::default())
                .with_prompt("New subject")
                .allow_empty(true)
                .interact_text()?;
            return Ok(name);
        }
        Ok(items[selection].clone())
    }
}
