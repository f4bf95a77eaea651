//! Handout browsing, version details, download and preview

use console::Term;
use dialoguer::{theme::ColorfulTheme, Confirm};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::client::{ApiClient, Progress};
use crate::config::encode_segment;
use crate::error::{Result, VaultError};
use crate::ui::UI;
use crate::utils::{file_name_from_path, format_kb, format_timestamp, sha256_file};
use crate::{DownloadArgs, PreviewArgs, ShowArgs};
use handout_vault_protocol::api::{ListHandoutsResponse, ListVersionsResponse};
use handout_vault_protocol::common::{HandoutSummary, HandoutVersion};

pub fn subject_endpoint(subject: &str) -> String {
    format!("/handouts/subject/{}", encode_segment(subject))
}

pub fn versions_endpoint(handout_id: &str) -> String {
    format!("/handouts/{}/versions", encode_segment(handout_id))
}

pub fn download_endpoint(handout_id: &str, version_id: &str) -> String {
    format!(
        "/handouts/{}/versions/{}/download",
        encode_segment(handout_id),
        encode_segment(version_id)
    )
}

pub fn preview_endpoint(version_id: &str) -> String {
    format!("/handouts/preview/{}", encode_segment(version_id))
}

/// Pick a version by number, or the first (default) entry
pub fn select_version(versions: &[HandoutVersion], number: Option<u32>) -> Result<&HandoutVersion> {
    if versions.is_empty() {
        return Err(VaultError::version_not_found("No versions available."));
    }

    match number {
        None => Ok(&versions[0]),
        Some(n) => versions
            .iter()
            .find(|v| v.version == n)
            .ok_or_else(|| VaultError::version_not_found(format!("Version {} does not exist", n))),
    }
}

/// Local file name for a downloaded version
pub fn download_file_name(handout_id: &str, version: &HandoutVersion) -> String {
    version
        .file_path
        .as_deref()
        .and_then(file_name_from_path)
        .or_else(|| version.filename.as_deref().and_then(file_name_from_path))
        .unwrap_or_else(|| format!("handout-{}-v{}", handout_id, version.version))
}

/// Handout operations for the CLI
pub struct HandoutService<C: ApiClient + ?Sized> {
    client: Arc<C>,
    interactive: bool,
    progress_enabled: bool,
    ui: UI,
}

impl<C: ApiClient + ?Sized> HandoutService<C> {
    pub fn new(client: Arc<C>) -> Self {
        let interactive = Term::stdout().is_term();
        Self {
            client,
            interactive,
            progress_enabled: interactive,
            ui: UI::new(),
        }
    }

    /// Never prompt and never draw progress bars
    #[cfg(test)]
    pub fn non_interactive(mut self) -> Self {
        self.interactive = false;
        self.progress_enabled = false;
        self
    }

    pub async fn list_in_subject(&self, subject: &str) -> Result<Vec<HandoutSummary>> {
        let subject = subject.trim();
        if subject.is_empty() {
            return Err(VaultError::validation_field("Subject cannot be empty", "subject"));
        }

        self.client
            .get_json::<ListHandoutsResponse>(&subject_endpoint(subject))
            .await
    }

    /// `hvault handouts <subject>`
    pub async fn show_subject(&self, subject: &str) -> Result<Vec<HandoutSummary>> {
        let handouts = self.list_in_subject(subject).await?;

        self.ui.header(subject.trim());
        if handouts.is_empty() {
            self.ui.info("No handouts yet.");
            return Ok(handouts);
        }

        let rows = handouts
            .iter()
            .map(|h| {
                vec![
                    h.id.clone(),
                    h.title.clone(),
                    h.latest_version
                        .map(|v| format!("v{}", v))
                        .unwrap_or_else(|| "-".to_string()),
                ]
            })
            .collect();
        self.ui.table(&["ID", "TITLE", "LATEST"], rows);
        Ok(handouts)
    }

    /// Versions in server order
    pub async fn list_versions(&self, handout_id: &str) -> Result<Vec<HandoutVersion>> {
        let handout_id = handout_id.trim();
        if handout_id.is_empty() {
            return Err(VaultError::validation_field("Handout id cannot be empty", "handout_id"));
        }

        self.client
            .get_json::<ListVersionsResponse>(&versions_endpoint(handout_id))
            .await
            .map_err(|e| match e {
                VaultError::NotFound { .. } => VaultError::handout_not_found(handout_id),
                other => other,
            })
    }

    /// `hvault versions <id>`; the default selection is marked with `*`
    pub async fn show_versions(&self, handout_id: &str) -> Result<Vec<HandoutVersion>> {
        let versions = self.list_versions(handout_id).await?;
        if versions.is_empty() {
            self.ui.info("No versions available.");
            return Ok(versions);
        }

        let rows = versions
            .iter()
            .enumerate()
            .map(|(i, v)| {
                vec![
                    if i == 0 { "*".to_string() } else { String::new() },
                    format!("v{}", v.version),
                    v.file_type.clone().unwrap_or_else(|| "-".to_string()),
                    format_kb(v.file_size),
                    v.created_at
                        .as_deref()
                        .map(format_timestamp)
                        .unwrap_or_else(|| "-".to_string()),
                    v.downloads.to_string(),
                    v.previews.to_string(),
                ]
            })
            .collect();
        self.ui.table(
            &["", "VERSION", "TYPE", "SIZE", "UPLOADED", "DOWNLOADS", "PREVIEWS"],
            rows,
        );
        Ok(versions)
    }

    async fn resolve_version(&self, handout_id: &str, number: Option<u32>) -> Result<HandoutVersion> {
        let versions = self.list_versions(handout_id).await?;
        select_version(&versions, number).cloned()
    }

    /// `hvault show <id>`: details panel for one version
    pub async fn show(&self, args: ShowArgs) -> Result<HandoutVersion> {
        let version = self.resolve_version(&args.handout_id, args.version).await?;

        self.ui.card(
            &format!("{} v{}", args.handout_id, version.version),
            version_details(&version),
        );
        Ok(version)
    }

    /// `hvault download <id>`; returns the written path
    pub async fn download(&self, args: DownloadArgs) -> Result<PathBuf> {
        let version = self.resolve_version(&args.handout_id, args.version).await?;

        let output_dir = args
            .output
            .clone()
            .or_else(|| self.client.config().download_dir.clone())
            .unwrap_or_else(|| PathBuf::from("."));
        tokio::fs::create_dir_all(&output_dir)
            .await
            .map_err(|e| VaultError::io_from_error("Failed to create output directory", e))?;

        let dest = output_dir.join(download_file_name(&args.handout_id, &version));
        if !self.may_write(&dest, args.force)? {
            return Err(VaultError::user_cancelled());
        }

        let endpoint = download_endpoint(&args.handout_id, &version.id);
        let written = self
            .transfer(&endpoint, &dest, version.file_size, "Downloading")
            .await
            .map_err(|e| match e {
                VaultError::NotFound { .. } => VaultError::version_not_found(format!(
                    "Version v{} of {} is no longer available",
                    version.version, args.handout_id
                )),
                other => other,
            })?;

        if args.verify {
            self.verify(&dest, &version).await?;
        }

        self.ui.success(&format!(
            "Downloaded {} ({})",
            dest.display(),
            crate::utils::format_bytes(written)
        ));
        Ok(dest)
    }

    async fn verify(&self, dest: &Path, version: &HandoutVersion) -> Result<()> {
        let Some(expected) = version.checksum.as_deref().filter(|c| !c.trim().is_empty()) else {
            self.ui
                .warning("No checksum recorded for this version, skipping verification");
            return Ok(());
        };

        let actual = sha256_file(dest).await?;
        if !actual.eq_ignore_ascii_case(expected.trim()) {
            if let Err(e) = tokio::fs::remove_file(dest).await {
                tracing::warn!(error = %e, "failed to remove corrupt download");
            }
            return Err(VaultError::checksum(
                dest.display().to_string(),
                expected.trim(),
                actual,
            ));
        }

        self.ui.note("Checksum verified");
        Ok(())
    }

    /// `hvault preview <id>`; returns the preview URL
    pub async fn preview(&self, args: PreviewArgs) -> Result<String> {
        let version = self.resolve_version(&args.handout_id, args.version).await?;
        let endpoint = preview_endpoint(&version.id);
        let url = self.client.config().endpoint_url(&endpoint);

        match args.output {
            Some(output) => {
                if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
                    tokio::fs::create_dir_all(parent).await?;
                }
                if !self.may_write(&output, args.force)? {
                    return Err(VaultError::user_cancelled());
                }
                self.transfer(&endpoint, &output, version.file_size, "Fetching preview")
                    .await?;
                self.ui
                    .success(&format!("Preview saved to {}", output.display()));
            }
            None => {
                self.ui.info("Preview URL (requires your bearer token):");
                println!("{}", url);
            }
        }

        Ok(url)
    }

    /// Existing files are replaced only with `--force` or after confirmation
    fn may_write(&self, dest: &Path, force: bool) -> Result<bool> {
        if !dest.exists() || force {
            return Ok(true);
        }
        if !self.interactive {
            return Err(VaultError::file_exists(dest.display().to_string()));
        }

        let overwrite = Confirm::with_theme(&ColorfulTheme::default())
            .with_prompt(format!("{} already exists. Overwrite?", dest.display()))
            .default(false)
            .interact()?;
        if !overwrite {
            self.ui.info("Download cancelled");
        }
        Ok(overwrite)
    }

    async fn transfer(&self, endpoint: &str, dest: &Path, expected_len: u64, message: &str) -> Result<u64> {
        let progress_bar = self
            .progress_enabled
            .then(|| crate::ui::create_transfer_bar(expected_len, message));

        let progress: Progress = match progress_bar.clone() {
            Some(pb) => Arc::new(move |done: u64, total: u64| {
                if total > 0 {
                    pb.set_length(total);
                }
                pb.set_position(done);
            }),
            None => crate::client::no_progress(),
        };

        let result = self.client.download_to(endpoint, dest, progress).await;
        if let Some(pb) = progress_bar {
            pb.finish_and_clear();
        }
        result
    }
}

/// Rows of the version details panel
pub fn version_details(version: &HandoutVersion) -> Vec<(&'static str, String)> {
    let or_dash = |value: Option<&str>| value.unwrap_or("-").to_string();

    vec![
        ("Type", or_dash(version.file_type.as_deref())),
        ("Size", format_kb(version.file_size)),
        ("Checksum", or_dash(version.checksum.as_deref())),
        (
            "Uploaded",
            version
                .created_at
                .as_deref()
                .map(format_timestamp)
                .unwrap_or_else(|| "-".to_string()),
        ),
        ("Downloads", version.downloads.to_string()),
        ("Previews", version.previews.to_string()),
        ("File", or_dash(version.file_path.as_deref())),
    ]
}
