use crate::auth::AuthService;
use crate::config::{default_config_path, Config, ConfigService};
use crate::error::Result;
use crate::handout::HandoutService;
use crate::subject::SubjectService;
use crate::ui::UI;
use crate::upload::UploadService;
use crate::{
    Commands, ConfigArgs, DownloadArgs, HandoutsArgs, LoginArgs, PreviewArgs, ShowArgs,
    UploadArgs, VersionsArgs,
};
use console::Term;
use std::path::PathBuf;

/// CLI handler for processing commands
pub struct CliHandler {
    config_path: Option<PathBuf>,
    ui: UI,
}

impl CliHandler {
    /// Create a new CLI handler with a custom config path
    pub fn with_config_path(config_path: Option<PathBuf>) -> Self {
        Self {
            config_path,
            ui: UI::new(),
        }
    }

    /// Load configuration using the handler's config path
    async fn load_config(&self) -> Result<Config> {
        if let Some(path) = &self.config_path {
            Config::load_from(path).await
        } else {
            Config::load().await
        }
    }

    /// Whether the saved config asks for debug logging
    pub async fn config_verbose(&self) -> bool {
        self.load_config().await.map(|c| c.verbose).unwrap_or(false)
    }

    /// Execute a CLI command
    pub async fn execute(&mut self, command: Commands) -> Result<()> {
        match command {
            Commands::Login(args) => self.handle_login(args).await,
            Commands::Logout => self.handle_logout().await,
            Commands::Status => self.handle_status().await,
            Commands::Subjects => self.handle_subjects().await,
            Commands::Handouts(args) => self.handle_handouts(args).await,
            Commands::Versions(args) => self.handle_versions(args).await,
            Commands::Show(args) => self.handle_show(args).await,
            Commands::Download(args) => self.handle_download(args).await,
            Commands::Preview(args) => self.handle_preview(args).await,
            Commands::Upload(args) => self.handle_upload(args).await,
            Commands::Config(args) => self.handle_config(args).await,
            Commands::Settings => self.handle_settings().await,
        }
    }

    async fn handle_login(&mut self, args: LoginArgs) -> Result<()> {
        let config = self.load_config().await?;
        let service = AuthService::new(config);
        let (_user, _client) = service.login(args).await?;
        Ok(())
    }

    async fn handle_logout(&mut self) -> Result<()> {
        let config = self.load_config().await?;
        AuthService::new(config).logout().await
    }

    async fn handle_status(&mut self) -> Result<()> {
        let config = self.load_config().await?;
        let status_info = AuthService::new(config).get_status().await?;

        let mut status_info_vec = vec![
            ("Version", status_info.version),
            (
                "Authentication",
                self.ui.format_auth_status(status_info.authenticated),
            ),
        ];

        // Only show user details if authenticated
        if status_info.authenticated {
            status_info_vec.push(("Email", self.ui.format_user_field(status_info.email)));
            status_info_vec.push((
                "Role",
                status_info
                    .role
                    .map(|r| self.ui.format_role(&r))
                    .unwrap_or_else(|| "-".to_string()),
            ));
        }

        status_info_vec.push(("Endpoint", status_info.api_base));
        status_info_vec.push((
            "Server",
            if status_info.server_connected && status_info.server_status_msg.is_empty() {
                self.ui.format_server_status(true)
            } else {
                format!(
                    "{} ({})",
                    self.ui.format_server_status(status_info.server_connected),
                    status_info.server_status_msg
                )
            },
        ));

        self.ui.card("Status", status_info_vec);
        if !status_info.authenticated {
            self.ui.info("Run `hvault login` to sign in.");
        }
        Ok(())
    }

    async fn handle_subjects(&mut self) -> Result<()> {
        let config = self.load_config().await?;
        let client = AuthService::new(config).get_authenticated_client().await?;
        SubjectService::new().show(&*client).await;
        Ok(())
    }

    async fn handle_handouts(&mut self, args: HandoutsArgs) -> Result<()> {
        let config = self.load_config().await?;
        let client = AuthService::new(config).get_authenticated_client().await?;
        HandoutService::new(client)
            .show_subject(&args.subject)
            .await?;
        Ok(())
    }

    async fn handle_versions(&mut self, args: VersionsArgs) -> Result<()> {
        let config = self.load_config().await?;
        let client = AuthService::new(config).get_authenticated_client().await?;
        HandoutService::new(client)
            .show_versions(&args.handout_id)
            .await?;
        Ok(())
    }

    async fn handle_show(&mut self, args: ShowArgs) -> Result<()> {
        let config = self.load_config().await?;
        let client = AuthService::new(config).get_authenticated_client().await?;
        HandoutService::new(client).show(args).await?;
        Ok(())
    }

    async fn handle_download(&mut self, args: DownloadArgs) -> Result<()> {
        let config = self.load_config().await?;
        let client = AuthService::new(config).get_authenticated_client().await?;
        HandoutService::new(client).download(args).await?;
        Ok(())
    }

    async fn handle_preview(&mut self, args: PreviewArgs) -> Result<()> {
        let config = self.load_config().await?;
        let client = AuthService::new(config).get_authenticated_client().await?;
        HandoutService::new(client).preview(args).await?;
        Ok(())
    }

    async fn handle_upload(&mut self, args: UploadArgs) -> Result<()> {
        let config = self.load_config().await?;
        let client = AuthService::new(config).get_authenticated_client().await?;
        let interactive = Term::stdout().is_term();
        UploadService::new(client, interactive).upload(args).await?;
        Ok(())
    }

    async fn handle_config(&mut self, args: ConfigArgs) -> Result<()> {
        let config = self.load_config().await?;
        let mut service = if let Some(path) = self.config_path.clone() {
            ConfigService::with_config_path(config, path)
        } else {
            ConfigService::new(config)
        };
        service.handle_config(args).await
    }

    /// Signed-in user plus a summary of the active configuration
    async fn handle_settings(&mut self) -> Result<()> {
        let config = self.load_config().await?;
        let session = crate::store::TokenStore::from_config(&config)?.get_session();

        let account = match &session {
            Some(session) => vec![
                ("Email", self.ui.format_user_field(session.user.email.clone())),
                ("Role", self.ui.format_role(&session.user.role)),
                ("User ID", self.ui.format_user_field(session.user.uid.clone())),
            ],
            None => vec![("Email", self.ui.format_auth_status(false))],
        };
        self.ui.card("Account", account);

        let config_path = self.config_path.clone().unwrap_or_else(default_config_path);
        self.ui.card(
            "Settings",
            vec![
                ("Config file", config_path.display().to_string()),
                ("API endpoint", config.api_base.clone()),
                ("Timeout", format!("{}s", config.timeout)),
                ("Subjects", config.subjects.join(", ")),
            ],
        );
        self.ui.note("Change settings with `hvault config <command>`.");
        Ok(())
    }
}
