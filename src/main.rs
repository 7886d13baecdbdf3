use iced::keyboard::{self, key::Named, Key, Modifiers};
use iced::widget::{
    button, checkbox, column, container, image, progress_bar, radio, row, scrollable, text,
    text_input, Column,
};
use iced::{Alignment, ContentFit, Element, Length, Subscription, Task, Theme};
use std::sync::Arc;

mod bridge;
mod config;
mod error;
mod logging;
mod resolver;
mod state;
mod transfer;
mod uri;

use bridge::{HostBridge, LocalBridge};
use config::Settings;
use error::{BridgeError, ResolveError, TransferError};
use resolver::{
    CapabilityContext, DisplaySource, ImageSourceResolver, PreloadOutcome, Preloader, ProbeState,
};
use state::data::{ImageMetadata, ScanResult, TransferMode, TransferResult, ViewMode};
use state::session::{DisplayTicket, SessionStore};
use transfer::BatchTransferOrchestrator;

/// What the viewer currently shows for the current image
#[derive(Debug, Clone)]
enum DisplayState {
    Empty,
    Loading,
    Ready(image::Handle),
    Failed(String),
}

/// State of the batch transfer panel
#[derive(Debug, Default)]
struct BatchForm {
    open: bool,
    mode: TransferMode,
    target: String,
    /// Why the last request was refused
    notice: Option<String>,
    result: Option<TransferResult>,
}

/// Main application state
struct ImageSelector {
    settings: Settings,
    bridge: Arc<dyn HostBridge>,
    /// Scanned images, cursor and marks
    session: SessionStore,
    resolver: ImageSourceResolver,
    preloader: Preloader,
    transfer: BatchTransferOrchestrator,
    /// Folder of the last successful scan
    folder: Option<String>,
    scanning: bool,
    /// Status message to display to the user
    status: String,
    /// Blocking error banner, cleared by DismissError
    error: Option<String>,
    display: DisplayState,
    metadata: Option<ImageMetadata>,
    batch: BatchForm,
}

/// Application messages (events)
#[derive(Debug, Clone)]
enum Message {
    /// User clicked "Select Folder"
    SelectFolder,
    FolderPicked(Result<Option<String>, BridgeError>),
    ScanComplete(Result<ScanResult, BridgeError>),

    EnterViewer,
    /// Open the viewer on a specific image from the list
    OpenAt(usize),
    ExitViewer,
    Next,
    Prev,
    First,
    Last,
    ToggleMark,
    ToggleMarkAt(usize),
    ClearMarks,

    /// Foreground resolution finished for the image the ticket was issued for
    ImageResolved(DisplayTicket, Result<String, ResolveError>),
    MetadataLoaded(DisplayTicket, Result<ImageMetadata, BridgeError>),
    Preloaded(PreloadOutcome),
    /// Reload the current image through base64
    RetryDisplay,
    DismissError,

    OpenBatch,
    CloseBatch,
    TransferModeSelected(TransferMode),
    TargetChanged(String),
    PickTarget,
    TargetPicked(Result<Option<String>, BridgeError>),
    StartTransfer,
    TransferFinished(TransferMode, Result<TransferResult, TransferError>),
}

impl ImageSelector {
    /// Create a new instance of the application
    fn new(settings: Settings, startup_error: Option<String>) -> (Self, Task<Message>) {
        let app = Self::with_bridge(settings, Arc::new(LocalBridge::new()), startup_error);
        (app, Task::none())
    }

    fn with_bridge(
        settings: Settings,
        bridge: Arc<dyn HostBridge>,
        startup_error: Option<String>,
    ) -> Self {
        let resolver = ImageSourceResolver::new(
            Arc::clone(&bridge),
            Arc::new(CapabilityContext::new()),
            settings.probe_timeout(),
            settings.uri_cache_capacity,
        );
        let preloader = Preloader::new(resolver.clone(), settings.preload_next);
        let transfer =
            BatchTransferOrchestrator::new(Arc::clone(&bridge), settings.create_target_directory);

        log::info!(
            "Image Selector started (probe timeout {:?}, cache {} entries, preload {})",
            settings.probe_timeout(),
            settings.uri_cache_capacity,
            settings.preload_next
        );

        let batch = BatchForm {
            mode: settings.default_transfer_mode,
            ..BatchForm::default()
        };

        ImageSelector {
            settings,
            bridge,
            session: SessionStore::new(),
            resolver,
            preloader,
            transfer,
            folder: None,
            scanning: false,
            status: "Select a folder to begin.".to_string(),
            error: startup_error,
            display: DisplayState::Empty,
            metadata: None,
            batch,
        }
    }

    /// Handle application messages and update state
    fn update(&mut self, message: Message) -> Task<Message> {
        match message {
            Message::SelectFolder => {
                if self.scanning {
                    return Task::none();
                }
                let bridge = Arc::clone(&self.bridge);
                Task::perform(
                    async move { bridge.open_folder_dialog("Select Image Folder").await },
                    Message::FolderPicked,
                )
            }
            Message::FolderPicked(Ok(Some(folder))) => self.scan(folder),
            Message::FolderPicked(Ok(None)) => {
                log::debug!("Folder selection cancelled");
                Task::none()
            }
            Message::FolderPicked(Err(e)) => {
                self.show_error(e.to_string());
                Task::none()
            }
            Message::ScanComplete(Ok(result)) => {
                self.scanning = false;
                self.session.replace_images(result.images);
                self.resolver.invalidate_cache();
                self.display = DisplayState::Empty;
                self.metadata = None;
                self.batch.result = None;
                self.status = format!(
                    "Found {} images in {} ms.",
                    result.total_count, result.scan_time_ms
                );
                Task::none()
            }
            Message::ScanComplete(Err(e)) => {
                self.scanning = false;
                self.status = "Scan failed.".to_string();
                self.show_error(e.to_string());
                Task::none()
            }

            Message::EnterViewer => {
                if self.session.enter_viewer() {
                    self.on_cursor_changed()
                } else {
                    Task::none()
                }
            }
            Message::OpenAt(index) => {
                self.session.go_to(index);
                if self.session.enter_viewer() {
                    self.on_cursor_changed()
                } else {
                    Task::none()
                }
            }
            Message::ExitViewer => {
                self.session.exit_viewer();
                Task::none()
            }
            Message::Next => self.navigate(SessionStore::next),
            Message::Prev => self.navigate(SessionStore::prev),
            Message::First => self.navigate(SessionStore::go_to_first),
            Message::Last => self.navigate(SessionStore::go_to_last),
            Message::ToggleMark => {
                self.session.toggle_current_mark();
                Task::none()
            }
            Message::ToggleMarkAt(index) => {
                self.session.toggle_mark(index);
                Task::none()
            }
            Message::ClearMarks => {
                self.session.clear_marks();
                Task::none()
            }

            Message::ImageResolved(ticket, result) => {
                if !self.session.is_current(&ticket) {
                    log::debug!("Discarding stale resolution of {}", ticket.record.name);
                    return Task::none();
                }
                // A decode failure reported for this image wins over a late URI
                if !matches!(self.display, DisplayState::Loading) {
                    return Task::none();
                }
                self.display = match result {
                    Ok(display_uri) => match DisplaySource::from_uri(&display_uri) {
                        Some(DisplaySource::File(path)) => {
                            DisplayState::Ready(image::Handle::from_path(path))
                        }
                        Some(DisplaySource::Encoded { bytes, .. }) => {
                            DisplayState::Ready(image::Handle::from_bytes(bytes))
                        }
                        None => DisplayState::Failed("Unsupported display URI".to_string()),
                    },
                    Err(e) => {
                        log::error!("{}", e);
                        DisplayState::Failed(e.to_string())
                    }
                };
                Task::none()
            }
            Message::MetadataLoaded(ticket, result) => {
                if !self.session.is_current(&ticket) {
                    return Task::none();
                }
                match result {
                    Ok(metadata) => self.metadata = Some(metadata),
                    Err(e) => {
                        // The decoder cannot read this file, so neither can the display
                        log::warn!("{}", e);
                        self.metadata = None;
                        self.display = DisplayState::Failed(e.to_string());
                    }
                }
                Task::none()
            }
            Message::Preloaded(outcome) => {
                match outcome {
                    PreloadOutcome::Warmed { name } => log::trace!("Next image ready: {}", name),
                    PreloadOutcome::Failed { name, reason } => {
                        log::trace!("Next image not warmed: {} ({})", name, reason)
                    }
                }
                Task::none()
            }
            Message::RetryDisplay => {
                let Some(ticket) = self.session.display_ticket() else {
                    return Task::none();
                };
                self.display = DisplayState::Loading;

                let resolver = self.resolver.clone();
                let record = ticket.record.clone();
                Task::perform(
                    async move { resolver.resolve_as_base64(&record).await },
                    move |result| Message::ImageResolved(ticket.clone(), result),
                )
            }
            Message::DismissError => {
                self.error = None;
                Task::none()
            }

            Message::OpenBatch => {
                self.batch.open = true;
                self.batch.notice = None;
                Task::none()
            }
            Message::CloseBatch => {
                self.batch.open = false;
                Task::none()
            }
            Message::TransferModeSelected(mode) => {
                self.batch.mode = mode;
                if self.settings.default_transfer_mode != mode {
                    self.settings.default_transfer_mode = mode;
                    if let Err(e) = self.settings.save() {
                        log::warn!("Could not save settings: {}", e);
                    }
                }
                Task::none()
            }
            Message::TargetChanged(target) => {
                self.batch.target = target;
                self.batch.notice = None;
                Task::none()
            }
            Message::PickTarget => {
                let bridge = Arc::clone(&self.bridge);
                Task::perform(
                    async move { bridge.open_folder_dialog("Select Target Folder").await },
                    Message::TargetPicked,
                )
            }
            Message::TargetPicked(Ok(Some(target))) => {
                self.batch.target = target;
                self.batch.notice = None;
                Task::none()
            }
            Message::TargetPicked(Ok(None)) => Task::none(),
            Message::TargetPicked(Err(e)) => {
                self.show_error(e.to_string());
                Task::none()
            }
            Message::StartTransfer => {
                let mode = self.batch.mode;
                match self.transfer.begin(&self.session, &self.batch.target, mode) {
                    Ok(pending) => {
                        self.batch.notice = None;
                        self.batch.result = None;
                        self.status = format!(
                            "Transferring {} images to {}...",
                            pending.job().items().len(),
                            pending.job().target_path()
                        );
                        Task::perform(pending.run(), move |result| {
                            Message::TransferFinished(mode, result)
                        })
                    }
                    Err(rejection) => {
                        log::info!("Transfer request ignored: {}", rejection);
                        self.batch.notice = Some(rejection.to_string());
                        Task::none()
                    }
                }
            }
            Message::TransferFinished(mode, Ok(result)) => {
                self.status = format!(
                    "Transfer finished: {} succeeded, {} failed.",
                    result.success_count, result.failed_count
                );
                let moved_any = mode == TransferMode::Move && result.success_count > 0;
                self.batch.result = Some(result);

                // Moved files are gone from the scanned folder
                match (moved_any, self.folder.clone()) {
                    (true, Some(folder)) => self.scan(folder),
                    _ => Task::none(),
                }
            }
            Message::TransferFinished(_, Err(e)) => {
                self.status = "Transfer failed.".to_string();
                self.show_error(e.to_string());
                Task::none()
            }
        }
    }

    fn scan(&mut self, folder: String) -> Task<Message> {
        self.scanning = true;
        self.status = format!("Scanning {}...", folder);
        self.folder = Some(folder.clone());

        let bridge = Arc::clone(&self.bridge);
        Task::perform(
            async move { bridge.scan_folder(&folder).await },
            Message::ScanComplete,
        )
    }

    /// Apply a cursor move; only a real change triggers new display work
    fn navigate(&mut self, step: fn(&mut SessionStore)) -> Task<Message> {
        let before = self.session.generation();
        step(&mut self.session);
        if self.session.generation() == before {
            Task::none()
        } else {
            self.on_cursor_changed()
        }
    }

    /// Resolve the current image, load its metadata and warm the next one.
    /// Results carry the ticket issued now and are dropped once it is stale.
    fn on_cursor_changed(&mut self) -> Task<Message> {
        let Some(ticket) = self.session.display_ticket() else {
            self.display = DisplayState::Empty;
            self.metadata = None;
            return Task::none();
        };
        self.display = DisplayState::Loading;
        self.metadata = None;

        let resolver = self.resolver.clone();
        let record = ticket.record.clone();
        let resolved_ticket = ticket.clone();
        let resolve = Task::perform(async move { resolver.resolve(&record).await }, move |result| {
            Message::ImageResolved(resolved_ticket.clone(), result)
        });

        let bridge = Arc::clone(&self.bridge);
        let path = ticket.record.path.clone();
        let metadata = Task::perform(
            async move { bridge.get_image_metadata(&path).await },
            move |result| Message::MetadataLoaded(ticket.clone(), result),
        );

        let mut tasks = vec![resolve, metadata];
        if let Some(warm) = self.preloader.warm_next(&self.session) {
            tasks.push(Task::perform(warm, Message::Preloaded));
        }
        Task::batch(tasks)
    }

    fn show_error(&mut self, message: String) {
        log::error!("{}", message);
        self.error = Some(message);
    }

    fn subscription(&self) -> Subscription<Message> {
        if self.session.mode() == ViewMode::Viewing {
            keyboard::on_key_press(handle_key)
        } else {
            Subscription::none()
        }
    }

    /// Build the user interface
    fn view(&self) -> Element<Message> {
        let body = match self.session.mode() {
            ViewMode::Browsing => self.view_browser(),
            ViewMode::Viewing => self.view_viewer(),
        };

        let mut content = Column::new().spacing(10).padding(20);
        if let Some(error) = &self.error {
            content = content.push(
                container(
                    row![
                        text(error).width(Length::Fill),
                        button("Dismiss").on_press(Message::DismissError),
                    ]
                    .spacing(10)
                    .align_y(Alignment::Center),
                )
                .padding(10)
                .style(container::rounded_box),
            );
        }

        container(content.push(body))
            .width(Length::Fill)
            .height(Length::Fill)
            .into()
    }

    fn view_browser(&self) -> Element<Message> {
        let folder = self.folder.as_deref().unwrap_or("No folder selected");
        let has_images = !self.session.is_empty();
        let has_marks = self.session.marked_count() > 0;

        let toolbar = row![
            button("Select Folder")
                .on_press_maybe((!self.scanning).then_some(Message::SelectFolder))
                .padding(10),
            button("View Images")
                .on_press_maybe(has_images.then_some(Message::EnterViewer))
                .padding(10),
            button("Batch Transfer...")
                .on_press_maybe((has_marks && !self.batch.open).then_some(Message::OpenBatch))
                .padding(10),
            button("Clear Marks")
                .on_press_maybe(has_marks.then_some(Message::ClearMarks))
                .padding(10),
        ]
        .spacing(10);

        let summary = text(format!(
            "{} · {} images · {} marked",
            folder,
            self.session.len(),
            self.session.marked_count()
        ))
        .size(14);

        let mut list = Column::new().spacing(4);
        for (index, record) in self.session.images().iter().enumerate() {
            list = list.push(
                row![
                    checkbox("", self.session.is_marked(index))
                        .on_toggle(move |_| Message::ToggleMarkAt(index)),
                    button(text(&record.name).size(14))
                        .on_press(Message::OpenAt(index))
                        .style(button::text),
                    text(format_size(record.size)).size(12),
                ]
                .spacing(10)
                .align_y(Alignment::Center),
            );
        }

        let mut content = column![
            text("Image Selector").size(32),
            toolbar,
            summary,
            text(&self.status).size(16),
        ]
        .spacing(12);

        if self.batch.open {
            content = content.push(self.view_batch());
        }

        content
            .push(scrollable(list).height(Length::Fill))
            .into()
    }

    fn view_batch(&self) -> Element<Message> {
        let running = self.transfer.is_running();
        let selected = Some(self.batch.mode);

        let modes = row![
            radio("Copy", TransferMode::Copy, selected, Message::TransferModeSelected),
            radio("Move", TransferMode::Move, selected, Message::TransferModeSelected),
        ]
        .spacing(20);

        let target = row![
            text_input("Target folder", &self.batch.target)
                .on_input(Message::TargetChanged)
                .padding(8),
            button("Browse...").on_press_maybe((!running).then_some(Message::PickTarget)),
        ]
        .spacing(10)
        .align_y(Alignment::Center);

        let actions = row![
            button(text(format!("Transfer {} images", self.session.marked_count())))
                .on_press_maybe((!running).then_some(Message::StartTransfer))
                .padding(10),
            button("Close")
                .on_press_maybe((!running).then_some(Message::CloseBatch))
                .padding(10),
        ]
        .spacing(10);

        let mut panel = column![text("Batch Transfer").size(20), modes, target, actions].spacing(10);

        if running {
            panel = panel.push(text(format!("Working... {}%", self.transfer.progress())));
        }
        if let Some(notice) = &self.batch.notice {
            panel = panel.push(text(notice));
        }
        if let Some(result) = &self.batch.result {
            panel = panel.push(text(format!(
                "{} succeeded, {} failed",
                result.success_count, result.failed_count
            )));
            if result.has_failures() {
                let errors = result
                    .errors
                    .iter()
                    .fold(Column::new().spacing(2), |col, e| col.push(text(e).size(12)));
                panel = panel.push(scrollable(errors).height(Length::Fixed(120.0)));
            }
        }

        container(panel)
            .padding(15)
            .style(container::rounded_box)
            .into()
    }

    fn view_viewer(&self) -> Element<Message> {
        let progress = self.session.progress();
        let current = self.session.current_image();
        let name = current.map(|r| r.name.as_str()).unwrap_or_default();
        let marked = self.session.is_marked(self.session.cursor());

        let header = row![
            button("Back").on_press(Message::ExitViewer),
            text(format!("{} / {}", progress.current, progress.total)),
            text(name).width(Length::Fill),
            text(if marked { "★ Marked" } else { "" }),
        ]
        .spacing(15)
        .align_y(Alignment::Center);
        let position =
            progress_bar(0.0..=100.0, progress.percentage()).height(Length::Fixed(4.0));

        let picture: Element<Message> = match &self.display {
            DisplayState::Empty => text("No image").into(),
            DisplayState::Loading => text("Loading...").into(),
            DisplayState::Ready(handle) => image(handle.clone())
                .width(Length::Fill)
                .height(Length::Fill)
                .content_fit(ContentFit::Contain)
                .into(),
            DisplayState::Failed(reason) => column![
                text(format!("Could not display image: {}", reason)),
                row![
                    button("Retry").on_press(Message::RetryDisplay),
                    button("Back to folder").on_press(Message::ExitViewer),
                ]
                .spacing(10),
            ]
            .spacing(10)
            .align_x(Alignment::Center)
            .into(),
        };

        let source = match self.resolver.probe_state() {
            ProbeState::Unprobed => "",
            ProbeState::Probing => "checking display support",
            ProbeState::Capable => "direct",
            ProbeState::Fallback => "base64",
        };
        let details = match (&self.metadata, current) {
            (Some(meta), _) => format!(
                "{} × {} · {} · {} · {}",
                meta.width,
                meta.height,
                meta.format,
                meta.color_type,
                format_size(meta.file_size)
            ),
            (None, Some(record)) => format_size(record.size),
            (None, None) => String::new(),
        };
        let info = row![
            text(details).size(14).width(Length::Fill),
            text(source).size(12),
        ];

        let controls = row![
            button("First").on_press_maybe(self.session.can_go_prev().then_some(Message::First)),
            button("Prev").on_press_maybe(self.session.can_go_prev().then_some(Message::Prev)),
            button(if marked { "Unmark" } else { "Mark" }).on_press(Message::ToggleMark),
            button("Next").on_press_maybe(self.session.can_go_next().then_some(Message::Next)),
            button("Last").on_press_maybe(self.session.can_go_next().then_some(Message::Last)),
            text(format!("{} marked", self.session.marked_count())),
        ]
        .spacing(10)
        .align_y(Alignment::Center);

        column![
            header,
            position,
            container(picture)
                .width(Length::Fill)
                .height(Length::Fill)
                .center_x(Length::Fill)
                .center_y(Length::Fill),
            info,
            controls,
        ]
        .spacing(10)
        .into()
    }

    /// Set the application theme
    fn theme(&self) -> Theme {
        Theme::Dark
    }
}

/// Viewer shortcuts
fn handle_key(key: Key, _modifiers: Modifiers) -> Option<Message> {
    match key.as_ref() {
        Key::Named(Named::ArrowRight) | Key::Character("d" | "D") => Some(Message::Next),
        Key::Named(Named::ArrowLeft) | Key::Character("a" | "A") => Some(Message::Prev),
        Key::Named(Named::Space) => Some(Message::ToggleMark),
        Key::Named(Named::Home) => Some(Message::First),
        Key::Named(Named::End) => Some(Message::Last),
        Key::Named(Named::Escape) => Some(Message::ExitViewer),
        _ => None,
    }
}

fn format_size(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;
    let bytes = bytes as f64;
    if bytes >= MB {
        format!("{:.1} MB", bytes / MB)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes / KB)
    } else {
        format!("{} B", bytes)
    }
}

fn main() -> iced::Result {
    let (settings, config_error) = match Settings::load() {
        Ok(settings) => (settings, None),
        Err(e) => (Settings::default(), Some(e)),
    };

    if let Err(e) = logging::init_logging(settings.log_level()) {
        eprintln!("Failed to initialize logging: {}", e);
    }
    let startup_error = config_error.map(|e| {
        log::error!("{}; using default settings", e);
        format!("{}; using default settings", e)
    });

    iced::application("Image Selector", ImageSelector::update, ImageSelector::view)
        .theme(ImageSelector::theme)
        .subscription(ImageSelector::subscription)
        .centered()
        .run_with(move || ImageSelector::new(settings, startup_error))
}
