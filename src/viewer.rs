use crate::error::ViewerError;
use crate::model::{FileId, FileRecord};
use crate::pdf::{DocumentHandle, RenderingEngine};
use image::RgbaImage;
use std::rc::Rc;

pub const ZOOM_MIN: f32 = 0.5;
pub const ZOOM_MAX: f32 = 3.0;
pub const ZOOM_STEP: f32 = 0.25;
pub const ZOOM_DEFAULT: f32 = 1.0;
pub const TOUCH_SWIPE_THRESHOLD: f32 = 50.0;
pub const MOUSE_SWIPE_THRESHOLD: f32 = 100.0;

#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
pub enum Rotation {
    #[default]
    R0,
    R90,
    R180,
    R270,
}

impl Rotation {
    pub fn next(self) -> Self {
        match self {
            Self::R0 => Self::R90,
            Self::R90 => Self::R180,
            Self::R180 => Self::R270,
            Self::R270 => Self::R0,
        }
    }

    pub fn degrees(self) -> u16 {
        match self {
            Self::R0 => 0,
            Self::R90 => 90,
            Self::R180 => 180,
            Self::R270 => 270,
        }
    }
}

/// Whether a rendering engine was bound at start.
pub enum Capability {
    Available(Rc<dyn RenderingEngine>),
    Unavailable { reason: String },
}

impl Capability {
    pub fn from_init<E: RenderingEngine + 'static>(result: anyhow::Result<E>) -> Self {
        match result {
            Ok(engine) => Self::Available(Rc::new(engine)),
            Err(err) => {
                crate::warn_log!("[viewer] rendering engine unavailable: {:#}", err);
                Self::Unavailable {
                    reason: format!("{err:#}"),
                }
            }
        }
    }
}

pub struct RenderedFrame {
    pub page: usize,
    pub zoom: f32,
    pub rotation: Rotation,
    pub image: RgbaImage,
}

pub struct Session {
    file_id: FileId,
    document: Box<dyn DocumentHandle>,
    page: usize,
    total_pages: usize,
    zoom: f32,
    rotation: Rotation,
    frame: Option<RenderedFrame>,
}

impl Session {
    pub fn file_id(&self) -> &FileId {
        &self.file_id
    }

    /// One-based.
    pub fn page(&self) -> usize {
        self.page
    }

    pub fn total_pages(&self) -> usize {
        self.total_pages
    }

    pub fn zoom(&self) -> f32 {
        self.zoom
    }

    pub fn rotation(&self) -> Rotation {
        self.rotation
    }

    pub fn frame(&self) -> Option<&RenderedFrame> {
        self.frame.as_ref()
    }

    fn frame_is_current(&self) -> bool {
        self.frame.as_ref().is_some_and(|frame| {
            frame.page == self.page && frame.zoom == self.zoom && frame.rotation == self.rotation
        })
    }

    fn render(&mut self) -> Result<(), ViewerError> {
        if self.frame_is_current() {
            return Ok(());
        }

        let image = self
            .document
            .render_page(self.page - 1, self.zoom, self.rotation)
            .inspect_err(|err| crate::warn_log!("[viewer] {}", err))?;
        self.frame = Some(RenderedFrame {
            page: self.page,
            zoom: self.zoom,
            rotation: self.rotation,
            image,
        });
        Ok(())
    }
}

pub enum ViewerState {
    Closed,
    Opening { file_id: FileId, epoch: u64 },
    Ready(Session),
}

/// Issued by [`ViewerController::begin_open`]; completions carrying a stale ticket are dropped.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct OpenTicket {
    epoch: u64,
    file_id: FileId,
}

impl OpenTicket {
    pub fn file_id(&self) -> &FileId {
        &self.file_id
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum OpenStatus {
    Ready,
    Discarded,
}

pub struct ViewerController {
    capability: Capability,
    state: ViewerState,
    open_epoch: u64,
}

impl ViewerController {
    pub fn new(capability: Capability) -> Self {
        Self {
            capability,
            state: ViewerState::Closed,
            open_epoch: 0,
        }
    }

    pub fn can_view(&self) -> bool {
        matches!(self.capability, Capability::Available(_))
    }

    /// Export works from the stored payload and never needs the engine.
    pub fn can_download(&self) -> bool {
        true
    }

    /// Viewing is gone for this session but files can still be exported.
    pub fn download_only(&self) -> bool {
        !self.can_view() && self.can_download()
    }

    pub fn unavailable_reason(&self) -> Option<&str> {
        match &self.capability {
            Capability::Available(_) => None,
            Capability::Unavailable { reason } => Some(reason),
        }
    }

    pub fn state(&self) -> &ViewerState {
        &self.state
    }

    pub fn session(&self) -> Option<&Session> {
        match &self.state {
            ViewerState::Ready(session) => Some(session),
            _ => None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.session().is_some()
    }

    pub fn begin_open(&mut self, file_id: FileId) -> Result<OpenTicket, ViewerError> {
        if let Capability::Unavailable { reason } = &self.capability {
            return Err(ViewerError::Unavailable(reason.clone()));
        }

        self.open_epoch += 1;
        self.state = ViewerState::Opening {
            file_id: file_id.clone(),
            epoch: self.open_epoch,
        };
        crate::debug_log!("[viewer] opening {} epoch={}", file_id, self.open_epoch);
        Ok(OpenTicket {
            epoch: self.open_epoch,
            file_id,
        })
    }

    /// Parses a payload with the bound engine. Safe to call outside the open flow.
    pub fn parse(&self, bytes: &[u8]) -> Result<Box<dyn DocumentHandle>, ViewerError> {
        match &self.capability {
            Capability::Available(engine) => engine.open_document(bytes),
            Capability::Unavailable { reason } => Err(ViewerError::Unavailable(reason.clone())),
        }
    }

    /// Delivers the parse result for `ticket`. A render failure leaves the viewer open.
    pub fn complete_open(
        &mut self,
        ticket: OpenTicket,
        result: Result<Box<dyn DocumentHandle>, ViewerError>,
    ) -> Result<OpenStatus, ViewerError> {
        let current = matches!(
            &self.state,
            ViewerState::Opening { file_id, epoch }
                if *epoch == ticket.epoch && *file_id == ticket.file_id
        );
        if !current {
            crate::debug_log!(
                "[viewer] discarding stale open of {} epoch={}",
                ticket.file_id,
                ticket.epoch
            );
            return Ok(OpenStatus::Discarded);
        }

        let document = match result {
            Ok(document) => document,
            Err(err) => {
                crate::warn_log!("[viewer] open failed for {}: {}", ticket.file_id, err);
                self.state = ViewerState::Closed;
                return Err(err);
            }
        };

        let total_pages = document.page_count();
        if total_pages == 0 {
            self.state = ViewerState::Closed;
            return Err(ViewerError::OpenFailed("document has no pages".into()));
        }

        self.state = ViewerState::Ready(Session {
            file_id: ticket.file_id,
            document,
            page: 1,
            total_pages,
            zoom: ZOOM_DEFAULT,
            rotation: Rotation::R0,
            frame: None,
        });
        self.with_session(|_| {})?;
        Ok(OpenStatus::Ready)
    }

    pub fn open(&mut self, file: &FileRecord) -> Result<OpenStatus, ViewerError> {
        let ticket = self.begin_open(file.id.clone())?;
        let parsed = self.parse(file.payload.as_bytes());
        self.complete_open(ticket, parsed)
    }

    pub fn close(&mut self) {
        if !matches!(self.state, ViewerState::Closed) {
            crate::debug_log!("[viewer] closed");
        }
        self.state = ViewerState::Closed;
    }

    pub fn go_to_page(&mut self, page: usize) -> Result<(), ViewerError> {
        self.with_session(|session| session.page = page.clamp(1, session.total_pages))
    }

    pub fn next_page(&mut self) -> Result<(), ViewerError> {
        self.with_session(|session| session.page = (session.page + 1).min(session.total_pages))
    }

    pub fn previous_page(&mut self) -> Result<(), ViewerError> {
        self.with_session(|session| session.page = session.page.saturating_sub(1).max(1))
    }

    pub fn first_page(&mut self) -> Result<(), ViewerError> {
        self.with_session(|session| session.page = 1)
    }

    pub fn last_page(&mut self) -> Result<(), ViewerError> {
        self.with_session(|session| session.page = session.total_pages)
    }

    pub fn zoom_in(&mut self) -> Result<(), ViewerError> {
        self.with_session(|session| session.zoom = clamp_zoom(session.zoom + ZOOM_STEP))
    }

    pub fn zoom_out(&mut self) -> Result<(), ViewerError> {
        self.with_session(|session| session.zoom = clamp_zoom(session.zoom - ZOOM_STEP))
    }

    pub fn rotate(&mut self) -> Result<(), ViewerError> {
        self.with_session(|session| session.rotation = session.rotation.next())
    }

    /// Applies a completed swipe.
    pub fn apply_swipe(&mut self, action: SwipeAction) -> Result<(), ViewerError> {
        match action {
            SwipeAction::NextPage => self.next_page(),
            SwipeAction::PreviousPage => self.previous_page(),
        }
    }

    fn with_session(&mut self, update: impl FnOnce(&mut Session)) -> Result<(), ViewerError> {
        let ViewerState::Ready(session) = &mut self.state else {
            return Err(ViewerError::NotOpen);
        };
        update(session);
        session.render()
    }
}

fn clamp_zoom(zoom: f32) -> f32 {
    zoom.clamp(ZOOM_MIN, ZOOM_MAX)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum PointerKind {
    Touch,
    Mouse,
}

impl PointerKind {
    pub fn swipe_threshold(self) -> f32 {
        match self {
            Self::Touch => TOUCH_SWIPE_THRESHOLD,
            Self::Mouse => MOUSE_SWIPE_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum SwipeAction {
    NextPage,
    PreviousPage,
}

/// Turns a press/move/release sequence into a page turn.
#[derive(Debug, Default)]
pub struct GestureTracker {
    kind: Option<PointerKind>,
    start: Option<Point>,
    end: Option<Point>,
}

impl GestureTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn press(&mut self, kind: PointerKind, at: Point) {
        self.kind = Some(kind);
        self.start = Some(at);
        self.end = None;
    }

    pub fn move_to(&mut self, at: Point) {
        // A mouse hovering without a press is not a drag.
        if self.start.is_some() {
            self.end = Some(at);
        }
    }

    pub fn cancel(&mut self) {
        *self = Self::default();
    }

    pub fn release(&mut self) -> Option<SwipeAction> {
        let tracker = std::mem::take(self);
        let (kind, start, end) = (tracker.kind?, tracker.start?, tracker.end?);

        let dx = start.x - end.x;
        let dy = start.y - end.y;
        if dy.abs() > dx.abs() {
            return None;
        }

        let threshold = kind.swipe_threshold();
        if dx > threshold {
            Some(SwipeAction::NextPage)
        } else if dx < -threshold {
            Some(SwipeAction::PreviousPage)
        } else {
            None
        }
    }
}
