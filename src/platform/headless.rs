//! Headless backend
//!
//! [`PlessHandler`] creates no native resource. It mirrors every pushed
//! property in memory so tests, designers and unsupported kinds on other
//! backends behave like a real peer. It exposes exactly the capabilities of
//! its control kind.

use std::sync::{Arc, OnceLock};

use crate::control::{Capabilities, ControlKind, Font, Point, Rect, StyleFlags};
use crate::handler::{
    clamp_scroll_position, ControlHandler, FocusHandler, HandlerContext, NativeHandle,
    ScrollHandler, StyleChange, TextHandler, WindowHandler,
};
use crate::platform::{NativePlatform, PlatformKind};
use crate::Result;

/// Backend name reported by headless handlers
pub const BACKEND_NAME: &str = "headless";

/// The shared headless platform
pub fn platform() -> Arc<NativePlatform> {
    static PLATFORM: OnceLock<Arc<NativePlatform>> = OnceLock::new();
    PLATFORM
        .get_or_init(|| {
            ControlKind::ALL
                .iter()
                .fold(
                    NativePlatform::builder(BACKEND_NAME, PlatformKind::Headless),
                    |builder, kind| {
                        builder.handler(*kind, |ctx| Ok(create_handler(ctx)))
                    },
                )
                .build()
        })
        .clone()
}

/// Create a headless handler for the context's kind
pub fn create_handler(context: &HandlerContext) -> Box<dyn ControlHandler> {
    Box::new(PlessHandler::new(context.kind))
}

/// Handler that keeps everything in memory
#[derive(Debug, Clone)]
pub struct PlessHandler {
    kind: ControlKind,
    capabilities: Capabilities,
    created: bool,
    subscribed: bool,
    style: StyleFlags,
    text: String,
    bounds: Rect,
    visible: bool,
    enabled: bool,
    font: Font,
    focused: bool,
    extent: (f32, f32),
    scroll_position: Point,
    shown: bool,
    invalidated: bool,
}

impl PlessHandler {
    pub fn new(kind: ControlKind) -> Self {
        Self {
            kind,
            capabilities: kind.capabilities(),
            created: false,
            subscribed: false,
            style: StyleFlags::empty(),
            text: String::new(),
            bounds: Rect::default(),
            visible: true,
            enabled: true,
            font: Font::default(),
            focused: false,
            extent: (0.0, 0.0),
            scroll_position: Point::default(),
            shown: false,
            invalidated: false,
        }
    }

    fn has(&self, capability: Capabilities) -> bool {
        self.capabilities.contains(capability)
    }
}

impl ControlHandler for PlessHandler {
    fn backend_name(&self) -> &'static str {
        BACKEND_NAME
    }

    fn kind(&self) -> ControlKind {
        self.kind
    }

    fn create_native(&mut self, context: &HandlerContext) -> Result<()> {
        self.style = context.style;
        self.created = true;
        Ok(())
    }

    fn is_native_created(&self) -> bool {
        self.created
    }

    fn native_handle(&self) -> Option<NativeHandle> {
        None
    }

    fn on_attach(&mut self) -> Result<()> {
        self.subscribed = true;
        Ok(())
    }

    fn on_detach(&mut self) {
        self.subscribed = false;
    }

    fn destroy_native(&mut self) {
        self.created = false;
        self.shown = false;
        self.focused = false;
    }

    fn apply_style(&mut self, style: StyleFlags) -> StyleChange {
        self.style = style;
        StyleChange::Applied
    }

    fn set_bounds(&mut self, bounds: Rect) {
        self.bounds = bounds;
    }

    fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    fn set_font(&mut self, font: &Font) {
        self.font = font.clone();
    }

    fn invalidate(&mut self) {
        self.invalidated = true;
    }

    fn update(&mut self) {
        self.invalidated = false;
    }

    fn focus(&mut self) -> Option<&mut dyn FocusHandler> {
        if self.has(Capabilities::FOCUS) {
            Some(self)
        } else {
            None
        }
    }

    fn text(&mut self) -> Option<&mut dyn TextHandler> {
        if self.has(Capabilities::TEXT) {
            Some(self)
        } else {
            None
        }
    }

    fn scroll(&mut self) -> Option<&mut dyn ScrollHandler> {
        if self.has(Capabilities::SCROLL) {
            Some(self)
        } else {
            None
        }
    }

    fn window(&mut self) -> Option<&mut dyn WindowHandler> {
        if self.has(Capabilities::WINDOW) {
            Some(self)
        } else {
            None
        }
    }
}

impl FocusHandler for PlessHandler {
    fn set_focus(&mut self) {
        self.focused = true;
    }

    fn has_focus(&self) -> bool {
        self.focused
    }

    fn kill_focus(&mut self) {
        self.focused = false;
    }
}

impl TextHandler for PlessHandler {
    fn set_text(&mut self, text: &str) {
        self.text = text.to_string();
    }

    fn text(&self) -> String {
        self.text.clone()
    }
}

impl ScrollHandler for PlessHandler {
    fn set_extent(&mut self, width: f32, height: f32) {
        self.extent = (width, height);
    }

    fn set_scroll_position(&mut self, position: Point) {
        self.scroll_position = clamp_scroll_position(position, self.extent);
    }

    fn scroll_position(&self) -> Point {
        self.scroll_position
    }
}

impl WindowHandler for PlessHandler {
    fn show(&mut self) {
        self.shown = true;
    }

    fn hide(&mut self) {
        self.shown = false;
    }

    fn is_shown(&self) -> bool {
        self.shown
    }

    fn activate(&mut self) {
        self.shown = true;
    }
}
