//! Property values stored on controls
//!
//! Property values live on the control, never on the handler, so they survive
//! handler recreation and backend switches.

use std::collections::BTreeMap;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

/// A point in parent-relative coordinates
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    /// Create a new point
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// A rectangle in parent-relative coordinates
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    /// Create a new rectangle
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Check if a point lies inside the rectangle (right/bottom edges exclusive)
    pub fn contains_point(&self, point: Point) -> bool {
        point.x >= self.x
            && point.y >= self.y
            && point.x < self.x + self.width
            && point.y < self.y + self.height
    }

    /// Whether the rectangle has no area
    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }
}

bitflags! {
    /// Style flags that affect how a native peer is created
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct StyleFlags: u32 {
        /// Draw a border
        const BORDER = 1 << 0;
        /// Accept multiple lines of text
        const MULTILINE = 1 << 1;
        /// Read-only content
        const READ_ONLY = 1 << 2;
        /// Show a vertical scroll bar
        const VSCROLL = 1 << 3;
        /// Show a horizontal scroll bar
        const HSCROLL = 1 << 4;
        /// Window has a caption bar
        const CAPTION = 1 << 5;
        /// Window can be resized
        const RESIZABLE = 1 << 6;

        /// Flags most native toolkits only honor at creation time
        const RECREATE_MASK = Self::MULTILINE.bits() | Self::HSCROLL.bits() | Self::CAPTION.bits();
    }
}

/// Font description pushed to the native peer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Font {
    pub family: String,
    pub size: f32,
    pub bold: bool,
}

impl Default for Font {
    fn default() -> Self {
        Self {
            family: "sans-serif".to_string(),
            size: 9.0,
            bold: false,
        }
    }
}

/// A bindable property value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PropertyValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Rect(Rect),
    Style(StyleFlags),
    Font(Font),
}

/// Well-known property names
pub mod names {
    pub const TEXT: &str = "Text";
    pub const BOUNDS: &str = "Bounds";
    pub const VISIBLE: &str = "Visible";
    pub const ENABLED: &str = "Enabled";
    pub const STYLE: &str = "Style";
    pub const FONT: &str = "Font";
}

/// Mapping from property name to value
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropertyBag {
    values: BTreeMap<String, PropertyValue>,
}

impl PropertyBag {
    /// Create a bag holding the defaults every control starts with
    pub fn with_defaults() -> Self {
        let mut bag = Self::default();
        bag.set(names::TEXT, PropertyValue::Text(String::new()));
        bag.set(names::BOUNDS, PropertyValue::Rect(Rect::default()));
        bag.set(names::VISIBLE, PropertyValue::Bool(true));
        bag.set(names::ENABLED, PropertyValue::Bool(true));
        bag.set(names::STYLE, PropertyValue::Style(StyleFlags::empty()));
        bag.set(names::FONT, PropertyValue::Font(Font::default()));
        bag
    }

    /// Get a value by name
    pub fn get(&self, name: &str) -> Option<&PropertyValue> {
        self.values.get(name)
    }

    /// Set a value, returning the previous one
    pub fn set(&mut self, name: &str, value: PropertyValue) -> Option<PropertyValue> {
        self.values.insert(name.to_string(), value)
    }

    /// Remove a value
    pub fn remove(&mut self, name: &str) -> Option<PropertyValue> {
        self.values.remove(name)
    }

    /// Iterate over all values in name order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &PropertyValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn text(&self) -> String {
        match self.get(names::TEXT) {
            Some(PropertyValue::Text(text)) => text.clone(),
            _ => String::new(),
        }
    }

    pub fn bounds(&self) -> Rect {
        match self.get(names::BOUNDS) {
            Some(PropertyValue::Rect(rect)) => *rect,
            _ => Rect::default(),
        }
    }

    pub fn visible(&self) -> bool {
        !matches!(self.get(names::VISIBLE), Some(PropertyValue::Bool(false)))
    }

    pub fn enabled(&self) -> bool {
        !matches!(self.get(names::ENABLED), Some(PropertyValue::Bool(false)))
    }

    pub fn style(&self) -> StyleFlags {
        match self.get(names::STYLE) {
            Some(PropertyValue::Style(style)) => *style,
            _ => StyleFlags::empty(),
        }
    }

    pub fn font(&self) -> Font {
        match self.get(names::FONT) {
            Some(PropertyValue::Font(font)) => font.clone(),
            _ => Font::default(),
        }
    }
}
