//! Control kinds and owner-type descriptors
//!
//! A [`ControlKind`] is the stable tag a backend keys its handler constructors
//! on. A [`ControlType`] is the "owning type" of routed events and class
//! handlers; types form a single-inheritance chain through `base`.

use std::fmt;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

/// Stable tag identifying which native peer a control needs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlKind {
    /// Top-level window
    Window,
    /// Plain container
    Panel,
    /// Push button
    Button,
    /// Static text
    Label,
    /// Editable text
    TextBox,
    /// Two-state check box
    CheckBox,
    /// Item list
    ListView,
    /// Scrollable container
    ScrollViewer,
    /// Owner-drawn control with no native widget of its own
    Generic,
}

impl ControlKind {
    /// All kinds, in declaration order
    pub const ALL: [ControlKind; 9] = [
        ControlKind::Window,
        ControlKind::Panel,
        ControlKind::Button,
        ControlKind::Label,
        ControlKind::TextBox,
        ControlKind::CheckBox,
        ControlKind::ListView,
        ControlKind::ScrollViewer,
        ControlKind::Generic,
    ];

    /// Name of the kind as used in diagnostics
    pub fn name(self) -> &'static str {
        match self {
            ControlKind::Window => "Window",
            ControlKind::Panel => "Panel",
            ControlKind::Button => "Button",
            ControlKind::Label => "Label",
            ControlKind::TextBox => "TextBox",
            ControlKind::CheckBox => "CheckBox",
            ControlKind::ListView => "ListView",
            ControlKind::ScrollViewer => "ScrollViewer",
            ControlKind::Generic => "Generic",
        }
    }

    /// Capabilities a handler for this kind must expose, and only these
    pub fn capabilities(self) -> Capabilities {
        match self {
            ControlKind::Window => Capabilities::FOCUS | Capabilities::TEXT | Capabilities::WINDOW,
            ControlKind::Panel | ControlKind::Generic => Capabilities::FOCUS,
            ControlKind::Button | ControlKind::CheckBox => {
                Capabilities::FOCUS | Capabilities::TEXT
            }
            ControlKind::Label => Capabilities::TEXT,
            ControlKind::TextBox => {
                Capabilities::FOCUS | Capabilities::TEXT | Capabilities::SCROLL
            }
            ControlKind::ListView | ControlKind::ScrollViewer => {
                Capabilities::FOCUS | Capabilities::SCROLL
            }
        }
    }
}

impl fmt::Display for ControlKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

bitflags! {
    /// Set of optional handler capabilities
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Capabilities: u8 {
        /// Keyboard focus
        const FOCUS = 1 << 0;
        /// Native text content
        const TEXT = 1 << 1;
        /// Scroll position and range
        const SCROLL = 1 << 2;
        /// Top-level window operations
        const WINDOW = 1 << 3;
    }
}

/// Owner-type descriptor for controls, routed events and class handlers
///
/// Type identity is the address of the descriptor, so declare each type as a
/// `static` (a `const` may be duplicated at every use). Names are for display
/// and may repeat across libraries.
#[derive(Debug)]
pub struct ControlType {
    name: &'static str,
    base: Option<&'static ControlType>,
    kind: ControlKind,
}

impl ControlType {
    /// Create a root type (no base)
    pub const fn root(name: &'static str, kind: ControlKind) -> Self {
        Self {
            name,
            base: None,
            kind,
        }
    }

    /// Create a type derived from `base`; it inherits the base's kind
    pub const fn derived(name: &'static str, base: &'static ControlType) -> Self {
        Self {
            name,
            base: Some(base),
            kind: base.kind,
        }
    }

    /// Create a derived type that needs a different native peer than its base
    pub const fn derived_with_kind(
        name: &'static str,
        base: &'static ControlType,
        kind: ControlKind,
    ) -> Self {
        Self {
            name,
            base: Some(base),
            kind,
        }
    }

    /// Type name
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Base type, if any
    pub fn base(&self) -> Option<&'static ControlType> {
        self.base
    }

    /// Native peer kind
    pub fn kind(&self) -> ControlKind {
        self.kind
    }

    /// This type followed by its base chain, most derived first
    pub fn chain(&'static self) -> impl Iterator<Item = &'static ControlType> {
        std::iter::successors(Some(self), |t| t.base)
    }

    /// Whether this type is `other` or derives from it
    pub fn is_a(&'static self, other: &ControlType) -> bool {
        self.chain().any(|t| t == other)
    }

    /// Identity key for tables keyed by owner type
    pub(crate) fn key(&self) -> TypeKey {
        TypeKey(std::ptr::from_ref(self) as usize)
    }
}

/// Address of a `'static` [`ControlType`], usable as a map key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct TypeKey(usize);

impl PartialEq for ControlType {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self, other)
    }
}

impl Eq for ControlType {}

impl fmt::Display for ControlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Base type of every control
pub static CONTROL: ControlType = ControlType::root("Control", ControlKind::Generic);
/// Top-level window
pub static WINDOW: ControlType = ControlType::derived_with_kind("Window", &CONTROL, ControlKind::Window);
/// Container panel
pub static PANEL: ControlType = ControlType::derived_with_kind("Panel", &CONTROL, ControlKind::Panel);
/// Push button
pub static BUTTON: ControlType = ControlType::derived_with_kind("Button", &CONTROL, ControlKind::Button);
/// Static text
pub static LABEL: ControlType = ControlType::derived_with_kind("Label", &CONTROL, ControlKind::Label);
/// Editable text
pub static TEXT_BOX: ControlType =
    ControlType::derived_with_kind("TextBox", &CONTROL, ControlKind::TextBox);
/// Check box
pub static CHECK_BOX: ControlType =
    ControlType::derived_with_kind("CheckBox", &BUTTON, ControlKind::CheckBox);
/// List view
pub static LIST_VIEW: ControlType =
    ControlType::derived_with_kind("ListView", &CONTROL, ControlKind::ListView);
/// Scroll viewer
pub static SCROLL_VIEWER: ControlType =
    ControlType::derived_with_kind("ScrollViewer", &CONTROL, ControlKind::ScrollViewer);
