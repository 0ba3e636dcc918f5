//! Device-wide state: system UI flags, navigation mode and the fields the binder thread writes.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Mutex, PoisonError};

use bitflags::bitflags;
use portable_atomic::AtomicF32;
use tracing::debug;

use crate::utils::{Rect, Region};

pub mod os;

bitflags! {
    /// System UI state bits, as published by system UI.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct SystemUiStateFlags: u32 {
        const SCREEN_PINNING = 1;
        const NAV_BAR_HIDDEN = 1 << 1;
        const NOTIFICATION_PANEL_EXPANDED = 1 << 2;
        const BOUNCER_SHOWING = 1 << 3;
        const A11Y_BUTTON_CLICKABLE = 1 << 4;
        const A11Y_BUTTON_LONG_CLICKABLE = 1 << 5;
        const STATUS_BAR_KEYGUARD_SHOWING = 1 << 6;
        const OVERVIEW_DISABLED = 1 << 7;
        const HOME_DISABLED = 1 << 8;
        const STATUS_BAR_KEYGUARD_SHOWING_OCCLUDED = 1 << 9;
        const SEARCH_DISABLED = 1 << 10;
        const QUICK_SETTINGS_EXPANDED = 1 << 11;
    }
}

impl SystemUiStateFlags {
    pub fn is_assistant_gesture_disabled(self) -> bool {
        let disable = Self::SCREEN_PINNING
            | Self::NAV_BAR_HIDDEN
            | Self::BOUNCER_SHOWING
            | Self::QUICK_SETTINGS_EXPANDED;
        if self.intersects(disable) {
            return true;
        }

        // The notification shade only blocks the assistant when it is not over the keyguard.
        self.contains(Self::NOTIFICATION_PANEL_EXPANDED)
            && !self.contains(Self::STATUS_BAR_KEYGUARD_SHOWING)
    }

    /// Whether a swipe from the navigation bar may start a system gesture.
    pub fn is_valid_for_gestures(self) -> bool {
        !self.contains(Self::NAV_BAR_HIDDEN)
            && !self.contains(Self::NOTIFICATION_PANEL_EXPANDED)
            && (!self.contains(Self::HOME_DISABLED) || !self.contains(Self::OVERVIEW_DISABLED))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NavigationMode {
    ThreeButtons,
    TwoButtons,
    NoButton,
}

impl NavigationMode {
    pub fn has_gestures(self) -> bool {
        match self {
            NavigationMode::ThreeButtons => false,
            NavigationMode::TwoButtons | NavigationMode::NoButton => true,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            NavigationMode::ThreeButtons => "THREE_BUTTONS",
            NavigationMode::TwoButtons => "TWO_BUTTONS",
            NavigationMode::NoButton => "NO_BUTTON",
        }
    }
}

impl fmt::Display for NavigationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Holds the current navigation mode and tells listeners when it really changes.
pub struct NavigationModeTracker {
    mode: NavigationMode,
    listeners: Vec<Box<dyn FnMut(NavigationMode)>>,
}

impl NavigationModeTracker {
    pub fn new(mode: NavigationMode) -> Self {
        Self {
            mode,
            listeners: Vec::new(),
        }
    }

    pub fn mode(&self) -> NavigationMode {
        self.mode
    }

    /// Registers `listener` and returns the current mode.
    pub fn add_listener(&mut self, listener: impl FnMut(NavigationMode) + 'static) -> NavigationMode {
        self.listeners.push(Box::new(listener));
        self.mode
    }

    /// Returns whether the mode changed.
    pub fn update_mode(&mut self, mode: NavigationMode) -> bool {
        if self.mode == mode {
            return false;
        }

        debug!("navigation mode changed: {} -> {}", self.mode, mode);
        self.mode = mode;
        for listener in &mut self.listeners {
            listener(mode);
        }
        true
    }
}

impl fmt::Debug for NavigationModeTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NavigationModeTracker")
            .field("mode", &self.mode)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

/// Fields written from the binder thread and read from any thread.
#[derive(Debug, Default)]
pub struct BinderState {
    system_ui_flags: AtomicU32,
    assistant_available: AtomicBool,
    assistant_visibility: AtomicF32,
    exclusion_region: Mutex<Region>,
    active_nav_bar_region: Mutex<Option<Rect>>,
}

impl BinderState {
    pub fn system_ui_flags(&self) -> SystemUiStateFlags {
        SystemUiStateFlags::from_bits_truncate(self.system_ui_flags.load(Ordering::Acquire))
    }

    pub fn set_system_ui_flags(&self, flags: SystemUiStateFlags) {
        self.system_ui_flags.store(flags.bits(), Ordering::Release);
    }

    pub fn is_assistant_available(&self) -> bool {
        self.assistant_available.load(Ordering::Acquire)
    }

    pub fn set_assistant_available(&self, available: bool) {
        self.assistant_available.store(available, Ordering::Release);
    }

    pub fn assistant_visibility(&self) -> f32 {
        self.assistant_visibility.load(Ordering::Acquire)
    }

    pub fn set_assistant_visibility(&self, visibility: f32) {
        self.assistant_visibility.store(visibility, Ordering::Release);
    }

    pub fn exclusion_region(&self) -> Region {
        self.exclusion_region
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set_exclusion_region(&self, region: Region) {
        *self
            .exclusion_region
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = region;
    }

    pub fn active_nav_bar_region(&self) -> Option<Rect> {
        *self
            .active_nav_bar_region
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_active_nav_bar_region(&self, region: Option<Rect>) {
        *self
            .active_nav_bar_region
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = region;
    }
}

/// UI thread view of the device.
#[derive(Debug)]
pub struct DeviceState {
    pub nav_mode: NavigationModeTracker,
    /// Copy of the binder flags, refreshed when the change is posted to the UI loop.
    pub system_ui_flags: SystemUiStateFlags,
    pub user_unlocked: bool,
}

impl DeviceState {
    pub fn new(mode: NavigationMode) -> Self {
        Self {
            nav_mode: NavigationModeTracker::new(mode),
            system_ui_flags: SystemUiStateFlags::empty(),
            user_unlocked: true,
        }
    }

    pub fn mode(&self) -> NavigationMode {
        self.nav_mode.mode()
    }

    pub fn is_fully_gestural(&self) -> bool {
        self.mode() == NavigationMode::NoButton
    }

    pub fn is_overview_disabled(&self) -> bool {
        self.system_ui_flags
            .contains(SystemUiStateFlags::OVERVIEW_DISABLED)
    }

    pub fn is_screen_pinning_active(&self) -> bool {
        self.system_ui_flags
            .contains(SystemUiStateFlags::SCREEN_PINNING)
    }

    pub fn is_keyguard_showing_occluded(&self) -> bool {
        self.system_ui_flags
            .contains(SystemUiStateFlags::STATUS_BAR_KEYGUARD_SHOWING_OCCLUDED)
    }

    pub fn is_accessibility_menu_available(&self) -> bool {
        self.system_ui_flags
            .contains(SystemUiStateFlags::A11Y_BUTTON_CLICKABLE)
    }

    pub fn is_accessibility_menu_shortcut_available(&self) -> bool {
        self.system_ui_flags
            .contains(SystemUiStateFlags::A11Y_BUTTON_LONG_CLICKABLE)
    }
}
