#[derive(knuffel::Decode, Debug, Clone, PartialEq)]
pub struct Recents {
    #[knuffel(child, unwrap(argument), default = Self::default().thumbnail_cache_size)]
    pub thumbnail_cache_size: usize,
    #[knuffel(child, unwrap(argument), default = Self::default().icon_cache_size)]
    pub icon_cache_size: usize,
    #[knuffel(child)]
    pub disable_thumbnail_preload: bool,
    /// Always request full resolution thumbnails, even mid-gesture.
    #[knuffel(child)]
    pub force_high_res: bool,
}

impl Default for Recents {
    fn default() -> Self {
        Self {
            thumbnail_cache_size: 3,
            icon_cache_size: 12,
            disable_thumbnail_preload: false,
            force_high_res: false,
        }
    }
}

#[derive(knuffel::Decode, Debug, Clone, PartialEq)]
pub struct Overview {
    /// Two toggle commands closer than this count as a double tap.
    #[knuffel(child, unwrap(argument), default = Self::default().double_tap_timeout_ms)]
    pub double_tap_timeout_ms: u64,
}

impl Default for Overview {
    fn default() -> Self {
        Self {
            double_tap_timeout_ms: 300,
        }
    }
}

#[derive(knuffel::Decode, Debug, Clone, PartialEq)]
pub struct Debug {
    #[knuffel(child, unwrap(argument), default = Self::default().touch_log_size)]
    pub touch_log_size: usize,
    #[knuffel(child, unwrap(argument), default = Self::default().gesture_log_size)]
    pub gesture_log_size: usize,
}

impl Default for Debug {
    fn default() -> Self {
        Self {
            touch_log_size: 40,
            gesture_log_size: 40,
        }
    }
}
