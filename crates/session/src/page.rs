//! Page-level side effects: navigation and user-visible notices

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Success,
    Info,
    Warning,
    Danger,
}

/// Message shown to the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn new(level: NoticeLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Success, message)
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Info, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Warning, message)
    }

    pub fn danger(message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Danger, message)
    }
}

/// The page the guard runs in
pub trait PageContext: Send + Sync {
    /// URL of the page that linked here, if any
    fn referrer(&self) -> Option<String>;

    /// Leave the current page for `route`
    fn navigate(&self, route: &str);

    /// Show a message on the current page
    fn notify(&self, notice: &Notice);
}

/// Page stand-in for native hosts: navigation and notices go to the log
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingPage;

impl PageContext for LoggingPage {
    fn referrer(&self) -> Option<String> {
        None
    }

    fn navigate(&self, route: &str) {
        info!(route, "navigate");
    }

    fn notify(&self, notice: &Notice) {
        info!(level = ?notice.level, message = %notice.message, "notice");
    }
}

#[cfg(target_arch = "wasm32")]
pub use browser::{BrowserPage, clear_notice_callback, set_notice_callback};

#[cfg(target_arch = "wasm32")]
mod browser {
    //! Browser page backed by `window.location` and a UI-provided callback

    use super::{Notice, PageContext};
    use std::cell::RefCell;
    use std::rc::Rc;

    thread_local! {
        /// Renders notices; installed by whichever UI owns the alert area
        static NOTICE_CALLBACK: RefCell<Option<Rc<dyn Fn(&Notice)>>> = RefCell::new(None);
    }

    /// Set the global notice callback
    pub fn set_notice_callback(callback: Rc<dyn Fn(&Notice)>) {
        NOTICE_CALLBACK.with(|cb| {
            *cb.borrow_mut() = Some(callback);
        });
    }

    /// Clear the notice callback
    pub fn clear_notice_callback() {
        NOTICE_CALLBACK.with(|cb| {
            *cb.borrow_mut() = None;
        });
    }

    #[derive(Debug, Clone, Copy, Default)]
    pub struct BrowserPage;

    impl PageContext for BrowserPage {
        fn referrer(&self) -> Option<String> {
            let referrer = web_sys::window()?.document()?.referrer();
            (!referrer.is_empty()).then_some(referrer)
        }

        fn navigate(&self, route: &str) {
            let Some(window) = web_sys::window() else {
                warn!(route, "no window to navigate");
                return;
            };
            if let Err(e) = window.location().set_href(route) {
                error!(route, error = ?e, "navigation failed");
            }
        }

        fn notify(&self, notice: &Notice) {
            let rendered = NOTICE_CALLBACK.with(|cb| {
                if let Some(callback) = cb.borrow().as_ref() {
                    callback(notice);
                    true
                } else {
                    false
                }
            });
            if !rendered {
                info!(level = ?notice.level, message = %notice.message, "notice");
            }
        }
    }
}
