//! Callback dispatch by string name: a small static mapping from tag to
//! handler, populated at init; unknown names bind the default. No dynamic
//! reflection, matching the same `ActiveAction`-style enum dispatch used
//! for the HTTP connection's phase handling.

/// A decoded raster, handed to the UI on successful image upload.
#[derive(Debug, Clone, PartialEq)]
pub struct Texture {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u32>,
}

/// The menu/overlay renderer collaborator: out of scope to implement,
/// narrow enough to model as a two-method trait.
pub trait MenuUi: Send + Sync {
    fn load_background(&self, texture: Texture);
    fn texture_free(&self, texture: &Texture);
}

/// A no-op `MenuUi` for when no UI is wired up.
pub struct NullMenuUi;

impl MenuUi for NullMenuUi {
    fn load_background(&self, _texture: Texture) {}
    fn texture_free(&self, _texture: &Texture) {}
}

/// `cb_core_updater_list` / `cb_core_updater_download` bodies, supplied
/// behind a trait so tests can record instead of touching the filesystem.
pub trait CoreUpdaterSink: Send + Sync {
    /// Response body was newline-separated entries.
    fn on_list(&self, entries: Vec<String>);
    /// Response body is the full downloaded payload; `url` is the request's
    /// primary argument, which doubles as the destination identifier since
    /// the wire format carries no separate destination field.
    fn on_download(&self, url: &str, body: &[u8]);
}

/// Writes downloaded bodies to `url`'s basename under a fixed directory;
/// entries are just logged. A reasonable default for a standalone binary,
/// swappable in tests.
pub struct FsCoreUpdaterSink {
    pub download_dir: std::path::PathBuf,
}

impl CoreUpdaterSink for FsCoreUpdaterSink {
    fn on_list(&self, entries: Vec<String>) {
        proxy_log::info!("core updater list: {} entries", entries.len());
    }

    fn on_download(&self, url: &str, body: &[u8]) {
        let name = url.rsplit('/').next().unwrap_or("download.bin");
        let dest = self.download_dir.join(name);
        if let Err(e) = std::fs::write(&dest, body) {
            proxy_log::errors!("core updater download write failed: {}", e);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NbioCallbackKind {
    Default,
    MenuWallpaper,
}

pub fn resolve_nbio_callback(tag: &str) -> NbioCallbackKind {
    match tag {
        "cb_menu_wallpaper" => NbioCallbackKind::MenuWallpaper,
        _ => NbioCallbackKind::Default,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpCallbackKind {
    Default,
    CoreUpdaterDownload,
    CoreUpdaterList,
}

pub fn resolve_http_callback(tag: &str) -> HttpCallbackKind {
    match tag {
        "cb_core_updater_download" => HttpCallbackKind::CoreUpdaterDownload,
        "cb_core_updater_list" => HttpCallbackKind::CoreUpdaterList,
        _ => HttpCallbackKind::Default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_nbio_tag_falls_back_to_default() {
        assert_eq!(resolve_nbio_callback("whatever"), NbioCallbackKind::Default);
        assert_eq!(resolve_nbio_callback("cb_menu_wallpaper"), NbioCallbackKind::MenuWallpaper);
    }

    #[test]
    fn unknown_http_tag_falls_back_to_default() {
        assert_eq!(resolve_http_callback(""), HttpCallbackKind::Default);
        assert_eq!(resolve_http_callback("cb_core_updater_list"), HttpCallbackKind::CoreUpdaterList);
        assert_eq!(resolve_http_callback("cb_core_updater_download"), HttpCallbackKind::CoreUpdaterDownload);
    }
}
