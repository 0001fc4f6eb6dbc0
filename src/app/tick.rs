use std::time::Instant;

use super::App;

impl App {
    /// Called on every tick of the main loop: drains backend events into the
    /// controller and expires the banner.
    pub(crate) fn on_tick(&mut self) {
        let now = Instant::now();
        while let Some(event) = self.backend.poll_event() {
            self.handle_stream_event(event);
        }

        if self.banner.as_ref().is_some_and(|banner| banner.is_expired(now)) {
            self.banner = None;
        }
    }

    /// Seconds since the run in flight was submitted.
    pub fn elapsed_secs(&self) -> Option<u64> {
        self.run_started.map(|started| started.elapsed().as_secs())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use crate::app::{App, Banner, BannerKind};
    use crate::backend::replay::ReplayBackend;
    use crate::config::AppSettings;

    fn app() -> App {
        App::new(
            std::env::temp_dir(),
            AppSettings::default(),
            Box::new(ReplayBackend::new("/nonexistent.ndjson", Duration::ZERO)),
            None,
        )
    }

    #[test]
    fn every_tick_expires_stale_banners() {
        let mut app = app();
        let mut stale = Banner::new(BannerKind::Error, "save failed");
        stale.shown_at -= Duration::from_secs(6);
        app.banner = Some(stale);
        app.on_tick();
        assert!(app.banner.is_none());

        app.banner = Some(Banner::new(BannerKind::Info, "saved"));
        app.on_tick();
        app.on_tick();
        assert!(app.banner.is_some());
    }
}
