use std::time::Instant;

use log::{debug, error, info, warn};

use super::{App, Banner, BannerKind};
use crate::backend::StreamEvent;
use crate::research::{Phase, SubmitError};

// Glue between the submission controller and the research backend.
impl App {
    /// Submits the composer content as a new research question.
    pub(crate) async fn submit_research(&mut self) {
        let question = self.input.take();
        let request = match self.controller.submit(&question, &self.selection) {
            Ok(request) => request,
            Err(SubmitError::EmptyInput) => return,
            Err(err) => {
                self.input.restore(question);
                self.status_message = err.to_string();
                return;
            }
        };

        self.conversation.follow_latest();
        self.run_id = None;
        self.run_started = Some(Instant::now());
        match self.backend.start(request).await {
            Ok(()) => {
                self.status_message = format!(
                    "Researching with {} · {}",
                    self.selection.search_mode.label(),
                    self.selection.reasoning_model
                );
            }
            Err(err) => {
                error!("Failed to start research stream: {:#}", err);
                self.controller.on_error(format!("{:#}", err));
                self.run_started = None;
            }
        }
    }

    /// Esc while streaming: stops the run and starts over.
    pub(crate) fn cancel_research(&mut self) {
        if !self.controller.is_streaming() {
            return;
        }
        info!("Research cancelled by user");
        self.reset_session();
        self.status_message = String::from("Research cancelled");
    }

    /// Ctrl+R: the only way out of the failed state.
    pub(crate) fn reload(&mut self) {
        info!("Reloading session");
        self.reset_session();
        self.status_message = String::from("Session reloaded");
    }

    /// Aborts the transport and returns every piece of session state to its
    /// configured defaults.
    fn reset_session(&mut self) {
        self.backend.cancel();
        self.controller.reset();
        self.conversation.follow_latest();
        self.selection = Self::default_selection(&self.settings);
        self.run_id = None;
        self.run_started = None;
        self.overlay = None;
    }

    pub(crate) fn handle_stream_event(&mut self, event: StreamEvent) {
        match event {
            StreamEvent::Started { run_id } => {
                debug!("Run started: {:?}", run_id);
                self.run_id = run_id;
            }
            StreamEvent::Update(envelope) => {
                if let Some(classified) = self.controller.on_update(&envelope) {
                    self.status_message = classified.event.title;
                }
            }
            StreamEvent::Completed => {
                let elapsed = self.run_started.take().map(|started| started.elapsed());
                let archived = self.controller.on_complete();
                match (archived, elapsed) {
                    (Some(_), Some(elapsed)) => {
                        self.status_message =
                            format!("Research finished in {:.1}s", elapsed.as_secs_f32());
                    }
                    (Some(_), None) => {
                        self.status_message = String::from("Research finished");
                    }
                    (None, _) => {
                        warn!("Stream ended without a final answer");
                        self.banner = Some(Banner::new(
                            BannerKind::Info,
                            "The research stream ended without a final answer",
                        ));
                        self.status_message = String::from("Research ended");
                    }
                }
            }
            StreamEvent::Failed(reason) => {
                error!("Research stream failed: {}", reason);
                self.run_started = None;
                self.controller.on_error(reason);
                self.status_message = String::from("Research failed · Ctrl+R 重新載入");
            }
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.controller.phase(), Phase::Failed { .. })
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::time::Duration;

    use pretty_assertions::assert_eq;

    use crate::app::App;
    use crate::backend::replay::ReplayBackend;
    use crate::config::AppSettings;
    use crate::research::{EffortLevel, Phase, Role, SearchMode};

    fn app_with_replay(lines: &[&str]) -> (App, tempfile::NamedTempFile) {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        for line in lines {
            writeln!(file, "{}", line).unwrap();
        }
        let backend = ReplayBackend::new(file.path(), Duration::ZERO);
        let app = App::new(
            std::env::temp_dir(),
            AppSettings::default(),
            Box::new(backend),
            None,
        );
        (app, file)
    }

    async fn run_until_idle(app: &mut App) {
        for _ in 0..200 {
            app.on_tick();
            if !app.controller.is_streaming() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("stream never finished");
    }

    fn type_question(app: &mut App, question: &str) {
        for ch in question.chars() {
            app.input.insert_char(ch);
        }
    }

    #[tokio::test]
    async fn replayed_run_fills_timeline_and_archives_it() {
        let (mut app, _file) = app_with_replay(&[
            r#"{"generate_query": {"search_query": ["rust async"]}}"#,
            r#"{"web_research": {"sources_gathered": [{"label": "tokio.rs"}]}}"#,
            r#"{"reflection": {"is_sufficient": true}}"#,
            r#"{"finalize_answer": {"messages": [{"type": "ai", "id": "ai-1", "content": "Use tokio."}]}}"#,
        ]);
        type_question(&mut app, "How do I do async in Rust?");
        app.submit_research().await;
        assert!(app.controller.is_streaming());
        run_until_idle(&mut app).await;

        assert_eq!(app.controller.phase(), &Phase::Idle);
        let titles: Vec<_> = app
            .controller
            .timeline()
            .iter()
            .map(|event| event.title.as_str())
            .collect();
        assert_eq!(
            titles,
            vec!["Generating Search Queries", "Web Research", "Reflection", "Finalizing Answer"]
        );
        let answer = app.controller.last_assistant().unwrap();
        assert_eq!(answer.role, Role::Assistant);
        assert_eq!(answer.content, "Use tokio.");
        assert_eq!(app.controller.activities_for("ai-1").map(<[_]>::len), Some(4));
        assert!(app.status_message.starts_with("Research finished"));
    }

    #[tokio::test]
    async fn missing_replay_fails_until_reload() {
        let mut app = App::new(
            std::env::temp_dir(),
            AppSettings::default(),
            Box::new(ReplayBackend::new("/nonexistent.ndjson", Duration::ZERO)),
            None,
        );
        app.selection.search_mode = SearchMode::Deep;
        app.selection.effort = EffortLevel::High;
        type_question(&mut app, "question");
        app.submit_research().await;
        run_until_idle(&mut app).await;
        assert!(app.is_failed());

        type_question(&mut app, "again");
        app.submit_research().await;
        assert!(app.is_failed());
        assert_eq!(app.input.buffer(), "again");

        app.reload();
        assert_eq!(app.controller.phase(), &Phase::Idle);
        assert!(app.controller.messages().is_empty());
        assert_eq!(app.selection.search_mode, SearchMode::Standard);
        assert_eq!(app.selection.effort, EffortLevel::Medium);
    }

    #[tokio::test]
    async fn empty_input_is_ignored_silently() {
        let (mut app, _file) = app_with_replay(&[]);
        type_question(&mut app, "   ");
        let before = app.status_message.clone();
        app.submit_research().await;
        assert_eq!(app.controller.phase(), &Phase::Idle);
        assert_eq!(app.status_message, before);
    }

    #[tokio::test]
    async fn cancel_discards_the_run() {
        let (mut app, _file) = app_with_replay(&[r#"{"generate_query": {"search_query": ["q"]}}"#]);
        type_question(&mut app, "question");
        app.submit_research().await;
        app.cancel_research();
        assert_eq!(app.controller.phase(), &Phase::Idle);
        assert!(app.controller.timeline().is_empty());
        app.on_tick();
        assert!(app.controller.messages().is_empty());
    }
}
