//! The single-item acquisition pipeline.
//!
//! A run moves strictly forward: search, selection, resolution, fetch, transcode and
//! tagging. Each stage takes the typed output of the one before it and either hands on
//! its own output or stops the run with a [`PipelineError`].

use std::path::PathBuf;

pub mod fetch;
pub mod metadata;
pub mod search;
pub mod tagging;
pub mod transcode;

use crate::config::Config;
use crate::providers::artwork::{HttpImageDownloader, ItunesArtLookup};
use crate::providers::ffmpeg::Ffmpeg;
use crate::providers::http::HttpFetcher;
use crate::providers::youtube::YtDlp;
use crate::providers::{
    ArtLookup, ImageDownloader, MediaFetcher, MediaResolver, SearchProvider, TagWriter, Transcoder,
};
use crate::session::Session;
use crate::utils::format_file_size;
use crate::workspace::Workspace;
use crate::PipelineError;

use tagging::Tagger;

/// Where a run currently is. States are only ever entered once, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Init,
    Searched,
    Selected,
    Resolved,
    Fetched,
    Transcoded,
    Tagged,
    /// Finished without a selection
    NothingFound,
    Failed(crate::Stage),
}

impl RunState {
    fn rank(&self) -> u8 {
        match self {
            RunState::Init => 0,
            RunState::Searched => 1,
            RunState::Selected => 2,
            RunState::Resolved => 3,
            RunState::Fetched => 4,
            RunState::Transcoded => 5,
            RunState::Tagged => 6,
            RunState::NothingFound | RunState::Failed(_) => u8::MAX,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunState::Tagged | RunState::NothingFound | RunState::Failed(_)
        )
    }

    pub fn can_advance_to(&self, next: &RunState) -> bool {
        if self.is_terminal() {
            return false;
        }
        match next {
            RunState::Failed(_) => true,
            RunState::NothingFound => *self == RunState::Searched,
            next => next.rank() == self.rank() + 1,
        }
    }
}

/// How a run ended when it did not fail
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Completed { output: PathBuf },
    NothingFound,
}

/// The external capabilities a run calls into
pub struct Collaborators {
    pub search: Box<dyn SearchProvider>,
    pub resolver: Box<dyn MediaResolver>,
    pub fetcher: Box<dyn MediaFetcher>,
    pub transcoder: Box<dyn Transcoder>,
    pub tag_writer: Box<dyn TagWriter>,
    pub art: Box<dyn ArtLookup>,
    pub images: Box<dyn ImageDownloader>,
}

impl Collaborators {
    /// yt-dlp, HTTP, ffmpeg and iTunes backed collaborators
    pub fn from_config(config: &Config) -> Self {
        let ffmpeg = || Ffmpeg::new(&config.tools.ffmpeg, &config.transcode.bitrate);
        Self {
            search: Box::new(YtDlp::new(&config.tools.yt_dlp)),
            resolver: Box::new(YtDlp::new(&config.tools.yt_dlp)),
            fetcher: Box::new(HttpFetcher::new()),
            transcoder: Box::new(ffmpeg()),
            tag_writer: Box::new(ffmpeg()),
            art: Box::new(ItunesArtLookup::new(&config.art.endpoint)),
            images: Box::new(HttpImageDownloader::new()),
        }
    }
}

/// Runs one search-to-tagged-MP3 acquisition
pub struct Pipeline {
    config: Config,
    workspace: Workspace,
    providers: Collaborators,
    state: RunState,
    show_progress: bool,
}

impl Pipeline {
    pub fn new(config: Config, workspace: Workspace, providers: Collaborators) -> Self {
        Self {
            config,
            workspace,
            providers,
            state: RunState::Init,
            show_progress: true,
        }
    }

    /// Hide or show the download progress indicator
    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    /// Process exactly one item. The pipeline is consumed: a run cannot be repeated.
    pub async fn run(
        mut self,
        session: &mut dyn Session,
        query: Option<String>,
    ) -> Result<RunOutcome, PipelineError> {
        let result = self.run_stages(session, query).await;

        match &result {
            Ok(outcome) => tracing::debug!("Run finished: {:?}", outcome),
            Err(err) => {
                tracing::error!("{} stage failed: {}", err.stage(), err);
                self.transition(RunState::Failed(err.stage()));
            }
        }

        result
    }

    fn transition(&mut self, next: RunState) {
        debug_assert!(
            self.state.can_advance_to(&next),
            "invalid run transition {:?} -> {:?}",
            self.state,
            next
        );
        tracing::debug!("Run state {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    async fn run_stages(
        &mut self,
        session: &mut dyn Session,
        query: Option<String>,
    ) -> Result<RunOutcome, PipelineError> {
        self.workspace.ensure()?;

        let query = search::read_query(session, query)?;
        let candidates = search::search(
            self.providers.search.as_ref(),
            &query,
            self.config.search.result_limit(),
        )
        .await?;
        self.transition(RunState::Searched);

        let Some(candidate) = search::select(session, &candidates)? else {
            session.notify("No Song Found");
            self.transition(RunState::NothingFound);
            return Ok(RunOutcome::NothingFound);
        };
        self.transition(RunState::Selected);

        let locator = search::resolve(self.providers.resolver.as_ref(), candidate).await?;
        self.transition(RunState::Resolved);

        session.notify(&format!("Downloading {}", locator.title));
        let cache = fetch::fetch(
            self.providers.fetcher.as_ref(),
            &locator,
            &self.workspace.cache_file_for(&locator.title),
            self.show_progress,
        )
        .await?;
        self.transition(RunState::Fetched);

        session.notify(&format!(
            "Finishing up ({} downloaded).",
            format_file_size(cache.bytes)
        ));
        let output = transcode::transcode(
            self.providers.transcoder.as_ref(),
            cache,
            &self.workspace.output_file_for(&locator.title),
        )
        .await?;
        self.transition(RunState::Transcoded);

        let tagger = Tagger {
            art: self.providers.art.as_ref(),
            images: self.providers.images.as_ref(),
            writer: self.providers.tag_writer.as_ref(),
            art_config: &self.config.art,
            tagging_config: &self.config.tagging,
            workspace: &self.workspace,
        };
        tagger.tag(session, &output).await?;
        self.transition(RunState::Tagged);

        Ok(RunOutcome::Completed {
            output: output.path,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::fetch::tests::{locator, ChunkFetcher};
    use super::metadata::MetadataRecord;
    use super::tagging::tests::RecordingTagWriter;
    use super::*;
    use crate::providers::{
        Candidate, MockArtLookup, MockImageDownloader, MockMediaResolver, MockSearchProvider,
    };
    use crate::session::ScriptedSession;
    use crate::Stage;
    use async_trait::async_trait;
    use std::path::Path;
    use tempfile::TempDir;

    /// Copies the input to the output, or fails without writing anything
    struct CopyTranscoder {
        fail: bool,
    }

    #[async_trait]
    impl Transcoder for CopyTranscoder {
        async fn transcode(&self, input: &Path, output: &Path) -> crate::Result<()> {
            if self.fail {
                anyhow::bail!("ffmpeg exited with 1");
            }
            fs_err::copy(input, output)?;
            Ok(())
        }
    }

    fn candidates(count: usize) -> Vec<Candidate> {
        (0..count)
            .map(|i| Candidate {
                id: format!("vid{}", i),
                title: format!("Lofi Track {}", i),
                author: "LoFi Channel".to_string(),
                duration: Some(180 + i as u64),
            })
            .collect()
    }

    struct Harness {
        search: MockSearchProvider,
        resolver: MockMediaResolver,
        fetcher: ChunkFetcher,
        transcoder: CopyTranscoder,
        tag_writer: RecordingTagWriter,
        art: MockArtLookup,
        images: MockImageDownloader,
    }

    impl Harness {
        fn new(found: usize) -> Self {
            let mut search = MockSearchProvider::new();
            search
                .expect_search()
                .returning(move |_, _| Ok(candidates(found)));

            let mut resolver = MockMediaResolver::new();
            resolver
                .expect_resolve()
                .returning(|id| Ok(locator(&format!("Title of {}", id))));

            let mut art = MockArtLookup::new();
            art.expect_lookup().returning(|_, _, _| Ok(None));

            Self {
                search,
                resolver,
                fetcher: ChunkFetcher::complete(vec!["mp4 ", "payload"]),
                transcoder: CopyTranscoder { fail: false },
                tag_writer: RecordingTagWriter::default(),
                art,
                images: MockImageDownloader::new(),
            }
        }

        fn pipeline(self, root: &Path) -> Pipeline {
            let providers = Collaborators {
                search: Box::new(self.search),
                resolver: Box::new(self.resolver),
                fetcher: Box::new(self.fetcher),
                transcoder: Box::new(self.transcoder),
                tag_writer: Box::new(self.tag_writer),
                art: Box::new(self.art),
                images: Box::new(self.images),
            };
            Pipeline::new(Config::default(), Workspace::new(root), providers).with_progress(false)
        }
    }

    fn dir_entries(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs_err::read_dir(dir)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_state_machine_only_moves_forward() {
        assert!(RunState::Init.can_advance_to(&RunState::Searched));
        assert!(RunState::Searched.can_advance_to(&RunState::Selected));
        assert!(RunState::Searched.can_advance_to(&RunState::NothingFound));
        assert!(RunState::Transcoded.can_advance_to(&RunState::Tagged));
        assert!(RunState::Fetched.can_advance_to(&RunState::Failed(Stage::Transcode)));

        assert!(!RunState::Init.can_advance_to(&RunState::Selected));
        assert!(!RunState::Selected.can_advance_to(&RunState::NothingFound));
        assert!(!RunState::Resolved.can_advance_to(&RunState::Resolved));
        assert!(!RunState::Tagged.can_advance_to(&RunState::Failed(Stage::Tagging)));
        assert!(!RunState::Failed(Stage::Fetch).can_advance_to(&RunState::Fetched));
        assert!(!RunState::NothingFound.can_advance_to(&RunState::Selected));
    }

    #[tokio::test]
    async fn test_selected_song_ends_up_tagged_in_completed() {
        let dir = TempDir::new().unwrap();
        let harness = Harness::new(5);
        let tags = harness.tag_writer.clone();
        let mut session = ScriptedSession::new()
            .with_query("lofi beats")
            .with_selection(Some(2))
            .with_line("{Chill, Vol1, LoFi Guy}");

        let outcome = harness.pipeline(dir.path()).run(&mut session, None).await.unwrap();

        let expected = dir.path().join("completed").join("Title of vid2.mp3");
        assert_eq!(
            outcome,
            RunOutcome::Completed {
                output: expected.clone()
            }
        );
        assert_eq!(session.offered[0].len(), 5);
        assert_eq!(fs_err::read(&expected).unwrap(), b"mp4 payload");
        assert_eq!(
            tags.current_tags(&expected),
            Some(MetadataRecord {
                title: "Chill".to_string(),
                album: "Vol1".to_string(),
                artist: "LoFi Guy".to_string(),
            })
        );
        assert_eq!(dir_entries(&dir.path().join("cache")), vec!["cover.png"]);
        assert!(session.saw_message("Download complete."));
    }

    #[tokio::test]
    async fn test_no_results_is_a_clean_exit() {
        let dir = TempDir::new().unwrap();
        let harness = Harness::new(0);
        let mut session = ScriptedSession::new();

        let outcome = harness
            .pipeline(dir.path())
            .run(&mut session, Some("lofi beats".to_string()))
            .await
            .unwrap();

        assert_eq!(outcome, RunOutcome::NothingFound);
        assert!(session.saw_message("No Song Found"));
        assert!(session.offered.is_empty());
        assert!(dir_entries(&dir.path().join("cache")).is_empty());
        assert!(dir_entries(&dir.path().join("completed")).is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_selection_is_a_clean_exit() {
        let dir = TempDir::new().unwrap();
        let harness = Harness::new(3);
        let mut session = ScriptedSession::new().with_selection(None);

        let outcome = harness
            .pipeline(dir.path())
            .run(&mut session, Some("lofi beats".to_string()))
            .await
            .unwrap();

        assert_eq!(outcome, RunOutcome::NothingFound);
    }

    #[tokio::test]
    async fn test_interrupted_download_aborts_before_transcoding() {
        let dir = TempDir::new().unwrap();
        let mut harness = Harness::new(5);
        harness.fetcher = ChunkFetcher {
            chunks: vec!["partial"],
            content_length: Some(1_000),
            fail_after: true,
        };
        let tags = harness.tag_writer.clone();
        let mut session = ScriptedSession::new().with_selection(Some(0));

        let err = harness
            .pipeline(dir.path())
            .run(&mut session, Some("lofi beats".to_string()))
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::Fetch(_)));
        assert_eq!(err.stage(), Stage::Fetch);
        assert!(dir_entries(&dir.path().join("completed")).is_empty());
        assert!(tags.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_transcode_failure_keeps_cache_file() {
        let dir = TempDir::new().unwrap();
        let mut harness = Harness::new(1);
        harness.transcoder = CopyTranscoder { fail: true };
        let mut session = ScriptedSession::new().with_selection(Some(0));

        let err = harness
            .pipeline(dir.path())
            .run(&mut session, Some("lofi beats".to_string()))
            .await
            .unwrap_err();

        assert_eq!(err.stage(), Stage::Transcode);
        assert_eq!(
            dir_entries(&dir.path().join("cache")),
            vec!["Title of vid0.mp4"]
        );
        assert!(dir_entries(&dir.path().join("completed")).is_empty());
    }

    #[tokio::test]
    async fn test_default_art_skips_image_download() {
        let dir = TempDir::new().unwrap();
        let mut harness = Harness::new(2);
        harness.art = MockArtLookup::new();
        harness
            .art
            .expect_lookup()
            .times(1)
            .returning(|_, _, _| Ok(Some("default".to_string())));
        harness.images.expect_download().times(0);
        let tags = harness.tag_writer.clone();
        let mut session = ScriptedSession::new()
            .with_selection(Some(1))
            .with_line("{Chill, Vol1, LoFi Guy}");

        harness
            .pipeline(dir.path())
            .run(&mut session, Some("lofi beats".to_string()))
            .await
            .unwrap();

        let calls = tags.calls.lock().unwrap();
        assert_eq!(
            calls[0].attachments,
            vec![dir.path().join("cache").join("cover.png")]
        );
    }

    #[tokio::test]
    async fn test_workspace_failure_stops_before_search() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("not-a-dir");
        fs_err::write(&root, b"file").unwrap();

        let mut search = MockSearchProvider::new();
        search.expect_search().times(0);
        let mut harness = Harness::new(0);
        harness.search = search;
        let mut session = ScriptedSession::new();

        let err = harness
            .pipeline(&root)
            .run(&mut session, Some("lofi beats".to_string()))
            .await
            .unwrap_err();

        assert_eq!(err.stage(), Stage::Workspace);
    }
}
