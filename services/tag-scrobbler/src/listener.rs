//!
//! src/listener.rs  Andrew Belles  Oct 16th, 2026
//!
//! Reads newline delimited events and runs each one as an independent
//! invocation of the pipeline. Failed invocations are counted so the
//! process can exit non-zero and have its input redelivered
//!

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::ListenerConfig;
use crate::errors::ScrobbleError;
use crate::pipeline::{InboundEvent, Outcome, Pipeline};

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ListenerStats {
    pub received: usize,
    pub scrobbled: usize,
    pub skipped: usize,
    pub failed: usize
}

impl ListenerStats {
    fn record(&mut self, result: Result<Outcome, ScrobbleError>) {
        match result {
            Ok(Outcome::Scrobbled(_)) => self.scrobbled += 1,
            Ok(_) => self.skipped += 1,
            Err(e) => {
                error!(error = %e, "listener.invocation.failed");
                self.failed += 1;
            }
        }
    }
}

pub struct Listener {
    pipeline: Arc<Pipeline>,
    in_flight: Arc<Semaphore>,
    shutdown: CancellationToken
}

impl Listener {
    pub fn new(pipeline: Arc<Pipeline>, cfg: &ListenerConfig) -> Self {
        Self {
            pipeline,
            in_flight: Arc::new(Semaphore::new(cfg.max_in_flight)),
            shutdown: CancellationToken::new()
        }
    }

    pub fn shutdown(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Stops reading on shutdown; invocations already started run to completion.
    /// Reading waits while `max_in_flight` invocations are running
    pub async fn run<R>(&self, input: R) -> Result<ListenerStats, ScrobbleError>
    where
        R: AsyncRead + Unpin,
    {
        info!("listener.start");
        let mut lines = BufReader::new(input).lines();
        let mut tasks: JoinSet<Result<Outcome, ScrobbleError>> = JoinSet::new();
        let mut stats = ListenerStats::default();

        loop {
            let line = tokio::select! {
                biased;
                () = self.shutdown.cancelled() => {
                    info!(reason = "shutdown token", "listener.stop");
                    break;
                }
                line = lines.next_line() => line?
            };
            let Some(line) = line else { break };
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            stats.received += 1;

            let event: InboundEvent = match serde_json::from_str(line) {
                Ok(event) => event,
                Err(e) => {
                    warn!(error = %e, "listener.malformed");
                    stats.skipped += 1;
                    continue;
                }
            };

            let permit = match self.in_flight.clone().acquire_owned().await {
                Ok(p) => p,
                Err(e) => {
                    error!(error = %e, "listener.semaphore.closed");
                    break;
                }
            };
            let pipeline = self.pipeline.clone();
            tasks.spawn(async move {
                let _permit = permit;
                pipeline.handle(&event).await
            });

            // collect whatever finished meanwhile
            while let Some(done) = tasks.try_join_next() {
                stats.record(Self::flatten(done));
            }
        }

        while let Some(done) = tasks.join_next().await {
            stats.record(Self::flatten(done));
        }

        info!(
            received = stats.received, scrobbled = stats.scrobbled,
            skipped = stats.skipped, failed = stats.failed, "listener.exit"
        );
        Ok(stats)
    }

    fn flatten(done: Result<Result<Outcome, ScrobbleError>, tokio::task::JoinError>) ->
        Result<Outcome, ScrobbleError> {
        done.map_err(|e| ScrobbleError::Io(std::io::Error::other(e)))?
    }
}

/// Redeliver when any invocation failed
pub fn exit_status(stats: &ListenerStats) -> Result<(), ScrobbleError> {
    if stats.failed > 0 {
        return Err(ScrobbleError::Redeliver(stats.failed));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use async_trait::async_trait;
    use crate::fetch::{LastFmApi, decode_reply};
    use crate::persistent::SqliteAlbumStore;
    use crate::types::{AlbumInfoReply, ScrobbleReply};
    use crate::pipeline::tests::test_config;
    use crate::testing::FakeLastFm;

    fn event_line(payload: &str) -> String {
        let event = InboundEvent::encode(payload);
        format!("{{\"data\": \"{}\"}}\n", event.data.unwrap())
    }

    async fn listener(lastfm: Arc<FakeLastFm>, ensure_index: bool) -> Listener {
        let store = SqliteAlbumStore::memory(ensure_index).await.unwrap();
        store.insert_album(None, "AA:BB:CC", "Mazzy Star", "So Tonight That I Might See")
            .await
            .unwrap();
        let pipeline = Pipeline::new(&test_config(), Arc::new(store), lastfm);
        Listener::new(Arc::new(pipeline), &ListenerConfig::default())
    }

    #[tokio::test]
    async fn each_line_is_one_invocation() -> Result<(), ScrobbleError> {
        let lastfm = Arc::new(FakeLastFm::with_tracks(&["Fade Into You", "Bells Ring"]));
        let listener = listener(lastfm.clone(), true).await;

        let input = [
            event_line("AA:BB:CC"),
            "\n".to_string(),
            event_line("00:00:00"),
            "this is not json\n".to_string(),
            "{}\n".to_string(),
            event_line("aa bb cc"),
        ].concat();

        let stats = listener.run(input.as_bytes()).await?;
        assert_eq!(stats, ListenerStats { received: 5, scrobbled: 2, skipped: 3, failed: 0 });
        assert_eq!(lastfm.submissions().len(), 2);
        assert!(exit_status(&stats).is_ok());
        Ok(())
    }

    #[tokio::test]
    async fn failures_ask_for_redelivery() -> Result<(), ScrobbleError> {
        let lastfm = Arc::new(FakeLastFm::with_tracks(&["Fade Into You"]));
        let listener = listener(lastfm, false).await;

        let stats = listener.run(event_line("AA:BB:CC").as_bytes()).await?;
        assert_eq!(stats.failed, 1);
        assert!(matches!(exit_status(&stats), Err(ScrobbleError::Redeliver(1))));
        Ok(())
    }

    #[tokio::test]
    async fn cancelled_listener_reads_nothing() -> Result<(), ScrobbleError> {
        let lastfm = Arc::new(FakeLastFm::with_tracks(&["Fade Into You"]));
        let listener = listener(lastfm.clone(), true).await;
        listener.shutdown().cancel();

        let stats = listener.run(event_line("AA:BB:CC").as_bytes()).await?;
        assert_eq!(stats.received, 0);
        assert!(lastfm.submissions().is_empty());
        Ok(())
    }

    /// Catalog that stays busy for a moment and remembers the peak overlap
    #[derive(Default)]
    struct SlowCatalog {
        running: AtomicUsize,
        peak: AtomicUsize
    }

    #[async_trait]
    impl LastFmApi for SlowCatalog {
        async fn album_info(&self, _: &str, _: &str) -> Result<AlbumInfoReply, ScrobbleError> {
            let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;
            self.running.fetch_sub(1, Ordering::SeqCst);
            decode_reply(serde_json::json!({ "album": { "tracks": { "track": [] } } }))
        }

        async fn scrobble(&self, _: &[(String, String)]) -> Result<ScrobbleReply, ScrobbleError> {
            Err(ScrobbleError::Http("not expected".into()))
        }
    }

    #[tokio::test]
    async fn in_flight_invocations_are_capped() -> Result<(), ScrobbleError> {
        let store = SqliteAlbumStore::memory(true).await?;
        store.insert_album(None, "AA:BB:CC", "Mazzy Star", "So Tonight That I Might See").await?;
        let catalog = Arc::new(SlowCatalog::default());
        let pipeline = Pipeline::new(&test_config(), Arc::new(store), catalog.clone());
        let listener = Listener::new(Arc::new(pipeline), &ListenerConfig::new(2)?);

        let input = (0..6).map(|_| event_line("AA:BB:CC")).collect::<String>();
        let stats = listener.run(input.as_bytes()).await?;

        assert_eq!(stats.received, 6);
        assert_eq!(stats.skipped, 6);
        assert!(catalog.peak.load(Ordering::SeqCst) <= 2);
        Ok(())
    }
}
