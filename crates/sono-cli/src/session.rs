//! Periodic analysis loop.
//!
//! One tick runs to completion while holding the analyzer lock; the
//! interval skips missed ticks instead of bursting, so ticks never overlap.
//! Cancellation and the analyzer's running flag are only consulted between
//! ticks.

use std::sync::Arc;

use sono_core::{BioacousticAnalyzer, TickOutcome};
use tokio::sync::Mutex;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SessionSummary {
    pub ticks: usize,
    pub analyzed: usize,
    pub cancelled: bool,
}

pub struct Session {
    analyzer: Arc<Mutex<BioacousticAnalyzer>>,
    cancel: CancellationToken,
}

impl Session {
    pub fn new(analyzer: BioacousticAnalyzer) -> Self {
        Self {
            analyzer: Arc::new(Mutex::new(analyzer)),
            cancel: CancellationToken::new(),
        }
    }

    pub fn analyzer(&self) -> Arc<Mutex<BioacousticAnalyzer>> {
        Arc::clone(&self.analyzer)
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Tick until `max_ticks` is reached, the token is cancelled, or
    /// analysis is stopped through the shared analyzer.
    pub async fn run(&self, max_ticks: Option<usize>) -> SessionSummary {
        let period = {
            let mut analyzer = self.analyzer.lock().await;
            if !analyzer.start_analysis() {
                return SessionSummary::default();
            }
            analyzer.update_rate()
        };

        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut summary = SessionSummary::default();

        loop {
            if max_ticks.is_some_and(|max| summary.ticks >= max) {
                break;
            }
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    tracing::info!(ticks = summary.ticks, "analysis session cancelled");
                    summary.cancelled = true;
                    break;
                }
                _ = ticker.tick() => {}
            }

            let mut analyzer = self.analyzer.lock().await;
            if !analyzer.is_analyzing() {
                tracing::debug!("analysis stopped externally");
                break;
            }
            match analyzer.process_frame() {
                TickOutcome::Analyzed => summary.analyzed += 1,
                TickOutcome::WarmingUp { frames, required } => {
                    tracing::debug!(frames, required, "warming up");
                }
            }
            summary.ticks += 1;
        }

        self.analyzer.lock().await.stop_analysis();
        tracing::info!(
            ticks = summary.ticks,
            analyzed = summary.analyzed,
            "analysis session finished"
        );
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use sono_core::{AnalyzerConfig, ChirpSource, PipelineConfig};

    fn analyzer() -> BioacousticAnalyzer {
        let config = AnalyzerConfig {
            pipeline: PipelineConfig {
                sample_rate: 8000.0,
                fft_size: 256,
                num_mel_bins: 16,
                max_frames: 20,
                smoothing: 0.3,
            },
            warmup_frames: 3,
            max_homology_points: 32,
            ..Default::default()
        };
        let mut a = BioacousticAnalyzer::new(config);
        a.connect(Box::new(ChirpSource::new(8000.0, 500.0, 3000.0, 0.5)));
        a
    }

    #[tokio::test(start_paused = true)]
    async fn test_runs_requested_ticks() {
        let session = Session::new(analyzer());
        let summary = session.run(Some(8)).await;
        assert_eq!(summary.ticks, 8);
        // Frames 3..=8 are past warm-up.
        assert_eq!(summary.analyzed, 6);
        assert!(!summary.cancelled);

        let a = session.analyzer();
        let a = a.lock().await;
        assert!(!a.is_analyzing());
        assert!(a.current_analysis().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_before_start() {
        let session = Session::new(analyzer());
        session.cancel_token().cancel();
        let summary = session.run(None).await;
        assert_eq!(summary.ticks, 0);
        assert!(summary.cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_between_ticks() {
        let session = Arc::new(Session::new(analyzer()));
        let token = session.cancel_token();
        let runner = {
            let session = Arc::clone(&session);
            tokio::spawn(async move { session.run(None).await })
        };

        // Ticks fire at 0, 100, 200 and 300 ms.
        tokio::time::sleep(Duration::from_millis(350)).await;
        token.cancel();
        let summary = runner.await.unwrap();
        assert!(summary.cancelled);
        assert!((1..=5).contains(&summary.ticks), "ticks {}", summary.ticks);
    }

    #[tokio::test(start_paused = true)]
    async fn test_external_stop_ends_session() {
        let session = Arc::new(Session::new(analyzer()));
        let shared = session.analyzer();
        let runner = {
            let session = Arc::clone(&session);
            tokio::spawn(async move { session.run(None).await })
        };

        tokio::time::sleep(Duration::from_millis(250)).await;
        shared.lock().await.stop_analysis();
        let summary = runner.await.unwrap();
        assert!(!summary.cancelled);
        assert!(summary.ticks >= 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_run_while_running_is_refused() {
        let session = Session::new(analyzer());
        session.analyzer().lock().await.start_analysis();
        let summary = session.run(Some(5)).await;
        assert_eq!(summary, SessionSummary::default());
    }
}
