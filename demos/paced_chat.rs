//! Paced Chat Demo: streams an assistant answer through the scheduler.
//!
//! By default a simulated backend sends the answer in bursty fragments with
//! irregular gaps, so the difference between network pace and display pace
//! is visible. Pass `--live "message"` to talk to the backend configured via
//! `TRICKLE_API_URL` / `TRICKLE_ACCESS_TOKEN` instead.
//!
//! Pass `--cancel-after <ms>` to stop generating part way through.

use async_trait::async_trait;
use crossterm::{
    execute,
    style::{Color, Print, ResetColor, SetForegroundColor},
};
use futures::StreamExt;
use parking_lot::Mutex;
use std::io::{self, Write};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use trickle::ingest::ByteStream;
use trickle::{
    ChartPayload, ChatRequest, Config, ContextId, HttpTransport, IngestController, IngestError,
    Notice, StreamObserver, Transport,
};

/// Sample answer for the simulated backend.
const SAMPLE_ANSWER: &str = "Sure! Here is a short overview of how paced streaming works.

Fragments arrive from the network whenever the server flushes them. Some are a single \
token, some are whole sentences. Showing them as they land makes the text lurch forward \
in jumps.

Instead, every fragment is appended to a buffer, and a pacing loop reveals a couple of \
characters per frame. Short answers are shown right away; long ones scroll in at a calm, \
readable speed. Charts and other side payloads skip the queue entirely.";

/// Backend stand-in that emits the sample answer in irregular bursts.
struct SimulatedBackend;

#[async_trait]
impl Transport for SimulatedBackend {
    async fn open(&self, _request: &ChatRequest) -> trickle::Result<ByteStream> {
        let mut frames = Vec::new();
        let mut rest = SAMPLE_ANSWER;
        let mut i = 0usize;
        while !rest.is_empty() {
            // Pseudo-random 1-40 characters per fragment
            let take = ((i * 17) % 40) + 1;
            let end = rest
                .char_indices()
                .nth(take)
                .map_or(rest.len(), |(idx, _)| idx);
            let chunk = serde_json::json!({ "chunk": &rest[..end] });
            frames.push((i, format!("data: {chunk}\n\n")));
            rest = &rest[end..];
            i += 1;

            if i == 6 {
                let chart = serde_json::json!({ "chart_data": { "type": "bar", "values": [4, 8, 15] } });
                frames.push((i, format!("data: {chart}\n\n")));
            }
        }
        frames.push((i, "data: {\"done\": true, \"conversation_id\": 1}\n\n".to_string()));

        let stream = futures::stream::iter(frames).then(|(i, frame)| async move {
            // Irregular network gaps: mostly short, sometimes long stalls
            let gap = if i % 9 == 8 { 400 } else { ((i * 31) % 60) as u64 };
            tokio::time::sleep(Duration::from_millis(gap)).await;
            Ok::<_, IngestError>(frame.into_bytes())
        });
        Ok(stream.boxed())
    }
}

/// How a session ended.
enum Outcome {
    Done(Option<ContextId>),
    Failed(Notice),
}

/// Prints newly revealed text as it comes in.
struct TerminalObserver {
    printed: Mutex<usize>,
    outcome: mpsc::UnboundedSender<Outcome>,
}

impl StreamObserver for TerminalObserver {
    fn on_delta(&self, revealed: &str) {
        let mut printed = self.printed.lock();
        if let Some(fresh) = revealed.get(*printed..) {
            let mut stdout = io::stdout();
            let _ = execute!(stdout, SetForegroundColor(Color::Grey), Print(fresh), ResetColor);
            let _ = stdout.flush();
        }
        *printed = revealed.len();
    }

    fn on_done(&self, context: Option<ContextId>) {
        let _ = self.outcome.send(Outcome::Done(context));
    }

    fn on_chart_data(&self, payload: ChartPayload) {
        let _ = execute!(
            io::stdout(),
            SetForegroundColor(Color::Cyan),
            Print(format!("\n[chart] {}\n", payload.value())),
            ResetColor
        );
    }

    fn on_error(&self, error: &IngestError) {
        let _ = self.outcome.send(Outcome::Failed(error.notice()));
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let mut args = std::env::args().skip(1);
    let mut live: Option<String> = None;
    let mut cancel_after: Option<Duration> = None;
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--live" => live = args.next(),
            "--cancel-after" => {
                cancel_after = args.next().and_then(|v| v.parse().ok()).map(Duration::from_millis);
            }
            other => return Err(format!("unknown argument: {other}").into()),
        }
    }

    let config = Config::from_env();
    let (controller, message) = match live {
        Some(message) => (
            IngestController::new(HttpTransport::new(&config.http)?, config.pacing),
            message,
        ),
        None => (
            IngestController::new(SimulatedBackend, config.pacing),
            "How does paced streaming work?".to_string(),
        ),
    };

    let (tx, mut rx) = mpsc::unbounded_channel();
    let observer = Arc::new(TerminalObserver {
        printed: Mutex::new(0),
        outcome: tx,
    });

    execute!(
        io::stdout(),
        SetForegroundColor(Color::Green),
        Print(format!("> {message}\n\n")),
        ResetColor
    )?;

    let started = Instant::now();
    controller.send(ChatRequest::new(message), observer);

    let outcome = match cancel_after {
        Some(delay) => tokio::select! {
            outcome = rx.recv() => outcome,
            () = tokio::time::sleep(delay) => {
                controller.cancel_stream();
                None
            }
        },
        None => rx.recv().await,
    };

    // Let the reveal catch up with what was received
    while !controller.scheduler().is_reveal_complete() && controller.scheduler().is_pacing() {
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    let status = match outcome {
        Some(Outcome::Done(context)) => format!(
            "done in {:.1}s (conversation {})",
            started.elapsed().as_secs_f32(),
            context.map_or_else(|| "-".to_string(), |c| c.to_string())
        ),
        Some(Outcome::Failed(notice)) => format!("failed: {}", notice.message()),
        None => "stopped".to_string(),
    };
    execute!(
        io::stdout(),
        SetForegroundColor(Color::DarkGrey),
        Print(format!("\n\n[{status}]\n")),
        ResetColor
    )?;

    Ok(())
}
