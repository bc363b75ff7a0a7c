use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tchat_core::consumer::PROMPT;
use tchat_core::{
    ChatRecord, ChatSurface, ConsumerConfig, ConsumerExit, ConsumerLoop, FragmentProbe,
    IngestExit, KeyInput, OutgoingSender, Pipeline, PipelineConfig, ProbeError, RawFragment,
    SendError, SessionError, SessionLease, SessionRelease, SurfaceError,
};
use tokio::sync::watch;

const HELLO: &str = r#"<li class="chatbox-message">
  <header class="chatbox-message__header">
    <address class="chatbox-message__address user-tag">
      <a class="user-tag__link" href="/users/alice"><span>alice</span></a>
    </address>
    <time class="chatbox-message__time" datetime="2024-01-01 10:00:00" title="2024-01-01T10:00:00">1 minute ago</time>
  </header>
  <section class="chatbox-message__content">[b]hello[/b] world</section>
</li>"#;

const SYSTEM_NOTICE: &str = r#"<li class="chatbox-message">
  <header><time title="2024-01-01T10:00:01">now</time></header>
  <section class="chatbox-message__content">   </section>
</li>"#;

/// Stands in for the browser: scripted probe batches, recorded sends and a
/// close counter.
#[derive(Default)]
struct FakeChatroom {
    batches: Mutex<VecDeque<Vec<RawFragment>>>,
    sent: Mutex<Vec<String>>,
    closes: AtomicUsize,
}

#[async_trait]
impl FragmentProbe for FakeChatroom {
    async fn poll_new_fragments(&self) -> Result<Vec<RawFragment>, ProbeError> {
        Ok(self.batches.lock().unwrap().pop_front().unwrap_or_default())
    }
}

#[async_trait]
impl OutgoingSender for FakeChatroom {
    async fn send_outgoing(&self, text: &str) -> Result<(), SendError> {
        self.sent.lock().unwrap().push(text.to_string());
        Ok(())
    }
}

#[async_trait]
impl SessionRelease for FakeChatroom {
    async fn close(&self) -> Result<(), SessionError> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Default)]
struct ScreenCapture {
    keys: VecDeque<KeyInput>,
    lines: Vec<String>,
}

impl ChatSurface for ScreenCapture {
    fn draw_input(&mut self, prompt: &str, _buffer: &str) -> Result<(), SurfaceError> {
        assert_eq!(prompt, PROMPT);
        Ok(())
    }

    fn append_line(&mut self, record: &ChatRecord) -> Result<(), SurfaceError> {
        self.lines.push(record.to_string());
        Ok(())
    }

    fn set_status(&mut self, _status: Option<String>) -> Result<(), SurfaceError> {
        Ok(())
    }

    fn refresh(&mut self) -> Result<(), SurfaceError> {
        Ok(())
    }

    fn poll_key(&mut self) -> Result<Option<KeyInput>, SurfaceError> {
        Ok(self.keys.pop_front())
    }
}

#[tokio::test(start_paused = true)]
async fn fragments_flow_from_probe_to_screen() {
    let room = FakeChatroom::default();
    room.batches.lock().unwrap().extend([
        vec![RawFragment::from(HELLO), RawFragment::from(SYSTEM_NOTICE)],
        // The observer may replay a node it already reported.
        vec![RawFragment::from(HELLO)],
    ]);
    let lease = SessionLease::new(room);

    let (ingestor, receiver) = Pipeline::new(PipelineConfig::default()).split();
    let (stop_tx, stop_rx) = watch::channel(false);
    let ingest = tokio::spawn(ingestor.run(lease.clone(), stop_rx.clone()));

    let mut screen = ScreenCapture {
        keys: "gm".chars().map(KeyInput::Char).collect(),
        ..Default::default()
    };
    screen.keys.push_back(KeyInput::Submit);

    let stop_tx = Arc::new(stop_tx);
    let stopper = {
        let stop_tx = stop_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(500)).await;
            let _ = stop_tx.send(true);
        })
    };

    let consumer = ConsumerLoop::new(ConsumerConfig::default(), receiver);
    let report = consumer
        .run(&mut screen, lease.as_ref(), stop_rx)
        .await
        .unwrap();
    stopper.await.unwrap();

    assert_eq!(report.exit, ConsumerExit::Stopped);
    assert_eq!(screen.lines, vec!["[ 10:00:00 ] ( alice ) : HELLO world"]);
    assert_eq!(*lease.session().sent.lock().unwrap(), vec!["gm".to_string()]);

    let ingest = ingest.await.unwrap();
    assert_eq!(ingest.exit, IngestExit::Stopped);
    assert_eq!(ingest.stats.delivered, 1);
    assert_eq!(ingest.stats.duplicates, 1);
    assert_eq!(ingest.stats.empty, 1);

    lease.release("main").await;
    assert_eq!(lease.session().closes.load(Ordering::SeqCst), 1);
}
