use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Notify;

use mock_exam::error::BackendError;
use mock_exam::infrastructure::{HistoryStore, ManualClock, MemoryHistoryStore};
use mock_exam::models::{ChatMessage, ChatMode, ExamReply, ExamRequest, StudentIdentity};
use mock_exam::render::{PaginatedDocumentBuilder, PrintDocumentComposer, PrintMetadata};
use mock_exam::services::{ExamBackend, LlmExamBackend, TextGenerator};
use mock_exam::workflow::{ExamPhase, ExamSessionController, SendOutcome, Transition};

const START_MS: i64 = 1_700_000_000_000;

/// 按顺序返回预设回复，并记录收到的请求
struct ScriptedBackend {
    replies: Mutex<VecDeque<ExamReply>>,
    requests: Mutex<Vec<ExamRequest>>,
}

impl ScriptedBackend {
    fn new(replies: Vec<ExamReply>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl ExamBackend for ScriptedBackend {
    async fn send(&self, request: &ExamRequest) -> Result<ExamReply, BackendError> {
        self.requests.lock().unwrap().push(request.clone());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| BackendError::MalformedReply("script exhausted".into()))
    }
}

/// 收到通知前一直挂起
struct GatedBackend {
    gate: Arc<Notify>,
    calls: Mutex<usize>,
}

#[async_trait]
impl ExamBackend for GatedBackend {
    async fn send(&self, _request: &ExamRequest) -> Result<ExamReply, BackendError> {
        *self.calls.lock().unwrap() += 1;
        self.gate.notified().await;
        Ok(ExamReply::text("Which subject would you like?"))
    }
}

/// 按顺序返回预设文本
struct ScriptedGenerator(Mutex<VecDeque<String>>);

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn generate(
        &self,
        _system_message: Option<&str>,
        _history: &[ChatMessage],
        _user_message: &str,
    ) -> Result<String, BackendError> {
        self.0
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| BackendError::EmptyContent { model: "scripted".into() })
    }
}

fn controller_with(
    backend: Arc<dyn ExamBackend>,
    clock: &ManualClock,
) -> (ExamSessionController, Arc<MemoryHistoryStore>) {
    let store = Arc::new(MemoryHistoryStore::new());
    let controller = ExamSessionController::new(
        backend,
        store.clone(),
        Arc::new(clock.clone()),
        StudentIdentity::new("Asha", "10", "CBSE"),
        10,
    )
    .unwrap();
    (controller, store)
}

const SCIENCE_PAPER: &str = "CBSE SAMPLE QUESTION PAPER\n\
Subject: Science\n\
Time Allowed: 3 Hours | Maximum Marks: 80\n\
\n\
SECTION A\n\
Q1. What is photosynthesis? [2]\n\
Q2. State Newton's second law of motion. [2]";

#[tokio::test]
async fn test_paper_ready_reply_activates_exam() {
    let clock = ManualClock::new(START_MS + 5_000);
    let backend = ScriptedBackend::new(vec![
        ExamReply::text("Subject detected: Science. Type START EXAM to begin."),
        ExamReply {
            start_time: Some(START_MS),
            paper: Some(SCIENCE_PAPER.to_string()),
            ..Default::default()
        },
    ]);
    let (controller, _) = controller_with(backend.clone(), &clock);

    controller.send("Science", None, None).await;
    assert_eq!(
        controller.snapshot().confirmed_subject.as_deref(),
        Some("Science")
    );

    let outcome = controller.send("START EXAM", None, None).await;
    assert_eq!(outcome, SendOutcome::Applied(Transition::PaperReady));

    let snapshot = controller.snapshot();
    assert_eq!(snapshot.phase, ExamPhase::Active);
    assert_eq!(snapshot.subject.as_deref(), Some("Science"));
    assert_eq!(snapshot.confirmed_subject, None);
    assert_eq!(snapshot.start_ms, Some(START_MS));
    assert_eq!(snapshot.elapsed_seconds, 5);

    // 第二个请求带上了确认的科目，历史不含本条消息
    let requests = backend.requests.lock().unwrap();
    assert_eq!(requests[1].confirmed_subject.as_deref(), Some("Science"));
    assert_eq!(requests[1].sequence, 2);
    assert!(requests[1]
        .history
        .iter()
        .all(|m| m.content != "START EXAM"));
}

#[tokio::test]
async fn test_exam_ended_freezes_score_and_never_rearms() {
    let clock = ManualClock::new(START_MS);
    let backend = ScriptedBackend::new(vec![
        ExamReply {
            start_time: Some(START_MS),
            paper: Some(SCIENCE_PAPER.to_string()),
            ..Default::default()
        },
        ExamReply {
            exam_ended: Some(true),
            reply: Some("Evaluation complete.".into()),
            marks_obtained: Some(62.0),
            total_marks: Some(80.0),
            percentage: Some(78.0),
            ..Default::default()
        },
        ExamReply {
            start_time: Some(START_MS + 99_000),
            paper: Some("Subject: Maths".into()),
            reply: Some("Another paper".into()),
            ..Default::default()
        },
    ]);
    let (controller, store) = controller_with(backend, &clock);

    controller.send("START EXAM", None, None).await;
    clock.advance_secs(1_800);
    assert_eq!(
        controller.send("SUBMIT EXAM", None, None).await,
        SendOutcome::Applied(Transition::Ended)
    );

    let frozen = controller.snapshot();
    let outcome = frozen.outcome.clone().unwrap();
    assert_eq!(outcome.marks_obtained, Some(62.0));
    assert_eq!(outcome.total_marks, Some(80.0));
    assert_eq!(outcome.percentage, Some(78.0));
    assert_eq!(outcome.time_taken, "30 min 0 sec");
    assert!(store.load(ChatMode::Exam).unwrap().is_empty());

    clock.advance_secs(600);
    assert_eq!(
        controller.send("one more?", None, None).await,
        SendOutcome::Applied(Transition::Ignored)
    );

    let after = controller.snapshot();
    assert_eq!(after.phase, ExamPhase::Ended);
    assert_eq!(after.start_ms, Some(START_MS));
    assert_eq!(after.elapsed_seconds, 1_800);
    assert_eq!(after.outcome, frozen.outcome);
    assert_eq!(
        controller.messages().last().unwrap().content,
        "Another paper"
    );
}

#[tokio::test]
async fn test_send_while_in_flight_is_a_no_op() {
    let gate = Arc::new(Notify::new());
    let backend = Arc::new(GatedBackend {
        gate: gate.clone(),
        calls: Mutex::new(0),
    });
    let (controller, _) = controller_with(backend.clone(), &ManualClock::new(0));

    let (first, second) = tokio::join!(controller.send("hello", None, None), async {
        let before = controller.messages().len();
        let outcome = controller.send("are you there?", None, None).await;
        assert!(controller.snapshot().busy);
        assert_eq!(controller.messages().len(), before);
        gate.notify_one();
        outcome
    });

    assert_eq!(second, SendOutcome::Busy);
    assert_eq!(first, SendOutcome::Applied(Transition::Reply));
    assert_eq!(*backend.calls.lock().unwrap(), 1);
    assert!(controller
        .messages()
        .iter()
        .all(|m| m.content != "are you there?"));
    assert!(!controller.snapshot().busy);
}

#[tokio::test]
async fn test_reply_after_reset_is_discarded() {
    let gate = Arc::new(Notify::new());
    let backend = Arc::new(GatedBackend {
        gate: gate.clone(),
        calls: Mutex::new(0),
    });
    let (controller, _) = controller_with(backend, &ManualClock::new(0));
    let old_session = controller.snapshot().session_id;

    let (outcome, _) = tokio::join!(controller.send("hello", None, None), async {
        controller.reset();
        gate.notify_one();
    });

    assert_eq!(outcome, SendOutcome::Stale);
    let snapshot = controller.snapshot();
    assert_ne!(snapshot.session_id, old_session);
    assert_eq!(snapshot.phase, ExamPhase::Greeting);
    assert!(!snapshot.busy);
    assert_eq!(controller.messages().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_no_ticks_after_exam_ends() {
    let clock = ManualClock::new(START_MS);
    let backend = ScriptedBackend::new(Vec::new());
    let (controller, _) = controller_with(backend, &clock);
    let elapsed = controller.subscribe_elapsed();

    controller.on_reply(ExamReply {
        start_time: Some(START_MS),
        paper: Some(SCIENCE_PAPER.to_string()),
        ..Default::default()
    });
    clock.advance_secs(90);
    assert_eq!(controller.snapshot().elapsed_label, "01:30");

    controller.on_reply(ExamReply {
        exam_ended: Some(true),
        reply: Some("Done".into()),
        ..Default::default()
    });
    assert_eq!(*elapsed.borrow(), 90);

    clock.advance_secs(300);
    tokio::time::advance(std::time::Duration::from_secs(5)).await;
    tokio::task::yield_now().await;

    assert_eq!(*elapsed.borrow(), 90);
    assert_eq!(controller.snapshot().elapsed_seconds, 90);
}

#[tokio::test]
async fn test_direct_llm_exam_with_resume_in_new_session() {
    let clock = ManualClock::new(START_MS);
    let generator = Arc::new(ScriptedGenerator(Mutex::new(
        [
            SCIENCE_PAPER,
            "Well attempted.\nMarks Obtained: 50/80\nPercentage: 62.5%",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect(),
    )));
    let backend: Arc<dyn ExamBackend> =
        Arc::new(LlmExamBackend::new(generator, Arc::new(clock.clone())).unwrap());

    let (first, _) = controller_with(backend.clone(), &clock);
    first.send("I would like Science", None, None).await;
    assert_eq!(first.snapshot().phase, ExamPhase::PaperPending);
    assert_eq!(
        first.send("START EXAM", None, None).await,
        SendOutcome::Applied(Transition::PaperReady)
    );

    // 同一学生重新打开程序
    clock.advance_secs(120);
    let (second, _) = controller_with(backend, &clock);
    assert_eq!(
        second.send("hello again", None, None).await,
        SendOutcome::Applied(Transition::Restored)
    );
    let restored = second.snapshot();
    assert!(restored.restored);
    assert_eq!(restored.start_ms, Some(START_MS));
    assert_eq!(restored.elapsed_seconds, 120);
    assert!(second.take_banner().is_some());
    assert!(second.paper().unwrap().contains("SECTION A"));

    clock.advance_secs(480);
    assert_eq!(
        second
            .send("", Some("Q1. Plants make food."), Some(mock_exam::models::UploadKind::Answer))
            .await,
        SendOutcome::Applied(Transition::Ended)
    );
    let outcome = second.snapshot().outcome.unwrap();
    assert_eq!(outcome.marks_obtained, Some(50.0));
    assert_eq!(outcome.total_marks, Some(80.0));
    assert_eq!(outcome.percentage, Some(62.5));
    assert_eq!(outcome.time_taken, "10 min 0 sec");
}

#[test]
fn test_paper_pdf_round_trip() {
    let builder = PaginatedDocumentBuilder::new().unwrap();

    let short = builder.build(SCIENCE_PAPER).unwrap();
    assert_eq!(short.page_count, 1);
    assert!(short.issues.is_empty());
    let doc = lopdf::Document::load_mem(&short.bytes).unwrap();
    assert_eq!(doc.get_pages().len(), 1);

    let long_paper = (1..=120)
        .map(|i| format!("Q{}. Explain the term number {} with a suitable example. [3]", i, i))
        .collect::<Vec<_>>()
        .join("\n");
    let long = builder.build(&long_paper).unwrap();
    assert!(long.page_count > 1);
    let doc = lopdf::Document::load_mem(&long.bytes).unwrap();
    assert_eq!(doc.get_pages().len(), long.page_count);
}

#[test]
fn test_print_document_for_active_paper() {
    let composer = PrintDocumentComposer::new().unwrap();
    let html = composer.compose(
        SCIENCE_PAPER,
        &PrintMetadata {
            subject: "Science".to_string(),
            student: StudentIdentity::new("Asha", "10", "CBSE"),
        },
    );

    assert!(html.contains("Science Question Paper"));
    assert!(html.contains("Time Allowed: 3 Hours"));
    assert!(html.contains("Maximum Marks: 80"));
    assert!(html.contains("<div class=\"section-header\">SECTION A</div>"));
    assert!(html.contains("Newton&#x27;s") || html.contains("Newton's"));
}
