//! 考试会话流程 - 流程层
//!
//! 核心职责：把与协作服务的自由对话变成有状态、可恢复、可评分的考试
//!
//! 状态转换：
//! 1. Greeting → AwaitingSubject（第一条普通回复）
//! 2. AwaitingSubject → PaperPending（回复中确认了科目）
//! 3. Greeting → Resuming → Active（恢复信号）
//! 4. * → Active（试卷就绪信号）
//! 5. * → Ended（结束信号，终态）
//!
//! 同一时间最多一个请求在途；重置后旧请求的回复被丢弃。

use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::error::AppError;
use crate::infrastructure::{Clock, ExamTimer, HistoryStore};
use crate::models::{
    ChatMessage, ChatMode, ExamReply, ExamRequest, StudentIdentity, Subject, UploadKind,
};
use crate::services::{ExamBackend, Signal, SignalExtractor, START_TRIGGER};
use crate::utils::{elapsed_label, time_taken_label, truncate_text};
use crate::workflow::exam_state::{ActiveExam, ExamOutcome, ExamPhase, ExamState, ScoreFields};

/// 本流程使用的对话模式
const MODE: ChatMode = ChatMode::Exam;

const PAPER_READY_MESSAGE: &str =
    "📝 Your question paper is ready and the timer has started. Good luck!";
const RESTORED_MESSAGE: &str = "🔄 Welcome back! Your exam is still in progress.";
const RESTORED_BANNER: &str = "Exam restored. Your timer continues from where you left off.";
const SUBMITTED_MESSAGE: &str = "✅ Your exam has been submitted.";
const APOLOGY_MESSAGE: &str =
    "Sorry, I could not reach the exam service just now. Please try again.";

/// 一次 `send` 的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// 文本和上传内容都为空
    Empty,
    /// 已有请求在途，本次被丢弃
    Busy,
    /// 回复已应用
    Applied(Transition),
    /// 请求失败，已追加致歉消息
    Failed,
    /// 回复属于重置前的会话，已丢弃
    Stale,
}

/// 一条回复带来的变化
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Restored,
    PaperReady,
    Ended,
    Reply,
    /// 信号与当前状态不符，只追加了文本
    Ignored,
}

/// 给界面使用的只读快照
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub phase: ExamPhase,
    pub session_id: String,
    pub subject: Option<String>,
    pub confirmed_subject: Option<String>,
    pub start_ms: Option<i64>,
    pub elapsed_seconds: u64,
    pub elapsed_label: String,
    pub busy: bool,
    pub restored: bool,
    pub message_count: usize,
    pub outcome: Option<ExamOutcome>,
}

/// 会话数据，只由控制器修改
struct Session {
    session_id: String,
    /// 每次重置加一
    epoch: u64,
    next_sequence: u64,
    in_flight: Option<u64>,
    state: ExamState,
    confirmed_subject: Option<String>,
    messages: Vec<ChatMessage>,
    banner: Option<String>,
}

/// 考试会话控制器
///
/// - 持有会话标识、计时器和消息历史
/// - 通过 `ExamBackend` 与协作服务交互
/// - 通过 `SignalExtractor` 解读回复并驱动状态转换
pub struct ExamSessionController {
    backend: Arc<dyn ExamBackend>,
    store: Arc<dyn HistoryStore>,
    clock: Arc<dyn Clock>,
    extractor: SignalExtractor,
    identity: StudentIdentity,
    history_window: usize,
    elapsed_tx: Arc<watch::Sender<u64>>,
    session: Mutex<Session>,
}

impl ExamSessionController {
    /// 创建控制器并初始化一个新会话
    pub fn new(
        backend: Arc<dyn ExamBackend>,
        store: Arc<dyn HistoryStore>,
        clock: Arc<dyn Clock>,
        identity: StudentIdentity,
        history_window: usize,
    ) -> Result<Self, AppError> {
        let (elapsed_tx, _) = watch::channel(0);
        let controller = Self {
            backend,
            store,
            clock,
            extractor: SignalExtractor::new()?,
            identity,
            history_window,
            elapsed_tx: Arc::new(elapsed_tx),
            session: Mutex::new(Session {
                session_id: String::new(),
                epoch: 0,
                next_sequence: 0,
                in_flight: None,
                state: ExamState::Greeting,
                confirmed_subject: None,
                messages: Vec::new(),
                banner: None,
            }),
        };

        {
            let mut session = controller.lock();
            controller.initialize(&mut session);
        }
        Ok(controller)
    }

    fn lock(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// 丢弃本地存储，生成新的会话标识并发出问候语
    fn initialize(&self, session: &mut Session) {
        if let Err(e) = self.store.clear(MODE) {
            warn!("⚠️ 清理本地历史失败: {}", e);
        }
        if let Err(e) = self.store.clear_session_id(MODE) {
            warn!("⚠️ 清理会话标识失败: {}", e);
        }

        session.session_id = uuid::Uuid::new_v4().to_string();
        if let Err(e) = self.store.save_session_id(MODE, &session.session_id) {
            warn!("⚠️ 保存会话标识失败: {}", e);
        }

        // 旧状态中的计时器随 drop 停止
        session.state = ExamState::Greeting;
        session.in_flight = None;
        session.confirmed_subject = None;
        session.banner = None;
        session.messages = vec![ChatMessage::assistant(self.greeting())];
        self.elapsed_tx.send_replace(0);
        self.persist(session);

        info!("🆕 新考试会话: {}", session.session_id);
    }

    fn greeting(&self) -> String {
        let name = self.identity.name.trim();
        let hello = if name.is_empty() {
            "👋 Hello!".to_string()
        } else {
            format!("👋 Hello {}!", name)
        };
        format!(
            "{} I am your exam invigilator.\n\nAvailable subjects: {}.\n\n\
             Tell me which subject you want, then type **{}** to receive your question paper. \
             The timer starts as soon as the paper arrives.",
            hello,
            Subject::catalogue(),
            START_TRIGGER
        )
    }

    /// 丢弃当前会话，重新开始
    pub fn reset(&self) {
        let mut session = self.lock();
        session.epoch += 1;
        info!("♻️ 重置考试会话 (epoch {})", session.epoch);
        self.initialize(&mut session);
    }

    /// 发送一条用户消息
    ///
    /// # 参数
    /// - `text`: 用户输入
    /// - `uploaded_text`: 上传文件的文本内容
    /// - `upload_kind`: 上传的是大纲还是答题卡
    ///
    /// # 返回
    /// 文本和上传都为空、或已有请求在途时不做任何事
    pub async fn send(
        &self,
        text: &str,
        uploaded_text: Option<&str>,
        upload_kind: Option<UploadKind>,
    ) -> SendOutcome {
        let text = text.trim();
        let uploaded = uploaded_text.map(str::trim).filter(|t| !t.is_empty());
        if text.is_empty() && uploaded.is_none() {
            return SendOutcome::Empty;
        }

        let (request, epoch) = {
            let mut session = self.lock();
            if session.in_flight.is_some() {
                debug!("已有请求在途，忽略本次发送");
                return SendOutcome::Busy;
            }

            let history = self.request_history(&session);
            session.next_sequence += 1;
            let sequence = session.next_sequence;
            session.in_flight = Some(sequence);

            let kind = uploaded.and(upload_kind);
            let content = match kind {
                Some(kind) if text.is_empty() => kind.marker().to_string(),
                Some(kind) => format!("{}\n{}", text, kind.marker()),
                None => text.to_string(),
            };
            session.messages.push(ChatMessage::user(content));
            self.persist(&session);

            let request = ExamRequest {
                mode: MODE,
                message: text.to_string(),
                uploaded_text: uploaded.map(str::to_string),
                upload_kind: kind,
                history,
                confirmed_subject: session.confirmed_subject.clone(),
                student_name: self.identity.name.clone(),
                student_class: self.identity.class.clone(),
                board: self.identity.board.clone(),
                session_id: session.session_id.clone(),
                sequence,
            };
            (request, session.epoch)
        };

        debug!(
            "📤 发送请求 #{}: {}",
            request.sequence,
            truncate_text(&request.message, 60)
        );
        let result = self.backend.send(&request).await;

        let mut session = self.lock();
        if session.epoch != epoch || session.in_flight != Some(request.sequence) {
            info!("🗑️ 丢弃过期回复 #{}", request.sequence);
            return SendOutcome::Stale;
        }
        session.in_flight = None;

        match result {
            Ok(reply) => SendOutcome::Applied(self.apply_reply(&mut session, reply)),
            Err(e) => {
                warn!("❌ 协作服务调用失败: {}", e);
                session.messages.push(ChatMessage::assistant(APOLOGY_MESSAGE));
                self.persist(&session);
                SendOutcome::Failed
            }
        }
    }

    /// 直接应用一条回复（不经过网络）
    ///
    /// 可以在 tokio 运行时之外调用，此时计时器不推送 tick，但已用时间照常计算
    pub fn on_reply(&self, reply: ExamReply) -> Transition {
        let mut session = self.lock();
        self.apply_reply(&mut session, reply)
    }

    /// 最近 N 条历史（不含本条消息），去掉上传标记
    fn request_history(&self, session: &Session) -> Vec<ChatMessage> {
        let start = session.messages.len().saturating_sub(self.history_window);
        session.messages[start..]
            .iter()
            .map(ChatMessage::without_upload_markers)
            .collect()
    }

    fn apply_reply(&self, session: &mut Session, reply: ExamReply) -> Transition {
        let signal = Signal::classify(reply);

        // 结束后只追加文本，不再改变状态
        if matches!(session.state, ExamState::Ended(_)) {
            let text = match signal {
                Signal::Resume { reply, .. } | Signal::PaperReady { reply, .. } => {
                    reply.unwrap_or_default()
                }
                Signal::Ended { reply, .. } | Signal::Plain { reply } => reply,
            };
            debug!("考试已结束，忽略回复中的信号");
            self.append_reply(session, text);
            return Transition::Ignored;
        }

        match signal {
            Signal::Resume {
                start_ms,
                paper,
                subject,
                reply,
            } => self.arm(session, start_ms, paper, subject, reply, true),
            Signal::PaperReady {
                start_ms,
                paper,
                subject,
                reply,
            } => self.arm(session, start_ms, paper, subject, reply, false),
            Signal::Ended {
                reply,
                marks_obtained,
                total_marks,
                percentage,
                time_taken,
            } => {
                let score = ScoreFields {
                    marks_obtained,
                    total_marks,
                    percentage,
                };
                self.finish(session, reply, score, time_taken)
            }
            Signal::Plain { reply } => self.plain(session, reply),
        }
    }

    /// 处理恢复 / 试卷就绪
    fn arm(
        &self,
        session: &mut Session,
        start_ms: i64,
        paper: Option<String>,
        subject: Option<String>,
        reply: Option<String>,
        resume: bool,
    ) -> Transition {
        if matches!(session.state, ExamState::Active(_)) {
            warn!("⚠️ 考试已在进行，保留原开始时间");
            self.append_reply(session, reply.unwrap_or_default());
            return Transition::Ignored;
        }

        // 没有试卷不能开始计时
        let Some(paper) = paper.or_else(|| reply.clone()) else {
            warn!("⚠️ 开始信号中没有试卷，按普通回复处理");
            return self.plain(session, String::new());
        };

        let restored = resume && matches!(session.state, ExamState::Greeting);
        if restored {
            session.state = ExamState::Resuming;
            debug!("状态: {}", session.state.phase());
        }

        // 试卷中的科目优先，其次是回复字段，最后才是确认提示
        let subject = self
            .extractor
            .paper_subject(&paper)
            .or(subject)
            .or_else(|| session.confirmed_subject.clone());
        session.confirmed_subject = None;

        let mut timer = ExamTimer::new(Arc::clone(&self.clock), Arc::clone(&self.elapsed_tx));
        timer.start(start_ms);
        info!(
            "{} 考试开始: {} (开始时间 {})",
            if restored { "🔄" } else { "⏱️" },
            subject.as_deref().unwrap_or("未知科目"),
            start_ms
        );

        session.state = ExamState::Active(ActiveExam {
            timer,
            paper,
            subject,
            restored,
        });

        let default_message = if resume {
            RESTORED_MESSAGE
        } else {
            PAPER_READY_MESSAGE
        };
        self.append_reply(
            session,
            reply.unwrap_or_else(|| default_message.to_string()),
        );

        if restored {
            session.banner = Some(RESTORED_BANNER.to_string());
            Transition::Restored
        } else {
            Transition::PaperReady
        }
    }

    /// 处理结束信号
    fn finish(
        &self,
        session: &mut Session,
        reply: String,
        score: ScoreFields,
        time_taken: Option<String>,
    ) -> Transition {
        let outcome = match std::mem::take(&mut session.state) {
            ExamState::Active(exam) => exam.finish(score, time_taken),
            _ => {
                warn!("⚠️ 考试未开始就收到结束信号");
                ExamOutcome {
                    paper: None,
                    subject: None,
                    start_ms: None,
                    elapsed_seconds: 0,
                    marks_obtained: score.marks_obtained,
                    total_marks: score.total_marks,
                    percentage: score.percentage,
                    time_taken: time_taken.unwrap_or_else(|| time_taken_label(0)),
                }
            }
        };
        self.elapsed_tx.send_replace(outcome.elapsed_seconds);

        let reply = if reply.trim().is_empty() {
            SUBMITTED_MESSAGE.to_string()
        } else {
            reply
        };
        session
            .messages
            .push(ChatMessage::assistant(format!(
                "{}\n\n⏱️ Time taken: {}",
                reply, outcome.time_taken
            )));

        info!(
            "🏁 考试结束: {}/{} ({}%), 用时 {}",
            fmt_mark(outcome.marks_obtained),
            fmt_mark(outcome.total_marks),
            fmt_mark(outcome.percentage),
            outcome.time_taken
        );

        session.confirmed_subject = None;
        session.state = ExamState::Ended(outcome);

        if let Err(e) = self.store.clear(MODE) {
            warn!("⚠️ 清理本地历史失败: {}", e);
        }
        if let Err(e) = self.store.clear_session_id(MODE) {
            warn!("⚠️ 清理会话标识失败: {}", e);
        }
        Transition::Ended
    }

    /// 处理普通回复
    fn plain(&self, session: &mut Session, reply: String) -> Transition {
        if let Some(subject) = self.extractor.confirmed_subject(&reply) {
            debug!("确认科目: {}", subject);
            session.confirmed_subject = Some(subject);
            if session.state.is_before_start() {
                session.state = ExamState::PaperPending;
            }
        } else if matches!(session.state, ExamState::Greeting) {
            session.state = ExamState::AwaitingSubject;
        }

        self.append_reply(session, reply);
        Transition::Reply
    }

    fn append_reply(&self, session: &mut Session, reply: String) {
        if reply.trim().is_empty() {
            warn!("⚠️ 协作服务返回了空回复");
            return;
        }
        session.messages.push(ChatMessage::assistant(reply));
        if !matches!(session.state, ExamState::Ended(_)) {
            self.persist(session);
        }
    }

    fn persist(&self, session: &Session) {
        if let Err(e) = self.store.save(MODE, &session.messages) {
            warn!("⚠️ 保存本地历史失败: {}", e);
        }
    }

    // ========== 查询 ==========

    pub fn snapshot(&self) -> SessionSnapshot {
        let session = self.lock();
        let (subject, start_ms, elapsed_seconds, restored, outcome) = match &session.state {
            ExamState::Active(exam) => (
                exam.subject.clone(),
                exam.start_ms(),
                exam.elapsed_seconds(),
                exam.restored,
                None,
            ),
            ExamState::Ended(outcome) => (
                outcome.subject.clone(),
                outcome.start_ms,
                outcome.elapsed_seconds,
                false,
                Some(outcome.clone()),
            ),
            _ => (None, None, 0, false, None),
        };

        SessionSnapshot {
            phase: session.state.phase(),
            session_id: session.session_id.clone(),
            subject,
            confirmed_subject: session.confirmed_subject.clone(),
            start_ms,
            elapsed_seconds,
            elapsed_label: elapsed_label(elapsed_seconds),
            busy: session.in_flight.is_some(),
            restored,
            message_count: session.messages.len(),
            outcome,
        }
    }

    pub fn messages(&self) -> Vec<ChatMessage> {
        self.lock().messages.clone()
    }

    /// 当前（或刚结束的）试卷
    pub fn paper(&self) -> Option<String> {
        match &self.lock().state {
            ExamState::Active(exam) => Some(exam.paper.clone()),
            ExamState::Ended(outcome) => outcome.paper.clone(),
            _ => None,
        }
    }

    /// 取走一次性的"已恢复"提示
    pub fn take_banner(&self) -> Option<String> {
        self.lock().banner.take()
    }

    pub fn identity(&self) -> &StudentIdentity {
        &self.identity
    }

    /// 订阅计时器推送的已用秒数
    pub fn subscribe_elapsed(&self) -> watch::Receiver<u64> {
        self.elapsed_tx.subscribe()
    }
}

fn fmt_mark(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "-".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BackendError;
    use crate::infrastructure::{ManualClock, MemoryHistoryStore};
    use async_trait::async_trait;

    /// 总是返回同一条回复
    struct FixedBackend(Result<ExamReply, ()>);

    #[async_trait]
    impl ExamBackend for FixedBackend {
        async fn send(&self, _request: &ExamRequest) -> Result<ExamReply, BackendError> {
            self.0
                .clone()
                .map_err(|_| BackendError::MalformedReply("boom".into()))
        }
    }

    fn controller(
        reply: Result<ExamReply, ()>,
    ) -> (ExamSessionController, Arc<MemoryHistoryStore>) {
        let store = Arc::new(MemoryHistoryStore::new());
        let controller = ExamSessionController::new(
            Arc::new(FixedBackend(reply)),
            store.clone(),
            Arc::new(ManualClock::new(1_700_000_060_000)),
            StudentIdentity::new("Asha", "10", "CBSE"),
            10,
        )
        .unwrap();
        (controller, store)
    }

    #[tokio::test]
    async fn test_initialize_greets_and_clears_store() {
        let store = Arc::new(MemoryHistoryStore::new());
        store
            .save(ChatMode::Exam, &[ChatMessage::user("old")])
            .unwrap();
        let controller = ExamSessionController::new(
            Arc::new(FixedBackend(Ok(ExamReply::text("hi")))),
            store.clone(),
            Arc::new(ManualClock::new(0)),
            StudentIdentity::default(),
            10,
        )
        .unwrap();

        let messages = controller.messages();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].content.contains(START_TRIGGER));
        assert!(messages[0].content.contains("Social Science"));
        assert_eq!(store.load(ChatMode::Exam).unwrap(), messages);
        assert_eq!(
            store.load_session_id(ChatMode::Exam).unwrap(),
            Some(controller.snapshot().session_id)
        );
        assert_eq!(controller.snapshot().phase, ExamPhase::Greeting);
    }

    #[tokio::test]
    async fn test_empty_send_is_rejected() {
        let (controller, _) = controller(Ok(ExamReply::text("hi")));
        assert_eq!(controller.send("  ", None, None).await, SendOutcome::Empty);
        assert_eq!(controller.messages().len(), 1);
    }

    #[tokio::test]
    async fn test_plain_reply_confirms_subject() {
        let (controller, _) = controller(Ok(ExamReply::text(
            "Subject detected: Science. Type START EXAM to begin.",
        )));

        let outcome = controller.send("science please", None, None).await;
        assert_eq!(outcome, SendOutcome::Applied(Transition::Reply));

        let snapshot = controller.snapshot();
        assert_eq!(snapshot.phase, ExamPhase::PaperPending);
        assert_eq!(snapshot.confirmed_subject.as_deref(), Some("Science"));
        assert_eq!(snapshot.message_count, 3);
    }

    #[tokio::test]
    async fn test_failure_appends_apology_and_keeps_state() {
        let (controller, _) = controller(Err(()));

        assert_eq!(controller.send("hello", None, None).await, SendOutcome::Failed);
        let messages = controller.messages();
        assert_eq!(messages.last().unwrap().content, APOLOGY_MESSAGE);
        assert!(!controller.snapshot().busy);
        assert_eq!(controller.snapshot().phase, ExamPhase::Greeting);

        // 锁已释放，可以再次发送
        assert_eq!(controller.send("again", None, None).await, SendOutcome::Failed);
    }

    #[tokio::test]
    async fn test_upload_marker_kept_locally_but_stripped_from_history() {
        let (controller, _) = controller(Ok(ExamReply::text("ok")));
        controller
            .send("my syllabus", Some("Chapter 1: Motion"), Some(UploadKind::Syllabus))
            .await;

        let messages = controller.messages();
        assert!(messages[1].content.ends_with(UploadKind::Syllabus.marker()));

        let session = controller.lock();
        let history = controller.request_history(&session);
        assert_eq!(history[1].content, "my syllabus");
    }

    #[tokio::test]
    async fn test_paper_ready_then_repeat_keeps_start() {
        let (controller, _) = controller(Ok(ExamReply::text("unused")));
        controller.on_reply(ExamReply::text("Subject detected: Hindi"));

        let first = ExamReply {
            start_time: Some(1_700_000_000_000),
            paper: Some("Subject: Science\nSECTION A".into()),
            ..Default::default()
        };
        assert_eq!(controller.on_reply(first), Transition::PaperReady);

        let snapshot = controller.snapshot();
        assert_eq!(snapshot.phase, ExamPhase::Active);
        assert_eq!(snapshot.subject.as_deref(), Some("Science"));
        assert_eq!(snapshot.confirmed_subject, None);
        assert_eq!(snapshot.elapsed_seconds, 60);
        assert_eq!(
            controller.messages().last().unwrap().content,
            PAPER_READY_MESSAGE
        );

        let second = ExamReply {
            start_time: Some(1_700_000_050_000),
            paper: Some("Subject: Maths".into()),
            ..Default::default()
        };
        assert_eq!(controller.on_reply(second), Transition::Ignored);
        assert_eq!(controller.snapshot().start_ms, Some(1_700_000_000_000));
        assert!(controller.paper().unwrap().contains("Science"));
    }

    #[test]
    fn test_paper_ready_outside_runtime() {
        let (controller, _) = controller(Ok(ExamReply::text("unused")));
        let reply = ExamReply {
            start_time: Some(1_700_000_000_000),
            paper: Some("Subject: Science\nSECTION A".into()),
            ..Default::default()
        };

        assert_eq!(controller.on_reply(reply), Transition::PaperReady);
        let snapshot = controller.snapshot();
        assert_eq!(snapshot.phase, ExamPhase::Active);
        assert_eq!(snapshot.elapsed_seconds, 60);
    }

    #[tokio::test]
    async fn test_start_without_paper_is_a_plain_reply() {
        let (controller, _) = controller(Ok(ExamReply::text("unused")));
        let reply = ExamReply {
            start_time: Some(1),
            ..Default::default()
        };
        assert_eq!(controller.on_reply(reply), Transition::Reply);
        assert_eq!(controller.snapshot().start_ms, None);
    }

    #[tokio::test]
    async fn test_resume_from_greeting_sets_banner_once() {
        let (controller, _) = controller(Ok(ExamReply::text("unused")));
        let reply = ExamReply {
            resume_exam: Some(true),
            start_time: Some(1_700_000_000_000),
            question_paper: Some("Subject: English\nSECTION A".into()),
            ..Default::default()
        };

        assert_eq!(controller.on_reply(reply), Transition::Restored);
        let snapshot = controller.snapshot();
        assert!(snapshot.restored);
        assert_eq!(snapshot.subject.as_deref(), Some("English"));
        assert_eq!(controller.take_banner().as_deref(), Some(RESTORED_BANNER));
        assert_eq!(controller.take_banner(), None);
    }

    #[tokio::test]
    async fn test_end_freezes_outcome_and_clears_store() {
        let (controller, store) = controller(Ok(ExamReply::text("unused")));
        controller.on_reply(ExamReply {
            start_time: Some(1_700_000_000_000),
            paper: Some("Subject: Science".into()),
            ..Default::default()
        });

        let ended = ExamReply {
            exam_ended: Some(true),
            reply: Some("Well done".into()),
            marks_obtained: Some(62.0),
            total_marks: Some(80.0),
            percentage: Some(78.0),
            ..Default::default()
        };
        assert_eq!(controller.on_reply(ended), Transition::Ended);

        let snapshot = controller.snapshot();
        let outcome = snapshot.outcome.unwrap();
        assert_eq!(snapshot.phase, ExamPhase::Ended);
        assert_eq!(outcome.marks_obtained, Some(62.0));
        assert_eq!(outcome.time_taken, "1 min 0 sec");
        assert!(controller
            .messages()
            .last()
            .unwrap()
            .content
            .ends_with("⏱️ Time taken: 1 min 0 sec"));
        assert!(store.load(ChatMode::Exam).unwrap().is_empty());
        assert_eq!(store.load_session_id(ChatMode::Exam).unwrap(), None);

        // 结束后的开始信号不再生效
        let late = ExamReply {
            start_time: Some(1),
            paper: Some("Subject: Maths".into()),
            reply: Some("late".into()),
            ..Default::default()
        };
        assert_eq!(controller.on_reply(late), Transition::Ignored);
        assert_eq!(controller.snapshot().phase, ExamPhase::Ended);
        assert_eq!(controller.messages().last().unwrap().content, "late");
    }

    #[tokio::test]
    async fn test_collaborator_time_taken_wins() {
        let (controller, _) = controller(Ok(ExamReply::text("unused")));
        controller.on_reply(ExamReply {
            start_time: Some(1_700_000_000_000),
            paper: Some("Subject: Science".into()),
            ..Default::default()
        });
        controller.on_reply(ExamReply {
            exam_ended: Some(true),
            time_taken: Some("45 minutes".into()),
            ..Default::default()
        });

        let outcome = controller.snapshot().outcome.unwrap();
        assert_eq!(outcome.time_taken, "45 minutes");
        assert_eq!(outcome.elapsed_seconds, 60);
    }

    #[tokio::test]
    async fn test_reset_starts_new_session() {
        let (controller, _) = controller(Ok(ExamReply::text("unused")));
        let before = controller.snapshot().session_id;
        controller.on_reply(ExamReply {
            start_time: Some(1_700_000_000_000),
            paper: Some("Subject: Science".into()),
            ..Default::default()
        });

        controller.reset();
        let snapshot = controller.snapshot();
        assert_ne!(snapshot.session_id, before);
        assert_eq!(snapshot.phase, ExamPhase::Greeting);
        assert_eq!(snapshot.start_ms, None);
        assert_eq!(controller.messages().len(), 1);
    }
}
