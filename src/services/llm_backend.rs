//! 直连 LLM 的考试协作服务
//!
//! 自己扮演监考老师，按 `ExamReply` 的四种形态作答：
//! - 同一学生换了会话标识 → 恢复考试
//! - `START EXAM` 且科目已知 → 生成试卷并开始计时
//! - 上传答题卡或 `SUBMIT EXAM` → 批改并结束考试
//! - 其他 → 普通对话

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::error::BackendError;
use crate::infrastructure::timer::elapsed_between;
use crate::infrastructure::Clock;
use crate::models::{ExamReply, ExamRequest, Role, StudentIdentity, Subject, UploadKind};
use crate::services::exam_backend::ExamBackend;
use crate::services::llm_service::TextGenerator;
use crate::services::signal_extractor::{SignalExtractor, START_TRIGGER, SUBMIT_TRIGGER};
use crate::utils::{time_taken_label, truncate_text};

/// 进行中的考试
#[derive(Debug, Clone)]
struct ActiveRecord {
    session_id: String,
    subject: String,
    paper: String,
    start_ms: i64,
}

/// 直连 LLM 的协作服务
pub struct LlmExamBackend {
    generator: Arc<dyn TextGenerator>,
    clock: Arc<dyn Clock>,
    extractor: SignalExtractor,
    /// 身份键 → 进行中的考试
    active: Mutex<HashMap<String, ActiveRecord>>,
    /// 会话标识 → 上传的大纲
    syllabi: Mutex<HashMap<String, String>>,
    /// 身份键 → 已交卷的会话标识
    ended: Mutex<HashMap<String, String>>,
}

impl LlmExamBackend {
    pub fn new(
        generator: Arc<dyn TextGenerator>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, regex::Error> {
        Ok(Self {
            generator,
            clock,
            extractor: SignalExtractor::new()?,
            active: Mutex::new(HashMap::new()),
            syllabi: Mutex::new(HashMap::new()),
            ended: Mutex::new(HashMap::new()),
        })
    }

    /// 没有身份信息的学生按会话区分，避免互相恢复
    fn registry_key(request: &ExamRequest) -> String {
        let identity = request.identity();
        if identity.is_empty() {
            format!("session:{}", request.session_id)
        } else {
            identity.key()
        }
    }

    fn active_record(&self, key: &str) -> Option<ActiveRecord> {
        let active = self.active.lock().unwrap_or_else(|e| e.into_inner());
        active.get(key).cloned()
    }

    /// 同一学生用新的会话标识回来了
    fn try_resume(&self, key: &str, session_id: &str) -> Option<ExamReply> {
        let mut active = self.active.lock().unwrap_or_else(|e| e.into_inner());
        let record = active.get_mut(key)?;
        if record.session_id == session_id {
            return None;
        }
        info!("🔄 恢复进行中的 {} 考试", record.subject);
        let superseded = std::mem::replace(&mut record.session_id, session_id.to_string());
        self.forget_syllabus(&superseded);
        Some(ExamReply {
            reply: Some(format!(
                "Welcome back! Your {} exam is still in progress and the timer kept running. \
                 Type {} or upload your answer sheet when you are done.",
                record.subject, SUBMIT_TRIGGER
            )),
            resume_exam: Some(true),
            start_time: Some(record.start_ms),
            subject: Some(record.subject.clone()),
            question_paper: Some(record.paper.clone()),
            ..Default::default()
        })
    }

    /// 这个会话已经交过卷
    fn has_ended(&self, key: &str, session_id: &str) -> bool {
        let ended = self.ended.lock().unwrap_or_else(|e| e.into_inner());
        ended.get(key).is_some_and(|id| id == session_id)
    }

    fn forget_syllabus(&self, session_id: &str) {
        let mut syllabi = self.syllabi.lock().unwrap_or_else(|e| e.into_inner());
        syllabi.remove(session_id);
    }

    /// 科目来源：确认的提示 → 本条消息 → 最近的用户消息
    fn resolve_subject(request: &ExamRequest) -> Option<String> {
        if let Some(hint) = request
            .confirmed_subject
            .as_deref()
            .filter(|s| !s.trim().is_empty())
        {
            return Some(hint.trim().to_string());
        }
        Subject::find(&request.message)
            .or_else(|| {
                request
                    .history
                    .iter()
                    .rev()
                    .filter(|m| m.role == Role::User)
                    .find_map(|m| Subject::find(&m.content))
            })
            .map(|s| s.name().to_string())
    }

    async fn start_exam(
        &self,
        key: String,
        request: &ExamRequest,
    ) -> Result<ExamReply, BackendError> {
        let Some(subject) = Self::resolve_subject(request) else {
            return Ok(ExamReply::text(format!(
                "Before we start, please tell me which subject you want to be examined on. \
                 Available subjects: {}.",
                Subject::catalogue()
            )));
        };

        info!("📝 生成 {} 试卷", subject);
        let syllabus = {
            let syllabi = self.syllabi.lock().unwrap_or_else(|e| e.into_inner());
            syllabi.get(&request.session_id).cloned()
        };
        let prompt = build_paper_prompt(&subject, &request.identity(), syllabus.as_deref());
        let mut paper = self
            .generator
            .generate(Some(PAPER_SYSTEM_PROMPT), &[], &prompt)
            .await?;

        if !self.extractor.looks_like_paper(&paper) {
            warn!("⚠️ 生成的试卷缺少标准卷头: {}", truncate_text(&paper, 80));
        }
        if self.extractor.paper_subject(&paper).is_none() {
            paper = format!("Subject: {}\n{}", subject, paper);
        }

        let start_ms = self.clock.now_millis();
        {
            let mut active = self.active.lock().unwrap_or_else(|e| e.into_inner());
            active.insert(
                key,
                ActiveRecord {
                    session_id: request.session_id.clone(),
                    subject: subject.clone(),
                    paper: paper.clone(),
                    start_ms,
                },
            );
        }

        Ok(ExamReply {
            reply: Some(format!(
                "Your {} question paper is ready and the timer has started. \
                 Type {} or upload your answer sheet when you have finished.",
                subject, SUBMIT_TRIGGER
            )),
            start_time: Some(start_ms),
            subject: Some(subject),
            paper: Some(paper),
            ..Default::default()
        })
    }

    async fn evaluate(
        &self,
        key: &str,
        record: ActiveRecord,
        request: &ExamRequest,
    ) -> Result<ExamReply, BackendError> {
        let answers = match (&request.upload_kind, &request.uploaded_text) {
            (Some(UploadKind::Answer), Some(text)) if !text.trim().is_empty() => text.clone(),
            _ => request
                .history
                .iter()
                .filter(|m| m.role == Role::User)
                .map(|m| m.content.as_str())
                .chain(std::iter::once(request.message.as_str()))
                .collect::<Vec<_>>()
                .join("\n"),
        };

        info!("🧮 批改 {} 答卷 ({} 字符)", record.subject, answers.len());
        let prompt = build_evaluation_prompt(&record.paper, &answers);
        let evaluation = self
            .generator
            .generate(Some(EVALUATION_SYSTEM_PROMPT), &[], &prompt)
            .await?;

        // 批改成功后才结束考试，失败时学生可以重新提交
        {
            let mut active = self.active.lock().unwrap_or_else(|e| e.into_inner());
            active.remove(key);
        }
        {
            let mut ended = self.ended.lock().unwrap_or_else(|e| e.into_inner());
            ended.insert(key.to_string(), request.session_id.clone());
        }
        self.forget_syllabus(&request.session_id);

        let score = self.extractor.score(&evaluation);
        if score.is_none() {
            warn!("⚠️ 批改结果中没有识别到分数");
        }
        let total = score
            .and_then(|s| s.total)
            .or_else(|| self.extractor.total_marks(&evaluation));
        let elapsed = elapsed_between(self.clock.now_millis(), record.start_ms);

        Ok(ExamReply {
            reply: Some(evaluation),
            exam_ended: Some(true),
            subject: Some(record.subject),
            marks_obtained: score.map(|s| s.obtained),
            total_marks: total,
            percentage: score.and_then(|s| s.percentage),
            time_taken: Some(time_taken_label(elapsed)),
            ..Default::default()
        })
    }

    async fn chat(
        &self,
        request: &ExamRequest,
        record: Option<&ActiveRecord>,
    ) -> Result<ExamReply, BackendError> {
        // 科目写在消息里时直接确认，不必等模型措辞
        if record.is_none() {
            if let Some(subject) = Subject::find(&request.message) {
                return Ok(ExamReply::text(format!(
                    "Subject detected: {}. When you are ready, type {} and the timer will start.",
                    subject.name(),
                    START_TRIGGER
                )));
            }
        }

        let system = match record {
            Some(record) => build_invigilator_prompt(&record.subject),
            None => build_setup_prompt(),
        };
        let reply = self
            .generator
            .generate(Some(&system), &request.history, &request.message)
            .await?;
        Ok(ExamReply::text(reply))
    }
}

#[async_trait]
impl ExamBackend for LlmExamBackend {
    async fn send(&self, request: &ExamRequest) -> Result<ExamReply, BackendError> {
        let key = Self::registry_key(request);
        debug!("📥 收到请求 (序号 {}): {}", request.sequence, truncate_text(&request.message, 60));

        if let Some(reply) = self.try_resume(&key, &request.session_id) {
            return Ok(reply);
        }

        let record = self.active_record(&key);
        let answer_uploaded = request.upload_kind == Some(UploadKind::Answer)
            && request
                .uploaded_text
                .as_deref()
                .is_some_and(|t| !t.trim().is_empty());

        if let Some(record) = record {
            if answer_uploaded || self.extractor.requests_submit(&request.message) {
                return self.evaluate(&key, record, request).await;
            }
            return self.chat(request, Some(&record)).await;
        }

        if answer_uploaded {
            return Ok(ExamReply::text(format!(
                "There is no exam in progress, so there is nothing to grade yet. \
                 Pick a subject and type {} to begin.",
                START_TRIGGER
            )));
        }

        if request.upload_kind == Some(UploadKind::Syllabus) {
            if let Some(text) = request.uploaded_text.as_deref().filter(|t| !t.trim().is_empty()) {
                let mut syllabi = self.syllabi.lock().unwrap_or_else(|e| e.into_inner());
                syllabi.insert(request.session_id.clone(), text.to_string());
                debug!("已保存大纲 ({} 字符)", text.len());
            }
        }

        if self.extractor.requests_start(&request.message) {
            if self.has_ended(&key, &request.session_id) {
                info!("🚫 会话已交卷，拒绝重新开始");
                return Ok(ExamReply::text(
                    "This exam session has already been submitted and graded. \
                     Start a new session to take another exam.",
                ));
            }
            return self.start_exam(key, request).await;
        }

        self.chat(request, None).await
    }
}

// ========== 提示词 ==========

const PAPER_SYSTEM_PROMPT: &str = "You are an experienced school examiner. \
You write complete, well-balanced board-style question papers in plain text. \
Never include answers or solutions.";

const EVALUATION_SYSTEM_PROMPT: &str = "You are a strict but fair examiner. \
You grade answer sheets against the question paper and report marks honestly.";

fn build_paper_prompt(subject: &str, identity: &StudentIdentity, syllabus: Option<&str>) -> String {
    let class = if identity.class.is_empty() { "10" } else { identity.class.as_str() };
    let board = if identity.board.is_empty() { "CBSE" } else { identity.board.as_str() };
    let syllabus = syllabus
        .map(|s| format!("\nRestrict the questions to this syllabus:\n{}\n", s))
        .unwrap_or_default();

    format!(
        r#"Write a full {board} Class {class} {subject} question paper.

Use exactly this header, one item per line:
{board} SAMPLE QUESTION PAPER
Subject: {subject}
Class: {class}
Time Allowed: 3 Hours
Maximum Marks: 80

Then a short "General Instructions" list, then the questions grouped under the
headers SECTION A, SECTION B, SECTION C, SECTION D and SECTION E, each header on
its own line. Number every question (Q1., Q2., ...) and show its marks in brackets.
Use plain text only, no tables.
{syllabus}"#
    )
}

fn build_evaluation_prompt(paper: &str, answers: &str) -> String {
    format!(
        r#"Grade the student's answers against the question paper.

QUESTION PAPER:
{paper}

STUDENT ANSWERS:
{answers}

Give brief feedback per section, then finish with exactly these lines:
Marks Obtained: <obtained>/<maximum>
Total Marks: <maximum>
Percentage: <percentage>%"#
    )
}

fn build_setup_prompt() -> String {
    format!(
        "You are an exam invigilator helping a student set up a timed mock exam. \
         Ask which subject they want if they have not said so. Available subjects: {}. \
         Once the subject is clear, reply with \"Subject detected: <subject>\" and tell them \
         to type {} to receive the paper and start the timer. Keep replies short.",
        Subject::catalogue(),
        START_TRIGGER
    )
}

fn build_invigilator_prompt(subject: &str) -> String {
    format!(
        "You are invigilating a timed {} exam that is in progress. \
         Do not give answers, hints or solutions to any question. \
         You may clarify instructions. Remind the student to type {} \
         or upload an answer sheet when finished.",
        subject, SUBMIT_TRIGGER
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::{ManualClock, MemoryHistoryStore};
    use crate::models::{ChatMessage, ChatMode};
    use crate::workflow::{ExamPhase, ExamSessionController, SendOutcome, Transition};

    /// 按顺序返回预设文本，并记录收到的提示
    struct ScriptedGenerator {
        replies: Mutex<Vec<String>>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedGenerator {
        fn new(replies: &[&str]) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.iter().rev().map(|s| s.to_string()).collect()),
                prompts: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl TextGenerator for ScriptedGenerator {
        async fn generate(
            &self,
            _system_message: Option<&str>,
            _history: &[ChatMessage],
            user_message: &str,
        ) -> Result<String, BackendError> {
            self.prompts.lock().unwrap().push(user_message.to_string());
            self.replies
                .lock()
                .unwrap()
                .pop()
                .ok_or_else(|| BackendError::EmptyContent { model: "scripted".into() })
        }
    }

    fn request(message: &str, session_id: &str) -> ExamRequest {
        ExamRequest {
            mode: ChatMode::Exam,
            message: message.to_string(),
            uploaded_text: None,
            upload_kind: None,
            history: Vec::new(),
            confirmed_subject: None,
            student_name: "Asha".to_string(),
            student_class: "10".to_string(),
            board: "CBSE".to_string(),
            session_id: session_id.to_string(),
            sequence: 1,
        }
    }

    const PAPER: &str = "CBSE SAMPLE QUESTION PAPER\nSubject: Science\nTime Allowed: 3 Hours\nMaximum Marks: 80\nSECTION A\nQ1. What is photosynthesis? [2]";

    #[tokio::test]
    async fn test_subject_in_message_is_confirmed_without_llm() {
        let generator = ScriptedGenerator::new(&[]);
        let backend = LlmExamBackend::new(generator, Arc::new(ManualClock::new(0))).unwrap();

        let reply = backend.send(&request("I want science", "s1")).await.unwrap();
        let text = reply.reply.unwrap();
        assert!(text.starts_with("Subject detected: Science"));
        assert!(text.contains(START_TRIGGER));
    }

    #[tokio::test]
    async fn test_start_without_subject_asks_for_one() {
        let generator = ScriptedGenerator::new(&[]);
        let backend = LlmExamBackend::new(generator, Arc::new(ManualClock::new(0))).unwrap();

        let reply = backend.send(&request("START EXAM", "s1")).await.unwrap();
        assert!(reply.start_time.is_none());
        assert!(reply.reply.unwrap().contains("Available subjects"));
    }

    #[tokio::test]
    async fn test_full_exam_then_resume_then_submit() {
        let generator = ScriptedGenerator::new(&[
            PAPER,
            "Good work.\nMarks Obtained: 62/80\nPercentage: 78%",
        ]);
        let clock = ManualClock::new(1_700_000_000_000);
        let backend = LlmExamBackend::new(generator.clone(), Arc::new(clock.clone())).unwrap();

        let mut start = request("start exam", "s1");
        start.confirmed_subject = Some("Science".to_string());
        let reply = backend.send(&start).await.unwrap();
        assert_eq!(reply.start_time, Some(1_700_000_000_000));
        assert_eq!(reply.subject.as_deref(), Some("Science"));
        assert!(reply.paper.unwrap().contains("SECTION A"));

        // 同一学生换了会话
        clock.advance_secs(600);
        let resumed = backend.send(&request("hello again", "s2")).await.unwrap();
        assert_eq!(resumed.resume_exam, Some(true));
        assert_eq!(resumed.start_time, Some(1_700_000_000_000));
        assert!(resumed.question_paper.is_some());

        clock.advance_secs(5);
        let mut submit = request("here are my answers", "s2");
        submit.upload_kind = Some(UploadKind::Answer);
        submit.uploaded_text = Some("Q1. Plants make food.".to_string());
        let ended = backend.send(&submit).await.unwrap();
        assert_eq!(ended.exam_ended, Some(true));
        assert_eq!(ended.marks_obtained, Some(62.0));
        assert_eq!(ended.total_marks, Some(80.0));
        assert_eq!(ended.percentage, Some(78.0));
        assert_eq!(ended.time_taken.as_deref(), Some("10 min 5 sec"));

        let prompts = generator.prompts.lock().unwrap();
        assert!(prompts[1].contains("Q1. Plants make food."));
    }

    #[tokio::test]
    async fn test_answer_upload_without_exam_is_not_graded() {
        let generator = ScriptedGenerator::new(&[]);
        let backend = LlmExamBackend::new(generator, Arc::new(ManualClock::new(0))).unwrap();

        let mut upload = request("", "s1");
        upload.upload_kind = Some(UploadKind::Answer);
        upload.uploaded_text = Some("answers".to_string());
        let reply = backend.send(&upload).await.unwrap();
        assert!(reply.exam_ended.is_none());
    }

    #[tokio::test]
    async fn test_generator_failure_is_returned() {
        let generator = ScriptedGenerator::new(&[]);
        let backend = LlmExamBackend::new(generator, Arc::new(ManualClock::new(0))).unwrap();

        let result = backend.send(&request("what is this?", "s1")).await;
        assert!(matches!(result, Err(BackendError::EmptyContent { .. })));
    }

    #[tokio::test]
    async fn test_resume_forgets_superseded_syllabus() {
        let generator = ScriptedGenerator::new(&[PAPER]);
        let backend = LlmExamBackend::new(generator, Arc::new(ManualClock::new(0))).unwrap();

        let mut syllabus = request("Science", "s1");
        syllabus.upload_kind = Some(UploadKind::Syllabus);
        syllabus.uploaded_text = Some("Chapter 1: Motion".to_string());
        backend.send(&syllabus).await.unwrap();
        assert!(backend.syllabi.lock().unwrap().contains_key("s1"));

        let mut start = request("START EXAM", "s1");
        start.confirmed_subject = Some("Science".to_string());
        backend.send(&start).await.unwrap();

        let resumed = backend.send(&request("hello", "s2")).await.unwrap();
        assert_eq!(resumed.resume_exam, Some(true));
        assert!(backend.syllabi.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_start_after_submission_is_refused() {
        let generator = ScriptedGenerator::new(&[
            PAPER,
            "Marks Obtained: 40/80\nPercentage: 50%",
            "Which subject would you like this time?",
        ]);
        let clock = ManualClock::new(1_700_000_000_000);
        let backend = Arc::new(LlmExamBackend::new(generator, Arc::new(clock.clone())).unwrap());
        let controller = ExamSessionController::new(
            backend.clone(),
            Arc::new(MemoryHistoryStore::new()),
            Arc::new(clock.clone()),
            StudentIdentity::new("Asha", "10", "CBSE"),
            10,
        )
        .unwrap();

        controller
            .send("Science", Some("Chapter 1: Motion"), Some(UploadKind::Syllabus))
            .await;
        assert_eq!(
            controller.send("START EXAM", None, None).await,
            SendOutcome::Applied(Transition::PaperReady)
        );
        clock.advance_secs(300);
        assert_eq!(
            controller
                .send("", Some("Q1. Plants make food."), Some(UploadKind::Answer))
                .await,
            SendOutcome::Applied(Transition::Ended)
        );
        assert!(backend.syllabi.lock().unwrap().is_empty());

        // 交卷后再次开始：不生成试卷，也不登记新的考试
        assert_eq!(
            controller.send("START EXAM", None, None).await,
            SendOutcome::Applied(Transition::Ignored)
        );
        let last = controller.messages().last().unwrap().content.clone();
        assert!(last.contains("already been submitted"));
        assert!(backend.active.lock().unwrap().is_empty());

        controller.reset();
        let outcome = controller.send("hello", None, None).await;
        assert_eq!(outcome, SendOutcome::Applied(Transition::Reply));
        assert_ne!(controller.snapshot().phase, ExamPhase::Active);
        assert!(controller.take_banner().is_none());
        assert!(backend.active.lock().unwrap().is_empty());
    }
}
