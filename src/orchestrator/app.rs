//! 终端前端
//!
//! 读取标准输入，把普通文本交给会话控制器，把 `/` 开头的行当作命令。

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{info, warn};

use crate::config::Config;
use crate::infrastructure::{JsonFileHistoryStore, SystemClock};
use crate::models::{load_profile, Role, UploadKind};
use crate::orchestrator::delivery::{deliver_print_document, Delivery};
use crate::render::{PaginatedDocumentBuilder, PrintDocumentComposer, PrintMetadata};
use crate::services::{ExamBackend, HttpExamBackend, LlmExamBackend, LlmService};
use crate::workflow::{ExamPhase, ExamSessionController, SendOutcome};

const DEFAULT_PDF_NAME: &str = "question-paper.pdf";

const HELP: &str = "Commands:
  /pdf [path]                     save the question paper as PDF
  /print                          open a printable copy of the question paper
  /status                         show the exam status
  /upload syllabus|answer <file>  attach a text file to your next message
  /reset                          start over with a new session
  /quit                           leave";

/// 一行输入
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Say(String),
    Pdf(Option<PathBuf>),
    Print,
    Status,
    Upload { kind: UploadKind, path: PathBuf },
    Reset,
    Help,
    Quit,
}

impl Command {
    /// 解析一行输入；无法识别的命令返回用法说明
    pub fn parse(line: &str) -> Result<Self, String> {
        let line = line.trim();
        let Some(rest) = line.strip_prefix('/') else {
            return Ok(Command::Say(line.to_string()));
        };

        let mut parts = rest.split_whitespace();
        let name = parts.next().unwrap_or_default();
        match name {
            "pdf" => Ok(Command::Pdf(parts.next().map(PathBuf::from))),
            "print" => Ok(Command::Print),
            "status" => Ok(Command::Status),
            "reset" => Ok(Command::Reset),
            "help" => Ok(Command::Help),
            "quit" | "exit" => Ok(Command::Quit),
            "upload" => {
                let kind = match parts.next() {
                    Some("syllabus") => UploadKind::Syllabus,
                    Some("answer") => UploadKind::Answer,
                    _ => return Err("usage: /upload syllabus|answer <file>".to_string()),
                };
                let path = parts.collect::<Vec<_>>().join(" ");
                if path.is_empty() {
                    return Err("usage: /upload syllabus|answer <file>".to_string());
                }
                Ok(Command::Upload {
                    kind,
                    path: PathBuf::from(path),
                })
            }
            other => Err(format!("unknown command /{}; type /help", other)),
        }
    }
}

/// 等待随下一条消息发送的上传文件
struct PendingUpload {
    kind: UploadKind,
    text: String,
}

/// 应用主结构
pub struct App {
    config: Config,
    controller: ExamSessionController,
    builder: PaginatedDocumentBuilder,
    composer: PrintDocumentComposer,
}

impl App {
    /// 初始化应用
    pub fn initialize(config: Config) -> Result<Self> {
        let backend: Arc<dyn ExamBackend> = match &config.backend_url {
            Some(url) => Arc::new(HttpExamBackend::new(url).context("创建协作服务客户端失败")?),
            None => Arc::new(
                LlmExamBackend::new(Arc::new(LlmService::new(&config)), Arc::new(SystemClock))
                    .context("创建 LLM 协作服务失败")?,
            ),
        };

        let store = Arc::new(JsonFileHistoryStore::new(&config.history_dir));
        let identity = load_profile(Path::new(&config.profile_path));
        let controller = ExamSessionController::new(
            backend,
            store,
            Arc::new(SystemClock),
            identity,
            config.history_window,
        )
        .context("初始化考试会话失败")?;

        Ok(Self {
            config,
            controller,
            builder: PaginatedDocumentBuilder::new().context("初始化 PDF 生成器失败")?,
            composer: PrintDocumentComposer::new().context("初始化打印版生成器失败")?,
        })
    }

    /// 运行交互循环，直到 `/quit` 或输入结束
    pub async fn run(&self) -> Result<()> {
        let mut stdout = tokio::io::stdout();
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut pending: Option<PendingUpload> = None;

        self.print_messages_from(0);
        println!("\n(type /help for commands)");

        loop {
            stdout.write_all(self.prompt().as_bytes()).await?;
            stdout.flush().await?;

            let Some(line) = lines.next_line().await.context("读取输入失败")? else {
                break;
            };
            if line.trim().is_empty() {
                continue;
            }

            let command = match Command::parse(&line) {
                Ok(command) => command,
                Err(usage) => {
                    println!("{}", usage);
                    continue;
                }
            };

            match command {
                Command::Say(text) => {
                    let upload = pending.take();
                    self.say(&text, upload).await;
                }
                Command::Upload { kind, path } => match std::fs::read_to_string(&path) {
                    Ok(text) => {
                        println!(
                            "{} ready; it will be sent with your next message.",
                            kind.marker()
                        );
                        pending = Some(PendingUpload { kind, text });
                    }
                    Err(e) => println!("Could not read {}: {}", path.display(), e),
                },
                Command::Pdf(path) => self.save_pdf(path),
                Command::Print => self.print_paper(),
                Command::Status => self.print_status(),
                Command::Reset => {
                    pending = None;
                    self.controller.reset();
                    self.print_messages_from(0);
                }
                Command::Help => println!("{}", HELP),
                Command::Quit => break,
            }
        }

        info!("👋 会话结束");
        Ok(())
    }

    fn prompt(&self) -> String {
        let snapshot = self.controller.snapshot();
        match snapshot.phase {
            ExamPhase::Active => format!("\n[⏱ {}] > ", snapshot.elapsed_label),
            _ => "\n> ".to_string(),
        }
    }

    async fn say(&self, text: &str, upload: Option<PendingUpload>) {
        let before = self.controller.messages().len();
        let outcome = match &upload {
            Some(upload) => {
                self.controller
                    .send(text, Some(&upload.text), Some(upload.kind))
                    .await
            }
            None => self.controller.send(text, None, None).await,
        };

        match outcome {
            SendOutcome::Empty => {}
            SendOutcome::Busy => println!("Please wait for the current reply."),
            SendOutcome::Stale => {}
            SendOutcome::Applied(_) | SendOutcome::Failed => {
                // 用户消息已在本地显示，跳过
                self.print_messages_from(before + 1);
                if let Some(banner) = self.controller.take_banner() {
                    println!("\n*** {} ***", banner);
                }
            }
        }
    }

    fn print_messages_from(&self, start: usize) {
        for message in self.controller.messages().iter().skip(start) {
            let who = match message.role {
                Role::User => "You",
                Role::Assistant => "Invigilator",
            };
            println!("\n{}: {}", who, message.content);
        }
    }

    fn save_pdf(&self, path: Option<PathBuf>) {
        let Some(paper) = self.controller.paper() else {
            println!("No question paper yet.");
            return;
        };
        let path =
            path.unwrap_or_else(|| Path::new(&self.config.output_dir).join(DEFAULT_PDF_NAME));

        let output = match self.builder.build(&paper) {
            Ok(output) => output,
            Err(e) => {
                warn!("❌ PDF 生成失败: {}", e);
                println!("Failed to generate PDF.");
                return;
            }
        };
        for issue in &output.issues {
            println!("  note: {}", issue);
        }

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            if let Err(e) = std::fs::create_dir_all(parent) {
                println!("Could not create {}: {}", parent.display(), e);
                return;
            }
        }
        match std::fs::write(&path, &output.bytes) {
            Ok(()) => println!(
                "Saved {} ({} page{}).",
                path.display(),
                output.page_count,
                if output.page_count == 1 { "" } else { "s" }
            ),
            Err(e) => println!("Could not write {}: {}", path.display(), e),
        }
    }

    fn print_paper(&self) {
        let Some(paper) = self.controller.paper() else {
            println!("No question paper yet.");
            return;
        };
        let snapshot = self.controller.snapshot();
        let meta = PrintMetadata {
            subject: snapshot
                .subject
                .or(snapshot.confirmed_subject)
                .unwrap_or_default(),
            student: self.controller.identity().clone(),
        };
        let html = self.composer.compose(&paper, &meta);

        match deliver_print_document(&html, &meta.subject, Path::new(&self.config.output_dir)) {
            Ok(Delivery::Opened(path)) => println!("Opened {} for printing.", path.display()),
            Ok(Delivery::Downloaded(path)) => println!("Saved {}.", path.display()),
            Err(e) => println!("Could not save the printable paper: {}", e),
        }
    }

    fn print_status(&self) {
        let s = self.controller.snapshot();
        println!("Session: {}", s.session_id);
        println!("Status:  {}", s.phase);
        if let Some(subject) = s.subject.as_ref().or(s.confirmed_subject.as_ref()) {
            println!("Subject: {}", subject);
        }
        if s.phase == ExamPhase::Active {
            println!("Elapsed: {}", s.elapsed_label);
        }
        if let Some(outcome) = &s.outcome {
            if let (Some(obtained), Some(total)) = (outcome.marks_obtained, outcome.total_marks) {
                println!("Marks:   {}/{}", obtained, total);
            }
            if let Some(percentage) = outcome.percentage {
                println!("Score:   {}%", percentage);
            }
            println!("Time:    {}", outcome.time_taken);
        }
    }
}
