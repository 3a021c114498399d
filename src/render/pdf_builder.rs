//! 分页 PDF 生成
//!
//! 两步：先排版（纯计算，可单独测试），再用 `lopdf` 序列化。
//! 输出不压缩、不带时间戳，同样的输入得到同样的字节。

use lopdf::{
    content::{Content, Operation},
    dictionary, Document, Object, Stream,
};
use tracing::{info, warn};

use crate::error::RenderError;
use crate::render::diagnostics::RenderIssue;
use crate::render::glyph_metrics::{GlyphMetrics, StandardFont};
use crate::render::line_classifier::LineClassifier;
use crate::render::text_wrapper::TextWrapper;

/// 页面几何参数（单位：pt）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageGeometry {
    pub width: f32,
    pub height: f32,
    pub margin: f32,
    pub line_height: f32,
    pub font_size: f32,
    /// 页码距页面底边的距离
    pub footer_offset: f32,
    pub footer_font_size: f32,
}

impl Default for PageGeometry {
    /// A4
    fn default() -> Self {
        Self {
            width: 595.0,
            height: 842.0,
            margin: 50.0,
            line_height: 16.0,
            font_size: 11.0,
            footer_offset: 30.0,
            footer_font_size: 9.0,
        }
    }
}

impl PageGeometry {
    pub fn text_width(&self) -> f32 {
        self.width - 2.0 * self.margin
    }

    /// 新页面的光标起点
    pub fn top(&self) -> f32 {
        self.height - self.margin
    }

    /// 光标低于这个值就换页
    pub fn bottom_limit(&self) -> f32 {
        self.margin + self.line_height
    }
}

/// 已定位的一行
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedLine {
    pub text: String,
    pub bold: bool,
    pub x: f32,
    /// 基线位置
    pub y: f32,
    pub source_line: usize,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageLayout {
    pub lines: Vec<PlacedLine>,
}

/// 排版结果
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentLayout {
    /// 至少一页
    pub pages: Vec<PageLayout>,
    pub issues: Vec<RenderIssue>,
}

/// 生成的 PDF
#[derive(Debug, Clone)]
pub struct PdfOutput {
    pub bytes: Vec<u8>,
    pub page_count: usize,
    pub issues: Vec<RenderIssue>,
}

/// 分页文档生成器
pub struct PaginatedDocumentBuilder {
    geometry: PageGeometry,
    classifier: LineClassifier,
}

impl PaginatedDocumentBuilder {
    pub fn new() -> Result<Self, RenderError> {
        Self::with_geometry(PageGeometry::default())
    }

    pub fn with_geometry(geometry: PageGeometry) -> Result<Self, RenderError> {
        Ok(Self {
            geometry,
            classifier: LineClassifier::new()?,
        })
    }

    pub fn geometry(&self) -> &PageGeometry {
        &self.geometry
    }

    /// 排版：分类 → 折行 → 分页
    pub fn layout(&self, content: &str) -> DocumentLayout {
        let g = &self.geometry;
        let wrapper = TextWrapper::new(g.font_size, g.text_width());
        let mut pages = vec![PageLayout::default()];
        let mut issues = Vec::new();
        let mut y = g.top();

        for (index, raw) in content.lines().enumerate() {
            let source_line = index + 1;
            let bold = self.classifier.classify(raw).is_bold();
            let font = StandardFont::for_weight(bold);
            let text = raw.replace("**", "");

            let wrapped = wrapper.wrap_reporting(&text, &font);
            if wrapped.estimated {
                warn!("⚠️ 第 {} 行字宽无法测量，使用估算值", source_line);
                issues.push(RenderIssue::EstimatedWidth { line: source_line });
            }

            for text in wrapped.lines {
                if let Err(e) = check_drawable(&text, font, source_line) {
                    warn!("⚠️ 跳过无法绘制的行: {}", e);
                    issues.push(RenderIssue::SkippedLine {
                        line: source_line,
                        reason: e.to_string(),
                    });
                    continue;
                }

                if y < g.bottom_limit() {
                    pages.push(PageLayout::default());
                    y = g.top();
                }
                if let Some(page) = pages.last_mut() {
                    page.lines.push(PlacedLine {
                        text,
                        bold,
                        x: g.margin,
                        y,
                        source_line,
                    });
                }
                y -= g.line_height;
            }
        }

        DocumentLayout { pages, issues }
    }

    /// 排版并序列化为 PDF
    pub fn build(&self, content: &str) -> Result<PdfOutput, RenderError> {
        let layout = self.layout(content);
        let bytes = self.render(&layout)?;
        info!(
            "📄 PDF 生成完成: {} 页, {} 字节, {} 个渲染问题",
            layout.pages.len(),
            bytes.len(),
            layout.issues.len()
        );

        Ok(PdfOutput {
            bytes,
            page_count: layout.pages.len(),
            issues: layout.issues,
        })
    }

    fn render(&self, layout: &DocumentLayout) -> Result<Vec<u8>, RenderError> {
        let g = &self.geometry;
        let pdf_err = |e: lopdf::Error| RenderError::Pdf(e.to_string());

        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();

        let regular_id = doc.add_object(font_dictionary(StandardFont::Helvetica));
        let bold_id = doc.add_object(font_dictionary(StandardFont::HelveticaBold));
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! {
                StandardFont::Helvetica.resource_name() => regular_id,
                StandardFont::HelveticaBold.resource_name() => bold_id,
            },
        });

        let total = layout.pages.len();
        let mut kids: Vec<Object> = Vec::with_capacity(total);

        for (index, page) in layout.pages.iter().enumerate() {
            let mut operations = Vec::new();
            for line in page.lines.iter().filter(|l| !l.text.is_empty()) {
                let font = StandardFont::for_weight(line.bold);
                push_text(&mut operations, font, g.font_size, line.x, line.y, &line.text);
            }
            self.stamp_page_number(&mut operations, index + 1, total);

            let encoded = Content { operations }.encode().map_err(pdf_err)?;
            let content_id = doc.add_object(Stream::new(dictionary! {}, encoded));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
                "Resources" => resources_id,
            });
            kids.push(page_id.into());
        }

        doc.set_object(
            pages_id,
            dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => total as i64,
                "MediaBox" => vec![0.into(), 0.into(), g.width.into(), g.height.into()],
            },
        );

        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes)
            .map_err(|e| RenderError::Pdf(e.to_string()))?;
        Ok(bytes)
    }

    /// 页脚居中的 "Page i of N"
    fn stamp_page_number(&self, operations: &mut Vec<Operation>, page: usize, total: usize) {
        let g = &self.geometry;
        let label = page_label(page, total);
        let font = StandardFont::Helvetica;
        let width = font
            .text_width(&label, g.footer_font_size)
            .unwrap_or_else(|_| label.len() as f32 * g.footer_font_size * 0.5);
        let x = (g.width - width) / 2.0;
        push_text(operations, font, g.footer_font_size, x, g.footer_offset, &label);
    }
}

pub fn page_label(page: usize, total: usize) -> String {
    format!("Page {} of {}", page, total)
}

fn font_dictionary(font: StandardFont) -> lopdf::Dictionary {
    dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => font.base_font(),
        "Encoding" => "WinAnsiEncoding",
    }
}

fn push_text(
    operations: &mut Vec<Operation>,
    font: StandardFont,
    size: f32,
    x: f32,
    y: f32,
    text: &str,
) {
    operations.push(Operation::new("BT", vec![]));
    operations.push(Operation::new(
        "Tf",
        vec![font.resource_name().into(), size.into()],
    ));
    operations.push(Operation::new("Td", vec![x.into(), y.into()]));
    operations.push(Operation::new("Tj", vec![Object::string_literal(text)]));
    operations.push(Operation::new("ET", vec![]));
}

/// 行中每个字符都必须有字形
fn check_drawable(text: &str, font: StandardFont, line: usize) -> Result<(), RenderError> {
    match text.chars().find(|c| !font.can_draw(*c)) {
        Some(ch) => Err(RenderError::Undrawable { line, ch }),
        None => Ok(()),
    }
}
