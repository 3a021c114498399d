use std::str::FromStr;

/// 可考试的科目
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Subject {
    Mathematics,
    Science,
    SocialScience,
    English,
    Hindi,
    Physics,
    Chemistry,
    Biology,
    ComputerScience,
}

impl Subject {
    /// 全部科目（问候语中按此顺序列出）
    pub const ALL: [Subject; 9] = [
        Subject::Mathematics,
        Subject::Science,
        Subject::SocialScience,
        Subject::English,
        Subject::Hindi,
        Subject::Physics,
        Subject::Chemistry,
        Subject::Biology,
        Subject::ComputerScience,
    ];

    /// 获取标准名称
    pub fn name(self) -> &'static str {
        match self {
            Subject::Mathematics => "Mathematics",
            Subject::Science => "Science",
            Subject::SocialScience => "Social Science",
            Subject::English => "English",
            Subject::Hindi => "Hindi",
            Subject::Physics => "Physics",
            Subject::Chemistry => "Chemistry",
            Subject::Biology => "Biology",
            Subject::ComputerScience => "Computer Science",
        }
    }

    /// 智能查找科目（支持在整句中模糊匹配）
    ///
    /// 较长的名称优先，避免 "Social Science" 被识别为 "Science"
    pub fn find(s: &str) -> Option<Self> {
        if let Ok(subject) = s.parse() {
            return Some(subject);
        }

        let s_lower = s.to_lowercase();
        if s_lower.contains("social science") {
            return Some(Subject::SocialScience);
        }
        if s_lower.contains("computer") {
            return Some(Subject::ComputerScience);
        }
        if s_lower.contains("math") {
            return Some(Subject::Mathematics);
        }
        if s_lower.contains("physics") {
            return Some(Subject::Physics);
        }
        if s_lower.contains("chemistry") {
            return Some(Subject::Chemistry);
        }
        if s_lower.contains("biology") {
            return Some(Subject::Biology);
        }
        if s_lower.contains("science") {
            return Some(Subject::Science);
        }
        if s_lower.contains("english") {
            return Some(Subject::English);
        }
        if s_lower.contains("hindi") {
            return Some(Subject::Hindi);
        }

        None
    }

    /// 问候语中使用的科目列表
    pub fn catalogue() -> String {
        Self::ALL
            .iter()
            .map(|s| s.name())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl FromStr for Subject {
    type Err = ();

    /// 精确匹配（忽略大小写）
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_lowercase();
        match s.as_str() {
            "mathematics" | "maths" | "math" => Ok(Subject::Mathematics),
            "science" => Ok(Subject::Science),
            "social science" | "sst" => Ok(Subject::SocialScience),
            "english" => Ok(Subject::English),
            "hindi" => Ok(Subject::Hindi),
            "physics" => Ok(Subject::Physics),
            "chemistry" => Ok(Subject::Chemistry),
            "biology" => Ok(Subject::Biology),
            "computer science" | "cs" => Ok(Subject::ComputerScience),
            _ => Err(()),
        }
    }
}

impl std::fmt::Display for Subject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}
